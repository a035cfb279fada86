//! Owned destinations for callers that only learn the column types at run
//! time, such as the command line tool.
use super::binding::{FieldType, Target, Timestamp};
use crate::core::error::{DbError, ErrorCode, Result};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::fmt;

/// Storage for one bound column.
#[derive(Debug)]
pub enum Slot {
    Int(Cell<i32>),
    Str(RefCell<String>),
    Bool(Cell<bool>),
    Time(Cell<Timestamp>),
    Day(Cell<Timestamp>),
    Num(Cell<f64>),
    Chr(Cell<u8>),
}

impl Slot {
    /// Empty storage for `field_type`; `None` for the bit type.
    pub fn for_type(field_type: FieldType) -> Option<Self> {
        Some(match field_type {
            FieldType::Int => Slot::Int(Cell::new(0)),
            FieldType::Str => Slot::Str(RefCell::new(String::new())),
            FieldType::Bool => Slot::Bool(Cell::new(false)),
            FieldType::Bit => return None,
            FieldType::Time => Slot::Time(Cell::new(Timestamp::ZERO)),
            FieldType::Day => Slot::Day(Cell::new(Timestamp::ZERO)),
            FieldType::Num => Slot::Num(Cell::new(0.0)),
            FieldType::Chr => Slot::Chr(Cell::new(0)),
        })
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Slot::Int(_) => FieldType::Int,
            Slot::Str(_) => FieldType::Str,
            Slot::Bool(_) => FieldType::Bool,
            Slot::Time(_) => FieldType::Time,
            Slot::Day(_) => FieldType::Day,
            Slot::Num(_) => FieldType::Num,
            Slot::Chr(_) => FieldType::Chr,
        }
    }

    pub fn target(&self) -> Target<'_> {
        match self {
            Slot::Int(cell) => Target::Int(cell),
            Slot::Str(cell) => Target::Str(cell),
            Slot::Bool(cell) => Target::Bool(cell),
            Slot::Time(cell) | Slot::Day(cell) => Target::Time(cell),
            Slot::Num(cell) => Target::Num(cell),
            Slot::Chr(cell) => Target::Chr(cell),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Slot::Int(cell) => json!(cell.get()),
            Slot::Str(cell) => json!(cell.borrow().as_str()),
            Slot::Bool(cell) => json!(cell.get()),
            Slot::Time(cell) => timestamp_json(cell.get(), true),
            Slot::Day(cell) => timestamp_json(cell.get(), false),
            Slot::Num(cell) => json!(cell.get()),
            Slot::Chr(cell) => json!((cell.get() as char).to_string()),
        }
    }
}

fn timestamp_json(ts: Timestamp, with_time: bool) -> Value {
    match (ts.is_zero(), with_time) {
        (true, _) => Value::Null,
        (false, true) => json!(ts.to_string()),
        (false, false) => json!(format!("{:04}-{:02}-{:02}", ts.year, ts.month, ts.day)),
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Int(cell) => write!(f, "{}", cell.get()),
            Slot::Str(cell) => write!(f, "{}", cell.borrow()),
            Slot::Bool(cell) => write!(f, "{}", cell.get()),
            Slot::Time(cell) => write!(f, "{}", cell.get()),
            Slot::Day(cell) => {
                let ts = cell.get();
                write!(f, "{:04}-{:02}-{:02}", ts.year, ts.month, ts.day)
            }
            Slot::Num(cell) => write!(f, "{}", cell.get()),
            Slot::Chr(cell) => write!(f, "{}", cell.get() as char),
        }
    }
}

/// Parses a comma separated list of type names such as `i,s,n`.
///
/// Accepted names: `i`/`int`, `s`/`str`, `b`/`bool`, `t`/`time`, `n`/`num`,
/// `d`/`day`, `c`/`chr`, or the numeric tags `1` to `8`.
pub fn parse_type_list(list: &str) -> Result<Vec<FieldType>> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            let field_type = match name.to_ascii_lowercase().as_str() {
                "i" | "int" => Some(FieldType::Int),
                "s" | "str" => Some(FieldType::Str),
                "b" | "bool" => Some(FieldType::Bool),
                "t" | "time" => Some(FieldType::Time),
                "n" | "num" => Some(FieldType::Num),
                "d" | "day" => Some(FieldType::Day),
                "c" | "chr" => Some(FieldType::Chr),
                other => other.parse::<i16>().ok().and_then(FieldType::from_tag),
            };
            field_type
                .filter(|t| t.is_bindable())
                .ok_or(DbError::Code(ErrorCode::UnsupportedConversion))
        })
        .collect()
}
