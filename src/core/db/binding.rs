/// Field Binding Module
///
/// This module describes how result columns map onto caller-owned storage:
/// the closed set of type tags, the destinations a tag may be written into, and
/// the ordered binding list a row set walks on every fetch.
use super::decode::DecodeContext;
use chrono::{NaiveDate, NaiveDateTime};
use std::cell::{Cell, RefCell};
use tracing::warn;

/// Type tag of a bound field.
///
/// The numeric tags are stable; [`FieldType::Bit`] exists only so the raw tag
/// can be recognized and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum FieldType {
    /// 32-bit signed integer
    Int = 1,
    /// Text
    Str = 2,
    /// Boolean
    Bool = 3,
    /// Bit column; never bindable
    Bit = 4,
    /// Date and time
    Time = 5,
    /// Double precision number
    Num = 6,
    /// Date only
    Day = 7,
    /// Single byte character
    Chr = 8,
}

impl FieldType {
    pub const MIN_TAG: i16 = 1;
    pub const MAX_TAG: i16 = 8;

    /// Maps a raw tag to its type; `None` when out of range.
    pub fn from_tag(tag: i16) -> Option<Self> {
        match tag {
            1 => Some(FieldType::Int),
            2 => Some(FieldType::Str),
            3 => Some(FieldType::Bool),
            4 => Some(FieldType::Bit),
            5 => Some(FieldType::Time),
            6 => Some(FieldType::Num),
            7 => Some(FieldType::Day),
            8 => Some(FieldType::Chr),
            _ => None,
        }
    }

    pub fn tag(self) -> i16 {
        self as i16
    }

    pub fn is_bindable(self) -> bool {
        self != FieldType::Bit
    }
}

/// Calendar value written into timestamp and date destinations.
///
/// The all-zero value stands for "no date": NULL columns and columns that do
/// not decode to a date leave it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timestamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp {
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Timestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    pub fn date_only(year: i32, month: u32, day: u32) -> Self {
        Timestamp::new(year, month, day, 0, 0, 0)
    }

    pub fn is_zero(&self) -> bool {
        *self == Timestamp::ZERO
    }

    /// `None` for the zero value and for components that form no valid date.
    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        self.to_date()?
            .and_hms_opt(self.hour, self.minute, self.second)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(value: NaiveDateTime) -> Self {
        use chrono::{Datelike, Timelike};
        Timestamp::new(
            value.year(),
            value.month(),
            value.day(),
            value.hour(),
            value.minute(),
            value.second(),
        )
    }
}

impl From<NaiveDate> for Timestamp {
    fn from(value: NaiveDate) -> Self {
        use chrono::Datelike;
        Timestamp::date_only(value.year(), value.month(), value.day())
    }
}

/// Caller-owned storage a result column is written into.
///
/// The row set only borrows the storage; the caller keeps ownership and reads
/// the values between fetches.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Int(&'a Cell<i32>),
    Str(&'a RefCell<String>),
    Bool(&'a Cell<bool>),
    /// Shared by timestamp and date-only fields
    Time(&'a Cell<Timestamp>),
    Num(&'a Cell<f64>),
    Chr(&'a Cell<u8>),
}

impl<'a> Target<'a> {
    /// Whether a field of `field_type` may be written into this target.
    pub fn accepts(&self, field_type: FieldType) -> bool {
        matches!(
            (field_type, self),
            (FieldType::Int, Target::Int(_))
                | (FieldType::Str, Target::Str(_))
                | (FieldType::Bool, Target::Bool(_))
                | (FieldType::Time | FieldType::Day, Target::Time(_))
                | (FieldType::Num, Target::Num(_))
                | (FieldType::Chr, Target::Chr(_))
        )
    }
}

impl<'a> From<&'a Cell<i32>> for Target<'a> {
    fn from(cell: &'a Cell<i32>) -> Self {
        Target::Int(cell)
    }
}

impl<'a> From<&'a RefCell<String>> for Target<'a> {
    fn from(cell: &'a RefCell<String>) -> Self {
        Target::Str(cell)
    }
}

impl<'a> From<&'a Cell<bool>> for Target<'a> {
    fn from(cell: &'a Cell<bool>) -> Self {
        Target::Bool(cell)
    }
}

impl<'a> From<&'a Cell<Timestamp>> for Target<'a> {
    fn from(cell: &'a Cell<Timestamp>) -> Self {
        Target::Time(cell)
    }
}

impl<'a> From<&'a Cell<f64>> for Target<'a> {
    fn from(cell: &'a Cell<f64>) -> Self {
        Target::Num(cell)
    }
}

impl<'a> From<&'a Cell<u8>> for Target<'a> {
    fn from(cell: &'a Cell<u8>) -> Self {
        Target::Chr(cell)
    }
}

/// One (type tag, destination) pair.
#[derive(Debug, Clone, Copy)]
pub struct BoundField<'a> {
    field_type: FieldType,
    target: Target<'a>,
}

impl<'a> BoundField<'a> {
    /// Builds a binding; `None` if the tag is not bindable or does not fit
    /// the target.
    pub fn new(field_type: FieldType, target: Target<'a>) -> Option<Self> {
        (field_type.is_bindable() && target.accepts(field_type)).then_some(BoundField {
            field_type,
            target,
        })
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Writes one native column value into the destination.
    ///
    /// Returns `true` when the value was non-NULL.
    pub(crate) fn assign(&self, raw: Option<&[u8]>, ctx: &DecodeContext<'_>) -> bool {
        match raw {
            None => {
                self.clear();
                false
            }
            Some(raw) if raw.is_empty() => {
                self.clear();
                true
            }
            Some(raw) => {
                self.store(raw, ctx);
                true
            }
        }
    }

    /// Resets the destination to its empty value.
    pub(crate) fn clear(&self) {
        match self.target {
            Target::Int(cell) => cell.set(0),
            Target::Str(cell) => match cell.try_borrow_mut() {
                Ok(mut text) => text.clear(),
                Err(_) => warn!("String destination is borrowed during fetch; left unchanged"),
            },
            Target::Bool(cell) => cell.set(false),
            Target::Time(cell) => cell.set(Timestamp::ZERO),
            Target::Num(cell) => cell.set(0.0),
            Target::Chr(cell) => cell.set(0),
        }
    }

    fn store(&self, raw: &[u8], ctx: &DecodeContext<'_>) {
        let decoder = ctx.decoder;
        match self.target {
            Target::Int(cell) => cell.set(decoder.decode_int(raw)),
            Target::Str(cell) => match cell.try_borrow_mut() {
                Ok(mut text) => {
                    text.clear();
                    text.push_str(&decoder.decode_str(raw));
                    if ctx.auto_trim {
                        trim_tail(&mut text);
                    }
                }
                Err(_) => warn!("String destination is borrowed during fetch; left unchanged"),
            },
            Target::Bool(cell) => cell.set(decoder.decode_bool(raw)),
            Target::Time(cell) => {
                let value = if self.field_type == FieldType::Day {
                    decoder.decode_day(raw)
                } else {
                    decoder.decode_timestamp(raw)
                };
                cell.set(value);
            }
            Target::Num(cell) => cell.set(decoder.decode_num(raw, &ctx.locale)),
            Target::Chr(cell) => cell.set(decoder.decode_chr(raw)),
        }
    }
}

/// Strips trailing whitespace in place.
pub fn trim_tail(text: &mut String) {
    let len = text.trim_end().len();
    text.truncate(len);
}

/// Ordered list of bound fields. Position N receives result column N.
#[derive(Debug, Default)]
pub struct FieldBindings<'a> {
    fields: Vec<BoundField<'a>>,
}

impl<'a> FieldBindings<'a> {
    pub fn new() -> Self {
        FieldBindings { fields: Vec::new() }
    }

    pub fn push(&mut self, field: BoundField<'a>) {
        self.fields.push(field);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundField<'a>> {
        self.fields.iter()
    }
}
