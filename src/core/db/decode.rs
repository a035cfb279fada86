//! Conversion of native column text into bound destination values.
//!
//! Every driver hands the row set a column as raw bytes. A [`FieldDecoder`]
//! turns those bytes into the value for one type tag; drivers override only
//! the conversions where their backend encodes things differently, such as the
//! boolean true literal.
use super::binding::Timestamp;
use crate::core::locale::NumericLocale;
use std::borrow::Cow;
use tracing::warn;

/// Per-backend conversion of native text into typed values.
///
/// Callers never pass empty input; NULL and empty columns are handled by the
/// binding before a decoder is consulted.
pub trait FieldDecoder {
    /// First byte that marks a boolean column as true.
    fn true_literal(&self) -> u8 {
        b'1'
    }

    fn decode_int(&self, raw: &[u8]) -> i32 {
        parse_int(raw)
    }

    fn decode_str<'r>(&self, raw: &'r [u8]) -> Cow<'r, str> {
        String::from_utf8_lossy(raw)
    }

    fn decode_bool(&self, raw: &[u8]) -> bool {
        raw.first() == Some(&self.true_literal())
    }

    fn decode_timestamp(&self, raw: &[u8]) -> Timestamp {
        parse_timestamp(raw, true)
    }

    fn decode_day(&self, raw: &[u8]) -> Timestamp {
        parse_timestamp(raw, false)
    }

    fn decode_num(&self, raw: &[u8], locale: &NumericLocale) -> f64 {
        locale.parse_number(&String::from_utf8_lossy(raw))
    }

    fn decode_chr(&self, raw: &[u8]) -> u8 {
        raw.first().copied().unwrap_or(0)
    }
}

/// Decoder for backends that encode booleans as `0`/`1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericBoolDecoder;

impl FieldDecoder for NumericBoolDecoder {}

/// Decoder for backends that encode booleans as `t`/`f`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LetterBoolDecoder;

impl FieldDecoder for LetterBoolDecoder {
    fn true_literal(&self) -> u8 {
        b't'
    }
}

/// Everything a binding needs to convert one column.
pub struct DecodeContext<'d> {
    pub decoder: &'d dyn FieldDecoder,
    pub locale: NumericLocale,
    pub auto_trim: bool,
}

/// Parses the leading base-10 integer of `raw`, clamped to the `i32` range.
pub fn parse_int(raw: &[u8]) -> i32 {
    parse_long(raw).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Parses the leading base-10 integer of `raw`, `strtol` style.
///
/// Leading whitespace and one sign are accepted; parsing stops at the first
/// non-digit. Text without digits yields `0` and overflow saturates.
pub fn parse_long(raw: &[u8]) -> i64 {
    Scanner::new(raw).number().unwrap_or(0)
}

/// Parses a positional `YYYY-MM-DD[ HH:MM:SS]` value.
///
/// Each component is read as a number followed by exactly one separator
/// character of any kind. A value whose date part is all zeros is not a real
/// date and yields [`Timestamp::ZERO`].
pub fn parse_timestamp(raw: &[u8], with_time: bool) -> Timestamp {
    let mut scanner = Scanner::new(raw);
    let mut parts = [0i64; 6];
    let wanted = if with_time { 6 } else { 3 };
    for (index, part) in parts.iter_mut().take(wanted).enumerate() {
        if index > 0 && !scanner.skip_one() {
            break;
        }
        match scanner.number() {
            Some(value) => *part = value,
            None => break,
        }
    }

    let [year, month, day, hour, minute, second] = parts;
    if year == 0 && month == 0 && day == 0 {
        if !raw.iter().all(|b| b.is_ascii_whitespace()) {
            warn!(value = %String::from_utf8_lossy(raw), "Zero date in date column");
        }
        return Timestamp::ZERO;
    }
    Timestamp::new(
        year.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        component(month),
        component(day),
        component(hour),
        component(minute),
        component(second),
    )
}

fn component(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

/// Cursor over ASCII text that reads integers the way `strtol` does.
struct Scanner<'r> {
    bytes: &'r [u8],
    pos: usize,
}

impl<'r> Scanner<'r> {
    fn new(bytes: &'r [u8]) -> Self {
        Scanner { bytes, pos: 0 }
    }

    fn number(&mut self) -> Option<i64> {
        let mut pos = self.pos;
        while pos < self.bytes.len() && self.bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let negative = match self.bytes.get(pos) {
            Some(b'-') => {
                pos += 1;
                true
            }
            Some(b'+') => {
                pos += 1;
                false
            }
            _ => false,
        };
        let digits_start = pos;
        let mut value: i64 = 0;
        while let Some(digit) = self.bytes.get(pos).filter(|b| b.is_ascii_digit()) {
            value = value
                .saturating_mul(10)
                .saturating_add(i64::from(digit - b'0'));
            pos += 1;
        }
        if pos == digits_start {
            return None;
        }
        self.pos = pos;
        Some(if negative { -value } else { value })
    }

    fn skip_one(&mut self) -> bool {
        if self.pos < self.bytes.len() {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}
