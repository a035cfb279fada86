//! Conversions used by the single-value query helpers on
//! [`Connection`](super::Connection).
use super::binding::{trim_tail, Timestamp};
use super::decode::{parse_long, DecodeContext};

/// A type a one-row, one-column query can produce.
pub trait ScalarValue: Sized {
    /// Converts the non-NULL text of the single column.
    fn from_column(raw: &[u8], ctx: &DecodeContext<'_>) -> Self;
}

impl ScalarValue for i32 {
    fn from_column(raw: &[u8], ctx: &DecodeContext<'_>) -> Self {
        ctx.decoder.decode_int(raw)
    }
}

impl ScalarValue for u32 {
    fn from_column(raw: &[u8], _ctx: &DecodeContext<'_>) -> Self {
        parse_long(raw).clamp(0, u32::MAX as i64) as u32
    }
}

impl ScalarValue for i64 {
    fn from_column(raw: &[u8], _ctx: &DecodeContext<'_>) -> Self {
        parse_long(raw)
    }
}

impl ScalarValue for u64 {
    fn from_column(raw: &[u8], _ctx: &DecodeContext<'_>) -> Self {
        parse_long(raw).max(0) as u64
    }
}

impl ScalarValue for f64 {
    fn from_column(raw: &[u8], ctx: &DecodeContext<'_>) -> Self {
        ctx.decoder.decode_num(raw, &ctx.locale)
    }
}

impl ScalarValue for bool {
    fn from_column(raw: &[u8], ctx: &DecodeContext<'_>) -> Self {
        ctx.decoder.decode_bool(raw)
    }
}

impl ScalarValue for String {
    fn from_column(raw: &[u8], ctx: &DecodeContext<'_>) -> Self {
        let mut text = ctx.decoder.decode_str(raw).into_owned();
        if ctx.auto_trim {
            trim_tail(&mut text);
        }
        text
    }
}

impl ScalarValue for Timestamp {
    fn from_column(raw: &[u8], ctx: &DecodeContext<'_>) -> Self {
        ctx.decoder.decode_timestamp(raw)
    }
}
