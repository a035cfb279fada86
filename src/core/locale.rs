//! Numeric locale handling.
//!
//! Databases always expect a period as the decimal separator, while the host
//! environment may use a comma. The separator is detected once per process and
//! copied into every connection, so formatting and parsing never consult global
//! mutable state.
use once_cell::sync::Lazy;
use tracing::warn;

/// Languages whose conventional decimal separator is a comma.
///
/// This is a name-based guess, not a lookup in the system locale database.
/// Regions that break their language's convention are listed in
/// [`PERIOD_DECIMAL_REGIONS`]; any other exception is misdetected.
const COMMA_DECIMAL_LANGUAGES: &[&str] = &[
    "bg", "cs", "da", "de", "el", "es", "et", "fi", "fr", "hr", "hu", "id", "it", "lt", "lv",
    "nb", "nl", "nn", "no", "pl", "pt", "ro", "ru", "sk", "sl", "sv", "tr", "uk", "vi",
];

/// `language_REGION` pairs that use a period despite their language.
const PERIOD_DECIMAL_REGIONS: &[&str] = &["de_ch", "de_li", "it_ch", "es_mx", "es_us", "es_pr"];

static PROCESS_LOCALE: Lazy<NumericLocale> = Lazy::new(|| {
    let locale = NumericLocale::from_env();
    if locale.is_comma_decimal() {
        warn!("Current locale has ',' as decimal separator");
    }
    locale
});

/// Decimal separator convention of a host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericLocale {
    decimal_separator: char,
}

impl Default for NumericLocale {
    fn default() -> Self {
        NumericLocale::PERIOD
    }
}

impl NumericLocale {
    /// The "C" locale: period as decimal separator.
    pub const PERIOD: NumericLocale = NumericLocale {
        decimal_separator: '.',
    };

    /// A locale using comma as decimal separator.
    pub const COMMA: NumericLocale = NumericLocale {
        decimal_separator: ',',
    };

    /// The locale detected for this process on first use.
    pub fn process() -> Self {
        *PROCESS_LOCALE
    }

    /// Detects the numeric locale from `LC_ALL`, `LC_NUMERIC` and `LANG`, in
    /// that order of precedence.
    pub fn from_env() -> Self {
        ["LC_ALL", "LC_NUMERIC", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .map(|value| NumericLocale::from_locale_name(&value))
            .unwrap_or(NumericLocale::PERIOD)
    }

    /// Maps a POSIX locale name such as `fi_FI.UTF-8` to its separator.
    pub fn from_locale_name(name: &str) -> Self {
        let tag = name
            .split(&['.', '@'][..])
            .next()
            .unwrap_or_default()
            .replace('-', "_")
            .to_ascii_lowercase();
        let language = tag.split('_').next().unwrap_or_default();
        if PERIOD_DECIMAL_REGIONS.contains(&tag.as_str()) {
            return NumericLocale::PERIOD;
        }
        if COMMA_DECIMAL_LANGUAGES.contains(&language) {
            NumericLocale::COMMA
        } else {
            NumericLocale::PERIOD
        }
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    pub fn is_comma_decimal(&self) -> bool {
        self.decimal_separator == ','
    }

    /// Renders a number the way the host environment would display it.
    pub fn render(&self, value: f64) -> String {
        self.localize(value.to_string())
    }

    /// Renders a number with a fixed count of decimals, host style.
    pub fn render_fixed(&self, value: f64, decimals: usize) -> String {
        self.localize(format!("{value:.decimals$}"))
    }

    /// Renders a number as an SQL literal.
    ///
    /// The shortest representation that parses back to the same value is used,
    /// so `parse_number(print_number(x)) == x` for every finite `x`.
    pub fn print_number(&self, value: f64) -> String {
        to_sql_literal(self.render(value))
    }

    /// Renders a number with a fixed count of decimals as an SQL literal.
    pub fn print_number_fixed(&self, value: f64, decimals: usize) -> String {
        to_sql_literal(self.render_fixed(value, decimals))
    }

    /// Parses a numeric value as it arrives from a backend or from
    /// [`print_number`](Self::print_number).
    ///
    /// Parsing follows `strtod`: the longest numeric prefix is used and text
    /// without one yields `0.0`. Under a comma-decimal locale a comma is
    /// accepted in place of the period.
    pub fn parse_number(&self, text: &str) -> f64 {
        if self.is_comma_decimal() && !text.contains('.') {
            parse_float_prefix(&text.replacen(',', ".", 1))
        } else {
            parse_float_prefix(text)
        }
    }

    fn localize(&self, rendered: String) -> String {
        if self.is_comma_decimal() {
            rendered.replacen('.', ",", 1)
        } else {
            rendered
        }
    }
}

/// Rewrites the first comma into a period.
fn to_sql_literal(mut rendered: String) -> String {
    if let Some(pos) = rendered.find(',') {
        rendered.replace_range(pos..pos + 1, ".");
    }
    rendered
}

/// Parses the longest floating point prefix of `text`, `strtod` style.
pub(crate) fn parse_float_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let fraction_start = end + 1;
        let mut fraction_end = fraction_start;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
        }
        mantissa_digits += fraction_end - fraction_start;
        end = fraction_end;
    }
    if mantissa_digits == 0 {
        return parse_special(trimmed);
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    trimmed[..end].parse().unwrap_or(0.0)
}

/// Infinity and NaN spellings accepted by `strtod`.
fn parse_special(text: &str) -> f64 {
    let (sign, rest) = match text.as_bytes().first() {
        Some(b'-') => (-1.0, &text[1..]),
        Some(b'+') => (1.0, &text[1..]),
        _ => (1.0, text),
    };
    let lower = rest.to_ascii_lowercase();
    if lower.starts_with("inf") {
        sign * f64::INFINITY
    } else if lower.starts_with("nan") {
        f64::NAN
    } else {
        0.0
    }
}
