// Parsing and formatting helpers.
//
// Spreadsheet exports carry currency signs, thousands separators and stray
// whitespace; everything here turns that into typed values or rendered text.
use crate::error::Metric;
use num_format::{Locale, ToFormattedString};
use std::io::BufRead;

/// Parse a cell into `f64`, tolerating common spreadsheet formatting.
///
/// - Trims whitespace and a leading `$`.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed, including
///   `NaN` and infinities.
pub fn parse_f64_safe(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_prefix('$').unwrap_or(s).trim();
    if s.is_empty() {
        return None;
    }
    // Allow exponents like 1e3 but nothing else alphabetic.
    if s
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return None;
    }
    let v = s.replace(',', "").parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// Parse a whole, non-negative count. Integral decimals such as `100.0`
/// are accepted since spreadsheets often store counts as floats.
pub fn parse_u64_safe(s: &str) -> Option<u64> {
    let v = parse_f64_safe(s)?;
    if v < 0.0 || v.fract() != 0.0 || v > u64::MAX as f64 {
        return None;
    }
    Some(v as u64)
}

/// Header normalization applied to every uploaded column name.
pub fn normalize_header(h: &str) -> String {
    h.trim().to_lowercase().replace(' ', "_")
}

pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    // "-0.00" reads as a loss; only keep the sign when something survives rounding.
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

pub fn format_currency(n: f64) -> String {
    let body = format_number(n, 2);
    match body.strip_prefix('-') {
        Some(abs) => format!("-${}", abs),
        None => format!("${}", body),
    }
}

/// Signed currency for deltas, e.g. `+$12.00` / `-$3.50`.
pub fn format_signed_currency(n: f64) -> String {
    let s = format_currency(n);
    if s.starts_with('-') || s == "$0.00" {
        s
    } else {
        format!("+{}", s)
    }
}

/// A fraction rendered as a percentage, e.g. `0.5` -> `50.0%`.
pub fn format_pct(fraction: f64, decimals: usize) -> String {
    format!("{}%", format_number(fraction * 100.0, decimals))
}

pub const NOT_AVAILABLE: &str = "N/A";

pub fn format_metric_pct(m: Metric, decimals: usize) -> String {
    m.map(|v| format_pct(v, decimals))
        .unwrap_or_else(|_| NOT_AVAILABLE.to_string())
}

pub fn format_metric_number(m: Metric, decimals: usize) -> String {
    m.map(|v| format_number(v, decimals))
        .unwrap_or_else(|_| NOT_AVAILABLE.to_string())
}

/// One trimmed line of console input; `None` at end of input or on a read error.
pub fn read_trimmed_line<R: BufRead>(reader: &mut R) -> Option<String> {
    let mut buf = String::new();
    match reader.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}
