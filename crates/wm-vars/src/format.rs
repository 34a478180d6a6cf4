//! Date/time formatting for the `!NOW` variable
//!
//! `{{!NOW:yyyymmdd_hhnnss}}` style format strings use their own token
//! vocabulary, translated here onto chrono. Tokens are matched longest
//! first and case-insensitively; any other character passes through.

use chrono::{DateTime, Datelike, Local, Timelike};

/// Format used when `!NOW` carries no suffix
pub const DEFAULT_NOW_FORMAT: &str = "yyyymmdd_hhnnss";

/// Render a timestamp with the macro token vocabulary
///
/// Tokens: `yyyy` year, `yy` two-digit year, `mm` month, `dd` day,
/// `hh` hour (24h), `nn` minute, `ss` second, `ww` ISO weekday (1 =
/// Monday), `dy` day of year.
pub fn format_timestamp(ts: DateTime<Local>, format: &str) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let lower = format.to_ascii_lowercase();

    let mut i = 0;
    while i < lower.len() {
        if lower[i..].starts_with("yyyy") {
            out.push_str(&format!("{:04}", ts.year()));
            i += 4;
        } else if lower[i..].starts_with("yy") {
            out.push_str(&format!("{:02}", ts.year() % 100));
            i += 2;
        } else if lower[i..].starts_with("mm") {
            out.push_str(&format!("{:02}", ts.month()));
            i += 2;
        } else if lower[i..].starts_with("dd") {
            out.push_str(&format!("{:02}", ts.day()));
            i += 2;
        } else if lower[i..].starts_with("hh") {
            out.push_str(&format!("{:02}", ts.hour()));
            i += 2;
        } else if lower[i..].starts_with("nn") {
            out.push_str(&format!("{:02}", ts.minute()));
            i += 2;
        } else if lower[i..].starts_with("ss") {
            out.push_str(&format!("{:02}", ts.second()));
            i += 2;
        } else if lower[i..].starts_with("ww") {
            out.push_str(&ts.weekday().number_from_monday().to_string());
            i += 2;
        } else if lower[i..].starts_with("dy") {
            out.push_str(&format!("{:03}", ts.ordinal()));
            i += 2;
        } else {
            // ASCII lowering keeps byte offsets aligned with the input,
            // so the original character can be read back from `format`.
            let c = format[i..].chars().next().unwrap_or('?');
            out.push(c);
            i += c.len_utf8();
        }
    }

    out
}

/// `!NOW` with an optional format suffix
pub fn format_now(format: Option<&str>) -> String {
    format_timestamp(Local::now(), format.unwrap_or(DEFAULT_NOW_FORMAT))
}
