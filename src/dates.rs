use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// English ordinal suffix for a day of the month: 1 -> "st", 12 -> "th", 22 -> "nd".
pub fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }

    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Short month name and ordinal day, e.g. "May 24th".
pub fn format_date_with_ordinal(date: NaiveDate) -> String {
    let day = date.day();
    format!("{} {}{}", date.format("%b"), day, ordinal_suffix(day))
}

/// Parse a SQL date or timestamp column. The time part, if any, is kept.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    parse_date(value).and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
