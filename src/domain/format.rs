//! Text formatting shared by the writers.

use chrono::{DateTime, Utc};

use super::models::TimeId;

fn to_datetime(date: TimeId) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date, 0)
}

/// `dd.mm.yyyy hh:mm:ss`, or an empty string for unset dates.
#[must_use]
pub fn format_date_time(date: TimeId) -> String {
    if date <= 0 {
        return String::new();
    }
    to_datetime(date)
        .map(|value| value.format("%d.%m.%Y %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// ISO-8601 local-less timestamp for structured output.
#[must_use]
pub fn format_iso(date: TimeId) -> String {
    to_datetime(date)
        .map(|value| value.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// `12 March 2021`, used for day separators.
#[must_use]
pub fn format_date_text(date: TimeId) -> String {
    to_datetime(date)
        .map(|value| value.format("%-d %B %Y").to_string())
        .unwrap_or_default()
}

/// Calendar day of a timestamp, used to decide day separators.
#[must_use]
pub fn day_of(date: TimeId) -> Option<chrono::NaiveDate> {
    to_datetime(date).map(|value| value.date_naive())
}

#[must_use]
pub fn format_file_size(size: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = 1024 * KB;
    #[allow(clippy::cast_precision_loss)]
    let value = size as f64;
    if size >= MB {
        format!("{:.1} MB", value / MB as f64)
    } else if size >= KB {
        format!("{:.1} KB", value / KB as f64)
    } else {
        format!("{size} B")
    }
}

/// `hh:mm:ss` or `mm:ss`.
#[must_use]
pub fn format_duration(seconds: i32) -> String {
    let (hours, minutes, secs) = (seconds / 3600, (seconds / 60) % 60, seconds % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Prefix a bare digit string with `+`.
#[must_use]
pub fn format_phone_number(phone: &str) -> String {
    if phone.is_empty() || phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}

/// Number left-padded with zeros to the digit count of `max`.
#[must_use]
pub fn fill_left(value: usize, max: usize) -> String {
    let width = max.max(1).to_string().len();
    format!("{value:0width$}")
}

/// "No messages", "1 message", "N messages", or the outgoing variants.
#[must_use]
pub fn messages_count_text(count: i64, outgoing: bool) -> String {
    let noun = if outgoing { "outgoing message" } else { "message" };
    match count {
        0 => format!("No {noun}s"),
        1 => format!("1 {noun}"),
        n => format!("{n} {noun}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_time() {
        assert_eq!(format_date_time(0), "");
        assert_eq!(format_date_time(86_400), "02.01.1970 00:00:00");
        assert_eq!(format_iso(86_400), "1970-01-02T00:00:00");
        assert_eq!(format_date_text(86_400), "2 January 1970");
    }

    #[test]
    fn test_fill_left() {
        assert_eq!(fill_left(3, 9), "3");
        assert_eq!(fill_left(3, 10), "03");
        assert_eq!(fill_left(42, 120), "042");
        assert_eq!(fill_left(0, 0), "0");
    }

    #[test]
    fn test_count_text() {
        assert_eq!(messages_count_text(0, false), "No messages");
        assert_eq!(messages_count_text(1, false), "1 message");
        assert_eq!(messages_count_text(5, true), "5 outgoing messages");
        assert_eq!(messages_count_text(0, true), "No outgoing messages");
    }

    #[test]
    fn test_sizes_and_durations() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_duration(75), "01:15");
        assert_eq!(format_duration(3725), "1:02:05");
        assert_eq!(format_phone_number("123"), "+123");
    }
}
