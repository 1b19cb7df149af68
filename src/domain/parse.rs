use crate::domain::ParsedLogLine;
use regex::Regex;
use std::sync::LazyLock;
use time::{Date, Month, PrimitiveDateTime, Time};

// [MM/DD/YYYY, H:MM:SS.mmm AM] rest
static LOG_TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[([0-9]{2})/([0-9]{2})/([0-9]{4})\s*,\s*([0-9]{1,2}):([0-9]{2}):([0-9]{2})\.([0-9]{3})\s*([AaPp][Mm])\s*\]",
    )
    .expect("timestamp pattern is valid")
});

/// Extracts the bracketed timestamp of a session-log line.
///
/// Lines without the prefix, or whose prefix does not name a real instant,
/// yield `None`. The returned text is the line minus its terminator.
pub fn parse_log_line(line: &str) -> Option<ParsedLogLine> {
    let captures = LOG_TIMESTAMP_RE.captures(line)?;
    let field = |index: usize| captures.get(index).map(|m| m.as_str());

    let month: u8 = field(1)?.parse().ok()?;
    let day: u8 = field(2)?.parse().ok()?;
    let year: i32 = field(3)?.parse().ok()?;
    let hour12: u8 = field(4)?.parse().ok()?;
    let minute: u8 = field(5)?.parse().ok()?;
    let second: u8 = field(6)?.parse().ok()?;
    let millis: u16 = field(7)?.parse().ok()?;
    let is_pm = field(8)?.eq_ignore_ascii_case("pm");

    let hour = to_24_hour(hour12, is_pm)?;
    let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    let time = Time::from_hms_milli(hour, minute, second, millis).ok()?;

    Some(ParsedLogLine {
        timestamp: PrimitiveDateTime::new(date, time),
        raw_text: line.trim_end_matches(['\r', '\n']).to_string(),
    })
}

fn to_24_hour(hour: u8, is_pm: bool) -> Option<u8> {
    match (hour, is_pm) {
        (1..=11, false) => Some(hour),
        (12, false) => Some(0),
        (1..=11, true) => Some(hour + 12),
        (12, true) => Some(12),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_timestamped_line() {
        let parsed =
            parse_log_line("[01/01/2025, 1:00:00.000 PM] hello\n").expect("timestamped line");
        assert_eq!(parsed.timestamp, datetime!(2025-01-01 13:00));
        assert_eq!(parsed.raw_text, "[01/01/2025, 1:00:00.000 PM] hello");
    }

    #[test]
    fn keeps_millisecond_precision() {
        let parsed = parse_log_line("[07/24/2025, 11:02:03.456 am] $ ls").expect("line");
        assert_eq!(parsed.timestamp, datetime!(2025-07-24 11:02:03.456));
    }

    #[test]
    fn maps_midnight_and_noon() {
        let midnight = parse_log_line("[07/24/2025, 12:00:00.000 AM] x").expect("midnight");
        let noon = parse_log_line("[07/24/2025, 12:00:00.000 PM] x").expect("noon");
        assert_eq!(midnight.timestamp, datetime!(2025-07-24 00:00));
        assert_eq!(noon.timestamp, datetime!(2025-07-24 12:00));
    }

    #[test]
    fn tolerates_spacing_around_comma_and_bracket() {
        let parsed = parse_log_line("[07/24/2025 ,  5:02:01.000PM ]   % ls   -la\r\n")
            .expect("loosely spaced line");
        assert_eq!(parsed.timestamp, datetime!(2025-07-24 17:02:01));
        assert_eq!(parsed.raw_text, "[07/24/2025 ,  5:02:01.000PM ]   % ls   -la");
    }

    #[test]
    fn skips_malformed_lines() {
        for line in [
            "",
            "plain output",
            "01/01/2025, 1:00:00.000 PM] no bracket",
            "[1/01/2025, 1:00:00.000 PM] short month",
            "[01/01/25, 1:00:00.000 PM] short year",
            "[01/01/2025, 1:00:00 PM] no millis",
            "[01/01/2025, 1:00:00.000 XM] bad meridiem",
            "[01/01/2025, 1:00:00.000] no meridiem",
            " [01/01/2025, 1:00:00.000 PM] leading space",
        ] {
            assert_eq!(parse_log_line(line), None, "{line:?}");
        }
    }

    #[test]
    fn rejects_impossible_instants() {
        for line in [
            "[13/01/2025, 1:00:00.000 PM] month 13",
            "[02/30/2025, 1:00:00.000 PM] feb 30",
            "[01/01/2025, 0:00:00.000 AM] hour 0",
            "[01/01/2025, 13:00:00.000 PM] hour 13",
            "[01/01/2025, 1:60:00.000 PM] minute 60",
        ] {
            assert_eq!(parse_log_line(line), None, "{line:?}");
        }
    }
}
