//! Booking-notification parser.
//!
//! Turns the body of a Calendly "New Event" email into an
//! [`AppointmentRecord`]. The body is scanned between two marker lines for
//! labelled anchors; the line after each anchor holds its value:
//!
//! ```text
//! Event Type:
//! 50 Minute Tutorial
//! Invitee:
//! Jane Doe
//! Invitee Email:
//! j@x.com
//! Event Date/Time
//! 02:00pm - 02:50pm (Pacific Time - US & Canada), Wednesday, 5 March 2025
//! Invitee Time Zone:
//! Pacific Time - US & Canada
//! View event in Calendly
//! ```
//!
//! Time and date tokens go through a strict grammar: a token the grammar
//! does not accept makes the whole message invalid instead of producing a
//! half-parsed value.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::AppointmentRecord;

pub const DEFAULT_START_MARKER: &str = "Event Type:";
pub const DEFAULT_END_MARKER: &str = "View event in Calendly";

const INVITEE_ANCHOR: &str = "Invitee:";
const EMAIL_ANCHOR: &str = "Invitee Email:";
const TIMEZONE_ANCHOR: &str = "Invitee Time Zone:";
const EVENT_TIME_ANCHOR: &str = "Event Date/Time";

const MONTHS: [(&str, &str); 12] = [
    ("january", "01"),
    ("february", "02"),
    ("march", "03"),
    ("april", "04"),
    ("may", "05"),
    ("june", "06"),
    ("july", "07"),
    ("august", "08"),
    ("september", "09"),
    ("october", "10"),
    ("november", "11"),
    ("december", "12"),
];

/// Result of scanning one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Found(AppointmentRecord),
    Invalid(InvalidReason),
}

/// Why a message was not an appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    MissingMarkers,
    MissingField(&'static str),
    MalformedTime(String),
    MalformedDate(String),
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Extraction::Found(_))
    }

    pub fn into_record(self) -> Option<AppointmentRecord> {
        match self {
            Extraction::Found(record) => Some(record),
            Extraction::Invalid(_) => None,
        }
    }
}

/// Values collected from the anchor scan. The first occurrence of each
/// anchor wins.
#[derive(Debug, Default)]
struct Anchors {
    invitee: Option<String>,
    email: Option<String>,
    timezone: Option<String>,
    event_time: Option<String>,
}

/// Parser configured with the marker pair that bounds the scan window.
#[derive(Debug, Clone)]
pub struct Extractor {
    start_marker: String,
    end_marker: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_markers(DEFAULT_START_MARKER, DEFAULT_END_MARKER)
    }
}

/// Parse with the default Calendly markers.
pub fn extract(raw_text: &str) -> Extraction {
    Extractor::default().extract(raw_text)
}

impl Extractor {
    pub fn with_markers(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start_marker: start.into(),
            end_marker: end.into(),
        }
    }

    pub fn extract(&self, raw_text: &str) -> Extraction {
        if !raw_text.contains(&self.start_marker) || !raw_text.contains(&self.end_marker) {
            return Extraction::Invalid(InvalidReason::MissingMarkers);
        }

        let normalized = normalize(raw_text);
        let Some(window) = self.window(&normalized) else {
            return Extraction::Invalid(InvalidReason::MissingMarkers);
        };

        let lines: Vec<&str> = window.split('\n').collect();
        let anchors = scan_anchors(&lines);

        match build_record(anchors) {
            Ok(record) => Extraction::Found(record),
            Err(reason) => Extraction::Invalid(reason),
        }
    }

    /// From the start marker through the end of the first end marker after it.
    fn window<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = text.find(&self.start_marker)?;
        let end = text[start..].find(&self.end_marker)? + start + self.end_marker.len();
        Some(&text[start..end])
    }
}

/// Undo the bits of quoted-printable the booking tool leaves in bodies:
/// the bullet and apostrophe escapes, then trailing `=` soft breaks.
fn normalize(raw: &str) -> String {
    let decoded = raw.replace("=E2=80=A2", "-").replace("=E2=80=99", "'");
    decoded
        .lines()
        .map(|line| line.trim_end_matches('='))
        .collect::<Vec<_>>()
        .join("\n")
}

fn scan_anchors(lines: &[&str]) -> Anchors {
    let mut anchors = Anchors::default();

    for (i, line) in lines.iter().enumerate() {
        let Some(value) = lines.get(i + 1).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
            continue;
        };

        if line.contains(INVITEE_ANCHOR) && anchors.invitee.is_none() {
            anchors.invitee = Some(value.to_string());
        }
        if line.contains(EMAIL_ANCHOR) && anchors.email.is_none() {
            anchors.email = Some(value.to_string());
        }
        if line.contains(TIMEZONE_ANCHOR) && anchors.timezone.is_none() {
            let label = value.split('-').next().unwrap_or(value).trim();
            if !label.is_empty() {
                anchors.timezone = Some(label.to_string());
            }
        }
        if line.contains(EVENT_TIME_ANCHOR) && anchors.event_time.is_none() {
            anchors.event_time = Some(value.to_string());
        }
    }

    anchors
}

fn build_record(anchors: Anchors) -> Result<AppointmentRecord, InvalidReason> {
    let invitee = anchors
        .invitee
        .ok_or(InvalidReason::MissingField("invitee"))?;
    let email = anchors
        .email
        .ok_or(InvalidReason::MissingField("invitee email"))?;
    let event_time = anchors
        .event_time
        .ok_or(InvalidReason::MissingField("event date/time"))?;

    let token = event_time.split('-').next().unwrap_or_default().trim();
    let time = parse_time_token(token)
        .ok_or_else(|| InvalidReason::MalformedTime(token.to_string()))?;
    let date = parse_event_date(&event_time)
        .ok_or_else(|| InvalidReason::MalformedDate(event_time.clone()))?;

    let mut record = AppointmentRecord::new(invitee, email, date, time);
    record.invitee_timezone = anchors.timezone;
    Ok(record)
}

// Compile-once regex patterns via OnceLock.
fn re_time_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(\d{1,2}):(\d{2})\s*([ap]m)?$").unwrap())
}

fn re_parenthetical() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)?").unwrap())
}

fn re_day_month_year() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "5 March 2025"
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]+),?\s+(\d{4})\b").unwrap()
    })
}

fn re_month_day_year() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "March 5, 2025"
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z]+)\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b").unwrap()
    })
}

/// Convert a booking-tool time token ("2:00pm", "02:00pm", "14:00") to
/// canonical `HH:MM:SS`.
///
/// pm adds twelve hours except at 12pm; 12am maps to 00.
pub fn parse_time_token(token: &str) -> Option<String> {
    let caps = re_time_token().captures(token.trim())?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if minute > 59 {
        return None;
    }

    match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            if meridiem == "pm" && hour != 12 {
                hour += 12;
            } else if meridiem == "am" && hour == 12 {
                hour = 0;
            }
        }
        None if hour > 23 => return None,
        None => {}
    }

    Some(format!("{:02}:{:02}:00", hour, minute))
}

/// Find the calendar date in an "Event Date/Time" value and return it as
/// `YYYY-MM-DD`. Parenthesised text (the time zone) is ignored.
pub fn parse_event_date(value: &str) -> Option<String> {
    let cleaned = re_parenthetical().replace_all(value, " ");

    let day_first = re_day_month_year()
        .captures_iter(&cleaned)
        .find_map(|caps| compose_date(&caps[1], &caps[2], &caps[3]));
    if day_first.is_some() {
        return day_first;
    }

    re_month_day_year()
        .captures_iter(&cleaned)
        .find_map(|caps| compose_date(&caps[2], &caps[1], &caps[3]))
}

fn compose_date(day: &str, month_name: &str, year: &str) -> Option<String> {
    let month = month_number(month_name)?;
    let day: u32 = day.parse().ok()?;
    let date = format!("{}-{}-{:02}", year, month, day);
    // Reject "31 February" and friends.
    chrono::NaiveDate::parse_from_str(&date, crate::types::DATE_FORMAT).ok()?;
    Some(date)
}

/// Two-digit month number for an English month name, any case.
pub fn month_number(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == lower)
        .map(|(_, number)| *number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(event_line: &str) -> String {
        format!(
            "Hi Nathan,\r\n\
             A new event has been scheduled.\r\n\
             Event Type:\r\n\
             50 Minute Tutorial\r\n\
             Invitee:\r\n\
             Jane Doe\r\n\
             Invitee Email:\r\n\
             j@x.com\r\n\
             Event Date/Time\r\n\
             {}\r\n\
             Invitee Time Zone:\r\n\
             Pacific Time - US\r\n\
             View event in Calendly\r\n\
             Pro Tip: share your link.\r\n",
            event_line
        )
    }

    #[test]
    fn test_end_to_end_scenario() {
        let text = body("2:00pm - 2:50pm, Wednesday, March 5, 2025 (Pacific Time)");
        let record = extract(&text).into_record().expect("appointment");
        assert_eq!(record.invitee, "Jane Doe");
        assert_eq!(record.invitee_email, "j@x.com");
        assert_eq!(record.date, "2025-03-05");
        assert_eq!(record.time, "14:00:00");
        assert_eq!(record.invitee_timezone.as_deref(), Some("Pacific Time"));
        assert!(!record.notified);
        assert!(record.meeting_join_url.is_none());
    }

    #[test]
    fn test_upstream_day_first_layout() {
        let text = body("02:00pm - 02:50pm (Pacific Time - US & Canada), Wednesday, 5 March 2025");
        let record = extract(&text).into_record().expect("appointment");
        assert_eq!(record.date, "2025-03-05");
        assert_eq!(record.time, "14:00:00");
    }

    #[test]
    fn test_extracted_values_are_canonical() {
        let text = body("9:30am - 10:20am (Pacific Time - US & Canada), Friday, 14 November 2025");
        let record = extract(&text).into_record().expect("appointment");
        let slot = record.slot().expect("canonical date and time");
        assert_eq!(slot.date.to_string(), "2025-11-14");
        assert_eq!(slot.day_of_week(), "Friday");
        assert_eq!(record.time, "09:30:00");
        assert!(record.is_valid());
    }

    #[test]
    fn test_missing_markers() {
        let without_start = body("2:00pm - 2:50pm, Wednesday, March 5, 2025")
            .replace("Event Type:", "Kind:");
        assert_eq!(
            extract(&without_start),
            Extraction::Invalid(InvalidReason::MissingMarkers)
        );

        let without_end = body("2:00pm - 2:50pm, Wednesday, March 5, 2025")
            .replace("View event in Calendly", "");
        assert_eq!(
            extract(&without_end),
            Extraction::Invalid(InvalidReason::MissingMarkers)
        );

        assert_eq!(
            extract("Your receipt from the bookstore"),
            Extraction::Invalid(InvalidReason::MissingMarkers)
        );
    }

    #[test]
    fn test_end_marker_before_start_is_invalid() {
        let text = "View event in Calendly\nInvitee:\nJane\nEvent Type:\nTutorial\n";
        assert_eq!(extract(text), Extraction::Invalid(InvalidReason::MissingMarkers));
    }

    #[test]
    fn test_missing_required_anchor() {
        let text = body("2:00pm - 2:50pm, Wednesday, March 5, 2025")
            .replace("Invitee Email:\r\nj@x.com\r\n", "");
        assert_eq!(
            extract(&text),
            Extraction::Invalid(InvalidReason::MissingField("invitee email"))
        );
    }

    #[test]
    fn test_timezone_is_optional() {
        let text = body("2:00pm - 2:50pm, Wednesday, March 5, 2025")
            .replace("Invitee Time Zone:\r\nPacific Time - US\r\n", "");
        let record = extract(&text).into_record().expect("appointment");
        assert!(record.invitee_timezone.is_none());
    }

    #[test]
    fn test_anchors_outside_window_are_ignored() {
        let text = format!(
            "Invitee:\nSomeone Else\n{}",
            body("2:00pm - 2:50pm, Wednesday, March 5, 2025")
        );
        let record = extract(&text).into_record().expect("appointment");
        assert_eq!(record.invitee, "Jane Doe");
    }

    #[test]
    fn test_soft_line_breaks_are_stripped() {
        let text = body("2:00pm - 2:50pm, Wednesday, March 5, 2025")
            .replace("Jane Doe\r\n", "Jane Doe=\r\n")
            .replace("j@x.com\r\n", "j@x.com=\r\n");
        let record = extract(&text).into_record().expect("appointment");
        assert_eq!(record.invitee, "Jane Doe");
        assert_eq!(record.invitee_email, "j@x.com");
    }

    #[test]
    fn test_unix_line_endings() {
        let text = body("2:00pm - 2:50pm, Wednesday, March 5, 2025").replace("\r\n", "\n");
        assert!(extract(&text).is_found());
    }

    #[test]
    fn test_custom_markers() {
        let extractor = Extractor::with_markers("BEGIN", "END");
        let text = "BEGIN\nInvitee:\nAl\nInvitee Email:\na@b.c\nEvent Date/Time\n\
                    10:00am - 10:50am, Monday, 3 March 2025\nEND";
        let record = extractor.extract(text).into_record().expect("appointment");
        assert_eq!(record.invitee, "Al");
        assert_eq!(record.date, "2025-03-03");
        assert_eq!(record.time, "10:00:00");
    }

    #[test]
    fn test_time_tokens() {
        assert_eq!(parse_time_token("2:00pm").as_deref(), Some("14:00:00"));
        assert_eq!(parse_time_token("02:00pm").as_deref(), Some("14:00:00"));
        assert_eq!(parse_time_token("12:00pm").as_deref(), Some("12:00:00"));
        assert_eq!(parse_time_token("9:00am").as_deref(), Some("09:00:00"));
        assert_eq!(parse_time_token("11:45PM").as_deref(), Some("23:45:00"));
        assert_eq!(parse_time_token("12:15am").as_deref(), Some("00:15:00"));
        assert_eq!(parse_time_token("14:05").as_deref(), Some("14:05:00"));
    }

    #[test]
    fn test_malformed_time_tokens() {
        assert_eq!(parse_time_token("2pm"), None);
        assert_eq!(parse_time_token("13:00pm"), None);
        assert_eq!(parse_time_token("9:75am"), None);
        assert_eq!(parse_time_token("noon"), None);

        let text = body("half past two - 2:50pm, Wednesday, March 5, 2025");
        assert_eq!(
            extract(&text),
            Extraction::Invalid(InvalidReason::MalformedTime("half past two".into()))
        );
    }

    #[test]
    fn test_event_dates() {
        assert_eq!(
            parse_event_date("2:00pm - 2:50pm, Wednesday, March 5, 2025 (Pacific Time)").as_deref(),
            Some("2025-03-05")
        );
        assert_eq!(
            parse_event_date("02:00pm - 02:50pm (Pacific Time - US & Canada), Monday, 17 february 2025")
                .as_deref(),
            Some("2025-02-17")
        );
        assert_eq!(
            parse_event_date("1:00pm - 1:50pm, Sunday, 1 June 2025").as_deref(),
            Some("2025-06-01")
        );
    }

    #[test]
    fn test_unknown_month_fails_closed() {
        assert_eq!(parse_event_date("2:00pm - 2:50pm, Wednesday, 5 Smarch 2025"), None);
        let text = body("2:00pm - 2:50pm, Wednesday, 5 Smarch 2025");
        assert!(matches!(
            extract(&text),
            Extraction::Invalid(InvalidReason::MalformedDate(_))
        ));
    }

    #[test]
    fn test_impossible_date_fails_closed() {
        assert_eq!(parse_event_date("2:00pm - 2:50pm, Friday, 31 February 2025"), None);
    }

    #[test]
    fn test_month_lookup() {
        assert_eq!(month_number("MARCH"), Some("03"));
        assert_eq!(month_number("december"), Some("12"));
        assert_eq!(month_number("Mar"), None);
    }

    #[test]
    fn test_quoted_printable_bullets() {
        let text = body("2:00pm - 2:50pm, Wednesday, March 5, 2025")
            .replace("Pacific Time - US", "Pacific Time =E2=80=A2 US");
        let record = extract(&text).into_record().expect("appointment");
        assert_eq!(record.invitee_timezone.as_deref(), Some("Pacific Time"));
    }
}
