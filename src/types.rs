//! Appointment data model.
//!
//! Dates and times are stored in their canonical string forms
//! (`YYYY-MM-DD`, `HH:MM:SS`) so the persisted ledger reads the same as the
//! values the extractor produced. [`Slot`] is the parsed view used for
//! comparisons and for rendering notification text.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Length of one tutoring session.
pub const SESSION_MINUTES: i64 = 50;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A booked tutoring session.
///
/// Equality and hashing use only the identity key `(invitee, date, time)`:
/// two records for the same person at the same slot are the same
/// appointment whatever their other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub invitee: String,
    pub invitee_email: String,
    #[serde(default)]
    pub invitee_timezone: Option<String>,
    /// Canonical `YYYY-MM-DD`
    pub date: String,
    /// Canonical 24-hour `HH:MM:SS`
    pub time: String,
    #[serde(default)]
    pub notified: bool,
    #[serde(default)]
    pub meeting_id: Option<String>,
    #[serde(default)]
    pub meeting_join_url: Option<String>,
    #[serde(default)]
    pub meeting_passcode: Option<String>,
}

/// Borrowed identity key of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppointmentKey<'a> {
    pub invitee: &'a str,
    pub date: &'a str,
    pub time: &'a str,
}

/// Meeting resource returned by the meeting creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetails {
    pub id: String,
    pub join_url: String,
    pub passcode: Option<String>,
}

impl AppointmentRecord {
    pub fn new(
        invitee: impl Into<String>,
        invitee_email: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            invitee: invitee.into(),
            invitee_email: invitee_email.into(),
            invitee_timezone: None,
            date: date.into(),
            time: time.into(),
            notified: false,
            meeting_id: None,
            meeting_join_url: None,
            meeting_passcode: None,
        }
    }

    pub fn key(&self) -> AppointmentKey<'_> {
        AppointmentKey {
            invitee: &self.invitee,
            date: &self.date,
            time: &self.time,
        }
    }

    /// Parsed calendar date, `None` if `date` is not canonical.
    pub fn date_value(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()
    }

    /// Parsed start time, `None` if `time` is not canonical.
    pub fn time_value(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, TIME_FORMAT).ok()
    }

    pub fn slot(&self) -> Option<Slot> {
        Some(Slot {
            date: self.date_value()?,
            time: self.time_value()?,
        })
    }

    /// Required fields present and date/time canonical.
    pub fn is_valid(&self) -> bool {
        !self.invitee.trim().is_empty()
            && !self.invitee_email.trim().is_empty()
            && self.slot().is_some()
    }

    pub fn has_meeting(&self) -> bool {
        self.meeting_join_url.is_some()
    }

    /// Copy meeting details in, unless a meeting is already linked.
    pub fn link_meeting(&mut self, meeting: MeetingDetails) -> bool {
        if self.has_meeting() {
            return false;
        }
        self.meeting_id = Some(meeting.id);
        self.meeting_join_url = Some(meeting.join_url);
        self.meeting_passcode = meeting.passcode;
        true
    }

    /// First word of the invitee's name, for greetings.
    pub fn first_name(&self) -> &str {
        self.invitee.split_whitespace().next().unwrap_or(&self.invitee)
    }
}

impl PartialEq for AppointmentRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AppointmentRecord {}

impl Hash for AppointmentRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for AppointmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_none(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("None")
        }
        writeln!(f, "Invitee: {}", self.invitee)?;
        writeln!(f, "Invitee Email: {}", self.invitee_email)?;
        writeln!(f, "Invitee Timezone: {}", or_none(&self.invitee_timezone))?;
        writeln!(f, "Event Start: {} {}", self.time, self.date)?;
        writeln!(f, "Meeting ID: {}", or_none(&self.meeting_id))?;
        writeln!(f, "Meeting Url: {}", or_none(&self.meeting_join_url))?;
        writeln!(f, "Meeting Passcode: {}", or_none(&self.meeting_passcode))?;
        write!(f, "Notified: {}", self.notified)
    }
}

/// Parsed date and start time of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Slot {
    /// "Wednesday"
    pub fn day_of_week(&self) -> String {
        self.date.format("%A").to_string()
    }

    /// "March"
    pub fn month_name(&self) -> String {
        self.date.format("%B").to_string()
    }

    /// "5th"
    pub fn ordinal_day(&self) -> String {
        ordinal_suffix(self.date.day())
    }

    /// "02:00 PM"
    pub fn standard_time(&self) -> String {
        self.time.format("%I:%M %p").to_string()
    }

    /// Start time plus one session length. Wraps past midnight.
    pub fn end_time(&self) -> NaiveTime {
        self.time + Duration::minutes(SESSION_MINUTES)
    }
}

/// Day of month with its English ordinal suffix.
pub fn ordinal_suffix(day: u32) -> String {
    let suffix = if (11..=13).contains(&(day % 100)) {
        "th"
    } else {
        match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{}{}", day, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> AppointmentRecord {
        AppointmentRecord::new("Jane Doe", "j@x.com", "2025-03-05", "14:00:00")
    }

    #[test]
    fn test_ordinal_suffixes() {
        let cases = [
            (1, "1st"),
            (2, "2nd"),
            (3, "3rd"),
            (4, "4th"),
            (11, "11th"),
            (12, "12th"),
            (13, "13th"),
            (21, "21st"),
            (22, "22nd"),
            (23, "23rd"),
            (30, "30th"),
            (31, "31st"),
        ];
        for (day, expected) in cases {
            assert_eq!(ordinal_suffix(day), expected, "day {}", day);
        }
    }

    #[test]
    fn test_slot_rendering() {
        let slot = jane().slot().expect("valid slot");
        assert_eq!(slot.day_of_week(), "Wednesday");
        assert_eq!(slot.month_name(), "March");
        assert_eq!(slot.ordinal_day(), "5th");
        assert_eq!(slot.standard_time(), "02:00 PM");
        assert_eq!(slot.end_time().format(TIME_FORMAT).to_string(), "14:50:00");
    }

    #[test]
    fn test_morning_standard_time() {
        let rec = AppointmentRecord::new("A", "a@x.com", "2025-03-05", "09:30:00");
        assert_eq!(rec.slot().unwrap().standard_time(), "09:30 AM");
    }

    #[test]
    fn test_end_time_wraps_midnight() {
        let rec = AppointmentRecord::new("A", "a@x.com", "2025-03-05", "23:30:00");
        assert_eq!(
            rec.slot().unwrap().end_time().format(TIME_FORMAT).to_string(),
            "00:20:00"
        );
    }

    #[test]
    fn test_equality_uses_identity_key_only() {
        let a = jane();
        let mut b = jane();
        b.invitee_email = "other@x.com".into();
        b.notified = true;
        assert_eq!(a, b);

        let mut c = jane();
        c.time = "15:00:00".into();
        assert_ne!(a, c);
    }

    #[test]
    fn test_validity() {
        assert!(jane().is_valid());
        assert!(!AppointmentRecord::new("", "j@x.com", "2025-03-05", "14:00:00").is_valid());
        assert!(!AppointmentRecord::new("Jane", "j@x.com", "2025-02-30", "14:00:00").is_valid());
        assert!(!AppointmentRecord::new("Jane", "j@x.com", "2025-03-05", "25:00:00").is_valid());
    }

    #[test]
    fn test_link_meeting_is_idempotent() {
        let mut rec = jane();
        assert!(rec.link_meeting(MeetingDetails {
            id: "1".into(),
            join_url: "https://zoom.us/j/1".into(),
            passcode: Some("abc".into()),
        }));
        assert!(!rec.link_meeting(MeetingDetails {
            id: "2".into(),
            join_url: "https://zoom.us/j/2".into(),
            passcode: None,
        }));
        assert_eq!(rec.meeting_id.as_deref(), Some("1"));
        assert_eq!(rec.meeting_passcode.as_deref(), Some("abc"));
    }

    #[test]
    fn test_first_name() {
        assert_eq!(jane().first_name(), "Jane");
    }

    #[test]
    fn test_display_lists_fields() {
        let text = jane().to_string();
        assert!(text.contains("Invitee: Jane Doe"));
        assert!(text.contains("Event Start: 14:00:00 2025-03-05"));
        assert!(text.ends_with("Notified: false"));
    }
}
