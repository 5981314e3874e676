//! Seams to the outside services a confirmation run talks to.
//!
//! Each trait is synchronous: a run is one sequential batch, and the
//! adapters use blocking HTTP. Tests substitute in-memory fakes.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::ScheduleError;
use crate::types::{AppointmentRecord, MeetingDetails};

/// Yields decoded message bodies for a mail folder/label.
pub trait MailSource {
    fn fetch(&self, label: &str) -> Result<Vec<String>, ScheduleError>;
}

/// Creates the video meeting for an appointment.
pub trait MeetingCreator {
    fn create_meeting(&self, record: &AppointmentRecord) -> Result<MeetingDetails, ScheduleError>;
}

/// Puts an appointment on the tutor's calendar.
pub trait CalendarWriter {
    fn add_event(&self, record: &AppointmentRecord) -> Result<(), ScheduleError>;
}

/// Delivers one composed message.
pub trait NotificationSender {
    fn send(&self, message: &OutgoingMessage) -> Result<(), ScheduleError>;
}

/// A composed notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Email address, or a phone number for MMS delivery.
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<PathBuf>,
}

/// Calendar writer used when calendar insertion is turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCalendar;

impl CalendarWriter for NoCalendar {
    fn add_event(&self, record: &AppointmentRecord) -> Result<(), ScheduleError> {
        log::debug!("Calendar disabled, not adding {}", record.invitee);
        Ok(())
    }
}
