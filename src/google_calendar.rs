//! Google Calendar API v3 event insertion.

use serde::Serialize;

use crate::collaborators::CalendarWriter;
use crate::config::CalendarConfig;
use crate::error::{status_error, ScheduleError};
use crate::types::{AppointmentRecord, TIME_FORMAT};

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3/calendars";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest {
    summary: String,
    description: String,
    start: EventDateTime,
    end: EventDateTime,
    attendees: Vec<Attendee>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct Attendee {
    email: String,
}

pub struct GoogleCalendar {
    client: reqwest::blocking::Client,
    access_token: String,
    calendar_id: String,
    organizer_email: Option<String>,
    timezone: String,
}

impl GoogleCalendar {
    pub fn from_config(config: &CalendarConfig) -> Result<Self, ScheduleError> {
        let access_token = config
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ScheduleError::MissingToken("Google Calendar"))?;
        Ok(Self {
            client: reqwest::blocking::Client::new(),
            access_token,
            calendar_id: config.calendar_id.clone(),
            organizer_email: config.organizer_email.clone(),
            timezone: config.timezone.clone(),
        })
    }

    fn request_for(&self, record: &AppointmentRecord) -> Result<EventRequest, ScheduleError> {
        let slot = record.slot().ok_or_else(|| {
            ScheduleError::ConfigurationError(format!(
                "appointment for {} has no valid date/time",
                record.invitee
            ))
        })?;
        let end = slot.end_time().format(TIME_FORMAT);

        let mut attendees = vec![Attendee {
            email: record.invitee_email.clone(),
        }];
        if let Some(ref organizer) = self.organizer_email {
            attendees.push(Attendee {
                email: organizer.clone(),
            });
        }

        Ok(EventRequest {
            summary: format!("Tutoring Event With {}!", record.invitee),
            description: format!(
                "Meeting with {}.\nEmail Address: {}\nInvitee timezone: {}\nZoom Link: {}",
                record.invitee,
                record.invitee_email,
                record.invitee_timezone.as_deref().unwrap_or("unknown"),
                record.meeting_join_url.as_deref().unwrap_or("none"),
            ),
            start: EventDateTime {
                date_time: format!("{}T{}", record.date, record.time),
                time_zone: self.timezone.clone(),
            },
            end: EventDateTime {
                date_time: format!("{}T{}", record.date, end),
                time_zone: self.timezone.clone(),
            },
            attendees,
        })
    }
}

impl CalendarWriter for GoogleCalendar {
    fn add_event(&self, record: &AppointmentRecord) -> Result<(), ScheduleError> {
        let url = format!("{}/{}/events", CALENDAR_API, self.calendar_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&self.request_for(record)?)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(status_error("Google Calendar", status.as_u16(), body));
        }
        Ok(())
    }
}
