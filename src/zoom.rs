//! Zoom meeting creation (REST API v2).

use serde::{Deserialize, Serialize};

use crate::collaborators::MeetingCreator;
use crate::config::ZoomConfig;
use crate::error::{status_error, ScheduleError};
use crate::types::{AppointmentRecord, MeetingDetails};

const ZOOM_MEETINGS_URL: &str = "https://api.zoom.us/v2/users/me/meetings";

/// Zoom meeting type 2: scheduled meeting.
const SCHEDULED_MEETING: u8 = 2;

#[derive(Debug, Serialize)]
struct MeetingRequest {
    topic: String,
    #[serde(rename = "type")]
    meeting_type: u8,
    /// Local wall-clock time; Zoom applies `timezone`.
    start_time: String,
    duration: u32,
    timezone: String,
    settings: MeetingSettings,
}

#[derive(Debug, Serialize)]
struct MeetingSettings {
    host_video: bool,
    participant_video: bool,
    waiting_room: bool,
}

#[derive(Debug, Deserialize)]
struct MeetingResponse {
    id: serde_json::Value,
    #[serde(default)]
    join_url: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

pub struct ZoomMeetings {
    client: reqwest::blocking::Client,
    access_token: String,
    duration_minutes: u32,
    timezone: String,
}

impl ZoomMeetings {
    pub fn from_config(config: &ZoomConfig) -> Result<Self, ScheduleError> {
        let access_token = config
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ScheduleError::MissingToken("Zoom"))?;
        Ok(Self {
            client: reqwest::blocking::Client::new(),
            access_token,
            duration_minutes: config.duration_minutes,
            timezone: config.timezone.clone(),
        })
    }

    fn request_for(&self, record: &AppointmentRecord) -> MeetingRequest {
        MeetingRequest {
            topic: format!("Tutoring Session With {}", record.invitee),
            meeting_type: SCHEDULED_MEETING,
            start_time: format!("{}T{}", record.date, record.time),
            duration: self.duration_minutes,
            timezone: self.timezone.clone(),
            settings: MeetingSettings {
                host_video: true,
                participant_video: true,
                waiting_room: true,
            },
        }
    }
}

impl MeetingCreator for ZoomMeetings {
    fn create_meeting(&self, record: &AppointmentRecord) -> Result<MeetingDetails, ScheduleError> {
        let resp = self
            .client
            .post(ZOOM_MEETINGS_URL)
            .bearer_auth(&self.access_token)
            .json(&self.request_for(record))
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(status_error("Zoom", status.as_u16(), body));
        }

        let meeting: MeetingResponse = resp.json()?;
        into_details(meeting)
    }
}

fn into_details(meeting: MeetingResponse) -> Result<MeetingDetails, ScheduleError> {
    // Zoom returns the id as a number; older payloads used a string.
    let id = match meeting.id {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s,
        other => {
            return Err(ScheduleError::UnexpectedResponse {
                service: "Zoom",
                message: format!("meeting id {}", other),
            })
        }
    };
    let join_url = meeting
        .join_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ScheduleError::UnexpectedResponse {
            service: "Zoom",
            message: "meeting has no join_url".to_string(),
        })?;

    Ok(MeetingDetails {
        id,
        join_url,
        passcode: meeting.password.filter(|p| !p.is_empty()),
    })
}
