//! Configuration (`~/.tutor-confirm/config.json`)
//!
//! Every field has a serde default, so a config file only needs the keys
//! the user wants to change. Tokens are plain values here; obtaining and
//! refreshing them is left to the user.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::extract::{DEFAULT_END_MARKER, DEFAULT_START_MARKER};

/// Gateways that turn an email into an MMS for each US carrier.
pub const DEFAULT_MMS_GATEWAYS: &[&str] = &[
    "mms.att.net",         // AT&T / Cricket
    "tmomail.net",         // T-Mobile
    "vzwpix.com",          // Verizon Wireless
    "mypixmessages.com",   // Xfinity
    "vmpix.com",           // Virgin Mobile
    "mmst5.tracfone.com",  // Tracfone
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Mail folder/label holding booking notifications.
    pub label: String,
    pub mail_source: MailSourceKind,
    /// Root directory for `MailSourceKind::Directory`; `<mailDir>/<label>/`
    /// is scanned. Only checked when mail is fetched.
    pub mail_dir: Option<String>,
    pub gmail_token: Option<String>,
    /// Gmail list page size; every page under the label is read.
    pub max_messages: u32,

    pub start_marker: String,
    pub end_marker: String,

    /// Accept appointments dated before today.
    pub allow_backdate: bool,
    /// Notify appointments from today through this many days out.
    pub days_ahead: u32,
    pub state_path: Option<String>,

    pub zoom: ZoomConfig,
    pub calendar: CalendarConfig,
    pub delivery: DeliveryConfig,
    pub template: TemplateConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailSourceKind {
    Directory,
    Gmail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZoomConfig {
    pub access_token: Option<String>,
    pub duration_minutes: u32,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarConfig {
    pub enabled: bool,
    pub access_token: Option<String>,
    pub calendar_id: String,
    /// Added as an attendee next to the invitee.
    pub organizer_email: Option<String>,
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    Gmail,
    Outbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryConfig {
    pub kind: DeliveryKind,
    /// Falls back to the top-level `gmailToken`.
    pub gmail_token: Option<String>,
    pub from: Option<String>,
    pub cc: Option<String>,
    /// Image attached to every confirmation.
    pub attachment: Option<String>,
    pub outbox_dir: Option<String>,
    pub mms_gateways: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateConfig {
    /// Leads the subject line, e.g. "Cybersecurity Boot Camp".
    pub program: String,
    /// Printed after each time, e.g. "Pacific".
    pub timezone_label: String,
    pub signature: String,
    pub checklist: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label: "Tutoring".to_string(),
            mail_source: MailSourceKind::Directory,
            mail_dir: None,
            gmail_token: None,
            max_messages: 100,
            start_marker: DEFAULT_START_MARKER.to_string(),
            end_marker: DEFAULT_END_MARKER.to_string(),
            allow_backdate: false,
            days_ahead: 1,
            state_path: None,
            zoom: ZoomConfig::default(),
            calendar: CalendarConfig::default(),
            delivery: DeliveryConfig::default(),
            template: TemplateConfig::default(),
        }
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            duration_minutes: 60,
            timezone: "America/Los_Angeles".to_string(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            access_token: None,
            calendar_id: "primary".to_string(),
            organizer_email: None,
            timezone: "America/Los_Angeles".to_string(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            kind: DeliveryKind::Outbox,
            gmail_token: None,
            from: None,
            cc: None,
            attachment: None,
            outbox_dir: None,
            mms_gateways: DEFAULT_MMS_GATEWAYS.iter().map(|g| g.to_string()).collect(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            program: "Tutoring".to_string(),
            timezone_label: "Pacific".to_string(),
            signature: "Your Tutor".to_string(),
            checklist: vec![
                "Be online 5 minutes before your time slot.".to_string(),
                "Make sure your computer/mic/internet connection is working.".to_string(),
                "Make sure your workspace is quiet and free from interruptions.".to_string(),
            ],
        }
    }
}

impl Config {
    /// Ledger file, defaulting to ~/.tutor-confirm/ledger.json
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(crate::store::default_state_path)
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.delivery
            .outbox_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir().join("outbox"))
    }

    pub fn delivery_token(&self) -> Option<&str> {
        self.delivery
            .gmail_token
            .as_deref()
            .or(self.gmail_token.as_deref())
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.start_marker.trim().is_empty() || self.end_marker.trim().is_empty() {
            return Err(ScheduleError::ConfigurationError(
                "startMarker and endMarker must not be empty".to_string(),
            ));
        }
        if self.label.trim().is_empty() {
            return Err(ScheduleError::ConfigurationError(
                "label must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the state directory (~/.tutor-confirm)
pub fn state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tutor-confirm")
}

/// Get the canonical config file path (~/.tutor-confirm/config.json)
pub fn config_path() -> PathBuf {
    state_dir().join("config.json")
}

/// Load and validate configuration from `path`.
pub fn load_config(path: &Path) -> Result<Config, ScheduleError> {
    if !path.exists() {
        return Err(ScheduleError::ConfigurationError(format!(
            "Config file not found at {}. Create one with: tutor-confirm init",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content).map_err(|e| {
        ScheduleError::ConfigurationError(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    config.validate()?;

    Ok(config)
}

/// Write `config` to `path`, creating the parent directory.
pub fn save_config(config: &Config, path: &Path) -> Result<(), ScheduleError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
