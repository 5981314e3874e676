//! Outbound delivery.
//!
//! A recipient containing `@` is an email address. Anything else is read as
//! a phone number and fanned out to every configured MMS gateway, since the
//! carrier is unknown. CC is only applied to email recipients.
//!
//! - `GmailSender`: Gmail API `messages.send` with a locally built
//!   RFC 5322 message.
//! - `OutboxSender`: writes each message as JSON for dry runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use serde::Serialize;

use crate::collaborators::{NotificationSender, OutgoingMessage};
use crate::error::{status_error, ScheduleError};

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";
const MIME_BOUNDARY: &str = "tutor-confirm-boundary-7f3a9c";

/// Where one message actually goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
}

/// Expand a recipient into concrete addresses.
///
/// Returns an empty list for a value that is neither an email address nor
/// a phone number with at least ten digits.
pub fn resolve_recipients(
    to: &str,
    cc: Option<&str>,
    mms_gateways: &[String],
) -> Vec<Delivery> {
    let to = to.trim();
    if to.contains('@') {
        return vec![Delivery {
            to: to.to_string(),
            cc: cc.map(str::to_string),
        }];
    }

    let digits: String = to.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 10 {
        return Vec::new();
    }
    mms_gateways
        .iter()
        .map(|gateway| Delivery {
            to: format!("{}@{}", digits, gateway.trim_start_matches('@')),
            cc: None,
        })
        .collect()
}

// ============================================================================
// RFC 5322 message
// ============================================================================

/// Encode a header value as RFC 2047 when it is not plain ASCII.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!(
            "=?UTF-8?B?{}?=",
            base64::engine::general_purpose::STANDARD.encode(value)
        )
    }
}

fn image_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Build the raw message for one delivery.
pub fn build_mime(
    from: Option<&str>,
    delivery: &Delivery,
    message: &OutgoingMessage,
    attachment: Option<(&str, &[u8], &str)>,
) -> String {
    let mut out = String::new();
    if let Some(from) = from {
        out.push_str(&format!("From: {}\r\n", from));
    }
    out.push_str(&format!("To: {}\r\n", delivery.to));
    if let Some(ref cc) = delivery.cc {
        out.push_str(&format!("Cc: {}\r\n", cc));
    }
    out.push_str(&format!("Subject: {}\r\n", encode_header(&message.subject)));
    out.push_str("MIME-Version: 1.0\r\n");

    let text_part = format!(
        "Content-Type: text/plain; charset=\"utf-8\"\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}\r\n",
        message.body.replace('\n', "\r\n")
    );

    match attachment {
        None => out.push_str(&text_part),
        Some((name, bytes, content_type)) => {
            out.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
                MIME_BOUNDARY
            ));
            out.push_str(&format!("--{}\r\n{}", MIME_BOUNDARY, text_part));
            out.push_str(&format!(
                "--{}\r\nContent-Type: {}; name=\"{}\"\r\n\
                 Content-Disposition: attachment; filename=\"{}\"\r\n\
                 Content-Transfer-Encoding: base64\r\n\r\n",
                MIME_BOUNDARY, content_type, name, name
            ));
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            for chunk in encoded.as_bytes().chunks(76) {
                out.push_str(&String::from_utf8_lossy(chunk));
                out.push_str("\r\n");
            }
            out.push_str(&format!("--{}--\r\n", MIME_BOUNDARY));
        }
    }

    out
}

// ============================================================================
// Gmail
// ============================================================================

#[derive(Debug, Serialize)]
struct SendRequest {
    raw: String,
}

pub struct GmailSender {
    client: reqwest::blocking::Client,
    access_token: String,
    from: Option<String>,
    mms_gateways: Vec<String>,
}

impl GmailSender {
    pub fn new(
        access_token: impl Into<String>,
        from: Option<String>,
        mms_gateways: Vec<String>,
    ) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            access_token: access_token.into(),
            from,
            mms_gateways,
        }
    }

    fn send_raw(&self, raw: &str) -> Result<(), ScheduleError> {
        let request = SendRequest {
            raw: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw),
        };
        let resp = self
            .client
            .post(GMAIL_SEND_URL)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(status_error("Gmail", status.as_u16(), body));
        }
        Ok(())
    }
}

impl NotificationSender for GmailSender {
    fn send(&self, message: &OutgoingMessage) -> Result<(), ScheduleError> {
        let deliveries =
            resolve_recipients(&message.to, message.cc.as_deref(), &self.mms_gateways);
        if deliveries.is_empty() {
            return Err(ScheduleError::ConfigurationError(format!(
                "cannot deliver to '{}'",
                message.to
            )));
        }

        let attachment = match message.attachment {
            Some(ref path) => Some((attachment_name(path), fs::read(path)?, image_content_type(path))),
            None => None,
        };

        let results = deliveries.iter().map(|delivery| {
            let raw = build_mime(
                self.from.as_deref(),
                delivery,
                message,
                attachment
                    .as_ref()
                    .map(|(name, bytes, ct)| (name.as_str(), bytes.as_slice(), *ct)),
            );
            let result = self.send_raw(&raw);
            if let Err(ref e) = result {
                log::warn!("Failed to send to {}: {}", delivery.to, e);
            }
            result
        });
        settle(results.collect())
    }
}

/// Outcome of a fan-out: delivered once any address accepted the message.
///
/// A phone number goes to every carrier gateway and only the subscriber's
/// own carrier will take it, so failures at the others are expected.
/// Returns the first error only when nothing went out.
fn settle(results: Vec<Result<(), ScheduleError>>) -> Result<(), ScheduleError> {
    let mut first_error = None;
    for result in results {
        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string())
}

// ============================================================================
// Outbox
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboxEntry<'a> {
    deliveries: Vec<Delivery>,
    message: &'a OutgoingMessage,
}

/// Writes messages to `<dir>/<timestamp>-<n>-<recipient>.json` instead of
/// sending them.
pub struct OutboxSender {
    dir: PathBuf,
    mms_gateways: Vec<String>,
    counter: AtomicUsize,
}

impl OutboxSender {
    pub fn new(dir: impl Into<PathBuf>, mms_gateways: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            mms_gateways,
            counter: AtomicUsize::new(0),
        }
    }
}

impl NotificationSender for OutboxSender {
    fn send(&self, message: &OutgoingMessage) -> Result<(), ScheduleError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        let entry = OutboxEntry {
            deliveries: resolve_recipients(&message.to, message.cc.as_deref(), &self.mms_gateways),
            message,
        };
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{:03}-{}.json",
            chrono::Local::now().format("%Y%m%dT%H%M%S"),
            n,
            slugify(&message.to)
        );
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(&entry)?)?;

        log::info!("Queued message for {} at {}", message.to, path.display());
        Ok(())
    }
}

/// Convert a recipient to a filename-safe kebab-case slug.
///
/// Example: "Jane.Doe@x.com" → "jane-doe-x-com"
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
