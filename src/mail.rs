//! Inbound mail sources.
//!
//! - `DirectoryMailSource`: `.eml`/`.txt` files under `<root>/<label>/`,
//!   handy for exported mail and for replaying fixtures.
//! - `GmailMailSource`: Gmail API v1, messages carrying a label, fetched
//!   with `format=raw` and decoded locally.
//!
//! Both hand back decoded text bodies; unreadable messages are skipped with
//! a debug log, not treated as a failed fetch.

use std::fs;
use std::path::{Path, PathBuf};

use mail_parser::MessageParser;
use serde::Deserialize;

use crate::collaborators::MailSource;
use crate::error::{status_error, ScheduleError};

const GMAIL_MESSAGES_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages";

/// Decode an RFC 5322 message to its text body.
///
/// Prefers `text/plain`; HTML-only messages are converted to text by the
/// parser.
pub fn decode_message(raw: &[u8]) -> Result<String, ScheduleError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ScheduleError::MessageParse("not an RFC 5322 message".to_string()))?;
    message
        .body_text(0)
        .map(|body| body.into_owned())
        .ok_or_else(|| ScheduleError::MessageParse("message has no text body".to_string()))
}

// ============================================================================
// Directory
// ============================================================================

#[derive(Debug, Clone)]
pub struct DirectoryMailSource {
    root: PathBuf,
}

impl DirectoryMailSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MailSource for DirectoryMailSource {
    fn fetch(&self, label: &str) -> Result<Vec<String>, ScheduleError> {
        let folder = self.root.join(label);
        if !folder.is_dir() {
            return Err(ScheduleError::MailFolderNotFound(folder));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&folder)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut bodies = Vec::with_capacity(paths.len());
        for path in &paths {
            match read_message_file(path) {
                Ok(Some(body)) => bodies.push(body),
                Ok(None) => {}
                Err(e) => log::debug!("Skipping {}: {}", path.display(), e),
            }
        }

        log::info!("Read {} messages from {}", bodies.len(), folder.display());
        Ok(bodies)
    }
}

fn read_message_file(path: &Path) -> Result<Option<String>, ScheduleError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("eml") => decode_message(&fs::read(path)?).map(Some),
        Some("txt") => Ok(Some(fs::read_to_string(path)?)),
        _ => Ok(None),
    }
}

// ============================================================================
// Gmail
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    raw: String,
}

pub struct GmailMailSource {
    client: reqwest::blocking::Client,
    access_token: String,
    max_results: u32,
}

impl GmailMailSource {
    pub fn new(access_token: impl Into<String>, max_results: u32) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            access_token: access_token.into(),
            max_results,
        }
    }

    /// Every message id under the label, following `nextPageToken`.
    /// `max_results` is the page size.
    fn list_ids(&self, label: &str) -> Result<Vec<String>, ScheduleError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let resp = self
                .client
                .get(GMAIL_MESSAGES_URL)
                .bearer_auth(&self.access_token)
                .query(&list_query(label, self.max_results, page_token.as_deref()))
                .send()?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(status_error("Gmail", status.as_u16(), body));
            }

            let list: MessageListResponse = resp.json()?;
            ids.extend(list.messages.into_iter().map(|m| m.id));

            page_token = list.next_page_token;
            if page_token.is_none() {
                break;
            }
            log::debug!("Fetched {} message ids, requesting next page", ids.len());
        }

        Ok(ids)
    }

    fn fetch_body(&self, id: &str) -> Result<String, ScheduleError> {
        let resp = self
            .client
            .get(format!("{}/{}", GMAIL_MESSAGES_URL, id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "raw")])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(status_error("Gmail", status.as_u16(), body));
        }

        let message: RawMessage = resp.json()?;
        let bytes = decode_url_safe_base64(&message.raw).ok_or_else(|| {
            ScheduleError::UnexpectedResponse {
                service: "Gmail",
                message: format!("message {} has undecodable raw data", id),
            }
        })?;
        decode_message(&bytes)
    }
}

impl MailSource for GmailMailSource {
    fn fetch(&self, label: &str) -> Result<Vec<String>, ScheduleError> {
        let ids = self.list_ids(label)?;
        let mut bodies = Vec::with_capacity(ids.len());

        for id in &ids {
            match self.fetch_body(id) {
                Ok(body) => bodies.push(body),
                Err(e) if e.requires_user_action() => return Err(e),
                Err(e) => {
                    log::debug!("Skipping message {}: {}", id, e);
                    continue;
                }
            }
        }

        log::info!("Fetched {} of {} messages labelled {}", bodies.len(), ids.len(), label);
        Ok(bodies)
    }
}

fn list_query(label: &str, page_size: u32, page_token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", label_query(label)),
        ("maxResults", page_size.to_string()),
    ];
    if let Some(token) = page_token {
        params.push(("pageToken", token.to_string()));
    }
    params
}

/// Gmail search for a label. Labels with spaces must be quoted.
fn label_query(label: &str) -> String {
    if label.contains(char::is_whitespace) {
        format!("label:\"{}\"", label)
    } else {
        format!("label:{}", label)
    }
}

/// Decode URL-safe base64 as used by the Gmail API, padded or not.
fn decode_url_safe_base64(data: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EML: &str = "From: Calendly <notifications@calendly.com>\r\n\
        To: tutor@example.com\r\n\
        Subject: New Event: Jane Doe\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        Content-Transfer-Encoding: quoted-printable\r\n\
        \r\n\
        Event Type:\r\n\
        50 Minute Tutorial\r\n\
        Invitee:\r\n\
        Jane Doe\r\n\
        View event in Calendly\r\n";

    #[test]
    fn test_decode_message_body() {
        let body = decode_message(EML.as_bytes()).expect("decoded");
        assert!(body.contains("Invitee:"));
        assert!(body.contains("Jane Doe"));
        assert!(!body.contains("Subject:"));
    }

    #[test]
    fn test_directory_source_reads_eml_and_txt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let folder = dir.path().join("Tutoring");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("a.eml"), EML).unwrap();
        fs::write(folder.join("b.txt"), "Event Type:\nplain text body").unwrap();
        fs::write(folder.join("c.png"), [0u8, 1, 2]).unwrap();

        let source = DirectoryMailSource::new(dir.path());
        let bodies = source.fetch("Tutoring").expect("fetch");
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("Jane Doe"));
        assert_eq!(bodies[1], "Event Type:\nplain text body");
    }

    #[test]
    fn test_directory_source_missing_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = DirectoryMailSource::new(dir.path());
        assert!(matches!(
            source.fetch("Nope"),
            Err(ScheduleError::MailFolderNotFound(_))
        ));
    }

    #[test]
    fn test_label_query() {
        assert_eq!(label_query("Tutoring"), "label:Tutoring");
        assert_eq!(label_query("Boot Camp"), "label:\"Boot Camp\"");
    }

    #[test]
    fn test_message_list_pages() {
        let json = r#"{
            "messages": [{"id": "msg1", "threadId": "t1"}, {"id": "msg2", "threadId": "t2"}],
            "nextPageToken": "token123"
        }"#;
        let resp: MessageListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.messages.len(), 2);
        assert_eq!(resp.next_page_token.as_deref(), Some("token123"));

        let last: MessageListResponse = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(last.messages.is_empty());
        assert!(last.next_page_token.is_none());
    }

    #[test]
    fn test_list_query_carries_page_token() {
        let first = list_query("Tutoring", 100, None);
        assert_eq!(
            first,
            vec![
                ("q", "label:Tutoring".to_string()),
                ("maxResults", "100".to_string())
            ]
        );
        let next = list_query("Tutoring", 100, Some("token123"));
        assert_eq!(next.last(), Some(&("pageToken", "token123".to_string())));
    }

    #[test]
    fn test_base64_padding_tolerated() {
        assert_eq!(decode_url_safe_base64("aGk").as_deref(), Some(&b"hi"[..]));
        assert_eq!(decode_url_safe_base64("aGk=").as_deref(), Some(&b"hi"[..]));
        assert_eq!(decode_url_safe_base64("***"), None);
    }
}
