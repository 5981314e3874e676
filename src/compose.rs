//! Confirmation message text.

use std::path::PathBuf;

use crate::collaborators::OutgoingMessage;
use crate::config::TemplateConfig;
use crate::types::AppointmentRecord;

/// Who gets copied and what is attached, on top of the template.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub cc: Option<String>,
    pub attachment: Option<PathBuf>,
}

/// "Wednesday, March 5th, at 02:00 PM, Pacific"
fn session_phrase(record: &AppointmentRecord, template: &TemplateConfig) -> Option<String> {
    let slot = record.slot()?;
    Some(format!(
        "{}, {} {}, at {}, {}",
        slot.day_of_week(),
        slot.month_name(),
        slot.ordinal_day(),
        slot.standard_time(),
        template.timezone_label
    ))
}

/// Compose the confirmation for one appointment.
///
/// Returns `None` for a record without a valid date/time.
pub fn confirmation(
    record: &AppointmentRecord,
    template: &TemplateConfig,
    envelope: &Envelope,
) -> Option<OutgoingMessage> {
    let when = session_phrase(record, template)?;
    let subject = format!("{} - Tutorial Confirmation - {}.", template.program, when);

    let mut body = format!(
        "Hi {}!\n\
         Thank you for scheduling your session with me. I am looking forward to our session on {}.\n\n\
         If something comes up and the scheduled time will not work, let me know a minimum of \
         6 hours before the appointment time and we'll figure something out.\n\n",
        record.first_name(),
        when
    );

    match record.meeting_join_url.as_deref() {
        Some(url) => {
            body.push_str(&format!(
                "This session will take place here:\n\nJoin Zoom Meeting\n{}\n\n",
                url
            ));
            if let Some(ref id) = record.meeting_id {
                body.push_str(&format!("Meeting ID: {}\n", id));
            }
            if let Some(ref passcode) = record.meeting_passcode {
                body.push_str(&format!("Passcode: {}\n", passcode));
            }
            body.push_str(
                "\n(If you have not used Zoom before please join the meeting at least 15 minutes \
                 early because it may have you download and install some software.)\n\n",
            );
        }
        None => body.push_str("I will send the meeting link separately.\n\n"),
    }

    if !template.checklist.is_empty() {
        body.push_str("Again, all I need from you:\n");
        for item in &template.checklist {
            body.push_str(&format!("- {}\n", item));
        }
        body.push('\n');
    }

    body.push_str("Email me with any questions. I'm looking forward to our meeting!\n\n");
    if envelope.cc.is_some() {
        body.push_str("Please Reply All to this email so that I know you have seen it.\n\n");
    }
    body.push_str(&format!("Sincerely,\n{}\n", template.signature));

    Some(OutgoingMessage {
        to: record.invitee_email.clone(),
        subject,
        body,
        cc: envelope.cc.clone(),
        attachment: envelope.attachment.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked_record() -> AppointmentRecord {
        let mut record = AppointmentRecord::new("Jane Doe", "j@x.com", "2025-03-05", "14:00:00");
        record.meeting_id = Some("85746352411".into());
        record.meeting_join_url = Some("https://zoom.us/j/85746352411".into());
        record.meeting_passcode = Some("x1y2".into());
        record
    }

    fn template() -> TemplateConfig {
        TemplateConfig {
            program: "Cybersecurity Boot Camp".into(),
            signature: "Nate".into(),
            ..TemplateConfig::default()
        }
    }

    #[test]
    fn test_subject_line() {
        let msg = confirmation(&linked_record(), &template(), &Envelope::default()).unwrap();
        assert_eq!(
            msg.subject,
            "Cybersecurity Boot Camp - Tutorial Confirmation - Wednesday, March 5th, at 02:00 PM, Pacific."
        );
        assert_eq!(msg.to, "j@x.com");
    }

    #[test]
    fn test_body_carries_meeting_details() {
        let msg = confirmation(&linked_record(), &template(), &Envelope::default()).unwrap();
        assert!(msg.body.starts_with("Hi Jane!\n"));
        assert!(msg.body.contains("https://zoom.us/j/85746352411"));
        assert!(msg.body.contains("Meeting ID: 85746352411"));
        assert!(msg.body.contains("Passcode: x1y2"));
        assert!(msg.body.contains("- Make sure your workspace is quiet"));
        assert!(msg.body.trim_end().ends_with("Sincerely,\nNate"));
        assert!(!msg.body.contains("Reply All"));
    }

    #[test]
    fn test_cc_asks_for_reply_all() {
        let envelope = Envelope {
            cc: Some("support@example.com".into()),
            attachment: None,
        };
        let msg = confirmation(&linked_record(), &template(), &envelope).unwrap();
        assert_eq!(msg.cc.as_deref(), Some("support@example.com"));
        assert!(msg.body.contains("Reply All"));
    }

    #[test]
    fn test_without_meeting_link() {
        let record = AppointmentRecord::new("Al", "a@x.com", "2025-03-05", "09:00:00");
        let msg = confirmation(&record, &template(), &Envelope::default()).unwrap();
        assert!(msg.body.contains("meeting link separately"));
        assert!(!msg.body.contains("Passcode"));
    }

    #[test]
    fn test_body_layout() {
        let template = TemplateConfig {
            checklist: Vec::new(),
            ..template()
        };
        let record = AppointmentRecord::new("Al Smith", "a@x.com", "2025-03-05", "09:00:00");
        let msg = confirmation(&record, &template, &Envelope::default()).unwrap();
        assert_eq!(
            msg.body,
            "Hi Al!\n\
             Thank you for scheduling your session with me. I am looking forward to our session on \
             Wednesday, March 5th, at 09:00 AM, Pacific.\n\n\
             If something comes up and the scheduled time will not work, let me know a minimum of \
             6 hours before the appointment time and we'll figure something out.\n\n\
             I will send the meeting link separately.\n\n\
             Email me with any questions. I'm looking forward to our meeting!\n\n\
             Sincerely,\nNate\n"
        );
    }

    #[test]
    fn test_invalid_record_not_composed() {
        let record = AppointmentRecord::new("Al", "a@x.com", "someday", "09:00:00");
        assert!(confirmation(&record, &template(), &Envelope::default()).is_none());
    }
}
