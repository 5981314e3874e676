//! Confirmation run: inbound mail → ledger → outbound confirmations.
//!
//! One run:
//! 1. Retention sweep (at most once per day)
//! 2. Fetch labelled mail, extract appointments, book each one
//! 3. Send confirmations for unnotified appointments in the window
//!
//! Booking order per appointment: meeting → calendar → ledger insert. The
//! ledger insert is the commit point. A failed meeting aborts the booking;
//! a failed calendar insert is logged and the appointment is still booked.

use chrono::NaiveDate;

use crate::collaborators::{CalendarWriter, MailSource, MeetingCreator, NotificationSender};
use crate::compose::{self, Envelope};
use crate::config::TemplateConfig;
use crate::error::{Rejection, ScheduleError};
use crate::extract::{Extraction, Extractor};
use crate::ledger::{Ledger, SharedLedger};
use crate::types::AppointmentRecord;

/// What happened to one offered appointment.
#[derive(Debug)]
pub enum BookingOutcome {
    Booked { calendar_added: bool },
    Rejected(Rejection),
    Failed(ScheduleError),
}

/// Book one appointment: create its meeting and calendar entry, then
/// insert it.
///
/// Rejections are decided before any external call, so duplicates never
/// create a second meeting.
pub fn book(
    ledger: &mut Ledger,
    mut record: AppointmentRecord,
    meetings: &dyn MeetingCreator,
    calendar: &dyn CalendarWriter,
    today: NaiveDate,
    allow_backdate: bool,
) -> BookingOutcome {
    if let Err(rejection) = ledger.admit(&record, today, allow_backdate) {
        log::debug!("Not booking {} on {}: {}", record.invitee, record.date, rejection);
        return BookingOutcome::Rejected(rejection);
    }

    if !record.has_meeting() {
        match meetings.create_meeting(&record) {
            Ok(meeting) => {
                record.link_meeting(meeting);
            }
            Err(e) => {
                log::warn!("Meeting creation failed for {}: {}", record.invitee, e);
                return BookingOutcome::Failed(e);
            }
        }
    }

    let calendar_added = match calendar.add_event(&record) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Calendar insert failed for {}: {}", record.invitee, e);
            false
        }
    };

    let scheduled = record
        .slot()
        .map(|s| format!("{} {}", s.month_name(), s.ordinal_day()))
        .unwrap_or_else(|| record.date.clone());
    let invitee = record.invitee.clone();

    match ledger.insert_as_of(record, today, allow_backdate) {
        Ok(()) => {
            log::info!("{} has been scheduled for {}.", invitee, scheduled);
            BookingOutcome::Booked { calendar_added }
        }
        Err(rejection) => BookingOutcome::Rejected(rejection),
    }
}

/// [`book`] with the ledger lock held for the whole sequence.
pub fn book_shared(
    ledger: &SharedLedger,
    record: AppointmentRecord,
    meetings: &dyn MeetingCreator,
    calendar: &dyn CalendarWriter,
    today: NaiveDate,
    allow_backdate: bool,
) -> BookingOutcome {
    ledger.with(|l| book(l, record, meetings, calendar, today, allow_backdate))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub messages: usize,
    pub not_appointments: usize,
    pub booked: usize,
    pub duplicates: usize,
    pub stale: usize,
    pub invalid: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotifySummary {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// `None` when cleanup already ran today.
    pub cleaned: Option<usize>,
    pub ingest: IngestSummary,
    pub notify: NotifySummary,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub label: String,
    pub days_ahead: u32,
    pub allow_backdate: bool,
}

/// Collaborators for one run.
pub struct Pipeline<'a> {
    pub extractor: &'a Extractor,
    pub mail: &'a dyn MailSource,
    pub meetings: &'a dyn MeetingCreator,
    pub calendar: &'a dyn CalendarWriter,
    pub sender: &'a dyn NotificationSender,
    pub template: &'a TemplateConfig,
    pub envelope: &'a Envelope,
}

impl Pipeline<'_> {
    pub fn run(
        &self,
        ledger: &mut Ledger,
        options: &RunOptions,
        today: NaiveDate,
    ) -> Result<RunSummary, ScheduleError> {
        let cleaned = ledger.check_for_cleanup_as_of(today);
        if let Some(count) = cleaned {
            log::info!("{} old appointments cleared", count);
        }

        let ingest = self.ingest(ledger, options, today)?;
        let notify = self.send_due(ledger, options.days_ahead, today);

        Ok(RunSummary {
            cleaned,
            ingest,
            notify,
        })
    }

    /// Fetch, extract and book everything under the label.
    pub fn ingest(
        &self,
        ledger: &mut Ledger,
        options: &RunOptions,
        today: NaiveDate,
    ) -> Result<IngestSummary, ScheduleError> {
        let messages = self.mail.fetch(&options.label)?;
        let mut summary = IngestSummary {
            messages: messages.len(),
            ..IngestSummary::default()
        };

        for message in &messages {
            let record = match self.extractor.extract(message) {
                Extraction::Found(record) => record,
                Extraction::Invalid(reason) => {
                    log::debug!("Skipping message: {:?}", reason);
                    summary.not_appointments += 1;
                    continue;
                }
            };

            match book(
                ledger,
                record,
                self.meetings,
                self.calendar,
                today,
                options.allow_backdate,
            ) {
                BookingOutcome::Booked { .. } => summary.booked += 1,
                BookingOutcome::Rejected(Rejection::Duplicate) => summary.duplicates += 1,
                BookingOutcome::Rejected(Rejection::Stale) => summary.stale += 1,
                BookingOutcome::Rejected(Rejection::Invalid) => summary.invalid += 1,
                BookingOutcome::Failed(e) if e.requires_user_action() => return Err(e),
                BookingOutcome::Failed(_) => summary.failed += 1,
            }
        }

        log::info!(
            "Processed {} messages: {} booked, {} already known, {} past, {} failed",
            summary.messages,
            summary.booked,
            summary.duplicates,
            summary.stale,
            summary.failed
        );
        Ok(summary)
    }

    /// Send confirmations for everything due and mark what went out.
    pub fn send_due(&self, ledger: &mut Ledger, days_ahead: u32, today: NaiveDate) -> NotifySummary {
        let due = ledger.due_as_of(today, days_ahead);
        let mut summary = NotifySummary {
            due: due.len(),
            ..NotifySummary::default()
        };

        for record in &due {
            let Some(message) = compose::confirmation(record, self.template, self.envelope) else {
                summary.failed += 1;
                continue;
            };

            match self.sender.send(&message) {
                Ok(()) => {
                    log::info!("{} is receiving an email!", record.invitee);
                    ledger.mark_notified(record);
                    summary.sent += 1;
                }
                Err(e) => {
                    log::warn!("Confirmation to {} failed: {}", record.invitee_email, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
