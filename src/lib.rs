//! Tutoring-session confirmation.
//!
//! A run reads booking notifications from a mail folder, turns each into an
//! [`AppointmentRecord`], books a Zoom meeting and calendar event for it,
//! and sends a confirmation to the invitee before the session.

pub mod collaborators;
pub mod compose;
pub mod config;
mod error;
pub mod extract;
pub mod google_calendar;
pub mod ledger;
pub mod mail;
pub mod notify;
pub mod store;
pub mod types;
pub mod workflow;
pub mod zoom;

pub use error::{Rejection, ScheduleError};
pub use ledger::{Ledger, SharedLedger};
pub use types::{AppointmentRecord, MeetingDetails};
