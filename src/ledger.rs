//! Appointment ledger.
//!
//! Owns every known appointment plus the date of the last retention sweep.
//! Lookups, dedup and removal all go through the identity key
//! `(invitee, date, time)`; dates are compared as plain calendar dates with
//! no time-zone adjustment.
//!
//! Each operation that depends on "today" has an `*_as_of` twin taking the
//! date explicitly; the plain form reads the local clock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, Duration, Local, NaiveDate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Rejection;
use crate::types::{AppointmentKey, AppointmentRecord, MeetingDetails};

/// Local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    appointments: Vec<AppointmentRecord>,
    last_cleanup_date: NaiveDate,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::new_as_of(today())
    }

    pub fn new_as_of(today: NaiveDate) -> Self {
        Self {
            appointments: Vec::new(),
            last_cleanup_date: today,
        }
    }

    pub fn appointments(&self) -> &[AppointmentRecord] {
        &self.appointments
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    pub fn last_cleanup_date(&self) -> NaiveDate {
        self.last_cleanup_date
    }

    // ---------------------------------------------------------------------
    // Insertion
    // ---------------------------------------------------------------------

    /// Check whether `record` may be inserted, without inserting it.
    pub fn admit(
        &self,
        record: &AppointmentRecord,
        today: NaiveDate,
        allow_backdate: bool,
    ) -> Result<(), Rejection> {
        let Some(date) = record.date_value().filter(|_| record.is_valid()) else {
            return Err(Rejection::Invalid);
        };
        if date < today && !allow_backdate {
            return Err(Rejection::Stale);
        }
        if self.contains(record) {
            return Err(Rejection::Duplicate);
        }
        Ok(())
    }

    /// Insert a record dated today or later. Returns `false` if it was
    /// invalid, stale, or already present.
    pub fn insert(&mut self, record: AppointmentRecord) -> bool {
        self.insert_as_of(record, today(), false).is_ok()
    }

    pub fn insert_as_of(
        &mut self,
        record: AppointmentRecord,
        today: NaiveDate,
        allow_backdate: bool,
    ) -> Result<(), Rejection> {
        self.admit(&record, today, allow_backdate)?;
        self.appointments.push(record);
        Ok(())
    }

    pub fn contains(&self, record: &AppointmentRecord) -> bool {
        self.find(record.key()).is_some()
    }

    // ---------------------------------------------------------------------
    // Date windows
    // ---------------------------------------------------------------------

    pub fn on_date(&self, date: NaiveDate) -> Vec<&AppointmentRecord> {
        self.filter_dates(|d| d == date)
    }

    pub fn before_date(&self, date: NaiveDate) -> Vec<&AppointmentRecord> {
        self.filter_dates(|d| d < date)
    }

    pub fn after_date(&self, date: NaiveDate) -> Vec<&AppointmentRecord> {
        self.filter_dates(|d| d > date)
    }

    pub fn today(&self) -> Vec<&AppointmentRecord> {
        self.on_date(today())
    }

    pub fn tomorrow(&self) -> Vec<&AppointmentRecord> {
        self.on_date(today() + Duration::days(1))
    }

    pub fn yesterday(&self) -> Vec<&AppointmentRecord> {
        self.on_date(today() - Duration::days(1))
    }

    /// Today and later.
    pub fn upcoming(&self) -> Vec<&AppointmentRecord> {
        self.after_date(today() - Duration::days(1))
    }

    fn filter_dates(&self, keep: impl Fn(NaiveDate) -> bool) -> Vec<&AppointmentRecord> {
        self.appointments
            .iter()
            .filter(|r| r.date_value().is_some_and(&keep))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Notification state
    // ---------------------------------------------------------------------

    /// Unnotified appointments from today through `days_ahead` days out.
    pub fn due_for_notification(&self, days_ahead: u32) -> Vec<AppointmentRecord> {
        self.due_as_of(today(), days_ahead)
    }

    pub fn due_as_of(&self, today: NaiveDate, days_ahead: u32) -> Vec<AppointmentRecord> {
        let end = today
            .checked_add_days(Days::new(days_ahead.into()))
            .unwrap_or(NaiveDate::MAX);
        self.filter_dates(|d| d >= today && d <= end)
            .into_iter()
            .filter(|r| !r.notified)
            .cloned()
            .collect()
    }

    pub fn mark_notified(&mut self, record: &AppointmentRecord) -> bool {
        match self.find_mut(record.key()) {
            Some(stored) => {
                stored.notified = true;
                true
            }
            None => false,
        }
    }

    /// Attach meeting details to a stored appointment that has none yet.
    pub fn set_meeting(&mut self, record: &AppointmentRecord, meeting: MeetingDetails) -> bool {
        self.find_mut(record.key())
            .is_some_and(|stored| stored.link_meeting(meeting))
    }

    // ---------------------------------------------------------------------
    // Lookup and removal
    // ---------------------------------------------------------------------

    pub fn remove(&mut self, record: &AppointmentRecord) -> bool {
        let before = self.appointments.len();
        let key = record.key();
        self.appointments.retain(|r| r.key() != key);
        self.appointments.len() != before
    }

    /// Case-insensitive substring match on the invitee name.
    pub fn search_by_name(&self, name: &str) -> Vec<&AppointmentRecord> {
        let needle = name.to_lowercase();
        self.appointments
            .iter()
            .filter(|r| r.invitee.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn search_exact(&self, invitee: &str, date: &str, time: &str) -> Option<&AppointmentRecord> {
        self.find(AppointmentKey {
            invitee,
            date,
            time,
        })
    }

    fn find(&self, key: AppointmentKey<'_>) -> Option<&AppointmentRecord> {
        self.appointments.iter().find(|r| r.key() == key)
    }

    fn find_mut(&mut self, key: AppointmentKey<'_>) -> Option<&mut AppointmentRecord> {
        self.appointments.iter_mut().find(|r| r.key() == key)
    }

    // ---------------------------------------------------------------------
    // Retention
    // ---------------------------------------------------------------------

    /// Drop every appointment dated before today. Returns how many went.
    pub fn cleanup(&mut self) -> usize {
        self.cleanup_as_of(today())
    }

    pub fn cleanup_as_of(&mut self, today: NaiveDate) -> usize {
        let before = self.appointments.len();
        self.appointments
            .retain(|r| r.date_value().is_some_and(|d| d >= today));
        self.last_cleanup_date = today;
        before - self.appointments.len()
    }

    /// Run cleanup at most once per calendar day.
    pub fn check_for_cleanup(&mut self) -> Option<usize> {
        self.check_for_cleanup_as_of(today())
    }

    pub fn check_for_cleanup_as_of(&mut self, today: NaiveDate) -> Option<usize> {
        if self.last_cleanup_date < today {
            Some(self.cleanup_as_of(today))
        } else {
            None
        }
    }

    /// Forget every appointment.
    pub fn clear(&mut self) -> usize {
        let count = self.appointments.len();
        self.appointments.clear();
        count
    }

    /// Collapse records sharing an identity key into the first one. A copy
    /// that was already notified, or already has a meeting, passes that on.
    /// Used after loading from disk.
    pub(crate) fn dedup_keys(&mut self) -> usize {
        let before = self.appointments.len();
        let mut kept: Vec<AppointmentRecord> = Vec::with_capacity(before);
        let mut index: HashMap<(String, String, String), usize> = HashMap::new();

        for record in std::mem::take(&mut self.appointments) {
            let key = (
                record.invitee.clone(),
                record.date.clone(),
                record.time.clone(),
            );
            match index.get(&key) {
                Some(&i) => {
                    let first = &mut kept[i];
                    first.notified |= record.notified;
                    if let (false, Some(join_url)) = (first.has_meeting(), record.meeting_join_url) {
                        first.link_meeting(MeetingDetails {
                            id: record.meeting_id.unwrap_or_default(),
                            join_url,
                            passcode: record.meeting_passcode,
                        });
                    }
                }
                None => {
                    index.insert(key, kept.len());
                    kept.push(record);
                }
            }
        }

        self.appointments = kept;
        before - self.appointments.len()
    }

    /// Drop records that no longer validate. Used after loading from disk.
    pub(crate) fn retain_valid(&mut self) -> usize {
        let before = self.appointments.len();
        self.appointments.retain(AppointmentRecord::is_valid);
        before - self.appointments.len()
    }
}

/// Ledger shared between threads.
///
/// The dedup check and the append happen under one lock acquisition, so
/// two workers offering the same appointment cannot both insert it.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn insert_as_of(
        &self,
        record: AppointmentRecord,
        today: NaiveDate,
        allow_backdate: bool,
    ) -> Result<(), Rejection> {
        self.inner.lock().insert_as_of(record, today, allow_backdate)
    }

    /// Run `f` with exclusive access to the ledger.
    pub fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> Ledger {
        self.inner.lock().clone()
    }
}
