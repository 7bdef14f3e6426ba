use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

/// A one-shot reminder. Scheduling an id that is already pending replaces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRequest {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: NaiveDateTime,
}

/// Platform-specific notification adapters will implement this trait.
pub trait NotificationSink: Send + Sync {
    /// Asks the platform for permission to deliver. Denial only makes
    /// scheduled reminders invisible.
    fn request_authorization(&self) -> bool;
    fn schedule(&self, request: NotificationRequest) -> Result<(), NotificationError>;
    /// Unknown ids are ignored.
    fn cancel(&self, ids: &[String]);
    fn cancel_all(&self);
}

/// Keeps pending reminders in memory. Useful as a dry-run backend and in tests.
#[derive(Debug)]
pub struct MemorySink {
    authorized: bool,
    inner: Mutex<MemorySinkState>,
}

#[derive(Debug, Default)]
struct MemorySinkState {
    pending: BTreeMap<String, NotificationRequest>,
    cancelled: Vec<String>,
    cancel_all_calls: usize,
    failing: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            authorized: true,
            inner: Mutex::default(),
        }
    }

    pub fn denied() -> Self {
        Self {
            authorized: false,
            inner: Mutex::default(),
        }
    }

    /// Makes every future registration of `id` fail.
    pub fn fail_on(&self, id: impl Into<String>) {
        self.inner.lock().failing.insert(id.into());
    }

    pub fn pending(&self) -> Vec<NotificationRequest> {
        self.inner.lock().pending.values().cloned().collect()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.inner.lock().pending.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<NotificationRequest> {
        self.inner.lock().pending.get(id).cloned()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.inner.lock().cancelled.clone()
    }

    pub fn cancel_all_calls(&self) -> usize {
        self.inner.lock().cancel_all_calls
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for MemorySink {
    fn request_authorization(&self) -> bool {
        self.authorized
    }

    fn schedule(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        let mut state = self.inner.lock();
        if state.failing.contains(&request.id) {
            return Err(NotificationError::RegistrationFailed {
                id: request.id,
                reason: "rejected by backend".to_string(),
            });
        }
        state.pending.insert(request.id.clone(), request);
        Ok(())
    }

    fn cancel(&self, ids: &[String]) {
        let mut state = self.inner.lock();
        for id in ids {
            state.pending.remove(id);
            state.cancelled.push(id.clone());
        }
    }

    fn cancel_all(&self) {
        let mut state = self.inner.lock();
        state.pending.clear();
        state.cancel_all_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(id: &str) -> NotificationRequest {
        NotificationRequest {
            id: id.to_string(),
            title: "title".into(),
            body: "body".into(),
            fire_at: NaiveDate::from_ymd_opt(2025, 10, 25)
                .unwrap()
                .and_hms_opt(19, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn cancelling_unknown_ids_is_a_no_op() {
        let sink = MemorySink::new();
        sink.schedule(request("watering-a")).unwrap();
        sink.cancel(&["feeding-a".to_string()]);
        assert_eq!(sink.pending_ids(), vec!["watering-a"]);
    }

    #[test]
    fn injected_failures_leave_nothing_pending() {
        let sink = MemorySink::new();
        sink.fail_on("spraying-a");
        let err = sink.schedule(request("spraying-a")).unwrap_err();
        assert!(matches!(err, NotificationError::RegistrationFailed { ref id, .. } if id == "spraying-a"));
        assert!(sink.pending().is_empty());
    }

    #[test]
    fn denied_sink_still_accepts_requests() {
        let sink = MemorySink::denied();
        assert!(!sink.request_authorization());
        sink.schedule(request("watering-b")).unwrap();
        assert!(sink.get("watering-b").is_some());
    }
}
