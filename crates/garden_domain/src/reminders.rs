use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::NotificationError,
    notifications::{NotificationRequest, NotificationSink},
    plant::{ActionKind, Plant},
    status,
};

/// Daily time range for reminders. Only `start` affects fire times.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "ReminderWindowRecord")]
pub struct ReminderWindow {
    start: NaiveTime,
    end: NaiveTime,
}

#[derive(Deserialize)]
struct ReminderWindowRecord {
    start: NaiveTime,
    end: NaiveTime,
}

impl From<ReminderWindowRecord> for ReminderWindow {
    fn from(record: ReminderWindowRecord) -> Self {
        ReminderWindow::new(record.start, record.end)
    }
}

impl ReminderWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start: to_minute(start),
            end: to_minute(end),
        }
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }
}

impl Default for ReminderWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

fn to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Snapshot of the global settings every scheduling decision reads.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderSettings {
    #[serde(default)]
    pub window: ReminderWindow,
    #[serde(default)]
    pub pause_until: Option<NaiveDateTime>,
}

impl ReminderSettings {
    pub fn is_paused(&self, now: NaiveDateTime) -> bool {
        self.pause_until.is_some_and(|until| now < until)
    }
}

pub fn reminder_id(kind: ActionKind, plant_id: Uuid) -> String {
    format!("{}-{}", kind.key(), plant_id)
}

/// Every id a plant can own, pending or not.
pub fn reminder_ids(plant_id: Uuid) -> Vec<String> {
    ActionKind::ALL
        .into_iter()
        .map(|kind| reminder_id(kind, plant_id))
        .collect()
}

pub fn compute_reminders(
    plant: &Plant,
    settings: &ReminderSettings,
    now: NaiveDateTime,
) -> Vec<NotificationRequest> {
    if settings.is_paused(now) {
        return Vec::new();
    }

    let today = now.date();
    let start = settings.window.start();
    plant
        .tracks()
        // Optional tracks only get a due date after the first time they are done.
        .filter(|(kind, track)| *kind == ActionKind::Watering || track.last_done().is_some())
        .map(|(kind, track)| {
            let due = status::next_due_date(track, now).date();
            let fire_day = if due <= today { today } else { due };
            NotificationRequest {
                id: reminder_id(kind, plant.id),
                title: kind.reminder_title().to_string(),
                body: kind.reminder_body(&plant.name),
                fire_at: fire_day.and_time(start),
            }
        })
        .collect()
}

/// Outcome of one reschedule pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescheduleReport {
    pub scheduled: Vec<String>,
    pub failures: Vec<NotificationError>,
}

impl RescheduleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: RescheduleReport) {
        self.scheduled.extend(other.scheduled);
        self.failures.extend(other.failures);
    }
}

pub struct ReminderScheduler {
    sink: Arc<dyn NotificationSink>,
    authorized: AtomicBool,
    plant_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ReminderScheduler {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            authorized: AtomicBool::new(false),
            plant_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Requests delivery permission. The answer is remembered but never gates scheduling.
    pub fn authorize(&self) -> bool {
        let granted = self.sink.request_authorization();
        if granted {
            info!("notification permission granted");
        } else {
            warn!("notification permission denied; reminders will be scheduled but not shown");
        }
        self.authorized.store(granted, Ordering::Relaxed);
        granted
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::Relaxed)
    }

    /// Cancels the plant's reminders and issues the ones it needs now.
    pub fn replace_reminders(
        &self,
        plant: &Plant,
        settings: &ReminderSettings,
        now: NaiveDateTime,
    ) -> RescheduleReport {
        let lock = self.plant_lock(plant.id);
        let _guard = lock.lock();
        self.sink.cancel(&reminder_ids(plant.id));
        if settings.is_paused(now) {
            debug!(plant = %plant.id, until = ?settings.pause_until, "reminders paused");
        }
        self.submit(compute_reminders(plant, settings, now))
    }

    /// Clears every pending reminder, then reschedules each plant.
    pub fn replace_all_reminders(
        &self,
        plants: &[Plant],
        settings: &ReminderSettings,
        now: NaiveDateTime,
    ) -> RescheduleReport {
        self.sink.cancel_all();
        let mut report = RescheduleReport::default();
        for plant in plants {
            let lock = self.plant_lock(plant.id);
            let _guard = lock.lock();
            report.merge(self.submit(compute_reminders(plant, settings, now)));
        }
        info!(
            plants = plants.len(),
            scheduled = report.scheduled.len(),
            failed = report.failures.len(),
            "rescheduled all reminders"
        );
        report
    }

    pub fn cancel_reminders(&self, plant_id: Uuid) {
        {
            let lock = self.plant_lock(plant_id);
            let _guard = lock.lock();
            self.sink.cancel(&reminder_ids(plant_id));
        }
        // Clones are only handed out under the map lock, so a count of one means
        // nobody is holding or waiting on this plant's mutex.
        let mut locks = self.plant_locks.lock();
        if locks
            .get(&plant_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&plant_id);
        }
        debug!(plant = %plant_id, "cancelled reminders");
    }

    fn plant_lock(&self, plant_id: Uuid) -> Arc<Mutex<()>> {
        self.plant_locks
            .lock()
            .entry(plant_id)
            .or_default()
            .clone()
    }

    fn submit(&self, requests: Vec<NotificationRequest>) -> RescheduleReport {
        let mut report = RescheduleReport::default();
        for request in requests {
            let id = request.id.clone();
            let fire_at = request.fire_at;
            match self.sink.schedule(request) {
                Ok(()) => {
                    debug!(%id, %fire_at, "reminder scheduled");
                    report.scheduled.push(id);
                }
                Err(err) => {
                    warn!(%id, %err, "reminder registration failed");
                    report.failures.push(err);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{notifications::MemorySink, plant::CareTrack};
    use chrono::{Duration, NaiveDate};
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration as StdDuration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn now() -> NaiveDateTime {
        day(25).and_hms_opt(20, 45, 0).unwrap()
    }

    fn seven_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(19, 0, 0).unwrap()
    }

    fn ago(days: i64) -> Option<NaiveDateTime> {
        Some(now() - Duration::days(days))
    }

    fn track(interval: i64, last_done: Option<NaiveDateTime>) -> CareTrack {
        CareTrack::new(interval, last_done).unwrap()
    }

    fn settings() -> ReminderSettings {
        ReminderSettings::default()
    }

    fn ids(requests: &[NotificationRequest]) -> Vec<String> {
        requests.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn ids_are_deterministic_per_kind_and_plant() {
        let id = Uuid::nil();
        assert_eq!(
            reminder_ids(id),
            vec![
                "watering-00000000-0000-0000-0000-000000000000",
                "spraying-00000000-0000-0000-0000-000000000000",
                "feeding-00000000-0000-0000-0000-000000000000",
            ]
        );
    }

    #[test]
    fn window_drops_seconds() {
        let window = ReminderWindow::new(
            NaiveTime::from_hms_opt(7, 30, 42).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        assert_eq!(window.start(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    }

    #[test]
    fn due_today_fires_at_window_start_even_when_already_past() {
        let plant = Plant::new("Basil", "Kitchen", track(2, ago(2)));
        let requests = compute_reminders(&plant, &settings(), now());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].fire_at, day(25).and_time(seven_pm()));
        assert_eq!(requests[0].title, "💧 Time to water");
        assert_eq!(requests[0].body, "Basil needs watering");
    }

    #[test]
    fn overdue_is_pulled_to_today() {
        let plant = Plant::new("Succulent", "Kitchen", track(8, ago(10)));
        let requests = compute_reminders(&plant, &settings(), now());
        assert_eq!(requests[0].fire_at, day(25).and_time(seven_pm()));
    }

    #[test]
    fn future_due_date_keeps_its_day() {
        let plant = Plant::new("Monstera", "Living Room", track(3, ago(2)));
        let requests = compute_reminders(&plant, &settings(), now());
        assert_eq!(requests[0].fire_at, day(26).and_time(seven_pm()));
    }

    #[test]
    fn never_watered_plant_gets_a_watering_reminder_today() {
        let plant = Plant::new("Orchid", "Bedroom", track(7, None));
        let requests = compute_reminders(&plant, &settings(), now());
        assert_eq!(ids(&requests), vec![reminder_id(ActionKind::Watering, plant.id)]);
        assert_eq!(requests[0].fire_at, day(25).and_time(seven_pm()));
    }

    #[test]
    fn optional_tracks_need_a_first_occurrence() {
        let plant = Plant::new("Fern", "Bathroom", track(3, ago(1)))
            .with_spraying(track(2, None))
            .with_feeding(track(14, ago(20)));
        let requests = compute_reminders(&plant, &settings(), now());
        assert_eq!(
            ids(&requests),
            vec![
                reminder_id(ActionKind::Watering, plant.id),
                reminder_id(ActionKind::Feeding, plant.id),
            ]
        );
        assert_eq!(requests[1].body, "Fern needs feeding");
    }

    #[test]
    fn active_pause_suppresses_every_track() {
        let plant = Plant::new("Fern", "Bathroom", track(3, ago(5)))
            .with_spraying(track(2, ago(4)))
            .with_feeding(track(14, ago(20)));
        let paused = ReminderSettings {
            pause_until: Some(now() + Duration::days(3)),
            ..settings()
        };
        assert!(compute_reminders(&plant, &paused, now()).is_empty());
    }

    #[test]
    fn expired_pause_is_ignored() {
        let plant = Plant::new("Fern", "Bathroom", track(3, ago(5)));
        let expired = ReminderSettings {
            pause_until: Some(now() - Duration::days(1)),
            ..settings()
        };
        assert_eq!(compute_reminders(&plant, &expired, now()).len(), 1);
        let at_boundary = ReminderSettings {
            pause_until: Some(now()),
            ..settings()
        };
        assert_eq!(compute_reminders(&plant, &at_boundary, now()).len(), 1);
    }

    #[test]
    fn custom_window_start_is_used() {
        let plant = Plant::new("Monstera", "Living Room", track(3, ago(1)));
        let custom = ReminderSettings {
            window: ReminderWindow::new(
                NaiveTime::from_hms_opt(8, 15, 0).unwrap(),
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            ),
            pause_until: None,
        };
        let requests = compute_reminders(&plant, &custom, now());
        assert_eq!(
            requests[0].fire_at,
            day(27).and_hms_opt(8, 15, 0).unwrap()
        );
    }

    #[test]
    fn replace_cancels_before_rescheduling() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = ReminderScheduler::new(sink.clone());
        let mut plant = Plant::new("Basil", "Kitchen", track(2, ago(2)))
            .with_spraying(track(3, ago(1)));

        let report = scheduler.replace_reminders(&plant, &settings(), now());
        assert!(report.is_clean());
        assert_eq!(sink.pending().len(), 2);

        plant.spraying = None;
        scheduler.replace_reminders(&plant, &settings(), now());
        assert_eq!(sink.pending_ids(), vec![reminder_id(ActionKind::Watering, plant.id)]);
        assert!(sink
            .cancelled()
            .contains(&reminder_id(ActionKind::Spraying, plant.id)));
    }

    #[test]
    fn replace_then_cancel_leaves_nothing_pending() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = ReminderScheduler::new(sink.clone());
        let plant = Plant::new("Basil", "Kitchen", track(2, ago(2)))
            .with_feeding(track(30, ago(3)));
        scheduler.replace_reminders(&plant, &settings(), now());
        scheduler.cancel_reminders(plant.id);
        assert!(sink.pending().is_empty());
    }

    #[test]
    fn replace_all_clears_everything_first() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = ReminderScheduler::new(sink.clone());
        let stale = Plant::new("Gone", "Attic", track(1, None));
        scheduler.replace_reminders(&stale, &settings(), now());

        let plants = vec![
            Plant::new("Basil", "Kitchen", track(2, ago(2))),
            Plant::new("Monstera", "Living Room", track(3, ago(2))),
        ];
        let report = scheduler.replace_all_reminders(&plants, &settings(), now());
        assert_eq!(report.scheduled.len(), 2);
        assert_eq!(sink.cancel_all_calls(), 1);
        assert!(sink.get(&reminder_id(ActionKind::Watering, stale.id)).is_none());
    }

    #[test]
    fn registration_failures_are_reported_not_fatal() {
        let sink = Arc::new(MemorySink::new());
        let plant = Plant::new("Fern", "Bathroom", track(3, ago(5)))
            .with_feeding(track(14, ago(20)));
        sink.fail_on(reminder_id(ActionKind::Watering, plant.id));
        let scheduler = ReminderScheduler::new(sink.clone());

        let report = scheduler.replace_reminders(&plant, &settings(), now());
        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.scheduled, vec![reminder_id(ActionKind::Feeding, plant.id)]);
    }

    #[test]
    fn authorization_is_remembered_but_not_enforced() {
        let sink = Arc::new(MemorySink::denied());
        let scheduler = ReminderScheduler::new(sink.clone());
        assert!(!scheduler.authorize());
        assert!(!scheduler.is_authorized());
        let plant = Plant::new("Basil", "Kitchen", track(2, None));
        scheduler.replace_reminders(&plant, &settings(), now());
        assert_eq!(sink.pending().len(), 1);
    }

    #[test]
    fn loaded_window_is_truncated_to_the_minute() {
        let raw = r#"{"window":{"start":"19:00:42","end":"21:00:07"},"pause_until":null}"#;
        let loaded: ReminderSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(loaded.window, ReminderWindow::default());

        let plant = Plant::new("Basil", "Kitchen", track(2, ago(2)));
        let requests = compute_reminders(&plant, &loaded, now());
        assert_eq!(requests[0].fire_at, day(25).and_time(seven_pm()));
    }

    /// Counts how many `cancel` calls overlap.
    #[derive(Default)]
    struct OverlapSink {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl NotificationSink for OverlapSink {
        fn request_authorization(&self) -> bool {
            true
        }

        fn schedule(&self, _request: NotificationRequest) -> Result<(), NotificationError> {
            Ok(())
        }

        fn cancel(&self, _ids: &[String]) {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            thread::sleep(StdDuration::from_millis(1));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        fn cancel_all(&self) {}
    }

    #[test]
    fn cancel_and_replace_never_overlap_for_one_plant() {
        let sink = Arc::new(OverlapSink::default());
        let scheduler = ReminderScheduler::new(sink.clone());
        let plant = Plant::new("Basil", "Kitchen", track(2, ago(2)));

        thread::scope(|scope| {
            for worker in 0..4 {
                let scheduler = &scheduler;
                let plant = &plant;
                scope.spawn(move || {
                    for round in 0..25 {
                        if (worker + round) % 3 == 0 {
                            scheduler.cancel_reminders(plant.id);
                        } else {
                            scheduler.replace_reminders(plant, &settings(), now());
                        }
                    }
                });
            }
        });

        assert_eq!(sink.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn idle_plant_lock_is_released_on_cancel() {
        let scheduler = ReminderScheduler::new(Arc::new(MemorySink::new()));
        let plant = Plant::new("Basil", "Kitchen", track(2, ago(2)));
        scheduler.replace_reminders(&plant, &settings(), now());
        assert!(scheduler.plant_locks.lock().contains_key(&plant.id));

        let held = scheduler.plant_lock(plant.id);
        scheduler.cancel_reminders(plant.id);
        assert!(scheduler.plant_locks.lock().contains_key(&plant.id));
        drop(held);

        scheduler.cancel_reminders(plant.id);
        assert!(scheduler.plant_locks.lock().is_empty());
    }
}
