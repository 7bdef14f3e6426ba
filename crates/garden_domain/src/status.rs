use std::fmt;

use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::plant::{CareTrack, Plant};

/// Coarse due classification. Every future date counts as `Tomorrow`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlantStatus {
    Today,
    Overdue,
    Tomorrow,
}

impl PlantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlantStatus::Today => "today",
            PlantStatus::Overdue => "overdue",
            PlantStatus::Tomorrow => "tomorrow",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Some(PlantStatus::Today),
            "overdue" => Some(PlantStatus::Overdue),
            "tomorrow" => Some(PlantStatus::Tomorrow),
            _ => None,
        }
    }
}

impl fmt::Display for PlantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// When the track's action is next required. A never-performed action is due `now`.
pub fn next_due_date(track: &CareTrack, now: NaiveDateTime) -> NaiveDateTime {
    match track.last_done() {
        None => now,
        Some(last) => last
            .checked_add_days(Days::new(u64::from(track.interval_days())))
            .unwrap_or(NaiveDateTime::MAX),
    }
}

/// Signed number of calendar days from today to the due date.
pub fn days_until(track: &CareTrack, now: NaiveDateTime) -> i64 {
    let due = next_due_date(track, now).date();
    due.signed_duration_since(now.date()).num_days()
}

pub fn status(track: &CareTrack, now: NaiveDateTime) -> PlantStatus {
    match days_until(track, now) {
        days if days < 0 => PlantStatus::Overdue,
        0 => PlantStatus::Today,
        _ => PlantStatus::Tomorrow,
    }
}

pub fn days_until_label(track: &CareTrack, now: NaiveDateTime) -> String {
    match days_until(track, now) {
        days if days < 0 => format!("{}d ago", days.unsigned_abs()),
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        days => format!("in {days}d"),
    }
}

impl Plant {
    pub fn next_watering(&self, now: NaiveDateTime) -> NaiveDateTime {
        next_due_date(&self.watering, now)
    }

    pub fn watering_status(&self, now: NaiveDateTime) -> PlantStatus {
        status(&self.watering, now)
    }

    pub fn watering_label(&self, now: NaiveDateTime) -> String {
        days_until_label(&self.watering, now)
    }
}
