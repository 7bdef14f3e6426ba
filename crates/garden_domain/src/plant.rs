use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CareError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Watering,
    Spraying,
    Feeding,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Watering, ActionKind::Spraying, ActionKind::Feeding];

    /// Prefix used in notification identifiers.
    pub fn key(self) -> &'static str {
        match self {
            ActionKind::Watering => "watering",
            ActionKind::Spraying => "spraying",
            ActionKind::Feeding => "feeding",
        }
    }

    pub fn reminder_title(self) -> &'static str {
        match self {
            ActionKind::Watering => "💧 Time to water",
            ActionKind::Spraying => "💦 Time to spray",
            ActionKind::Feeding => "🌿 Time to feed",
        }
    }

    pub fn reminder_body(self, plant_name: &str) -> String {
        format!("{plant_name} needs {}", self.key())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}

/// One recurring care action: how often it repeats and when it last happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "CareTrackRecord")]
pub struct CareTrack {
    interval_days: u32,
    last_done: Option<NaiveDateTime>,
}

#[derive(Deserialize)]
struct CareTrackRecord {
    interval_days: i64,
    last_done: Option<NaiveDateTime>,
}

impl TryFrom<CareTrackRecord> for CareTrack {
    type Error = CareError;

    fn try_from(record: CareTrackRecord) -> Result<Self, Self::Error> {
        CareTrack::new(record.interval_days, record.last_done)
    }
}

impl CareTrack {
    pub fn new(interval_days: i64, last_done: Option<NaiveDateTime>) -> Result<Self, CareError> {
        let interval_days = u32::try_from(interval_days)
            .ok()
            .filter(|days| *days > 0)
            .ok_or(CareError::InvalidInterval(interval_days))?;
        Ok(Self {
            interval_days,
            last_done,
        })
    }

    pub fn interval_days(&self) -> u32 {
        self.interval_days
    }

    pub fn last_done(&self) -> Option<NaiveDateTime> {
        self.last_done
    }

    pub fn set_interval_days(&mut self, interval_days: i64) -> Result<(), CareError> {
        *self = CareTrack::new(interval_days, self.last_done)?;
        Ok(())
    }

    pub fn mark_done(&mut self, at: NaiveDateTime) {
        self.last_done = Some(at);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plant {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub watering: CareTrack,
    #[serde(default)]
    pub spraying: Option<CareTrack>,
    #[serde(default)]
    pub feeding: Option<CareTrack>,
}

impl Plant {
    pub fn new(name: impl Into<String>, location: impl Into<String>, watering: CareTrack) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            location: location.into(),
            notes: None,
            watering,
            spraying: None,
            feeding: None,
        }
    }

    pub fn with_spraying(mut self, track: CareTrack) -> Self {
        self.spraying = Some(track);
        self
    }

    pub fn with_feeding(mut self, track: CareTrack) -> Self {
        self.feeding = Some(track);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn track(&self, kind: ActionKind) -> Option<&CareTrack> {
        match kind {
            ActionKind::Watering => Some(&self.watering),
            ActionKind::Spraying => self.spraying.as_ref(),
            ActionKind::Feeding => self.feeding.as_ref(),
        }
    }

    fn track_mut(&mut self, kind: ActionKind) -> Option<&mut CareTrack> {
        match kind {
            ActionKind::Watering => Some(&mut self.watering),
            ActionKind::Spraying => self.spraying.as_mut(),
            ActionKind::Feeding => self.feeding.as_mut(),
        }
    }

    /// Enabled tracks, always in watering, spraying, feeding order.
    pub fn tracks(&self) -> impl Iterator<Item = (ActionKind, &CareTrack)> + '_ {
        ActionKind::ALL
            .into_iter()
            .filter_map(move |kind| self.track(kind).map(|track| (kind, track)))
    }

    pub fn record_action(&mut self, kind: ActionKind, at: NaiveDateTime) -> Result<(), CareError> {
        let plant = self.id;
        let track = self
            .track_mut(kind)
            .ok_or(CareError::TrackDisabled { plant, kind })?;
        track.mark_done(at);
        Ok(())
    }
}

/// Form input for a plant that does not exist yet. Intervals are validated on conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPlant {
    pub name: String,
    pub location: String,
    pub notes: Option<String>,
    pub watering_interval_days: i64,
    pub spraying_interval_days: Option<i64>,
    pub feeding_interval_days: Option<i64>,
    pub last_watered: Option<NaiveDateTime>,
}

impl TryFrom<NewPlant> for Plant {
    type Error = CareError;

    fn try_from(draft: NewPlant) -> Result<Self, Self::Error> {
        let watering = CareTrack::new(draft.watering_interval_days, draft.last_watered)?;
        let optional_track = |days: Option<i64>| days.map(|days| CareTrack::new(days, None)).transpose();
        Ok(Plant {
            id: Uuid::new_v4(),
            name: draft.name.trim().to_string(),
            location: draft.location.trim().to_string(),
            notes: draft.notes.filter(|notes| !notes.trim().is_empty()),
            watering,
            spraying: optional_track(draft.spraying_interval_days)?,
            feeding: optional_track(draft.feeding_interval_days)?,
        })
    }
}
