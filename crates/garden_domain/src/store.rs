use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    journal::CareSession,
    plant::{CareTrack, Plant},
    reminders::ReminderSettings,
};

/// Everything the garden persists between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GardenSnapshot {
    #[serde(default)]
    pub plants: Vec<Plant>,
    #[serde(default)]
    pub sessions: Vec<CareSession>,
    #[serde(default)]
    pub settings: ReminderSettings,
}

impl GardenSnapshot {
    /// Starter collection offered on first launch.
    pub fn sample(now: NaiveDateTime) -> Result<Self> {
        let ago = |days: i64| Some(now - Duration::days(days));
        let monstera = Plant::new("Monstera", "Living Room", CareTrack::new(3, ago(2))?)
            .with_spraying(CareTrack::new(2, None)?)
            .with_feeding(CareTrack::new(14, None)?)
            .with_notes("Water moderately");
        let snake_plant = Plant::new("Snake Plant", "Bedroom", CareTrack::new(14, ago(13))?)
            .with_feeding(CareTrack::new(30, None)?)
            .with_notes("14 cm pot");
        let succulent = Plant::new("Succulent", "Kitchen", CareTrack::new(8, ago(10))?)
            .with_feeding(CareTrack::new(30, None)?)
            .with_notes("Reminder window: 19:00 - 21:00");
        Ok(Self {
            plants: vec![monstera, snake_plant, succulent],
            ..Self::default()
        })
    }
}

pub trait GardenStore: Send + Sync {
    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<GardenSnapshot>>;
    fn save(&self, snapshot: &GardenSnapshot) -> Result<()>;
}

/// Stores the snapshot as a single pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GardenStore for JsonFileStore {
    fn load(&self) -> Result<Option<GardenSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &GardenSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, payload)
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), plants = snapshot.plants.len(), "garden saved");
        Ok(())
    }
}
