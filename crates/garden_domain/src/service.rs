use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    error::CareError,
    journal::{CareSession, Journal},
    notifications::NotificationSink,
    overview::{self, PlantQuery, StatusCounts},
    plant::{ActionKind, NewPlant, Plant},
    reminders::{ReminderScheduler, ReminderSettings, ReminderWindow, RescheduleReport},
    store::{GardenSnapshot, GardenStore},
};

#[derive(Debug, Clone, Default)]
struct GardenState {
    plants: Vec<Plant>,
    journal: Journal,
    settings: ReminderSettings,
}

impl GardenState {
    fn from_snapshot(snapshot: GardenSnapshot) -> Self {
        Self {
            plants: snapshot.plants,
            journal: Journal::from_sessions(snapshot.sessions),
            settings: snapshot.settings,
        }
    }

    fn snapshot(&self) -> GardenSnapshot {
        GardenSnapshot {
            plants: self.plants.clone(),
            sessions: self.journal.entries().to_vec(),
            settings: self.settings,
        }
    }

    fn plant_mut(&mut self, id: Uuid) -> Result<&mut Plant, CareError> {
        self.plants
            .iter_mut()
            .find(|plant| plant.id == id)
            .ok_or(CareError::UnknownPlant(id))
    }
}

/// Owns the plant collection and keeps every plant's reminders in step with it.
///
/// Each mutating call persists the changed garden before it becomes visible, then
/// reschedules the affected reminders itself. There is no change observer.
pub struct GardenService {
    state: RwLock<GardenState>,
    scheduler: ReminderScheduler,
    store: Option<Box<dyn GardenStore>>,
    clock: Box<dyn Clock>,
}

pub struct GardenServiceBuilder {
    notification_sink: Option<Arc<dyn NotificationSink>>,
    store: Option<Box<dyn GardenStore>>,
    clock: Option<Box<dyn Clock>>,
    seed_samples: bool,
}

impl GardenServiceBuilder {
    pub fn new() -> Self {
        Self {
            notification_sink: None,
            store: None,
            clock: None,
            seed_samples: false,
        }
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn with_store(mut self, store: Box<dyn GardenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Start from the sample collection when the store is empty.
    pub fn seed_samples(mut self, seed: bool) -> Self {
        self.seed_samples = seed;
        self
    }

    pub fn build(self) -> Result<GardenService> {
        let sink = self
            .notification_sink
            .context("a notification sink is required")?;
        let clock = self.clock.unwrap_or_else(|| Box::new(SystemClock));

        let stored = match &self.store {
            Some(store) => store.load().context("loading garden")?,
            None => None,
        };
        let seeded = stored.is_none() && self.seed_samples;
        let snapshot = match stored {
            Some(snapshot) => snapshot,
            None if self.seed_samples => GardenSnapshot::sample(clock.now())?,
            None => GardenSnapshot::default(),
        };
        tracing::info!(plants = snapshot.plants.len(), seeded, "garden loaded");

        let service = GardenService {
            state: RwLock::new(GardenState::from_snapshot(snapshot)),
            scheduler: ReminderScheduler::new(sink),
            store: self.store,
            clock,
        };
        if seeded {
            service.persist(&service.state.read())?;
        }
        Ok(service)
    }
}

impl Default for GardenServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GardenService {
    pub fn builder() -> GardenServiceBuilder {
        GardenServiceBuilder::new()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    pub fn plants(&self) -> Vec<Plant> {
        self.state.read().plants.clone()
    }

    pub fn plant(&self, id: Uuid) -> Result<Plant> {
        self.state
            .read()
            .plants
            .iter()
            .find(|plant| plant.id == id)
            .cloned()
            .ok_or_else(|| CareError::UnknownPlant(id).into())
    }

    pub fn settings(&self) -> ReminderSettings {
        self.state.read().settings
    }

    pub fn journal(&self) -> Journal {
        self.state.read().journal.clone()
    }

    pub fn overview(&self, query: &PlantQuery) -> Vec<Plant> {
        let now = self.now();
        let state = self.state.read();
        query
            .apply(&state.plants, now)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        overview::count_by_status(&self.state.read().plants, self.now())
    }

    pub fn add_plant(&self, draft: NewPlant) -> Result<(Plant, RescheduleReport)> {
        let plant = Plant::try_from(draft)?;
        let mut state = self.state.write();
        self.commit(&mut state, |next| {
            next.plants.push(plant.clone());
            Ok(())
        })?;
        tracing::info!(plant = %plant.id, name = %plant.name, "plant added");
        let report = self.scheduler.replace_reminders(&plant, &state.settings, self.now());
        Ok((plant, report))
    }

    /// Replaces a stored plant wholesale, e.g. after its intervals were edited.
    pub fn update_plant(&self, plant: Plant) -> Result<RescheduleReport> {
        let mut state = self.state.write();
        self.commit(&mut state, |next| {
            *next.plant_mut(plant.id)? = plant.clone();
            Ok(())
        })?;
        Ok(self.scheduler.replace_reminders(&plant, &state.settings, self.now()))
    }

    pub fn delete_plant(&self, id: Uuid) -> Result<Plant> {
        let mut state = self.state.write();
        let (removed, sessions) = self.commit(&mut state, |next| {
            let index = next
                .plants
                .iter()
                .position(|plant| plant.id == id)
                .ok_or(CareError::UnknownPlant(id))?;
            let removed = next.plants.remove(index);
            let sessions = next.journal.remove_for_plant(id);
            Ok((removed, sessions))
        })?;
        self.scheduler.cancel_reminders(id);
        tracing::info!(plant = %id, sessions, "plant deleted");
        Ok(removed)
    }

    /// Records that `kind` was just done for the plant and reschedules its reminders.
    pub fn perform_action(
        &self,
        id: Uuid,
        kind: ActionKind,
        notes: Option<String>,
    ) -> Result<RescheduleReport> {
        let now = self.now();
        let mut state = self.state.write();
        let plant = self.commit(&mut state, |next| {
            let plant = next.plant_mut(id)?;
            plant.record_action(kind, now)?;
            let plant = plant.clone();
            next.journal
                .record(CareSession::for_plant(&plant, kind, now, notes));
            Ok(plant)
        })?;
        tracing::info!(plant = %id, %kind, "care action recorded");
        Ok(self.scheduler.replace_reminders(&plant, &state.settings, now))
    }

    pub fn set_reminder_window(&self, window: ReminderWindow) -> Result<RescheduleReport> {
        self.update_settings(|settings| settings.window = window)
    }

    pub fn set_pause_until(&self, pause_until: Option<NaiveDateTime>) -> Result<RescheduleReport> {
        self.update_settings(|settings| settings.pause_until = pause_until)
    }

    pub fn reschedule_all(&self) -> RescheduleReport {
        let state = self.state.read();
        self.scheduler
            .replace_all_reminders(&state.plants, &state.settings, self.now())
    }

    pub fn clear_journal(&self) -> Result<()> {
        let mut state = self.state.write();
        self.commit(&mut state, |next| {
            next.journal.clear();
            Ok(())
        })
    }

    /// Removes every plant and session. Pending reminders go with them.
    pub fn clear_all(&self) -> Result<()> {
        let mut state = self.state.write();
        let removed = self.commit(&mut state, |next| {
            next.journal.clear();
            Ok(std::mem::take(&mut next.plants))
        })?;
        for plant in removed {
            self.scheduler.cancel_reminders(plant.id);
        }
        Ok(())
    }

    fn update_settings(&self, apply: impl FnOnce(&mut ReminderSettings)) -> Result<RescheduleReport> {
        let mut state = self.state.write();
        self.commit(&mut state, |next| {
            apply(&mut next.settings);
            Ok(())
        })?;
        tracing::info!(settings = ?state.settings, "reminder settings changed");
        Ok(self
            .scheduler
            .replace_all_reminders(&state.plants, &state.settings, self.now()))
    }

    /// Applies `change` to a copy of the state and swaps it in once the copy is saved.
    fn commit<T>(
        &self,
        state: &mut GardenState,
        change: impl FnOnce(&mut GardenState) -> Result<T>,
    ) -> Result<T> {
        let mut next = state.clone();
        let output = change(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(output)
    }

    fn persist(&self, state: &GardenState) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(&state.snapshot()).context("saving garden")?;
        }
        Ok(())
    }
}
