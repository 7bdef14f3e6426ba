use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plant::{ActionKind, Plant};

/// A care action that was performed, as shown in the journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CareSession {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub plant_name: String,
    pub action: ActionKind,
    pub at: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
    pub location: String,
}

impl CareSession {
    pub fn for_plant(plant: &Plant, action: ActionKind, at: NaiveDateTime, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plant_id: plant.id,
            plant_name: plant.name.clone(),
            action,
            at,
            notes,
            location: plant.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionTally {
    pub watering: usize,
    pub spraying: usize,
    pub feeding: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Journal {
    sessions: Vec<CareSession>,
}

impl Journal {
    pub fn from_sessions(sessions: Vec<CareSession>) -> Self {
        Self { sessions }
    }

    pub fn record(&mut self, session: CareSession) {
        self.sessions.push(session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// In the order they were recorded.
    pub fn entries(&self) -> &[CareSession] {
        &self.sessions
    }

    /// Newest first.
    pub fn sessions(&self) -> Vec<&CareSession> {
        self.filter(|_| true)
    }

    pub fn filter_by_action(&self, action: ActionKind) -> Vec<&CareSession> {
        self.filter(|session| session.action == action)
    }

    pub fn for_plant(&self, plant_id: Uuid) -> Vec<&CareSession> {
        self.filter(|session| session.plant_id == plant_id)
    }

    pub fn remove_for_plant(&mut self, plant_id: Uuid) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|session| session.plant_id != plant_id);
        before - self.sessions.len()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Actions performed within the trailing `days` days.
    pub fn recent_tally(&self, now: NaiveDateTime, days: i64) -> ActionTally {
        let since = TimeDelta::try_days(days.max(0))
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(NaiveDateTime::MIN);
        self.sessions
            .iter()
            .filter(|session| session.at >= since)
            .fold(ActionTally::default(), |mut tally, session| {
                match session.action {
                    ActionKind::Watering => tally.watering += 1,
                    ActionKind::Spraying => tally.spraying += 1,
                    ActionKind::Feeding => tally.feeding += 1,
                }
                tally
            })
    }

    fn filter(&self, keep: impl Fn(&CareSession) -> bool) -> Vec<&CareSession> {
        let mut matched: Vec<&CareSession> = self.sessions.iter().filter(|s| keep(*s)).collect();
        matched.sort_by(|a, b| b.at.cmp(&a.at));
        matched
    }
}
