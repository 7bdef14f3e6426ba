use std::collections::BTreeSet;

use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{plant::Plant, status::PlantStatus};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub today: usize,
    pub overdue: usize,
    pub tomorrow: usize,
}

impl StatusCounts {
    pub fn get(&self, status: PlantStatus) -> usize {
        match status {
            PlantStatus::Today => self.today,
            PlantStatus::Overdue => self.overdue,
            PlantStatus::Tomorrow => self.tomorrow,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationFilter {
    #[default]
    All,
    Named(String),
}

impl LocationFilter {
    fn matches(&self, plant: &Plant) -> bool {
        match self {
            LocationFilter::All => true,
            LocationFilter::Named(location) => plant.location == *location,
        }
    }
}

/// Filters applied to the plant list before it is ordered by next watering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlantQuery {
    pub location: LocationFilter,
    pub status: Option<PlantStatus>,
}

impl PlantQuery {
    pub fn in_location(mut self, location: impl Into<String>) -> Self {
        self.location = LocationFilter::Named(location.into());
        self
    }

    pub fn with_status(mut self, status: PlantStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn apply<'a>(&self, plants: &'a [Plant], now: NaiveDateTime) -> Vec<&'a Plant> {
        let mut matched: Vec<&Plant> = plants
            .iter()
            .filter(|plant| self.location.matches(plant))
            .filter(|plant| {
                self.status
                    .map_or(true, |status| plant.watering_status(now) == status)
            })
            .collect();
        matched.sort_by_key(|plant| plant.next_watering(now));
        matched
    }
}

pub fn count_by_status(plants: &[Plant], now: NaiveDateTime) -> StatusCounts {
    plants
        .iter()
        .fold(StatusCounts::default(), |mut counts, plant| {
            match plant.watering_status(now) {
                PlantStatus::Today => counts.today += 1,
                PlantStatus::Overdue => counts.overdue += 1,
                PlantStatus::Tomorrow => counts.tomorrow += 1,
            }
            counts
        })
}

pub fn filter_by_status(plants: &[Plant], status: PlantStatus, now: NaiveDateTime) -> Vec<&Plant> {
    plants
        .iter()
        .filter(|plant| plant.watering_status(now) == status)
        .collect()
}

pub fn filter_by_location<'a>(plants: &'a [Plant], location: &str) -> Vec<&'a Plant> {
    plants
        .iter()
        .filter(|plant| plant.location == location)
        .collect()
}

/// Stable: plants due at the same instant keep their list order.
pub fn sort_by_next_due(plants: &[Plant], now: NaiveDateTime) -> Vec<&Plant> {
    let mut sorted: Vec<&Plant> = plants.iter().collect();
    sorted.sort_by_key(|plant| plant.next_watering(now));
    sorted
}

pub fn due_today(plants: &[Plant], now: NaiveDateTime) -> Vec<&Plant> {
    filter_by_status(plants, PlantStatus::Today, now)
}

pub fn locations(plants: &[Plant]) -> Vec<String> {
    plants
        .iter()
        .map(|plant| plant.location.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Plants whose next watering falls within `days` calendar days starting today.
pub fn due_within_days(plants: &[Plant], days: u64, now: NaiveDateTime) -> usize {
    let start = now.date().and_time(chrono::NaiveTime::MIN);
    let end = start.checked_add_days(Days::new(days)).unwrap_or(NaiveDateTime::MAX);
    plants
        .iter()
        .map(|plant| plant.next_watering(now))
        .filter(|due| *due >= start && *due < end)
        .count()
}
