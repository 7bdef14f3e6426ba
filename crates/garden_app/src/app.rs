use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use garden_domain::{
    notifications::MemorySink,
    overview::{self, PlantQuery},
    store::JsonFileStore,
    GardenService, PlantStatus,
};
use tracing::{info, warn};

const DEFAULT_DATA_FILE: &str = "green_timer.json";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_path: PathBuf,
    pub(crate) seed_samples: bool,
    pub(crate) query: PlantQuery,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("GREEN_TIMER_DATA") {
            if !path.trim().is_empty() {
                config.data_path = PathBuf::from(path);
            }
        }
        if let Ok(seed) = std::env::var("GREEN_TIMER_SEED") {
            match parse_flag(&seed) {
                Some(value) => config.seed_samples = value,
                None => warn!(%seed, "ignoring GREEN_TIMER_SEED, expected true or false"),
            }
        }
        if let Ok(location) = std::env::var("GREEN_TIMER_LOCATION") {
            config.apply_location(&location);
        }
        if let Ok(status) = std::env::var("GREEN_TIMER_STATUS") {
            config.apply_status(&status);
        }
        Ok(config)
    }

    pub(crate) fn apply_location(&mut self, location: &str) {
        let location = location.trim();
        if !location.is_empty() && !location.eq_ignore_ascii_case("all locations") {
            self.query = self.query.clone().in_location(location);
        }
    }

    pub(crate) fn apply_status(&mut self, status: &str) {
        match PlantStatus::parse(status) {
            Some(status) => self.query = self.query.clone().with_status(status),
            None => warn!(%status, "ignoring unknown status filter"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_FILE),
            seed_samples: true,
            query: PlantQuery::default(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Loads the garden, rebuilds every reminder against an in-memory backend and prints
/// the plant overview followed by the reminders that would be delivered.
pub fn run(config: AppConfig) -> Result<()> {
    let store = JsonFileStore::new(&config.data_path);
    info!(path = %store.path().display(), "opening garden");
    let sink = Arc::new(MemorySink::new());
    let service = GardenService::builder()
        .with_notification_sink(sink.clone())
        .with_store(Box::new(store))
        .seed_samples(config.seed_samples)
        .build()
        .with_context(|| format!("opening {}", config.data_path.display()))?;

    service.scheduler().authorize();
    let report = service.reschedule_all();
    for failure in &report.failures {
        warn!(%failure, "reminder not registered");
    }

    let now = service.now();
    let plants = service.plants();
    let counts = overview::count_by_status(&plants, now);
    println!(
        "{} overdue, {} today, {} tomorrow, {} due this week",
        counts.overdue,
        counts.today,
        counts.tomorrow,
        overview::due_within_days(&plants, 7, now)
    );

    for plant in service.overview(&config.query) {
        println!(
            "{:<10} {:<20} {:<14} {}",
            plant.watering_status(now),
            plant.name,
            plant.location,
            plant.watering_label(now)
        );
    }

    let settings = service.settings();
    if settings.is_paused(now) {
        if let Some(until) = settings.pause_until {
            println!("reminders paused until {}", until.format("%Y-%m-%d %H:%M"));
        }
    }
    for request in sink.pending() {
        println!(
            "{}  {}: {}",
            request.fire_at.format("%a %d %b %H:%M"),
            request.title,
            request.body
        );
    }

    let tally = service.journal().recent_tally(now, 7);
    info!(
        watering = tally.watering,
        spraying = tally.spraying,
        feeding = tally.feeding,
        "care actions in the last 7 days"
    );
    Ok(())
}
