pub mod clock;
pub mod error;
pub mod journal;
pub mod notifications;
pub mod overview;
pub mod plant;
pub mod reminders;
pub mod service;
pub mod status;
pub mod store;

pub use crate::error::{CareError, NotificationError};
pub use crate::plant::{ActionKind, CareTrack, NewPlant, Plant};
pub use crate::service::{GardenService, GardenServiceBuilder};
pub use crate::status::PlantStatus;
