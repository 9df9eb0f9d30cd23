pub mod config;
pub mod dwell;
pub mod stats;
pub mod stuck;
pub mod visibility;

pub use config::TrackingConfig;
pub use dwell::{DwellTimer, TickOutcome};
pub use stats::{StatStore, UnitStat};
pub use stuck::is_stuck;
pub use visibility::{BatchOutcome, VisibilityChange, VisibilityTracker};
