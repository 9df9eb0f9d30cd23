pub mod cli;
pub mod db;
pub mod document;
pub mod models;
pub mod quiz;
pub mod session;
pub mod settings;
pub mod tracker;
pub mod utils;

pub use models::{ContentUnit, Document, DocumentKind};
pub use quiz::{AnswerOutcome, CheckError, CheckGenerator, ComprehensionCheck, QuizState};
pub use session::{SessionController, SessionSnapshot};
pub use tracker::{TrackingConfig, UnitStat, VisibilityChange};
