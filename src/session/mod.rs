pub mod controller;
mod loop_worker;
pub mod state;

pub use controller::SessionController;
pub use state::{ReadingSession, SessionSnapshot};
