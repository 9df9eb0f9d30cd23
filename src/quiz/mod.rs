pub mod check;
pub mod fallback;
pub mod generator;
pub mod openai;
pub mod orchestrator;

pub use check::{AnswerOutcome, CheckRequest, ComprehensionCheck};
pub use fallback::fallback_check;
pub use generator::{CheckError, CheckGenerator};
pub use openai::{AiConfig, AiProvider, ChatCompletionsGenerator};
pub use orchestrator::{QuizOrchestrator, QuizState};
