pub mod content;
pub mod document;

pub use content::ContentUnit;
pub use document::{Document, DocumentKind, DocumentSummary};
