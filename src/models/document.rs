//! Document-related data models.
//!
//! - `DocumentKind`: source format detected at import time
//! - `Document`, `DocumentSummary`: rows of the document store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentUnit;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    PlainText,
    Markdown,
    Html,
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::PlainText => "text/plain",
            DocumentKind::Markdown => "text/markdown",
            DocumentKind::Html => "text/html",
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Docx => DOCX_MIME,
        }
    }

    pub fn from_mime(value: &str) -> Option<Self> {
        match value {
            "text/plain" => Some(DocumentKind::PlainText),
            "text/markdown" => Some(DocumentKind::Markdown),
            "text/html" => Some(DocumentKind::Html),
            "application/pdf" => Some(DocumentKind::Pdf),
            DOCX_MIME => Some(DocumentKind::Docx),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(DocumentKind::PlainText),
            "md" | "markdown" => Some(DocumentKind::Markdown),
            "html" | "htm" => Some(DocumentKind::Html),
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub kind: DocumentKind,
    pub created_at: DateTime<Utc>,
    pub sections: Vec<ContentUnit>,
}

/// Entry of the document history list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub section_count: u32,
}
