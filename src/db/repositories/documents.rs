use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    helpers::{parse_datetime, parse_kind, to_u32},
    Database,
};
use crate::models::{ContentUnit, Document, DocumentKind, DocumentSummary};

fn row_to_summary(row: &Row) -> Result<DocumentSummary> {
    let created_at: String = row.get("created_at")?;
    Ok(DocumentSummary {
        id: row.get("id")?,
        title: row.get("title")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        section_count: to_u32(row.get("section_count")?, "section_count")?,
    })
}

impl Database {
    /// Stores a parsed document with its sections in their original order.
    pub async fn insert_document(
        &self,
        title: String,
        kind: DocumentKind,
        sections: Vec<ContentUnit>,
    ) -> Result<Document> {
        self.execute(move |conn| {
            let document = Document {
                id: Uuid::new_v4().to_string(),
                title,
                kind,
                created_at: Utc::now(),
                sections,
            };

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO documents (id, title, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    document.id,
                    document.title,
                    document.kind.as_str(),
                    // fixed width so the text column sorts chronologically
                    document.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                ],
            )
            .context("failed to insert document")?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO sections (document_id, sort_order, unit_id, title, content)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (sort_order, section) in document.sections.iter().enumerate() {
                    stmt.execute(params![
                        document.id,
                        sort_order as i64,
                        section.id,
                        section.title,
                        section.text,
                    ])
                    .with_context(|| format!("failed to insert section {}", section.id))?;
                }
            }

            tx.commit().context("failed to commit document")?;
            Ok(document)
        })
        .await
    }

    /// Newest first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.title, d.created_at, COUNT(s.sort_order) AS section_count
                 FROM documents d
                 LEFT JOIN sections s ON s.document_id = d.id
                 GROUP BY d.id
                 ORDER BY d.created_at DESC, d.rowid DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut documents = Vec::new();
            while let Some(row) = rows.next()? {
                documents.push(row_to_summary(row)?);
            }

            Ok(documents)
        })
        .await
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let document_id = document_id.to_string();
        self.execute(move |conn| {
            let header = conn
                .query_row(
                    "SELECT id, title, kind, created_at FROM documents WHERE id = ?1",
                    params![document_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((id, title, kind, created_at)) = header else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT unit_id, title, content FROM sections
                 WHERE document_id = ?1
                 ORDER BY sort_order ASC",
            )?;
            let mut rows = stmt.query(params![id])?;
            let mut sections = Vec::new();
            while let Some(row) = rows.next()? {
                sections.push(ContentUnit {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    text: row.get(2)?,
                });
            }

            Ok(Some(Document {
                id,
                title,
                kind: parse_kind(&kind)?,
                created_at: parse_datetime(&created_at, "created_at")?,
                sections,
            }))
        })
        .await
    }
}
