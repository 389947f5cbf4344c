//! Content items, chunks, glossaries and annotations

use super::Database;
use crate::error::{Result, TransferError};
use crate::model::{ContentLocator, Locator};
use crate::store::{Annotation, AnnotationKind, ContentSnapshot, ContentSource, GlossaryTerm};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Importable content document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentDocument {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub chunks: Vec<ChunkDocument>,
    #[serde(default)]
    pub glossary: Vec<GlossaryTerm>,
    #[serde(default)]
    pub secondary_glossary: Vec<GlossaryTerm>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Summary of a stored content item
#[derive(Debug, Clone, Serialize)]
pub struct ContentInfo {
    pub id: String,
    pub title: Option<String>,
    pub chunk_count: usize,
    pub imported_at: String,
}

impl ContentDocument {
    /// Load a JSON document from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let doc: ContentDocument = serde_json::from_str(&raw)?;
        if doc.id.trim().is_empty() {
            return Err(TransferError::InvalidInput(
                "content document has an empty id".to_string(),
            ));
        }
        Ok(doc)
    }
}

struct ContentRow {
    title: Option<String>,
    content_type: Option<String>,
    subject: Option<String>,
    topic: Option<String>,
    tags: String,
}

impl Database {
    /// Store a content document, replacing any previous import of the same id
    pub fn import_content(&self, doc: &ContentDocument) -> Result<ContentInfo> {
        let now = Utc::now().to_rfc3339();
        let tags = serde_json::to_string(&doc.tags)?;

        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;

            tx.execute("DELETE FROM content_chunks WHERE content_id = ?1", params![doc.id])?;
            tx.execute("DELETE FROM glossary_terms WHERE content_id = ?1", params![doc.id])?;
            tx.execute("DELETE FROM annotations WHERE content_id = ?1", params![doc.id])?;
            tx.execute(
                "INSERT OR REPLACE INTO contents (id, title, content_type, subject, topic, tags, imported_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![doc.id, doc.title, doc.content_type, doc.subject, doc.topic, tags, now],
            )?;

            for (seq, chunk) in doc.chunks.iter().enumerate() {
                tx.execute(
                    "INSERT INTO content_chunks (content_id, seq, chunk_id, page, text)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![doc.id, seq as i64, chunk.id, chunk.page, chunk.text],
                )?;
            }

            for (source, terms) in [("primary", &doc.glossary), ("secondary", &doc.secondary_glossary)] {
                for (position, term) in terms.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO glossary_terms (content_id, source, position, term, definition)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![doc.id, source, position as i64, term.term, term.definition],
                    )?;
                }
            }

            for annotation in &doc.annotations {
                tx.execute(
                    "INSERT INTO annotations (content_id, kind, tag, text, page, cue_terms)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        doc.id,
                        annotation.kind.as_str(),
                        annotation.tag,
                        annotation.text,
                        annotation.page,
                        serde_json::to_string(&annotation.cue_terms)?,
                    ],
                )?;
            }

            tx.commit()?;
        }

        tracing::info!(
            content_id = %doc.id,
            chunks = doc.chunks.len(),
            "Imported content"
        );

        Ok(ContentInfo {
            id: doc.id.clone(),
            title: doc.title.clone(),
            chunk_count: doc.chunks.len(),
            imported_at: now,
        })
    }

    /// Whether a content item exists
    pub fn content_exists(&self, content_id: &str) -> Result<bool> {
        let exists: bool = self.conn()?.query_row(
            "SELECT COUNT(*) > 0 FROM contents WHERE id = ?1",
            params![content_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Build the extractor input for a locator
    pub fn load_snapshot(&self, locator: &ContentLocator) -> Result<Option<ContentSnapshot>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                "SELECT title, content_type, subject, topic, tags FROM contents WHERE id = ?1",
                params![locator.content_id],
                |row| {
                    Ok(ContentRow {
                        title: row.get(0)?,
                        content_type: row.get(1)?,
                        subject: row.get(2)?,
                        topic: row.get(3)?,
                        tags: row.get(4)?,
                    })
                },
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let texts: Vec<Option<String>> = {
            let (sql, discriminator): (&str, Value) = match &locator.locator {
                Locator::ChunkId(id) => (
                    "SELECT text FROM content_chunks WHERE content_id = ?1 AND chunk_id = ?2 ORDER BY seq",
                    Value::Text(id.clone()),
                ),
                Locator::ChunkIndex(idx) => (
                    "SELECT text FROM content_chunks WHERE content_id = ?1 AND seq = ?2",
                    Value::Integer(i64::from(*idx)),
                ),
                Locator::Page(page) => (
                    "SELECT text FROM content_chunks WHERE content_id = ?1 AND page = ?2 ORDER BY seq",
                    Value::Integer(i64::from(*page)),
                ),
                Locator::Whole => (
                    "SELECT text FROM content_chunks WHERE content_id = ?1 AND ?2 IS NULL ORDER BY seq",
                    Value::Null,
                ),
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params![locator.content_id, discriminator], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        let joined = texts
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let text = if joined.is_empty() { None } else { Some(joined) };

        let mut glossary = Vec::new();
        let mut secondary_glossary = Vec::new();
        {
            let mut stmt = conn.prepare(
                "SELECT source, term, definition FROM glossary_terms
                 WHERE content_id = ?1 ORDER BY source, position",
            )?;
            let rows = stmt.query_map(params![locator.content_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    GlossaryTerm {
                        term: row.get(1)?,
                        definition: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (source, term) = row?;
                if source == "secondary" {
                    secondary_glossary.push(term);
                } else {
                    glossary.push(term);
                }
            }
        }

        let page_filter = match locator.locator {
            Locator::Page(page) => Some(page),
            _ => None,
        };
        let raw_annotations: Vec<(String, Option<String>, String, Option<u32>, String)> = {
            let mut stmt = conn.prepare(
                "SELECT kind, tag, text, page, cue_terms FROM annotations
                 WHERE content_id = ?1 AND (?2 IS NULL OR page IS NULL OR page = ?2)
                 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![locator.content_id, page_filter], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        drop(conn);

        let mut annotations = Vec::with_capacity(raw_annotations.len());
        for (kind, tag, text, page, cue_terms) in raw_annotations {
            let Some(kind) = AnnotationKind::parse(&kind) else {
                tracing::warn!(kind = %kind, "Skipping annotation of unknown kind");
                continue;
            };
            annotations.push(Annotation {
                kind,
                tag,
                text,
                page,
                cue_terms: serde_json::from_str(&cue_terms).unwrap_or_default(),
            });
        }

        Ok(Some(ContentSnapshot {
            content_id: locator.content_id.clone(),
            title: row.title,
            content_type: row.content_type,
            subject: row.subject,
            topic: row.topic,
            tags: serde_json::from_str(&row.tags).unwrap_or_default(),
            glossary,
            secondary_glossary,
            text,
            annotations,
        }))
    }

    /// Chunk locators of a content item in reading order
    pub fn chunk_locators(&self, content_id: &str) -> Result<Vec<ContentLocator>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT seq, chunk_id FROM content_chunks WHERE content_id = ?1 ORDER BY seq",
        )?;
        let locators = stmt
            .query_map(params![content_id], |row| {
                let seq: i64 = row.get(0)?;
                let chunk_id: Option<String> = row.get(1)?;
                Ok(match chunk_id {
                    Some(id) => ContentLocator::chunk_id(content_id, id),
                    None => ContentLocator::chunk_index(content_id, seq as u32),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(locators)
    }

    /// List imported content items
    pub fn list_contents(&self) -> Result<Vec<ContentInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.title, c.imported_at,
                    (SELECT COUNT(*) FROM content_chunks k WHERE k.content_id = c.id)
             FROM contents c ORDER BY c.id",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok(ContentInfo {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    imported_at: row.get(2)?,
                    chunk_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

#[async_trait]
impl ContentSource for Database {
    async fn snapshot(&self, locator: &ContentLocator) -> Result<Option<ContentSnapshot>> {
        self.load_snapshot(locator)
    }

    async fn list_locators(&self, content_id: &str) -> Result<Vec<ContentLocator>> {
        let locators = self.chunk_locators(content_id)?;
        if locators.is_empty() && self.content_exists(content_id)? {
            return Ok(vec![ContentLocator::whole(content_id)]);
        }
        Ok(locators)
    }
}
