//! Transfer metadata persistence

use super::Database;
use crate::error::{Result, TransferError};
use crate::model::{ContentLocator, ExtractionScope, Locator, ScopeKind, StoredMetadata};
use crate::store::MetadataStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const SELECT_COLUMNS: &str = "id, content_id, locator, scope_kind, family_id, institution_id,
     result, version, created_at, updated_at, created_by";

/// Row as read from SQLite, before JSON and timestamp decoding
struct RawRow {
    id: String,
    content_id: String,
    locator: String,
    scope_kind: String,
    family_id: Option<String>,
    institution_id: Option<String>,
    result: String,
    version: String,
    created_at: String,
    updated_at: String,
    created_by: Option<String>,
}

fn map_raw_row(row: &Row) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        content_id: row.get(1)?,
        locator: row.get(2)?,
        scope_kind: row.get(3)?,
        family_id: row.get(4)?,
        institution_id: row.get(5)?,
        result: row.get(6)?,
        version: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        created_by: row.get(10)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TransferError::Parse(format!("invalid timestamp '{}': {}", value, e)))
}

impl TryFrom<RawRow> for StoredMetadata {
    type Error = TransferError;

    fn try_from(raw: RawRow) -> Result<Self> {
        let locator: Locator = serde_json::from_str(&raw.locator)?;
        Ok(StoredMetadata {
            id: raw.id,
            locator: ContentLocator {
                content_id: raw.content_id,
                locator,
            },
            scope: ExtractionScope {
                kind: ScopeKind::parse(&raw.scope_kind)?,
                family_id: raw.family_id,
                institution_id: raw.institution_id,
            },
            result: serde_json::from_str(&raw.result)?,
            version: raw.version,
            created_at: parse_timestamp(&raw.created_at)?,
            updated_at: parse_timestamp(&raw.updated_at)?,
            created_by: raw.created_by,
        })
    }
}

impl Database {
    /// Insert or update the row for a record's locator and scope.
    ///
    /// Conflicts on the unique (content, locator, partition) index update the
    /// existing row in place, so its id and creation time survive.
    pub fn upsert_metadata(&self, record: &StoredMetadata) -> Result<StoredMetadata> {
        let locator = serde_json::to_string(&record.locator.locator)?;
        let result = serde_json::to_string(&record.result)?;
        let partition = record.scope.partition_key();
        let now = Utc::now().to_rfc3339();

        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO transfer_metadata
                    (id, content_id, locator, locator_disc, scope_kind, scope_partition,
                     family_id, institution_id, result, version, created_at, updated_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(content_id, locator, scope_partition) DO UPDATE SET
                    result = excluded.result,
                    version = excluded.version,
                    updated_at = excluded.updated_at,
                    created_by = COALESCE(transfer_metadata.created_by, excluded.created_by)",
                params![
                    record.id,
                    record.locator.content_id,
                    locator,
                    record.locator.locator.discriminator(),
                    record.scope.kind.as_str(),
                    partition,
                    record.scope.family_id,
                    record.scope.institution_id,
                    result,
                    record.version,
                    record.created_at.to_rfc3339(),
                    now,
                    record.created_by,
                ],
            )?;
        }

        self.get_metadata(&record.locator, &record.scope)?
            .ok_or_else(|| {
                TransferError::StoreUnavailable(format!(
                    "row for {} vanished after upsert",
                    record.locator
                ))
            })
    }

    /// Row for a locator and scope
    pub fn get_metadata(
        &self,
        locator: &ContentLocator,
        scope: &ExtractionScope,
    ) -> Result<Option<StoredMetadata>> {
        let locator_json = serde_json::to_string(&locator.locator)?;
        let raw = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM transfer_metadata
                     WHERE content_id = ?1 AND locator = ?2 AND scope_partition = ?3",
                    SELECT_COLUMNS
                ),
                params![locator.content_id, locator_json, scope.partition_key()],
                map_raw_row,
            )
            .optional()?;

        raw.map(StoredMetadata::try_from).transpose()
    }

    /// All rows of a content item in one scope partition
    pub fn list_metadata(
        &self,
        content_id: &str,
        scope: &ExtractionScope,
    ) -> Result<Vec<StoredMetadata>> {
        let raws = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transfer_metadata
                 WHERE content_id = ?1 AND scope_partition = ?2
                 ORDER BY locator_disc",
                SELECT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![content_id, scope.partition_key()], map_raw_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        raws.into_iter().map(StoredMetadata::try_from).collect()
    }

    /// Number of rows for a locator across every scope partition
    pub fn count_metadata(&self, locator: &ContentLocator) -> Result<usize> {
        let locator_json = serde_json::to_string(&locator.locator)?;
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM transfer_metadata WHERE content_id = ?1 AND locator = ?2",
            params![locator.content_id, locator_json],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl MetadataStore for Database {
    async fn upsert(&self, record: StoredMetadata) -> Result<StoredMetadata> {
        self.upsert_metadata(&record)
    }

    async fn find_by_locator(
        &self,
        locator: &ContentLocator,
        scope: &ExtractionScope,
    ) -> Result<Option<StoredMetadata>> {
        self.get_metadata(locator, scope)
    }

    async fn find_all_for_content(
        &self,
        content_id: &str,
        scope: &ExtractionScope,
    ) -> Result<Vec<StoredMetadata>> {
        self.list_metadata(content_id, scope)
    }
}
