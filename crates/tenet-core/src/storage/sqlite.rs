//! SQLite repository implementations
//!
//! One [`Database`] handle with separate reader/writer connections behind
//! mutexes; the three repositories share it through an `Arc`. Locking is
//! invisible to callers. Embeddings are stored as little-endian f32 BLOBs
//! with an explicit dimension column so a record either carries a complete
//! vector or none.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};

use crate::embedding::Embedding;
use crate::error::{MemoryError, Result};
use crate::model::{
    Belief, BeliefConflict, BeliefRelationship, CategoryLabel, ConflictResolution,
    ConflictSeverity, FilterOptions, MemoryMetadata, MemoryRecord, Polarity, RelationshipType,
};
use crate::search::{
    CandidateSource, KeywordCandidate, ScoredId, SearchScope, VectorCandidate,
};

#[cfg(feature = "vector-search")]
use crate::search::NativeVectorIndex;

use super::{BeliefRepo, MemoryRepo, RelationshipRepo};

// ============================================================================
// DATABASE HANDLE
// ============================================================================

/// Shared SQLite handle with separate reader and writer connections
///
/// All repository methods take `&self`; interior mutexes make the handle
/// `Send + Sync` so it can sit behind an `Arc` without an outer lock.
pub struct Database {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) a database file and apply migrations
    pub fn open(path: &Path) -> Result<Arc<Self>> {
        let writer = Connection::open(path)?;
        Self::configure_connection(&writer)?;
        super::migrations::apply_migrations(&writer)?;

        let reader = Connection::open(path)?;
        Self::configure_connection(&reader)?;

        Ok(Arc::new(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        }))
    }

    /// Open a private in-memory database (shared between the two
    /// connections via SQLite shared cache)
    pub fn open_in_memory() -> Result<Arc<Self>> {
        let uri = format!("file:tenet-{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;

        let writer = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&writer)?;
        super::migrations::apply_migrations(&writer)?;

        let reader = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&reader)?;

        Ok(Arc::new(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        }))
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    pub(crate) fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| MemoryError::StorageMessage("writer lock poisoned".into()))
    }

    pub(crate) fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| MemoryError::StorageMessage("reader lock poisoned".into()))
    }

    fn ping(&self) -> Result<()> {
        let reader = self.reader()?;
        reader.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

// ============================================================================
// ROW MAPPING HELPERS
// ============================================================================

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn embedding_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<f32>>> {
    let blob: Option<Vec<u8>> = row.get(idx)?;
    match blob {
        Some(bytes) => {
            let embedding = Embedding::from_bytes(&bytes).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Blob,
                    "ragged embedding blob".into(),
                )
            })?;
            Ok(Some(embedding.vector))
        }
        None => Ok(None),
    }
}

fn polarity_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Polarity> {
    let raw: String = row.get(idx)?;
    Ok(match raw.as_str() {
        "negative" => Polarity::Negative,
        _ => Polarity::Positive,
    })
}

const MEMORY_COLUMNS: &str = "id, agent_id, content, category, metadata, importance, \
     meta_source, access_count, last_accessed, embedding, embedding_dims, active, \
     created_at, last_updated, version";

fn row_to_memory(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let category: CategoryLabel = json_column(row, 3)?;
    let mut metadata: MemoryMetadata = json_column(row, 4)?;
    // Access tracking lives in its own columns; the JSON copy may lag
    metadata.access_count = row.get(7)?;
    metadata.last_accessed = row.get(8)?;

    Ok(MemoryRecord {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        content: row.get(2)?,
        category,
        metadata,
        embedding: embedding_column(row, 9)?,
        created_at: row.get(12)?,
        last_updated: row.get(13)?,
        version: row.get(14)?,
    })
}

const BELIEF_COLUMNS: &str = "id, agent_id, statement, confidence, polarity, \
     evidence_memory_ids, category, reinforcement_count, active, tags, embedding, \
     embedding_dims, created_at, last_updated, version";

fn row_to_belief(row: &Row<'_>) -> rusqlite::Result<Belief> {
    Ok(Belief {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        statement: row.get(2)?,
        confidence: row.get(3)?,
        polarity: polarity_column(row, 4)?,
        evidence_memory_ids: json_column(row, 5)?,
        category: json_column(row, 6)?,
        reinforcement_count: row.get(7)?,
        active: row.get(8)?,
        tags: json_column(row, 9)?,
        embedding: embedding_column(row, 10)?,
        created_at: row.get(12)?,
        last_updated: row.get(13)?,
        version: row.get(14)?,
    })
}

const RELATIONSHIP_COLUMNS: &str = "id, source_belief_id, target_belief_id, agent_id, \
     relationship_type, strength, metadata, active, effective_from, effective_until, \
     deprecation_reason, priority, created_at, last_updated";

fn row_to_relationship(row: &Row<'_>) -> rusqlite::Result<BeliefRelationship> {
    let type_raw: String = row.get(4)?;
    let relationship_type = RelationshipType::parse_name(&type_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown relationship type {type_raw}").into(),
        )
    })?;
    let metadata: Option<String> = row.get(6)?;
    let metadata = match metadata {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(BeliefRelationship {
        id: row.get(0)?,
        source_belief_id: row.get(1)?,
        target_belief_id: row.get(2)?,
        agent_id: row.get(3)?,
        relationship_type,
        strength: row.get(5)?,
        metadata,
        active: row.get(7)?,
        effective_from: row.get(8)?,
        effective_until: row.get(9)?,
        deprecation_reason: row.get(10)?,
        priority: row.get(11)?,
        created_at: row.get(12)?,
        last_updated: row.get(13)?,
    })
}

const CONFLICT_COLUMNS: &str = "id, belief_id, memory_id, conflicting_belief_id, agent_id, \
     description, resolution, resolution_details, resolution_confidence, detected_at, \
     resolved_at, resolved, severity";

fn row_to_conflict(row: &Row<'_>) -> rusqlite::Result<BeliefConflict> {
    let resolution: Option<String> = row.get(6)?;
    let severity_raw: String = row.get(12)?;

    Ok(BeliefConflict {
        id: row.get(0)?,
        belief_id: row.get(1)?,
        memory_id: row.get(2)?,
        conflicting_belief_id: row.get(3)?,
        agent_id: row.get(4)?,
        description: row.get(5)?,
        resolution: resolution.as_deref().and_then(ConflictResolution::parse_name),
        resolution_details: row.get(7)?,
        resolution_confidence: row.get(8)?,
        detected_at: row.get(9)?,
        resolved_at: row.get(10)?,
        resolved: row.get(11)?,
        severity: ConflictSeverity::parse_name(&severity_raw).unwrap_or(ConflictSeverity::Low),
    })
}

fn json_string<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Escape `%`, `_`, and the escape character itself for a LIKE pattern
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("%{escaped}%")
}

// ============================================================================
// MEMORY REPOSITORY
// ============================================================================

/// SQLite-backed memory repository
pub struct SqliteMemoryRepo {
    db: Arc<Database>,
    #[cfg(feature = "vector-search")]
    index: Mutex<NativeVectorIndex>,
}

impl SqliteMemoryRepo {
    /// Create the repository over a shared database handle.
    ///
    /// `embedding_dims` sizes the native index when the `vector-search`
    /// feature is enabled; existing embeddings are loaded into it.
    pub fn new(db: Arc<Database>, embedding_dims: usize) -> Result<Self> {
        #[cfg(not(feature = "vector-search"))]
        let _ = embedding_dims;

        let repo = Self {
            db,
            #[cfg(feature = "vector-search")]
            index: Mutex::new(NativeVectorIndex::new(embedding_dims)?),
        };

        #[cfg(feature = "vector-search")]
        repo.load_index()?;

        Ok(repo)
    }

    #[cfg(feature = "vector-search")]
    fn load_index(&self) -> Result<()> {
        let rows: Vec<(String, Vec<u8>)> = {
            let reader = self.db.reader()?;
            let mut stmt = reader
                .prepare("SELECT id, embedding FROM memories WHERE embedding IS NOT NULL")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut index = self.index_guard()?;
        for (id, blob) in rows {
            if let Some(embedding) = Embedding::from_bytes(&blob) {
                if let Err(e) = index.upsert(&id, &embedding.vector) {
                    tracing::warn!(memory_id = %id, error = %e, "skipping embedding during index load");
                }
            }
        }
        Ok(())
    }

    #[cfg(feature = "vector-search")]
    fn index_guard(&self) -> Result<MutexGuard<'_, NativeVectorIndex>> {
        self.index
            .lock()
            .map_err(|_| MemoryError::StorageMessage("vector index lock poisoned".into()))
    }

    fn scope_clause(scope: &SearchScope, params: &mut Vec<Value>) -> String {
        let mut clause = String::new();
        if let Some(agent_id) = &scope.agent_id {
            clause.push_str(" AND agent_id = ?");
            params.push(Value::Text(agent_id.clone()));
        }
        if !scope.include_inactive {
            clause.push_str(" AND active = 1");
        }
        clause
    }
}

impl MemoryRepo for SqliteMemoryRepo {
    fn insert(&self, record: &MemoryRecord) -> Result<()> {
        let embedding_blob = record
            .embedding
            .as_ref()
            .map(|v| Embedding::new(v.clone()).to_bytes());
        let embedding_dims = record.embedding.as_ref().map(|v| v.len() as i64);

        {
            let writer = self.db.writer()?;
            writer.execute(
                "INSERT INTO memories (
                    id, agent_id, content, category, category_primary, category_confidence,
                    metadata, importance, meta_source, access_count, last_accessed,
                    embedding, embedding_dims, active, created_at, last_updated, version
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    record.id,
                    record.agent_id,
                    record.content,
                    json_string(&record.category),
                    record.category.primary,
                    record.category.confidence,
                    json_string(&record.metadata),
                    record.metadata.importance,
                    record.metadata.source,
                    record.metadata.access_count,
                    record.metadata.last_accessed,
                    embedding_blob,
                    embedding_dims,
                    true,
                    record.created_at,
                    record.last_updated,
                    record.version,
                ],
            )?;
        }

        #[cfg(feature = "vector-search")]
        if let Some(vector) = &record.embedding {
            self.index_guard()?.upsert(&record.id, vector)?;
        }

        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let reader = self.db.reader()?;
        let record = reader
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                [id],
                row_to_memory,
            )
            .optional()?;
        Ok(record)
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<MemoryRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get(id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn find_by_agent(
        &self,
        agent_id: &str,
        filter: &FilterOptions,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let now = Utc::now();
        let mut sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE agent_id = ?");
        let mut values: Vec<Value> = vec![Value::Text(agent_id.to_string())];

        if filter.active_only {
            sql.push_str(" AND active = 1");
        }
        if let Some(category) = &filter.category {
            sql.push_str(" AND category_primary = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(since) = filter.effective_since(now) {
            sql.push_str(" AND created_at >= ?");
            values.push(Value::Text(since.to_rfc3339()));
        }
        if let Some(until) = filter.until {
            sql.push_str(" AND created_at <= ?");
            values.push(Value::Text(until.to_rfc3339()));
        }
        if let Some(source) = &filter.source {
            sql.push_str(" AND meta_source = ?");
            values.push(Value::Text(source.clone()));
        }
        if let Some(min_conf) = filter.min_category_confidence {
            sql.push_str(" AND category_confidence >= ?");
            values.push(Value::Real(min_conf));
        }
        if let Some(min_access) = filter.min_access_count {
            sql.push_str(" AND access_count >= ?");
            values.push(Value::Integer(min_access));
        }
        if let Some(min_rel) = filter.min_relevance_score {
            sql.push_str(" AND importance >= ?");
            values.push(Value::Real(min_rel));
        }
        if let Some(max_rel) = filter.max_relevance_score {
            sql.push_str(" AND importance <= ?");
            values.push(Value::Real(max_rel));
        }
        if let Some(tags) = &filter.tags {
            for tag in tags {
                sql.push_str(" AND metadata LIKE ? ESCAPE '\\'");
                values.push(Value::Text(like_pattern(&format!("\"{tag}\""))));
            }
        }
        if filter.exclude_conflicted {
            sql.push_str(
                " AND NOT EXISTS (SELECT 1 FROM belief_conflicts bc \
                 WHERE bc.memory_id = memories.id AND bc.resolved = 0)",
            );
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        values.push(Value::Integer(limit as i64));

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let mut records = stmt
            .query_map(params_from_iter(values), row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Custom filters match against the metadata extra map in code
        if !filter.custom_filters.is_empty() {
            records.retain(|record| {
                filter
                    .custom_filters
                    .iter()
                    .all(|(key, expected)| record.metadata.extra.get(key) == Some(expected))
            });
        }

        Ok(records)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let changed = {
            let writer = self.db.writer()?;
            writer.execute("DELETE FROM memories WHERE id = ?1", [id])?
        };

        #[cfg(feature = "vector-search")]
        if changed > 0 {
            self.index_guard()?.remove(id)?;
        }

        Ok(changed > 0)
    }

    fn delete_many(&self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.delete(id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn increment_access(&self, id: &str) -> Result<()> {
        let writer = self.db.writer()?;
        writer.execute(
            "UPDATE memories SET access_count = access_count + 1, last_accessed = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    fn set_embedding(&self, id: &str, embedding: &Embedding) -> Result<()> {
        let changed = {
            let writer = self.db.writer()?;
            writer.execute(
                "UPDATE memories SET embedding = ?1, embedding_dims = ?2, last_updated = ?3, \
                 version = version + 1 WHERE id = ?4",
                params![
                    embedding.to_bytes(),
                    embedding.dimensions as i64,
                    Utc::now(),
                    id
                ],
            )?
        };
        if changed == 0 {
            return Err(MemoryError::NotFound(format!("memory {id}")));
        }

        #[cfg(feature = "vector-search")]
        self.index_guard()?.upsert(id, &embedding.vector)?;

        Ok(())
    }

    fn find_missing_embeddings(
        &self,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let mut sql =
            format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE embedding IS NULL");
        let mut values: Vec<Value> = Vec::new();
        if let Some(agent_id) = agent_id {
            sql.push_str(" AND agent_id = ?");
            values.push(Value::Text(agent_id.to_string()));
        }
        sql.push_str(" ORDER BY created_at ASC LIMIT ?");
        values.push(Value::Integer(limit as i64));

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn count(&self, agent_id: Option<&str>) -> Result<i64> {
        let reader = self.db.reader()?;
        let count = match agent_id {
            Some(agent_id) => reader.query_row(
                "SELECT COUNT(*) FROM memories WHERE agent_id = ?1",
                [agent_id],
                |row| row.get(0),
            )?,
            None => reader.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    fn count_with_embeddings(&self, agent_id: Option<&str>) -> Result<i64> {
        let reader = self.db.reader()?;
        let count = match agent_id {
            Some(agent_id) => reader.query_row(
                "SELECT COUNT(*) FROM memories WHERE embedding IS NOT NULL AND agent_id = ?1",
                [agent_id],
                |row| row.get(0),
            )?,
            None => reader.query_row(
                "SELECT COUNT(*) FROM memories WHERE embedding IS NOT NULL",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }

    fn as_candidate_source(&self) -> &dyn CandidateSource {
        self
    }

    fn ping(&self) -> Result<()> {
        self.db.ping()
    }
}

impl CandidateSource for SqliteMemoryRepo {
    fn vector_candidates(&self, scope: &SearchScope) -> Result<Vec<VectorCandidate>> {
        let mut values: Vec<Value> = Vec::new();
        let clause = Self::scope_clause(scope, &mut values);
        let sql = format!(
            "SELECT id, embedding FROM memories WHERE embedding IS NOT NULL{clause}"
        );

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                let id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, blob))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, blob)| {
                Embedding::from_bytes(&blob).map(|e| VectorCandidate { id, vector: e.vector })
            })
            .collect())
    }

    fn keyword_candidates(
        &self,
        keywords: &[String],
        scope: &SearchScope,
    ) -> Result<Vec<KeywordCandidate>> {
        if keywords.is_empty() {
            return Ok(vec![]);
        }

        let mut values: Vec<Value> = Vec::new();
        let like_clause = keywords
            .iter()
            .map(|kw| {
                values.push(Value::Text(like_pattern(kw)));
                "content LIKE ? ESCAPE '\\'"
            })
            .collect::<Vec<_>>()
            .join(" OR ");
        let scope_clause = Self::scope_clause(scope, &mut values);
        let sql = format!(
            "SELECT id, content, category_confidence, created_at FROM memories \
             WHERE ({like_clause}){scope_clause}"
        );

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(KeywordCandidate {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    confidence: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    #[cfg(not(feature = "vector-search"))]
    fn native_search(
        &self,
        _vector: &[f32],
        _scope: &SearchScope,
        _limit: usize,
    ) -> Result<Option<Vec<ScoredId>>> {
        Ok(None)
    }

    #[cfg(feature = "vector-search")]
    fn native_search(
        &self,
        vector: &[f32],
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Option<Vec<ScoredId>>> {
        // Over-fetch: the index is agent-blind, scope filtering trims after
        let hits = self.index_guard()?.search(vector, limit.saturating_mul(4).max(limit))?;
        if hits.is_empty() {
            return Ok(Some(vec![]));
        }

        let in_scope = in_scope_ids(&self.db, "memories", &hits, scope)?;
        Ok(Some(
            hits.into_iter()
                .filter(|hit| in_scope.contains(&hit.id))
                .take(limit)
                .collect(),
        ))
    }
}

/// Check which of the scored ids survive agent/active scoping
#[cfg(feature = "vector-search")]
fn in_scope_ids(
    db: &Database,
    table: &str,
    hits: &[ScoredId],
    scope: &SearchScope,
) -> Result<std::collections::HashSet<String>> {
    let placeholders = hits.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let mut sql = format!("SELECT id FROM {table} WHERE id IN ({placeholders})");
    let mut values: Vec<Value> = hits.iter().map(|h| Value::Text(h.id.clone())).collect();
    if let Some(agent_id) = &scope.agent_id {
        sql.push_str(" AND agent_id = ?");
        values.push(Value::Text(agent_id.clone()));
    }
    if !scope.include_inactive {
        sql.push_str(" AND active = 1");
    }

    let reader = db.reader()?;
    let mut stmt = reader.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<std::collections::HashSet<_>>>()?;
    Ok(ids)
}

// ============================================================================
// BELIEF REPOSITORY
// ============================================================================

/// SQLite-backed belief repository (beliefs + conflicts)
pub struct SqliteBeliefRepo {
    db: Arc<Database>,
    #[cfg(feature = "vector-search")]
    index: Mutex<NativeVectorIndex>,
}

impl SqliteBeliefRepo {
    /// Create the repository over a shared database handle
    pub fn new(db: Arc<Database>, embedding_dims: usize) -> Result<Self> {
        #[cfg(not(feature = "vector-search"))]
        let _ = embedding_dims;

        let repo = Self {
            db,
            #[cfg(feature = "vector-search")]
            index: Mutex::new(NativeVectorIndex::new(embedding_dims)?),
        };

        #[cfg(feature = "vector-search")]
        repo.load_index()?;

        Ok(repo)
    }

    #[cfg(feature = "vector-search")]
    fn load_index(&self) -> Result<()> {
        let rows: Vec<(String, Vec<u8>)> = {
            let reader = self.db.reader()?;
            let mut stmt = reader
                .prepare("SELECT id, embedding FROM beliefs WHERE embedding IS NOT NULL")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut index = self.index_guard()?;
        for (id, blob) in rows {
            if let Some(embedding) = Embedding::from_bytes(&blob) {
                if let Err(e) = index.upsert(&id, &embedding.vector) {
                    tracing::warn!(belief_id = %id, error = %e, "skipping embedding during index load");
                }
            }
        }
        Ok(())
    }

    #[cfg(feature = "vector-search")]
    fn index_guard(&self) -> Result<MutexGuard<'_, NativeVectorIndex>> {
        self.index
            .lock()
            .map_err(|_| MemoryError::StorageMessage("vector index lock poisoned".into()))
    }

    fn insert_with(conn: &Connection, belief: &Belief) -> Result<()> {
        let embedding_blob = belief
            .embedding
            .as_ref()
            .map(|v| Embedding::new(v.clone()).to_bytes());
        let embedding_dims = belief.embedding.as_ref().map(|v| v.len() as i64);
        let polarity = match belief.polarity {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        };

        conn.execute(
            "INSERT INTO beliefs (
                id, agent_id, statement, confidence, polarity, evidence_memory_ids,
                category, category_primary, reinforcement_count, active, tags,
                embedding, embedding_dims, created_at, last_updated, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                belief.id,
                belief.agent_id,
                belief.statement,
                belief.confidence,
                polarity,
                json_string(&belief.evidence_memory_ids),
                json_string(&belief.category),
                belief.category.primary,
                belief.reinforcement_count,
                belief.active,
                json_string(&belief.tags),
                embedding_blob,
                embedding_dims,
                belief.created_at,
                belief.last_updated,
                belief.version,
            ],
        )?;
        Ok(())
    }

    fn deprecating_type_list() -> String {
        RelationshipType::DEPRECATING
            .iter()
            .map(|t| format!("'{}'", t.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl BeliefRepo for SqliteBeliefRepo {
    fn insert(&self, belief: &Belief) -> Result<()> {
        {
            let writer = self.db.writer()?;
            Self::insert_with(&writer, belief)?;
        }

        #[cfg(feature = "vector-search")]
        if let Some(vector) = &belief.embedding {
            self.index_guard()?.upsert(&belief.id, vector)?;
        }

        Ok(())
    }

    fn insert_batch(&self, beliefs: &[Belief]) -> Result<Vec<Belief>> {
        {
            let mut writer = self.db.writer()?;
            let tx = writer.transaction()?;
            for belief in beliefs {
                Self::insert_with(&tx, belief)?;
            }
            tx.commit()?;
        }

        #[cfg(feature = "vector-search")]
        {
            let mut index = self.index_guard()?;
            for belief in beliefs {
                if let Some(vector) = &belief.embedding {
                    index.upsert(&belief.id, vector)?;
                }
            }
        }

        Ok(beliefs.to_vec())
    }

    fn get(&self, id: &str) -> Result<Option<Belief>> {
        let reader = self.db.reader()?;
        let belief = reader
            .query_row(
                &format!("SELECT {BELIEF_COLUMNS} FROM beliefs WHERE id = ?1"),
                [id],
                row_to_belief,
            )
            .optional()?;
        Ok(belief)
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<Belief>> {
        let mut beliefs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(belief) = self.get(id)? {
                beliefs.push(belief);
            }
        }
        Ok(beliefs)
    }

    fn update(&self, belief: &Belief) -> Result<Belief> {
        let embedding_blob = belief
            .embedding
            .as_ref()
            .map(|v| Embedding::new(v.clone()).to_bytes());
        let embedding_dims = belief.embedding.as_ref().map(|v| v.len() as i64);
        let polarity = match belief.polarity {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        };

        let changed = {
            let writer = self.db.writer()?;
            writer.execute(
                "UPDATE beliefs SET statement = ?1, confidence = ?2, polarity = ?3, \
                 evidence_memory_ids = ?4, category = ?5, category_primary = ?6, \
                 reinforcement_count = ?7, active = ?8, tags = ?9, embedding = ?10, \
                 embedding_dims = ?11, last_updated = ?12, version = version + 1 \
                 WHERE id = ?13 AND version = ?14",
                params![
                    belief.statement,
                    belief.confidence,
                    polarity,
                    json_string(&belief.evidence_memory_ids),
                    json_string(&belief.category),
                    belief.category.primary,
                    belief.reinforcement_count,
                    belief.active,
                    json_string(&belief.tags),
                    embedding_blob,
                    embedding_dims,
                    belief.last_updated,
                    belief.id,
                    belief.version,
                ],
            )?
        };

        if changed == 0 {
            return match self.get(&belief.id)? {
                Some(_) => Err(MemoryError::Conflict {
                    entity: "belief",
                    id: belief.id.clone(),
                    expected: belief.version,
                }),
                None => Err(MemoryError::NotFound(format!("belief {}", belief.id))),
            };
        }

        #[cfg(feature = "vector-search")]
        if let Some(vector) = &belief.embedding {
            self.index_guard()?.upsert(&belief.id, vector)?;
        }

        let mut stored = belief.clone();
        stored.version += 1;
        Ok(stored)
    }

    fn find_by_agent(
        &self,
        agent_id: &str,
        include_inactive: bool,
        limit: usize,
    ) -> Result<Vec<Belief>> {
        let mut sql = format!("SELECT {BELIEF_COLUMNS} FROM beliefs WHERE agent_id = ?");
        if !include_inactive {
            sql.push_str(" AND active = 1");
        }
        sql.push_str(" ORDER BY last_updated DESC LIMIT ?");

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let beliefs = stmt
            .query_map(params![agent_id, limit as i64], row_to_belief)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(beliefs)
    }

    fn find_deprecated_belief_ids(&self, agent_id: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT target_belief_id FROM belief_relationships \
             WHERE agent_id = ?1 AND active = 1 AND relationship_type IN ({})",
            Self::deprecating_type_list()
        );
        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let ids = stmt
            .query_map([agent_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn find_superseding_belief_ids(
        &self,
        agent_id: &str,
        belief_id: &str,
    ) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT source_belief_id FROM belief_relationships \
             WHERE agent_id = ?1 AND target_belief_id = ?2 AND active = 1 \
             AND relationship_type IN ({})",
            Self::deprecating_type_list()
        );
        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let ids = stmt
            .query_map(params![agent_id, belief_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn count(&self, agent_id: Option<&str>) -> Result<i64> {
        let reader = self.db.reader()?;
        let count = match agent_id {
            Some(agent_id) => reader.query_row(
                "SELECT COUNT(*) FROM beliefs WHERE agent_id = ?1",
                [agent_id],
                |row| row.get(0),
            )?,
            None => reader.query_row("SELECT COUNT(*) FROM beliefs", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    fn insert_conflict(&self, conflict: &BeliefConflict) -> Result<()> {
        let writer = self.db.writer()?;
        writer.execute(
            "INSERT INTO belief_conflicts (
                id, belief_id, memory_id, conflicting_belief_id, agent_id, description,
                resolution, resolution_details, resolution_confidence, detected_at,
                resolved_at, resolved, severity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                conflict.id,
                conflict.belief_id,
                conflict.memory_id,
                conflict.conflicting_belief_id,
                conflict.agent_id,
                conflict.description,
                conflict.resolution.map(|r| r.as_str()),
                conflict.resolution_details,
                conflict.resolution_confidence,
                conflict.detected_at,
                conflict.resolved_at,
                conflict.resolved,
                conflict.severity.as_str(),
            ],
        )?;
        Ok(())
    }

    fn update_conflict(&self, conflict: &BeliefConflict) -> Result<()> {
        let changed = {
            let writer = self.db.writer()?;
            writer.execute(
                "UPDATE belief_conflicts SET resolution = ?1, resolution_details = ?2, \
                 resolution_confidence = ?3, resolved_at = ?4, resolved = ?5, severity = ?6 \
                 WHERE id = ?7",
                params![
                    conflict.resolution.map(|r| r.as_str()),
                    conflict.resolution_details,
                    conflict.resolution_confidence,
                    conflict.resolved_at,
                    conflict.resolved,
                    conflict.severity.as_str(),
                    conflict.id,
                ],
            )?
        };
        if changed == 0 {
            return Err(MemoryError::NotFound(format!("conflict {}", conflict.id)));
        }
        Ok(())
    }

    fn get_conflict(&self, id: &str) -> Result<Option<BeliefConflict>> {
        let reader = self.db.reader()?;
        let conflict = reader
            .query_row(
                &format!("SELECT {CONFLICT_COLUMNS} FROM belief_conflicts WHERE id = ?1"),
                [id],
                row_to_conflict,
            )
            .optional()?;
        Ok(conflict)
    }

    fn find_conflicts(
        &self,
        agent_id: &str,
        unresolved_only: bool,
    ) -> Result<Vec<BeliefConflict>> {
        let mut sql =
            format!("SELECT {CONFLICT_COLUMNS} FROM belief_conflicts WHERE agent_id = ?");
        if unresolved_only {
            sql.push_str(" AND resolved = 0");
        }
        sql.push_str(" ORDER BY detected_at DESC");

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let conflicts = stmt
            .query_map([agent_id], row_to_conflict)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conflicts)
    }

    fn count_conflicts(&self, agent_id: Option<&str>) -> Result<i64> {
        let reader = self.db.reader()?;
        let count = match agent_id {
            Some(agent_id) => reader.query_row(
                "SELECT COUNT(*) FROM belief_conflicts WHERE agent_id = ?1",
                [agent_id],
                |row| row.get(0),
            )?,
            None => {
                reader.query_row("SELECT COUNT(*) FROM belief_conflicts", [], |row| row.get(0))?
            }
        };
        Ok(count)
    }

    fn as_candidate_source(&self) -> &dyn CandidateSource {
        self
    }

    fn ping(&self) -> Result<()> {
        self.db.ping()
    }
}

impl CandidateSource for SqliteBeliefRepo {
    fn vector_candidates(&self, scope: &SearchScope) -> Result<Vec<VectorCandidate>> {
        let mut values: Vec<Value> = Vec::new();
        let mut sql =
            String::from("SELECT id, embedding FROM beliefs WHERE embedding IS NOT NULL");
        if let Some(agent_id) = &scope.agent_id {
            sql.push_str(" AND agent_id = ?");
            values.push(Value::Text(agent_id.clone()));
        }
        if !scope.include_inactive {
            sql.push_str(" AND active = 1");
        }

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                let id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, blob))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, blob)| {
                Embedding::from_bytes(&blob).map(|e| VectorCandidate { id, vector: e.vector })
            })
            .collect())
    }

    fn keyword_candidates(
        &self,
        keywords: &[String],
        scope: &SearchScope,
    ) -> Result<Vec<KeywordCandidate>> {
        if keywords.is_empty() {
            return Ok(vec![]);
        }

        let mut values: Vec<Value> = Vec::new();
        let like_clause = keywords
            .iter()
            .map(|kw| {
                values.push(Value::Text(like_pattern(kw)));
                "statement LIKE ? ESCAPE '\\'"
            })
            .collect::<Vec<_>>()
            .join(" OR ");
        let mut sql = format!(
            "SELECT id, statement, confidence, created_at FROM beliefs WHERE ({like_clause})"
        );
        if let Some(agent_id) = &scope.agent_id {
            sql.push_str(" AND agent_id = ?");
            values.push(Value::Text(agent_id.clone()));
        }
        if !scope.include_inactive {
            sql.push_str(" AND active = 1");
        }

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(KeywordCandidate {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    confidence: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    #[cfg(not(feature = "vector-search"))]
    fn native_search(
        &self,
        _vector: &[f32],
        _scope: &SearchScope,
        _limit: usize,
    ) -> Result<Option<Vec<ScoredId>>> {
        Ok(None)
    }

    #[cfg(feature = "vector-search")]
    fn native_search(
        &self,
        vector: &[f32],
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Option<Vec<ScoredId>>> {
        let hits = self.index_guard()?.search(vector, limit.saturating_mul(4).max(limit))?;
        if hits.is_empty() {
            return Ok(Some(vec![]));
        }

        let in_scope = in_scope_ids(&self.db, "beliefs", &hits, scope)?;
        Ok(Some(
            hits.into_iter()
                .filter(|hit| in_scope.contains(&hit.id))
                .take(limit)
                .collect(),
        ))
    }
}

// ============================================================================
// RELATIONSHIP REPOSITORY
// ============================================================================

/// SQLite-backed relationship repository
pub struct SqliteRelationshipRepo {
    db: Arc<Database>,
}

impl SqliteRelationshipRepo {
    /// Create the repository over a shared database handle
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn insert_with(conn: &Connection, relationship: &BeliefRelationship) -> Result<()> {
        conn.execute(
            "INSERT INTO belief_relationships (
                id, source_belief_id, target_belief_id, agent_id, relationship_type,
                strength, metadata, active, effective_from, effective_until,
                deprecation_reason, priority, created_at, last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                relationship.id,
                relationship.source_belief_id,
                relationship.target_belief_id,
                relationship.agent_id,
                relationship.relationship_type.as_str(),
                relationship.strength,
                relationship.metadata.as_ref().map(json_string),
                relationship.active,
                relationship.effective_from,
                relationship.effective_until,
                relationship.deprecation_reason,
                relationship.priority,
                relationship.created_at,
                relationship.last_updated,
            ],
        )?;
        Ok(())
    }

    fn find_where(
        &self,
        column: &str,
        value: &str,
        active_only: bool,
    ) -> Result<Vec<BeliefRelationship>> {
        let mut sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM belief_relationships WHERE {column} = ?"
        );
        if active_only {
            sql.push_str(" AND active = 1");
        }
        sql.push_str(" ORDER BY priority DESC, created_at ASC");

        let reader = self.db.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let relationships = stmt
            .query_map([value], row_to_relationship)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(relationships)
    }
}

impl RelationshipRepo for SqliteRelationshipRepo {
    fn insert(&self, relationship: &BeliefRelationship) -> Result<()> {
        let writer = self.db.writer()?;
        Self::insert_with(&writer, relationship)
    }

    fn insert_batch(
        &self,
        relationships: &[BeliefRelationship],
    ) -> Result<Vec<BeliefRelationship>> {
        let mut writer = self.db.writer()?;
        let tx = writer.transaction()?;
        for relationship in relationships {
            Self::insert_with(&tx, relationship)?;
        }
        tx.commit()?;
        Ok(relationships.to_vec())
    }

    fn get(&self, id: &str) -> Result<Option<BeliefRelationship>> {
        let reader = self.db.reader()?;
        let relationship = reader
            .query_row(
                &format!("SELECT {RELATIONSHIP_COLUMNS} FROM belief_relationships WHERE id = ?1"),
                [id],
                row_to_relationship,
            )
            .optional()?;
        Ok(relationship)
    }

    fn update(&self, relationship: &BeliefRelationship) -> Result<()> {
        let changed = {
            let writer = self.db.writer()?;
            writer.execute(
                "UPDATE belief_relationships SET relationship_type = ?1, strength = ?2, \
                 metadata = ?3, active = ?4, effective_from = ?5, effective_until = ?6, \
                 deprecation_reason = ?7, priority = ?8, last_updated = ?9 WHERE id = ?10",
                params![
                    relationship.relationship_type.as_str(),
                    relationship.strength,
                    relationship.metadata.as_ref().map(json_string),
                    relationship.active,
                    relationship.effective_from,
                    relationship.effective_until,
                    relationship.deprecation_reason,
                    relationship.priority,
                    Utc::now(),
                    relationship.id,
                ],
            )?
        };
        if changed == 0 {
            return Err(MemoryError::NotFound(format!(
                "relationship {}",
                relationship.id
            )));
        }
        Ok(())
    }

    fn deactivate(&self, id: &str) -> Result<bool> {
        let writer = self.db.writer()?;
        let changed = writer.execute(
            "UPDATE belief_relationships SET active = 0, last_updated = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(changed > 0)
    }

    fn find_by_source(
        &self,
        belief_id: &str,
        active_only: bool,
    ) -> Result<Vec<BeliefRelationship>> {
        self.find_where("source_belief_id", belief_id, active_only)
    }

    fn find_by_target(
        &self,
        belief_id: &str,
        active_only: bool,
    ) -> Result<Vec<BeliefRelationship>> {
        self.find_where("target_belief_id", belief_id, active_only)
    }

    fn find_by_agent(&self, agent_id: &str, active_only: bool) -> Result<Vec<BeliefRelationship>> {
        self.find_where("agent_id", agent_id, active_only)
    }

    fn close_outgoing(&self, belief_id: &str, until: DateTime<Utc>) -> Result<usize> {
        let writer = self.db.writer()?;
        let changed = writer.execute(
            "UPDATE belief_relationships SET effective_until = ?1, last_updated = ?2 \
             WHERE source_belief_id = ?3 AND active = 1 AND effective_until IS NULL",
            params![until, Utc::now(), belief_id],
        )?;
        Ok(changed)
    }

    fn count(&self, agent_id: Option<&str>) -> Result<i64> {
        let reader = self.db.reader()?;
        let count = match agent_id {
            Some(agent_id) => reader.query_row(
                "SELECT COUNT(*) FROM belief_relationships WHERE agent_id = ?1",
                [agent_id],
                |row| row.get(0),
            )?,
            None => reader.query_row("SELECT COUNT(*) FROM belief_relationships", [], |row| {
                row.get(0)
            })?,
        };
        Ok(count)
    }

    fn ping(&self) -> Result<()> {
        self.db.ping()
    }
}

// ============================================================================
// TESTS
// ============================================================================
