//! Document persistence: placeholder lists and conversation logs keyed by document id.
//!
//! Two backends implement `DocumentStore`: Postgres for deployments and an in-process
//! map for local runs and tests. Placeholder lists are always read and written whole.
//! Writes are guarded by the document's `version` (optimistic concurrency): a writer
//! must present the version it read, otherwise nothing is written.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::placeholders::models::{recent_window, ConversationTurn, PlaceholderRecord, Role};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document {0} does not exist")]
    NotFound(Uuid),

    #[error("document {id} was modified concurrently (expected version {expected}); reload and retry")]
    VersionConflict { id: Uuid, expected: i64 },

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// A stored document and its current placeholder schema.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub filename: String,
    pub placeholders: Vec<PlaceholderRecord>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(
        &self,
        filename: &str,
        placeholders: &[PlaceholderRecord],
    ) -> Result<DocumentRecord, StoreError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StoreError>;

    /// Replaces the full placeholder list if the stored version still equals
    /// `expected_version`. Returns the new version.
    async fn replace_placeholders(
        &self,
        id: Uuid,
        expected_version: i64,
        placeholders: &[PlaceholderRecord],
    ) -> Result<i64, StoreError>;

    /// Commits one conversational exchange atomically: the placeholder list (when
    /// `placeholders` is set, under the same version check as `replace_placeholders`)
    /// and the turns. On conflict neither is written.
    async fn record_exchange(
        &self,
        id: Uuid,
        expected_version: i64,
        placeholders: Option<&[PlaceholderRecord]>,
        turns: &[ConversationTurn],
    ) -> Result<(), StoreError>;

    /// Appends turns to the end of the document's conversation log.
    async fn append_turns(&self, id: Uuid, turns: &[ConversationTurn]) -> Result<(), StoreError>;

    /// The last `limit` turns, oldest first.
    async fn recent_turns(&self, id: Uuid, limit: usize)
        -> Result<Vec<ConversationTurn>, StoreError>;

    /// The full conversation log, oldest first.
    async fn conversation(&self, id: Uuid) -> Result<Vec<ConversationTurn>, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    filename: String,
    placeholders: Json<Vec<PlaceholderRecord>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for DocumentRecord {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            filename: row.filename,
            placeholders: row.placeholders.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TurnRow {
    role: String,
    content: String,
}

impl TryFrom<TurnRow> for ConversationTurn {
    type Error = StoreError;

    fn try_from(row: TurnRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown conversation role '{}'", row.role)))?;
        Ok(ConversationTurn {
            role,
            content: row.content,
        })
    }
}

/// Compare-and-swap on version: zero rows means stale or missing.
const REPLACE_PLACEHOLDERS_SQL: &str = r#"
    UPDATE documents
    SET placeholders = $1, version = version + 1, updated_at = NOW()
    WHERE id = $2 AND version = $3
    RETURNING version
"#;

async fn insert_turns(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    turns: &[ConversationTurn],
) -> Result<(), StoreError> {
    for turn in turns {
        sqlx::query("INSERT INTO conversation_turns (document_id, role, content) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_exists(&self, id: Uuid) -> Result<(), StoreError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        exists.map(|_| ()).ok_or(StoreError::NotFound(id))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create_document(
        &self,
        filename: &str,
        placeholders: &[PlaceholderRecord],
    ) -> Result<DocumentRecord, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (id, filename, placeholders, version)
            VALUES ($1, $2, $3, 1)
            RETURNING id, filename, placeholders, version, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(filename)
        .bind(Json(placeholders))
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted document {} ({} placeholders)", row.id, placeholders.len());
        Ok(row.into())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, filename, placeholders, version, created_at, updated_at FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn replace_placeholders(
        &self,
        id: Uuid,
        expected_version: i64,
        placeholders: &[PlaceholderRecord],
    ) -> Result<i64, StoreError> {
        let new_version: Option<i64> = sqlx::query_scalar(REPLACE_PLACEHOLDERS_SQL)
            .bind(Json(placeholders))
            .bind(id)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        match new_version {
            Some(v) => Ok(v),
            None => {
                self.ensure_exists(id).await?;
                Err(StoreError::VersionConflict {
                    id,
                    expected: expected_version,
                })
            }
        }
    }

    async fn record_exchange(
        &self,
        id: Uuid,
        expected_version: i64,
        placeholders: Option<&[PlaceholderRecord]>,
        turns: &[ConversationTurn],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Some(placeholders) = placeholders {
            let new_version: Option<i64> = sqlx::query_scalar(REPLACE_PLACEHOLDERS_SQL)
                .bind(Json(placeholders))
                .bind(id)
                .bind(expected_version)
                .fetch_optional(&mut *tx)
                .await?;
            if new_version.is_none() {
                tx.rollback().await?;
                self.ensure_exists(id).await?;
                return Err(StoreError::VersionConflict {
                    id,
                    expected: expected_version,
                });
            }
        }

        insert_turns(&mut tx, id, turns).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn append_turns(&self, id: Uuid, turns: &[ConversationTurn]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        insert_turns(&mut tx, id, turns).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn recent_turns(
        &self,
        id: Uuid,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let rows = sqlx::query_as::<_, TurnRow>(
            r#"
            SELECT role, content FROM (
                SELECT id, role, content
                FROM conversation_turns
                WHERE document_id = $1
                ORDER BY id DESC
                LIMIT $2
            ) recent
            ORDER BY id ASC
            "#,
        )
        .bind(id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ConversationTurn::try_from).collect()
    }

    async fn conversation(&self, id: Uuid) -> Result<Vec<ConversationTurn>, StoreError> {
        let rows = sqlx::query_as::<_, TurnRow>(
            "SELECT role, content FROM conversation_turns WHERE document_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ConversationTurn::try_from).collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct MemoryDocument {
    record: DocumentRecord,
    conversation: Vec<ConversationTurn>,
}

/// Process-local store. Data is lost on restart.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, MemoryDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_document(
        &self,
        filename: &str,
        placeholders: &[PlaceholderRecord],
    ) -> Result<DocumentRecord, StoreError> {
        let now = Utc::now();
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            placeholders: placeholders.to_vec(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.documents.write().await.insert(
            record.id,
            MemoryDocument {
                record: record.clone(),
                conversation: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .get(&id)
            .map(|doc| doc.record.clone()))
    }

    async fn replace_placeholders(
        &self,
        id: Uuid,
        expected_version: i64,
        placeholders: &[PlaceholderRecord],
    ) -> Result<i64, StoreError> {
        let mut documents = self.documents.write().await;
        let doc = documents.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if doc.record.version != expected_version {
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
            });
        }
        doc.record.placeholders = placeholders.to_vec();
        doc.record.version += 1;
        doc.record.updated_at = Utc::now();
        Ok(doc.record.version)
    }

    async fn record_exchange(
        &self,
        id: Uuid,
        expected_version: i64,
        placeholders: Option<&[PlaceholderRecord]>,
        turns: &[ConversationTurn],
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let doc = documents.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(placeholders) = placeholders {
            if doc.record.version != expected_version {
                return Err(StoreError::VersionConflict {
                    id,
                    expected: expected_version,
                });
            }
            doc.record.placeholders = placeholders.to_vec();
            doc.record.version += 1;
            doc.record.updated_at = Utc::now();
        }
        doc.conversation.extend_from_slice(turns);
        Ok(())
    }

    async fn append_turns(&self, id: Uuid, turns: &[ConversationTurn]) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let doc = documents.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        doc.conversation.extend_from_slice(turns);
        Ok(())
    }

    async fn recent_turns(
        &self,
        id: Uuid,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let documents = self.documents.read().await;
        let doc = documents.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(recent_window(&doc.conversation, limit).to_vec())
    }

    async fn conversation(&self, id: Uuid) -> Result<Vec<ConversationTurn>, StoreError> {
        let documents = self.documents.read().await;
        let doc = documents.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(doc.conversation.clone())
    }
}
