//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentRepository` and `QuotaRepository` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use document_insights_core::analysis::Analysis;
use document_insights_core::domain::{
    DocumentId, DocumentRecord, NewDocument, OwnerId, RecordedAnalysis,
};
use document_insights_core::ports::{DocumentRepository, PortError, PortResult, QuotaRepository};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the record store and quota counter ports.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

const DOCUMENT_COLUMNS: &str = "id, original_filename, owner_id, storage_url, content_type, \
     size_bytes, created_at, analysis, analyzed_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    original_filename: String,
    owner_id: String,
    storage_url: String,
    content_type: String,
    size_bytes: i64,
    created_at: DateTime<Utc>,
    analysis: Option<Json<Analysis>>,
    analyzed_at: Option<DateTime<Utc>>,
}

impl DocumentRow {
    fn to_domain(self) -> PortResult<DocumentRecord> {
        let analysis = match (self.analysis, self.analyzed_at) {
            (Some(Json(analysis)), Some(analyzed_at)) => Some(RecordedAnalysis {
                analysis,
                analyzed_at,
            }),
            (None, None) => None,
            _ => {
                return Err(PortError::Unexpected(format!(
                    "Document {} has analysis and analyzed_at out of step",
                    self.id
                )))
            }
        };

        Ok(DocumentRecord {
            id: DocumentId::new(self.id),
            original_filename: self.original_filename,
            owner_id: OwnerId::new(self.owner_id),
            storage_url: self.storage_url,
            content_type: self.content_type,
            size_bytes: u64::try_from(self.size_bytes).unwrap_or_default(),
            created_at: self.created_at,
            analysis,
        })
    }
}

fn to_count(value: i64) -> PortResult<u64> {
    u64::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("Negative analysis count {}", value)))
}

//=========================================================================================
// `DocumentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentRepository for PgDocumentStore {
    async fn create(&self, document: NewDocument) -> PortResult<DocumentRecord> {
        let size_bytes = i64::try_from(document.size_bytes)
            .map_err(|_| PortError::Unexpected("Document too large to record".to_string()))?;

        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "INSERT INTO documents (id, original_filename, owner_id, storage_url, content_type, size_bytes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(document.id.as_str())
        .bind(&document.original_filename)
        .bind(document.owner_id.as_str())
        .bind(&document.storage_url)
        .bind(&document.content_type)
        .bind(size_bytes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        row.to_domain()
    }

    async fn update_analysis(
        &self,
        id: &DocumentId,
        analysis: &Analysis,
    ) -> PortResult<DocumentRecord> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE documents SET analysis = $2, analyzed_at = now() WHERE id = $1 RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(id.as_str())
        .bind(Json(analysis))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Document {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        row.to_domain()
    }

    async fn list_analyzed_by_owner(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> PortResult<Vec<DocumentRecord>> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents \
             WHERE owner_id = $1 AND analysis IS NOT NULL \
             ORDER BY created_at DESC LIMIT $2",
            DOCUMENT_COLUMNS
        ))
        .bind(owner_id.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        rows.into_iter().map(DocumentRow::to_domain).collect()
    }
}

//=========================================================================================
// `QuotaRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuotaRepository for PgDocumentStore {
    async fn analysis_count(&self, owner_id: &OwnerId) -> PortResult<u64> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT analysis_count FROM owner_quotas WHERE owner_id = $1")
                .bind(owner_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

        count.map(to_count).unwrap_or(Ok(0))
    }

    async fn increment_analysis_count(&self, owner_id: &OwnerId) -> PortResult<u64> {
        // A single upsert: the row lock taken by ON CONFLICT serializes concurrent increments.
        let count: i64 = sqlx::query_scalar(
            "INSERT INTO owner_quotas (owner_id, analysis_count) VALUES ($1, 1) \
             ON CONFLICT (owner_id) DO UPDATE \
             SET analysis_count = owner_quotas.analysis_count + 1, updated_at = now() \
             RETURNING analysis_count",
        )
        .bind(owner_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        to_count(count)
    }
}
