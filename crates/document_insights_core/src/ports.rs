//! crates/document_insights_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases, blob
//! stores or inference providers.

use async_trait::async_trait;
use bytes::Bytes;

use crate::analysis::Analysis;
use crate::domain::{
    DocumentId, DocumentRecord, ExtractedText, NewDocument, OwnerId, StoredObject,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ObjectStoreService: Send + Sync {
    /// Stores `bytes` under `key` and reports where they can be fetched from.
    async fn put(&self, bytes: Bytes, key: &str, mime_type: &str) -> PortResult<StoredObject>;

    /// Resolves the retrievable URL of an already stored key.
    async fn resolve_url(&self, key: &str) -> PortResult<String>;
}

#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Whether documents of this MIME type can be turned into text.
    fn supports(&self, mime_type: &str) -> bool;

    async fn extract(&self, bytes: Bytes) -> PortResult<ExtractedText>;
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Produces a structured analysis of a document's plain text.
    async fn analyze(&self, text: &str) -> PortResult<Analysis>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, document: NewDocument) -> PortResult<DocumentRecord>;

    /// Attaches an analysis and stamps `analyzed_at` in the same write.
    async fn update_analysis(
        &self,
        id: &DocumentId,
        analysis: &Analysis,
    ) -> PortResult<DocumentRecord>;

    /// Analyzed documents of one owner, newest first.
    async fn list_analyzed_by_owner(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> PortResult<Vec<DocumentRecord>>;
}

#[async_trait]
pub trait QuotaRepository: Send + Sync {
    /// The owner's current count; 0 for an owner that has never been charged.
    async fn analysis_count(&self, owner_id: &OwnerId) -> PortResult<u64>;

    /// Atomically adds one to the owner's count and returns the new value.
    async fn increment_analysis_count(&self, owner_id: &OwnerId) -> PortResult<u64>;
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Maps a bearer token to the owner it was issued for.
    async fn verify(&self, token: &str) -> PortResult<OwnerId>;
}
