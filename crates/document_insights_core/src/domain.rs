//! crates/document_insights_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database, blob store or HTTP framework.

use crate::analysis::Analysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the principal under whose identity uploads and quota are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a document. Shares its identity with the underlying blob key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the object store reports back after a successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// The generated key; also the document id.
    pub id: DocumentId,
    pub name: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// The metadata needed to create a document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: DocumentId,
    pub original_filename: String,
    pub owner_id: OwnerId,
    pub storage_url: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// An analysis together with the moment it was written.
///
/// Keeping both in one value means a record can never carry one without the other.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAnalysis {
    pub analysis: Analysis,
    pub analyzed_at: DateTime<Utc>,
}

/// Represents an uploaded document and, once available, its analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub original_filename: String,
    pub owner_id: OwnerId,
    pub storage_url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub analysis: Option<RecordedAnalysis>,
}

impl DocumentRecord {
    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref().map(|recorded| &recorded.analysis)
    }

    pub fn analyzed_at(&self) -> Option<DateTime<Utc>> {
        self.analysis.as_ref().map(|recorded| recorded.analyzed_at)
    }
}

/// Plain text pulled out of an uploaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    /// Known only for paginated formats.
    pub page_count: Option<u32>,
}

impl ExtractedText {
    /// True when the extraction produced nothing worth analyzing.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An owner's position against the analysis limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
}

impl QuotaStatus {
    pub fn new(used: u64, limit: u64) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }
}
