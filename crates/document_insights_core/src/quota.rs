//! crates/document_insights_core/src/quota.rs
//!
//! Per-owner analysis quota on top of a `QuotaRepository`.

use std::sync::Arc;

use crate::domain::{OwnerId, QuotaStatus};
use crate::pipeline::PipelineError;
use crate::ports::{PortResult, QuotaRepository};

/// Analyses an owner may run unless configured otherwise.
pub const DEFAULT_ANALYSIS_LIMIT: u64 = 5;

#[derive(Clone)]
pub struct QuotaTracker {
    repo: Arc<dyn QuotaRepository>,
    limit: u64,
}

impl QuotaTracker {
    pub fn new(repo: Arc<dyn QuotaRepository>, limit: u64) -> Self {
        Self { repo, limit }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub async fn get_count(&self, owner_id: &OwnerId) -> PortResult<u64> {
        self.repo.analysis_count(owner_id).await
    }

    /// Charges one quota unit. The repository performs the read-modify-write atomically.
    pub async fn increment(&self, owner_id: &OwnerId) -> PortResult<u64> {
        self.repo.increment_analysis_count(owner_id).await
    }

    pub async fn status(&self, owner_id: &OwnerId) -> PortResult<QuotaStatus> {
        let used = self.get_count(owner_id).await?;
        Ok(QuotaStatus::new(used, self.limit))
    }

    /// Fails with `QuotaExceeded` once the owner has used up the limit.
    ///
    /// This is a read only: nothing is reserved, so concurrent callers at
    /// `limit - 1` can all pass and the limit is exceeded by their number.
    pub async fn ensure_available(&self, owner_id: &OwnerId) -> Result<u64, PipelineError> {
        let used = self
            .get_count(owner_id)
            .await
            .map_err(PipelineError::QuotaUnavailable)?;
        if used >= self.limit {
            return Err(PipelineError::QuotaExceeded {
                used,
                limit: self.limit,
            });
        }
        Ok(used)
    }
}
