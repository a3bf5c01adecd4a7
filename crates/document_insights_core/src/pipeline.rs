//! crates/document_insights_core/src/pipeline.rs
//!
//! The upload-and-analyze pipeline.
//!
//! Only the quota check, the blob write and the record create can fail a request.
//! Everything after the record exists degrades to "uploaded, analysis unavailable",
//! with the reason handed back as an `AnalysisDiagnostic` instead of an error.

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::analysis::Analysis;
use crate::domain::{DocumentRecord, NewDocument, OwnerId, StoredObject};
use crate::keys::object_key;
use crate::ports::{
    AnalysisService, DocumentRepository, ObjectStoreService, PortError, TextExtractionService,
};
use crate::quota::QuotaTracker;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Analysis quota exceeded ({used}/{limit})")]
    QuotaExceeded { used: u64, limit: u64 },
    #[error("Quota lookup failed: {0}")]
    QuotaUnavailable(#[source] PortError),
    #[error("Failed to store file: {0}")]
    StorageFailure(#[source] PortError),
    #[error("Failed to persist document record: {0}")]
    PersistenceFailure(#[source] PortError),
}

/// Why a stored document came back without an analysis, or what went wrong after one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisDiagnostic {
    UnsupportedFormat(String),
    ExtractionFailed(String),
    EmptyText,
    AnalysisFailed(String),
    PersistAnalysisFailed(String),
    /// The analysis was saved and returned, but the quota unit could not be charged.
    QuotaIncrementFailed(String),
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_id: OwnerId,
    pub bytes: Bytes,
    pub original_filename: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub document: DocumentRecord,
    pub stored: StoredObject,
    /// Present only when a quota unit was consumed.
    pub analysis: Option<Analysis>,
    pub diagnostic: Option<AnalysisDiagnostic>,
}

/// Orchestrates storage, extraction, analysis and quota accounting for one upload.
#[derive(Clone)]
pub struct UploadPipeline {
    objects: Arc<dyn ObjectStoreService>,
    extractor: Arc<dyn TextExtractionService>,
    analyzer: Arc<dyn AnalysisService>,
    documents: Arc<dyn DocumentRepository>,
    quota: QuotaTracker,
}

impl UploadPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStoreService>,
        extractor: Arc<dyn TextExtractionService>,
        analyzer: Arc<dyn AnalysisService>,
        documents: Arc<dyn DocumentRepository>,
        quota: QuotaTracker,
    ) -> Self {
        Self {
            objects,
            extractor,
            analyzer,
            documents,
            quota,
        }
    }

    pub async fn submit(&self, request: UploadRequest) -> Result<PipelineResult, PipelineError> {
        if request.bytes.is_empty() {
            return Err(PipelineError::InvalidInput("file is empty".to_string()));
        }
        let owner = &request.owner_id;

        // --- 1. Quota check (no side effects before this succeeds) ---
        let used = self.quota.ensure_available(owner).await?;
        info!(%owner, used, limit = self.quota.limit(), "Quota check passed");

        // --- 2. Store the blob ---
        let key = object_key(&request.original_filename, Utc::now());
        let stored = self
            .objects
            .put(request.bytes.clone(), &key, &request.mime_type)
            .await
            .map_err(|e| {
                error!(%owner, key = %key, error = %e, "Failed to store uploaded file");
                PipelineError::StorageFailure(e)
            })?;

        // --- 3. Persist the metadata record ---
        // A failure here leaves the blob in place; nothing is compensated.
        let document = self
            .documents
            .create(NewDocument {
                id: stored.id.clone(),
                original_filename: request.original_filename.clone(),
                owner_id: owner.clone(),
                storage_url: stored.url.clone(),
                content_type: request.mime_type.clone(),
                size_bytes: stored.size_bytes,
            })
            .await
            .map_err(|e| {
                error!(
                    %owner,
                    document_id = %stored.id,
                    error = %e,
                    "Failed to create document record"
                );
                PipelineError::PersistenceFailure(e)
            })?;
        info!(%owner, document_id = %document.id, mime = %request.mime_type, "Document stored");

        // --- 4. Best-effort analysis ---
        let (document, analysis, diagnostic) = match self.analyze(&request, document).await {
            Ok((document, analysis)) => (document, Some(analysis), None),
            Err((document, diagnostic)) => {
                warn!(%owner, document_id = %document.id, ?diagnostic, "Analysis unavailable");
                (document, None, Some(diagnostic))
            }
        };

        // --- 5. Charge the quota unit only for a persisted analysis ---
        let diagnostic = match &analysis {
            Some(_) => match self.quota.increment(owner).await {
                Ok(count) => {
                    info!(
                        %owner,
                        document_id = %document.id,
                        count,
                        "Analysis counted against quota"
                    );
                    None
                }
                Err(e) => {
                    error!(
                        %owner,
                        document_id = %document.id,
                        error = %e,
                        "Failed to increment analysis count"
                    );
                    Some(AnalysisDiagnostic::QuotaIncrementFailed(e.to_string()))
                }
            },
            None => diagnostic,
        };

        Ok(PipelineResult {
            document,
            stored,
            analysis,
            diagnostic,
        })
    }

    /// Extracts, analyzes and persists. Hands the record back on every path.
    async fn analyze(
        &self,
        request: &UploadRequest,
        document: DocumentRecord,
    ) -> Result<(DocumentRecord, Analysis), (DocumentRecord, AnalysisDiagnostic)> {
        if !self.extractor.supports(&request.mime_type) {
            return Err((
                document,
                AnalysisDiagnostic::UnsupportedFormat(request.mime_type.clone()),
            ));
        }

        let extracted = match self.extractor.extract(request.bytes.clone()).await {
            Ok(extracted) => extracted,
            Err(e) => return Err((document, AnalysisDiagnostic::ExtractionFailed(e.to_string()))),
        };
        debug!(
            document_id = %document.id,
            chars = extracted.text.len(),
            page_count = ?extracted.page_count,
            "Text extracted"
        );
        if extracted.is_blank() {
            return Err((document, AnalysisDiagnostic::EmptyText));
        }

        let analysis = match self.analyzer.analyze(&extracted.text).await {
            Ok(analysis) => analysis,
            Err(e) => return Err((document, AnalysisDiagnostic::AnalysisFailed(e.to_string()))),
        };

        match self.documents.update_analysis(&document.id, &analysis).await {
            Ok(updated) => Ok((updated, analysis)),
            Err(e) => Err((
                document,
                AnalysisDiagnostic::PersistAnalysisFailed(e.to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RiskLevel;
    use crate::testing::{
        InMemoryDocumentStore, InMemoryObjectStore, ScriptedAnalyzer, ScriptedExtractor,
    };

    struct Harness {
        objects: Arc<InMemoryObjectStore>,
        extractor: Arc<ScriptedExtractor>,
        analyzer: Arc<ScriptedAnalyzer>,
        store: Arc<InMemoryDocumentStore>,
        pipeline: UploadPipeline,
    }

    fn high_risk() -> Analysis {
        Analysis {
            risk_level: Some(RiskLevel::High),
            ..Default::default()
        }
    }

    fn harness(limit: u64) -> Harness {
        let objects = Arc::new(InMemoryObjectStore::new());
        let extractor = Arc::new(ScriptedExtractor::pdf("Final notice: pay by Friday."));
        let analyzer = Arc::new(ScriptedAnalyzer::returning(high_risk()));
        let store = Arc::new(InMemoryDocumentStore::new());
        let pipeline = UploadPipeline::new(
            objects.clone(),
            extractor.clone(),
            analyzer.clone(),
            store.clone(),
            QuotaTracker::new(store.clone(), limit),
        );
        Harness {
            objects,
            extractor,
            analyzer,
            store,
            pipeline,
        }
    }

    fn pdf_upload(owner: &OwnerId) -> UploadRequest {
        UploadRequest {
            owner_id: owner.clone(),
            bytes: Bytes::from_static(b"%PDF-1.4 test"),
            original_filename: "notice.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_analysis_is_persisted_and_counted_once() {
        let h = harness(2);
        let owner = OwnerId::new("alice");

        let result = h.pipeline.submit(pdf_upload(&owner)).await.unwrap();

        assert_eq!(result.analysis, Some(high_risk()));
        assert_eq!(result.diagnostic, None);
        assert_eq!(result.document.id, result.stored.id);
        assert!(result.stored.id.as_str().ends_with(".pdf"));
        assert_eq!(h.store.count_of(&owner), 1);
        assert_eq!(h.store.increment_calls(), 1);

        let saved = h.store.record(&result.document.id).unwrap();
        assert_eq!(saved.analysis(), Some(&high_risk()));
        assert!(saved.analyzed_at().is_some());
        assert_eq!(
            h.analyzer.last_text().as_deref(),
            Some("Final notice: pay by Friday.")
        );
    }

    #[tokio::test]
    async fn owner_at_limit_is_rejected_without_side_effects() {
        let h = harness(2);
        let owner = OwnerId::new("bob");
        h.store.seed_count(&owner, 2);

        let err = h.pipeline.submit(pdf_upload(&owner)).await.unwrap_err();

        assert!(matches!(err, PipelineError::QuotaExceeded { used: 2, limit: 2 }));
        assert_eq!(h.objects.put_calls(), 0);
        assert_eq!(h.store.create_calls(), 0);
        assert_eq!(h.store.count_of(&owner), 2);
    }

    #[tokio::test]
    async fn failed_quota_read_aborts_before_storage() {
        let h = harness(2);
        h.store.fail_quota_reads(true);

        let err = h
            .pipeline
            .submit(pdf_upload(&OwnerId::new("carol")))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::QuotaUnavailable(_)));
        assert_eq!(h.objects.put_calls(), 0);
    }

    #[tokio::test]
    async fn storage_failure_is_fatal_and_creates_no_record() {
        let h = harness(2);
        h.objects.fail_puts(true);

        let err = h
            .pipeline
            .submit(pdf_upload(&OwnerId::new("dave")))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::StorageFailure(_)));
        assert_eq!(h.store.create_calls(), 0);
        assert_eq!(h.extractor.calls(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_is_fatal_and_leaves_the_blob() {
        let h = harness(2);
        h.store.fail_creates(true);

        let err = h
            .pipeline
            .submit(pdf_upload(&OwnerId::new("erin")))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::PersistenceFailure(_)));
        assert_eq!(h.objects.object_count(), 1);
        assert_eq!(h.analyzer.calls(), 0);
        assert_eq!(h.store.increment_calls(), 0);
    }

    #[tokio::test]
    async fn analysis_failure_still_succeeds_without_charging() {
        let h = harness(2);
        let owner = OwnerId::new("frank");
        h.store.seed_count(&owner, 1);
        h.analyzer.set_failure("provider timed out");

        let result = h.pipeline.submit(pdf_upload(&owner)).await.unwrap();

        assert!(result.analysis.is_none());
        assert!(matches!(
            result.diagnostic,
            Some(AnalysisDiagnostic::AnalysisFailed(ref m)) if m.contains("provider timed out")
        ));
        assert_eq!(h.store.count_of(&owner), 1);
        assert_eq!(h.store.increment_calls(), 0);
        assert_eq!(h.store.update_calls(), 0);
        assert!(h.store.record(&result.document.id).unwrap().analysis.is_none());
    }

    #[tokio::test]
    async fn extraction_failure_skips_analysis() {
        let h = harness(2);
        h.extractor.set_failure("corrupt xref table");

        let result = h
            .pipeline
            .submit(pdf_upload(&OwnerId::new("gina")))
            .await
            .unwrap();

        assert!(result.analysis.is_none());
        assert!(matches!(
            result.diagnostic,
            Some(AnalysisDiagnostic::ExtractionFailed(_))
        ));
        assert_eq!(h.analyzer.calls(), 0);
        assert_eq!(h.store.increment_calls(), 0);
    }

    #[tokio::test]
    async fn whitespace_only_text_skips_analysis() {
        let h = harness(2);
        h.extractor.set_text(" \n\t  ");

        let result = h
            .pipeline
            .submit(pdf_upload(&OwnerId::new("hank")))
            .await
            .unwrap();

        assert_eq!(result.diagnostic, Some(AnalysisDiagnostic::EmptyText));
        assert_eq!(h.analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn non_extractable_formats_are_stored_but_not_analyzed() {
        let h = harness(2);
        let owner = OwnerId::new("ivy");
        let request = UploadRequest {
            original_filename: "photo.PNG".to_string(),
            mime_type: "image/png".to_string(),
            ..pdf_upload(&owner)
        };

        let result = h.pipeline.submit(request).await.unwrap();

        assert!(result.stored.id.as_str().ends_with(".png"));
        assert_eq!(
            result.diagnostic,
            Some(AnalysisDiagnostic::UnsupportedFormat("image/png".to_string()))
        );
        assert_eq!(h.extractor.calls(), 0);
        assert_eq!(h.store.document_count(), 1);
        assert_eq!(h.store.count_of(&owner), 0);
    }

    #[tokio::test]
    async fn failed_analysis_write_is_not_charged() {
        let h = harness(2);
        let owner = OwnerId::new("jack");
        h.store.fail_updates(true);

        let result = h.pipeline.submit(pdf_upload(&owner)).await.unwrap();

        assert!(result.analysis.is_none());
        assert!(matches!(
            result.diagnostic,
            Some(AnalysisDiagnostic::PersistAnalysisFailed(_))
        ));
        assert_eq!(h.store.increment_calls(), 0);
    }

    #[tokio::test]
    async fn failed_increment_keeps_the_analysis() {
        let h = harness(2);
        let owner = OwnerId::new("kim");
        h.store.fail_increments(true);

        let result = h.pipeline.submit(pdf_upload(&owner)).await.unwrap();

        assert_eq!(result.analysis, Some(high_risk()));
        assert!(matches!(
            result.diagnostic,
            Some(AnalysisDiagnostic::QuotaIncrementFailed(_))
        ));
        assert!(h.store.record(&result.document.id).unwrap().analysis.is_some());
    }

    #[tokio::test]
    async fn empty_upload_is_invalid_input() {
        let h = harness(2);
        let request = UploadRequest {
            bytes: Bytes::new(),
            ..pdf_upload(&OwnerId::new("lee"))
        };

        let err = h.pipeline.submit(request).await.unwrap_err();

        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(h.objects.put_calls(), 0);
    }

    #[tokio::test]
    async fn three_uploads_against_a_limit_of_two() {
        let h = harness(2);
        let owner = OwnerId::new("mia");

        let first = h.pipeline.submit(pdf_upload(&owner)).await.unwrap();
        assert!(first.analysis.is_some());
        assert_eq!(h.store.count_of(&owner), 1);

        h.analyzer.set_failure("provider timed out");
        let second = h.pipeline.submit(pdf_upload(&owner)).await.unwrap();
        assert!(second.analysis.is_none());
        assert_eq!(h.store.count_of(&owner), 1);

        h.analyzer.set_analysis(high_risk());
        let third = h.pipeline.submit(pdf_upload(&owner)).await.unwrap();
        assert!(third.analysis.is_some());
        assert_eq!(h.store.count_of(&owner), 2);

        let documents_before = h.store.document_count();
        let err = h.pipeline.submit(pdf_upload(&owner)).await.unwrap_err();
        assert!(matches!(err, PipelineError::QuotaExceeded { used: 2, limit: 2 }));
        assert_eq!(h.store.document_count(), documents_before);
    }
}
