//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use document_insights_core::ports::{
    AnalysisService, DocumentRepository, ObjectStoreService, QuotaRepository,
    TextExtractionService, TokenVerifier,
};
use document_insights_core::{DashboardAggregator, QuotaTracker, UploadPipeline};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: UploadPipeline,
    pub quota: QuotaTracker,
    pub dashboard: DashboardAggregator,
    pub token_verifier: Arc<dyn TokenVerifier>,
}

/// The concrete collaborators the core services are wired from.
pub struct Collaborators {
    pub objects: Arc<dyn ObjectStoreService>,
    pub extractor: Arc<dyn TextExtractionService>,
    pub analyzer: Arc<dyn AnalysisService>,
    pub documents: Arc<dyn DocumentRepository>,
    pub quotas: Arc<dyn QuotaRepository>,
    pub token_verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    /// Wires the pipeline, quota tracker and dashboard from explicit client handles.
    pub fn new(config: Arc<Config>, collaborators: Collaborators) -> Self {
        let quota = QuotaTracker::new(collaborators.quotas, config.analysis_limit);
        let pipeline = UploadPipeline::new(
            collaborators.objects,
            collaborators.extractor,
            collaborators.analyzer,
            collaborators.documents.clone(),
            quota.clone(),
        );
        let dashboard = DashboardAggregator::new(collaborators.documents);

        Self {
            config,
            pipeline,
            quota,
            dashboard,
            token_verifier: collaborators.token_verifier,
        }
    }
}
