pub mod analysis;
pub mod dashboard;
pub mod domain;
pub mod keys;
pub mod pipeline;
pub mod ports;
pub mod quota;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use analysis::{Analysis, AnalysisParseError, RequiredAction, RiskLevel};
pub use dashboard::{
    categorize, Category, Dashboard, DashboardAggregator, DashboardEntry, DashboardSummary,
};
pub use domain::{
    DocumentId, DocumentRecord, ExtractedText, NewDocument, OwnerId, QuotaStatus,
    RecordedAnalysis, StoredObject,
};
pub use pipeline::{
    AnalysisDiagnostic, PipelineError, PipelineResult, UploadPipeline, UploadRequest,
};
pub use ports::{
    AnalysisService, DocumentRepository, ObjectStoreService, PortError, PortResult,
    QuotaRepository, TextExtractionService, TokenVerifier,
};
pub use quota::{QuotaTracker, DEFAULT_ANALYSIS_LIMIT};
