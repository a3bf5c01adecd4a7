pub mod analysis_llm;
pub mod blob_store;
pub mod db;
pub mod jwt;
pub mod pdf;

pub use analysis_llm::{OpenAiAnalysisAdapter, PromptTemplates};
pub use blob_store::BlobStoreAdapter;
pub use db::PgDocumentStore;
pub use jwt::JwtTokenVerifier;
pub use pdf::PdfTextExtractor;
