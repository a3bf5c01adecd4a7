//! crates/document_insights_core/src/testing.rs
//!
//! In-memory implementations of every port, with call counters and switchable
//! failures. Compiled for this crate's tests and for downstream crates that enable
//! the `testing` feature.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::analysis::Analysis;
use crate::domain::{
    DocumentId, DocumentRecord, ExtractedText, NewDocument, OwnerId, RecordedAnalysis,
    StoredObject,
};
use crate::ports::{
    AnalysisService, DocumentRepository, ObjectStoreService, PortError, PortResult,
    QuotaRepository, TextExtractionService, TokenVerifier,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//=========================================================================================
// Object Store
//=========================================================================================

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Number of `put` calls, including failed ones.
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        lock(&self.objects).get(key).cloned()
    }
}

#[async_trait]
impl ObjectStoreService for InMemoryObjectStore {
    async fn put(&self, bytes: Bytes, key: &str, mime_type: &str) -> PortResult<StoredObject> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("object store unavailable".to_string()));
        }
        let size_bytes = bytes.len() as u64;
        lock(&self.objects).insert(key.to_string(), bytes);
        Ok(StoredObject {
            id: DocumentId::new(key),
            name: key.to_string(),
            url: self.resolve_url(key).await?,
            content_type: mime_type.to_string(),
            size_bytes,
        })
    }

    async fn resolve_url(&self, key: &str) -> PortResult<String> {
        Ok(format!("memory://documents/{}", key))
    }
}

//=========================================================================================
// Text Extraction
//=========================================================================================

/// Returns the same scripted outcome for every supported document.
pub struct ScriptedExtractor {
    supported: Vec<String>,
    outcome: Mutex<Result<String, String>>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    /// An extractor for PDFs that yields `text`.
    pub fn pdf(text: impl Into<String>) -> Self {
        Self {
            supported: vec!["application/pdf".to_string()],
            outcome: Mutex::new(Ok(text.into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *lock(&self.outcome) = Ok(text.into());
    }

    pub fn set_failure(&self, message: impl Into<String>) {
        *lock(&self.outcome) = Err(message.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractionService for ScriptedExtractor {
    fn supports(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    async fn extract(&self, _bytes: Bytes) -> PortResult<ExtractedText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*lock(&self.outcome) {
            Ok(text) => Ok(ExtractedText {
                text: text.clone(),
                page_count: Some(1),
            }),
            Err(message) => Err(PortError::Unexpected(message.clone())),
        }
    }
}

//=========================================================================================
// Analysis Provider
//=========================================================================================

pub struct ScriptedAnalyzer {
    outcome: Mutex<Result<Analysis, String>>,
    calls: AtomicUsize,
    last_text: Mutex<Option<String>>,
}

impl ScriptedAnalyzer {
    pub fn returning(analysis: Analysis) -> Self {
        Self {
            outcome: Mutex::new(Ok(analysis)),
            calls: AtomicUsize::new(0),
            last_text: Mutex::new(None),
        }
    }

    pub fn set_analysis(&self, analysis: Analysis) {
        *lock(&self.outcome) = Ok(analysis);
    }

    pub fn set_failure(&self, message: impl Into<String>) {
        *lock(&self.outcome) = Err(message.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_text(&self) -> Option<String> {
        lock(&self.last_text).clone()
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalyzer {
    async fn analyze(&self, text: &str) -> PortResult<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_text) = Some(text.to_string());
        lock(&self.outcome)
            .clone()
            .map_err(PortError::Unexpected)
    }
}

//=========================================================================================
// Record Store and Quota Counters
//=========================================================================================

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<Vec<DocumentRecord>>,
    counters: Mutex<HashMap<OwnerId, u64>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    increments: AtomicUsize,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
    fail_quota_reads: AtomicBool,
    fail_increments: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_count(&self, owner_id: &OwnerId, count: u64) {
        lock(&self.counters).insert(owner_id.clone(), count);
    }

    /// Inserts a fully formed record, bypassing `create`.
    pub fn insert_record(&self, record: DocumentRecord) {
        lock(&self.documents).push(record);
    }

    pub fn has_counter(&self, owner_id: &OwnerId) -> bool {
        lock(&self.counters).contains_key(owner_id)
    }

    pub fn count_of(&self, owner_id: &OwnerId) -> u64 {
        lock(&self.counters).get(owner_id).copied().unwrap_or(0)
    }

    pub fn record(&self, id: &DocumentId) -> Option<DocumentRecord> {
        lock(&self.documents).iter().find(|d| &d.id == id).cloned()
    }

    pub fn document_count(&self) -> usize {
        lock(&self.documents).len()
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn increment_calls(&self) -> usize {
        self.increments.load(Ordering::SeqCst)
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_quota_reads(&self, fail: bool) {
        self.fail_quota_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentStore {
    async fn create(&self, document: NewDocument) -> PortResult<DocumentRecord> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("record store unavailable".to_string()));
        }
        let record = DocumentRecord {
            id: document.id,
            original_filename: document.original_filename,
            owner_id: document.owner_id,
            storage_url: document.storage_url,
            content_type: document.content_type,
            size_bytes: document.size_bytes,
            created_at: Utc::now(),
            analysis: None,
        };
        lock(&self.documents).push(record.clone());
        Ok(record)
    }

    async fn update_analysis(
        &self,
        id: &DocumentId,
        analysis: &Analysis,
    ) -> PortResult<DocumentRecord> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("record store unavailable".to_string()));
        }
        let mut documents = lock(&self.documents);
        let record = documents
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", id)))?;
        record.analysis = Some(RecordedAnalysis {
            analysis: analysis.clone(),
            analyzed_at: Utc::now(),
        });
        Ok(record.clone())
    }

    async fn list_analyzed_by_owner(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> PortResult<Vec<DocumentRecord>> {
        // Reverse first so equal timestamps still list the later insert first.
        let mut matching: Vec<DocumentRecord> = lock(&self.documents)
            .iter()
            .rev()
            .filter(|d| &d.owner_id == owner_id && d.analysis.is_some())
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[async_trait]
impl QuotaRepository for InMemoryDocumentStore {
    async fn analysis_count(&self, owner_id: &OwnerId) -> PortResult<u64> {
        if self.fail_quota_reads.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("quota store unavailable".to_string()));
        }
        Ok(self.count_of(owner_id))
    }

    async fn increment_analysis_count(&self, owner_id: &OwnerId) -> PortResult<u64> {
        self.increments.fetch_add(1, Ordering::SeqCst);
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("quota store unavailable".to_string()));
        }
        let mut counters = lock(&self.counters);
        let count = counters.entry(owner_id.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}

//=========================================================================================
// Token Verification
//=========================================================================================

/// Accepts tokens of the form `token-for:<owner>`.
#[derive(Default)]
pub struct StaticTokenVerifier;

impl StaticTokenVerifier {
    pub const PREFIX: &'static str = "token-for:";

    pub fn token_for(owner: &str) -> String {
        format!("{}{}", Self::PREFIX, owner)
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> PortResult<OwnerId> {
        token
            .strip_prefix(Self::PREFIX)
            .filter(|owner| !owner.is_empty())
            .map(OwnerId::new)
            .ok_or(PortError::Unauthorized)
    }
}
