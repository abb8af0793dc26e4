use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::clients::{BlobMetadata, ClientError, EvidenceStorage};
use super::domain::{DocumentId, Question, QuestionId, SupportingDocument, VendorId};
use super::repository::{QuestionnaireRepository, RepositoryError};

/// Whether a question's mandatory-evidence requirement is met.
///
/// Pure over the current document set; recomputed on every read so an upload
/// or deletion can never leave a stale verdict behind.
pub fn requirement_satisfied(question: &Question, documents: &[SupportingDocument]) -> bool {
    !question.requires_document
        || documents
            .iter()
            .any(|document| document.question_id.as_ref() == Some(&question.id))
}

/// Errors raised while managing supporting documents.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),
    #[error("document upload must not be empty")]
    EmptyDocument,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Inbound evidence file plus the linkage metadata stored with it.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub vendor: VendorId,
    /// `None` stores a general vendor-level document.
    pub question_id: Option<QuestionId>,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("doc-{id:06}"))
}

/// Service owning supporting-document round-trips to the blob store.
pub struct EvidenceService<R> {
    repository: Arc<R>,
    storage: Arc<dyn EvidenceStorage>,
}

impl<R> EvidenceService<R>
where
    R: QuestionnaireRepository + 'static,
{
    pub fn new(repository: Arc<R>, storage: Arc<dyn EvidenceStorage>) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Upload one evidence file and record it against its question/vendor.
    ///
    /// Requirement checks run against repository state, so a caller that
    /// awaits this round-trip before re-evaluating readiness never observes
    /// the upload half-applied.
    pub async fn upload(&self, upload: DocumentUpload) -> Result<SupportingDocument, EvidenceError> {
        if upload.bytes.is_empty() {
            return Err(EvidenceError::EmptyDocument);
        }
        if upload.content_type.parse::<mime::Mime>().is_err() {
            return Err(EvidenceError::UnsupportedContentType(upload.content_type));
        }
        if let Some(question_id) = &upload.question_id {
            self.repository
                .fetch_question(question_id)?
                .ok_or(RepositoryError::NotFound)?;
        }

        let metadata = BlobMetadata {
            filename: upload.filename.clone(),
            content_type: upload.content_type.clone(),
        };
        let blob = self.storage.upload(&upload.bytes, &metadata).await?;

        let document = SupportingDocument {
            id: next_document_id(),
            question_id: upload.question_id,
            vendor: upload.vendor,
            filename: upload.filename,
            content_type: upload.content_type,
            byte_size: upload.bytes.len() as u64,
            storage_url: blob.url,
            storage_key: blob.key,
        };
        let stored = self.repository.insert_document(document)?;
        info!(document_id = %stored.id.0, "supporting document stored");
        Ok(stored)
    }

    /// Delete one evidence file.
    ///
    /// The record is removed before the blob so a failed blob round-trip can
    /// only orphan storage, never resurrect a satisfied requirement.
    pub async fn remove(&self, id: &DocumentId) -> Result<(), EvidenceError> {
        let removed = self.repository.delete_document(id)?;
        self.storage.delete(&removed.storage_key).await?;
        Ok(())
    }
}
