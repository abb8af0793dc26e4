use async_trait::async_trait;

use super::domain::{QuestionId, SubmissionRecord};

/// Round-trip failure against one of the external collaborators.
///
/// Always carries the originating operation name so callers can target a
/// retry without re-deriving state.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{operation}: network round-trip failed: {message}")]
    Network {
        operation: &'static str,
        message: String,
    },
    #[error("{operation}: rejected by remote service: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
}

impl ClientError {
    pub const fn operation(&self) -> &'static str {
        match self {
            ClientError::Network { operation, .. } | ClientError::Rejected { operation, .. } => {
                operation
            }
        }
    }
}

/// Raw file handed to the extractor or the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Contract for the external document-extraction service.
///
/// Returns the ordered question texts found in the upload; any failure leaves
/// the owning checklist in its `error` state for retry.
#[async_trait]
pub trait ChecklistExtractor: Send + Sync {
    async fn extract(&self, upload: &ChecklistUpload) -> Result<Vec<String>, ClientError>;
}

/// Request-scoped context attached to outbound generation calls.
///
/// Never persisted onto question records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub checklist_name: Option<String>,
    pub evidence_files: Vec<String>,
}

impl RequestContext {
    /// Flatten into the single context string the answer service accepts.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(name) = &self.checklist_name {
            parts.push(format!("checklist: {name}"));
        }
        if !self.evidence_files.is_empty() {
            parts.push(format!("evidence on file: {}", self.evidence_files.join(", ")));
        }
        parts.join("; ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub question_text: String,
    pub context: RequestContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuestion {
    pub question_id: QuestionId,
    pub question_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchAnswerRequest {
    pub questions: Vec<BatchQuestion>,
    pub context: RequestContext,
}

/// Opaque handle to an asynchronous batch generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJobHandle(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAnswerStatus {
    Pending,
    Completed,
}

/// Per-question progress reported by one batch poll.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAnswerUpdate {
    pub question_id: QuestionId,
    pub status: BatchAnswerStatus,
    pub answer: Option<String>,
    pub confidence: Option<f32>,
}

/// Contract for the external AI answer service.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn generate(&self, request: AnswerRequest) -> Result<GeneratedAnswer, ClientError>;

    async fn generate_batch(
        &self,
        request: BatchAnswerRequest,
    ) -> Result<BatchJobHandle, ClientError>;

    async fn poll_batch(
        &self,
        handle: &BatchJobHandle,
    ) -> Result<Vec<BatchAnswerUpdate>, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub key: String,
}

/// Contract for the external blob store holding evidence files.
#[async_trait]
pub trait EvidenceStorage: Send + Sync {
    async fn upload(&self, bytes: &[u8], metadata: &BlobMetadata)
        -> Result<StoredBlob, ClientError>;

    async fn delete(&self, key: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalReceipt {
    pub portal_id: String,
}

/// Contract for the counter-party review portal.
#[async_trait]
pub trait ReviewPortal: Send + Sync {
    async fn create_submission(&self, record: &SubmissionRecord)
        -> Result<PortalReceipt, ClientError>;
}
