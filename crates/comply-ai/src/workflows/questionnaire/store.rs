use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::clients::{ChecklistExtractor, ChecklistUpload, ClientError, EvidenceStorage};
use super::domain::{
    Checklist, ChecklistId, ExtractionStatus, Question, QuestionId, QuestionStatus, VendorId,
};
use super::repository::{CascadeOutcome, QuestionnaireRepository, RepositoryError};

/// Errors raised by checklist and question bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("question text must not be empty")]
    EmptyQuestionText,
    #[error("checklist {0} is not in an error state; nothing to retry")]
    NotRetryable(ChecklistId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

const NO_QUESTIONS_EXTRACTED: &str = "extraction produced no questions";

static CHECKLIST_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static QUESTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_checklist_id() -> ChecklistId {
    let id = CHECKLIST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ChecklistId(format!("chk-{id:06}"))
}

fn next_question_id() -> QuestionId {
    let id = QUESTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    QuestionId(format!("q-{id:06}"))
}

/// Owner of checklist and question entities, wrapping the external extractor.
pub struct ChecklistStore<R> {
    repository: Arc<R>,
    extractor: Arc<dyn ChecklistExtractor>,
    storage: Arc<dyn EvidenceStorage>,
}

impl<R> ChecklistStore<R>
where
    R: QuestionnaireRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        extractor: Arc<dyn ChecklistExtractor>,
        storage: Arc<dyn EvidenceStorage>,
    ) -> Self {
        Self {
            repository,
            extractor,
            storage,
        }
    }

    /// Register an upload and run extraction over it.
    ///
    /// The checklist walks `uploading` → `extracting` → `completed`, or lands
    /// in `error` when the extractor fails or finds no questions. An errored
    /// checklist is returned, not dropped: it stays visible for inspection
    /// and [`retry_extraction`].
    ///
    /// [`retry_extraction`]: ChecklistStore::retry_extraction
    pub async fn create_from_upload(
        &self,
        upload: ChecklistUpload,
        vendor: VendorId,
    ) -> Result<Checklist, StoreError> {
        let checklist = Checklist {
            id: next_checklist_id(),
            vendor,
            source_filename: upload.filename.clone(),
            extraction_status: ExtractionStatus::Uploading,
            extraction_error: None,
            sent_to_trust_portal: false,
            submitted_at: None,
        };
        let checklist = self.repository.insert_checklist(checklist)?;
        self.run_extraction(checklist, &upload).await
    }

    /// Re-run extraction for a checklist stuck in `error`, using the
    /// re-uploaded source file.
    pub async fn retry_extraction(
        &self,
        id: &ChecklistId,
        upload: ChecklistUpload,
    ) -> Result<Checklist, StoreError> {
        let mut checklist = self.checklist(id)?;
        if checklist.extraction_status != ExtractionStatus::Error {
            return Err(StoreError::NotRetryable(id.clone()));
        }
        checklist.extraction_error = None;
        checklist.source_filename = upload.filename.clone();
        checklist.extraction_status = ExtractionStatus::Uploading;
        self.repository.update_checklist(checklist.clone())?;
        self.run_extraction(checklist, &upload).await
    }

    async fn run_extraction(
        &self,
        mut checklist: Checklist,
        upload: &ChecklistUpload,
    ) -> Result<Checklist, StoreError> {
        checklist.extraction_status = ExtractionStatus::Extracting;
        self.repository.update_checklist(checklist.clone())?;

        match self.extractor.extract(upload).await {
            Ok(texts) if texts.is_empty() => {
                checklist.extraction_status = ExtractionStatus::Error;
                checklist.extraction_error = Some(NO_QUESTIONS_EXTRACTED.to_string());
                self.repository.update_checklist(checklist.clone())?;
                warn!(checklist_id = %checklist.id.0, "extraction produced no questions");
                Ok(checklist)
            }
            Ok(texts) => {
                let total = texts.len();
                for (position, text) in texts.into_iter().enumerate() {
                    let question = Question {
                        id: next_question_id(),
                        checklist_id: Some(checklist.id.clone()),
                        text,
                        position: position as u32,
                        status: QuestionStatus::Pending,
                        answer: None,
                        confidence: None,
                        requires_document: false,
                        document_description: None,
                        is_done: false,
                    };
                    self.repository.insert_question(question)?;
                }
                checklist.extraction_status = ExtractionStatus::Completed;
                self.repository.update_checklist(checklist.clone())?;
                info!(checklist_id = %checklist.id.0, questions = total, "checklist extracted");
                Ok(checklist)
            }
            Err(err) => {
                checklist.extraction_status = ExtractionStatus::Error;
                checklist.extraction_error = Some(err.to_string());
                self.repository.update_checklist(checklist.clone())?;
                warn!(
                    checklist_id = %checklist.id.0,
                    error = %err,
                    "checklist extraction failed"
                );
                Ok(checklist)
            }
        }
    }

    /// Add a question outside extraction. Without a checklist it lands in the
    /// synthetic manual bucket.
    pub fn add_manual_question(
        &self,
        checklist_id: Option<&ChecklistId>,
        text: &str,
        requires_document: bool,
        document_description: Option<String>,
    ) -> Result<Question, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyQuestionText);
        }

        let position = match checklist_id {
            Some(id) => {
                self.repository
                    .fetch_checklist(id)?
                    .ok_or(RepositoryError::NotFound)?;
                self.repository.questions_for_checklist(id)?.len() as u32
            }
            None => self.repository.manual_questions()?.len() as u32,
        };

        let question = Question {
            id: next_question_id(),
            checklist_id: checklist_id.cloned(),
            text: text.to_string(),
            position,
            status: QuestionStatus::Pending,
            answer: None,
            confidence: None,
            requires_document,
            document_description,
            is_done: false,
        };
        Ok(self.repository.insert_question(question)?)
    }

    /// Flag or clear a question's mandatory-evidence requirement.
    pub fn set_document_requirement(
        &self,
        question_id: &QuestionId,
        requires_document: bool,
        document_description: Option<String>,
    ) -> Result<Question, StoreError> {
        let mut question = self
            .repository
            .fetch_question(question_id)?
            .ok_or(RepositoryError::NotFound)?;
        question.requires_document = requires_document;
        question.document_description = if requires_document {
            document_description
        } else {
            None
        };
        self.repository.update_question(question.clone())?;
        Ok(question)
    }

    /// Delete a checklist together with its questions and documents.
    ///
    /// The record cascade is atomic inside the repository; blob deletions are
    /// issued afterwards for every removed document. The first blob failure
    /// is surfaced once all deletions have been attempted.
    pub async fn delete_checklist(&self, id: &ChecklistId) -> Result<CascadeOutcome, StoreError> {
        let outcome = self.repository.delete_checklist_cascade(id)?;

        let mut first_failure: Option<ClientError> = None;
        for document in &outcome.removed_documents {
            if let Err(err) = self.storage.delete(&document.storage_key).await {
                warn!(
                    document_id = %document.id.0,
                    error = %err,
                    "failed to release blob for cascaded document"
                );
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(StoreError::Client(err)),
            None => Ok(outcome),
        }
    }

    pub fn checklist(&self, id: &ChecklistId) -> Result<Checklist, StoreError> {
        Ok(self
            .repository
            .fetch_checklist(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    /// Ordered questions for one checklist, projected on demand.
    pub fn questions_for(&self, id: &ChecklistId) -> Result<Vec<Question>, StoreError> {
        Ok(self.repository.questions_for_checklist(id)?)
    }

    /// The synthetic bucket of questions that belong to no checklist.
    pub fn manual_questions(&self) -> Result<Vec<Question>, StoreError> {
        Ok(self.repository.manual_questions()?)
    }

    pub fn checklists_for_vendor(&self, vendor: &VendorId) -> Result<Vec<Checklist>, StoreError> {
        Ok(self.repository.checklists_for_vendor(vendor)?)
    }
}
