use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::{
    Checklist, ChecklistId, DocumentId, Question, QuestionId, SubmissionId, SubmissionRecord,
    SupportingDocument, VendorId,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Everything removed by one checklist cascade, reported so callers can
/// release the matching blobs.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub checklist: Checklist,
    pub questions_removed: usize,
    pub removed_documents: Vec<SupportingDocument>,
}

/// Storage abstraction so the workflow modules can be exercised in isolation.
///
/// Query methods returning question collections keep the checklist ordering:
/// questions come back sorted by `position`.
pub trait QuestionnaireRepository: Send + Sync {
    fn insert_checklist(&self, checklist: Checklist) -> Result<Checklist, RepositoryError>;
    fn update_checklist(&self, checklist: Checklist) -> Result<(), RepositoryError>;
    fn fetch_checklist(&self, id: &ChecklistId) -> Result<Option<Checklist>, RepositoryError>;
    fn checklists_for_vendor(&self, vendor: &VendorId) -> Result<Vec<Checklist>, RepositoryError>;

    fn insert_question(&self, question: Question) -> Result<Question, RepositoryError>;
    fn update_question(&self, question: Question) -> Result<(), RepositoryError>;
    fn fetch_question(&self, id: &QuestionId) -> Result<Option<Question>, RepositoryError>;
    fn questions_for_checklist(&self, id: &ChecklistId)
        -> Result<Vec<Question>, RepositoryError>;
    fn manual_questions(&self) -> Result<Vec<Question>, RepositoryError>;

    fn insert_document(
        &self,
        document: SupportingDocument,
    ) -> Result<SupportingDocument, RepositoryError>;
    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<SupportingDocument>, RepositoryError>;
    /// Removes and returns the document so the caller can release its blob.
    fn delete_document(&self, id: &DocumentId) -> Result<SupportingDocument, RepositoryError>;
    fn documents_for_vendor(
        &self,
        vendor: &VendorId,
    ) -> Result<Vec<SupportingDocument>, RepositoryError>;
    fn documents_for_question(
        &self,
        id: &QuestionId,
    ) -> Result<Vec<SupportingDocument>, RepositoryError>;

    fn insert_submission(
        &self,
        record: SubmissionRecord,
    ) -> Result<SubmissionRecord, RepositoryError>;
    fn fetch_submission(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError>;

    /// Remove a checklist together with its questions and their documents in
    /// one atomic step; a reader never observes orphaned questions.
    fn delete_checklist_cascade(&self, id: &ChecklistId)
        -> Result<CascadeOutcome, RepositoryError>;
}

#[derive(Default)]
struct MemoryState {
    checklists: HashMap<ChecklistId, Checklist>,
    questions: HashMap<QuestionId, Question>,
    documents: HashMap<DocumentId, SupportingDocument>,
    submissions: HashMap<SubmissionId, SubmissionRecord>,
}

/// Reference repository backing tests, the CLI demo, and the default server
/// wiring. A single mutex over the whole state keeps the cascade atomic.
#[derive(Default, Clone)]
pub struct InMemoryQuestionnaireRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryQuestionnaireRepository {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("repository mutex poisoned")
    }
}

fn sorted_by_position(mut questions: Vec<Question>) -> Vec<Question> {
    questions.sort_by_key(|question| question.position);
    questions
}

impl QuestionnaireRepository for InMemoryQuestionnaireRepository {
    fn insert_checklist(&self, checklist: Checklist) -> Result<Checklist, RepositoryError> {
        let mut state = self.lock();
        if state.checklists.contains_key(&checklist.id) {
            return Err(RepositoryError::Conflict);
        }
        state
            .checklists
            .insert(checklist.id.clone(), checklist.clone());
        Ok(checklist)
    }

    fn update_checklist(&self, checklist: Checklist) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if !state.checklists.contains_key(&checklist.id) {
            return Err(RepositoryError::NotFound);
        }
        state.checklists.insert(checklist.id.clone(), checklist);
        Ok(())
    }

    fn fetch_checklist(&self, id: &ChecklistId) -> Result<Option<Checklist>, RepositoryError> {
        Ok(self.lock().checklists.get(id).cloned())
    }

    fn checklists_for_vendor(&self, vendor: &VendorId) -> Result<Vec<Checklist>, RepositoryError> {
        let state = self.lock();
        let mut checklists: Vec<Checklist> = state
            .checklists
            .values()
            .filter(|checklist| &checklist.vendor == vendor)
            .cloned()
            .collect();
        checklists.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(checklists)
    }

    fn insert_question(&self, question: Question) -> Result<Question, RepositoryError> {
        let mut state = self.lock();
        if state.questions.contains_key(&question.id) {
            return Err(RepositoryError::Conflict);
        }
        state.questions.insert(question.id.clone(), question.clone());
        Ok(question)
    }

    fn update_question(&self, question: Question) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if !state.questions.contains_key(&question.id) {
            return Err(RepositoryError::NotFound);
        }
        state.questions.insert(question.id.clone(), question);
        Ok(())
    }

    fn fetch_question(&self, id: &QuestionId) -> Result<Option<Question>, RepositoryError> {
        Ok(self.lock().questions.get(id).cloned())
    }

    fn questions_for_checklist(
        &self,
        id: &ChecklistId,
    ) -> Result<Vec<Question>, RepositoryError> {
        let state = self.lock();
        let questions = state
            .questions
            .values()
            .filter(|question| question.checklist_id.as_ref() == Some(id))
            .cloned()
            .collect();
        Ok(sorted_by_position(questions))
    }

    fn manual_questions(&self) -> Result<Vec<Question>, RepositoryError> {
        let state = self.lock();
        let questions = state
            .questions
            .values()
            .filter(|question| question.checklist_id.is_none())
            .cloned()
            .collect();
        Ok(sorted_by_position(questions))
    }

    fn insert_document(
        &self,
        document: SupportingDocument,
    ) -> Result<SupportingDocument, RepositoryError> {
        let mut state = self.lock();
        if state.documents.contains_key(&document.id) {
            return Err(RepositoryError::Conflict);
        }
        state.documents.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<SupportingDocument>, RepositoryError> {
        Ok(self.lock().documents.get(id).cloned())
    }

    fn delete_document(&self, id: &DocumentId) -> Result<SupportingDocument, RepositoryError> {
        self.lock().documents.remove(id).ok_or(RepositoryError::NotFound)
    }

    fn documents_for_vendor(
        &self,
        vendor: &VendorId,
    ) -> Result<Vec<SupportingDocument>, RepositoryError> {
        let state = self.lock();
        let mut documents: Vec<SupportingDocument> = state
            .documents
            .values()
            .filter(|document| &document.vendor == vendor)
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    fn documents_for_question(
        &self,
        id: &QuestionId,
    ) -> Result<Vec<SupportingDocument>, RepositoryError> {
        let state = self.lock();
        let mut documents: Vec<SupportingDocument> = state
            .documents
            .values()
            .filter(|document| document.question_id.as_ref() == Some(id))
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    fn insert_submission(
        &self,
        record: SubmissionRecord,
    ) -> Result<SubmissionRecord, RepositoryError> {
        let mut state = self.lock();
        if state.submissions.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        state.submissions.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch_submission(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Ok(self.lock().submissions.get(id).cloned())
    }

    fn delete_checklist_cascade(
        &self,
        id: &ChecklistId,
    ) -> Result<CascadeOutcome, RepositoryError> {
        let mut state = self.lock();
        let checklist = state.checklists.remove(id).ok_or(RepositoryError::NotFound)?;

        let question_ids: Vec<QuestionId> = state
            .questions
            .values()
            .filter(|question| question.checklist_id.as_ref() == Some(id))
            .map(|question| question.id.clone())
            .collect();
        for question_id in &question_ids {
            state.questions.remove(question_id);
        }

        let document_ids: Vec<DocumentId> = state
            .documents
            .values()
            .filter(|document| {
                document
                    .question_id
                    .as_ref()
                    .is_some_and(|question_id| question_ids.contains(question_id))
            })
            .map(|document| document.id.clone())
            .collect();
        let mut removed_documents = Vec::with_capacity(document_ids.len());
        for document_id in &document_ids {
            if let Some(document) = state.documents.remove(document_id) {
                removed_documents.push(document);
            }
        }

        Ok(CascadeOutcome {
            checklist,
            questions_removed: question_ids.len(),
            removed_documents,
        })
    }
}
