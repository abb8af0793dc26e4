use std::sync::Arc;

use super::clients::{
    AnswerService, ChecklistExtractor, EvidenceStorage, RequestContext, ReviewPortal,
};
use super::completion::{ChecklistReadiness, CompletionEvaluator};
use super::domain::{ChecklistId, Question, QuestionId};
use super::evidence::{EvidenceError, EvidenceService};
use super::generation::{AnswerGenerationOrchestrator, GenerationError, PollPolicy};
use super::lifecycle::{LifecycleError, QuestionLifecycle};
use super::repository::{QuestionnaireRepository, RepositoryError};
use super::store::{ChecklistStore, StoreError};
use super::submission::{SubmissionError, SubmissionOrchestrator};

/// The external collaborators a questionnaire deployment is wired with.
#[derive(Clone)]
pub struct ExternalClients {
    pub extractor: Arc<dyn ChecklistExtractor>,
    pub answers: Arc<dyn AnswerService>,
    pub storage: Arc<dyn EvidenceStorage>,
    pub portal: Arc<dyn ReviewPortal>,
}

/// Error raised by the questionnaire facade.
#[derive(Debug, thiserror::Error)]
pub enum QuestionnaireError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Facade composing the checklist store, generation orchestrator, evidence
/// service, completion evaluator, and submission orchestrator over one
/// repository and client set.
pub struct QuestionnaireService<R> {
    repository: Arc<R>,
    store: ChecklistStore<R>,
    generation: AnswerGenerationOrchestrator<R>,
    evidence: EvidenceService<R>,
    submissions: SubmissionOrchestrator<R>,
}

impl<R> QuestionnaireService<R>
where
    R: QuestionnaireRepository + 'static,
{
    pub fn new(repository: Arc<R>, clients: ExternalClients, policy: PollPolicy) -> Self {
        let store = ChecklistStore::new(
            repository.clone(),
            clients.extractor.clone(),
            clients.storage.clone(),
        );
        let generation =
            AnswerGenerationOrchestrator::new(repository.clone(), clients.answers.clone(), policy);
        let evidence = EvidenceService::new(repository.clone(), clients.storage.clone());
        let submissions = SubmissionOrchestrator::new(repository.clone(), clients.portal.clone());
        Self {
            repository,
            store,
            generation,
            evidence,
            submissions,
        }
    }

    pub fn store(&self) -> &ChecklistStore<R> {
        &self.store
    }

    pub fn generation(&self) -> &AnswerGenerationOrchestrator<R> {
        &self.generation
    }

    pub fn evidence(&self) -> &EvidenceService<R> {
        &self.evidence
    }

    pub fn submissions(&self) -> &SubmissionOrchestrator<R> {
        &self.submissions
    }

    /// Readiness verdict for one checklist against its vendor's documents.
    pub fn readiness(&self, checklist_id: &ChecklistId) -> Result<ChecklistReadiness, QuestionnaireError> {
        let checklist = self
            .repository
            .fetch_checklist(checklist_id)?
            .ok_or(RepositoryError::NotFound)?;
        let questions = self.repository.questions_for_checklist(checklist_id)?;
        let documents = self.repository.documents_for_vendor(&checklist.vendor)?;
        Ok(CompletionEvaluator::evaluate(&questions, &documents))
    }

    /// Request-scoped generation context for a question's surroundings.
    pub fn context_for(&self, question_id: &QuestionId) -> Result<RequestContext, QuestionnaireError> {
        let question = self.fetch_question(question_id)?;
        let Some(checklist_id) = &question.checklist_id else {
            return Ok(RequestContext::default());
        };
        let checklist = self
            .repository
            .fetch_checklist(checklist_id)?
            .ok_or(RepositoryError::NotFound)?;
        let evidence_files = self
            .repository
            .documents_for_vendor(&checklist.vendor)?
            .into_iter()
            .map(|document| document.filename)
            .collect();
        Ok(RequestContext {
            checklist_name: Some(checklist.source_filename),
            evidence_files,
        })
    }

    /// Enter or exit edit mode for a question.
    pub fn toggle_edit(&self, question_id: &QuestionId) -> Result<Question, QuestionnaireError> {
        self.mutate(question_id, QuestionLifecycle::toggle_edit)
    }

    /// Save a human-written answer.
    pub fn save_answer(
        &self,
        question_id: &QuestionId,
        answer: &str,
    ) -> Result<Question, QuestionnaireError> {
        self.mutate(question_id, |question| {
            QuestionLifecycle::save_answer(question, answer)
        })
    }

    /// Record human sign-off on a completed answer.
    pub fn confirm_done(&self, question_id: &QuestionId) -> Result<Question, QuestionnaireError> {
        self.mutate(question_id, QuestionLifecycle::confirm_done)
    }

    fn mutate(
        &self,
        question_id: &QuestionId,
        apply: impl FnOnce(&mut Question) -> Result<(), LifecycleError>,
    ) -> Result<Question, QuestionnaireError> {
        let mut question = self.fetch_question(question_id)?;
        apply(&mut question)?;
        self.repository.update_question(question.clone())?;
        Ok(question)
    }

    fn fetch_question(&self, question_id: &QuestionId) -> Result<Question, QuestionnaireError> {
        Ok(self
            .repository
            .fetch_question(question_id)?
            .ok_or(RepositoryError::NotFound)?)
    }
}
