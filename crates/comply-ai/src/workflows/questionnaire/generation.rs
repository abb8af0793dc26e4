use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;

use super::clients::{
    AnswerRequest, AnswerService, BatchAnswerRequest, BatchAnswerStatus, BatchQuestion,
    ClientError, RequestContext,
};
use super::domain::{
    ChecklistId, ExtractionStatus, Question, QuestionId, QuestionStatus, VendorId,
};
use super::lifecycle::{LifecycleError, QuestionLifecycle};
use super::repository::{QuestionnaireRepository, RepositoryError};

/// Errors raised by answer generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),
    #[error("checklist {checklist_id} is not ready for generation (extraction {status})")]
    ChecklistNotReady {
        checklist_id: ChecklistId,
        status: ExtractionStatus,
    },
    #[error("answer generation failed for question {question_id}")]
    Failed {
        question_id: QuestionId,
        #[source]
        source: ClientError,
    },
    #[error("batch generation dispatch failed")]
    BatchDispatch {
        #[source]
        source: ClientError,
    },
    #[error("batch generation poll failed")]
    BatchPoll {
        #[source]
        source: ClientError,
    },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Bounded polling budget for asynchronous batch jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

impl From<&GenerationConfig> for PollPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.poll_max_attempts,
        }
    }
}

/// Which question set a batch run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchScope {
    Checklist(ChecklistId),
    Vendor(VendorId),
}

/// Snapshot reported after each batch poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_pending: Option<String>,
}

/// Observer hook for batch progress; the default implementation logs.
pub trait BatchProgressListener: Send + Sync {
    fn on_progress(&self, progress: &BatchProgress);
}

struct TracingProgressListener;

impl BatchProgressListener for TracingProgressListener {
    fn on_progress(&self, progress: &BatchProgress) {
        info!(
            completed = progress.completed,
            total = progress.total,
            next_pending = progress.next_pending.as_deref().unwrap_or(""),
            "batch generation progress"
        );
    }
}

/// Result of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub completed: usize,
    pub still_pending: Vec<QuestionId>,
    /// The poll budget ran out with questions still pending; the underlying
    /// job may finish in the background, so those questions stay `pending`.
    pub timed_out: bool,
    pub poll_attempts: u32,
}

/// Drives single and batch AI answer requests.
pub struct AnswerGenerationOrchestrator<R> {
    repository: Arc<R>,
    answers: Arc<dyn AnswerService>,
    policy: PollPolicy,
    listener: Arc<dyn BatchProgressListener>,
    dispatch_tokens: Mutex<HashMap<QuestionId, u64>>,
    dispatch_sequence: AtomicU64,
}

impl<R> AnswerGenerationOrchestrator<R>
where
    R: QuestionnaireRepository + 'static,
{
    pub fn new(repository: Arc<R>, answers: Arc<dyn AnswerService>, policy: PollPolicy) -> Self {
        Self {
            repository,
            answers,
            policy,
            listener: Arc::new(TracingProgressListener),
            dispatch_tokens: Mutex::new(HashMap::new()),
            dispatch_sequence: AtomicU64::new(1),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn BatchProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    fn issue_token(&self, question_id: &QuestionId) -> u64 {
        let token = self.dispatch_sequence.fetch_add(1, Ordering::Relaxed);
        let mut tokens = self
            .dispatch_tokens
            .lock()
            .expect("dispatch token mutex poisoned");
        tokens.insert(question_id.clone(), token);
        token
    }

    fn token_is_current(&self, question_id: &QuestionId, token: u64) -> bool {
        let tokens = self
            .dispatch_tokens
            .lock()
            .expect("dispatch token mutex poisoned");
        tokens.get(question_id) == Some(&token)
    }

    /// Generate an answer for one question.
    ///
    /// Rejects a dispatch while the question is already `in-progress`; use
    /// [`regenerate_answer`] to supersede an in-flight call.
    ///
    /// [`regenerate_answer`]: AnswerGenerationOrchestrator::regenerate_answer
    pub async fn generate_answer(
        &self,
        question_id: &QuestionId,
        context: RequestContext,
    ) -> Result<Question, GenerationError> {
        let mut question = self.fetch_question(question_id)?;
        self.ensure_checklist_ready(&question)?;
        QuestionLifecycle::begin_generation(&mut question)?;
        self.repository.update_question(question.clone())?;
        self.dispatch(question, context).await
    }

    /// Generate a fresh answer for a question regardless of an in-flight
    /// call. The superseded call's late response is discarded when it lands.
    pub async fn regenerate_answer(
        &self,
        question_id: &QuestionId,
        context: RequestContext,
    ) -> Result<Question, GenerationError> {
        let mut question = self.fetch_question(question_id)?;
        self.ensure_checklist_ready(&question)?;
        QuestionLifecycle::begin_regeneration(&mut question);
        self.repository.update_question(question.clone())?;
        self.dispatch(question, context).await
    }

    async fn dispatch(
        &self,
        question: Question,
        context: RequestContext,
    ) -> Result<Question, GenerationError> {
        let token = self.issue_token(&question.id);
        let request = AnswerRequest {
            question_id: question.id.clone(),
            question_text: question.text.clone(),
            context,
        };

        match self.answers.generate(request).await {
            Ok(generated) => {
                if !self.token_is_current(&question.id, token) {
                    debug!(
                        question_id = %question.id.0,
                        "stale generation response ignored; a newer dispatch owns this question"
                    );
                    return self.fetch_question(&question.id);
                }
                let mut current = self.fetch_question(&question.id)?;
                QuestionLifecycle::apply_generated_answer(
                    &mut current,
                    &generated.answer,
                    generated.confidence,
                )?;
                self.repository.update_question(current.clone())?;
                Ok(current)
            }
            Err(source) => {
                if self.token_is_current(&question.id, token) {
                    let mut current = self.fetch_question(&question.id)?;
                    QuestionLifecycle::mark_needs_support(&mut current)?;
                    self.repository.update_question(current)?;
                }
                Err(GenerationError::Failed {
                    question_id: question.id,
                    source,
                })
            }
        }
    }

    /// Submit every pending question in scope as one bulk job, then poll the
    /// question set until it drains or the attempt budget runs out.
    ///
    /// Exhausting the budget is a soft timeout: unfinished questions stay
    /// `pending` because the bulk job can outlive the poll window.
    pub async fn generate_batch(
        &self,
        scope: BatchScope,
        context: RequestContext,
    ) -> Result<BatchOutcome, GenerationError> {
        let pending = self.pending_questions(&scope)?;
        let scope_ids: Vec<QuestionId> = pending.iter().map(|question| question.id.clone()).collect();
        let total = scope_ids.len();
        if total == 0 {
            return Ok(BatchOutcome {
                total: 0,
                completed: 0,
                still_pending: Vec::new(),
                timed_out: false,
                poll_attempts: 0,
            });
        }

        let request = BatchAnswerRequest {
            questions: pending
                .iter()
                .map(|question| BatchQuestion {
                    question_id: question.id.clone(),
                    question_text: question.text.clone(),
                })
                .collect(),
            context,
        };
        let handle = self
            .answers
            .generate_batch(request)
            .await
            .map_err(|source| GenerationError::BatchDispatch { source })?;

        let mut attempts = 0;
        loop {
            if attempts >= self.policy.max_attempts {
                let still_pending = self.still_pending(&scope_ids)?;
                warn!(
                    attempts,
                    still_pending = still_pending.len(),
                    "batch poll budget exhausted; generation may still be completing in the background"
                );
                return Ok(BatchOutcome {
                    total,
                    completed: total - still_pending.len(),
                    still_pending,
                    timed_out: true,
                    poll_attempts: attempts,
                });
            }

            tokio::time::sleep(self.policy.interval).await;
            attempts += 1;

            let updates = self
                .answers
                .poll_batch(&handle)
                .await
                .map_err(|source| GenerationError::BatchPoll { source })?;
            for update in updates {
                if update.status != BatchAnswerStatus::Completed {
                    continue;
                }
                let Some(answer) = update.answer.as_deref() else {
                    continue;
                };
                let Some(mut question) = self.repository.fetch_question(&update.question_id)? else {
                    continue;
                };
                // A question picked up by a single dispatch mid-batch is no
                // longer pending; that dispatch owns it now.
                if question.status != QuestionStatus::Pending {
                    continue;
                }
                QuestionLifecycle::apply_generated_answer(
                    &mut question,
                    answer,
                    update.confidence.unwrap_or(0.0),
                )?;
                self.repository.update_question(question)?;
            }

            let still_pending = self.still_pending(&scope_ids)?;
            let progress = BatchProgress {
                completed: total - still_pending.len(),
                total,
                next_pending: self.next_pending_text(&still_pending)?,
            };
            self.listener.on_progress(&progress);

            if still_pending.is_empty() {
                return Ok(BatchOutcome {
                    total,
                    completed: total,
                    still_pending: Vec::new(),
                    timed_out: false,
                    poll_attempts: attempts,
                });
            }
        }
    }

    fn fetch_question(&self, id: &QuestionId) -> Result<Question, GenerationError> {
        self.repository
            .fetch_question(id)?
            .ok_or_else(|| GenerationError::QuestionNotFound(id.clone()))
    }

    fn ensure_checklist_ready(&self, question: &Question) -> Result<(), GenerationError> {
        let Some(checklist_id) = &question.checklist_id else {
            return Ok(());
        };
        let checklist = self
            .repository
            .fetch_checklist(checklist_id)?
            .ok_or(RepositoryError::NotFound)?;
        if checklist.extraction_status != ExtractionStatus::Completed {
            return Err(GenerationError::ChecklistNotReady {
                checklist_id: checklist_id.clone(),
                status: checklist.extraction_status,
            });
        }
        Ok(())
    }

    fn pending_questions(&self, scope: &BatchScope) -> Result<Vec<Question>, GenerationError> {
        let questions = match scope {
            BatchScope::Checklist(checklist_id) => {
                let checklist = self
                    .repository
                    .fetch_checklist(checklist_id)?
                    .ok_or(RepositoryError::NotFound)?;
                if checklist.extraction_status != ExtractionStatus::Completed {
                    return Err(GenerationError::ChecklistNotReady {
                        checklist_id: checklist_id.clone(),
                        status: checklist.extraction_status,
                    });
                }
                self.repository.questions_for_checklist(checklist_id)?
            }
            BatchScope::Vendor(vendor) => {
                let mut questions = Vec::new();
                for checklist in self.repository.checklists_for_vendor(vendor)? {
                    if checklist.extraction_status != ExtractionStatus::Completed {
                        continue;
                    }
                    questions.extend(self.repository.questions_for_checklist(&checklist.id)?);
                }
                questions
            }
        };
        Ok(questions
            .into_iter()
            .filter(|question| question.status == QuestionStatus::Pending)
            .collect())
    }

    fn still_pending(&self, scope_ids: &[QuestionId]) -> Result<Vec<QuestionId>, GenerationError> {
        let mut pending = Vec::new();
        for id in scope_ids {
            if let Some(question) = self.repository.fetch_question(id)? {
                if question.status == QuestionStatus::Pending {
                    pending.push(question.id);
                }
            }
        }
        Ok(pending)
    }

    fn next_pending_text(
        &self,
        still_pending: &[QuestionId],
    ) -> Result<Option<String>, GenerationError> {
        let Some(id) = still_pending.first() else {
            return Ok(None);
        };
        Ok(self
            .repository
            .fetch_question(id)?
            .map(|question| question.text))
    }
}
