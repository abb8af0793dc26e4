use super::domain::{Question, QuestionId, QuestionStatus};

/// Errors raised by the question state machine.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("generation already in progress for question {question_id}")]
    DispatchWhileInProgress { question_id: QuestionId },
    #[error("question {question_id} cannot be marked answered without answer text")]
    EmptyAnswer { question_id: QuestionId },
    #[error("question {question_id} cannot {action} while {from}")]
    InvalidTransition {
        question_id: QuestionId,
        from: QuestionStatus,
        action: &'static str,
    },
}

/// The state machine governing a single question's status.
///
/// All status mutation funnels through here so the answered-state invariant
/// (`completed`/`done` implies a non-empty answer) holds at every exit point.
pub struct QuestionLifecycle;

impl QuestionLifecycle {
    /// Reserve the question for a generation dispatch.
    ///
    /// Rejects a second dispatch while one is already in flight; callers that
    /// intentionally supersede an in-flight call use [`begin_regeneration`].
    ///
    /// [`begin_regeneration`]: QuestionLifecycle::begin_regeneration
    pub fn begin_generation(question: &mut Question) -> Result<(), LifecycleError> {
        if question.status == QuestionStatus::InProgress {
            return Err(LifecycleError::DispatchWhileInProgress {
                question_id: question.id.clone(),
            });
        }
        question.status = QuestionStatus::InProgress;
        question.is_done = false;
        Ok(())
    }

    /// Reserve the question for a regeneration dispatch, superseding any
    /// in-flight call. The older call's late response is discarded by the
    /// orchestrator's dispatch token, not cancelled.
    pub fn begin_regeneration(question: &mut Question) {
        question.status = QuestionStatus::InProgress;
        question.is_done = false;
    }

    /// Store a generated answer and move the question to `completed`.
    pub fn apply_generated_answer(
        question: &mut Question,
        answer: &str,
        confidence: f32,
    ) -> Result<(), LifecycleError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(LifecycleError::EmptyAnswer {
                question_id: question.id.clone(),
            });
        }
        match question.status {
            QuestionStatus::Pending | QuestionStatus::InProgress => {
                question.answer = Some(answer.to_string());
                question.confidence = Some(confidence.clamp(0.0, 1.0));
                question.status = QuestionStatus::Completed;
                question.is_done = false;
                Ok(())
            }
            from => Err(LifecycleError::InvalidTransition {
                question_id: question.id.clone(),
                from,
                action: "store a generated answer",
            }),
        }
    }

    /// Record a generation failure. The question waits at `needs-support`
    /// until a human re-invokes generation.
    pub fn mark_needs_support(question: &mut Question) -> Result<(), LifecycleError> {
        match question.status {
            QuestionStatus::Pending | QuestionStatus::InProgress => {
                question.status = QuestionStatus::NeedsSupport;
                question.is_done = false;
                Ok(())
            }
            from => Err(LifecycleError::InvalidTransition {
                question_id: question.id.clone(),
                from,
                action: "be marked as needing support",
            }),
        }
    }

    /// Enter or exit human edit mode.
    ///
    /// Entering from `completed`/`done` always clears the human sign-off.
    /// Toggling while already editing exits without saving: the stored answer
    /// is untouched and the status falls back to `completed` when an answer
    /// exists, `pending` otherwise.
    pub fn toggle_edit(question: &mut Question) -> Result<(), LifecycleError> {
        match question.status {
            QuestionStatus::Completed | QuestionStatus::Done => {
                question.status = QuestionStatus::InProgress;
                question.is_done = false;
                Ok(())
            }
            QuestionStatus::InProgress => {
                question.status = if question.has_answer() {
                    QuestionStatus::Completed
                } else {
                    QuestionStatus::Pending
                };
                Ok(())
            }
            from => Err(LifecycleError::InvalidTransition {
                question_id: question.id.clone(),
                from,
                action: "enter edit mode",
            }),
        }
    }

    /// Save a human-written answer, moving the question to `completed`.
    ///
    /// Accepted from any state but `done` so manual questions and stuck
    /// `needs-support` questions can be answered by hand.
    pub fn save_answer(question: &mut Question, answer: &str) -> Result<(), LifecycleError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(LifecycleError::EmptyAnswer {
                question_id: question.id.clone(),
            });
        }
        if question.status == QuestionStatus::Done {
            return Err(LifecycleError::InvalidTransition {
                question_id: question.id.clone(),
                from: QuestionStatus::Done,
                action: "save an answer",
            });
        }
        question.answer = Some(answer.to_string());
        question.status = QuestionStatus::Completed;
        question.is_done = false;
        Ok(())
    }

    /// Record human sign-off on a completed answer.
    pub fn confirm_done(question: &mut Question) -> Result<(), LifecycleError> {
        if question.status != QuestionStatus::Completed {
            return Err(LifecycleError::InvalidTransition {
                question_id: question.id.clone(),
                from: question.status,
                action: "be confirmed as done",
            });
        }
        if !question.has_answer() {
            return Err(LifecycleError::EmptyAnswer {
                question_id: question.id.clone(),
            });
        }
        question.status = QuestionStatus::Done;
        question.is_done = true;
        Ok(())
    }
}
