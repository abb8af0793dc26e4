use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clients::{ClientError, ReviewPortal};
use super::completion::{ChecklistReadiness, CompletionEvaluator};
use super::domain::{
    Checklist, ChecklistId, DocumentId, FollowUpKind, Question, QuestionId, QuestionOrigin,
    SubmissionId, SubmissionRecord, SubmissionSubject, VendorId,
};
use super::repository::{QuestionnaireRepository, RepositoryError};

/// Errors raised while preparing or executing a portal submission.
///
/// Validation variants are rejected before any portal round-trip.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("manual questions cannot be batch-submitted; submit them individually")]
    ManualBucketNotSubmittable,
    #[error("question {0} has no answer to submit")]
    MissingAnswer(QuestionId),
    #[error("a vendor must be selected for this submission")]
    MissingVendor,
    #[error("submission draft is not awaiting a follow-up decision")]
    NotAwaitingDecision,
    #[error("an explicit follow-up decision is required before submitting")]
    MissingFollowUpDecision,
    #[error("follow-up submissions must reference a parent submission")]
    MissingFollowUpParent,
    #[error("a parent submission only applies to follow-up submissions")]
    UnexpectedFollowUpParent,
    #[error("follow-up kind {0} contradicts an initial submission")]
    InconsistentFollowUpKind(FollowUpKind),
    #[error("parent submission {0} not found")]
    UnknownParent(SubmissionId),
    #[error("parent submission {0} does not target the same subject")]
    ParentSubjectMismatch(SubmissionId),
    #[error(
        "checklist {checklist_id} is not ready for submission: {} unanswered question(s), {} missing document(s)",
        .readiness.missing_answer_count(),
        .readiness.missing_document_count()
    )]
    IncompleteChecklist {
        checklist_id: ChecklistId,
        readiness: ChecklistReadiness,
    },
    #[error("failed to serialize submission snapshot")]
    Snapshot(#[from] serde_json::Error),
    #[error("review portal rejected the submission")]
    Portal {
        #[source]
        source: ClientError,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A checklist grouping as presented for batch submission; the manual bucket
/// is synthetic and can never be batch-submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecklistGroup {
    Checklist(ChecklistId),
    ManualBucket,
}

/// Raw follow-up answers collected from the caller, validated into a
/// [`FollowUpDecision`] before anything leaves the building.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FollowUpRequest {
    pub is_follow_up: bool,
    #[serde(default)]
    pub kind: Option<FollowUpKind>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub parent_submission_id: Option<SubmissionId>,
}

/// A resolved follow-up decision; constructing one requires the lineage
/// invariant to hold.
#[derive(Debug, Clone, PartialEq)]
pub enum FollowUpDecision {
    Initial,
    FollowUp {
        kind: FollowUpKind,
        reason: Option<String>,
        parent: SubmissionId,
    },
}

/// Progress of one submission draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Draft,
    AwaitingFollowUpDecision,
    Submitted,
}

impl DraftState {
    pub const fn label(self) -> &'static str {
        match self {
            DraftState::Draft => "draft",
            DraftState::AwaitingFollowUpDecision => "awaiting_follow_up_decision",
            DraftState::Submitted => "submitted",
        }
    }
}

/// One in-flight submission. Absence of a decision is never read as
/// "initial"; `submit` refuses drafts whose decision was never resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionDraft {
    subject: SubmissionSubject,
    vendor: VendorId,
    title: String,
    state: DraftState,
    decision: Option<FollowUpDecision>,
}

impl SubmissionDraft {
    pub fn subject(&self) -> &SubmissionSubject {
        &self.subject
    }

    pub fn vendor(&self) -> &VendorId {
        &self.vendor
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn decision(&self) -> Option<&FollowUpDecision> {
        self.decision.as_ref()
    }
}

/// Per-question slice of a submission snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub question: String,
    pub answer: Option<String>,
    pub confidence: Option<f32>,
    /// Checklist source filename, or "manual" for bucket questions.
    pub category: String,
    pub origin: QuestionOrigin,
    pub requires_document: bool,
}

/// Serialized submission payload. The shape is relied on by the portal for
/// replay and audit; extend it, never repurpose existing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionSnapshot {
    Checklist {
        source_filename: String,
        vendor: String,
        total_questions: usize,
        questions: Vec<QuestionSnapshot>,
        submitted_at: String,
    },
    Question {
        #[serde(flatten)]
        question: QuestionSnapshot,
        submitted_at: String,
    },
    Document {
        filename: String,
        content_type: String,
        byte_size: u64,
        storage_url: String,
        submitted_at: String,
    },
}

/// Stored record plus the portal's acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub record: SubmissionRecord,
    pub portal_id: String,
}

static SUBMISSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_submission_id() -> SubmissionId {
    let id = SUBMISSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SubmissionId(format!("sub-{id:06}"))
}

fn question_snapshot(question: &Question, category: &str) -> QuestionSnapshot {
    QuestionSnapshot {
        question: question.text.clone(),
        answer: question.answer.clone(),
        confidence: question.confidence,
        category: category.to_string(),
        origin: question.origin(),
        requires_document: question.requires_document,
    }
}

/// Packages checklists, questions, and documents into portal submissions,
/// preserving the follow-up/amendment lineage.
pub struct SubmissionOrchestrator<R> {
    repository: Arc<R>,
    portal: Arc<dyn ReviewPortal>,
}

impl<R> SubmissionOrchestrator<R>
where
    R: QuestionnaireRepository + 'static,
{
    pub fn new(repository: Arc<R>, portal: Arc<dyn ReviewPortal>) -> Self {
        Self { repository, portal }
    }

    /// Open a draft for a whole checklist group.
    ///
    /// The synthetic manual bucket is rejected here, before any decision or
    /// portal activity; its questions must be submitted individually.
    pub fn prepare_checklist(
        &self,
        group: ChecklistGroup,
    ) -> Result<SubmissionDraft, SubmissionError> {
        let checklist_id = match group {
            ChecklistGroup::ManualBucket => return Err(SubmissionError::ManualBucketNotSubmittable),
            ChecklistGroup::Checklist(id) => id,
        };
        let checklist = self.fetch_checklist(&checklist_id)?;
        Ok(SubmissionDraft {
            subject: SubmissionSubject::Checklist(checklist_id),
            vendor: checklist.vendor.clone(),
            title: format!("Compliance checklist: {}", checklist.source_filename),
            state: DraftState::AwaitingFollowUpDecision,
            decision: None,
        })
    }

    /// Open a draft for one answered question. Manual questions carry no
    /// checklist, so the caller must supply the vendor for them.
    pub fn prepare_question(
        &self,
        question_id: &QuestionId,
        vendor: Option<VendorId>,
    ) -> Result<SubmissionDraft, SubmissionError> {
        let question = self.fetch_question(question_id)?;
        if !question.has_answer() {
            return Err(SubmissionError::MissingAnswer(question_id.clone()));
        }
        let vendor = match &question.checklist_id {
            Some(checklist_id) => self.fetch_checklist(checklist_id)?.vendor,
            None => vendor.ok_or(SubmissionError::MissingVendor)?,
        };
        let title: String = question.text.chars().take(80).collect();
        Ok(SubmissionDraft {
            subject: SubmissionSubject::Question(question_id.clone()),
            vendor,
            title: format!("Question: {title}"),
            state: DraftState::AwaitingFollowUpDecision,
            decision: None,
        })
    }

    /// Open a draft for one supporting document. No completeness gate: a
    /// single document is neither complete nor incomplete.
    pub fn prepare_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<SubmissionDraft, SubmissionError> {
        let document = self
            .repository
            .fetch_document(document_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(SubmissionDraft {
            subject: SubmissionSubject::Document(document_id.clone()),
            vendor: document.vendor,
            title: format!("Supporting document: {}", document.filename),
            state: DraftState::AwaitingFollowUpDecision,
            decision: None,
        })
    }

    /// Resolve the follow-up decision for a draft.
    ///
    /// Enforces the lineage invariant both ways (`is_follow_up` ⇔ parent id
    /// present) and checks that the parent exists and targets the same
    /// subject, all before any portal call.
    pub fn resolve_decision(
        &self,
        draft: &mut SubmissionDraft,
        request: FollowUpRequest,
    ) -> Result<(), SubmissionError> {
        if draft.state != DraftState::AwaitingFollowUpDecision {
            return Err(SubmissionError::NotAwaitingDecision);
        }

        let decision = if request.is_follow_up {
            let parent = request
                .parent_submission_id
                .ok_or(SubmissionError::MissingFollowUpParent)?;
            let parent_record = self
                .repository
                .fetch_submission(&parent)?
                .ok_or_else(|| SubmissionError::UnknownParent(parent.clone()))?;
            if parent_record.subject != draft.subject {
                return Err(SubmissionError::ParentSubjectMismatch(parent));
            }
            FollowUpDecision::FollowUp {
                kind: request.kind.unwrap_or(FollowUpKind::FollowUp),
                reason: request.reason,
                parent,
            }
        } else {
            if request.parent_submission_id.is_some() {
                return Err(SubmissionError::UnexpectedFollowUpParent);
            }
            if let Some(kind) = request.kind {
                if kind != FollowUpKind::Initial {
                    return Err(SubmissionError::InconsistentFollowUpKind(kind));
                }
            }
            FollowUpDecision::Initial
        };

        draft.decision = Some(decision);
        Ok(())
    }

    /// Execute a decided draft against the review portal.
    ///
    /// Subject gates are re-validated here: checklist completeness may have
    /// changed since the draft was opened, and the rejection carries the
    /// structured readiness counts rather than a bare refusal.
    pub async fn submit(
        &self,
        mut draft: SubmissionDraft,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if draft.state != DraftState::AwaitingFollowUpDecision {
            return Err(SubmissionError::NotAwaitingDecision);
        }
        let decision = draft
            .decision
            .clone()
            .ok_or(SubmissionError::MissingFollowUpDecision)?;

        let submitted_at = Utc::now();
        let snapshot = self.build_snapshot(&draft.subject, submitted_at.to_rfc3339())?;
        let content = serde_json::to_string(&snapshot)?;

        let (is_follow_up, follow_up_kind, follow_up_reason, parent_submission_id) = match decision
        {
            FollowUpDecision::Initial => (false, FollowUpKind::Initial, None, None),
            FollowUpDecision::FollowUp {
                kind,
                reason,
                parent,
            } => (true, kind, reason, Some(parent)),
        };

        let record = SubmissionRecord {
            id: next_submission_id(),
            subject: draft.subject.clone(),
            vendor: draft.vendor.clone(),
            title: draft.title.clone(),
            content,
            is_follow_up,
            follow_up_kind,
            follow_up_reason,
            parent_submission_id,
            submitted_at,
        };

        let receipt = self
            .portal
            .create_submission(&record)
            .await
            .map_err(|source| SubmissionError::Portal { source })?;

        let record = self.repository.insert_submission(record)?;
        if let SubmissionSubject::Checklist(checklist_id) = &record.subject {
            let mut checklist = self.fetch_checklist(checklist_id)?;
            checklist.sent_to_trust_portal = true;
            checklist.submitted_at = Some(submitted_at);
            self.repository.update_checklist(checklist)?;
        }

        draft.state = DraftState::Submitted;
        info!(
            submission_id = %record.id.0,
            portal_id = %receipt.portal_id,
            subject = record.subject.label(),
            follow_up = record.is_follow_up,
            "submission accepted by review portal"
        );
        Ok(SubmissionReceipt {
            record,
            portal_id: receipt.portal_id,
        })
    }

    fn build_snapshot(
        &self,
        subject: &SubmissionSubject,
        submitted_at: String,
    ) -> Result<SubmissionSnapshot, SubmissionError> {
        match subject {
            SubmissionSubject::Checklist(checklist_id) => {
                let checklist = self.fetch_checklist(checklist_id)?;
                let questions = self.repository.questions_for_checklist(checklist_id)?;
                let documents = self.repository.documents_for_vendor(&checklist.vendor)?;
                let readiness = CompletionEvaluator::evaluate(&questions, &documents);
                if !readiness.is_complete {
                    return Err(SubmissionError::IncompleteChecklist {
                        checklist_id: checklist_id.clone(),
                        readiness,
                    });
                }
                Ok(SubmissionSnapshot::Checklist {
                    source_filename: checklist.source_filename.clone(),
                    vendor: checklist.vendor.0.clone(),
                    total_questions: questions.len(),
                    questions: questions
                        .iter()
                        .map(|question| question_snapshot(question, &checklist.source_filename))
                        .collect(),
                    submitted_at,
                })
            }
            SubmissionSubject::Question(question_id) => {
                let question = self.fetch_question(question_id)?;
                if !question.has_answer() {
                    return Err(SubmissionError::MissingAnswer(question_id.clone()));
                }
                let category = match &question.checklist_id {
                    Some(checklist_id) => self.fetch_checklist(checklist_id)?.source_filename,
                    None => "manual".to_string(),
                };
                Ok(SubmissionSnapshot::Question {
                    question: question_snapshot(&question, &category),
                    submitted_at,
                })
            }
            SubmissionSubject::Document(document_id) => {
                let document = self
                    .repository
                    .fetch_document(document_id)?
                    .ok_or(RepositoryError::NotFound)?;
                Ok(SubmissionSnapshot::Document {
                    filename: document.filename,
                    content_type: document.content_type,
                    byte_size: document.byte_size,
                    storage_url: document.storage_url,
                    submitted_at,
                })
            }
        }
    }

    fn fetch_checklist(&self, id: &ChecklistId) -> Result<Checklist, SubmissionError> {
        Ok(self
            .repository
            .fetch_checklist(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    fn fetch_question(&self, id: &QuestionId) -> Result<Question, SubmissionError> {
        Ok(self
            .repository
            .fetch_question(id)?
            .ok_or(RepositoryError::NotFound)?)
    }
}
