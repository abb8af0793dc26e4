//! Questionnaire completion and submission workflow.
//!
//! An uploaded compliance checklist is reduced to questions, each question is
//! driven through AI-assisted answering and human review, evidence
//! requirements gate readiness, and completed work ships to the counter-party
//! review portal with its follow-up lineage intact.

pub mod clients;
pub mod completion;
pub mod domain;
pub mod evidence;
pub mod generation;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod submission;

#[cfg(test)]
mod tests;

pub use clients::{
    AnswerRequest, AnswerService, BatchAnswerRequest, BatchAnswerStatus, BatchAnswerUpdate,
    BatchJobHandle, BatchQuestion, BlobMetadata, ChecklistExtractor, ChecklistUpload, ClientError,
    EvidenceStorage, GeneratedAnswer, PortalReceipt, RequestContext, ReviewPortal, StoredBlob,
};
pub use completion::{
    ChecklistReadiness, CompletionEvaluator, IncompleteQuestion, MissingRequirement,
};
pub use domain::{
    Checklist, ChecklistId, DocumentId, ExtractionStatus, FollowUpKind, Question, QuestionId,
    QuestionOrigin, QuestionStatus, QuestionStatusView, SubmissionId, SubmissionRecord,
    SubmissionSubject, SupportingDocument, VendorId,
};
pub use evidence::{requirement_satisfied, DocumentUpload, EvidenceError, EvidenceService};
pub use generation::{
    AnswerGenerationOrchestrator, BatchOutcome, BatchProgress, BatchProgressListener, BatchScope,
    GenerationError, PollPolicy,
};
pub use lifecycle::{LifecycleError, QuestionLifecycle};
pub use repository::{
    CascadeOutcome, InMemoryQuestionnaireRepository, QuestionnaireRepository, RepositoryError,
};
pub use router::questionnaire_router;
pub use service::{ExternalClients, QuestionnaireError, QuestionnaireService};
pub use store::{ChecklistStore, StoreError};
pub use submission::{
    ChecklistGroup, DraftState, FollowUpDecision, FollowUpRequest, QuestionSnapshot,
    SubmissionDraft, SubmissionError, SubmissionOrchestrator, SubmissionReceipt,
    SubmissionSnapshot,
};
