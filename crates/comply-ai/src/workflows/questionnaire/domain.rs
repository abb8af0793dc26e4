use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for uploaded checklists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChecklistId(pub String);

/// Identifier wrapper for extracted or manually added questions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(pub String);

/// Identifier wrapper for uploaded supporting documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Identifier wrapper for portal submission records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

/// Identifier wrapper for the vendor that owns a checklist and its evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VendorId(pub String);

impl fmt::Display for ChecklistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extraction progress for an uploaded checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Uploading,
    Extracting,
    Completed,
    Error,
}

impl ExtractionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ExtractionStatus::Uploading => "uploading",
            ExtractionStatus::Extracting => "extracting",
            ExtractionStatus::Completed => "completed",
            ExtractionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An uploaded compliance checklist reduced to an ordered set of questions.
///
/// The question collection itself lives in the repository; ordering is carried
/// by each question's `position` and re-derived on read rather than cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: ChecklistId,
    pub vendor: VendorId,
    pub source_filename: String,
    pub extraction_status: ExtractionStatus,
    /// Retained alongside the `error` status so an operator can inspect why
    /// extraction failed before retrying.
    pub extraction_error: Option<String>,
    pub sent_to_trust_portal: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Answer lifecycle status tracked for every question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Pending,
    InProgress,
    Completed,
    Done,
    NeedsSupport,
}

impl QuestionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionStatus::Pending => "pending",
            QuestionStatus::InProgress => "in_progress",
            QuestionStatus::Completed => "completed",
            QuestionStatus::Done => "done",
            QuestionStatus::NeedsSupport => "needs_support",
        }
    }

    /// Whether the status represents a finished answer, AI- or human-confirmed.
    pub const fn is_answer_final(self) -> bool {
        matches!(self, QuestionStatus::Completed | QuestionStatus::Done)
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a question came from, carried into submission snapshots for audits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
    Checklist,
    Manual,
}

/// One extracted or manually added compliance query with its answer lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// `None` marks a manual question belonging to the synthetic manual bucket.
    pub checklist_id: Option<ChecklistId>,
    pub text: String,
    pub position: u32,
    pub status: QuestionStatus,
    pub answer: Option<String>,
    /// Model confidence for the stored answer, clamped to [0, 1].
    pub confidence: Option<f32>,
    pub requires_document: bool,
    pub document_description: Option<String>,
    /// Human sign-off, orthogonal to the AI-assigned `completed` status.
    pub is_done: bool,
}

impl Question {
    /// The stored answer, if it contains any non-whitespace text.
    pub fn answer_text(&self) -> Option<&str> {
        self.answer
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn has_answer(&self) -> bool {
        self.answer_text().is_some()
    }

    pub fn origin(&self) -> QuestionOrigin {
        if self.checklist_id.is_some() {
            QuestionOrigin::Checklist
        } else {
            QuestionOrigin::Manual
        }
    }

    pub fn status_view(&self) -> QuestionStatusView {
        QuestionStatusView {
            question_id: self.id.clone(),
            status: self.status.label(),
            answer: self.answer.clone(),
            confidence: self.confidence,
            requires_document: self.requires_document,
            human_confirmed: self.is_done,
        }
    }
}

/// Sanitized representation of a question's exposed state.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionStatusView {
    pub question_id: QuestionId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub requires_document: bool,
    pub human_confirmed: bool,
}

/// Evidence file attached to a question, or left general for the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingDocument {
    pub id: DocumentId,
    /// `None` marks a general vendor-level document not tied to a question.
    pub question_id: Option<QuestionId>,
    pub vendor: VendorId,
    pub filename: String,
    pub content_type: String,
    pub byte_size: u64,
    pub storage_url: String,
    pub storage_key: String,
}

/// Classification of a portal submission relative to its lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    Initial,
    FollowUp,
    Resubmission,
    Clarification,
    AdditionalDocs,
}

impl FollowUpKind {
    pub const fn label(self) -> &'static str {
        match self {
            FollowUpKind::Initial => "initial",
            FollowUpKind::FollowUp => "follow_up",
            FollowUpKind::Resubmission => "resubmission",
            FollowUpKind::Clarification => "clarification",
            FollowUpKind::AdditionalDocs => "additional_docs",
        }
    }
}

impl fmt::Display for FollowUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The one entity a submission snapshot is taken of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SubmissionSubject {
    Checklist(ChecklistId),
    Question(QuestionId),
    Document(DocumentId),
}

impl SubmissionSubject {
    pub const fn label(&self) -> &'static str {
        match self {
            SubmissionSubject::Checklist(_) => "checklist",
            SubmissionSubject::Question(_) => "question",
            SubmissionSubject::Document(_) => "document",
        }
    }
}

/// Immutable snapshot sent to the external review portal.
///
/// Amendments never mutate an existing record; they are new records chained
/// through `parent_submission_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub subject: SubmissionSubject,
    pub vendor: VendorId,
    pub title: String,
    /// Serialized snapshot; schema kept stable for portal-side replay.
    pub content: String,
    pub is_follow_up: bool,
    pub follow_up_kind: FollowUpKind,
    pub follow_up_reason: Option<String>,
    pub parent_submission_id: Option<SubmissionId>,
    pub submitted_at: DateTime<Utc>,
}
