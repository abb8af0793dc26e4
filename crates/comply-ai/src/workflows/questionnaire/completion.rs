use serde::Serialize;

use super::domain::{Question, QuestionId, SupportingDocument};
use super::evidence::requirement_satisfied;

/// What a question is still missing before it can ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRequirement {
    Answer,
    SupportingDocument,
}

/// One not-yet-submittable question with the reasons it is blocked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncompleteQuestion {
    pub question_id: QuestionId,
    pub text: String,
    pub missing: Vec<MissingRequirement>,
}

/// Checklist-level readiness verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistReadiness {
    pub is_complete: bool,
    pub total_questions: usize,
    pub completed_questions: usize,
    pub questions_needing_docs: usize,
    pub questions_with_docs: usize,
    pub incomplete_questions: Vec<IncompleteQuestion>,
}

impl ChecklistReadiness {
    pub fn missing_answer_count(&self) -> usize {
        self.incomplete_questions
            .iter()
            .filter(|entry| entry.missing.contains(&MissingRequirement::Answer))
            .count()
    }

    pub fn missing_document_count(&self) -> usize {
        self.incomplete_questions
            .iter()
            .filter(|entry| {
                entry
                    .missing
                    .contains(&MissingRequirement::SupportingDocument)
            })
            .count()
    }
}

/// Aggregates question and document state into a readiness verdict.
pub struct CompletionEvaluator;

impl CompletionEvaluator {
    /// Evaluate one checklist's question set against the vendor's documents.
    ///
    /// A question counts as complete once it holds a non-empty answer in an
    /// answered state and, when it requires evidence, at least one document
    /// references it. An empty checklist is never complete: a silently empty
    /// extraction must not look submittable.
    pub fn evaluate(
        questions: &[Question],
        documents: &[SupportingDocument],
    ) -> ChecklistReadiness {
        let mut completed_questions = 0;
        let mut questions_needing_docs = 0;
        let mut questions_with_docs = 0;
        let mut incomplete_questions = Vec::new();

        for question in questions {
            let answered = question.status.is_answer_final() && question.has_answer();
            if answered {
                completed_questions += 1;
            }

            let mut missing = Vec::new();
            if !answered {
                missing.push(MissingRequirement::Answer);
            }

            if question.requires_document {
                questions_needing_docs += 1;
                if requirement_satisfied(question, documents) {
                    questions_with_docs += 1;
                } else {
                    missing.push(MissingRequirement::SupportingDocument);
                }
            }

            if !missing.is_empty() {
                incomplete_questions.push(IncompleteQuestion {
                    question_id: question.id.clone(),
                    text: question.text.clone(),
                    missing,
                });
            }
        }

        ChecklistReadiness {
            is_complete: incomplete_questions.is_empty() && !questions.is_empty(),
            total_questions: questions.len(),
            completed_questions,
            questions_needing_docs,
            questions_with_docs,
            incomplete_questions,
        }
    }
}
