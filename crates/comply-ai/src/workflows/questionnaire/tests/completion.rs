use super::common::*;
use crate::workflows::questionnaire::completion::{CompletionEvaluator, MissingRequirement};
use crate::workflows::questionnaire::domain::{ChecklistId, QuestionStatus};
use crate::workflows::questionnaire::repository::InMemoryQuestionnaireRepository;

#[test]
fn empty_checklist_is_never_complete() {
    let readiness = CompletionEvaluator::evaluate(&[], &[]);
    assert!(!readiness.is_complete);
    assert_eq!(readiness.total_questions, 0);
}

#[test]
fn unanswered_document_requirement_blocks_completion() {
    // Three answered-capable questions, one of which also demands evidence
    // that has not been uploaded.
    let repository = InMemoryQuestionnaireRepository::default();
    let checklist_id = ChecklistId("chk-a".to_string());

    let q1 = answered(seed_question(&repository, "q-1", Some(&checklist_id), 0), "Yes.");
    let q2 = answered(seed_question(&repository, "q-2", Some(&checklist_id), 1), "Yes.");
    let mut q3 = answered(seed_question(&repository, "q-3", Some(&checklist_id), 2), "Yes.");
    q3.requires_document = true;

    let readiness = CompletionEvaluator::evaluate(&[q1, q2, q3.clone()], &[]);
    assert!(!readiness.is_complete);
    assert_eq!(readiness.total_questions, 3);
    assert_eq!(readiness.completed_questions, 3);
    assert_eq!(readiness.questions_needing_docs, 1);
    assert_eq!(readiness.questions_with_docs, 0);
    assert_eq!(readiness.incomplete_questions.len(), 1);
    assert_eq!(readiness.incomplete_questions[0].question_id, q3.id);
    assert_eq!(
        readiness.incomplete_questions[0].missing,
        vec![MissingRequirement::SupportingDocument]
    );
}

#[test]
fn uploading_the_evidence_completes_the_checklist() {
    let repository = InMemoryQuestionnaireRepository::default();
    let checklist_id = ChecklistId("chk-a".to_string());

    let q1 = answered(seed_question(&repository, "q-1", Some(&checklist_id), 0), "Yes.");
    let q2 = answered(seed_question(&repository, "q-2", Some(&checklist_id), 1), "Yes.");
    let mut q3 = answered(seed_question(&repository, "q-3", Some(&checklist_id), 2), "Yes.");
    q3.requires_document = true;

    let document = seed_document(&repository, "doc-1", Some(&q3.id));

    let readiness = CompletionEvaluator::evaluate(&[q1, q2, q3], &[document]);
    assert!(readiness.is_complete);
    assert!(readiness.incomplete_questions.is_empty());
    assert_eq!(readiness.questions_with_docs, 1);
}

#[test]
fn answered_status_without_text_counts_as_missing_answer() {
    let repository = InMemoryQuestionnaireRepository::default();
    let mut question = seed_question(&repository, "q-1", None, 0);
    question.status = QuestionStatus::Completed;
    question.answer = Some("   ".to_string());

    let readiness = CompletionEvaluator::evaluate(&[question], &[]);
    assert!(!readiness.is_complete);
    assert_eq!(readiness.completed_questions, 0);
    assert_eq!(
        readiness.incomplete_questions[0].missing,
        vec![MissingRequirement::Answer]
    );
}

#[test]
fn pending_question_is_missing_its_answer() {
    let repository = InMemoryQuestionnaireRepository::default();
    let question = seed_question(&repository, "q-1", None, 0);

    let readiness = CompletionEvaluator::evaluate(&[question], &[]);
    assert!(!readiness.is_complete);
    assert_eq!(
        readiness.incomplete_questions[0].missing,
        vec![MissingRequirement::Answer]
    );
}

#[test]
fn question_can_miss_both_answer_and_document() {
    let repository = InMemoryQuestionnaireRepository::default();
    let mut question = seed_question(&repository, "q-1", None, 0);
    question.requires_document = true;

    let readiness = CompletionEvaluator::evaluate(&[question], &[]);
    assert_eq!(
        readiness.incomplete_questions[0].missing,
        vec![
            MissingRequirement::Answer,
            MissingRequirement::SupportingDocument
        ]
    );
    assert_eq!(readiness.missing_answer_count(), 1);
    assert_eq!(readiness.missing_document_count(), 1);
}

#[test]
fn done_and_completed_are_interchangeable_for_readiness() {
    let repository = InMemoryQuestionnaireRepository::default();
    let completed = answered(seed_question(&repository, "q-1", None, 0), "Yes.");
    let mut done = answered(seed_question(&repository, "q-2", None, 1), "Yes.");
    done.status = QuestionStatus::Done;
    done.is_done = true;

    let readiness = CompletionEvaluator::evaluate(&[completed, done], &[]);
    assert!(readiness.is_complete);
    assert_eq!(readiness.completed_questions, 2);
}
