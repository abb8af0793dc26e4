use crate::workflows::questionnaire::domain::{Question, QuestionId, QuestionStatus};
use crate::workflows::questionnaire::lifecycle::{LifecycleError, QuestionLifecycle};

fn question(status: QuestionStatus, answer: Option<&str>) -> Question {
    Question {
        id: QuestionId("q-test".to_string()),
        checklist_id: None,
        text: "Do you encrypt data at rest?".to_string(),
        position: 0,
        status,
        answer: answer.map(str::to_string),
        confidence: answer.map(|_| 0.8),
        requires_document: false,
        document_description: None,
        is_done: status == QuestionStatus::Done,
    }
}

#[test]
fn begin_generation_reserves_pending_question() {
    let mut q = question(QuestionStatus::Pending, None);
    QuestionLifecycle::begin_generation(&mut q).expect("dispatch allowed");
    assert_eq!(q.status, QuestionStatus::InProgress);
}

#[test]
fn begin_generation_rejects_second_dispatch() {
    let mut q = question(QuestionStatus::InProgress, None);
    match QuestionLifecycle::begin_generation(&mut q) {
        Err(LifecycleError::DispatchWhileInProgress { question_id }) => {
            assert_eq!(question_id.0, "q-test");
        }
        other => panic!("expected dispatch rejection, got {other:?}"),
    }
}

#[test]
fn begin_generation_allows_retry_from_needs_support() {
    let mut q = question(QuestionStatus::NeedsSupport, None);
    QuestionLifecycle::begin_generation(&mut q).expect("retry allowed");
    assert_eq!(q.status, QuestionStatus::InProgress);
}

#[test]
fn generated_answer_completes_question() {
    let mut q = question(QuestionStatus::InProgress, None);
    QuestionLifecycle::apply_generated_answer(&mut q, "We use AES-256.", 0.92)
        .expect("answer stores");
    assert_eq!(q.status, QuestionStatus::Completed);
    assert_eq!(q.answer.as_deref(), Some("We use AES-256."));
    assert_eq!(q.confidence, Some(0.92));
    assert!(!q.is_done);
}

#[test]
fn generated_answer_confidence_is_clamped() {
    let mut q = question(QuestionStatus::InProgress, None);
    QuestionLifecycle::apply_generated_answer(&mut q, "Yes.", 3.5).expect("answer stores");
    assert_eq!(q.confidence, Some(1.0));
}

#[test]
fn empty_generated_answer_is_rejected() {
    let mut q = question(QuestionStatus::InProgress, None);
    match QuestionLifecycle::apply_generated_answer(&mut q, "   ", 0.5) {
        Err(LifecycleError::EmptyAnswer { .. }) => {}
        other => panic!("expected empty answer rejection, got {other:?}"),
    }
    assert_eq!(q.status, QuestionStatus::InProgress);
    assert!(q.answer.is_none());
}

#[test]
fn needs_support_marks_generation_failure() {
    let mut q = question(QuestionStatus::InProgress, None);
    QuestionLifecycle::mark_needs_support(&mut q).expect("failure records");
    assert_eq!(q.status, QuestionStatus::NeedsSupport);
}

#[test]
fn confirm_requires_completed_answer() {
    let mut q = question(QuestionStatus::Completed, Some("Answer."));
    QuestionLifecycle::confirm_done(&mut q).expect("confirmation allowed");
    assert_eq!(q.status, QuestionStatus::Done);
    assert!(q.is_done);

    let mut pending = question(QuestionStatus::Pending, None);
    assert!(matches!(
        QuestionLifecycle::confirm_done(&mut pending),
        Err(LifecycleError::InvalidTransition { .. })
    ));
}

#[test]
fn answered_states_always_carry_answer_text() {
    // The invariant the state machine exists for: completed/done implies a
    // non-empty answer, through every path that can reach those states.
    let mut generated = question(QuestionStatus::InProgress, None);
    QuestionLifecycle::apply_generated_answer(&mut generated, "Yes.", 0.7).expect("stores");
    assert!(generated.status.is_answer_final() && generated.has_answer());

    let mut saved = question(QuestionStatus::Pending, None);
    QuestionLifecycle::save_answer(&mut saved, "Manual answer.").expect("saves");
    assert!(saved.status.is_answer_final() && saved.has_answer());

    let mut confirmed = question(QuestionStatus::Completed, Some("Answer."));
    QuestionLifecycle::confirm_done(&mut confirmed).expect("confirms");
    assert!(confirmed.status.is_answer_final() && confirmed.has_answer());
}

#[test]
fn edit_clears_human_confirmation() {
    let mut q = question(QuestionStatus::Done, Some("Signed off."));
    QuestionLifecycle::toggle_edit(&mut q).expect("edit opens");
    assert_eq!(q.status, QuestionStatus::InProgress);
    assert!(!q.is_done);
}

#[test]
fn edit_is_reentrant_and_exits_without_saving() {
    let mut q = question(QuestionStatus::Completed, Some("Original answer."));
    QuestionLifecycle::toggle_edit(&mut q).expect("edit opens");
    QuestionLifecycle::toggle_edit(&mut q).expect("edit exits");
    assert_eq!(q.status, QuestionStatus::Completed);
    assert_eq!(q.answer.as_deref(), Some("Original answer."));
}

#[test]
fn edit_exit_without_answer_falls_back_to_pending() {
    let mut q = question(QuestionStatus::Completed, Some("Original answer."));
    QuestionLifecycle::toggle_edit(&mut q).expect("edit opens");
    q.answer = None;
    QuestionLifecycle::toggle_edit(&mut q).expect("edit exits");
    assert_eq!(q.status, QuestionStatus::Pending);
}

#[test]
fn save_then_confirm_reaches_done_after_edit() {
    let mut q = question(QuestionStatus::Done, Some("Old answer."));
    QuestionLifecycle::toggle_edit(&mut q).expect("edit opens");
    QuestionLifecycle::save_answer(&mut q, "Revised answer.").expect("saves");
    assert_eq!(q.status, QuestionStatus::Completed);
    assert!(!q.is_done);
    QuestionLifecycle::confirm_done(&mut q).expect("confirms");
    assert_eq!(q.status, QuestionStatus::Done);
    assert!(q.is_done);
}

#[test]
fn save_is_rejected_on_signed_off_question() {
    let mut q = question(QuestionStatus::Done, Some("Signed off."));
    assert!(matches!(
        QuestionLifecycle::save_answer(&mut q, "Overwrite."),
        Err(LifecycleError::InvalidTransition { .. })
    ));
}
