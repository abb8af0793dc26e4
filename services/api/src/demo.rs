use std::sync::Arc;

use clap::Args;

use comply_ai::error::AppError;
use comply_ai::workflows::questionnaire::{
    BatchScope, ChecklistGroup, ChecklistUpload, DocumentUpload, FollowUpKind, FollowUpRequest,
    InMemoryQuestionnaireRepository, PollPolicy, QuestionnaireError, QuestionnaireService,
    RequestContext, VendorId,
};

use crate::infra::{demo_clients, guess_content_type};

const SAMPLE_QUESTIONS: [&str; 6] = [
    "Do you encrypt customer data at rest?",
    "Do you run annual third-party penetration tests?",
    "Is production access reviewed quarterly?",
    "Do you maintain an incident response plan?",
    "Are employee workstations centrally managed?",
    "Is multi-factor authentication enforced for administrators?",
];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Number of questions the demo checklist contains (1-6)
    #[arg(long, default_value_t = 3)]
    pub(crate) questions: usize,
    /// Stop after the readiness report without submitting to the portal
    #[arg(long)]
    pub(crate) skip_submission: bool,
    /// Skip the follow-up amendment after the initial submission
    #[arg(long)]
    pub(crate) skip_follow_up: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    demo_flow(args).await.map_err(AppError::from)
}

async fn demo_flow(args: DemoArgs) -> Result<(), QuestionnaireError> {
    let question_count = args.questions.clamp(1, SAMPLE_QUESTIONS.len());
    let vendor = VendorId("vendor-demo".to_string());

    let repository = Arc::new(InMemoryQuestionnaireRepository::default());
    let (portal, clients) = demo_clients();
    let service = QuestionnaireService::new(repository, clients, PollPolicy::default());

    println!("== Questionnaire workflow demo ==");

    let body = SAMPLE_QUESTIONS[..question_count].join("\n");
    let checklist = service
        .store()
        .create_from_upload(
            ChecklistUpload {
                filename: "security-review.txt".to_string(),
                content_type: guess_content_type("security-review.txt"),
                bytes: body.into_bytes(),
            },
            vendor.clone(),
        )
        .await?;
    println!(
        "uploaded {} -> {} ({} questions)",
        checklist.source_filename,
        checklist.extraction_status.label(),
        question_count
    );

    let outcome = service
        .generation()
        .generate_batch(
            BatchScope::Checklist(checklist.id.clone()),
            RequestContext {
                checklist_name: Some(checklist.source_filename.clone()),
                evidence_files: Vec::new(),
            },
        )
        .await?;
    println!(
        "batch generation: {}/{} answered in {} poll(s)",
        outcome.completed, outcome.total, outcome.poll_attempts
    );

    let questions = service.store().questions_for(&checklist.id)?;
    let evidence_question = service.store().set_document_requirement(
        &questions[0].id,
        true,
        Some("Attach the current encryption policy".to_string()),
    )?;

    let readiness = service.readiness(&checklist.id)?;
    println!(
        "readiness before evidence: complete={} ({} answered, {} awaiting documents)",
        readiness.is_complete,
        readiness.completed_questions,
        readiness.missing_document_count()
    );

    service
        .evidence()
        .upload(DocumentUpload {
            vendor: vendor.clone(),
            question_id: Some(evidence_question.id.clone()),
            filename: "encryption-policy.pdf".to_string(),
            content_type: guess_content_type("encryption-policy.pdf"),
            bytes: b"demo encryption policy".to_vec(),
        })
        .await?;

    let readiness = service.readiness(&checklist.id)?;
    println!(
        "readiness after evidence: complete={} ({}/{} questions)",
        readiness.is_complete, readiness.completed_questions, readiness.total_questions
    );

    // Human sign-off on the evidence-backed answer.
    let confirmed = service.confirm_done(&evidence_question.id)?;
    println!(
        "question '{}' confirmed by reviewer (status {})",
        confirmed.text,
        confirmed.status.label()
    );

    if args.skip_submission {
        println!("submission skipped");
        return Ok(());
    }

    let submissions = service.submissions();
    let mut draft =
        submissions.prepare_checklist(ChecklistGroup::Checklist(checklist.id.clone()))?;
    submissions.resolve_decision(&mut draft, FollowUpRequest::default())?;
    let initial = submissions.submit(draft).await?;
    println!(
        "initial submission {} accepted as {}",
        initial.record.id.0, initial.portal_id
    );

    if !args.skip_follow_up {
        let mut amendment =
            submissions.prepare_checklist(ChecklistGroup::Checklist(checklist.id.clone()))?;
        submissions.resolve_decision(
            &mut amendment,
            FollowUpRequest {
                is_follow_up: true,
                kind: Some(FollowUpKind::Clarification),
                reason: Some("Reviewer asked for key rotation cadence".to_string()),
                parent_submission_id: Some(initial.record.id.clone()),
            },
        )?;
        let amendment = submissions.submit(amendment).await?;
        println!(
            "follow-up {} ({}) chained to {}",
            amendment.record.id.0,
            amendment.record.follow_up_kind.label(),
            initial.record.id.0
        );
    }

    println!("portal accepted {} submission(s)", portal.accepted().len());
    Ok(())
}
