//! Integration specifications for portal submission and follow-up lineage.

mod common {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use comply_ai::workflows::questionnaire::{
        AnswerRequest, AnswerService, BatchAnswerRequest, BatchAnswerUpdate, BatchJobHandle,
        BlobMetadata, ChecklistExtractor, ChecklistUpload, ClientError, EvidenceStorage,
        ExternalClients, GeneratedAnswer, InMemoryQuestionnaireRepository, PollPolicy,
        PortalReceipt, QuestionnaireService, ReviewPortal, StoredBlob, SubmissionRecord, VendorId,
    };

    pub struct TwoQuestionExtractor;

    #[async_trait]
    impl ChecklistExtractor for TwoQuestionExtractor {
        async fn extract(&self, _upload: &ChecklistUpload) -> Result<Vec<String>, ClientError> {
            Ok(vec![
                "Is production access logged?".to_string(),
                "Are backups tested?".to_string(),
            ])
        }
    }

    pub struct ImmediateAnswers;

    #[async_trait]
    impl AnswerService for ImmediateAnswers {
        async fn generate(&self, request: AnswerRequest) -> Result<GeneratedAnswer, ClientError> {
            Ok(GeneratedAnswer {
                answer: format!("Yes: {}", request.question_text),
                confidence: 0.9,
            })
        }

        async fn generate_batch(
            &self,
            _request: BatchAnswerRequest,
        ) -> Result<BatchJobHandle, ClientError> {
            Ok(BatchJobHandle("job-sub-1".to_string()))
        }

        async fn poll_batch(
            &self,
            _handle: &BatchJobHandle,
        ) -> Result<Vec<BatchAnswerUpdate>, ClientError> {
            Ok(Vec::new())
        }
    }

    pub struct MemoryBlobs;

    #[async_trait]
    impl EvidenceStorage for MemoryBlobs {
        async fn upload(
            &self,
            _bytes: &[u8],
            metadata: &BlobMetadata,
        ) -> Result<StoredBlob, ClientError> {
            Ok(StoredBlob {
                url: format!("mem://{}", metadata.filename),
                key: metadata.filename.clone(),
            })
        }

        async fn delete(&self, _key: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct CountingPortal {
        pub accepted: Mutex<Vec<SubmissionRecord>>,
    }

    impl CountingPortal {
        pub fn accepted(&self) -> Vec<SubmissionRecord> {
            self.accepted.lock().expect("portal mutex").clone()
        }
    }

    #[async_trait]
    impl ReviewPortal for CountingPortal {
        async fn create_submission(
            &self,
            record: &SubmissionRecord,
        ) -> Result<PortalReceipt, ClientError> {
            let mut accepted = self.accepted.lock().expect("portal mutex");
            accepted.push(record.clone());
            Ok(PortalReceipt {
                portal_id: format!("tp-{:03}", accepted.len()),
            })
        }
    }

    pub fn vendor() -> VendorId {
        VendorId("vendor-integration".to_string())
    }

    pub fn upload() -> ChecklistUpload {
        ChecklistUpload {
            filename: "security-review.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"uploaded checklist".to_vec(),
        }
    }

    pub fn build_service() -> (
        Arc<CountingPortal>,
        QuestionnaireService<InMemoryQuestionnaireRepository>,
    ) {
        let repository = Arc::new(InMemoryQuestionnaireRepository::default());
        let portal = Arc::new(CountingPortal::default());
        let clients = ExternalClients {
            extractor: Arc::new(TwoQuestionExtractor),
            answers: Arc::new(ImmediateAnswers),
            storage: Arc::new(MemoryBlobs),
            portal: portal.clone(),
        };
        let service = QuestionnaireService::new(repository, clients, PollPolicy::default());
        (portal, service)
    }
}

use common::*;
use comply_ai::workflows::questionnaire::{
    ChecklistGroup, FollowUpKind, FollowUpRequest, SubmissionError, SubmissionSubject,
};

async fn answer_everything(
    service: &comply_ai::workflows::questionnaire::QuestionnaireService<
        comply_ai::workflows::questionnaire::InMemoryQuestionnaireRepository,
    >,
    checklist_id: &comply_ai::workflows::questionnaire::ChecklistId,
) {
    let questions = service
        .store()
        .questions_for(checklist_id)
        .expect("questions read");
    for question in questions {
        let context = service.context_for(&question.id).expect("context builds");
        service
            .generation()
            .generate_answer(&question.id, context)
            .await
            .expect("generation succeeds");
    }
}

#[tokio::test]
async fn initial_then_follow_up_preserves_lineage() {
    let (portal, service) = build_service();

    let checklist = service
        .store()
        .create_from_upload(upload(), vendor())
        .await
        .expect("upload succeeds");
    answer_everything(&service, &checklist.id).await;

    let mut draft = service
        .submissions()
        .prepare_checklist(ChecklistGroup::Checklist(checklist.id.clone()))
        .expect("draft opens");
    service
        .submissions()
        .resolve_decision(&mut draft, FollowUpRequest::default())
        .expect("decision resolves");
    let initial = service
        .submissions()
        .submit(draft)
        .await
        .expect("initial submission succeeds");
    assert_eq!(initial.portal_id, "tp-001");

    let stored = service
        .store()
        .checklist(&checklist.id)
        .expect("checklist reads");
    assert!(stored.sent_to_trust_portal);

    // A later clarification chains to the first record; resubmission is not
    // blocked by the trust-portal flag.
    let mut amendment = service
        .submissions()
        .prepare_checklist(ChecklistGroup::Checklist(checklist.id.clone()))
        .expect("draft opens");
    service
        .submissions()
        .resolve_decision(
            &mut amendment,
            FollowUpRequest {
                is_follow_up: true,
                kind: Some(FollowUpKind::Clarification),
                reason: Some("Reviewer requested backup test cadence".to_string()),
                parent_submission_id: Some(initial.record.id.clone()),
            },
        )
        .expect("decision resolves");
    let amendment = service
        .submissions()
        .submit(amendment)
        .await
        .expect("follow-up succeeds");

    assert!(amendment.record.is_follow_up);
    assert_eq!(
        amendment.record.parent_submission_id.as_ref(),
        Some(&initial.record.id)
    );
    assert_eq!(
        amendment.record.subject,
        SubmissionSubject::Checklist(checklist.id)
    );

    let accepted = portal.accepted();
    assert_eq!(accepted.len(), 2);
    for record in accepted {
        assert_eq!(record.is_follow_up, record.parent_submission_id.is_some());
    }
}

#[tokio::test]
async fn follow_up_with_unknown_parent_never_reaches_the_portal() {
    let (portal, service) = build_service();

    let checklist = service
        .store()
        .create_from_upload(upload(), vendor())
        .await
        .expect("upload succeeds");
    answer_everything(&service, &checklist.id).await;

    let mut draft = service
        .submissions()
        .prepare_checklist(ChecklistGroup::Checklist(checklist.id))
        .expect("draft opens");
    let result = service.submissions().resolve_decision(
        &mut draft,
        FollowUpRequest {
            is_follow_up: true,
            kind: Some(FollowUpKind::Resubmission),
            reason: None,
            parent_submission_id: Some(comply_ai::workflows::questionnaire::SubmissionId(
                "sub-ghost".to_string(),
            )),
        },
    );

    assert!(matches!(result, Err(SubmissionError::UnknownParent(_))));
    assert!(portal.accepted().is_empty());
}

#[tokio::test]
async fn single_question_submission_snapshots_the_answer() {
    let (portal, service) = build_service();

    let checklist = service
        .store()
        .create_from_upload(upload(), vendor())
        .await
        .expect("upload succeeds");
    answer_everything(&service, &checklist.id).await;
    let question = service
        .store()
        .questions_for(&checklist.id)
        .expect("questions read")
        .remove(0);

    let mut draft = service
        .submissions()
        .prepare_question(&question.id, None)
        .expect("draft opens");
    service
        .submissions()
        .resolve_decision(&mut draft, FollowUpRequest::default())
        .expect("decision resolves");
    let receipt = service
        .submissions()
        .submit(draft)
        .await
        .expect("question submits");

    assert_eq!(
        receipt.record.subject,
        SubmissionSubject::Question(question.id)
    );
    assert!(receipt.record.content.contains("Is production access logged?"));
    assert_eq!(portal.accepted().len(), 1);
}
