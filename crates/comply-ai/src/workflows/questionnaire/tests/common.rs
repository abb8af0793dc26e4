use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::workflows::questionnaire::clients::{
    AnswerRequest, AnswerService, BatchAnswerRequest, BatchAnswerUpdate, BatchJobHandle,
    BlobMetadata, ChecklistExtractor, ChecklistUpload, ClientError, GeneratedAnswer,
    PortalReceipt, ReviewPortal, StoredBlob,
};
use crate::workflows::questionnaire::domain::{
    Checklist, ChecklistId, ExtractionStatus, Question, QuestionId, QuestionStatus,
    SubmissionRecord, SupportingDocument, VendorId,
};
use crate::workflows::questionnaire::repository::{
    InMemoryQuestionnaireRepository, QuestionnaireRepository,
};
use crate::workflows::questionnaire::service::{ExternalClients, QuestionnaireService};
use crate::workflows::questionnaire::EvidenceStorage;
use crate::workflows::questionnaire::PollPolicy;

pub(super) fn vendor() -> VendorId {
    VendorId("vendor-acme".to_string())
}

pub(super) fn sample_upload() -> ChecklistUpload {
    ChecklistUpload {
        filename: "soc2-questionnaire.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"questionnaire body".to_vec(),
    }
}

/// Insert a checklist directly, bypassing extraction, for unit-level setups.
pub(super) fn seed_checklist(
    repository: &InMemoryQuestionnaireRepository,
    id: &str,
    status: ExtractionStatus,
) -> Checklist {
    let checklist = Checklist {
        id: ChecklistId(id.to_string()),
        vendor: vendor(),
        source_filename: "soc2-questionnaire.pdf".to_string(),
        extraction_status: status,
        extraction_error: None,
        sent_to_trust_portal: false,
        submitted_at: None,
    };
    repository
        .insert_checklist(checklist)
        .expect("checklist seeds")
}

pub(super) fn seed_question(
    repository: &InMemoryQuestionnaireRepository,
    id: &str,
    checklist_id: Option<&ChecklistId>,
    position: u32,
) -> Question {
    let question = Question {
        id: QuestionId(id.to_string()),
        checklist_id: checklist_id.cloned(),
        text: format!("Compliance question {position}"),
        position,
        status: QuestionStatus::Pending,
        answer: None,
        confidence: None,
        requires_document: false,
        document_description: None,
        is_done: false,
    };
    repository.insert_question(question).expect("question seeds")
}

pub(super) fn answered(mut question: Question, answer: &str) -> Question {
    question.answer = Some(answer.to_string());
    question.confidence = Some(0.9);
    question.status = QuestionStatus::Completed;
    question
}

pub(super) fn seed_document(
    repository: &InMemoryQuestionnaireRepository,
    id: &str,
    question_id: Option<&QuestionId>,
) -> SupportingDocument {
    let document = SupportingDocument {
        id: crate::workflows::questionnaire::DocumentId(id.to_string()),
        question_id: question_id.cloned(),
        vendor: vendor(),
        filename: format!("{id}.pdf"),
        content_type: "application/pdf".to_string(),
        byte_size: 64,
        storage_url: format!("mem://{id}.pdf"),
        storage_key: id.to_string(),
    };
    repository.insert_document(document).expect("document seeds")
}

/// Extractor returning a fixed question list.
pub(super) struct StaticExtractor {
    pub(super) questions: Vec<String>,
}

#[async_trait]
impl ChecklistExtractor for StaticExtractor {
    async fn extract(&self, _upload: &ChecklistUpload) -> Result<Vec<String>, ClientError> {
        Ok(self.questions.clone())
    }
}

/// Extractor that always fails its round-trip.
pub(super) struct FailingExtractor;

#[async_trait]
impl ChecklistExtractor for FailingExtractor {
    async fn extract(&self, _upload: &ChecklistUpload) -> Result<Vec<String>, ClientError> {
        Err(ClientError::Network {
            operation: "extract",
            message: "extractor unreachable".to_string(),
        })
    }
}

type ScriptedSingle = (Duration, Result<GeneratedAnswer, String>);

/// Answer service driven by scripted responses.
///
/// Single-question responses are consumed in dispatch order, each after its
/// configured delay, so supersession can be exercised under paused time.
/// Batch polls are consumed one vec per attempt; once the script runs dry
/// every further poll reports nothing new.
#[derive(Default)]
pub(super) struct ScriptedAnswerService {
    single: Mutex<VecDeque<ScriptedSingle>>,
    pub(super) single_calls: AtomicUsize,
    polls: Mutex<VecDeque<Vec<BatchAnswerUpdate>>>,
    pub(super) poll_calls: AtomicUsize,
    pub(super) batch_requests: Mutex<Vec<BatchAnswerRequest>>,
}

impl ScriptedAnswerService {
    pub(super) fn with_single(responses: Vec<ScriptedSingle>) -> Self {
        Self {
            single: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub(super) fn with_polls(polls: Vec<Vec<BatchAnswerUpdate>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AnswerService for ScriptedAnswerService {
    async fn generate(&self, _request: AnswerRequest) -> Result<GeneratedAnswer, ClientError> {
        self.single_calls.fetch_add(1, Ordering::Relaxed);
        let scripted = self.single.lock().expect("script mutex").pop_front();
        match scripted {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result.map_err(|message| ClientError::Network {
                    operation: "generate",
                    message,
                })
            }
            None => Err(ClientError::Network {
                operation: "generate",
                message: "no scripted response".to_string(),
            }),
        }
    }

    async fn generate_batch(
        &self,
        request: BatchAnswerRequest,
    ) -> Result<BatchJobHandle, ClientError> {
        self.batch_requests
            .lock()
            .expect("batch mutex")
            .push(request);
        Ok(BatchJobHandle("job-0001".to_string()))
    }

    async fn poll_batch(
        &self,
        _handle: &BatchJobHandle,
    ) -> Result<Vec<BatchAnswerUpdate>, ClientError> {
        self.poll_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .polls
            .lock()
            .expect("poll mutex")
            .pop_front()
            .unwrap_or_default())
    }
}

/// Blob store remembering uploads and deletions.
#[derive(Default)]
pub(super) struct MemoryStorage {
    pub(super) uploaded: Mutex<Vec<String>>,
    pub(super) deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl EvidenceStorage for MemoryStorage {
    async fn upload(
        &self,
        _bytes: &[u8],
        metadata: &BlobMetadata,
    ) -> Result<StoredBlob, ClientError> {
        self.uploaded
            .lock()
            .expect("upload mutex")
            .push(metadata.filename.clone());
        Ok(StoredBlob {
            url: format!("mem://{}", metadata.filename),
            key: metadata.filename.clone(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), ClientError> {
        self.deleted.lock().expect("delete mutex").push(key.to_string());
        Ok(())
    }
}

/// Portal recording every accepted submission.
#[derive(Default)]
pub(super) struct RecordingPortal {
    pub(super) submissions: Mutex<Vec<SubmissionRecord>>,
}

impl RecordingPortal {
    pub(super) fn submitted(&self) -> Vec<SubmissionRecord> {
        self.submissions.lock().expect("portal mutex").clone()
    }
}

#[async_trait]
impl ReviewPortal for RecordingPortal {
    async fn create_submission(
        &self,
        record: &SubmissionRecord,
    ) -> Result<PortalReceipt, ClientError> {
        let mut submissions = self.submissions.lock().expect("portal mutex");
        submissions.push(record.clone());
        Ok(PortalReceipt {
            portal_id: format!("portal-{:04}", submissions.len()),
        })
    }
}

pub(super) struct TestHarness {
    pub(super) repository: Arc<InMemoryQuestionnaireRepository>,
    pub(super) answers: Arc<ScriptedAnswerService>,
    pub(super) storage: Arc<MemoryStorage>,
    pub(super) portal: Arc<RecordingPortal>,
    pub(super) service: QuestionnaireService<InMemoryQuestionnaireRepository>,
}

/// Wire a full service over in-memory infrastructure.
pub(super) fn harness(extractor: Arc<dyn ChecklistExtractor>, answers: ScriptedAnswerService) -> TestHarness {
    harness_with_policy(extractor, answers, PollPolicy::default())
}

pub(super) fn harness_with_policy(
    extractor: Arc<dyn ChecklistExtractor>,
    answers: ScriptedAnswerService,
    policy: PollPolicy,
) -> TestHarness {
    let repository = Arc::new(InMemoryQuestionnaireRepository::default());
    let answers = Arc::new(answers);
    let storage = Arc::new(MemoryStorage::default());
    let portal = Arc::new(RecordingPortal::default());
    let clients = ExternalClients {
        extractor,
        answers: answers.clone(),
        storage: storage.clone(),
        portal: portal.clone(),
    };
    let service = QuestionnaireService::new(repository.clone(), clients, policy);
    TestHarness {
        repository,
        answers,
        storage,
        portal,
        service,
    }
}
