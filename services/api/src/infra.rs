use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;

use comply_ai::workflows::questionnaire::{
    AnswerRequest, AnswerService, BatchAnswerRequest, BatchAnswerStatus, BatchAnswerUpdate,
    BatchJobHandle, BlobMetadata, ChecklistExtractor, ChecklistUpload, ClientError,
    EvidenceStorage, ExternalClients, GeneratedAnswer, PortalReceipt, ReviewPortal, StoredBlob,
    SubmissionRecord,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Extractor treating every line that ends with a question mark as one
/// extracted question. Stands in for the external document service in the
/// demo and default server wiring.
pub(crate) struct LineExtractor;

#[async_trait]
impl ChecklistExtractor for LineExtractor {
    async fn extract(&self, upload: &ChecklistUpload) -> Result<Vec<String>, ClientError> {
        let text = String::from_utf8(upload.bytes.clone()).map_err(|_| ClientError::Rejected {
            operation: "extract",
            message: format!("{} is not parseable text", upload.filename),
        })?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| line.ends_with('?'))
            .map(str::to_string)
            .collect())
    }
}

/// Answer service producing templated answers; batch jobs complete all
/// questions on the first poll.
#[derive(Default)]
pub(crate) struct TemplateAnswers {
    jobs: Mutex<HashMap<String, Vec<BatchAnswerUpdate>>>,
}

#[async_trait]
impl AnswerService for TemplateAnswers {
    async fn generate(&self, request: AnswerRequest) -> Result<GeneratedAnswer, ClientError> {
        let context = request.context.render();
        let suffix = if context.is_empty() {
            String::new()
        } else {
            format!(" (context: {context})")
        };
        Ok(GeneratedAnswer {
            answer: format!(
                "Our documented controls cover this item: {}{suffix}",
                request.question_text
            ),
            confidence: 0.82,
        })
    }

    async fn generate_batch(
        &self,
        request: BatchAnswerRequest,
    ) -> Result<BatchJobHandle, ClientError> {
        let mut jobs = self.jobs.lock().expect("job mutex poisoned");
        let handle = format!("job-{:04}", jobs.len() + 1);
        let updates = request
            .questions
            .into_iter()
            .map(|question| BatchAnswerUpdate {
                answer: Some(format!(
                    "Our documented controls cover this item: {}",
                    question.question_text
                )),
                confidence: Some(0.82),
                status: BatchAnswerStatus::Completed,
                question_id: question.question_id,
            })
            .collect();
        jobs.insert(handle.clone(), updates);
        Ok(BatchJobHandle(handle))
    }

    async fn poll_batch(
        &self,
        handle: &BatchJobHandle,
    ) -> Result<Vec<BatchAnswerUpdate>, ClientError> {
        let mut jobs = self.jobs.lock().expect("job mutex poisoned");
        Ok(jobs.remove(&handle.0).unwrap_or_default())
    }
}

/// Blob store keeping uploads in memory behind `mem://` URLs.
#[derive(Default)]
pub(crate) struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl EvidenceStorage for MemoryBlobStore {
    async fn upload(
        &self,
        bytes: &[u8],
        metadata: &BlobMetadata,
    ) -> Result<StoredBlob, ClientError> {
        let mut blobs = self.blobs.lock().expect("blob mutex poisoned");
        let key = format!("{:04}-{}", blobs.len() + 1, metadata.filename);
        blobs.insert(key.clone(), bytes.len());
        Ok(StoredBlob {
            url: format!("mem://{key}"),
            key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), ClientError> {
        let mut blobs = self.blobs.lock().expect("blob mutex poisoned");
        match blobs.remove(key) {
            Some(_) => Ok(()),
            None => Err(ClientError::Rejected {
                operation: "delete",
                message: format!("unknown blob key {key}"),
            }),
        }
    }
}

/// Review portal recording accepted submissions and minting portal ids.
#[derive(Default)]
pub(crate) struct RecordingPortal {
    accepted: Mutex<Vec<SubmissionRecord>>,
}

impl RecordingPortal {
    pub(crate) fn accepted(&self) -> Vec<SubmissionRecord> {
        self.accepted.lock().expect("portal mutex poisoned").clone()
    }
}

#[async_trait]
impl ReviewPortal for RecordingPortal {
    async fn create_submission(
        &self,
        record: &SubmissionRecord,
    ) -> Result<PortalReceipt, ClientError> {
        let mut accepted = self.accepted.lock().expect("portal mutex poisoned");
        accepted.push(record.clone());
        Ok(PortalReceipt {
            portal_id: format!("tp-{:04}", accepted.len()),
        })
    }
}

/// Default client wiring for the demo and the standalone server.
pub(crate) fn demo_clients() -> (Arc<RecordingPortal>, ExternalClients) {
    let portal = Arc::new(RecordingPortal::default());
    let clients = ExternalClients {
        extractor: Arc::new(LineExtractor),
        answers: Arc::new(TemplateAnswers::default()),
        storage: Arc::new(MemoryBlobStore::default()),
        portal: portal.clone(),
    };
    (portal, clients)
}

/// Content type for an uploaded filename, falling back to octet-stream.
pub(crate) fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
