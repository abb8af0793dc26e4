use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::clients::ChecklistUpload;
use super::domain::{ChecklistId, DocumentId, QuestionId, VendorId};
use super::evidence::{DocumentUpload, EvidenceError};
use super::generation::{BatchScope, GenerationError};
use super::repository::{QuestionnaireRepository, RepositoryError};
use super::service::{QuestionnaireError, QuestionnaireService};
use super::store::StoreError;
use super::submission::{ChecklistGroup, FollowUpRequest, SubmissionError};

/// Router builder exposing HTTP endpoints for the questionnaire workflow.
pub fn questionnaire_router<R>(service: Arc<QuestionnaireService<R>>) -> Router
where
    R: QuestionnaireRepository + 'static,
{
    Router::new()
        .route("/api/v1/checklists", post(upload_checklist_handler::<R>))
        .route(
            "/api/v1/checklists/:checklist_id",
            delete(delete_checklist_handler::<R>),
        )
        .route(
            "/api/v1/checklists/:checklist_id/retry-extraction",
            post(retry_extraction_handler::<R>),
        )
        .route(
            "/api/v1/checklists/:checklist_id/generate",
            post(generate_batch_handler::<R>),
        )
        .route(
            "/api/v1/checklists/:checklist_id/readiness",
            get(readiness_handler::<R>),
        )
        .route("/api/v1/questions", post(add_question_handler::<R>))
        .route(
            "/api/v1/questions/:question_id/generate",
            post(generate_handler::<R>),
        )
        .route(
            "/api/v1/questions/:question_id/edit",
            post(toggle_edit_handler::<R>),
        )
        .route(
            "/api/v1/questions/:question_id/answer",
            post(save_answer_handler::<R>),
        )
        .route(
            "/api/v1/questions/:question_id/confirm",
            post(confirm_handler::<R>),
        )
        .route(
            "/api/v1/questions/:question_id/documents",
            post(upload_document_handler::<R>),
        )
        .route("/api/v1/documents", post(upload_general_document_handler::<R>))
        .route(
            "/api/v1/documents/:document_id",
            delete(delete_document_handler::<R>),
        )
        .route("/api/v1/submissions", post(submit_handler::<R>))
        .with_state(service)
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict => StatusCode::CONFLICT,
        RepositoryError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for QuestionnaireError {
    fn into_response(self) -> Response {
        let status = match &self {
            QuestionnaireError::Store(err) => match err {
                StoreError::EmptyQuestionText | StoreError::NotRetryable(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                StoreError::Repository(err) => repository_status(err),
                StoreError::Client(_) => StatusCode::BAD_GATEWAY,
            },
            QuestionnaireError::Generation(err) => match err {
                GenerationError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
                GenerationError::ChecklistNotReady { .. } | GenerationError::Lifecycle(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                GenerationError::Failed { .. }
                | GenerationError::BatchDispatch { .. }
                | GenerationError::BatchPoll { .. } => StatusCode::BAD_GATEWAY,
                GenerationError::Repository(err) => repository_status(err),
            },
            QuestionnaireError::Evidence(err) => match err {
                EvidenceError::UnsupportedContentType(_) | EvidenceError::EmptyDocument => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                EvidenceError::Repository(err) => repository_status(err),
                EvidenceError::Client(_) => StatusCode::BAD_GATEWAY,
            },
            QuestionnaireError::Submission(err) => match err {
                SubmissionError::Portal { .. } => StatusCode::BAD_GATEWAY,
                SubmissionError::Snapshot(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SubmissionError::Repository(err) => repository_status(err),
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            QuestionnaireError::Lifecycle(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QuestionnaireError::Repository(err) => repository_status(err),
        };

        // Blocked checklist submissions carry their structured counts so the
        // caller can show what is missing instead of a bare refusal.
        let body = match &self {
            QuestionnaireError::Submission(SubmissionError::IncompleteChecklist {
                readiness,
                ..
            }) => json!({ "error": self.to_string(), "readiness": readiness }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadChecklistRequest {
    pub(crate) vendor: String,
    pub(crate) filename: String,
    #[serde(default)]
    pub(crate) content_type: Option<String>,
    pub(crate) content: String,
}

impl UploadChecklistRequest {
    fn into_parts(self) -> (ChecklistUpload, VendorId) {
        let upload = ChecklistUpload {
            filename: self.filename,
            content_type: self
                .content_type
                .unwrap_or_else(|| "text/plain".to_string()),
            bytes: self.content.into_bytes(),
        };
        (upload, VendorId(self.vendor))
    }
}

pub(crate) async fn upload_checklist_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Json(payload): Json<UploadChecklistRequest>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let (upload, vendor) = payload.into_parts();
    let checklist = service.store().create_from_upload(upload, vendor).await?;
    let questions = service.store().questions_for(&checklist.id)?;
    let body = json!({ "checklist": checklist, "questions": questions });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub(crate) async fn retry_extraction_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(checklist_id): Path<String>,
    Json(payload): Json<UploadChecklistRequest>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let (upload, _) = payload.into_parts();
    let checklist = service
        .store()
        .retry_extraction(&ChecklistId(checklist_id), upload)
        .await?;
    let questions = service.store().questions_for(&checklist.id)?;
    let body = json!({ "checklist": checklist, "questions": questions });
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub(crate) async fn delete_checklist_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(checklist_id): Path<String>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let outcome = service
        .store()
        .delete_checklist(&ChecklistId(checklist_id))
        .await?;
    let body = json!({
        "checklist_id": outcome.checklist.id,
        "questions_removed": outcome.questions_removed,
        "documents_removed": outcome.removed_documents.len(),
    });
    Ok((StatusCode::OK, Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddQuestionRequest {
    #[serde(default)]
    pub(crate) checklist_id: Option<String>,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) requires_document: bool,
    #[serde(default)]
    pub(crate) document_description: Option<String>,
}

pub(crate) async fn add_question_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Json(payload): Json<AddQuestionRequest>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let checklist_id = payload.checklist_id.map(ChecklistId);
    let question = service.store().add_manual_question(
        checklist_id.as_ref(),
        &payload.text,
        payload.requires_document,
        payload.document_description,
    )?;
    Ok((StatusCode::CREATED, Json(question)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateRequest {
    #[serde(default)]
    pub(crate) regenerate: bool,
}

pub(crate) async fn generate_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(question_id): Path<String>,
    payload: Option<Json<GenerateRequest>>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let question_id = QuestionId(question_id);
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let context = service.context_for(&question_id)?;
    let question = if request.regenerate {
        service
            .generation()
            .regenerate_answer(&question_id, context)
            .await?
    } else {
        service
            .generation()
            .generate_answer(&question_id, context)
            .await?
    };
    Ok((StatusCode::OK, Json(question.status_view())).into_response())
}

pub(crate) async fn generate_batch_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(checklist_id): Path<String>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let checklist_id = ChecklistId(checklist_id);
    let checklist = service.store().checklist(&checklist_id)?;
    let context = super::clients::RequestContext {
        checklist_name: Some(checklist.source_filename),
        evidence_files: Vec::new(),
    };
    let outcome = service
        .generation()
        .generate_batch(BatchScope::Checklist(checklist_id), context)
        .await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn toggle_edit_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(question_id): Path<String>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let question = service.toggle_edit(&QuestionId(question_id))?;
    Ok((StatusCode::OK, Json(question.status_view())).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveAnswerRequest {
    pub(crate) answer: String,
}

pub(crate) async fn save_answer_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(question_id): Path<String>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let question = service.save_answer(&QuestionId(question_id), &payload.answer)?;
    Ok((StatusCode::OK, Json(question.status_view())).into_response())
}

pub(crate) async fn confirm_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(question_id): Path<String>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let question = service.confirm_done(&QuestionId(question_id))?;
    Ok((StatusCode::OK, Json(question.status_view())).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadDocumentRequest {
    pub(crate) vendor: String,
    pub(crate) filename: String,
    pub(crate) content_type: String,
    pub(crate) content: String,
}

impl UploadDocumentRequest {
    fn into_upload(self, question_id: Option<QuestionId>) -> DocumentUpload {
        DocumentUpload {
            vendor: VendorId(self.vendor),
            question_id,
            filename: self.filename,
            content_type: self.content_type,
            bytes: self.content.into_bytes(),
        }
    }
}

pub(crate) async fn upload_document_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(question_id): Path<String>,
    Json(payload): Json<UploadDocumentRequest>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let upload = payload.into_upload(Some(QuestionId(question_id)));
    let document = service.evidence().upload(upload).await?;
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

pub(crate) async fn upload_general_document_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Json(payload): Json<UploadDocumentRequest>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let upload = payload.into_upload(None);
    let document = service.evidence().upload(upload).await?;
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

pub(crate) async fn delete_document_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(document_id): Path<String>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    service
        .evidence()
        .remove(&DocumentId(document_id))
        .await?;
    Ok((StatusCode::OK, Json(json!({ "status": "deleted" }))).into_response())
}

pub(crate) async fn readiness_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Path(checklist_id): Path<String>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let readiness = service.readiness(&ChecklistId(checklist_id))?;
    Ok((StatusCode::OK, Json(readiness)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum SubmitSubject {
    Checklist { id: String },
    ManualBucket,
    Question { id: String },
    Document { id: String },
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequest {
    pub(crate) subject: SubmitSubject,
    #[serde(default)]
    pub(crate) vendor: Option<String>,
    pub(crate) follow_up: FollowUpRequest,
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<QuestionnaireService<R>>>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Response, QuestionnaireError>
where
    R: QuestionnaireRepository + 'static,
{
    let submissions = service.submissions();
    let mut draft = match payload.subject {
        SubmitSubject::Checklist { id } => {
            submissions.prepare_checklist(ChecklistGroup::Checklist(ChecklistId(id)))?
        }
        SubmitSubject::ManualBucket => {
            submissions.prepare_checklist(ChecklistGroup::ManualBucket)?
        }
        SubmitSubject::Question { id } => {
            submissions.prepare_question(&QuestionId(id), payload.vendor.map(VendorId))?
        }
        SubmitSubject::Document { id } => submissions.prepare_document(&DocumentId(id))?,
    };
    submissions.resolve_decision(&mut draft, payload.follow_up)?;
    let receipt = submissions.submit(draft).await?;
    let body = json!({
        "submission": receipt.record,
        "portal_id": receipt.portal_id,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}
