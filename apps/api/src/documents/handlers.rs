//! Axum route handlers for the Documents API.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::documents::service::{
    self, parse_document_id, CreateDocumentResponse, Credentials, DocumentResponse,
    MessageResponse, UploadedFile,
};
use crate::errors::AppError;
use crate::placeholders::models::{ConversationTurn, PlaceholderRecord};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentDetailResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub placeholders: Vec<PlaceholderRecord>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub document_id: Uuid,
    pub conversation: Vec<ConversationTurn>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents
///
/// Multipart upload with a `file` part and an optional `api_key` field.
pub async fn handle_create_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateDocumentResponse>), AppError> {
    let mut file: Option<UploadedFile> = None;
    let mut api_key: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                file = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("api_key") => {
                api_key = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read api_key: {e}")))?,
                );
            }
            _ => {}
        }
    }

    let credentials = Credentials {
        request_key: api_key.as_deref(),
        server_key: state.config.anthropic_api_key.as_deref(),
    };
    let created =
        service::create_document(state.store.as_ref(), state.model.as_ref(), file, credentials)
            .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /api/v1/documents/:id/messages
///
/// Conversational fill: the model reads the message and proposes values.
pub async fn handle_send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let credentials = Credentials {
        request_key: request.api_key.as_deref(),
        server_key: state.config.anthropic_api_key.as_deref(),
    };
    let response = service::send_message(
        state.store.as_ref(),
        state.model.as_ref(),
        state.config.conversation_window,
        &id,
        request.message.as_deref(),
        credentials,
    )
    .await?;

    Ok(Json(response))
}

/// PATCH /api/v1/documents/:id/placeholders
///
/// Direct `{name, value}` updates, merged with the same rules as the conversational path.
pub async fn handle_bulk_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<DocumentResponse>, AppError> {
    let response = service::bulk_update(state.store.as_ref(), &id, &body).await?;
    Ok(Json(response))
}

/// GET /api/v1/documents/:id
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetailResponse>, AppError> {
    let document = service::load_document(state.store.as_ref(), parse_document_id(&id)?).await?;
    Ok(Json(DocumentDetailResponse {
        document_id: document.id,
        filename: document.filename,
        placeholders: document.placeholders,
        version: document.version,
        created_at: document.created_at,
        updated_at: document.updated_at,
    }))
}

/// GET /api/v1/documents/:id/conversation
///
/// The full stored log, not just the window shown to the model.
pub async fn handle_get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let document = service::load_document(state.store.as_ref(), parse_document_id(&id)?).await?;
    let conversation = state.store.conversation(document.id).await?;
    Ok(Json(ConversationResponse {
        document_id: document.id,
        conversation,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::documents::docx::testing::docx_with_paragraphs;
    use crate::documents::docx::DOCX_CONTENT_TYPE;
    use crate::documents::store::{DocumentStore, MemoryDocumentStore};
    use crate::llm_client::testing::ScriptedModel;
    use crate::routes::build_router;
    use crate::state::AppState;

    use super::*;

    const BOUNDARY: &str = "placeholder-test-boundary";

    fn app(store: Arc<MemoryDocumentStore>, model: Arc<ScriptedModel>) -> axum::Router {
        let mut config = Config::for_tests();
        config.anthropic_api_key = Some("sk-server".to_string());
        build_router(AppState {
            store,
            model,
            config,
        })
    }

    fn multipart_body(content_type: &str, file: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"nda.docx\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seeded(store: &MemoryDocumentStore) -> Uuid {
        let records: Vec<PlaceholderRecord> = serde_json::from_value(json!([
            {"order": 1, "name": "Company Name", "description": "Company entering the agreement."},
            {"order": 2, "name": "Client Name", "description": "Client counterparty."},
            {"order": 3, "name": "Company Name", "description": "Company signing the agreement."}
        ]))
        .unwrap();
        store
            .create_document("nda.docx", &records)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_upload_creates_document() {
        let store = Arc::new(MemoryDocumentStore::new());
        let model = Arc::new(ScriptedModel::new().with_response(json!({
            "placeholders": [
                {"order": 1, "name": "Company Name", "description": "Company entering the agreement."},
                {"order": 2, "name": "Client Name", "description": "Client counterparty."},
                {"order": 3, "name": "Company Name", "description": "Company signing the agreement."}
            ]
        })));
        let docx = docx_with_paragraphs(&[
            "Agreement between [Company Name] and [Client Name].",
            "Signed: [Company Name]",
        ]);

        let response = app(store.clone(), model.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/documents")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(DOCX_CONTENT_TYPE, &docx)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["filename"], "nda.docx");
        assert_eq!(json["placeholders"].as_array().unwrap().len(), 3);
        assert_eq!(json["placeholders"][2]["name"], "Company Name");
        // Server key used since the request carried none.
        assert_eq!(model.calls()[0].api_key, "sk-server");

        let id = Uuid::parse_str(json["document_id"].as_str().unwrap()).unwrap();
        assert!(store.get_document(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upload_rejects_non_docx() {
        let store = Arc::new(MemoryDocumentStore::new());
        let model = Arc::new(ScriptedModel::new());
        let response = app(store, model.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/documents")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body("application/pdf", b"%PDF-1.7")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_message_updates_placeholders() {
        let store = Arc::new(MemoryDocumentStore::new());
        let id = seeded(&store).await;
        let model = Arc::new(ScriptedModel::new().with_response(json!({
            "message": "Company name set.",
            "updates": [{"name": "Company Name", "value": "Acme Inc", "order": 1}]
        })));

        let response = app(store.clone(), model.clone())
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/documents/{id}/messages"),
                json!({"message": "We are Acme Inc", "api_key": "sk-user"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Company name set.");
        assert_eq!(json["updates"][0]["name"], "Company Name");
        assert_eq!(json["placeholders"][0]["value"], "Acme Inc");
        assert_eq!(json["placeholders"][2]["value"], "Acme Inc");
        assert!(json["placeholders"][1].get("value").is_none());
        assert_eq!(model.calls()[0].api_key, "sk-user");
    }

    #[tokio::test]
    async fn test_message_unknown_document_is_404() {
        let store = Arc::new(MemoryDocumentStore::new());
        let model = Arc::new(ScriptedModel::new());
        for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
            let response = app(store.clone(), model.clone())
                .oneshot(json_request(
                    "POST",
                    &format!("/api/v1/documents/{id}/messages"),
                    json!({"message": "hello"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_message_blank_with_malformed_id_is_400() {
        let store = Arc::new(MemoryDocumentStore::new());
        let model = Arc::new(ScriptedModel::new());
        let response = app(store, model)
            .oneshot(json_request(
                "POST",
                "/api/v1/documents/not-a-uuid/messages",
                json!({"message": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "message is required");
    }

    #[tokio::test]
    async fn test_schema_failure_returns_raw_payload() {
        let store = Arc::new(MemoryDocumentStore::new());
        let id = seeded(&store).await;
        let model = Arc::new(ScriptedModel::new().with_response(json!({"reply": "hi"})));

        let response = app(store, model)
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/documents/{id}/messages"),
                json!({"message": "hello"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "SCHEMA_VALIDATION_ERROR");
        assert!(json["error"]["raw"].as_str().unwrap().contains("reply"));
    }

    #[tokio::test]
    async fn test_bulk_update_and_read_back() {
        let store = Arc::new(MemoryDocumentStore::new());
        let id = seeded(&store).await;
        let model = Arc::new(ScriptedModel::new());

        let response = app(store.clone(), model.clone())
            .oneshot(json_request(
                "PATCH",
                &format!("/api/v1/documents/{id}/placeholders"),
                json!({"updates": [{"name": "Client Name", "value": "Beta LLC"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["placeholders"][1]["value"], "Beta LLC");

        let response = app(store, model)
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/documents/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["version"], 2);
        assert_eq!(json["placeholders"][1]["value"], "Beta LLC");
    }

    #[tokio::test]
    async fn test_bulk_update_empty_is_400() {
        let store = Arc::new(MemoryDocumentStore::new());
        let id = seeded(&store).await;
        let response = app(store, Arc::new(ScriptedModel::new()))
            .oneshot(json_request(
                "PATCH",
                &format!("/api/v1/documents/{id}/placeholders"),
                json!({"updates": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "updates array cannot be empty");
    }

    #[tokio::test]
    async fn test_conversation_returns_full_log() {
        let store = Arc::new(MemoryDocumentStore::new());
        let id = seeded(&store).await;
        store
            .append_turns(
                id,
                &[
                    ConversationTurn::user("hi"),
                    ConversationTurn::assistant("hello"),
                ],
            )
            .await
            .unwrap();

        let response = app(store, Arc::new(ScriptedModel::new()))
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/documents/{id}/conversation"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["conversation"],
            json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ])
        );
    }
}
