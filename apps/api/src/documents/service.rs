//! Document operations: the three caller-facing flows, independent of HTTP.
//!
//! Flow:
//!   create_document: DOCX → paragraphs → extractor → namer → store
//!   send_message:    store → updater → reconciler → store (+ conversation log)
//!   bulk_update:     caller updates → reconciler → store
//!
//! Each flow reads current state at the start and writes the full result at the end.
//! Placeholder writes carry the version read at the start; a concurrent writer
//! surfaces as `AppError::Conflict`.

use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::documents::docx::{read_paragraphs, DOCX_CONTENT_TYPE};
use crate::documents::store::{DocumentRecord, DocumentStore};
use crate::errors::AppError;
use crate::llm_client::StructuredModel;
use crate::placeholders::extractor::{count_occurrences, find_placeholder_paragraphs};
use crate::placeholders::models::{
    ConversationTurn, PlaceholderRecord, UpdateProposal, ValueUpdate,
};
use crate::placeholders::namer::name_placeholders;
use crate::placeholders::reconcile::reconcile;
use crate::placeholders::updater::{propose_updates, SchemaEntry};

const DEFAULT_FILENAME: &str = "document.docx";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// An uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct CreateDocumentResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub placeholders: Vec<PlaceholderRecord>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub updates: Vec<UpdateProposal>,
    pub placeholders: Vec<PlaceholderRecord>,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub placeholders: Vec<PlaceholderRecord>,
}

/// Model credentials available to a request: the caller's own key and the server's.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub request_key: Option<&'a str>,
    pub server_key: Option<&'a str>,
}

impl<'a> Credentials<'a> {
    /// The caller's key wins; the server key is the fallback.
    pub fn resolve(&self) -> Result<&'a str, AppError> {
        self.request_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or(self.server_key.filter(|k| !k.is_empty()))
            .ok_or_else(|| AppError::Credential("api_key is required".to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Operations
// ────────────────────────────────────────────────────────────────────────────

/// CreateDocument: reads the upload, names its placeholders and stores the document.
pub async fn create_document(
    store: &dyn DocumentStore,
    model: &dyn StructuredModel,
    file: Option<UploadedFile>,
    credentials: Credentials<'_>,
) -> Result<CreateDocumentResponse, AppError> {
    let file = file.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    let api_key = credentials.resolve()?;

    if file.content_type.as_deref() != Some(DOCX_CONTENT_TYPE) {
        return Err(AppError::Validation(
            "Only DOCX files are supported".to_string(),
        ));
    }

    let filename = file
        .filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    let paragraphs = read_paragraphs(&file.bytes)?;
    let placeholder_paragraphs = find_placeholder_paragraphs(&paragraphs);
    info!(
        "Read {} paragraphs from '{}': {} placeholder occurrences in {} paragraphs",
        paragraphs.len(),
        filename,
        count_occurrences(&placeholder_paragraphs),
        placeholder_paragraphs.len()
    );

    let placeholders: Vec<PlaceholderRecord> =
        name_placeholders(&placeholder_paragraphs, model, api_key)
            .await?
            .into_iter()
            .map(PlaceholderRecord::from)
            .collect();

    let document = store.create_document(&filename, &placeholders).await?;
    info!(
        "Created document {} with {} placeholder occurrences",
        document.id,
        document.placeholders.len()
    );

    Ok(CreateDocumentResponse {
        document_id: document.id,
        filename: document.filename,
        placeholders: document.placeholders,
        message: "File uploaded and processed successfully".to_string(),
    })
}

/// SendMessage: lets the model fill placeholders from a user message.
///
/// Checks run in order: credential, message, document. The user turn and the
/// model's reply are committed together with any placeholder change after every
/// successful model call; a version conflict writes neither.
pub async fn send_message(
    store: &dyn DocumentStore,
    model: &dyn StructuredModel,
    conversation_window: usize,
    document_id: &str,
    message: Option<&str>,
    credentials: Credentials<'_>,
) -> Result<MessageResponse, AppError> {
    let api_key = credentials.resolve()?;

    let message = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::Validation("message is required".to_string()))?;

    let document_id = parse_document_id(document_id)?;
    let document = load_document(store, document_id).await?;
    if document.placeholders.is_empty() {
        return Err(AppError::Validation(
            "No placeholders found for this document".to_string(),
        ));
    }

    let history = store
        .recent_turns(document_id, conversation_window)
        .await?;
    let schema: Vec<SchemaEntry> = document.placeholders.iter().map(SchemaEntry::from).collect();

    let response = propose_updates(message, &schema, &history, model, api_key).await?;

    let mut placeholders = document.placeholders.clone();
    let updates: Vec<ValueUpdate> = response.updates.iter().map(ValueUpdate::from).collect();
    let summary = reconcile(&mut placeholders, &updates);
    info!(
        "Document {}: applied {} update(s) to {} record(s), dropped {}",
        document_id, summary.applied, summary.records_written, summary.dropped
    );

    store
        .record_exchange(
            document_id,
            document.version,
            (summary.records_written > 0).then_some(placeholders.as_slice()),
            &[
                ConversationTurn::user(message),
                ConversationTurn::assistant(response.message.clone()),
            ],
        )
        .await?;

    Ok(MessageResponse {
        message: response.message,
        updates: response.updates,
        placeholders,
    })
}

/// BulkUpdate: applies caller-supplied `{name, value}` pairs directly.
/// The body is validated before the document id is looked at.
pub async fn bulk_update(
    store: &dyn DocumentStore,
    document_id: &str,
    body: &Value,
) -> Result<DocumentResponse, AppError> {
    let updates = parse_bulk_updates(body)?;

    let document_id = parse_document_id(document_id)?;
    let document = load_document(store, document_id).await?;
    let mut placeholders = document.placeholders.clone();
    let summary = reconcile(&mut placeholders, &updates);
    info!(
        "Document {}: bulk update applied {} of {} update(s) to {} record(s)",
        document_id,
        summary.applied,
        updates.len(),
        summary.records_written
    );

    if summary.records_written > 0 {
        store
            .replace_placeholders(document_id, document.version, &placeholders)
            .await?;
    }

    Ok(DocumentResponse {
        document_id: document.id,
        filename: document.filename,
        placeholders,
    })
}

/// Unparseable ids cannot name a stored document.
pub fn parse_document_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Document not found".to_string()))
}

pub async fn load_document(
    store: &dyn DocumentStore,
    document_id: Uuid,
) -> Result<DocumentRecord, AppError> {
    store
        .get_document(document_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))
}

/// Validates a bulk update body of the form `{"updates": [{"name", "value"}, ...]}`.
///
/// `value` may be any JSON scalar except null: strings are taken verbatim, numbers
/// and booleans use their JSON text.
pub fn parse_bulk_updates(body: &Value) -> Result<Vec<ValueUpdate>, AppError> {
    let invalid = |msg: &str| AppError::Validation(msg.to_string());

    let updates = body
        .get("updates")
        .ok_or_else(|| invalid("updates is required"))?
        .as_array()
        .ok_or_else(|| invalid("updates must be an array"))?;

    if updates.is_empty() {
        return Err(invalid("updates array cannot be empty"));
    }

    updates
        .iter()
        .map(|entry| {
            let entry = entry.as_object().ok_or_else(|| {
                invalid("Each update item must be an object with \"name\" and \"value\" fields")
            })?;
            let (Some(name), Some(value)) = (entry.get("name"), entry.get("value")) else {
                return Err(invalid(
                    "Each update item must have \"name\" and \"value\" fields",
                ));
            };
            let name = name
                .as_str()
                .ok_or_else(|| invalid("Update \"name\" must be a string"))?;
            Ok(ValueUpdate {
                name: name.to_string(),
                value: coerce_value(value).ok_or_else(|| {
                    invalid("Update \"value\" must be a string, number or boolean")
                })?,
            })
        })
        .collect()
}

fn coerce_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
