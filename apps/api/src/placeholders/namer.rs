//! Placeholder Namer: asks the model for one named record per bracket occurrence
//! and validates the answer before anything is stored.
//!
//! Validation is strict: a payload with the wrong item count, gaps in `order`, blank
//! descriptions or malformed names is rejected with the raw JSON attached. Nothing is
//! repaired or retried here.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::llm_client::prompts::with_structured_output;
use crate::llm_client::{parse_structured, LlmError, StructuredModel, StructuredRequest, ToolSpec};
use crate::placeholders::extractor::occurrences;
use crate::placeholders::models::{ConversationTurn, PlaceholderItem};
use crate::placeholders::prompts::{NAMING_PROMPT_TEMPLATE, NAMING_SYSTEM};

const NAMING_TOOL: &str = "name_placeholders";
const MAX_NAME_WORDS: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamingPayload {
    placeholders: Vec<PlaceholderItem>,
}

fn naming_tool() -> ToolSpec {
    ToolSpec {
        name: NAMING_TOOL,
        description: "Record a human-readable name and description for every bracketed placeholder occurrence.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "placeholders": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "order": {
                                "type": "integer",
                                "minimum": 1,
                                "description": "The 1-based index of the occurrence in the document"
                            },
                            "name": {
                                "type": "string",
                                "description": "The human understandable name of the placeholder in title case"
                            },
                            "description": {
                                "type": "string",
                                "minLength": 1,
                                "description": "A 1-2 sentence description of the placeholder"
                            }
                        },
                        "required": ["order", "name", "description"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["placeholders"],
            "additionalProperties": false
        }),
    }
}

fn build_prompt(paragraphs: &[String], tokens: &[String]) -> String {
    let numbered = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| format!("{}. {}", i + 1, token))
        .collect::<Vec<_>>()
        .join("\n");
    NAMING_PROMPT_TEMPLATE
        .replace("{paragraphs}", &paragraphs.join("\n"))
        .replace("{count}", &tokens.len().to_string())
        .replace("{occurrences}", &numbered)
}

/// Names every bracket occurrence in `paragraphs`.
///
/// Returns items sorted by `order`, numbered 1..N where N is the occurrence count.
/// An empty paragraph list short-circuits without calling the model.
pub async fn name_placeholders(
    paragraphs: &[String],
    model: &dyn StructuredModel,
    api_key: &str,
) -> Result<Vec<PlaceholderItem>, LlmError> {
    let tokens = occurrences(paragraphs);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let system = with_structured_output(NAMING_SYSTEM);
    let tool = naming_tool();
    let messages = [ConversationTurn::user(build_prompt(paragraphs, &tokens))];

    info!(
        "Naming {} placeholder occurrences across {} paragraphs",
        tokens.len(),
        paragraphs.len()
    );

    let raw = model
        .complete(
            api_key,
            StructuredRequest {
                system: &system,
                tool: &tool,
                messages: &messages,
            },
        )
        .await?;

    validate_naming(&raw, tokens.len())
}

/// Checks a naming payload against the occurrence count and the naming rules.
fn validate_naming(raw: &Value, expected: usize) -> Result<Vec<PlaceholderItem>, LlmError> {
    let reject = |reason: String| LlmError::SchemaValidation {
        reason,
        raw: raw.to_string(),
    };

    let payload: NamingPayload = parse_structured(raw)?;
    let mut items = payload.placeholders;

    if items.len() != expected {
        return Err(reject(format!(
            "expected {expected} placeholder items, got {}",
            items.len()
        )));
    }

    for item in &items {
        if item.description.trim().is_empty() {
            return Err(reject(format!(
                "placeholder {} has an empty description",
                item.order
            )));
        }
        check_name(&item.name).map_err(|why| reject(format!("placeholder {}: {why}", item.order)))?;
    }

    items.sort_by_key(|item| item.order);
    for (index, item) in items.iter().enumerate() {
        let wanted = index as u32 + 1;
        if item.order != wanted {
            return Err(reject(format!(
                "placeholder orders must run 1..{expected} without gaps; found {} at position {wanted}",
                item.order
            )));
        }
    }

    Ok(items)
}

fn check_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("name is empty".to_string());
    }
    if trimmed.contains(['[', ']', '_']) {
        return Err(format!("name '{trimmed}' contains brackets or underscores"));
    }
    let words = trimmed.split_whitespace().count();
    if words > MAX_NAME_WORDS {
        return Err(format!(
            "name '{trimmed}' has {words} words, at most {MAX_NAME_WORDS} allowed"
        ));
    }
    Ok(())
}
