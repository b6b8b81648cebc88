//! Conversational Updater: turns a user message into proposed placeholder values.
//!
//! The model sees only names and descriptions, never current values or order, plus a
//! bounded window of earlier turns. Zero proposals is a normal outcome.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::llm_client::prompts::with_structured_output;
use crate::llm_client::{parse_structured, LlmError, StructuredModel, StructuredRequest, ToolSpec};
use crate::placeholders::models::{ConversationTurn, PlaceholderRecord, UpdateProposal};
use crate::placeholders::prompts::{UPDATE_PROMPT_TEMPLATE, UPDATE_SYSTEM};

const UPDATE_TOOL: &str = "update_placeholders";

/// Name and description of a fillable field, as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

impl<'a> From<&'a PlaceholderRecord> for SchemaEntry<'a> {
    fn from(record: &'a PlaceholderRecord) -> Self {
        Self {
            name: &record.name,
            description: &record.description,
        }
    }
}

/// The model's reply: a short message for the user and zero or more proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateResponse {
    pub message: String,
    pub updates: Vec<UpdateProposal>,
}

fn update_tool() -> ToolSpec {
    ToolSpec {
        name: UPDATE_TOOL,
        description: "Reply to the user and report the placeholder values extracted with confidence.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "A short reply to the user, summarising changes or asking for clarification."
                },
                "updates": {
                    "type": "array",
                    "description": "Placeholders the model is confident about.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {
                                "type": "string",
                                "description": "The placeholder name to be filled."
                            },
                            "value": {
                                "type": "string",
                                "description": "The text value to insert for this placeholder."
                            },
                            "order": {
                                "type": "integer",
                                "minimum": 1,
                                "description": "The order index associated with this placeholder."
                            }
                        },
                        "required": ["name", "value", "order"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["message", "updates"],
            "additionalProperties": false
        }),
    }
}

fn build_prompt(message: &str, schema: &[SchemaEntry<'_>]) -> String {
    let listing = schema
        .iter()
        .map(|entry| format!("- {}: {}", entry.name, entry.description))
        .collect::<Vec<_>>()
        .join("\n");
    UPDATE_PROMPT_TEMPLATE
        .replace("{placeholders}", &listing)
        .replace("{message}", message)
}

/// Asks the model which placeholder values `message` supplies.
///
/// `history` must already be windowed by the caller; it is sent ahead of the
/// current message in its stored order.
pub async fn propose_updates(
    message: &str,
    schema: &[SchemaEntry<'_>],
    history: &[ConversationTurn],
    model: &dyn StructuredModel,
    api_key: &str,
) -> Result<UpdateResponse, LlmError> {
    let system = with_structured_output(UPDATE_SYSTEM);
    let tool = update_tool();

    let mut messages = history.to_vec();
    messages.push(ConversationTurn::user(build_prompt(message, schema)));

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

    let response = validate_update(&raw)?;
    info!(
        "Updater proposed {} value(s) from {} history turn(s)",
        response.updates.len(),
        history.len()
    );
    Ok(response)
}

fn validate_update(raw: &Value) -> Result<UpdateResponse, LlmError> {
    let response: UpdateResponse = parse_structured(raw)?;
    if let Some(bad) = response.updates.iter().find(|u| u.order == 0) {
        return Err(LlmError::SchemaValidation {
            reason: format!("update for '{}' has order 0; orders start at 1", bad.name),
            raw: raw.to_string(),
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedModel;
    use crate::placeholders::models::Role;

    fn records() -> Vec<PlaceholderRecord> {
        vec![
            PlaceholderRecord {
                order: 1,
                name: "Company Name".to_string(),
                description: "Company entering the agreement.".to_string(),
                value: Some("Old Co".to_string()),
            },
            PlaceholderRecord {
                order: 2,
                name: "Client Name".to_string(),
                description: "Client counterparty.".to_string(),
                value: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_proposes_updates_with_history() {
        let model = ScriptedModel::new().with_response(json!({
            "message": "Set the company name to Acme Inc.",
            "updates": [{"name": "Company Name", "value": "Acme Inc", "order": 1}]
        }));
        let records = records();
        let schema: Vec<SchemaEntry> = records.iter().map(SchemaEntry::from).collect();
        let history = vec![
            ConversationTurn::user("Hi"),
            ConversationTurn::assistant("Which company is this for?"),
        ];

        let response = propose_updates("It's Acme Inc", &schema, &history, &model, "sk-test")
            .await
            .unwrap();

        assert_eq!(response.updates.len(), 1);
        assert_eq!(response.updates[0].value, "Acme Inc");

        let calls = model.calls();
        assert_eq!(calls[0].tool, UPDATE_TOOL);
        let sent = &calls[0].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].role, Role::Assistant);
        assert_eq!(sent[2].role, Role::User);
        assert!(sent[2].content.contains("- Company Name: Company entering the agreement."));
        assert!(sent[2].content.contains("User message: It's Acme Inc"));
    }

    #[tokio::test]
    async fn test_values_are_not_shown_to_model() {
        let model = ScriptedModel::new().with_response(json!({"message": "ok", "updates": []}));
        let records = records();
        let schema: Vec<SchemaEntry> = records.iter().map(SchemaEntry::from).collect();

        propose_updates("hello", &schema, &[], &model, "sk-test")
            .await
            .unwrap();

        let prompt = &model.calls()[0].messages[0].content;
        assert!(!prompt.contains("Old Co"));
    }

    #[tokio::test]
    async fn test_zero_updates_is_valid() {
        let model = ScriptedModel::new().with_response(json!({
            "message": "Which client do you mean?",
            "updates": []
        }));
        let response = propose_updates("what is this?", &[], &[], &model, "sk-test")
            .await
            .unwrap();
        assert!(response.updates.is_empty());
        assert_eq!(response.message, "Which client do you mean?");
    }

    #[test]
    fn test_missing_updates_field_is_rejected() {
        let raw = json!({"message": "done"});
        assert!(matches!(
            validate_update(&raw),
            Err(LlmError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        let raw = json!({
            "message": "done",
            "updates": [{"name": "Amount", "value": 42, "order": 1}]
        });
        assert!(validate_update(&raw).is_err());
    }

    #[test]
    fn test_zero_order_is_rejected() {
        let raw = json!({
            "message": "done",
            "updates": [{"name": "Amount", "value": "42", "order": 0}]
        });
        match validate_update(&raw) {
            Err(LlmError::SchemaValidation { reason, raw }) => {
                assert!(reason.contains("Amount"));
                assert!(raw.contains("\"order\":0"));
            }
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }
}
