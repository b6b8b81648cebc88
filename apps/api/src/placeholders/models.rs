use serde::{Deserialize, Serialize};

/// One bracket occurrence as named by the model at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaceholderItem {
    /// 1-based position of the occurrence in document reading order.
    pub order: u32,
    pub name: String,
    pub description: String,
}

/// Stored form of a placeholder occurrence.
///
/// Records that share a `name` stand for the same underlying value and always
/// carry the same `value` after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderRecord {
    pub order: u32,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<PlaceholderItem> for PlaceholderRecord {
    fn from(item: PlaceholderItem) -> Self {
        Self {
            order: item.order,
            name: item.name,
            description: item.description,
            value: None,
        }
    }
}

/// A name-keyed value proposed by the updater model or supplied by a caller.
/// `order` is carried for traceability only; reconciliation keys on `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProposal {
    pub name: String,
    pub value: String,
    pub order: u32,
}

/// A value to write to every record carrying `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueUpdate {
    pub name: String,
    pub value: String,
}

impl From<&UpdateProposal> for ValueUpdate {
    fn from(proposal: &UpdateProposal) -> Self {
        Self {
            name: proposal.name.clone(),
            value: proposal.value.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Returns the trailing `limit` turns of a conversation log.
/// The full log stays in storage; only this window is shown to the model.
pub fn recent_window(turns: &[ConversationTurn], limit: usize) -> &[ConversationTurn] {
    &turns[turns.len().saturating_sub(limit)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_value_omits_field() {
        let record = PlaceholderRecord::from(PlaceholderItem {
            order: 1,
            name: "Company Name".to_string(),
            description: "Legal name of the company.".to_string(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("value").is_none());
        assert_eq!(json["order"], 1);
    }

    #[test]
    fn test_record_round_trips_stored_value() {
        let json = r#"{"order":2,"name":"Client Name","description":"Counterparty.","value":"Beta LLC"}"#;
        let record: PlaceholderRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.value.as_deref(), Some("Beta LLC"));
    }

    #[test]
    fn test_item_rejects_unknown_fields() {
        let json = r#"{"order":1,"name":"Company Name","description":"d","confidence":0.9}"#;
        assert!(serde_json::from_str::<PlaceholderItem>(json).is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"Done."}"#).unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert!(serde_json::from_str::<Role>(r#""system""#).is_err());
    }

    #[test]
    fn test_recent_window_keeps_latest_turns() {
        let turns: Vec<_> = (0..20)
            .map(|i| ConversationTurn::user(format!("turn {i}")))
            .collect();
        let window = recent_window(&turns, 15);
        assert_eq!(window.len(), 15);
        assert_eq!(window[0].content, "turn 5");
        assert_eq!(window[14].content, "turn 19");
    }

    #[test]
    fn test_recent_window_shorter_log() {
        let turns = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")];
        assert_eq!(recent_window(&turns, 15).len(), 2);
        assert!(recent_window(&[], 15).is_empty());
    }
}
