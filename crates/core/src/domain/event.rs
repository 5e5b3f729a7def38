use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dialogflow session path, e.g. `projects/<p>/agent/sessions/<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim).filter(|value| !value.is_empty()).map(|value| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn context_name(&self, context: &str) -> String {
        format!("{}/contexts/{context}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One inbound conversational turn as classified by the calling platform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationalEvent {
    pub session_id: Option<SessionId>,
    pub intent_label: Option<String>,
    pub raw_text: String,
    pub slots: BTreeMap<String, Value>,
}

impl ConversationalEvent {
    /// Resolved text of a slot, or `None` when the slot is absent or blank.
    pub fn slot(&self, name: &str) -> Option<String> {
        self.slots.get(name).and_then(slot_text)
    }

    pub fn query_text(&self) -> &str {
        self.raw_text.trim()
    }
}

fn slot_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        // Person/location entities arrive as objects; `name` carries the display value.
        Value::Object(fields) => fields.get("name").and_then(slot_text)?,
        Value::Array(values) => values.iter().find_map(slot_text)?,
        Value::Null => return None,
    };

    (!text.is_empty()).then_some(text)
}
