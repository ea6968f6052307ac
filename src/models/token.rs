use serde::Deserialize;
use serde_json::Value;

/// Decoded separator payload, classified once at decode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeparatorToken {
    /// Registration token carrying an attendee identity.
    Structured {
        /// Registration identifier.
        id: Option<String>,
        /// Attendee display name.
        name: Option<String>,
        /// Registration type (e.g. `FIELD`), informational only.
        kind: Option<String>,
        /// Payload exactly as decoded.
        raw: String,
    },
    /// Any other decodable payload. Still a group boundary.
    Raw {
        /// Payload exactly as decoded.
        text: String,
    },
}

/// Known token fields, each kept loose so a badly typed one cannot hide the others.
#[derive(Deserialize)]
struct TokenFields {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default, rename = "type")]
    kind: Option<Value>,
}

/// Strings and numbers become text; anything else, or an empty string, is absent.
fn field_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl SeparatorToken {
    /// Classify a decoded payload.
    ///
    /// A JSON object with a non-empty `id` or `name` (string or number) is
    /// structured; everything else, including malformed JSON, stays raw.
    /// Fields of any other type are ignored individually.
    pub fn parse(payload: &str) -> Self {
        let raw = payload.to_string();
        let fields = match serde_json::from_str::<Value>(payload) {
            Ok(value) if value.is_object() => serde_json::from_value::<TokenFields>(value).ok(),
            _ => None,
        };
        let Some(fields) = fields else {
            return SeparatorToken::Raw { text: raw };
        };

        let id = field_text(fields.id);
        let name = field_text(fields.name);

        if id.is_none() && name.is_none() {
            return SeparatorToken::Raw { text: raw };
        }

        SeparatorToken::Structured {
            id,
            name,
            kind: field_text(fields.kind),
            raw,
        }
    }

    /// Payload exactly as decoded.
    pub fn raw(&self) -> &str {
        match self {
            SeparatorToken::Structured { raw, .. } => raw,
            SeparatorToken::Raw { text } => text,
        }
    }

    /// Human readable subject label: name, then id, then raw text.
    pub fn label(&self) -> &str {
        match self {
            SeparatorToken::Structured { id, name, raw, .. } => name
                .as_deref()
                .or(id.as_deref())
                .unwrap_or(raw.as_str()),
            SeparatorToken::Raw { text } => text,
        }
    }

    /// Attendee key handed to storage: id, then name, then raw text.
    pub fn attendee_id(&self) -> &str {
        match self {
            SeparatorToken::Structured { id, name, raw, .. } => id
                .as_deref()
                .or(name.as_deref())
                .unwrap_or(raw.as_str()),
            SeparatorToken::Raw { text } => text,
        }
    }

    /// Whether the payload carried an attendee identity.
    pub fn is_structured(&self) -> bool {
        matches!(self, SeparatorToken::Structured { .. })
    }
}
