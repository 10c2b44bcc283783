//! Wire packet shapes and frame parsing.
//!
//! Every frame body decodes to one JSON object or an array of objects
//! ("packets"). A packet is `{type, code, ...fields}`; only `type:"request"`
//! packets are routed. Responses are `{type:"response", status, code,
//! message|<extension fields>}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::errors::ProtocolError;

/// Parse one frame body into its packet objects.
///
/// A single object becomes a one-element list; an array yields its elements.
/// Anything else (scalars, arrays containing non-objects) is a
/// [`ProtocolError::NotAPacket`].
pub fn parse_frame(body: &str) -> Result<Vec<Value>, ProtocolError> {
    let decoded: Value = serde_json::from_str(body)?;
    match decoded {
        Value::Object(_) => Ok(vec![decoded]),
        Value::Array(items) => {
            if items.iter().all(Value::is_object) {
                Ok(items)
            } else {
                Err(ProtocolError::NotAPacket)
            }
        }
        _ => Err(ProtocolError::NotAPacket),
    }
}

/// The `type` field of a decoded packet object, if present.
pub fn packet_type(packet: &Value) -> Option<&str> {
    packet.get("type").and_then(Value::as_str)
}

/// One routed client request.
///
/// Holds the full decoded object so handlers can read extension fields
/// (`user_name`, `session_id`, `password`, ...) the core does not model.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    code: String,
    fields: Map<String, Value>,
}

impl Request {
    /// Build from a decoded packet object.
    ///
    /// Returns `None` unless `type` is `"request"` and `code` is a string;
    /// packets of any other type are not requests and are dropped upstream.
    pub fn from_value(packet: &Value) -> Option<Self> {
        if packet_type(packet)? != "request" {
            return None;
        }
        let fields = packet.as_object()?.clone();
        let code = fields.get("code")?.as_str()?.to_owned();
        Some(Self { code, fields })
    }

    /// Build a request directly (tests and internal composition).
    #[must_use]
    pub fn new(code: &str) -> Self {
        let mut fields = Map::new();
        let _ = fields.insert("type".to_owned(), json!("request"));
        let _ = fields.insert("code".to_owned(), json!(code));
        Self {
            code: code.to_owned(),
            fields,
        }
    }

    /// Add a field (builder style).
    #[must_use]
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        let _ = self.fields.insert(key.to_owned(), value);
        self
    }

    /// The request code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Look up an arbitrary field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a string field.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Response delivery classification, carried on the wire as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The request succeeded.
    Success,
    /// Informational, not tied to a request outcome.
    Info,
    /// Something noteworthy but non-fatal (kick notices, partial reloads).
    Warning,
    /// The request failed.
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One server response packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: Status,
    code: String,
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Response {
    fn new(status: Status, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_owned(),
            message: Some(message.into()),
            fields: Map::new(),
        }
    }

    /// A `status:"success"` response.
    #[must_use]
    pub fn success(code: &str, message: impl Into<String>) -> Self {
        Self::new(Status::Success, code, message)
    }

    /// A `status:"info"` response.
    #[must_use]
    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::new(Status::Info, code, message)
    }

    /// A `status:"warning"` response.
    #[must_use]
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(Status::Warning, code, message)
    }

    /// A `status:"error"` response.
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(Status::Error, code, message)
    }

    /// A response with no `message`, for codes whose payload is extension
    /// fields only (e.g. `SESSIONS_NEW` carries `session_id`).
    #[must_use]
    pub fn bare(status: Status, code: &str) -> Self {
        Self {
            status,
            code: code.to_owned(),
            message: None,
            fields: Map::new(),
        }
    }

    /// Add an extension field (builder style).
    #[must_use]
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        let _ = self.fields.insert(key.to_owned(), value);
        self
    }

    /// The response status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The response code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The human-readable message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Look up an extension field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The full wire object, including `type:"response"`.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        let _ = obj.insert("type".to_owned(), json!("response"));
        let _ = obj.insert("status".to_owned(), json!(self.status));
        let _ = obj.insert("code".to_owned(), json!(self.code));
        if let Some(message) = &self.message {
            let _ = obj.insert("message".to_owned(), json!(message));
        }
        for (key, value) in &self.fields {
            let _ = obj.insert(key.clone(), value.clone());
        }
        Value::Object(obj)
    }
}

/// Serialize one or more response packets into a frame body.
///
/// One packet serializes as an object, several as an array, matching the
/// frame rule in [`parse_frame`].
pub fn format_frame(packets: &[Response]) -> String {
    match packets {
        [only] => only.to_value().to_string(),
        many => Value::Array(many.iter().map(Response::to_value).collect()).to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
