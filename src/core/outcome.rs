// Owned result types produced by the boundary; nothing here points into native memory.
use std::fmt;

use serde_json::Value;

/// Copied success payload: the JSON text as the native side produced it, plus its parsed form.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonPayload {
    text: String,
    value: Value,
}

impl JsonPayload {
    pub(crate) fn new(text: String, value: Value) -> Self {
        Self { text, value }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for JsonPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Tagged result of one native parse call.
///
/// `Failure` means the native engine rejected the command. It is ordinary data;
/// boundary violations are reported through `Error` instead.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    Success(JsonPayload),
    Failure(String),
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success(_))
    }

    pub fn as_success(&self) -> Option<&JsonPayload> {
        match self {
            ParseOutcome::Success(payload) => Some(payload),
            ParseOutcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&str> {
        match self {
            ParseOutcome::Success(_) => None,
            ParseOutcome::Failure(message) => Some(message),
        }
    }

    /// Converts into a plain `Result`, with the rejection message as the error.
    pub fn into_result(self) -> Result<JsonPayload, String> {
        match self {
            ParseOutcome::Success(payload) => Ok(payload),
            ParseOutcome::Failure(message) => Err(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonPayload, ParseOutcome};
    use serde_json::json;

    #[test]
    fn accessors_are_exclusive() {
        let ok = ParseOutcome::Success(JsonPayload::new("{}".to_string(), json!({})));
        assert!(ok.is_success());
        assert!(ok.as_success().is_some());
        assert!(ok.as_failure().is_none());

        let rejected = ParseOutcome::Failure("bad".to_string());
        assert!(!rejected.is_success());
        assert!(rejected.as_success().is_none());
        assert_eq!(rejected.into_result(), Err("bad".to_string()));
    }

    #[test]
    fn payload_keeps_original_text() {
        let payload = JsonPayload::new("{ \"a\" : 1 }".to_string(), json!({"a": 1}));
        assert_eq!(payload.to_string(), "{ \"a\" : 1 }");
        assert_eq!(payload.clone().into_value(), json!({"a": 1}));
        assert_eq!(payload.into_text(), "{ \"a\" : 1 }");
    }
}
