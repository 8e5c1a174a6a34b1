use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Signed request body sent to the server.
///
/// Built fresh for every attempt; `request_id` and `req_time` are never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub platform: String,
    /// Epoch seconds
    pub req_time: i64,
    pub request_id: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub parameter: Value,
    #[serde(default)]
    pub sign: String,
}

/// Server error code; some backends send it as a number, some as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl ErrorCode {
    /// Numeric value, parsing textual codes leniently
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Loose equality: `10001` and `"10001"` both match 10001
    pub fn matches(&self, code: i64) -> bool {
        self.as_i64() == Some(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Decoded body of a buffered response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error_messages: Option<String>,
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
}

impl ResponseEnvelope {
    /// `success == true` or a 200 status code
    pub fn is_success(&self) -> bool {
        self.success == Some(true) || (self.success.is_none() && self.code == Some(200))
    }

    /// Whether the body carries any of the envelope's indicator fields
    pub fn has_indicator(&self) -> bool {
        self.success.is_some() || self.code.is_some() || self.error_code.is_some()
    }

    pub fn error_code_value(&self) -> Option<i64> {
        self.error_code.as_ref().and_then(ErrorCode::as_i64)
    }
}

/// Status and body of a buffered HTTP exchange, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Lifecycle of a single streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl StreamState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_names() {
        let envelope = Envelope {
            platform: "web".into(),
            req_time: 1_700_000_000,
            request_id: "rid".into(),
            client_id: "cid".into(),
            token: None,
            trace_id: Some("tid".into()),
            parameter: json!({"a": 1}),
            sign: "abc".into(),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "platform": "web",
                "reqTime": 1_700_000_000,
                "requestId": "rid",
                "clientId": "cid",
                "traceId": "tid",
                "parameter": {"a": 1},
                "sign": "abc"
            })
        );
    }

    #[test]
    fn test_response_envelope_decode() {
        let body = r#"{"result":null,"requestId":null,"errorMessages":"expired","errorCode":"10001","success":false}"#;
        let response: ResponseEnvelope = serde_json::from_str(body).unwrap();
        assert!(!response.is_success());
        assert!(response.error_code.as_ref().unwrap().matches(10001));
        assert_eq!(response.error_messages.as_deref(), Some("expired"));
    }

    #[test]
    fn test_status_code_success() {
        let response: ResponseEnvelope =
            serde_json::from_str(r#"{"code":200,"result":{"ok":true}}"#).unwrap();
        assert!(response.is_success());
        let response: ResponseEnvelope = serde_json::from_str(r#"{"code":500}"#).unwrap();
        assert!(!response.is_success());
        assert!(response.has_indicator());
    }

    #[test]
    fn test_error_code_lenient() {
        assert_eq!(ErrorCode::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(ErrorCode::Text("E_BAD".into()).as_i64(), None);
        assert_eq!(ErrorCode::Number(7).to_string(), "7");
    }

    #[test]
    fn test_stream_state_terminal() {
        assert!(StreamState::Cancelled.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
        assert_eq!(StreamState::Failed.to_string(), "failed");
    }
}
