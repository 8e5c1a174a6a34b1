use crate::core::errors::PipelineError;
use crate::core::notify::{DebouncedNotifier, SERVICE_UNAVAILABLE_MESSAGE};
use crate::core::session::SessionInvalidator;
use crate::core::types::{RawResponse, ResponseEnvelope};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

/// Fallback text when a failed response carries no message.
pub const REQUEST_FAILED_MESSAGE: &str = "request failed";

/// Maps responses and transport failures to typed outcomes and fires the
/// matching side effects.
///
/// | outcome | side effect |
/// |---|---|
/// | success | none |
/// | session-expired code | invalidate session, no notification |
/// | silent code | none |
/// | any other failure | debounced notification |
#[derive(Clone)]
pub struct ResponseClassifier {
    session_expired_code: i64,
    silent_code: i64,
    invalidator: Arc<dyn SessionInvalidator>,
    notifier: DebouncedNotifier,
}

impl std::fmt::Debug for ResponseClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseClassifier")
            .field("session_expired_code", &self.session_expired_code)
            .field("silent_code", &self.silent_code)
            .finish_non_exhaustive()
    }
}

impl ResponseClassifier {
    pub fn new(
        session_expired_code: i64,
        silent_code: i64,
        invalidator: Arc<dyn SessionInvalidator>,
        notifier: DebouncedNotifier,
    ) -> Self {
        Self {
            session_expired_code,
            silent_code,
            invalidator,
            notifier,
        }
    }

    pub const fn notifier(&self) -> &DebouncedNotifier {
        &self.notifier
    }

    /// Classify a decoded response envelope
    pub fn classify(&self, response: ResponseEnvelope) -> Result<Value, PipelineError> {
        if response.is_success() {
            return Ok(response.result);
        }

        let code = response.error_code_value();
        let message = response
            .error_messages
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| REQUEST_FAILED_MESSAGE.to_string());

        if code == Some(self.session_expired_code) {
            warn!(code = ?code, "session expired, invalidating");
            self.invalidator.invalidate();
            return Err(PipelineError::SessionExpired { message });
        }

        if code == Some(self.silent_code) {
            warn!(code = ?code, message = %message, "silent business error");
        } else {
            warn!(code = ?code, message = %message, "business error");
            self.notifier.notify(message.clone());
        }

        Err(PipelineError::Business { code, message })
    }

    /// Classify a raw HTTP exchange.
    ///
    /// Error statuses whose body is still a response envelope go through the
    /// envelope table, so a 401 carrying the session-expired code behaves like
    /// a 200 carrying it.
    pub fn classify_raw(&self, raw: RawResponse) -> Result<Value, PipelineError> {
        if raw.is_success() {
            let envelope = serde_json::from_str::<ResponseEnvelope>(&raw.body).map_err(|e| {
                PipelineError::Deserialization(format!(
                    "Failed to parse response envelope: {}",
                    e
                ))
            })?;
            return self.classify(envelope);
        }

        if let Ok(envelope) = serde_json::from_str::<ResponseEnvelope>(&raw.body) {
            if envelope.has_indicator() {
                return self.classify(envelope);
            }
        }

        let message = error_message_from_body(&raw.body)
            .unwrap_or_else(|| SERVICE_UNAVAILABLE_MESSAGE.to_string());
        error!(status = raw.status, message = %message, "http error");
        self.notifier.notify(message.clone());
        Err(PipelineError::Http {
            status: raw.status,
            message,
        })
    }

    /// Record a failure where no response reached the client
    pub fn transport_failure(&self, err: PipelineError) -> PipelineError {
        error!(error = %err, "transport failure");
        if !err.is_cancellation() {
            self.notifier.notify(SERVICE_UNAVAILABLE_MESSAGE);
        }
        err
    }

    /// Surface a streaming failure, unless it is the owner's cancellation
    pub fn stream_failure(&self, err: &PipelineError) {
        if err.is_cancellation() {
            return;
        }
        error!(error = %err, "stream failure");
        self.notifier.notify(SERVICE_UNAVAILABLE_MESSAGE);
    }
}

fn error_message_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "errorMessages"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
