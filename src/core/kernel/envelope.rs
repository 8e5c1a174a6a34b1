use crate::core::config::SignatureScope;
use crate::core::device::DeviceIdProvider;
use crate::core::errors::PipelineError;
use crate::core::kernel::canonical::canonicalize;
use crate::core::kernel::signer::Signer;
use crate::core::session::SessionContext;
use crate::core::types::Envelope;
use serde_json::Value;
use std::sync::Arc;
use tracing::{instrument, trace};
use uuid::Uuid;

/// Assembles signed envelopes from caller parameters.
///
/// Holds no per-call state: every `build` reads the session and the clock
/// again and mints a new request id.
#[derive(Clone)]
pub struct EnvelopeBuilder {
    platform: String,
    scope: SignatureScope,
    signer: Arc<dyn Signer>,
    session: Arc<dyn SessionContext>,
    device: Arc<dyn DeviceIdProvider>,
}

impl std::fmt::Debug for EnvelopeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeBuilder")
            .field("platform", &self.platform)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl EnvelopeBuilder {
    pub fn new(
        platform: impl Into<String>,
        scope: SignatureScope,
        signer: Arc<dyn Signer>,
        session: Arc<dyn SessionContext>,
        device: Arc<dyn DeviceIdProvider>,
    ) -> Self {
        Self {
            platform: platform.into(),
            scope,
            signer,
            session,
            device,
        }
    }

    pub const fn scope(&self) -> SignatureScope {
        self.scope
    }

    /// Build and sign the envelope for one attempt
    #[instrument(skip(self, params), fields(platform = %self.platform, scope = ?self.scope))]
    pub async fn build(&self, params: Value) -> Result<Envelope, PipelineError> {
        let parameter = strip_empty_fields(params);
        let device_id = self.device.client_id().await?;
        let session = self.session.snapshot();

        let mut envelope = Envelope {
            platform: self.platform.clone(),
            req_time: chrono::Utc::now().timestamp(),
            request_id: Uuid::new_v4().to_string(),
            client_id: device_id,
            token: None,
            trace_id: None,
            parameter,
            sign: String::new(),
        };

        if session.is_authenticated() {
            envelope.token = session.token;
            envelope.trace_id = session.trace_id;
            if let Some(client_id) = session.client_id.filter(|id| !id.is_empty()) {
                envelope.client_id = client_id;
            }
        }

        envelope.sign = self.sign(&envelope)?;
        trace!(request_id = %envelope.request_id, "envelope signed");
        Ok(envelope)
    }

    /// Signature over the configured scope; `sign` itself is never covered
    pub fn sign(&self, envelope: &Envelope) -> Result<String, PipelineError> {
        let entries = match self.scope {
            SignatureScope::Parameters => canonicalize(&envelope.parameter),
            SignatureScope::Envelope => {
                let mut value = serde_json::to_value(envelope).map_err(|e| {
                    PipelineError::Serialization(format!("Failed to serialize envelope: {}", e))
                })?;
                if let Value::Object(map) = &mut value {
                    map.remove("sign");
                }
                canonicalize(&value)
            }
        };
        self.signer.sign(&entries)
    }
}

/// Drop null and empty-string fields at the top level of an object.
///
/// Non-object parameters pass through unchanged.
pub fn strip_empty_fields(params: Value) -> Value {
    match params {
        Value::Object(mut map) => {
            map.retain(|_, v| !(v.is_null() || v.as_str().is_some_and(str::is_empty)));
            Value::Object(map)
        }
        other => other,
    }
}
