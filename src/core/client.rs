use crate::core::config::ClientConfig;
use crate::core::device::{DeviceIdProvider, FileDeviceId};
use crate::core::errors::PipelineError;
use crate::core::kernel::classify::ResponseClassifier;
use crate::core::kernel::envelope::EnvelopeBuilder;
use crate::core::kernel::rest::{ReqwestTransport, Transport, TransportConfig};
use crate::core::kernel::signer::{DigestSigner, HmacSigner, Signer};
use crate::core::kernel::stream::{StreamHandler, StreamReader};
use crate::core::notify::{DebouncedNotifier, LogNotifier, Notifier};
use crate::core::session::{AnonymousSession, SessionContext, SessionInvalidator};
use crate::core::types::StreamState;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Builder for creating signed clients
///
/// Every collaborator defaults to something usable: anonymous session,
/// in-memory device id, log-only notifications, and a reqwest transport
/// pointed at `config.base_url`.
pub struct SignedClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    signer: Option<Arc<dyn Signer>>,
    session: Option<Arc<dyn SessionContext>>,
    invalidator: Option<Arc<dyn SessionInvalidator>>,
    device: Option<Arc<dyn DeviceIdProvider>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl SignedClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            signer: None,
            session: None,
            invalidator: None,
            device: None,
            notifier: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Override the signer derived from the config
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_session(mut self, session: Arc<dyn SessionContext>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn SessionInvalidator>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    /// Use one store as both token provider and invalidation sink
    pub fn with_session_store<S>(self, store: Arc<S>) -> Self
    where
        S: SessionContext + SessionInvalidator + 'static,
    {
        self.with_session(store.clone()).with_invalidator(store)
    }

    pub fn with_device_id(mut self, device: Arc<dyn DeviceIdProvider>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<SignedClient, PipelineError> {
        let config = self.config;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                TransportConfig::new(config.base_url.clone())
                    .with_timeout(config.timeout)
                    .with_user_agent(config.user_agent.clone()),
            )?),
        };

        let signer: Arc<dyn Signer> = match (self.signer, config.sign_secret_str()) {
            (Some(signer), _) => signer,
            (None, Some(secret)) if !secret.is_empty() => {
                Arc::new(HmacSigner::new(secret.to_string()))
            }
            (None, _) => Arc::new(DigestSigner::new()),
        };

        let device: Arc<dyn DeviceIdProvider> = match (self.device, &config.device_id_path) {
            (Some(device), _) => device,
            (None, Some(path)) => Arc::new(FileDeviceId::new(path.clone())),
            (None, None) => Arc::new(FileDeviceId::ephemeral()),
        };

        let session = self
            .session
            .unwrap_or_else(|| Arc::new(AnonymousSession));
        let invalidator = self
            .invalidator
            .unwrap_or_else(|| Arc::new(AnonymousSession));
        let notifier = DebouncedNotifier::new(
            self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            config.debounce_window,
        );

        let envelopes = EnvelopeBuilder::new(
            config.platform.clone(),
            config.signature_scope,
            signer,
            session,
            device,
        );
        let classifier = ResponseClassifier::new(
            config.session_expired_code,
            config.silent_code,
            invalidator,
            notifier,
        );

        Ok(SignedClient {
            inner: Arc::new(ClientInner {
                config,
                envelopes,
                classifier,
                transport,
            }),
        })
    }
}

struct ClientInner {
    config: ClientConfig,
    envelopes: EnvelopeBuilder,
    classifier: ResponseClassifier,
    transport: Arc<dyn Transport>,
}

/// Entry point of the pipeline: signs, sends and classifies calls.
///
/// Cheap to clone; clones share transport, notifier and collaborators.
/// Concurrent calls share no mutable per-call state.
#[derive(Clone)]
pub struct SignedClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for SignedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedClient")
            .field("config", &self.inner.config)
            .field("envelopes", &self.inner.envelopes)
            .field("classifier", &self.inner.classifier)
            .finish_non_exhaustive()
    }
}

impl SignedClient {
    pub fn builder(config: ClientConfig) -> SignedClientBuilder {
        SignedClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The shared notifier, exposed so hosts and tests can reset it
    pub fn notifier(&self) -> &DebouncedNotifier {
        self.inner.classifier.notifier()
    }

    /// Buffered call returning the raw `result` payload
    #[instrument(skip(self, params), fields(endpoint = %endpoint))]
    pub async fn send_value(&self, endpoint: &str, params: Value) -> Result<Value, PipelineError> {
        let envelope = self.inner.envelopes.build(params).await?;

        let raw = match self.inner.transport.post(endpoint, &envelope).await {
            Ok(raw) => raw,
            Err(e) if e.is_transport() => return Err(self.inner.classifier.transport_failure(e)),
            Err(e) => return Err(e),
        };

        self.inner.classifier.classify_raw(raw)
    }

    /// Buffered call with the `result` payload deserialized into `T`
    pub async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Value,
    ) -> Result<T, PipelineError> {
        let value = self.send_value(endpoint, params).await?;
        serde_json::from_value(value).map_err(|e| {
            PipelineError::Deserialization(format!("Failed to deserialize result: {}", e))
        })
    }

    /// Streaming call: decoded text chunks go to `handler` until the body
    /// ends, fails, or `cancel` fires.
    ///
    /// Exactly one of `on_complete` / `on_error` is invoked. Failures other
    /// than cancellation also raise a debounced notification.
    #[instrument(skip(self, params, handler, cancel), fields(endpoint = %endpoint))]
    pub async fn open_stream<H>(
        &self,
        endpoint: &str,
        params: Value,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> StreamState
    where
        H: StreamHandler + ?Sized,
    {
        let mut reader = StreamReader::new();
        reader.connecting();

        let envelope = match self.inner.envelopes.build(params).await {
            Ok(envelope) => envelope,
            Err(e) => return self.fail_stream(&mut reader, e, handler),
        };

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PipelineError::Cancelled),
            opened = self.inner.transport.open_stream(endpoint, &envelope) => opened,
        };

        let body = match opened {
            Ok(body) => body,
            Err(e) => return self.fail_stream(&mut reader, e, handler),
        };

        let mut forward = ForwardFailures {
            handler,
            client: self,
        };
        reader.run(body, &mut forward, cancel).await
    }

    fn fail_stream<H: StreamHandler + ?Sized>(
        &self,
        reader: &mut StreamReader,
        error: PipelineError,
        handler: &mut H,
    ) -> StreamState {
        self.inner.classifier.stream_failure(&error);
        reader.abort(error, handler)
    }
}

/// Wraps the caller's handler so read failures also reach the notifier.
struct ForwardFailures<'a, H: StreamHandler + ?Sized> {
    handler: &'a mut H,
    client: &'a SignedClient,
}

impl<H: StreamHandler + ?Sized> StreamHandler for ForwardFailures<'_, H> {
    fn on_chunk(&mut self, chunk: String) {
        self.handler.on_chunk(chunk);
    }

    fn on_complete(&mut self) {
        self.handler.on_complete();
    }

    fn on_error(&mut self, error: PipelineError) {
        self.client.inner.classifier.stream_failure(&error);
        self.handler.on_error(error);
    }
}
