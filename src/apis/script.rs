use crate::core::client::SignedClient;
use crate::core::kernel::stream::{ChannelHandler, StreamEvent, StreamHandler};
use crate::core::types::StreamState;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Streaming script generation
///
/// The endpoint is chosen by the caller; chunks are raw decoded text (usually
/// event-stream records) and are interpreted by the handler.
#[derive(Debug, Clone)]
pub struct ScriptApi {
    client: SignedClient,
}

impl ScriptApi {
    pub fn new(client: SignedClient) -> Self {
        Self { client }
    }

    /// Stream into a callback handler, returning the terminal state
    pub async fn stream_script<H>(
        &self,
        endpoint: &str,
        params: Value,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> StreamState
    where
        H: StreamHandler + ?Sized,
    {
        self.client
            .open_stream(endpoint, params, handler, cancel)
            .await
    }

    /// Stream on a background task and hand back the events as a channel.
    ///
    /// The receiver yields chunks in order and ends after exactly one
    /// `Complete` or `Error` event.
    pub fn spawn_stream(
        &self,
        endpoint: impl Into<String>,
        params: Value,
        cancel: CancellationToken,
    ) -> (JoinHandle<StreamState>, mpsc::UnboundedReceiver<StreamEvent>) {
        let (mut handler, events) = ChannelHandler::new();
        let client = self.client.clone();
        let endpoint = endpoint.into();

        let task = tokio::spawn(async move {
            client
                .open_stream(&endpoint, params, &mut handler, &cancel)
                .await
        });

        (task, events)
    }
}
