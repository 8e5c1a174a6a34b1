mod common;

use common::{harness, harness_with, settle, test_config};
use serde::Deserialize;
use serde_json::{json, Value};
use signwire::core::kernel::{canonicalize, DigestSigner, HmacSigner, Signer, StreamHandler};
use signwire::core::notify::SERVICE_UNAVAILABLE_MESSAGE;
use signwire::core::session::{SessionContext, SessionSnapshot, SessionWriter};
use signwire::{Envelope, PipelineError, RawResponse, SignatureScope, StreamState};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Recorder {
    chunks: Vec<String>,
    completions: usize,
    errors: Vec<PipelineError>,
}

impl StreamHandler for Recorder {
    fn on_chunk(&mut self, chunk: String) {
        self.chunks.push(chunk);
    }

    fn on_complete(&mut self) {
        self.completions += 1;
    }

    fn on_error(&mut self, error: PipelineError) {
        self.errors.push(error);
    }
}

fn envelope_entries(envelope: &Envelope) -> Vec<String> {
    let mut value = serde_json::to_value(envelope).unwrap();
    value.as_object_mut().unwrap().remove("sign");
    canonicalize(&value)
}

#[cfg(test)]
mod buffered_calls {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Profile {
        id: i64,
        name: String,
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_typed_result() {
        let h = harness();
        h.transport.reply_ok(json!({"id": 7, "name": "ann"}));

        let profile: Profile = h
            .client
            .send("/api/user/info", json!({"id": 7}))
            .await
            .unwrap();

        assert_eq!(
            profile,
            Profile {
                id: 7,
                name: "ann".into()
            }
        );
        settle().await;
        assert!(h.notifications.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_200_without_success_flag_is_success() {
        let h = harness();
        h.transport.reply(Ok(RawResponse::new(
            200,
            r#"{"code":200,"result":[1,2,3]}"#,
        )));

        let value = h.client.send_value("/api/list", json!({})).await.unwrap();
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expired_clears_store_without_notification() {
        let h = harness();
        h.session.set_token("tok".into());
        h.session.set_client_info("cid".into(), "trace".into());
        h.transport.reply_code(10001, "login expired");

        let err = h
            .client
            .send_value("/api/user/info", json!({}))
            .await
            .unwrap_err();

        assert!(err.is_session_expired());
        assert!(!h.session.is_logged_in());
        assert_eq!(h.session.snapshot(), SessionSnapshot::default());
        settle().await;
        assert!(h.notifications.delivered().is_empty());

        // the next call goes out anonymous
        h.transport.reply_ok(json!(null));
        h.client.send_value("/api/ping", json!({})).await.unwrap();
        let (_, envelope) = h.transport.sent().pop().unwrap();
        assert!(envelope.token.is_none());
        assert_eq!(envelope.client_id, "device-test");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_code_is_not_notified() {
        let h = harness();
        h.transport.reply_code(10002, "already done");

        let err = h.client.send_value("/api/x", json!({})).await.unwrap_err();

        assert_eq!(err.code(), Some(10002));
        settle().await;
        assert!(h.notifications.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_business_error_burst_notifies_once_with_last_message() {
        let h = harness();
        for i in 0..4 {
            h.transport.reply_code(20001 + i, &format!("failure {}", i));
        }

        for _ in 0..4 {
            let err = h.client.send_value("/api/x", json!({})).await.unwrap_err();
            assert!(matches!(err, PipelineError::Business { .. }));
        }

        settle().await;
        assert_eq!(h.notifications.delivered(), vec!["failure 3".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_outside_window_notify_separately() {
        let h = harness();
        h.transport.reply_code(20001, "first");
        h.transport.reply_code(20001, "second");

        let _ = h.client.send_value("/api/x", json!({})).await;
        settle().await;
        let _ = h.client.send_value("/api/x", json!({})).await;
        settle().await;

        assert_eq!(
            h.notifications.delivered(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_drops_pending_notification() {
        let h = harness();
        h.transport.reply_code(20001, "dropped");

        let _ = h.client.send_value("/api/x", json!({})).await;
        assert_eq!(h.client.notifier().pending().as_deref(), Some("dropped"));
        h.client.notifier().reset();

        settle().await;
        assert!(h.notifications.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_notifies_generic_message() {
        let h = harness();
        h.transport
            .reply(Err(PipelineError::Timeout(Duration::from_secs(15))));

        let err = h.client.send_value("/api/x", json!({})).await.unwrap_err();

        assert!(matches!(err, PipelineError::Timeout(_)));
        settle().await;
        assert_eq!(
            h.notifications.delivered(),
            vec![SERVICE_UNAVAILABLE_MESSAGE.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_error_with_envelope_body_is_classified() {
        let h = harness();
        h.session.set_token("tok".into());
        h.transport.reply(Ok(RawResponse::new(
            401,
            r#"{"success":false,"errorCode":"10001","errorMessages":"expired"}"#,
        )));

        let err = h.client.send_value("/api/x", json!({})).await.unwrap_err();

        assert!(err.is_session_expired());
        assert!(!h.session.is_logged_in());
    }

    #[tokio::test(start_paused = true)]
    async fn test_typed_result_mismatch_is_deserialization_error() {
        let h = harness();
        h.transport.reply_ok(json!({"unexpected": true}));

        let err = h
            .client
            .send::<Profile>("/api/user/info", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Deserialization(_)));
    }
}

#[cfg(test)]
mod envelopes {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_envelope_contents() {
        let h = harness();
        h.transport.reply_ok(json!({}));

        h.client
            .send_value("/api/news/list", json!({"limit": 5, "category": ""}))
            .await
            .unwrap();

        let (endpoint, envelope) = h.transport.sent().pop().unwrap();
        assert_eq!(endpoint, "/api/news/list");
        assert_eq!(envelope.platform, "web");
        assert_eq!(envelope.client_id, "device-test");
        assert_eq!(envelope.parameter, json!({"limit": 5}));
        assert!(envelope.token.is_none());

        let wire = serde_json::to_value(&envelope).unwrap();
        assert!(wire.get("token").is_none());
        assert!(wire.get("traceId").is_none());
        assert!(wire.get("reqTime").is_some());
    }

    #[tokio::test]
    async fn test_envelope_scope_signature_covers_session_fields() {
        let h = harness();
        h.session.set_token("tok".into());
        h.session.set_client_info("server-cid".into(), "trace-1".into());
        h.transport.reply_ok(json!({}));

        h.client
            .send_value("/api/x", json!({"b": [1, {"c": true}], "a": "x"}))
            .await
            .unwrap();

        let (_, envelope) = h.transport.sent().pop().unwrap();
        let entries = envelope_entries(&envelope);
        assert!(entries.contains(&"token=tok".to_string()));
        assert!(entries.contains(&"traceId=trace-1".to_string()));
        assert!(entries.contains(&"clientId=server-cid".to_string()));
        assert!(entries.contains(&"parameter.b.1.c=true".to_string()));
        assert_eq!(envelope.sign, DigestSigner::new().sign(&entries).unwrap());
    }

    #[tokio::test]
    async fn test_parameter_scope_with_secret() {
        let h = harness_with(
            test_config()
                .signature_scope(SignatureScope::Parameters)
                .sign_secret("s3cret"),
        );
        h.transport.reply_ok(json!({}));
        h.transport.reply_ok(json!({}));

        h.client
            .send_value("/api/x", json!({"b": 2, "a": 1}))
            .await
            .unwrap();
        h.client
            .send_value("/api/x", json!({"a": 1, "b": 2}))
            .await
            .unwrap();

        let sent = h.transport.sent();
        let expected = HmacSigner::new("s3cret".into())
            .sign(&["a=1".to_string(), "b=2".to_string()])
            .unwrap();
        assert_eq!(sent[0].1.sign, expected);
        assert_eq!(sent[1].1.sign, expected);
        assert_ne!(sent[0].1.request_id, sent[1].1.request_id);
    }

    #[tokio::test]
    async fn test_each_attempt_gets_fresh_request_id() {
        let h = harness();
        for _ in 0..3 {
            h.transport.reply_ok(Value::Null);
            h.client.send_value("/api/x", json!({})).await.unwrap();
        }
        let mut ids: Vec<String> = h
            .transport
            .sent()
            .into_iter()
            .map(|(_, e)| e.request_id)
            .collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}

#[cfg(test)]
mod streaming {
    use super::*;
    use bytes::Bytes;
    use signwire::apis::ScriptApi;
    use signwire::core::kernel::StreamEvent;

    #[tokio::test(start_paused = true)]
    async fn test_three_chunks_then_complete() {
        let h = harness();
        h.transport
            .stream_parts(&["data: one\n\n", "data: two\n\n", "data: three\n\n"]);
        let mut recorder = Recorder::default();

        let state = h
            .client
            .open_stream(
                "/api/script/generate",
                json!({"topic": "rust"}),
                &mut recorder,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(state, StreamState::Completed);
        assert_eq!(recorder.chunks.len(), 3);
        assert_eq!(recorder.chunks[2], "data: three\n\n");
        assert_eq!(recorder.completions, 1);
        assert!(recorder.errors.is_empty());
        settle().await;
        assert!(h.notifications.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_stream_is_silent() {
        let h = harness();
        let tx = h.transport.stream_channel();
        let cancel = CancellationToken::new();

        let (task, mut events) = ScriptApi::new(h.client.clone()).spawn_stream(
            "/api/script/generate",
            json!({}),
            cancel.clone(),
        );

        tx.send(Ok(Bytes::from_static(b"first"))).unwrap();
        assert!(matches!(events.recv().await, Some(StreamEvent::Chunk(ref c)) if c == "first"));

        cancel.cancel();
        let state = task.await.unwrap();
        let _ = tx.send(Ok(Bytes::from_static(b"late")));

        assert_eq!(state, StreamState::Cancelled);
        assert!(matches!(
            events.recv().await,
            Some(StreamEvent::Error(PipelineError::Cancelled))
        ));
        assert!(events.recv().await.is_none());
        settle().await;
        assert!(h.notifications.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_reports_error_once() {
        let h = harness();
        h.transport.stream_fail(PipelineError::Http {
            status: 503,
            message: "unavailable".into(),
        });
        let mut recorder = Recorder::default();

        let state = h
            .client
            .open_stream("/api/s", json!({}), &mut recorder, &CancellationToken::new())
            .await;

        assert_eq!(state, StreamState::Failed);
        assert_eq!(recorder.errors.len(), 1);
        assert_eq!(recorder.completions, 0);
        assert!(recorder.chunks.is_empty());
        settle().await;
        assert_eq!(
            h.notifications.delivered(),
            vec![SERVICE_UNAVAILABLE_MESSAGE.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_after_chunks() {
        let h = harness();
        let tx = h.transport.stream_channel();
        tx.send(Ok(Bytes::from_static(b"partial"))).unwrap();
        tx.send(Err(PipelineError::Transport("reset".into()))).unwrap();
        let mut recorder = Recorder::default();

        let state = h
            .client
            .open_stream("/api/s", json!({}), &mut recorder, &CancellationToken::new())
            .await;

        assert_eq!(state, StreamState::Failed);
        assert_eq!(recorder.chunks, vec!["partial".to_string()]);
        assert_eq!(recorder.errors.len(), 1);
        assert_eq!(recorder.completions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_envelope_is_signed_like_buffered_calls() {
        let h = harness();
        h.transport.stream_parts(&["ok"]);
        let mut recorder = Recorder::default();

        h.client
            .open_stream("/api/s", json!({"q": 1}), &mut recorder, &CancellationToken::new())
            .await;

        let (_, envelope) = h.transport.sent().pop().unwrap();
        assert_eq!(
            envelope.sign,
            DigestSigner::new().sign(&envelope_entries(&envelope)).unwrap()
        );
    }
}
