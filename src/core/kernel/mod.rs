//! Signing and transport kernel of the request pipeline
//!
//! The kernel turns a parameter tree into a signed envelope, moves it over
//! HTTP, and turns what comes back into a typed outcome.
//!
//! # Components
//!
//! ## Signing
//! - `canonicalize`: parameter tree to sorted `path=value` entries
//! - `Signer`: digest over the joined entries (`DigestSigner` for MD5,
//!   `Sha256Signer`, `HmacSigner`)
//! - `EnvelopeBuilder`: metadata, session identifiers and signature
//!
//! ## Transport
//! - `Transport`: buffered `post` and streaming `open_stream`
//! - `ReqwestTransport`: reqwest implementation with per-request timeout
//!
//! ## Outcomes
//! - `ResponseClassifier`: success / business error / session expired
//! - `StreamReader`: incremental UTF-8 decoding with cancellation
//!
//! # Example
//!
//! ```rust,no_run
//! use signwire::core::kernel::*;
//! use signwire::core::config::SignatureScope;
//! use signwire::core::device::StaticDeviceId;
//! use signwire::core::session::AnonymousSession;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), signwire::PipelineError> {
//! let builder = EnvelopeBuilder::new(
//!     "web",
//!     SignatureScope::Envelope,
//!     Arc::new(DigestSigner::new()),
//!     Arc::new(AnonymousSession),
//!     Arc::new(StaticDeviceId::new("device-1")),
//! );
//! let envelope = builder.build(json!({"phone": "13800000000"})).await?;
//!
//! let transport = ReqwestTransport::new(TransportConfig::new("https://api.example.com"))?;
//! let raw = transport.post("/api/user/send-code", &envelope).await?;
//! println!("status {}", raw.status);
//! # Ok(())
//! # }
//! ```
pub mod canonical;
pub mod classify;
pub mod envelope;
pub mod rest;
pub mod signer;
pub mod stream;

// Re-export key types for convenience
pub use canonical::{canonical_string, canonicalize};
pub use classify::ResponseClassifier;
pub use envelope::{strip_empty_fields, EnvelopeBuilder};
pub use rest::{ByteStream, ReqwestTransport, Transport, TransportBuilder, TransportConfig};
pub use signer::{DigestSigner, HmacSigner, Sha256Signer, Signer};
pub use stream::{ChannelHandler, StreamEvent, StreamHandler, StreamReader, Utf8Decoder};
