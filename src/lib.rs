pub mod apis;
pub mod core;

pub use core::{
    client::{SignedClient, SignedClientBuilder},
    config::{ClientConfig, SignatureScope},
    errors::PipelineError,
    types::*,
};
