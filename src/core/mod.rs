pub mod client;
pub mod config;
pub mod device;
pub mod errors;
pub mod kernel;
pub mod notify;
pub mod session;
pub mod types;
