// src/lib.rs
// Truckin relay - chat front door that routes free text to stdio tool calls

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod catalog;
pub mod channel;
pub mod codec;
pub mod config;
pub mod correlator;
pub mod error;
pub mod http;
pub mod llm;
pub mod protocol;
pub mod proxy;
pub mod router;

pub use error::{ProxyError, Result};
pub use proxy::ToolProxy;
