//! # relayq-client
//!
//! The submit-by-name [`Client`] and the pull-based [`AsyncResult`]
//! handle it hands back for result retrieval.

pub mod async_result;
pub mod client;
pub mod error;

pub use async_result::AsyncResult;
pub use client::Client;
pub use error::{ClientError, ClientResult};
