//! Asynchronous fetch task with bounded retry.
//!
//! # Overview
//! A [`FetchTask`] fetches one URL off the caller's context, parses the body
//! as a JSON array or object, retries transient failures immediately up to
//! three attempts, and reports exactly one outcome to a [`ResultListener`].
//!
//! # Design
//! - [`FetchClient`] keeps the build/parse split: it validates a
//!   [`RequestDescriptor`] into an `HttpRequest` and interprets the
//!   `HttpResponse`. The network round-trip goes through the [`Transport`]
//!   trait so tests never need a socket.
//! - [`retry::fetch_with_retry`] is a plain bounded loop, run on tokio's
//!   blocking pool.
//! - [`FetchTask`] owns the lifecycle, the progress indicator and the
//!   cancellation token; callbacks fire on the context that drives it.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod listener;
pub mod retry;
pub mod task;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use client::FetchClient;
pub use config::{FetchConfig, MAX_ATTEMPTS};
pub use error::{FetchError, TransportError};
pub use http::{HttpRequest, HttpResponse, Transport};
pub use listener::{AlwaysActive, Connectivity, DeliveryTarget, ProgressIndicator, ResultListener};
pub use task::{FetchHandle, FetchTask, Lifecycle, TaskState};
pub use tokio_util::sync::CancellationToken;
pub use transport::UreqTransport;
pub use types::{FetchResult, Payload, RequestDescriptor, ResultShape};
