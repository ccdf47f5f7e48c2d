//! HTTP transport seam.
//!
//! # Design
//! Requests and responses are plain owned data. The core decides what to
//! request and how to read the answer; a `Transport` performs the actual
//! round-trip. Tests substitute scripted transports, production code uses
//! [`crate::transport::UreqTransport`].
//!
//! A transport only reports what the network did. It must hand back non-2xx
//! answers as `HttpResponse` values so status interpretation stays in
//! [`crate::client`].

use std::sync::Arc;

use crate::error::TransportError;

/// A GET request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// A response with its body already decoded as UTF-8 text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Executes a single blocking GET.
///
/// Called from a background worker, never from the caller's context.
pub trait Transport: Send + Sync {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).get(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).get(request)
    }
}
