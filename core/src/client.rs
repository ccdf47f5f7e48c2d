//! Single-attempt request builder and response parser.
//!
//! # Design
//! `FetchClient` splits one attempt into `build_request` (validate the
//! descriptor, produce an `HttpRequest`) and `parse_response` (check the
//! status, dispatch on the expected shape). `fetch_once` glues the two
//! around a transport call. It holds no per-attempt state; retrying is
//! [`crate::retry`]'s job.

use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::{FetchError, TransportError};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::{FetchResult, Payload, RequestDescriptor, ResultShape};

/// Performs one fetch attempt through a [`Transport`].
#[derive(Debug, Clone)]
pub struct FetchClient<T> {
    transport: T,
}

impl<T: Transport> FetchClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validate `descriptor` and produce the GET to send. Never touches the
    /// network; every error here is a configuration error.
    pub fn build_request(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest, FetchError> {
        let raw = descriptor.url().ok_or(FetchError::MissingUrl)?;
        let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }
        if descriptor.shape() == ResultShape::Unknown {
            return Err(FetchError::UnsupportedShape(descriptor.shape()));
        }

        Ok(HttpRequest {
            url: url.into(),
            headers: vec![("accept".to_string(), "application/json".to_string())],
        })
    }

    /// Interpret a response according to the descriptor's shape.
    pub fn parse_response(
        &self,
        descriptor: &RequestDescriptor,
        response: HttpResponse,
    ) -> Result<FetchResult, FetchError> {
        check_status(descriptor, &response)?;
        let payload = match descriptor.shape() {
            ResultShape::Array => Payload::Array(serde_json::from_str::<Vec<Value>>(&response.body)?),
            ResultShape::Object => {
                Payload::Object(serde_json::from_str::<Map<String, Value>>(&response.body)?)
            }
            ResultShape::Unknown => return Err(FetchError::UnsupportedShape(ResultShape::Unknown)),
        };
        Ok(FetchResult {
            payload,
            parameters: descriptor.echoed_parameters(),
        })
    }

    /// Build, send, parse. One transport call at most.
    pub fn fetch_once(&self, descriptor: &RequestDescriptor) -> Result<FetchResult, FetchError> {
        let request = self.build_request(descriptor)?;
        debug!(url = %request.url, shape = ?descriptor.shape(), "sending request");
        let response = self.transport.get(&request)?;
        self.parse_response(descriptor, response)
    }
}

/// Non-2xx answers are transport failures, not parse failures: the upstream
/// answers 404 for resources that exist a moment later.
fn check_status(descriptor: &RequestDescriptor, response: &HttpResponse) -> Result<(), TransportError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    if response.status == 404 {
        return Err(TransportError::NotFound {
            url: descriptor.url().unwrap_or_default().to_string(),
        });
    }
    Err(TransportError::Status {
        status: response.status,
        body: response.body.clone(),
    })
}
