//! Blocking `ureq` transport.

use tracing::trace;

use crate::config::FetchConfig;
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Production [`Transport`] backed by a `ureq` agent.
///
/// Non-2xx statuses come back as responses, not errors, so the client can
/// classify them.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(config: &FetchConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout())
            .build()
            .new_agent();
        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&FetchConfig::default())
    }
}

impl Transport for UreqTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .agent
            .get(&request.url)
            .header("user-agent", &self.user_agent);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let mut response = builder
            .call()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        // Undecodable bytes become U+FFFD; only a broken stream is an I/O error.
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        trace!(url = %request.url, status, bytes = body.len(), "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
