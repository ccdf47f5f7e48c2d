//! Bounded, immediate retry of a fetch.
//!
//! The upstream laundry API spuriously answers "not found" and recovers
//! within milliseconds, so transient failures are retried straight away,
//! without backoff, up to [`MAX_ATTEMPTS`] total attempts. Anything that is
//! not a transport failure ends the loop on the spot.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::FetchClient;
use crate::config::MAX_ATTEMPTS;
use crate::error::FetchError;
use crate::http::Transport;
use crate::listener::Connectivity;
use crate::types::{FetchResult, RequestDescriptor};

/// Run attempts until one succeeds, a non-transient error occurs, or the
/// attempt ceiling is reached. Blocking; call from a background worker.
///
/// Before every attempt the cancellation token and connectivity are checked
/// again. A cancellation that arrives while a request is in flight is only
/// noticed once that request returns.
pub fn fetch_with_retry<T: Transport>(
    client: &FetchClient<T>,
    descriptor: &RequestDescriptor,
    connectivity: &dyn Connectivity,
    cancel: &CancellationToken,
) -> Result<FetchResult, FetchError> {
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            debug!(attempts, "fetch cancelled before next attempt");
            return Err(FetchError::Cancelled);
        }
        if !connectivity.is_online() {
            debug!(attempts, "device offline, not attempting fetch");
            return Err(FetchError::Offline);
        }

        match client.fetch_once(descriptor) {
            Ok(result) => {
                if attempts > 0 {
                    info!(attempts = attempts + 1, "fetch succeeded after retry");
                }
                return Ok(result);
            }
            Err(FetchError::Transport(e)) => {
                attempts += 1;
                if attempts >= MAX_ATTEMPTS {
                    error!(error = %e, attempts, "fetch failed, attempts exhausted");
                    return Err(FetchError::RetriesExhausted { attempts, source: e });
                }
                warn!(
                    error = %e,
                    attempt = attempts,
                    max_attempts = MAX_ATTEMPTS,
                    "fetch failed, retrying"
                );
            }
            Err(e) => {
                error!(error = %e, "fetch failed permanently");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::test_helpers::{Answer, Scripted};
    use crate::types::ResultShape;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn rooms() -> RequestDescriptor {
        RequestDescriptor::new("http://localhost:3000/rooms?location=Yale", ResultShape::Array)
    }

    fn online() -> bool {
        true
    }

    #[test]
    fn gives_up_after_three_attempts() {
        let client = FetchClient::new(Scripted::new(&[Answer::IoError]));
        let err = fetch_with_retry(&client, &rooms(), &online, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(client.transport().calls(), 3);
    }

    #[test]
    fn recovers_on_third_attempt_with_its_body() {
        let client = FetchClient::new(Scripted::new(&[
            Answer::Status(404),
            Answer::IoError,
            Answer::Body(r#"["third"]"#),
        ]));
        let result = fetch_with_retry(&client, &rooms(), &online, &CancellationToken::new()).unwrap();
        assert_eq!(result.payload.as_array().unwrap()[0], "third");
        assert_eq!(client.transport().calls(), 3);
    }

    #[test]
    fn offline_makes_no_transport_call() {
        let client = FetchClient::new(Scripted::new(&[Answer::Body("[]")]));
        let err = fetch_with_retry(&client, &rooms(), &|| false, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, FetchError::Offline));
        assert_eq!(client.transport().calls(), 0);
    }

    #[test]
    fn connectivity_is_rechecked_before_each_retry() {
        let checks = AtomicUsize::new(0);
        let connectivity = || checks.fetch_add(1, Ordering::SeqCst) == 0;
        let client = FetchClient::new(Scripted::new(&[Answer::Status(404), Answer::Body("[]")]));
        let err = fetch_with_retry(&client, &rooms(), &connectivity, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, FetchError::Offline));
        assert_eq!(client.transport().calls(), 1);
        assert_eq!(checks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn malformed_body_is_not_retried() {
        let client = FetchClient::new(Scripted::new(&[Answer::Body("{not json")]));
        let err = fetch_with_retry(&client, &rooms(), &online, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, FetchError::MalformedBody(_)));
        assert_eq!(client.transport().calls(), 1);
    }

    #[test]
    fn configuration_errors_are_not_retried() {
        let client = FetchClient::new(Scripted::new(&[Answer::Body("[]")]));
        for desc in [
            RequestDescriptor::without_url(ResultShape::Array),
            RequestDescriptor::new("no scheme here", ResultShape::Array),
            RequestDescriptor::new("http://localhost:3000/rooms", ResultShape::Unknown),
        ] {
            let err = fetch_with_retry(&client, &desc, &online, &CancellationToken::new()).unwrap_err();
            assert!(!err.is_transient(), "{err}");
        }
        assert_eq!(client.transport().calls(), 0);
    }

    #[test]
    fn cancellation_is_noticed_between_attempts() {
        struct CancelsOnFirstCall<'a> {
            inner: Scripted,
            cancel: &'a CancellationToken,
            fired: AtomicBool,
        }

        impl Transport for CancelsOnFirstCall<'_> {
            fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
                if !self.fired.swap(true, Ordering::SeqCst) {
                    self.cancel.cancel();
                }
                self.inner.get(request)
            }
        }

        let cancel = CancellationToken::new();
        let client = FetchClient::new(CancelsOnFirstCall {
            inner: Scripted::new(&[Answer::Status(404)]),
            cancel: &cancel,
            fired: AtomicBool::new(false),
        });
        let err = fetch_with_retry(&client, &rooms(), &online, &cancel).unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
        assert_eq!(client.transport().inner.calls(), 1);
    }
}
