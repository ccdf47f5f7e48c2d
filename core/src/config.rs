//! Task and transport configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Total attempts (not retries) before a transiently failing fetch gives up.
///
/// Two is not always enough for the laundry backend's spurious 404s.
pub const MAX_ATTEMPTS: u32 = 3;

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> Option<u64> {
    Some(30)
}

fn default_user_agent() -> String {
    format!("fetch-core/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings shared by a `FetchTask` and its default transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Show the progress indicator while a fetch runs (default: true)
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Whole-request timeout in seconds; `None` waits forever (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            show_progress: default_true(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `FETCH_SHOW_PROGRESS`, `FETCH_TIMEOUT_SECS`
    /// (`0` disables the timeout) and `FETCH_USER_AGENT`. Unparseable
    /// values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(show) = lookup("FETCH_SHOW_PROGRESS").and_then(|v| v.parse().ok()) {
            config.show_progress = show;
        }
        if let Some(secs) = lookup("FETCH_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            config.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(agent) = lookup("FETCH_USER_AGENT").filter(|v| !v.is_empty()) {
            config.user_agent = agent;
        }
        config
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
