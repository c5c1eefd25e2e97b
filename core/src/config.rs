//! Client configuration.

use std::time::Duration;

use crate::error::ApiError;

/// Environment variable holding the API base URL.
pub const ENV_API_URL: &str = "NFHUB_API_URL";
/// Environment variable holding the transport timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "NFHUB_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Response bodies are read in full unless capped with `max_body_bytes`.
const DEFAULT_MAX_BODY_BYTES: u64 = u64::MAX;

/// Which statuses count as success when classifying a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Only `200..=299` is success.
    #[default]
    Strict,
    /// Every status is success; error bodies are handed back to the caller
    /// like any other response.
    AcceptAll,
}

impl StatusPolicy {
    pub fn is_success(self, status: u16) -> bool {
        match self {
            StatusPolicy::Strict => (200..=299).contains(&status),
            StatusPolicy::AcceptAll => true,
        }
    }
}

/// Configuration shared by `NfeClient` and `UreqTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// Response classification policy.
    pub status_policy: StatusPolicy,
    /// Global timeout applied by the transport to each call.
    pub timeout: Duration,
    /// Largest response body the transport will read.
    pub max_body_bytes: u64,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            status_policy: StatusPolicy::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Read `NFHUB_API_URL` and, optionally, `NFHUB_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ApiError> {
        let base_url = std::env::var(ENV_API_URL)
            .map_err(|_| ApiError::Config(format!("{ENV_API_URL} is not set")))?;
        let mut config = Self::new(&base_url);
        if let Ok(raw) = std::env::var(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                ApiError::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Set the status policy.
    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    /// Set the transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap the size of response bodies read by the transport.
    pub fn max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_stripped() {
        let config = ClientConfig::new("https://api.nfhub.test//");
        assert_eq!(config.base_url, "https://api.nfhub.test");
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("https://api.nfhub.test");
        assert_eq!(config.status_policy, StatusPolicy::Strict);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, u64::MAX);
    }

    #[test]
    fn builder_setters() {
        let config = ClientConfig::new("https://api.nfhub.test")
            .status_policy(StatusPolicy::AcceptAll)
            .timeout(Duration::from_secs(5))
            .max_body_bytes(1024);
        assert_eq!(config.status_policy, StatusPolicy::AcceptAll);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn environment_errors_are_config_errors() {
        std::env::remove_var(ENV_API_URL);
        let err = ClientConfig::from_env().unwrap_err();
        assert!(matches!(&err, ApiError::Config(m) if m.contains(ENV_API_URL)));
        assert_eq!(err.to_string(), format!("invalid configuration: {ENV_API_URL} is not set"));

        std::env::set_var(ENV_API_URL, "https://api.nfhub.test/");
        std::env::set_var(ENV_TIMEOUT_SECS, "soon");
        let err = ClientConfig::from_env().unwrap_err();
        assert!(matches!(&err, ApiError::Config(m) if m.contains(ENV_TIMEOUT_SECS)));

        std::env::set_var(ENV_TIMEOUT_SECS, " 12 ");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://api.nfhub.test");
        assert_eq!(config.timeout, Duration::from_secs(12));

        std::env::remove_var(ENV_API_URL);
        std::env::remove_var(ENV_TIMEOUT_SECS);
    }

    #[test]
    fn strict_policy_is_inclusive_range() {
        let policy = StatusPolicy::Strict;
        assert!(!policy.is_success(199));
        assert!(policy.is_success(200));
        assert!(policy.is_success(299));
        assert!(!policy.is_success(300));
        assert!(!policy.is_success(422));
    }

    #[test]
    fn accept_all_policy_accepts_errors() {
        assert!(StatusPolicy::AcceptAll.is_success(500));
        assert!(StatusPolicy::AcceptAll.is_success(404));
    }
}
