//! Runtime configuration for Skymarshal.
//!
//! Mirrors `cloudllm::config::CloudLLMConfig`: a plain struct with a `Default` impl,
//! constructed manually or from environment variables. No TOML/YAML/config-rs
//! dependency is introduced.

use std::env;
use std::time::Duration;

/// Process-wide configuration for the orchestrator and its HTTP surface.
///
/// Users construct this manually, or via [`SkymarshalConfig::from_env`].
///
/// # Example
///
/// ```rust
/// use skymarshal::SkymarshalConfig;
///
/// let config = SkymarshalConfig::default();
/// assert_eq!(config.http_port, 8080);
/// ```
#[derive(Debug, Clone)]
pub struct SkymarshalConfig {
    /// Bind address for the HTTP surface (C8).
    pub http_host: String,
    /// Bind port for the HTTP surface (C8).
    pub http_port: u16,
    /// Timeout applied to safety-agent invocations by the safe-run wrapper (C5).
    pub safety_agent_timeout: Duration,
    /// Timeout applied to business-agent invocations by the safe-run wrapper (C5).
    pub business_agent_timeout: Duration,
    /// Timeout applied to the flight-info extractor (C3). Reuses the safety bound
    /// per spec.md §5.
    pub extractor_timeout: Duration,
    /// Maximum wall time a background orchestration job may run before the async
    /// surface marks the request as errored with `TIMEOUT` (C8).
    pub background_job_timeout: Duration,
    /// Time-to-live applied to newly created request records (C8).
    pub request_ttl: Duration,
    /// Time-to-live applied to newly appended session interactions (C8).
    pub session_ttl: Duration,
    /// Default number of interactions returned by a session history query (C8).
    pub session_history_limit: usize,
}

impl Default for SkymarshalConfig {
    /// Creates a config with the defaults named throughout spec.md: 60s/45s agent
    /// timeouts, a one-hour request TTL, a 30-day session TTL, and a 50-item
    /// session history page.
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            safety_agent_timeout: Duration::from_secs(60),
            business_agent_timeout: Duration::from_secs(45),
            extractor_timeout: Duration::from_secs(60),
            background_job_timeout: Duration::from_secs(600),
            request_ttl: Duration::from_secs(3600),
            session_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            session_history_limit: 50,
        }
    }
}

impl SkymarshalConfig {
    /// Builds a config from environment variables, falling back to
    /// [`SkymarshalConfig::default`] for anything unset or unparseable.
    ///
    /// Recognized variables: `SKYMARSHAL_HTTP_HOST`, `SKYMARSHAL_HTTP_PORT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = env::var("SKYMARSHAL_HTTP_HOST") {
            config.http_host = host;
        }
        if let Ok(port) = env::var("SKYMARSHAL_HTTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.http_port = port;
            } else {
                log::warn!("SKYMARSHAL_HTTP_PORT={:?} is not a valid port, using default", port);
            }
        }
        config
    }
}
