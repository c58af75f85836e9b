//! Client configuration, built explicitly or from the process environment.

use super::error::GeocodeError;
use super::types::AutocompleteErrorPolicy;
use std::time::Duration;

pub const API_KEY_ENV: &str = "LOCATIONIQ_API_KEY";
pub const BASE_URL_ENV: &str = "GEOCODER_BASE_URL";
pub const USER_AGENT_ENV: &str = "GEOCODER_USER_AGENT";
pub const TIMEOUT_ENV: &str = "GEOCODER_TIMEOUT_SECS";
pub const AUTOCOMPLETE_ERRORS_ENV: &str = "GEOCODER_AUTOCOMPLETE_ERRORS";

pub const DEFAULT_BASE_URL: &str = "https://api.locationiq.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn default_user_agent() -> String {
    format!("Geocoder/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings for [`GeocodingClient`](super::GeocodingClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub user_agent: String,
    /// Applied to the default transport.
    pub timeout: Duration,
    pub autocomplete_errors: AutocompleteErrorPolicy,
}

impl ClientConfig {
    /// Config with defaults for everything except the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
            autocomplete_errors: AutocompleteErrorPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_autocomplete_errors(mut self, policy: AutocompleteErrorPolicy) -> Self {
        self.autocomplete_errors = policy;
        self
    }

    /// Load from the process environment. Fails if the API key is absent.
    pub fn from_env() -> Result<Self, GeocodeError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup, so tests never touch process state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GeocodeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GeocodeError::Configuration(format!("{} is not set", API_KEY_ENV))
            })?;

        let mut config = Self::new(api_key);

        if let Some(base) = lookup(BASE_URL_ENV).filter(|s| !s.trim().is_empty()) {
            config.base_url = base;
        }
        if let Some(ua) = lookup(USER_AGENT_ENV).filter(|s| !s.trim().is_empty()) {
            config.user_agent = ua;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                GeocodeError::Configuration(format!("{} must be whole seconds, got '{}'", TIMEOUT_ENV, raw))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(AUTOCOMPLETE_ERRORS_ENV) {
            config.autocomplete_errors = raw.parse().map_err(GeocodeError::Configuration)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the key and base URL, and strip trailing slashes from the latter.
    pub fn validate(&mut self) -> Result<(), GeocodeError> {
        self.api_key = self.api_key.trim().to_string();
        if self.api_key.is_empty() {
            return Err(GeocodeError::Configuration(format!("{} is not set", API_KEY_ENV)));
        }

        let base = self.base_url.trim().trim_end_matches('/').to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(GeocodeError::Configuration(format!(
                "base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        self.base_url = base;

        if self.timeout.is_zero() {
            return Err(GeocodeError::Configuration("timeout must be greater than zero".into()));
        }
        Ok(())
    }
}
