use serde::{Deserialize, Serialize};

use crate::transport::Endpoint;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:1848";
pub const ENV_BASE_URL: &str = "CKMAILER_BASE_URL";
pub const ENV_FAILURE_POLICY: &str = "CKMAILER_FAILURE_POLICY";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("base url must not be empty")]
    EmptyBaseUrl,
    #[error("base url must use http:// or https:// and include a host")]
    InvalidBaseUrl,
    #[error("unknown failure policy `{0}` (expected restore or legacy)")]
    UnknownFailurePolicy(String),
}

/// What a failed request does to the control that issued it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Roll the control back, re-enable it and show an error in its label.
    #[default]
    Restore,
    /// Leave everything exactly as it was when the request went out.
    Legacy,
}

impl FailurePolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restore => "restore",
            Self::Legacy => "legacy",
        }
    }

    #[must_use]
    pub fn restores(self) -> bool {
        matches!(self, Self::Restore)
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "restore" | "rollback" => Ok(Self::Restore),
            "legacy" | "compat" => Ok(Self::Legacy),
            other => Err(ConfigError::UnknownFailurePolicy(other.to_string())),
        }
    }
}

/// Label strings written by the flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusText {
    pub subscribed: String,
    pub unsubscribed: String,
    pub unsubscribe_done: String,
    pub change_failed: String,
    pub unsubscribe_failed: String,
}

impl Default for StatusText {
    fn default() -> Self {
        Self {
            subscribed: "Ingeschreven!".to_string(),
            unsubscribed: "Afgemeld!".to_string(),
            unsubscribe_done: "Unsubscribed!".to_string(),
            change_failed: "Wijziging mislukt!".to_string(),
            unsubscribe_failed: "Unsubscribe failed!".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// `None` keeps endpoint paths page-relative, as in the browser.
    pub base_url: Option<String>,
    pub failure_policy: FailurePolicy,
    pub status_text: StatusText,
}

impl WidgetConfig {
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.base_url = Some(normalize_base_url(raw)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Base url and failure policy from the environment, with the source of
    /// each value for startup logging.
    pub fn from_env() -> Result<(Self, ConfigSources), ConfigError> {
        let (base_url, base_url_source) = resolve_base_url()?;
        let (failure_policy, failure_policy_source) = resolve_failure_policy();
        Ok((
            Self {
                base_url: Some(base_url),
                failure_policy,
                status_text: StatusText::default(),
            },
            ConfigSources {
                base_url: base_url_source,
                failure_policy: failure_policy_source,
            },
        ))
    }

    /// Re-normalizes a base url that arrived through deserialization.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        if let Some(raw) = self.base_url.take() {
            self.base_url = Some(normalize_base_url(&raw)?);
        }
        Ok(self)
    }

    #[must_use]
    pub fn endpoint_url(&self, endpoint: &Endpoint) -> String {
        match &self.base_url {
            Some(base_url) => format!("{base_url}/{}", endpoint.path()),
            None => endpoint.path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    pub base_url: String,
    pub failure_policy: String,
}

pub fn resolve_base_url() -> Result<(String, String), ConfigError> {
    if let Some(base_url) = env_non_empty(ENV_BASE_URL) {
        return normalize_base_url(&base_url).map(|normalized| (normalized, ENV_BASE_URL.to_string()));
    }
    normalize_base_url(DEFAULT_BASE_URL).map(|normalized| (normalized, "default_local".to_string()))
}

#[must_use]
pub fn resolve_failure_policy() -> (FailurePolicy, String) {
    let Some(raw) = env_non_empty(ENV_FAILURE_POLICY) else {
        return (FailurePolicy::default(), "default".to_string());
    };
    match raw.parse::<FailurePolicy>() {
        Ok(policy) => (policy, ENV_FAILURE_POLICY.to_string()),
        Err(_) => (
            FailurePolicy::default(),
            format!(
                "{ENV_FAILURE_POLICY}:invalid({raw})->{}",
                FailurePolicy::default().as_str()
            ),
        ),
    }
}

pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl);
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(ConfigError::InvalidBaseUrl);
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(ConfigError::InvalidBaseUrl);
    }
    Ok(trimmed.to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn with_env<T>(base_url: Option<&str>, policy: Option<&str>, test: impl FnOnce() -> T) -> T {
        let lock = ENV_LOCK.get_or_init(|| Mutex::new(()));
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let previous_base = std::env::var(ENV_BASE_URL).ok();
        let previous_policy = std::env::var(ENV_FAILURE_POLICY).ok();
        set_or_remove(ENV_BASE_URL, base_url);
        set_or_remove(ENV_FAILURE_POLICY, policy);

        let result = test();

        set_or_remove(ENV_BASE_URL, previous_base.as_deref());
        set_or_remove(ENV_FAILURE_POLICY, previous_policy.as_deref());
        result
    }

    fn set_or_remove(key: &str, value: Option<&str>) {
        match value {
            Some(value) => unsafe { std::env::set_var(key, value) },
            None => unsafe { std::env::remove_var(key) },
        }
    }

    #[test]
    fn normalize_base_url_trims_and_drops_trailing_slash() {
        let normalized = normalize_base_url(" https://berthub.eu/ckmailer/ ").expect("valid base url");
        assert_eq!(normalized, "https://berthub.eu/ckmailer");
    }

    #[test]
    fn normalize_base_url_requires_http_scheme() {
        assert_eq!(normalize_base_url("berthub.eu"), Err(ConfigError::InvalidBaseUrl));
        assert_eq!(normalize_base_url("https:///path"), Err(ConfigError::InvalidBaseUrl));
        assert_eq!(normalize_base_url("  "), Err(ConfigError::EmptyBaseUrl));
    }

    #[test]
    fn endpoint_urls_are_relative_without_base() {
        let config = WidgetConfig::default();
        assert_eq!(
            config.endpoint_url(&Endpoint::ChangeSubscription),
            "change-subscription"
        );

        let config = config.with_base_url("http://localhost:1848/").expect("valid base url");
        assert_eq!(
            config.endpoint_url(&Endpoint::Unsubscribe {
                user_id: "u1".to_string(),
                channel_id: "c1".to_string(),
            }),
            "http://localhost:1848/unsubscribe/u1/c1"
        );
    }

    #[test]
    fn failure_policy_parses_aliases() {
        assert_eq!("Restore".parse::<FailurePolicy>(), Ok(FailurePolicy::Restore));
        assert_eq!(" legacy ".parse::<FailurePolicy>(), Ok(FailurePolicy::Legacy));
        assert_eq!("compat".parse::<FailurePolicy>(), Ok(FailurePolicy::Legacy));
        assert!(matches!(
            "sometimes".parse::<FailurePolicy>(),
            Err(ConfigError::UnknownFailurePolicy(_))
        ));
    }

    #[test]
    fn from_env_defaults_local() {
        with_env(None, None, || {
            let (config, sources) = WidgetConfig::from_env().expect("default config");
            assert_eq!(config.base_url.as_deref(), Some(DEFAULT_BASE_URL));
            assert_eq!(config.failure_policy, FailurePolicy::Restore);
            assert_eq!(sources.base_url, "default_local");
            assert_eq!(sources.failure_policy, "default");
        });
    }

    #[test]
    fn from_env_prefers_env_values() {
        with_env(Some("https://mail.example.org/"), Some("legacy"), || {
            let (config, sources) = WidgetConfig::from_env().expect("env config");
            assert_eq!(config.base_url.as_deref(), Some("https://mail.example.org"));
            assert_eq!(config.failure_policy, FailurePolicy::Legacy);
            assert_eq!(sources.base_url, ENV_BASE_URL);
            assert_eq!(sources.failure_policy, ENV_FAILURE_POLICY);
        });
    }

    #[test]
    fn invalid_policy_falls_back_and_records_source() {
        with_env(None, Some("whenever"), || {
            let (policy, source) = resolve_failure_policy();
            assert_eq!(policy, FailurePolicy::Restore);
            assert_eq!(source, "CKMAILER_FAILURE_POLICY:invalid(whenever)->restore");
        });
    }

    #[test]
    fn status_text_defaults_match_page_strings() {
        let text = StatusText::default();
        assert_eq!(text.subscribed, "Ingeschreven!");
        assert_eq!(text.unsubscribed, "Afgemeld!");
        assert_eq!(text.unsubscribe_done, "Unsubscribed!");
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: WidgetConfig =
            serde_json::from_str(r#"{"failure_policy":"legacy","status_text":{"subscribed":"Subscribed!"}}"#)
                .expect("partial config");
        assert_eq!(config.failure_policy, FailurePolicy::Legacy);
        assert_eq!(config.status_text.subscribed, "Subscribed!");
        assert_eq!(config.status_text.unsubscribed, "Afgemeld!");
        assert_eq!(config.base_url, None);
    }
}
