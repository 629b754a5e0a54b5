//! Environment driven client configuration

use crate::connection::ConnectionBuilder;
use crate::export::ExportRetryPolicy;
use crate::transport::TlsVersion;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Account base URL, e.g. `https://nasa.e.alterian.net`
    pub endpoint: String,

    /// Keep connections alive between calls
    pub keep_alive: bool,

    /// Minimum TLS version; the process default applies when unset
    pub tls_version: Option<TlsVersion>,

    pub user_agent: Option<String>,

    /// Retry policy of the export pipeline
    pub export_retry: ExportRetryPolicy,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            keep_alive: false,
            tls_version: None,
            user_agent: None,
            export_retry: ExportRetryPolicy::default(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// `EMAPI_ENDPOINT` is required. `EMAPI_KEEP_ALIVE`, `EMAPI_TLS_VERSION`,
    /// `EMAPI_USER_AGENT`, `EMAPI_EXPORT_MAX_ATTEMPTS` and
    /// `EMAPI_EXPORT_BACKOFF_MS` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup("EMAPI_ENDPOINT")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::config("EMAPI_ENDPOINT", "not set"))?;

        let keep_alive = match lookup("EMAPI_KEEP_ALIVE") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| Error::config("EMAPI_KEEP_ALIVE", format!("'{value}' is not a boolean")))?,
            None => false,
        };

        let tls_version = lookup("EMAPI_TLS_VERSION")
            .map(|value| value.parse::<TlsVersion>())
            .transpose()
            .map_err(|reason| Error::config("EMAPI_TLS_VERSION", reason))?;

        let export_retry = ExportRetryPolicy::from_lookup(&lookup);

        Ok(Self {
            endpoint: endpoint.trim().to_string(),
            keep_alive,
            tls_version,
            user_agent: lookup("EMAPI_USER_AGENT").filter(|s| !s.is_empty()),
            export_retry,
        })
    }

    /// Connection builder for a token
    pub fn connection_builder(&self, token: impl Into<String>) -> ConnectionBuilder {
        let mut builder =
            ConnectionBuilder::new(self.endpoint.clone(), token).with_keep_alive(self.keep_alive);
        if let Some(version) = self.tls_version {
            builder = builder.with_tls_version(version);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.with_user_agent(user_agent.clone());
        }
        builder
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_endpoint_is_required() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[])),
            Err(Error::Config { key: "EMAPI_ENDPOINT", .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let config =
            ClientConfig::from_lookup(lookup(&[("EMAPI_ENDPOINT", "https://nasa.e.alterian.net")]))
                .unwrap();
        assert_eq!(config, ClientConfig::new("https://nasa.e.alterian.net"));
    }

    #[test]
    fn test_all_variables() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("EMAPI_ENDPOINT", " http://localhost:8080 "),
            ("EMAPI_KEEP_ALIVE", "yes"),
            ("EMAPI_TLS_VERSION", "1.3"),
            ("EMAPI_USER_AGENT", "emapi/0.1"),
            ("EMAPI_EXPORT_MAX_ATTEMPTS", "3"),
            ("EMAPI_EXPORT_BACKOFF_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "http://localhost:8080");
        assert!(config.keep_alive);
        assert_eq!(config.tls_version, Some(TlsVersion::Tls13));
        assert_eq!(config.user_agent.as_deref(), Some("emapi/0.1"));
        assert_eq!(config.export_retry.max_attempts, 3);
        assert_eq!(config.export_retry.backoff_unit, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values() {
        let err = ClientConfig::from_lookup(lookup(&[
            ("EMAPI_ENDPOINT", "http://localhost"),
            ("EMAPI_KEEP_ALIVE", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config { key: "EMAPI_KEEP_ALIVE", .. }));

        let err = ClientConfig::from_lookup(lookup(&[
            ("EMAPI_ENDPOINT", "http://localhost"),
            ("EMAPI_TLS_VERSION", "1.0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config { key: "EMAPI_TLS_VERSION", .. }));
    }

    #[test]
    fn test_connection_builder() {
        let mut config = ClientConfig::new("http://localhost:8080");
        config.keep_alive = true;
        let connection = config.connection_builder("token").build().unwrap();
        assert!(connection.keep_alive());
        assert_eq!(connection.token(), "token");
    }
}
