//! Transport layer: per sub-API channel configuration and open channels

mod factory;
mod http;
pub mod tls;

pub use factory::{HttpTransportFactory, TransportFactory, build_http_client};
pub use http::HttpChannel;

use crate::endpoint::{EndpointSpec, MessageEncoding, SubApi};
use crate::soap::{SoapRequest, XmlElement};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Security mode, selected by the base URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityMode {
    /// Plain HTTP
    None,
    /// HTTPS; TLS is required
    Transport,
}

impl SecurityMode {
    pub fn from_url(url: &Url) -> Result<Self> {
        match url.scheme() {
            "https" => Ok(Self::Transport),
            "http" => Ok(Self::None),
            other => Err(Error::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }

    pub const fn is_secure(self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// Minimum TLS protocol version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TlsVersion {
    #[default]
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl TlsVersion {
    pub const fn as_reqwest(self) -> reqwest::tls::Version {
        match self {
            Self::Tls12 => reqwest::tls::Version::TLS_1_2,
            Self::Tls13 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls12 => f.write_str("1.2"),
            Self::Tls13 => f.write_str("1.3"),
        }
    }
}

impl FromStr for TlsVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1.2" | "tls1.2" | "tls12" => Ok(Self::Tls12),
            "1.3" | "tls1.3" | "tls13" => Ok(Self::Tls13),
            other => Err(format!("unknown TLS version '{other}'")),
        }
    }
}

/// State of an open channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Opened,
    Closing,
    Closed,
    Aborted,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opened => "opened",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Transport configuration for exactly one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub receive_timeout: Duration,
    pub send_timeout: Duration,
    pub encoding: MessageEncoding,
    pub security: SecurityMode,
    pub tls_version: TlsVersion,
    pub keep_alive: bool,
    /// Largest accepted response body in bytes
    pub max_message_size: u64,
    pub user_agent: Option<String>,
}

impl TransportConfig {
    /// Assemble the configuration for one endpoint
    pub fn for_endpoint(
        spec: &EndpointSpec,
        security: SecurityMode,
        tls_version: TlsVersion,
        keep_alive: bool,
    ) -> Self {
        Self {
            receive_timeout: spec.receive_timeout(),
            send_timeout: spec.send_timeout(),
            encoding: spec.encoding,
            security,
            tls_version,
            keep_alive,
            max_message_size: u64::MAX,
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_max_message_size(mut self, max: u64) -> Self {
        self.max_message_size = max;
        self
    }

    pub const fn requires_tls(&self) -> bool {
        self.security.is_secure()
    }
}

/// An open RPC channel bound to one endpoint
#[async_trait]
pub trait Channel: Send + Sync + fmt::Debug {
    fn sub_api(&self) -> SubApi;

    fn address(&self) -> &Url;

    fn config(&self) -> &TransportConfig;

    fn state(&self) -> ChannelState;

    /// Send one request and return the decoded response element
    async fn invoke(&self, request: SoapRequest) -> Result<XmlElement>;

    /// Stop accepting calls and wait for in-flight calls to finish
    async fn close(&self) -> Result<()>;

    /// Cancel in-flight calls and release the channel immediately
    fn abort(&self);
}
