//! Transport factory
//!
//! Assembles the HTTP client for one channel from its [`TransportConfig`].
//! No retry logic lives here.

use super::http::HttpChannel;
use super::{Channel, TransportConfig};
use crate::Result;
use crate::endpoint::SubApi;
use reqwest::Client;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const TCP_KEEPALIVE_SECS: u64 = 60;

/// Produces open channels for the connection manager
pub trait TransportFactory: Send + Sync + Debug {
    fn create(
        &self,
        sub_api: SubApi,
        address: Url,
        config: TransportConfig,
    ) -> Result<Arc<dyn Channel>>;
}

/// Factory producing HTTP channels
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn create(
        &self,
        sub_api: SubApi,
        address: Url,
        config: TransportConfig,
    ) -> Result<Arc<dyn Channel>> {
        let client = build_http_client(&config)?;
        Ok(Arc::new(HttpChannel::new(sub_api, address, config, client)))
    }
}

/// Build the HTTP client for one channel
///
/// The connect timeout is the send timeout; the overall request timeout
/// covers sending and receiving.
pub fn build_http_client(config: &TransportConfig) -> Result<Client> {
    debug!(
        "Creating HTTP client: security={:?}, keep_alive={}, send={:?}, receive={:?}",
        config.security, config.keep_alive, config.send_timeout, config.receive_timeout
    );

    let mut builder = Client::builder()
        .connect_timeout(config.send_timeout)
        .timeout(config.send_timeout + config.receive_timeout)
        .use_rustls_tls();

    if config.requires_tls() {
        builder = builder
            .https_only(true)
            .min_tls_version(config.tls_version.as_reqwest());
    }

    if config.keep_alive {
        builder = builder
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE_SECS));
    } else {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        builder = builder.pool_max_idle_per_host(0).default_headers(headers);
    }

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.as_str());
    }

    Ok(builder.build()?)
}
