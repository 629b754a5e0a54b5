//! Connection manager
//!
//! A [`Connection`] owns the base URL, access token and transport settings of
//! one session. Handles are created on first access, one per sub-API, and
//! live until the connection is disposed.

use crate::endpoint::SubApi;
use crate::lookup::Lookup;
use crate::soap::{SoapRequest, XmlElement};
use crate::transport::{
    Channel, ChannelState, HttpTransportFactory, SecurityMode, TlsVersion, TransportConfig,
    TransportFactory, tls,
};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use url::Url;

/// Open client channel for one sub-API
///
/// Cloning a handle shares the underlying channel.
#[derive(Clone)]
pub struct Handle {
    channel: Arc<dyn Channel>,
}

impl Handle {
    pub fn sub_api(&self) -> SubApi {
        self.channel.sub_api()
    }

    pub fn address(&self) -> &Url {
        self.channel.address()
    }

    pub fn config(&self) -> &TransportConfig {
        self.channel.config()
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Invoke one operation on the channel
    pub async fn call(&self, request: SoapRequest) -> Result<XmlElement> {
        self.channel.invoke(request).await
    }

    /// Whether both handles share one channel
    pub fn same_channel(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.channel), Arc::as_ptr(&other.channel))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("sub_api", &self.sub_api())
            .field("address", &self.address().as_str())
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for [`Connection`]
#[derive(Debug)]
pub struct ConnectionBuilder {
    token: String,
    base_url: String,
    keep_alive: bool,
    tls_version: Option<TlsVersion>,
    user_agent: Option<String>,
    factory: Option<Arc<dyn TransportFactory>>,
}

impl ConnectionBuilder {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: base_url.into(),
            keep_alive: false,
            tls_version: None,
            user_agent: None,
            factory: None,
        }
    }

    /// Keep connections to the service alive between calls
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Minimum TLS version for this connection's transports
    ///
    /// Defaults to the process-wide minimum.
    pub fn with_tls_version(mut self, version: TlsVersion) -> Self {
        self.tls_version = Some(version);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replace the transport factory
    pub fn with_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<Connection> {
        let base_url = Url::parse(&self.base_url)?;
        let security = SecurityMode::from_url(&base_url)?;

        let tls_version = if security.is_secure() {
            let defaults = tls::ensure_initialized();
            self.tls_version.unwrap_or(defaults.min_version)
        } else {
            self.tls_version.unwrap_or_default()
        };

        debug!(
            "Created connection to {} (security={:?}, tls={}, keep_alive={})",
            base_url, security, tls_version, self.keep_alive
        );

        Ok(Connection {
            base_url,
            token: self.token,
            security,
            tls_version,
            keep_alive: self.keep_alive,
            user_agent: self.user_agent,
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(HttpTransportFactory)),
            handles: std::array::from_fn(|_| Mutex::new(None)),
            disposed: AtomicBool::new(false),
        })
    }
}

/// Per-session owner of the access token and the handles created for it
pub struct Connection {
    base_url: Url,
    token: String,
    security: SecurityMode,
    tls_version: TlsVersion,
    keep_alive: bool,
    user_agent: Option<String>,
    factory: Arc<dyn TransportFactory>,
    /// One slot per sub-API, indexed by [`SubApi::index`]
    handles: [Mutex<Option<Handle>>; SubApi::COUNT],
    disposed: AtomicBool,
}

impl Connection {
    /// Connect with default settings
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        ConnectionBuilder::new(base_url, token).build()
    }

    pub fn builder(base_url: impl Into<String>, token: impl Into<String>) -> ConnectionBuilder {
        ConnectionBuilder::new(base_url, token)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn security(&self) -> SecurityMode {
        self.security
    }

    pub fn tls_version(&self) -> TlsVersion {
        self.tls_version
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether a handle exists for the sub-API
    pub fn is_instantiated(&self, sub_api: SubApi) -> bool {
        self.handles[sub_api.index()].lock().is_some()
    }

    /// Handle for a sub-API, created on first access
    ///
    /// Creation is guarded per sub-API, so first access to different
    /// sub-APIs never serializes. No network call is made here.
    pub fn handle(&self, sub_api: SubApi) -> Result<Handle> {
        let mut slot = self.handles[sub_api.index()].lock();
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        let spec = sub_api.spec();
        let address = Url::parse(&spec.url_for(self.base_url.as_str()))?;
        let config =
            TransportConfig::for_endpoint(spec, self.security, self.tls_version, self.keep_alive)
                .with_user_agent(self.user_agent.clone());

        let channel = self.factory.create(sub_api, address, config)?;
        debug!("Created {} handle for {}", sub_api, channel.address());

        let handle = Handle { channel };
        *slot = Some(handle.clone());
        Ok(handle)
    }

    pub fn authenticate(&self) -> Result<Handle> {
        self.handle(SubApi::Authenticate)
    }

    pub fn creative_builder(&self) -> Result<Handle> {
        self.handle(SubApi::CreativeBuilder)
    }

    pub fn dm_plus(&self) -> Result<Handle> {
        self.handle(SubApi::DmPlus)
    }

    pub fn em_service(&self) -> Result<Handle> {
        self.handle(SubApi::EmService)
    }

    pub fn list_import(&self) -> Result<Handle> {
        self.handle(SubApi::ListImport)
    }

    pub fn list_manager(&self) -> Result<Handle> {
        self.handle(SubApi::ListManager)
    }

    pub fn reporting(&self) -> Result<Handle> {
        self.handle(SubApi::Reporting)
    }

    pub fn send_message(&self) -> Result<Handle> {
        self.handle(SubApi::SendMessage)
    }

    /// Name based lookups over this connection
    pub fn lookup(&self) -> Lookup<'_> {
        Lookup::new(self)
    }

    /// Close every handle this connection created
    ///
    /// Each open handle gets a graceful close; a handle that fails to close is
    /// aborted and the remaining handles are still closed. All failures are
    /// reported together. Calling this again is a no-op.
    pub async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            debug!("Connection to {} already disposed", self.base_url);
            return Ok(());
        }

        let mut failures = Vec::new();
        for sub_api in SubApi::ALL {
            let Some(handle) = self.handles[sub_api.index()].lock().take() else {
                continue;
            };
            match handle.channel.close().await {
                Ok(()) => debug!("Disposed {} handle", sub_api),
                Err(e) => {
                    warn!("Failed to close {} handle, aborting: {}", sub_api, e);
                    handle.channel.abort();
                    failures.push((sub_api, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::DisposeFailed { failures })
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open: Vec<SubApi> = SubApi::ALL
            .into_iter()
            .filter(|s| self.is_instantiated(*s))
            .collect();
        f.debug_struct("Connection")
            .field("base_url", &self.base_url.as_str())
            .field("security", &self.security)
            .field("tls_version", &self.tls_version)
            .field("keep_alive", &self.keep_alive)
            .field("handles", &open)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for sub_api in SubApi::ALL {
            if let Some(handle) = self.handles[sub_api.index()].get_mut().take() {
                warn!(
                    "Connection dropped without dispose; aborting {} handle",
                    sub_api
                );
                handle.channel.abort();
            }
        }
    }
}
