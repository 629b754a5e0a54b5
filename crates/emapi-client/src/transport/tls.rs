//! Process-wide TLS defaults
//!
//! Secure connections share one set of process defaults: the rustls crypto
//! provider, the default minimum protocol version and whether request
//! bodies are sent with `Expect: 100-continue`. They are installed exactly
//! once, either explicitly through [`initialize`] at startup or implicitly
//! the first time a secure connection is built.

use super::TlsVersion;
use std::sync::OnceLock;
use tracing::debug;

static PROCESS_TLS: OnceLock<TlsDefaults> = OnceLock::new();

/// TLS defaults shared by every secure connection in the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsDefaults {
    /// Minimum protocol version used when a connection does not pick one
    pub min_version: TlsVersion,
    /// Send `Expect: 100-continue` with request bodies
    pub expect_continue: bool,
}

impl Default for TlsDefaults {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls12,
            expect_continue: true,
        }
    }
}

impl TlsDefaults {
    pub fn with_min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = version;
        self
    }

    pub fn with_expect_continue(mut self, enabled: bool) -> Self {
        self.expect_continue = enabled;
        self
    }
}

/// Install the process TLS defaults
///
/// Returns whether the defaults were installed (true) or had already been
/// installed (false). Later calls never change the installed values.
pub fn initialize(defaults: TlsDefaults) -> bool {
    let mut installed = false;
    PROCESS_TLS.get_or_init(|| {
        install_crypto_provider();
        installed = true;
        defaults
    });

    if installed {
        debug!(
            "Installed process TLS defaults: min_version={}, expect_continue={}",
            defaults.min_version, defaults.expect_continue
        );
    } else {
        debug!("Process TLS defaults already installed");
    }
    installed
}

/// Install the default TLS settings if nothing was installed yet
pub fn ensure_initialized() -> TlsDefaults {
    *PROCESS_TLS.get_or_init(|| {
        debug!("Installing default process TLS settings");
        install_crypto_provider();
        TlsDefaults::default()
    })
}

/// Installed defaults, if any
pub fn process_defaults() -> Option<TlsDefaults> {
    PROCESS_TLS.get().copied()
}

/// Whether request bodies carry `Expect: 100-continue`
///
/// Only set once secure mode was selected somewhere in the process.
pub(crate) fn expect_continue() -> bool {
    process_defaults().is_some_and(|d| d.expect_continue)
}

fn install_crypto_provider() {
    // Another component may already have installed a provider
    let _ = rustls::crypto::ring::default_provider().install_default();
}
