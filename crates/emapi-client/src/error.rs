//! Error types for the Email Manager client

use crate::endpoint::SubApi;
use crate::transport::ChannelState;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("Response of {size} bytes exceeds the {limit} byte message limit")]
    MessageTooLarge { size: u64, limit: u64 },

    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    // SOAP errors
    #[error("SOAP fault {code}: {message}")]
    Fault { code: String, message: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Missing element: {element}")]
    MissingElement { element: String },

    #[error("MIME error: {reason}")]
    Mime { reason: String },

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    // Handle lifecycle errors
    #[error("{sub_api} channel is {state}")]
    ChannelClosed { sub_api: SubApi, state: ChannelState },

    #[error("{sub_api} channel was aborted")]
    ChannelAborted { sub_api: SubApi },

    #[error("{sub_api} channel did not drain within {timeout:?}")]
    CloseTimeout { sub_api: SubApi, timeout: Duration },

    #[error("Connection has been disposed")]
    Disposed,

    #[error("Failed to close {} channel(s): {}", .failures.len(), DisplayFailures(.failures))]
    DisposeFailed { failures: Vec<(SubApi, Error)> },

    // Lookup errors
    #[error("{count} {kind} entries match '{name}'")]
    AmbiguousMatch {
        kind: &'static str,
        name: String,
        count: usize,
    },

    // Export errors
    #[error("Failed to decompress export page: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("Export {export_id} failed on page {page} after {attempts} attempt(s): {source}")]
    ExportFailed {
        export_id: String,
        page: u32,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

struct DisplayFailures<'a>(&'a [(SubApi, Error)]);

impl fmt::Display for DisplayFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (sub_api, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{sub_api}: {err}")?;
        }
        Ok(())
    }
}

// Helper methods for common error construction
impl Error {
    /// Create an invalid response error
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a missing element error
    pub fn missing_element(element: impl Into<String>) -> Self {
        Self::MissingElement {
            element: element.into(),
        }
    }

    /// Create a MIME error
    pub fn mime(reason: impl Into<String>) -> Self {
        Self::Mime {
            reason: reason.into(),
        }
    }

    /// Create a SOAP fault error
    pub fn fault(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            key,
            reason: reason.into(),
        }
    }

    /// Check if the failure is transient and worth retrying
    ///
    /// Faults raised by the remote service, lookup ambiguity and lifecycle
    /// errors are terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Decompress(_) | Self::Io(_) | Self::CloseTimeout { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let err = Error::HttpStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        assert!(err.is_transient());

        let err = Error::HttpStatus {
            status: StatusCode::BAD_REQUEST,
            body: String::new(),
        };
        assert!(!err.is_transient());

        assert!(Error::Decompress(std::io::Error::other("corrupt deflate stream")).is_transient());
        assert!(!Error::fault("soap:Server", "Invalid token").is_transient());
        assert!(!Error::Disposed.is_transient());
    }

    #[test]
    fn test_dispose_failed_lists_each_channel() {
        let err = Error::DisposeFailed {
            failures: vec![
                (
                    SubApi::DmPlus,
                    Error::CloseTimeout {
                        sub_api: SubApi::DmPlus,
                        timeout: Duration::from_secs(600),
                    },
                ),
                (
                    SubApi::Reporting,
                    Error::ChannelAborted {
                        sub_api: SubApi::Reporting,
                    },
                ),
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("Failed to close 2 channel(s)"));
        assert!(message.contains("DMPlus: DMPlus channel did not drain"));
        assert!(message.contains("; Reporting: Reporting channel was aborted"));
    }

    #[test]
    fn test_ambiguous_match_message() {
        let err = Error::AmbiguousMatch {
            kind: "creative",
            name: "Welcome".to_string(),
            count: 2,
        };
        assert_eq!(err.to_string(), "2 creative entries match 'Welcome'");
    }
}
