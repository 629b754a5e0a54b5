//! Sub-API endpoint definitions
//!
//! Every Email Manager sub-API lives under the account's base URL at a fixed
//! suffix and carries its own timeout and message encoding requirements.

use std::fmt;
use std::time::Duration;

/// Message encoding used on the wire for a sub-API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageEncoding {
    /// Plain SOAP 1.1 text envelopes
    Text,
    /// MTOM: multipart/related envelopes with binary attachments
    Mtom,
}

/// Static description of one sub-API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSpec {
    /// Service name, used in log lines and errors
    pub name: &'static str,
    /// Path appended to the base URL
    pub suffix: &'static str,
    /// XML namespace of the service contract
    pub namespace: &'static str,
    /// Receive timeout in minutes
    pub receive_timeout_mins: u64,
    /// Send timeout in minutes
    pub send_timeout_mins: u64,
    /// Wire encoding
    pub encoding: MessageEncoding,
}

impl EndpointSpec {
    /// Receive timeout as a duration
    pub const fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_mins * 60)
    }

    /// Send timeout as a duration
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_mins * 60)
    }

    /// Full endpoint URL for a base URL
    ///
    /// Trailing slashes on the base URL are ignored.
    pub fn url_for(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.suffix)
    }

    /// SOAPAction header value for an operation
    pub fn soap_action(&self, operation: &str) -> String {
        if self.namespace.ends_with('/') {
            format!("{}{}", self.namespace, operation)
        } else {
            format!("{}/{}", self.namespace, operation)
        }
    }
}

/// Sub-APIs exposed by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubApi {
    Authenticate,
    CreativeBuilder,
    DmPlus,
    EmService,
    ListImport,
    ListManager,
    Reporting,
    SendMessage,
}

impl SubApi {
    /// Number of sub-APIs
    pub const COUNT: usize = 8;

    /// All sub-APIs, in disposal order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Authenticate,
        Self::CreativeBuilder,
        Self::DmPlus,
        Self::EmService,
        Self::ListImport,
        Self::ListManager,
        Self::Reporting,
        Self::SendMessage,
    ];

    /// Position of this sub-API in [`SubApi::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Endpoint specification for this sub-API
    pub const fn spec(self) -> &'static EndpointSpec {
        match self {
            Self::Authenticate => &AUTHENTICATE,
            Self::CreativeBuilder => &CREATIVE_BUILDER,
            Self::DmPlus => &DM_PLUS,
            Self::EmService => &EM_SERVICE,
            Self::ListImport => &LIST_IMPORT,
            Self::ListManager => &LIST_MANAGER,
            Self::Reporting => &REPORTING,
            Self::SendMessage => &SEND_MESSAGE,
        }
    }
}

impl fmt::Display for SubApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

pub const AUTHENTICATE: EndpointSpec = EndpointSpec {
    name: "Authenticate",
    suffix: "/authenticate.asmx",
    namespace: "http://ws.alterian.com/DMAuthenticate/",
    receive_timeout_mins: 5,
    send_timeout_mins: 5,
    encoding: MessageEncoding::Text,
};

pub const CREATIVE_BUILDER: EndpointSpec = EndpointSpec {
    name: "CreativeBuilder",
    suffix: "/creativebuilder.asmx",
    namespace: "http://ws.alterian.com/DMCreativeBuilder/",
    receive_timeout_mins: 10,
    send_timeout_mins: 3,
    encoding: MessageEncoding::Text,
};

pub const LIST_IMPORT: EndpointSpec = EndpointSpec {
    name: "ListImport",
    suffix: "/ListImport.asmx",
    namespace: "http://ws.alterian.com/DMListImport/",
    receive_timeout_mins: 30,
    send_timeout_mins: 10,
    encoding: MessageEncoding::Text,
};

pub const LIST_MANAGER: EndpointSpec = EndpointSpec {
    name: "ListManager",
    suffix: "/listmanager.asmx",
    namespace: "http://ws.alterian.com/DMListManager/",
    receive_timeout_mins: 30,
    send_timeout_mins: 10,
    encoding: MessageEncoding::Text,
};

pub const REPORTING: EndpointSpec = EndpointSpec {
    name: "Reporting",
    suffix: "/reporting.asmx",
    namespace: "http://ws.alterian.com/DMReporting/",
    receive_timeout_mins: 30,
    send_timeout_mins: 10,
    encoding: MessageEncoding::Text,
};

pub const SEND_MESSAGE: EndpointSpec = EndpointSpec {
    name: "SendMessage",
    suffix: "/sendmessage.asmx",
    namespace: "http://ws.alterian.com/DMSendMessage/",
    receive_timeout_mins: 10,
    send_timeout_mins: 10,
    encoding: MessageEncoding::Text,
};

pub const EM_SERVICE: EndpointSpec = EndpointSpec {
    name: "EM",
    suffix: "/EM.svc/soap",
    namespace: "http://ws.alterian.com/EM/",
    receive_timeout_mins: 10,
    send_timeout_mins: 3,
    encoding: MessageEncoding::Mtom,
};

pub const DM_PLUS: EndpointSpec = EndpointSpec {
    name: "DMPlus",
    suffix: "/DMPlus.svc",
    namespace: "http://ws.alterian.com/DMPlus/",
    receive_timeout_mins: 30,
    send_timeout_mins: 10,
    encoding: MessageEncoding::Mtom,
};
