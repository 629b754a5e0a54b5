//! Client for the Email Manager SOAP web services
//!
//! The service is split into independently addressed sub-APIs
//! (authentication, creatives, lists, sending, reporting, bulk import and
//! export). This crate provides:
//!
//! - A [`Connection`] that turns a base URL and access token into lazily
//!   created, per sub-API channels with the right timeouts and encoding
//! - A SOAP 1.1 codec with MTOM support
//! - Typed clients for authentication, lookups and list import
//! - A paginated, retrying [`ExportPipeline`] for event log exports
//!
//! # Example
//!
//! ```no_run
//! use emapi_client::services::AuthenticateClient;
//! use emapi_client::{Connection, ExportPipeline, ExportRequest, FileSink};
//! use emapi_client::services::DmPlusClient;
//! use chrono::{Duration, Local};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let login = Connection::new("https://nasa.e.alterian.net", "")?;
//! let outcome = AuthenticateClient::new(&login)?.login("user", "secret").await?;
//! login.dispose().await?;
//!
//! let token = outcome.token().ok_or("login failed")?;
//! let connection = Connection::new("https://nasa.e.alterian.net", token)?;
//!
//! let now = Local::now().naive_local();
//! let request = ExportRequest::new(now - Duration::days(30), now, 5000);
//! let mut sink = FileSink::new("Export.csv");
//! let report = ExportPipeline::new(DmPlusClient::new(&connection)?)
//!     .run(&request, &mut sink)
//!     .await?;
//! println!("Wrote {} page(s)", report.pages_written);
//!
//! connection.dispose().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod export;
pub mod lookup;
pub mod services;
pub mod soap;
pub mod transport;

pub use config::ClientConfig;
pub use connection::{Connection, ConnectionBuilder, Handle};
pub use endpoint::{EndpointSpec, MessageEncoding, SubApi};
pub use error::{Error, Result};
pub use export::{
    ExportPipeline, ExportReport, ExportRequest, ExportRetryPolicy, ExportService, ExportSink,
    ExportState, ExportTicket, FileSink, MemorySink, decompress,
};
pub use lookup::Lookup;
pub use transport::{
    Channel, ChannelState, SecurityMode, TlsVersion, TransportConfig, TransportFactory,
};
