//! Typed clients for the sub-API operations used by this crate
//!
//! Each client pairs a [`Handle`](crate::Handle) with the connection's access
//! token. Operations not covered here stay reachable through
//! [`Handle::call`](crate::Handle::call).

pub mod authenticate;
pub mod creative_builder;
pub mod dm_plus;
pub mod list_import;
pub mod list_manager;
pub mod send_message;

pub use authenticate::{AuthenticateClient, LoginOutcome, LoginResult};
pub use creative_builder::{CreativeBuilderClient, CreativeTemplate, CreativeVariable};
pub use dm_plus::{
    Compression, DmPlusClient, EventColumn, EventColumnKind, ExportFilter, ExportFormat,
    FilterKind,
};
pub use list_import::{ImportStatus, ListImportClient};
pub use list_manager::{ListField, ListManagerClient};
pub use send_message::{Creative, SendMessageClient};

use crate::Result;
use crate::soap::XmlElement;
use chrono::NaiveDateTime;
use std::fmt::Display;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The `{Operation}Result` element of a response
pub(crate) fn result_of<'a>(response: &'a XmlElement, operation: &str) -> Option<&'a XmlElement> {
    let name = format!("{operation}Result");
    response
        .child(&name)
        .or_else(|| response.child_ignore_case(&name))
}

/// Parse every child of the result element, or nothing when it is absent
pub(crate) fn parse_list<T>(
    response: &XmlElement,
    operation: &str,
    parse: impl Fn(&XmlElement) -> Result<T>,
) -> Result<Vec<T>> {
    match result_of(response, operation) {
        Some(result) if !result.is_nil() => result.children.iter().map(parse).collect(),
        _ => Ok(Vec::new()),
    }
}

pub(crate) fn datetime(name: &str, value: NaiveDateTime) -> XmlElement {
    XmlElement::text(name, value.format(DATETIME_FORMAT))
}

pub(crate) fn int_array<T: Display + Copy>(name: &str, values: &[T]) -> XmlElement {
    XmlElement::list(name, "int", values.iter().copied())
}

/// Text of an optional child, empty when missing
pub(crate) fn text_of(element: &XmlElement, name: &str) -> String {
    element
        .child(name)
        .map(|c| c.text.trim().to_string())
        .unwrap_or_default()
}
