//! DMPlus sub-API: event log export

use super::{datetime, int_array, result_of};
use crate::connection::{Connection, Handle};
use crate::export::{ExportRequest, ExportService, ExportTicket};
use crate::soap::{SoapRequest, XmlElement};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// What an export filter matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    IncludeEvents,
    ExcludeEvents,
    IncludeDeployments,
    ExcludeDeployments,
}

impl FilterKind {
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::IncludeEvents => "DMEF_INCLUDE_EVENTS",
            Self::ExcludeEvents => "DMEF_EXCLUDE_EVENTS",
            Self::IncludeDeployments => "DMEF_INCLUDE_DEPLOYMENTS",
            Self::ExcludeDeployments => "DMEF_EXCLUDE_DEPLOYMENTS",
        }
    }
}

/// Inclusion or exclusion filter over event types or deployment ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFilter {
    pub kind: FilterKind,
    pub values: Vec<i32>,
}

impl ExportFilter {
    pub fn new(kind: FilterKind, values: impl Into<Vec<i32>>) -> Self {
        Self {
            kind,
            values: values.into(),
        }
    }

    /// Parse a comma-separated id list such as `"1,2,54,55,56"`
    pub fn parse(ids: &str, kind: FilterKind) -> Result<Self> {
        let values = ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                i32::from_str(s).map_err(|e| {
                    Error::config("export filter", format!("invalid id '{s}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { kind, values })
    }

    fn to_element(&self) -> XmlElement {
        XmlElement::new("DMEventExportFilter")
            .with_child(XmlElement::text("FilterType", self.kind.as_wire()))
            .with_child(int_array("Values", &self.values))
    }
}

/// Report column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventColumnKind {
    EventId,
    EventTime,
    EventName,
    DeploymentId,
    /// Value of a list field for the recipient
    FieldValue,
}

impl EventColumnKind {
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::EventId => "DMEC_EVENT_ID",
            Self::EventTime => "DMEC_EVENT_TIME",
            Self::EventName => "DMEC_EVENT_NAME",
            Self::DeploymentId => "DMEC_DEPLOYMENT_ID",
            Self::FieldValue => "DMEC_FIELD_VALUE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventColumn {
    pub kind: EventColumnKind,
    #[serde(default)]
    pub field_id: i32,
    #[serde(default)]
    pub list_id: i32,
}

impl EventColumn {
    pub const fn new(kind: EventColumnKind) -> Self {
        Self {
            kind,
            field_id: 0,
            list_id: 0,
        }
    }

    /// Column holding a list field value
    pub const fn field_value(field_id: i32, list_id: i32) -> Self {
        Self {
            kind: EventColumnKind::FieldValue,
            field_id,
            list_id,
        }
    }

    /// Event id, time, name and deployment id
    pub fn standard() -> Vec<Self> {
        vec![
            Self::new(EventColumnKind::EventId),
            Self::new(EventColumnKind::EventTime),
            Self::new(EventColumnKind::EventName),
            Self::new(EventColumnKind::DeploymentId),
        ]
    }

    fn to_element(self) -> XmlElement {
        XmlElement::new("DMEventColumn")
            .with_child(XmlElement::text("ColumnType", self.kind.as_wire()))
            .with_child(XmlElement::text("FieldID", self.field_id))
            .with_child(XmlElement::text("ListID", self.list_id))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    #[default]
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("DMDF_CSV"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    Gzip,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gzip => f.write_str("CM_GZIP"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DmPlusClient {
    handle: Handle,
    token: String,
}

impl DmPlusClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        Ok(Self {
            handle: connection.dm_plus()?,
            token: connection.token().to_string(),
        })
    }

    fn filters(request: &ExportRequest) -> XmlElement {
        XmlElement::new("filters").with_children(request.filters.iter().map(ExportFilter::to_element))
    }

    pub async fn create_export_by_date(&self, request: &ExportRequest) -> Result<ExportTicket> {
        let call = SoapRequest::new("CreateExportByDate")
            .arg("token", &self.token)
            .arg("pageSize", request.page_size)
            .param(datetime("startDate", request.start))
            .param(datetime("endDate", request.end))
            .param(Self::filters(request));

        let response = self.handle.call(call).await?;
        let result = result_of(&response, "CreateExportByDate")
            .ok_or_else(|| Error::missing_element("CreateExportByDateResponse/CreateExportByDateResult"))?;

        let ticket = if result.children.is_empty() {
            // Id returned directly, count as an out parameter
            ExportTicket {
                export_id: result.text.trim().to_string(),
                approximate_count: response
                    .child_ignore_case("approxCount")
                    .and_then(|c| c.parse_text().ok())
                    .unwrap_or(0),
            }
        } else {
            ExportTicket {
                export_id: result
                    .child_ignore_case("ExportID")
                    .map(|c| c.text.trim().to_string())
                    .ok_or_else(|| Error::missing_element("CreateExportByDateResult/ExportID"))?,
                approximate_count: result
                    .child_ignore_case("ApproximateCount")
                    .or_else(|| result.child_ignore_case("Count"))
                    .and_then(|c| c.parse_text().ok())
                    .unwrap_or(0),
            }
        };

        if ticket.export_id.is_empty() {
            return Err(Error::invalid_response("export id is empty"));
        }
        debug!(
            "Created export {} (~{} records)",
            ticket.export_id, ticket.approximate_count
        );
        Ok(ticket)
    }

    /// Fetch one page of compressed export data
    pub async fn export_eventlog_data_by_page(
        &self,
        export_id: &str,
        page: u32,
        request: &ExportRequest,
    ) -> Result<Bytes> {
        let call = SoapRequest::new("ExportEventlogDataByPage")
            .arg("token", &self.token)
            .arg("exportID", export_id)
            .arg("pageNumber", page)
            .param(datetime("startDate", request.start))
            .param(datetime("endDate", request.end))
            .param(Self::filters(request))
            .param(
                XmlElement::new("columns")
                    .with_children(request.columns.iter().map(|c| c.to_element())),
            )
            .arg("format", request.format)
            .arg("compression", request.compression);

        let response = self.handle.call(call).await?;
        let data = match result_of(&response, "ExportEventlogDataByPage") {
            Some(result) if !result.is_nil() => result.bytes()?,
            _ => Bytes::new(),
        };
        trace!("Export {} page {}: {} compressed bytes", export_id, page, data.len());
        Ok(data)
    }

    pub async fn delete_export(&self, export_id: &str) -> Result<()> {
        let call = SoapRequest::new("DeleteExport")
            .arg("token", &self.token)
            .arg("exportID", export_id);
        self.handle.call(call).await?;
        debug!("Deleted export {}", export_id);
        Ok(())
    }
}

#[async_trait]
impl ExportService for DmPlusClient {
    async fn create_export(&self, request: &ExportRequest) -> Result<ExportTicket> {
        self.create_export_by_date(request).await
    }

    async fn export_page(&self, export_id: &str, page: u32, request: &ExportRequest) -> Result<Bytes> {
        self.export_eventlog_data_by_page(export_id, page, request).await
    }

    async fn delete_export(&self, export_id: &str) -> Result<()> {
        Self::delete_export(self, export_id).await
    }
}
