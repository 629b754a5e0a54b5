//! List manager sub-API

use super::{parse_list, text_of};
use crate::Result;
use crate::connection::{Connection, Handle};
use crate::soap::{SoapRequest, XmlElement};
use tracing::debug;

/// Field of the account's recipient lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListField {
    pub id: i32,
    pub name: String,
    pub field_type: String,
}

impl ListField {
    fn from_element(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            id: element.child_value("ID")?,
            name: text_of(element, "Name"),
            field_type: text_of(element, "Type"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ListManagerClient {
    handle: Handle,
    token: String,
}

impl ListManagerClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        Ok(Self {
            handle: connection.list_manager()?,
            token: connection.token().to_string(),
        })
    }

    pub async fn get_fields(&self) -> Result<Vec<ListField>> {
        let request = SoapRequest::new("GetFields").arg("token", &self.token);
        let response = self.handle.call(request).await?;
        let fields = parse_list(&response, "GetFields", ListField::from_element)?;
        debug!("GetFields returned {} field(s)", fields.len());
        Ok(fields)
    }
}
