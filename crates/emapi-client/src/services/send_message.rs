//! Message sending sub-API

use super::{parse_list, text_of};
use crate::Result;
use crate::connection::{Connection, Handle};
use crate::soap::{SoapRequest, XmlElement};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creative {
    pub id: i32,
    pub name: String,
    pub description: String,
}

impl Creative {
    fn from_element(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            id: element.child_value("ID")?,
            name: text_of(element, "Name"),
            description: text_of(element, "Description"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SendMessageClient {
    handle: Handle,
    token: String,
}

impl SendMessageClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        Ok(Self {
            handle: connection.send_message()?,
            token: connection.token().to_string(),
        })
    }

    /// Every creative visible to the account
    pub async fn get_all_creatives(&self) -> Result<Vec<Creative>> {
        let request = SoapRequest::new("GetAllCreatives").arg("token", &self.token);
        let response = self.handle.call(request).await?;
        let creatives = parse_list(&response, "GetAllCreatives", Creative::from_element)?;
        debug!("GetAllCreatives returned {} creative(s)", creatives.len());
        Ok(creatives)
    }
}
