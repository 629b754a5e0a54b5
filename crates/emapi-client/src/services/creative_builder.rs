//! Creative builder sub-API

use super::{parse_list, text_of};
use crate::Result;
use crate::connection::{Connection, Handle};
use crate::soap::{SoapRequest, XmlElement};
use tracing::debug;

/// Variable defined on a creative
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreativeVariable {
    pub id: i32,
    pub name: String,
    pub variable_type: String,
}

/// Template (HTML or text body) of a creative
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreativeTemplate {
    pub id: i32,
    pub name: String,
    pub template_type: String,
}

impl CreativeVariable {
    fn from_element(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            id: element.child_value("ID")?,
            name: text_of(element, "Name"),
            variable_type: text_of(element, "Type"),
        })
    }
}

impl CreativeTemplate {
    fn from_element(element: &XmlElement) -> Result<Self> {
        Ok(Self {
            id: element.child_value("ID")?,
            name: text_of(element, "Name"),
            template_type: text_of(element, "Type"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreativeBuilderClient {
    handle: Handle,
    token: String,
}

impl CreativeBuilderClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        Ok(Self {
            handle: connection.creative_builder()?,
            token: connection.token().to_string(),
        })
    }

    pub async fn get_creative_variables(&self, creative_id: i32) -> Result<Vec<CreativeVariable>> {
        let request = SoapRequest::new("GetCreativeVariables")
            .arg("token", &self.token)
            .arg("creativeID", creative_id);
        let response = self.handle.call(request).await?;
        let variables = parse_list(&response, "GetCreativeVariables", CreativeVariable::from_element)?;
        debug!(
            "Creative {} has {} variable(s)",
            creative_id,
            variables.len()
        );
        Ok(variables)
    }

    pub async fn get_creative_templates(&self, creative_id: i32) -> Result<Vec<CreativeTemplate>> {
        let request = SoapRequest::new("GetCreativeTemplates")
            .arg("token", &self.token)
            .arg("creativeID", creative_id);
        let response = self.handle.call(request).await?;
        let templates = parse_list(&response, "GetCreativeTemplates", CreativeTemplate::from_element)?;
        debug!(
            "Creative {} has {} template(s)",
            creative_id,
            templates.len()
        );
        Ok(templates)
    }
}
