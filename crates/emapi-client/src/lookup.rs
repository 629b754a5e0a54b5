//! Name to identifier lookups
//!
//! Each lookup lists the entities on the remote service and picks the one
//! entry whose name matches. Nothing is cached; every call is a round trip.
//! Creatives and creative variables match ignoring case, list fields and
//! templates match exactly.

use crate::connection::Connection;
use crate::services::{
    Creative, CreativeBuilderClient, CreativeTemplate, CreativeVariable, ListField,
    ListManagerClient, SendMessageClient,
};
use crate::{Error, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    connection: &'a Connection,
}

impl<'a> Lookup<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    /// Creative by name, ignoring case
    pub async fn creative(&self, name: &str) -> Result<Option<Creative>> {
        let creatives = SendMessageClient::new(self.connection)?
            .get_all_creatives()
            .await?;
        single_match(creatives, "creative", name, |c| same_ignoring_case(&c.name, name))
    }

    /// Variable of a creative by name, ignoring case
    pub async fn creative_variable(
        &self,
        creative_id: i32,
        name: &str,
    ) -> Result<Option<CreativeVariable>> {
        let variables = CreativeBuilderClient::new(self.connection)?
            .get_creative_variables(creative_id)
            .await?;
        single_match(variables, "creative variable", name, |v| {
            same_ignoring_case(&v.name, name)
        })
    }

    /// List field by exact name
    pub async fn field(&self, name: &str) -> Result<Option<ListField>> {
        let fields = ListManagerClient::new(self.connection)?.get_fields().await?;
        single_match(fields, "field", name, |f| f.name == name)
    }

    /// Template of a creative by exact name
    pub async fn template(&self, creative_id: i32, name: &str) -> Result<Option<CreativeTemplate>> {
        let templates = CreativeBuilderClient::new(self.connection)?
            .get_creative_templates(creative_id)
            .await?;
        single_match(templates, "template", name, |t| t.name == name)
    }
}

fn same_ignoring_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// The single item satisfying `matches`
///
/// No match is `Ok(None)`; more than one is [`Error::AmbiguousMatch`].
pub fn single_match<T>(
    items: Vec<T>,
    kind: &'static str,
    name: &str,
    matches: impl Fn(&T) -> bool,
) -> Result<Option<T>> {
    let mut found: Vec<T> = items.into_iter().filter(|item| matches(item)).collect();
    match found.len() {
        0 => {
            debug!("No {} named '{}'", kind, name);
            Ok(None)
        }
        1 => Ok(found.pop()),
        count => Err(Error::AmbiguousMatch {
            kind,
            name: name.to_string(),
            count,
        }),
    }
}
