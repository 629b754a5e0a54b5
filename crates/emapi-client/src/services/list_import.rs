//! Bulk list import sub-API
//!
//! An import runs in three steps: create the import context, upload the CSV
//! in numbered chunks starting at 1, then finish the import so the service
//! starts processing it. Status can be polled afterwards.

use super::{int_array, result_of};
use crate::connection::{Connection, Handle};
use crate::soap::SoapRequest;
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Default chunk size for [`ListImportClient::upload_csv`]
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Status of an import as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStatus {
    /// Status value, e.g. the state name
    pub status: String,
    /// Remaining fields of the status record, keyed by element name
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ListImportClient {
    handle: Handle,
    token: String,
}

impl ListImportClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        Ok(Self {
            handle: connection.list_import()?,
            token: connection.token().to_string(),
        })
    }

    /// Create an import context and return its id
    pub async fn create_import(
        &self,
        label: &str,
        source_id: i32,
        byte_size: u64,
        lists: &[i32],
        deployments: &[i32],
    ) -> Result<i32> {
        let request = SoapRequest::new("CreateImport")
            .arg("token", &self.token)
            .arg("name", label)
            .arg("importSourceID", source_id)
            .arg("fileSize", byte_size)
            .param(int_array("addToLists", lists))
            .param(int_array("addToDeployments", deployments));

        let response = self.handle.call(request).await?;
        let import_id = result_of(&response, "CreateImport")
            .ok_or_else(|| Error::missing_element("CreateImportResponse/CreateImportResult"))?
            .parse_text()?;
        debug!("Created import {} ({} bytes)", import_id, byte_size);
        Ok(import_id)
    }

    /// Upload one CSV chunk
    pub async fn import_data(&self, import_id: i32, chunk_number: u32, csv: &str) -> Result<()> {
        let request = SoapRequest::new("ImportDataS")
            .arg("token", &self.token)
            .arg("importID", import_id)
            .arg("chunkNumber", chunk_number)
            .arg("data", csv);
        self.handle.call(request).await?;
        debug!(
            "Uploaded chunk {} of import {} ({} bytes)",
            chunk_number,
            import_id,
            csv.len()
        );
        Ok(())
    }

    /// Mark the upload as done
    pub async fn finish_import(&self, import_id: i32) -> Result<()> {
        let request = SoapRequest::new("FinishImport")
            .arg("token", &self.token)
            .arg("importID", import_id);
        self.handle.call(request).await?;
        debug!("Finished import {}", import_id);
        Ok(())
    }

    pub async fn import_status(&self, import_id: i32) -> Result<ImportStatus> {
        let request = SoapRequest::new("GetImportStatus")
            .arg("token", &self.token)
            .arg("importID", import_id);
        let response = self.handle.call(request).await?;

        let Some(result) = result_of(&response, "GetImportStatus") else {
            return Ok(ImportStatus::default());
        };
        if result.children.is_empty() {
            return Ok(ImportStatus {
                status: result.text.trim().to_string(),
                details: BTreeMap::new(),
            });
        }

        let mut status = ImportStatus::default();
        for child in &result.children {
            if child.name.eq_ignore_ascii_case("status") {
                status.status = child.text.trim().to_string();
            } else {
                status
                    .details
                    .insert(child.name.clone(), child.text.trim().to_string());
            }
        }
        Ok(status)
    }

    /// Run a whole import: create, upload every chunk, finish
    ///
    /// Returns the import id.
    pub async fn upload_csv(
        &self,
        label: &str,
        source_id: i32,
        lists: &[i32],
        deployments: &[i32],
        csv: &str,
        chunk_size: usize,
    ) -> Result<i32> {
        let byte_size = u64::try_from(csv.len()).unwrap_or(u64::MAX);
        let import_id = self
            .create_import(label, source_id, byte_size, lists, deployments)
            .await?;

        let chunks = split_chunks(csv, chunk_size);
        for (chunk_number, chunk) in (1_u32..).zip(&chunks) {
            self.import_data(import_id, chunk_number, chunk).await?;
        }

        self.finish_import(import_id).await?;
        info!(
            "Import {} uploaded in {} chunk(s)",
            import_id,
            chunks.len()
        );
        Ok(import_id)
    }
}

/// Split CSV text into chunks of at most `max_bytes`, on line boundaries
///
/// A single line longer than `max_bytes` becomes its own chunk.
pub fn split_chunks(csv: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut end = 0;

    for line in csv.split_inclusive('\n') {
        if end > start && end - start + line.len() > max_bytes {
            chunks.push(&csv[start..end]);
            start = end;
        }
        end += line.len();
    }
    if end > start {
        chunks.push(&csv[start..end]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "email,firstname\r\njohn@alterian.com,john\r\njane@alterian.com,jane\r\n";

    #[test]
    fn test_split_keeps_whole_payload_when_it_fits() {
        assert_eq!(split_chunks(CSV, DEFAULT_CHUNK_SIZE), vec![CSV]);
        assert!(split_chunks("", 10).is_empty());
    }

    #[test]
    fn test_split_on_line_boundaries() {
        let chunks = split_chunks(CSV, 30);
        assert_eq!(
            chunks,
            vec![
                "email,firstname\r\n",
                "john@alterian.com,john\r\n",
                "jane@alterian.com,jane\r\n",
            ]
        );
        assert_eq!(chunks.concat(), CSV);
    }

    #[test]
    fn test_split_groups_short_lines() {
        let chunks = split_chunks("a\nb\nc\nd\n", 4);
        assert_eq!(chunks, vec!["a\nb\n", "c\nd\n"]);
    }

    #[test]
    fn test_long_line_is_its_own_chunk() {
        let chunks = split_chunks("short\nthis line is long\nx", 8);
        assert_eq!(chunks, vec!["short\n", "this line is long\n", "x"]);
    }
}
