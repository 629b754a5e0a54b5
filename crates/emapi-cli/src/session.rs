//! Interactive session: reads commands line by line and runs them

use crate::commands::Command;
use crate::config_manager::EmapiConfig;
use anyhow::{Context, Result};
use chrono::{Local, TimeDelta};
use emapi_client::services::{AuthenticateClient, DmPlusClient, ImportStatus, ListImportClient};
use emapi_client::{Connection, ExportPipeline, ExportReport, ExportRequest, FileSink};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Recipients uploaded when no CSV file is given
pub const SAMPLE_RECIPIENTS: &str =
    "email,firstname\r\njohn@example.com,john\r\njane@example.com,jane\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Session<W> {
    config: EmapiConfig,
    token: Option<String>,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(config: EmapiConfig, out: W) -> Self {
        Self {
            config,
            token: None,
            out,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run commands until `exit` or end of input
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, reader: R) -> Result<()> {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if self.handle_line(&line).await? == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    /// Run one command line
    ///
    /// Command failures are printed; only output errors are returned.
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(usage) => {
                writeln!(self.out, "{usage}")?;
                return Ok(Flow::Continue);
            }
        };
        debug!("Command: {:?}", redact(&command));

        let token = match (command.requires_login(), self.token.clone()) {
            (true, None) => {
                writeln!(self.out, "Please log in first: login <id> <password>")?;
                return Ok(Flow::Continue);
            }
            (_, token) => token.unwrap_or_default(),
        };

        match command {
            Command::Empty => {}
            Command::Exit => return Ok(Flow::Exit),
            Command::Login { id, password } => match self.login(&id, &password).await {
                Ok(message) => writeln!(self.out, "{message}")?,
                Err(e) => self.report_error(&e)?,
            },
            Command::ExportResponse => match self.export_response(&token).await {
                Ok(report) => {
                    info!(
                        "Exported {} page(s), {} bytes to {}",
                        report.pages_written,
                        report.bytes_written,
                        self.config.export.output_file.display()
                    );
                    writeln!(self.out, "Success")?;
                }
                Err(e) => self.report_error(&e)?,
            },
            Command::SendMultipleWithDeployment { csv_file } => {
                match self.import_recipients(&token, csv_file.as_deref()).await {
                    Ok((import_id, status)) => {
                        info!("Import {} status: {}", import_id, status.status);
                        writeln!(self.out, "Success")?;
                    }
                    Err(e) => self.report_error(&e)?,
                }
            }
            Command::Unsupported(name) => {
                writeln!(self.out, "'{name}' is not supported by this client")?;
            }
            Command::Unknown(name) => writeln!(self.out, "Unknown command '{name}'")?,
        }
        Ok(Flow::Continue)
    }

    fn report_error(&mut self, error: &anyhow::Error) -> Result<()> {
        warn!("Command failed: {:#}", error);
        writeln!(self.out, "Error: {error:#}")?;
        Ok(())
    }

    fn connect(&self, token: &str) -> Result<Connection> {
        self.config
            .client_config()
            .connection_builder(token)
            .build()
            .with_context(|| format!("Failed to connect to {}", self.config.endpoint))
    }

    async fn login(&mut self, id: &str, password: &str) -> Result<&'static str> {
        let connection = self.connect("")?;
        let outcome = match AuthenticateClient::new(&connection) {
            Ok(client) => client.login(id, password).await,
            Err(e) => Err(e),
        };
        let disposed = connection.dispose().await;
        let outcome = outcome.context("Authentication call failed")?;
        disposed?;

        if let Some(token) = outcome.token() {
            self.token = Some(token.to_string());
        }
        Ok(outcome.message())
    }

    async fn export_response(&self, token: &str) -> Result<ExportReport> {
        let defaults = &self.config.export;
        let now = Local::now().naive_local();
        let start = now - TimeDelta::days(i64::from(defaults.days_back));

        let mut request =
            ExportRequest::new(start, now, defaults.page_size).with_columns(defaults.columns());
        for filter in defaults.filters()? {
            request = request.with_filter(filter);
        }

        let connection = self.connect(token)?;
        let policy = self.config.client_config().export_retry;
        let mut sink = FileSink::new(&defaults.output_file);
        let report = match DmPlusClient::new(&connection) {
            Ok(client) => {
                ExportPipeline::new(client)
                    .with_policy(policy)
                    .run(&request, &mut sink)
                    .await
            }
            Err(e) => Err(e),
        };
        let disposed = connection.dispose().await;
        let report = report.context("Export failed")?;
        disposed?;

        if let Some(cleanup) = &report.cleanup_error {
            warn!("Export {} was not deleted: {}", report.export_id, cleanup);
        }
        Ok(report)
    }

    async fn import_recipients(
        &self,
        token: &str,
        csv_file: Option<&Path>,
    ) -> Result<(i32, ImportStatus)> {
        let csv = match csv_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => SAMPLE_RECIPIENTS.to_string(),
        };
        let defaults = &self.config.import;

        let connection = self.connect(token)?;
        let uploaded = async {
            let client = ListImportClient::new(&connection)?;
            let import_id = client
                .upload_csv(
                    &defaults.label,
                    defaults.import_source_id,
                    &[defaults.list_id],
                    &[defaults.deployment_id],
                    &csv,
                    defaults.chunk_size,
                )
                .await?;
            let status = client.import_status(import_id).await?;
            Ok::<_, emapi_client::Error>((import_id, status))
        }
        .await;
        let disposed = connection.dispose().await;
        let uploaded = uploaded.context("Import failed")?;
        disposed?;
        Ok(uploaded)
    }
}

/// Command with the password masked, for logging
fn redact(command: &Command) -> Command {
    match command {
        Command::Login { id, .. } => Command::Login {
            id: id.clone(),
            password: "***".to_string(),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn session() -> Session<Vec<u8>> {
        let mut config = EmapiConfig::default();
        config.endpoint = "http://127.0.0.1:9".to_string();
        Session::new(config, Vec::new())
    }

    fn output(session: Session<Vec<u8>>) -> String {
        String::from_utf8(session.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_commands_need_login() {
        let mut session = session();
        assert_eq!(
            session.handle_line("exportresponse").await.unwrap(),
            Flow::Continue
        );
        session
            .handle_line("send_multipleemails_withdeployment")
            .await
            .unwrap();
        assert!(session.token().is_none());

        let out = output(session);
        assert_eq!(out.matches("Please log in first").count(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_at_exit() {
        let mut session = session();
        let input: &[u8] = b"listquery\nbogus\nexit\nexportresponse\n";
        session.run(input).await.unwrap();

        let out = output(session);
        assert!(out.contains("'listquery' is not supported"));
        assert!(out.contains("Unknown command 'bogus'"));
        assert!(!out.contains("Please log in"));
    }

    #[tokio::test]
    async fn test_login_usage() {
        let mut session = session();
        session.handle_line("login onlyid").await.unwrap();
        assert!(output(session).contains("Usage: login"));
    }

    #[test]
    fn test_redact_masks_password() {
        let command = Command::Login {
            id: "user".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{:?}", redact(&command)).contains("secret"));
    }
}
