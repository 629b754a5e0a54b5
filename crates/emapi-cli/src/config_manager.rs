//! Persistent CLI settings

use emapi_client::services::{EventColumn, ExportFilter, FilterKind};
use emapi_client::{ClientConfig, ExportRetryPolicy, TlsVersion};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmapiConfig {
    /// Account base URL
    pub endpoint: String,
    pub keep_alive: bool,
    pub tls_version: Option<TlsVersion>,
    pub user_agent: Option<String>,
    pub export: ExportDefaults,
    pub import: ImportDefaults,
}

impl Default for EmapiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nasa.e.alterian.net".to_string(),
            keep_alive: false,
            tls_version: None,
            user_agent: Some(concat!("emapi-cli/", env!("CARGO_PKG_VERSION")).to_string()),
            export: ExportDefaults::default(),
            import: ImportDefaults::default(),
        }
    }
}

/// Settings of the `exportresponse` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// The export covers the last `days_back` days
    pub days_back: u32,
    pub page_size: u32,
    /// Comma-separated event type ids to include
    pub event_ids: String,
    /// Comma-separated deployment ids to exclude
    pub excluded_deployments: String,
    pub output_file: PathBuf,
    /// List field values added after the standard columns
    pub field_columns: Vec<FieldColumn>,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            days_back: 30,
            page_size: 5000,
            event_ids: "1,2,54,55,56".to_string(),
            excluded_deployments: "100,200".to_string(),
            output_file: PathBuf::from("Export.csv"),
            field_columns: vec![
                FieldColumn {
                    field_id: 1,
                    list_id: 1192,
                },
                FieldColumn {
                    field_id: 2,
                    list_id: 1192,
                },
            ],
        }
    }
}

impl ExportDefaults {
    pub fn filters(&self) -> Result<Vec<ExportFilter>, ConfigError> {
        let mut filters = Vec::new();
        for (key, ids, kind) in [
            ("export.event_ids", &self.event_ids, FilterKind::IncludeEvents),
            (
                "export.excluded_deployments",
                &self.excluded_deployments,
                FilterKind::ExcludeDeployments,
            ),
        ] {
            let filter = ExportFilter::parse(ids, kind).map_err(|e| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
            })?;
            if !filter.values.is_empty() {
                filters.push(filter);
            }
        }
        Ok(filters)
    }

    /// Standard columns followed by the configured field columns
    pub fn columns(&self) -> Vec<EventColumn> {
        let mut columns = EventColumn::standard();
        columns.extend(
            self.field_columns
                .iter()
                .map(|c| EventColumn::field_value(c.field_id, c.list_id)),
        );
        columns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldColumn {
    pub field_id: i32,
    pub list_id: i32,
}

/// Settings of the bulk import command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportDefaults {
    pub label: String,
    pub import_source_id: i32,
    pub list_id: i32,
    pub deployment_id: i32,
    /// Maximum bytes per uploaded chunk
    pub chunk_size: usize,
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            label: "ABC Automation".to_string(),
            import_source_id: 21560,
            list_id: 1192,
            deployment_id: 2563,
            chunk_size: emapi_client::services::list_import::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl EmapiConfig {
    /// Library configuration for this file, retry policy from the environment
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.endpoint.clone());
        config.keep_alive = self.keep_alive;
        config.tls_version = self.tls_version;
        config.user_agent.clone_from(&self.user_agent);
        config.export_retry = ExportRetryPolicy::from_env();
        config
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
    config: EmapiConfig,
}

impl ConfigManager {
    /// Load the configuration from the default location
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path(Self::default_path())
    }

    /// Load the configuration from `path`, writing defaults when missing
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = path.into();
        let config = Self::load_config(&config_path)?;
        Ok(Self {
            config_path,
            config,
        })
    }

    /// `<config dir>/emapi/emapi.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emapi")
            .join("emapi.toml")
    }

    fn load_config(config_path: &Path) -> Result<EmapiConfig, ConfigError> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = EmapiConfig::default();
            Self::save_config_to_file(config_path, &config)?;
            Ok(config)
        }
    }

    fn save_config_to_file(config_path: &Path, config: &EmapiConfig) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(config_path, toml::to_string_pretty(config)?)?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        Self::save_config_to_file(&self.config_path, &self.config)
    }

    pub fn config(&self) -> &EmapiConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EmapiConfig {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn into_config(self) -> EmapiConfig {
        self.config
    }
}
