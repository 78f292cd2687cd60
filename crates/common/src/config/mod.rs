//! Configuration management for Gutachten services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! The loaded [`AppConfig`] is immutable. Collaborators are built from it once
//! at startup; changing credentials means building new collaborators.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Record keeping (Notion) configuration
    #[serde(default)]
    pub notion: NotionConfig,

    /// Object store (Google Drive) configuration
    #[serde(default)]
    pub google_drive: DriveConfig,

    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum request body size; signatures arrive inline as base64
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotionConfig {
    /// Integration token
    pub token: Option<String>,

    /// Database holding one contact per vehicle plate
    pub contacts_database_id: Option<String>,

    /// Database holding one entry per order
    pub orders_database_id: Option<String>,

    #[serde(default = "default_notion_api_base")]
    pub api_base: String,

    #[serde(default = "default_notion_version")]
    pub api_version: String,

    /// Request timeout in seconds
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_secs: u64,

    /// Priority written onto newly created contacts
    #[serde(default = "default_priority")]
    pub default_priority: String,

    /// Property names of the two databases
    #[serde(default)]
    pub properties: NotionProperties,
}

/// Property names in the Notion databases. These belong to the workspace
/// setup, not to the code, so every name can be overridden.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotionProperties {
    #[serde(default = "default_prop_contact_name")]
    pub contact_name: String,
    #[serde(default = "default_prop_contact_plate")]
    pub contact_plate: String,
    #[serde(default = "default_prop_contact_email")]
    pub contact_email: String,
    #[serde(default = "default_prop_contact_phone")]
    pub contact_phone: String,
    #[serde(default = "default_prop_contact_address")]
    pub contact_address: String,
    #[serde(default = "default_prop_contact_priority")]
    pub contact_priority: String,
    #[serde(default = "default_prop_order_title")]
    pub order_title: String,
    #[serde(default = "default_prop_order_link")]
    pub order_link: String,
    #[serde(default = "default_prop_order_contact")]
    pub order_contact: String,
    #[serde(default = "default_prop_order_date")]
    pub order_date: String,
    #[serde(default = "default_prop_order_location")]
    pub order_location: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriveConfig {
    /// Path to a service-account JSON key
    pub credentials_path: Option<String>,

    /// Service-account JSON key given inline (takes precedence over the path)
    pub credentials_json: Option<String>,

    /// Folder under which one folder per customer is kept
    pub root_folder_id: Option<String>,

    #[serde(default = "default_drive_api_base")]
    pub api_base: String,

    #[serde(default = "default_drive_upload_base")]
    pub upload_base: String,

    /// Overrides the token URI from the key file
    pub token_uri: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Upper bound for every external stage of one submission
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_body_limit() -> usize { 10 * 1024 * 1024 }
fn default_notion_api_base() -> String { "https://api.notion.com/v1".to_string() }
fn default_notion_version() -> String { "2022-06-28".to_string() }
fn default_collaborator_timeout() -> u64 { 20 }
fn default_priority() -> String { "Normal".to_string() }
fn default_prop_contact_name() -> String { "Name".to_string() }
fn default_prop_contact_plate() -> String { "Kennzeichen".to_string() }
fn default_prop_contact_email() -> String { "E-Mail".to_string() }
fn default_prop_contact_phone() -> String { "Telefon".to_string() }
fn default_prop_contact_address() -> String { "Adresse".to_string() }
fn default_prop_contact_priority() -> String { "Priorität".to_string() }
fn default_prop_order_title() -> String { "Auftrag".to_string() }
fn default_prop_order_link() -> String { "Gutachten PDF".to_string() }
fn default_prop_order_contact() -> String { "Kontakt".to_string() }
fn default_prop_order_date() -> String { "Unfalldatum".to_string() }
fn default_prop_order_location() -> String { "Unfallort".to_string() }
fn default_drive_api_base() -> String { "https://www.googleapis.com/drive/v3".to_string() }
fn default_drive_upload_base() -> String { "https://www.googleapis.com/upload/drive/v3".to_string() }
fn default_stage_timeout() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "gutachten".to_string() }
fn default_rate_limit() -> u32 { 5 }
fn default_burst() -> u32 { 20 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__NOTION__TOKEN=secret
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the per-stage timeout as Duration
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.stage_timeout_secs)
    }
}

impl NotionConfig {
    /// Token and both database ids, when all three are set
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        fn non_blank(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }

        Some((
            non_blank(&self.token)?,
            non_blank(&self.contacts_database_id)?,
            non_blank(&self.orders_database_id)?,
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DriveConfig {
    pub fn is_configured(&self) -> bool {
        let has_key = self.credentials_json.as_deref().is_some_and(|s| !s.trim().is_empty())
            || self.credentials_path.as_deref().is_some_and(|s| !s.trim().is_empty());
        let has_root = self.root_folder_id.as_deref().is_some_and(|s| !s.trim().is_empty());
        has_key && has_root
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            contacts_database_id: None,
            orders_database_id: None,
            api_base: default_notion_api_base(),
            api_version: default_notion_version(),
            timeout_secs: default_collaborator_timeout(),
            default_priority: default_priority(),
            properties: NotionProperties::default(),
        }
    }
}

impl Default for NotionProperties {
    fn default() -> Self {
        Self {
            contact_name: default_prop_contact_name(),
            contact_plate: default_prop_contact_plate(),
            contact_email: default_prop_contact_email(),
            contact_phone: default_prop_contact_phone(),
            contact_address: default_prop_contact_address(),
            contact_priority: default_prop_contact_priority(),
            order_title: default_prop_order_title(),
            order_link: default_prop_order_link(),
            order_contact: default_prop_order_contact(),
            order_date: default_prop_order_date(),
            order_location: default_prop_order_location(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            credentials_json: None,
            root_folder_id: None,
            api_base: default_drive_api_base(),
            upload_base: default_drive_upload_base(),
            token_uri: None,
            timeout_secs: default_collaborator_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            notion: NotionConfig::default(),
            google_drive: DriveConfig::default(),
            pipeline: PipelineConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
