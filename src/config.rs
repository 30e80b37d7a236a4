//! Process configuration loaded once at startup.
//!
//! Everything the pipeline needs from the environment is resolved into an
//! immutable [`AssayConfig`] in `main` and passed down by reference. No
//! module reads the environment after startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default port matches the original deployment environment.
const DEFAULT_PORT: u16 = 10000;
const DEFAULT_OUTPUT_DIR: &str = "temp_sessions";
const DEFAULT_DOCX_SERVICE: &str = "https://docx-generator-api.onrender.com";
const DEFAULT_MARKET_GAP: &str = "https://market-gap-analysis.onrender.com";
const DEFAULT_MAX_SESSIONS: usize = 4;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 10;

/// Immutable service configuration.
#[derive(Debug, Clone)]
pub struct AssayConfig {
    /// Listen port for the HTTP front door.
    pub port: u16,
    /// Root directory for per-session working directories.
    pub output_dir: PathBuf,
    /// Optional directory overriding the compiled-in reference templates.
    pub template_dir: Option<PathBuf>,
    /// Base URL of the external document renderer.
    pub docx_service_url: Url,
    /// Default downstream target when the caller supplies no webhook.
    pub market_gap_webhook: Url,
    /// Storage provider settings; `None` degrades uploads to a warning.
    pub drive: Option<DriveConfig>,
    /// Text-completion service settings; `None` selects the local phrasing
    /// generator.
    pub completion: Option<CompletionConfig>,
    /// Type-inference keyword lists.
    pub rules: ClassifierRules,
    /// Maximum concurrently running assessment workers.
    pub max_concurrent_sessions: usize,
    /// Timeout applied to outbound service calls.
    pub http_timeout: Duration,
    /// Timeout applied to inventory file downloads.
    pub download_timeout: Duration,
}

/// Drive-style object store settings. Credential bootstrap happens outside
/// this service; only a pre-issued bearer token is accepted.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub api_base: Url,
    pub upload_base: Url,
    pub access_token: String,
}

/// Text-completion endpoint settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_url: Url,
    pub api_key: String,
}

impl AssayConfig {
    /// Build the configuration from the process environment.
    ///
    /// Every variable has a default except the storage token: a missing
    /// token disables uploads rather than failing startup.
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT value: {v}")))?,
            Err(_) => DEFAULT_PORT,
        };

        let output_dir = env::var("ASSAY_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let template_dir = env::var("ASSAY_TEMPLATE_DIR").ok().map(PathBuf::from);

        let docx_service_url = parse_url_var("DOCX_SERVICE_URL", DEFAULT_DOCX_SERVICE)?;
        let market_gap_webhook = parse_url_var("MARKET_GAP_WEBHOOK", DEFAULT_MARKET_GAP)?;

        let drive = DriveConfig::from_env()?;
        let completion = CompletionConfig::from_env()?;

        let max_concurrent_sessions = match env::var("ASSAY_MAX_SESSIONS") {
            Ok(v) => v
                .parse()
                .map_err(|_| Error::Config(format!("invalid ASSAY_MAX_SESSIONS value: {v}")))?,
            Err(_) => DEFAULT_MAX_SESSIONS,
        };

        Ok(Self {
            port,
            output_dir,
            template_dir,
            docx_service_url,
            market_gap_webhook,
            drive,
            completion,
            rules: ClassifierRules::default(),
            max_concurrent_sessions,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        })
    }
}

impl Default for AssayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            template_dir: None,
            docx_service_url: Url::parse(DEFAULT_DOCX_SERVICE).unwrap(),
            market_gap_webhook: Url::parse(DEFAULT_MARKET_GAP).unwrap(),
            drive: None,
            completion: None,
            rules: ClassifierRules::default(),
            max_concurrent_sessions: DEFAULT_MAX_SESSIONS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

impl DriveConfig {
    fn from_env() -> Result<Option<Self>> {
        let token = match env::var("DRIVE_ACCESS_TOKEN") {
            Ok(t) if !t.trim().is_empty() => t,
            _ => match env::var("DRIVE_ACCESS_TOKEN_FILE") {
                Ok(path) => std::fs::read_to_string(&path)
                    .map_err(|e| {
                        Error::Config(format!("cannot read DRIVE_ACCESS_TOKEN_FILE {path}: {e}"))
                    })?
                    .trim()
                    .to_string(),
                Err(_) => return Ok(None),
            },
        };

        // Bases must end with a slash or Url::join would drop the last
        // path segment.
        let api_base = with_trailing_slash(parse_url_var(
            "DRIVE_API_BASE",
            "https://www.googleapis.com/drive/v3/",
        )?);
        let upload_base = with_trailing_slash(parse_url_var(
            "DRIVE_UPLOAD_BASE",
            "https://www.googleapis.com/upload/drive/v3/",
        )?);

        Ok(Some(Self {
            api_base,
            upload_base,
            access_token: token,
        }))
    }
}

impl CompletionConfig {
    fn from_env() -> Result<Option<Self>> {
        let api_key = match env::var("COMPLETION_API_KEY") {
            Ok(k) if !k.trim().is_empty() => k,
            _ => return Ok(None),
        };
        let api_url = parse_url_var("COMPLETION_API_URL", "https://api.anthropic.com/v1/messages")?;
        Ok(Some(Self { api_url, api_key }))
    }
}

fn parse_url_var(name: &str, default: &str) -> Result<Url> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| Error::Config(format!("invalid {name} value {raw}: {e}")))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Keyword lists driving hardware/software classification.
///
/// The lists are data rather than logic so deployments can tune them
/// without a rebuild; the defaults cover the synonym sets the service has
/// always recognized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierRules {
    /// Declared-type values honored outright as hardware.
    pub hardware_types: Vec<String>,
    /// Declared-type values honored outright as software.
    pub software_types: Vec<String>,
    /// Header names signaling a hardware inventory.
    pub hardware_headers: Vec<String>,
    /// Header names signaling a software inventory.
    pub software_headers: Vec<String>,
    /// Filename keywords hinting hardware.
    pub hardware_filename_hints: Vec<String>,
    /// Filename keywords hinting software.
    pub software_filename_hints: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            hardware_types: strings(&["hardware", "hw", "device", "devices", "server", "servers"]),
            software_types: strings(&[
                "software",
                "sw",
                "application",
                "applications",
                "app",
                "apps",
            ]),
            hardware_headers: strings(&[
                "device id",
                "device name",
                "server id",
                "server name",
                "serial number",
                "model",
            ]),
            software_headers: strings(&[
                "app id",
                "app name",
                "application name",
                "application",
                "license status",
                "software name",
                "version",
            ]),
            hardware_filename_hints: strings(&["server", "device", "asset", "hardware", "hw"]),
            software_filename_hints: strings(&["application", "app", "software", "sw", "license"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_runnable() {
        let config = AssayConfig::default();
        assert_eq!(config.port, 10000);
        assert!(config.drive.is_none());
        assert!(config.completion.is_none());
        assert_eq!(config.output_dir, PathBuf::from("temp_sessions"));
    }

    #[test]
    fn default_rules_cover_known_synonyms() {
        let rules = ClassifierRules::default();
        assert!(rules.hardware_types.contains(&"hardware".to_string()));
        assert!(rules.software_types.contains(&"application".to_string()));
        assert!(rules.hardware_headers.contains(&"device id".to_string()));
        assert!(rules.software_headers.contains(&"license status".to_string()));
    }
}
