//! Configuration management for the exporter
//!
//! Loaded from a TOML file (`board-exporter.toml` by default). The GitHub
//! token never lives in the file; it is read from `GITHUB_ACCESS_TOKEN`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::{BoardError, LimitConfig, Result, Scope};

/// Environment variable holding the GitHub access token
pub const TOKEN_ENV: &str = "GITHUB_ACCESS_TOKEN";

/// Exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Access token, filled from the environment
    #[serde(skip)]
    pub access_token: String,

    /// Numeric id of the project board
    #[serde(default)]
    pub project_id: u64,

    /// Organization to count issues and pull requests in
    #[serde(default)]
    pub org: Option<String>,

    /// Repository (`owner/name`) to count issues and pull requests in
    #[serde(default)]
    pub repo: Option<String>,

    /// Base URL of the GitHub REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Address the HTTP server binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Seconds between two refresh cycles
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Bound on every single API call, must stay below `refresh_secs`
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Write the column summary into each column's annotation card
    #[serde(default = "default_update_notes")]
    pub update_notes: bool,

    /// Label counted as open bugs
    #[serde(default)]
    pub bug_label: Option<String>,

    /// Static developer-count gauge
    #[serde(default)]
    pub developers: Option<u32>,

    /// Per-column work-in-progress limits
    #[serde(default)]
    pub limits: BTreeMap<String, i64>,
}

// Default value providers
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_refresh_secs() -> u64 {
    30 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_update_notes() -> bool {
    true
}

impl ExporterConfig {
    /// Load the file, pick up the token from the environment and validate
    pub fn load(path: &Path) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| BoardError::Config(format!("{} must be defined", TOKEN_ENV)))?;
        Self::load_with_token(path, token)
    }

    /// Like [`ExporterConfig::load`] with an explicit token
    pub fn load_with_token(path: &Path, token: impl Into<String>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BoardError::Config(format!("could not read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)?;
        config.access_token = token.into();
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without validating
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BoardError::Config(format!("could not parse configuration: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(BoardError::Config("access token is empty".to_string()));
        }
        if self.project_id == 0 {
            return Err(BoardError::Config("project id is missing".to_string()));
        }
        self.scope()?;
        if self.refresh_secs == 0 {
            return Err(BoardError::Config(
                "refresh_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs >= self.refresh_secs {
            return Err(BoardError::Config(format!(
                "request_timeout_secs ({}) must be between 1 and refresh_secs ({})",
                self.request_timeout_secs, self.refresh_secs
            )));
        }
        if let Some(label) = &self.bug_label {
            if label.contains('"') {
                return Err(BoardError::Config(format!(
                    "bug_label must not contain '\"', got '{}'",
                    label
                )));
            }
        }
        self.limit_config()?;
        Ok(())
    }

    /// Counter scope: exactly one of `org` or `repo`
    pub fn scope(&self) -> Result<Scope> {
        match (&self.org, &self.repo) {
            (Some(org), None) if !org.is_empty() => Ok(Scope::Organization(org.clone())),
            (None, Some(repo)) if repo.split('/').filter(|p| !p.is_empty()).count() == 2 => {
                Ok(Scope::Repository(repo.clone()))
            }
            (None, Some(repo)) => Err(BoardError::Config(format!(
                "repo must look like owner/name, got '{}'",
                repo
            ))),
            (Some(_), Some(_)) => Err(BoardError::Config(
                "set either org or repo, not both".to_string(),
            )),
            _ => Err(BoardError::Config("org or repo is missing".to_string())),
        }
    }

    pub fn limit_config(&self) -> Result<LimitConfig> {
        LimitConfig::from_entries(self.limits.iter().map(|(name, limit)| (name.clone(), *limit)))
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
