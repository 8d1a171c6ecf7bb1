use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOOL_NAME: &str = "dokugit";
pub const DEFAULT_TOOL_EMAIL: &str = "dokugit@localhost";
pub const DEFAULT_PAGES_PREFIX: &str = "pages";
pub const DEFAULT_MEDIA_PREFIX: &str = "media";
pub const DEFAULT_PAGE_EXTENSION: &str = ".txt";
pub const DEFAULT_BRANCH: &str = "master";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConvertConfig {
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub output: OutputSection,
}

/// Identity used for synthetic commits (media import, closing marker) and
/// for change-log entries that carry no author id.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct IdentitySection {
    pub tool_name: Option<String>,
    pub tool_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutputSection {
    pub pages_prefix: Option<String>,
    pub media_prefix: Option<String>,
    pub page_extension: Option<String>,
    pub branch: Option<String>,
}

impl ConvertConfig {
    /// Resolve the tool author name: env DOKUGIT_TOOL_NAME > config > default.
    pub fn tool_name(&self) -> String {
        if let Ok(value) = env::var("DOKUGIT_TOOL_NAME") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.identity
            .tool_name
            .clone()
            .unwrap_or_else(|| DEFAULT_TOOL_NAME.to_string())
    }

    /// Resolve the tool author email: env DOKUGIT_TOOL_EMAIL > config > default.
    pub fn tool_email(&self) -> String {
        if let Ok(value) = env::var("DOKUGIT_TOOL_EMAIL") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.identity
            .tool_email
            .clone()
            .unwrap_or_else(|| DEFAULT_TOOL_EMAIL.to_string())
    }

    pub fn pages_prefix(&self) -> &str {
        self.output
            .pages_prefix
            .as_deref()
            .unwrap_or(DEFAULT_PAGES_PREFIX)
    }

    pub fn media_prefix(&self) -> &str {
        self.output
            .media_prefix
            .as_deref()
            .unwrap_or(DEFAULT_MEDIA_PREFIX)
    }

    pub fn page_extension(&self) -> &str {
        self.output
            .page_extension
            .as_deref()
            .unwrap_or(DEFAULT_PAGE_EXTENSION)
    }

    pub fn branch(&self) -> &str {
        self.output.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }
}

/// Load a ConvertConfig from a TOML file. Returns defaults if the file
/// doesn't exist; malformed TOML is a fatal error.
pub fn load_config(config_path: &Path) -> Result<ConvertConfig> {
    if !config_path.exists() {
        return Ok(ConvertConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ConvertConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
