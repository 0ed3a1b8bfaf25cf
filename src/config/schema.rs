//! Configuration schema for bender
//!
//! Configuration is stored at `./bender.toml` or `~/.config/bender/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host project settings
    pub project: ProjectConfig,

    /// Asset origin domains
    pub domains: DomainConfig,

    /// Fetch-mode toggles
    pub modes: ModeConfig,

    /// Durable cache settings
    pub cache: CacheSettings,

    /// Scaffold defaults
    pub scaffold: ScaffoldSettings,
}

/// Deployment environment the process runs in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Qa,
    Prod,
}

/// Host project settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name of the application we are running from. Must match the
    /// name used in static_conf.json.
    pub name: Option<String>,

    /// Directory holding the project's `static/` manifests
    pub dir: PathBuf,

    /// Deployment environment
    pub env: Environment,

    /// Salt mixed into cache keys so new builds never share entries with old
    /// ones. Defaults to the BUILD_NUM environment variable.
    pub build_salt: Option<String>,

    /// Identity of this node, part of the scaffold fingerprint (a freshly
    /// deployed node may be ahead of its peers). Defaults to HOSTNAME.
    pub host_identity: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            dir: PathBuf::from("."),
            env: Environment::Local,
            build_salt: None,
            host_identity: None,
        }
    }
}

/// Asset origin domains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// CDN domain served to browsers (src/href rewriting and bundle HTML)
    pub cdn: String,

    /// Artifact-store domain, bypassing the CDN. Version pointers are fetched
    /// here so CDN caching can't serve a stale pointer.
    pub store: String,

    /// Local development daemon
    pub daemon: String,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            cdn: String::new(),
            store: String::new(),
            daemon: "localhost:3333".to_string(),
        }
    }
}

/// Fetch-mode toggles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Force the local daemon on or off; unset falls back to the environment
    pub local_mode: Option<bool>,

    /// Use the local daemon only for the host project's own bundles
    pub local_project_mode: bool,

    /// Force debug (expanded, unminified) bundles; unset falls back to
    /// local_mode, then the environment
    pub debug_mode: Option<bool>,

    /// Treat missing prebuilt manifests as empty even on QA
    pub qa_emulation: bool,
}

/// Durable cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Disable to run every resolution against the origin (no-op caches)
    pub enabled: bool,

    /// Log a debug event on durable-cache misses
    pub log_misses: bool,

    /// Log an info event for each origin fetch
    pub log_store_fetches: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_misses: true,
            log_store_fetches: true,
        }
    }
}

/// Scaffold defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaffoldSettings {
    /// Bundle paths included in every scaffold before the caller's own
    pub default_bundles: Vec<String>,
}

impl Config {
    /// Host project name, required for any scaffold build
    pub fn host_project_name(&self) -> Option<&str> {
        self.project.name.as_deref()
    }

    pub fn build_salt(&self) -> String {
        self.project
            .build_salt
            .clone()
            .or_else(|| std::env::var("BUILD_NUM").ok())
            .unwrap_or_default()
    }

    pub fn host_identity(&self) -> String {
        self.project
            .host_identity
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "unknown-host".to_string())
    }

    /// Strict environments hard-error on caller mistakes that prod degrades
    /// to logged warnings (to avoid breaking already-deployed pages).
    pub fn is_strict(&self) -> bool {
        self.project.env != Environment::Prod
    }

    /// Whether a missing prebuilt manifest is an error (QA only, unless
    /// qa_emulation is set)
    pub fn missing_manifest_is_error(&self) -> bool {
        self.project.env == Environment::Qa && !self.modes.qa_emulation
    }
}
