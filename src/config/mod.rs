// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Visual Supports

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Access gate settings
    #[serde(default)]
    pub gate: GateConfig,

    /// Which content store holds the visuals
    #[serde(default)]
    pub store: StoreConfig,

    /// Upload limits
    #[serde(default)]
    pub upload: UploadConfig,

    /// Web UI settings
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GateConfig {
    pub unlock: UnlockPolicy,
    /// How long the "incorrect" flash stays visible under static matching
    #[serde(default = "default_error_display_ms")]
    pub error_display_ms: u64,
    /// Probe the backend with a decrypted token before accepting it
    #[serde(default = "default_true")]
    pub verify_with_probe: bool,
}

/// How a secret unlocks the gallery
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum UnlockPolicy {
    /// Exact match against a fixed value
    StaticMatch { expected: String },
    /// The secret decrypts a stored access token
    EncryptedToken { ciphertext: String },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON key/value file, one namespaced key holds the collection
    Local {
        #[serde(default = "default_local_path")]
        path: String,
        #[serde(default = "default_namespace")]
        namespace: String,
    },
    /// SQLite blob database
    Blob {
        #[serde(default = "default_blob_path")]
        path: String,
    },
    /// Version-controlled file host reached over its content API
    Remote(RemoteConfig),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory inside the repository holding the visuals
    #[serde(default = "default_content_path")]
    pub content_path: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Plain access token, used when the gate does not supply one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Maximum request body accepted by the upload endpoint
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// Browser sessions untouched for this long are dropped with their gallery
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

// Default value functions
fn default_error_display_ms() -> u64 { 2000 }
fn default_true() -> bool { true }
fn default_local_path() -> String { "visual-supports.json".to_string() }
fn default_namespace() -> String { "visual-supports".to_string() }
fn default_blob_path() -> String { "visual-supports.db".to_string() }
fn default_api_base() -> String { "https://api.github.com".to_string() }
fn default_branch() -> String { "main".to_string() }
fn default_content_path() -> String { "visuals".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_max_bytes() -> usize { 25 * 1024 * 1024 }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }
fn default_session_idle_secs() -> u64 { 30 * 60 }

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            unlock: UnlockPolicy::StaticMatch {
                expected: "345-BXH".to_string(),
            },
            error_display_ms: default_error_display_ms(),
            verify_with_probe: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local {
            path: default_local_path(),
            namespace: default_namespace(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl StoreConfig {
    /// Short backend name for logs
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Local { .. } => "local",
            StoreConfig::Blob { .. } => "blob",
            StoreConfig::Remote(_) => "remote",
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::VisualError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that cannot work at runtime
    pub fn validate(&self) -> crate::Result<()> {
        match &self.gate.unlock {
            UnlockPolicy::StaticMatch { expected } if expected.trim().is_empty() => {
                return Err(crate::VisualError::Config(
                    "gate.unlock.expected must not be empty".to_string(),
                ));
            }
            UnlockPolicy::EncryptedToken { ciphertext } if ciphertext.trim().is_empty() => {
                return Err(crate::VisualError::Config(
                    "gate.unlock.ciphertext must not be empty".to_string(),
                ));
            }
            _ => {}
        }
        if let StoreConfig::Remote(remote) = &self.store {
            if remote.owner.is_empty() || remote.repo.is_empty() {
                return Err(crate::VisualError::Config(
                    "store.owner and store.repo are required for the remote backend".to_string(),
                ));
            }
        }
        if self.web.session_idle_secs == 0 {
            return Err(crate::VisualError::Config(
                "web.session_idle_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
