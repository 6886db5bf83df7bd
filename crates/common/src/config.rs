// Solide - Solidity Workspace Engine
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Configuration system for Solide.
//!
//! The configuration is read from a TOML file and then overridden by the
//! environment variables declared in [`crate::env`].

use std::{env, fs, path::PathBuf, time::Duration};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::env::{SOLIDE_COMPILER_API_URL, SOLIDE_CONFIG, SOLIDE_SOLC_VERSION, SOLIDE_STORE_DIR};

/// Solidity version used when neither the source nor the configuration names one.
pub const DEFAULT_SOLC_VERSION: &str = "0.8.20";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolideConfig {
    /// File store settings
    pub store: StoreConfig,
    /// Compilation settings
    pub compiler: CompilerConfig,
    /// Import resolution settings
    pub imports: ImportConfig,
}

/// File store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the disk store. `None` means `~/.solide/workspace`.
    pub root: Option<PathBuf>,
}

/// Compiler and orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Solidity compiler version loaded by the local worker
    pub solc_version: String,
    /// Remote compile service; the local worker is used when unset
    pub api_url: Option<String>,
    /// Window during which byte-identical input is not recompiled
    pub cooldown_ms: u64,
    /// Delay before a queued request runs after the previous one finishes
    pub requeue_delay_ms: u64,
    /// Timeout of a single request to the remote compile service
    pub request_timeout_secs: u64,
}

/// A remote location imports with a given prefix are fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    /// Import prefix, e.g. `@openzeppelin/contracts/`
    pub prefix: String,
    /// URL the remainder of the import path is appended to
    pub base_url: String,
}

/// Import resolution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Remote sources consulted for imports absent from the workspace
    pub remotes: Vec<RemoteSource>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            solc_version: DEFAULT_SOLC_VERSION.to_string(),
            api_url: None,
            cooldown_ms: 2_000,
            requeue_delay_ms: 100,
            request_timeout_secs: 60,
        }
    }
}

impl CompilerConfig {
    /// Cooldown window as a [`Duration`].
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Requeue delay as a [`Duration`].
    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    /// Remote request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured compiler version, parsed.
    pub fn version(&self) -> Result<semver::Version> {
        semver::Version::parse(&self.solc_version)
            .wrap_err_with(|| format!("invalid solc version: {}", self.solc_version))
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            remotes: vec![RemoteSource {
                prefix: "@openzeppelin/contracts/".to_string(),
                base_url:
                    "https://raw.githubusercontent.com/OpenZeppelin/openzeppelin-contracts/v4.9.0/contracts/"
                        .to_string(),
            }],
        }
    }
}

impl SolideConfig {
    /// Solide's home directory: `~/.solide`.
    pub fn home_dir() -> Option<PathBuf> {
        dirs_next::home_dir().map(|p| p.join(".solide"))
    }

    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        env::var_os(SOLIDE_CONFIG)
            .map(PathBuf::from)
            .or_else(|| Self::home_dir().map(|p| p.join("config.toml")))
    }

    /// Effective store root.
    pub fn store_root(&self) -> Option<PathBuf> {
        self.store.root.clone().or_else(|| Self::home_dir().map(|p| p.join("workspace")))
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).wrap_err("failed to parse configuration")
    }

    /// Load the configuration from `path` (or the default location), then
    /// apply environment overrides. A missing file yields the defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path.or_else(Self::default_path) {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)
                    .wrap_err_with(|| format!("failed to read {}", path.display()))?;
                info!(path = %path.display(), "loaded configuration");
                Self::from_toml(&content)?
            }
            Some(path) => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) {
        if let Some(root) = env::var_os(SOLIDE_STORE_DIR) {
            self.store.root = Some(PathBuf::from(root));
        }
        if let Ok(version) = env::var(SOLIDE_SOLC_VERSION) {
            self.compiler.solc_version = version;
        }
        if let Ok(url) = env::var(SOLIDE_COMPILER_API_URL) {
            self.compiler.api_url = (!url.is_empty()).then_some(url);
        }
    }

    /// Check values that cannot be expressed through types alone.
    pub fn validate(&self) -> Result<()> {
        self.compiler.version()?;
        eyre::ensure!(
            self.imports.remotes.iter().all(|r| !r.prefix.is_empty()),
            "remote import sources must have a non-empty prefix"
        );
        Ok(())
    }

    /// Serialize to TOML text.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).wrap_err("failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = SolideConfig::default();
        assert_eq!(config.compiler.solc_version, DEFAULT_SOLC_VERSION);
        assert_eq!(config.compiler.cooldown(), Duration::from_secs(2));
        assert!(config.compiler.api_url.is_none());
        assert_eq!(config.imports.remotes.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SolideConfig::from_toml(
            r#"
            [compiler]
            solc_version = "0.8.19"
            "#,
        )
        .unwrap();

        assert_eq!(config.compiler.solc_version, "0.8.19");
        assert_eq!(config.compiler.requeue_delay_ms, 100);
        assert_eq!(config.imports, ImportConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = SolideConfig::default();
        config.store.root = Some(PathBuf::from("/tmp/ws"));
        config.compiler.api_url = Some("http://localhost:3000/api/compile".to_string());

        let text = config.to_toml().unwrap();
        assert_eq!(SolideConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_version_rejected() {
        let mut config = SolideConfig::default();
        config.compiler.solc_version = "latest".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var(SOLIDE_STORE_DIR, "/tmp/solide-env-store");
        env::set_var(SOLIDE_COMPILER_API_URL, "http://compile.local");

        let mut config = SolideConfig::default();
        config.apply_env();

        env::remove_var(SOLIDE_STORE_DIR);
        env::remove_var(SOLIDE_COMPILER_API_URL);

        assert_eq!(config.store_root(), Some(PathBuf::from("/tmp/solide-env-store")));
        assert_eq!(config.compiler.api_url.as_deref(), Some("http://compile.local"));
    }

    #[test]
    #[serial]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SolideConfig::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.compiler, CompilerConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[compiler]\ncooldown_ms = 500\n").unwrap();

        let config = SolideConfig::load(Some(path)).unwrap();
        assert_eq!(config.compiler.cooldown(), Duration::from_millis(500));
    }
}
