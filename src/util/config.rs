//! Ambient configuration for the build driver.
//!
//! These are the read-only knobs this surface exposes as process-environment
//! inputs. The core never acts on them beyond exposing them to the
//! (interface-only) toolchain/platform adapters - see [`crate::toolchain`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Driver-wide configuration, loaded from `.forge/config.toml` (project)
/// merged over `~/.forge/config.toml` (global), project taking precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sdk: SdkConfig,
    pub build: BuildConfig,
}

/// SDK discovery knobs. `BuildPlatformSDK` reads
/// these; the core only threads them through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Override for the `SDKS_ROOT` environment variable.
    pub sdks_root: Option<String>,
    /// Name of the platform auto-SDK setup environment variable to honor.
    pub auto_sdk_env_var: Option<String>,
    /// Forwarded verbatim to a wrapping static analyzer toolchain adapter.
    pub clang_static_analyzer_mode: Option<String>,
}

/// Ambient build knobs not specific to any one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default parallelism for the plugin discovery walk. `None` means
    /// let `rayon` pick based on available cores.
    pub jobs: Option<usize>,
    /// Suppress informational diagnostics (mirrors CLI `-Quiet`).
    pub quiet: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            jobs: None,
            quiet: false,
        }
    }
}

impl Config {
    /// Load configuration from a single TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration, falling back to defaults if the file is absent or
    /// malformed (malformed config is a warning, not a fatal error - it is
    /// not part of the target build pipeline proper).
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge `other` into `self`, with `other` taking precedence.
    pub fn merge(&mut self, other: Config) {
        if other.sdk.sdks_root.is_some() {
            self.sdk.sdks_root = other.sdk.sdks_root;
        }
        if other.sdk.auto_sdk_env_var.is_some() {
            self.sdk.auto_sdk_env_var = other.sdk.auto_sdk_env_var;
        }
        if other.sdk.clang_static_analyzer_mode.is_some() {
            self.sdk.clang_static_analyzer_mode = other.sdk.clang_static_analyzer_mode;
        }
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.quiet {
            self.build.quiet = true;
        }
    }

    /// Resolve the effective SDK root: explicit config, else `SDKS_ROOT` env var.
    pub fn sdks_root(&self) -> Option<String> {
        self.sdk
            .sdks_root
            .clone()
            .or_else(|| std::env::var("SDKS_ROOT").ok())
    }

    /// Resolve the effective analyzer mode: explicit config, else
    /// `CLANG_STATIC_ANALYZER_MODE` env var.
    pub fn clang_static_analyzer_mode(&self) -> Option<String> {
        self.sdk
            .clang_static_analyzer_mode
            .clone()
            .or_else(|| std::env::var("CLANG_STATIC_ANALYZER_MODE").ok())
    }
}

/// Load merged configuration: project config takes precedence over global.
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();
    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }
    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_has_no_overrides() {
        let config = Config::default();
        assert!(config.sdk.sdks_root.is_none());
        assert!(!config.build.quiet);
    }

    #[test]
    fn merge_prefers_other() {
        let mut base = Config::default();
        base.build.jobs = Some(4);

        let mut project = Config::default();
        project.build.quiet = true;

        base.merge(project);
        assert_eq!(base.build.jobs, Some(4));
        assert!(base.build.quiet);
    }

    #[test]
    fn load_parses_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[sdk]
sdks_root = "/opt/sdks"

[build]
jobs = 8
quiet = true
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sdk.sdks_root.as_deref(), Some("/opt/sdks"));
        assert_eq!(config.build.jobs, Some(8));
        assert!(config.build.quiet);
    }
}
