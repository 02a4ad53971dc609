//! # jnitramp-config
//!
//! Configuration management for the jnitramp generator.
//!
//! Loads configuration from:
//! 1. `~/.jnitramp/config.toml` (global)
//! 2. `.jnitramp/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub use logging::{init_logging, Component, LogLevel};

/// Project-local config location, relative to the working directory.
pub const PROJECT_CONFIG_PATH: &str = ".jnitramp/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML render error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub runtime: RuntimeConfig,
    pub catalog: CatalogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        Self::load_from(global.as_deref(), Some(Path::new(PROJECT_CONFIG_PATH)))
    }

    /// Load config from explicit global/project files, then apply env overrides.
    ///
    /// Missing files are skipped. Project keys override global keys table by table,
    /// so a project file only needs to name what it changes.
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();

        for path in [global, project].into_iter().flatten() {
            if path.exists() {
                debug!("Loading config from {:?}", path);
                let contents = std::fs::read_to_string(path)?;
                let table: toml::Table = toml::from_str(&contents)?;
                merge_tables(&mut merged, table);
            }
        }

        let mut config: Config = toml::Value::Table(merged).try_into()?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Global config path: ~/.jnitramp/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".jnitramp/config.toml"))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = std::env::var("JNITRAMP_OUTPUT") {
            self.output.path = PathBuf::from(path);
        }
        if let Ok(scope) = std::env::var("JNITRAMP_SCOPE") {
            self.runtime.scope = scope;
        }
        if let Ok(format) = std::env::var("JNITRAMP_FORMAT") {
            self.output.format = format.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "JNITRAMP_FORMAT",
                value: format,
            })?;
        }
        Ok(())
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Artifact format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// C header consumed by the native loader
    #[default]
    C,
    /// JSON manifest for auditing tools
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" | "h" | "header" => Ok(OutputFormat::C),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where `generate` writes the artifact
    pub path: PathBuf,
    /// Include guard macro for the C header
    pub header_guard: String,
    pub format: OutputFormat,
    /// Mark trampolines `__attribute__((no_stack_protector))`
    pub no_stack_protector: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("jni_hooks.h"),
            header_guard: "JNI_HOOKS_H".to_string(),
            format: OutputFormat::C,
            no_stack_protector: true,
        }
    }
}

/// Names of the native collaborators the generated code calls into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Class whose native methods are swapped
    pub scope: String,
    /// Shared call-context struct
    pub context_struct: String,
    pub context_init: String,
    pub context_cleanup: String,
    /// Pre/post hooks are `<hook_prefix><family>_pre` / `_post`
    pub hook_prefix: String,
    /// Swaps a method table in place, writing originals into `fnPtr`
    pub bind_fn: String,
    /// Receives the selected hooks for later uninstall
    pub register_fn: String,
    /// Name of the emitted installer function
    pub install_fn: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scope: "com/android/internal/os/Zygote".to_string(),
            context_struct: "zygisk_context".to_string(),
            context_init: "rz_init".to_string(),
            context_cleanup: "rz_cleanup".to_string(),
            hook_prefix: "rz_".to_string(),
            bind_fn: "hook_jni_methods".to_string(),
            register_fn: "jni_hook_list_add".to_string(),
            install_fn: "do_hook_zygote".to_string(),
        }
    }
}

/// Catalog configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Extra variant files merged into the built-in catalog
    pub extra: Vec<PathBuf>,
    /// Families left out of the artifact entirely
    pub disabled_families: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output.header_guard, "JNI_HOOKS_H");
        assert_eq!(config.runtime.scope, "com/android/internal/os/Zygote");
        assert!(config.catalog.extra.is_empty());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml().unwrap();
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[runtime]"));
        assert!(toml_str.contains("hook_jni_methods"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("c".parse::<OutputFormat>().unwrap(), OutputFormat::C);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_merge_tables_is_per_key() {
        let mut base: toml::Table = toml::from_str(
            r#"
[output]
header_guard = "A_H"
no_stack_protector = false
"#,
        )
        .unwrap();
        let overlay: toml::Table = toml::from_str(
            r#"
[output]
header_guard = "B_H"
"#,
        )
        .unwrap();
        merge_tables(&mut base, overlay);

        let output = base["output"].as_table().unwrap();
        assert_eq!(output["header_guard"].as_str(), Some("B_H"));
        assert_eq!(output["no_stack_protector"].as_bool(), Some(false));
    }
}
