//! Configuration file support for keel.
//!
//! keel reads two configuration file locations:
//! - Global: `~/.keel/config.toml` - User-wide defaults
//! - Project: `.keel/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config, field by field.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::bootstrap::RecompilePolicy;
use crate::builder::toolchain::ToolchainPlatform;
use crate::builder::token::LanguageStandard;

/// keel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Toolchain selection and overrides
    pub toolchain: ToolchainSettings,

    /// Build settings
    pub build: BuildConfig,

    /// Logging settings
    pub log: LogConfig,

    /// Self-rebuild settings
    pub driver: DriverConfig,
}

/// Toolchain settings for C/C++ compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Toolchain family (gcc, clang, apple-clang, msvc)
    pub backend: Option<String>,

    /// Path to the compiler driver (e.g., /usr/bin/clang++)
    pub compiler: Option<PathBuf>,

    /// Path to the archiver (e.g., /usr/bin/llvm-ar)
    pub archiver: Option<PathBuf>,

    /// Program text replacing the compiler in compile commands
    pub compile_program: Option<String>,

    /// Program text replacing the linker in link commands
    pub link_program: Option<String>,

    /// Program text replacing the archiver in archive commands
    pub archive_program: Option<String>,

    /// Compiler flag spellings, keyed by kebab-case flag name
    pub compiler_flags: BTreeMap<String, String>,

    /// Linker flag spellings, keyed by kebab-case flag name
    pub linker_flags: BTreeMap<String, String>,
}

impl ToolchainSettings {
    /// Parse the backend name, if one is configured.
    pub fn platform(&self) -> Result<Option<ToolchainPlatform>> {
        self.backend
            .as_deref()
            .map(|s| s.parse::<ToolchainPlatform>().map_err(anyhow::Error::msg))
            .transpose()
    }

    /// Check if any program or flag-table override is configured.
    pub fn has_overrides(&self) -> bool {
        self.compile_program.is_some()
            || self.link_program.is_some()
            || self.archive_program.is_some()
            || !self.compiler_flags.is_empty()
            || !self.linker_flags.is_empty()
    }
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Extra arguments for every compile command
    pub compiler_args: Vec<String>,
    /// Extra arguments for every link command
    pub linker_args: Vec<String>,
    /// Number of parallel compile jobs (None = auto-detect)
    pub jobs: Option<usize>,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum log level (error, warn, info, debug, trace)
    pub level: Option<String>,
    /// Only print the end-of-run summary
    pub summary: bool,
}

impl LogConfig {
    /// The configured level, defaulting to `info`.
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }
}

/// Self-rebuild configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Driver source run by `keel run` when none is given
    pub source: Option<PathBuf>,
    /// Language standard used when rebuilding the driver
    pub standard: Option<LanguageStandard>,
    /// Whether a stale driver is rebuilt
    pub recompile: Option<RecompilePolicy>,
    /// Script run before every invocation
    pub init_script: Option<PathBuf>,
}

impl DriverConfig {
    /// The configured standard, defaulting to C++17.
    pub fn standard(&self) -> LanguageStandard {
        self.standard.unwrap_or(LanguageStandard::Cxx17)
    }

    /// The configured recompile policy, defaulting to `always`.
    pub fn recompile(&self) -> RecompilePolicy {
        self.recompile.unwrap_or_default()
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Toolchain settings
        let tc = other.toolchain;
        if tc.backend.is_some() {
            self.toolchain.backend = tc.backend;
        }
        if tc.compiler.is_some() {
            self.toolchain.compiler = tc.compiler;
        }
        if tc.archiver.is_some() {
            self.toolchain.archiver = tc.archiver;
        }
        if tc.compile_program.is_some() {
            self.toolchain.compile_program = tc.compile_program;
        }
        if tc.link_program.is_some() {
            self.toolchain.link_program = tc.link_program;
        }
        if tc.archive_program.is_some() {
            self.toolchain.archive_program = tc.archive_program;
        }
        // Flag tables merge entry by entry
        self.toolchain.compiler_flags.extend(tc.compiler_flags);
        self.toolchain.linker_flags.extend(tc.linker_flags);

        // Build settings
        if !other.build.compiler_args.is_empty() {
            self.build.compiler_args = other.build.compiler_args;
        }
        if !other.build.linker_args.is_empty() {
            self.build.linker_args = other.build.linker_args;
        }
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }

        // Log settings
        if other.log.level.is_some() {
            self.log.level = other.log.level;
        }
        if other.log.summary {
            self.log.summary = true;
        }

        // Driver settings
        if other.driver.source.is_some() {
            self.driver.source = other.driver.source;
        }
        if other.driver.standard.is_some() {
            self.driver.standard = other.driver.standard;
        }
        if other.driver.recompile.is_some() {
            self.driver.recompile = other.driver.recompile;
        }
        if other.driver.init_script.is_some() {
            self.driver.init_script = other.driver.init_script;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.keel/config.toml)
/// 2. Global config (~/.keel/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    // Load global config first
    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    // Project config overrides global
    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Load the configuration that applies to `cwd`.
pub fn load_config_for(cwd: &Path) -> Config {
    let project = project_config_path(cwd);
    match global_config_path() {
        Some(global) => load_config(&global, &project),
        None => load_config(&PathBuf::new(), &project),
    }
}

/// Get the global keel config directory (~/.keel).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".keel"))
}

/// Get the global config path (~/.keel/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.keel/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".keel").join("config.toml")
}
