// Application configuration shared by the runner and the CLI
use crate::types::CaseMatching;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "config/cpptest.json";
pub const CONFIG_ENV: &str = "CPPTEST_CONFIG";
pub const COMPILER_ENV: &str = "CPPTEST_COMPILER";
pub const TESTS_DIR_ENV: &str = "CPPTEST_TESTS_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Toolchain and storage settings.
///
/// Timeouts of `0` (or `null`) in the config file mean "wait forever".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub compiler: String,
    pub compiler_args: Vec<String>,
    pub compile_timeout_ms: Option<u64>,
    pub run_timeout_ms: Option<u64>,
    pub tests_dir: Option<PathBuf>,
    pub forbidden_case: CaseMatching,
    pub executable_suffix: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
            compiler_args: Vec::new(),
            compile_timeout_ms: Some(10_000),
            run_timeout_ms: Some(30_000),
            tests_dir: None,
            forbidden_case: CaseMatching::Insensitive,
            executable_suffix: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the configuration the way both binaries do.
    ///
    /// Order: explicit path, `CPPTEST_CONFIG`, `config/cpptest.json` if it
    /// exists, built-in defaults. Environment overrides apply last.
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let default_path = Path::new(DEFAULT_CONFIG_PATH);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(&path)?,
            None if default_path.exists() => Self::load(default_path)?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(compiler) = std::env::var(COMPILER_ENV) {
            if !compiler.trim().is_empty() {
                self.compiler = compiler;
            }
        }
        if let Some(dir) = std::env::var_os(TESTS_DIR_ENV) {
            self.tests_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn compile_timeout(&self) -> Option<Duration> {
        as_timeout(self.compile_timeout_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        as_timeout(self.run_timeout_ms)
    }

    /// Tests directory: configured, or `tests/` beside the running executable.
    pub fn tests_dir(&self) -> PathBuf {
        if let Some(dir) = &self.tests_dir {
            return dir.clone();
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tests")
    }

    pub fn executable_suffix(&self) -> &str {
        self.executable_suffix
            .as_deref()
            .unwrap_or(std::env::consts::EXE_SUFFIX)
    }
}

fn as_timeout(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0).map(Duration::from_millis)
}
