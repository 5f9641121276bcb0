use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::semantic::{DEFAULT_MODEL, DEFAULT_TOP_N};

const CONFIG_FILE: &str = "config.yaml";

/// Overrides `database.path` when set
pub const DATABASE_ENV: &str = "SAKILA_DB";

const DEFAULT_DATABASE: &str = "sakila.db";
const DEFAULT_YEAR: i32 = 2005;
const DEFAULT_TOP_MOVIES_PER_STORE: usize = 5;
const DEFAULT_CUSTOMER_TOP_MOVIES: usize = 10;
const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the Sakila schema. Relative paths resolve against the base directory.
    #[serde(default = "default_database")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE)
}

/// Configuration for the recommendation engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Recommendations returned when the caller does not ask for a count
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// Build the engine when the daemon starts instead of on first request
    #[serde(default)]
    pub warm_on_start: bool,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            model: default_semantic_model(),
            default_top_n: default_top_n(),
            warm_on_start: false,
        }
    }
}

fn default_semantic_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Year the rental charts cover
    #[serde(default = "default_year")]
    pub year: i32,

    #[serde(default = "default_top_movies_per_store")]
    pub top_movies_per_store: usize,

    #[serde(default = "default_customer_top_movies")]
    pub customer_top_movies: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            year: default_year(),
            top_movies_per_store: default_top_movies_per_store(),
            customer_top_movies: default_customer_top_movies(),
        }
    }
}

fn default_year() -> i32 {
    DEFAULT_YEAR
}

fn default_top_movies_per_store() -> usize {
    DEFAULT_TOP_MOVIES_PER_STORE
}

fn default_customer_top_movies() -> usize {
    DEFAULT_CUSTOMER_TOP_MOVIES
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory with the browser front-end, served at `/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: None,
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    fn validate(&self) -> Result<()> {
        let sem = &self.semantic;
        if sem.default_top_n == 0 {
            bail!("semantic.default_top_n must be greater than 0");
        }

        let analytics = &self.analytics;
        if !(1900..=2100).contains(&analytics.year) {
            bail!("analytics.year must be a plausible year, got {}", analytics.year);
        }
        if analytics.top_movies_per_store == 0 {
            bail!("analytics.top_movies_per_store must be greater than 0");
        }
        if analytics.customer_top_movies == 0 {
            bail!("analytics.customer_top_movies must be greater than 0");
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            bail!("server.bind is not a valid socket address: {}", self.server.bind);
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing defaults if it does not exist.
    pub fn load_with(base_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        let path = base_path.join(CONFIG_FILE);
        if !path.exists() {
            write_atomic(&path, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", path.display()))?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        write_atomic(&self.base_path.join(CONFIG_FILE), config_str.as_bytes())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Database location after applying `SAKILA_DB` and base-path resolution.
    pub fn database_path(&self) -> PathBuf {
        let path = std::env::var_os(DATABASE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.database.path.clone());

        if path.is_absolute() {
            path
        } else {
            self.base_path.join(path)
        }
    }

    /// Recommendation count: the requested one, else `semantic.default_top_n`.
    pub fn top_n(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.semantic.default_top_n)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension(format!("yaml.{}.tmp", std::process::id()));
    std::fs::write(&temp_path, data)
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
