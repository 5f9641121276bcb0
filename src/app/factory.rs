use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use homedir::my_home;

use crate::app::App;
use crate::config::Config;
use crate::semantic::RecommendationEngine;
use crate::source::{DataSource, SqliteSource};

/// Overrides the base directory holding config.yaml, the database and cached models
pub const BASE_PATH_ENV: &str = "SAKILA_BASE_PATH";

/// Application factory for wiring config, data source and engine together
pub struct AppFactory;

impl AppFactory {
    /// Resolve the base directory: `--base-path`, then `SAKILA_BASE_PATH`, then
    /// `~/.local/share/sakila`.
    pub fn base_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }

        if let Some(path) = std::env::var_os(BASE_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let home = my_home()
            .context("could not determine home directory")?
            .context("home directory path is empty")?;
        Ok(home.join(".local/share/sakila"))
    }

    pub fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
        let base_path = Self::base_path(explicit)?;
        Config::load_with(&base_path)
            .with_context(|| format!("failed to load config from {}", base_path.display()))
    }

    /// SQLite source plus a fastembed-backed engine, as configured.
    pub fn create_app(config: Config) -> App {
        let database = config.database_path();
        log::info!("using database {}", database.display());

        let source: Arc<dyn DataSource> = Arc::new(SqliteSource::new(database));
        let engine = Arc::new(RecommendationEngine::with_fastembed(
            source.clone(),
            &config.semantic,
            config.base_path().to_path_buf(),
        ));

        App::new(config, source, engine)
    }
}
