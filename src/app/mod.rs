pub mod errors;
pub mod factory;

use std::sync::Arc;

use serde::Serialize;

use crate::analytics::{
    self, CustomerInfo, CustomerMovie, DailyRentals, DailyRentalsSummary, RankedMovie,
    RentalRecord, RevenueSummary, StoreRevenue,
};
use crate::config::Config;
use crate::corpus::{self, CorpusOverview};
use crate::semantic::{EngineStatus, RankError, RecommendationEngine, SimilarityResult};
use crate::source::{DataSource, Table};

pub use errors::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct DailyRentalsReport {
    pub year: i32,
    pub rows: Vec<DailyRentals>,
    pub summary: Option<DailyRentalsSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    pub stores: Vec<StoreRevenue>,
    pub summary: Option<RevenueSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopMoviesReport {
    pub year: i32,
    pub movies: Vec<RankedMovie>,
    pub top_per_store: Vec<RankedMovie>,
}

/// Everything a surface (CLI or HTTP) needs, wired to one data source and one engine.
pub struct App {
    config: Config,
    source: Arc<dyn DataSource>,
    engine: Arc<RecommendationEngine>,
}

impl App {
    pub fn new(
        config: Config,
        source: Arc<dyn DataSource>,
        engine: Arc<RecommendationEngine>,
    ) -> Self {
        Self {
            config,
            source,
            engine,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection_check(&self) -> Result<Table, AppError> {
        Ok(analytics::connection_check(self.source.as_ref())?)
    }

    /// Fresh read of the movie corpus, independent of the engine's snapshot.
    pub fn movies(&self, preview: usize) -> Result<CorpusOverview, AppError> {
        let records = corpus::load(self.source.as_ref())?;
        Ok(corpus::overview(&records, preview))
    }

    pub fn movies_table(&self) -> Result<Table, AppError> {
        let records = corpus::load(self.source.as_ref())?;
        Ok(corpus::to_table(&records))
    }

    pub fn daily_rentals(&self, year: Option<i32>) -> Result<DailyRentalsReport, AppError> {
        let year = year.unwrap_or(self.config.analytics.year);
        let rows = analytics::daily_rentals(self.source.as_ref(), year)?;
        let summary = analytics::daily_rentals_summary(&rows);

        Ok(DailyRentalsReport { year, rows, summary })
    }

    pub fn revenue(&self) -> Result<RevenueReport, AppError> {
        let stores = analytics::revenue_by_store(self.source.as_ref())?;
        let summary = analytics::revenue_summary(&stores);

        Ok(RevenueReport { stores, summary })
    }

    pub fn top_movies(
        &self,
        year: Option<i32>,
        per_store: Option<usize>,
    ) -> Result<TopMoviesReport, AppError> {
        let year = year.unwrap_or(self.config.analytics.year);
        let per_store = positive(
            per_store.unwrap_or(self.config.analytics.top_movies_per_store),
            "limit",
        )?;

        let movies = analytics::top_movies_by_store(self.source.as_ref(), year, per_store)?;
        let top_per_store = analytics::top_movie_per_store(&movies);

        Ok(TopMoviesReport {
            year,
            movies,
            top_per_store,
        })
    }

    pub fn customer(&self, customer_id: i64) -> Result<CustomerInfo, AppError> {
        analytics::customer_info(self.source.as_ref(), customer_id)?
            .ok_or(AppError::CustomerNotFound(customer_id))
    }

    pub fn rental_history(&self, customer_id: i64) -> Result<Vec<RentalRecord>, AppError> {
        self.customer(customer_id)?;
        Ok(analytics::rental_history(self.source.as_ref(), customer_id)?)
    }

    pub fn customer_top_movies(
        &self,
        customer_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<CustomerMovie>, AppError> {
        let limit = positive(
            limit.unwrap_or(self.config.analytics.customer_top_movies),
            "limit",
        )?;

        self.customer(customer_id)?;
        Ok(analytics::customer_top_movies(
            self.source.as_ref(),
            customer_id,
            limit,
        )?)
    }

    /// Check a recommendation request without touching the engine.
    ///
    /// Returns the effective count: `top_n`, or `semantic.default_top_n`
    /// when omitted. Blank descriptions and zero or negative counts are rejected.
    pub fn validate_recommend(
        &self,
        description: &str,
        top_n: Option<i64>,
    ) -> Result<usize, AppError> {
        let requested = match top_n {
            None => None,
            Some(n) if n <= 0 => {
                return Err(AppError::InvalidArgument(format!(
                    "top_n must be a positive integer, got {n}"
                )))
            }
            Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        };

        if description.trim().is_empty() {
            return Err(RankError::EmptyQuery.into());
        }

        Ok(self.config.top_n(requested))
    }

    /// Movies whose descriptions are closest to `description`, best first.
    /// Asking for more than the corpus holds returns the whole corpus ranked.
    pub fn recommend(
        &self,
        description: &str,
        top_n: Option<i64>,
    ) -> Result<Vec<SimilarityResult>, AppError> {
        let top_n = self.validate_recommend(description, top_n)?;
        Ok(self.engine.recommend(description, top_n)?)
    }

    /// Build the engine now rather than on the first recommendation.
    pub fn warm_up(&self) -> Result<EngineStatus, AppError> {
        self.engine.snapshot()?;
        Ok(self.engine.status())
    }

    pub fn reload(&self, reload_model: bool) -> Result<EngineStatus, AppError> {
        log::info!("reloading recommendation engine (reload_model: {reload_model})");
        self.engine.reload(reload_model)?;
        Ok(self.engine.status())
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.engine.status()
    }
}

fn positive(value: usize, name: &str) -> Result<usize, AppError> {
    if value == 0 {
        return Err(AppError::InvalidArgument(format!(
            "{name} must be a positive integer"
        )));
    }
    Ok(value)
}
