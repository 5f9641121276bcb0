use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::{corpus_table, create_fixture_db, shared, MemorySource, VocabEmbedder};
use crate::app::{App, AppError};
use crate::config::Config;
use crate::semantic::{EmbedderLoader, RecommendationEngine};
use crate::source::DataSource;

/// An App over the fixture database with the vocabulary embedder.
/// The TempDir must outlive the App.
pub fn create_app() -> (App, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let config = Config::load_with(tmp.path()).expect("failed to load config");

    let source: Arc<dyn DataSource> = Arc::new(create_fixture_db(&tmp.path().join("sakila.db")));
    let embedder = shared(VocabEmbedder::new());
    let loader: EmbedderLoader = Box::new(move || Ok(embedder.clone()));
    let engine = Arc::new(RecommendationEngine::new(source.clone(), loader));

    (App::new(config, source, engine), tmp)
}

#[test]
fn test_recommend_defaults_to_configured_top_n() {
    let (app, _tmp) = create_app();
    assert_eq!(app.config().semantic.default_top_n, 3);

    let results = app.recommend("heroic dog adventure", None).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].record.title, "DOG HEROES");
}

#[test]
fn test_recommend_rejects_non_positive_top_n() {
    let (app, _tmp) = create_app();

    for top_n in [0, -1, i64::MIN] {
        let result = app.recommend("dog", Some(top_n));
        assert!(matches!(result, Err(AppError::InvalidArgument(_))), "top_n {top_n}");
    }
    assert!(!app.engine_status().initialized);
}

#[test]
fn test_recommend_blank_query() {
    let (app, _tmp) = create_app();
    assert!(matches!(
        app.recommend("   ", Some(2)),
        Err(AppError::EmptyQuery(_))
    ));
}

/// An App over an in-memory corpus of `size` dog movies.
fn create_memory_app(size: i64) -> (App, Arc<MemorySource>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::load_with(tmp.path()).unwrap();

    let rows: Vec<(i64, String, String)> = (1..=size)
        .map(|id| (id, format!("MOVIE {id}"), format!("dog number {id}")))
        .collect();
    let rows: Vec<(i64, &str, &str, &str)> = rows
        .iter()
        .map(|(id, title, description)| (*id, title.as_str(), description.as_str(), "Action"))
        .collect();

    let memory = Arc::new(MemorySource::new(corpus_table(&rows)));
    let source: Arc<dyn DataSource> = memory.clone();
    let loader: EmbedderLoader = Box::new(|| Ok(shared(VocabEmbedder::new())));
    let engine = Arc::new(RecommendationEngine::new(source.clone(), loader));

    (App::new(config, source, engine), memory, tmp)
}

#[test]
fn test_recommend_returns_requested_count_beyond_default() {
    let (app, _source, _tmp) = create_memory_app(120);

    for top_n in [3, 60, 100, 120] {
        let results = app.recommend("dog", Some(top_n)).unwrap();
        assert_eq!(results.len(), top_n as usize, "top_n {top_n}");
    }

    let results = app.recommend("dog", Some(500)).unwrap();
    assert_eq!(results.len(), 120);

    let results = app.recommend("dog", Some(i64::MAX)).unwrap();
    assert_eq!(results.len(), 120);
}

#[test]
fn test_validate_recommend_does_not_load_engine() {
    let (app, source, _tmp) = create_memory_app(5);

    assert_eq!(app.validate_recommend("dog", None).unwrap(), 3);
    assert_eq!(app.validate_recommend("dog", Some(200)).unwrap(), 200);
    assert!(matches!(
        app.validate_recommend("  ", Some(2)),
        Err(AppError::EmptyQuery(_))
    ));
    assert!(matches!(
        app.validate_recommend("dog", Some(0)),
        Err(AppError::InvalidArgument(_))
    ));
    assert!(matches!(
        app.validate_recommend("", Some(-4)),
        Err(AppError::InvalidArgument(_))
    ));

    assert!(!app.engine_status().initialized);
    assert_eq!(source.queries.load(Ordering::SeqCst), 0);
}

#[test]
fn test_warm_up_and_reload() {
    let (app, _tmp) = create_app();

    let status = app.warm_up().unwrap();
    assert!(status.initialized);
    assert_eq!(status.corpus_size, 3);
    assert_eq!(status.dimensions, Some(16));

    let status = app.reload(false).unwrap();
    assert_eq!(status.generation, 2);
}

#[test]
fn test_movies_overview() {
    let (app, _tmp) = create_app();
    let overview = app.movies(2).unwrap();

    assert_eq!(overview.total, 3);
    assert_eq!(overview.categories, vec!["Action", "Comedy", "Sci-Fi"]);
    assert_eq!(overview.preview.len(), 2);

    let table = app.movies_table().unwrap();
    assert_eq!(table.len(), 3);
}

#[test]
fn test_reports_use_configured_year() {
    let (app, _tmp) = create_app();

    let daily = app.daily_rentals(None).unwrap();
    assert_eq!(daily.year, 2005);
    assert_eq!(daily.rows.len(), 4);
    assert!(daily.summary.is_some());

    let daily = app.daily_rentals(Some(1990)).unwrap();
    assert!(daily.rows.is_empty());
    assert!(daily.summary.is_none());

    let top = app.top_movies(None, None).unwrap();
    assert_eq!(top.movies.len(), 4);
    assert_eq!(top.top_per_store.len(), 2);

    assert!(matches!(
        app.top_movies(None, Some(0)),
        Err(AppError::InvalidArgument(_))
    ));

    let revenue = app.revenue().unwrap();
    assert_eq!(revenue.stores.len(), 2);
    assert_eq!(revenue.summary.unwrap().min_store, 1);
}

#[test]
fn test_customer_lookups() {
    let (app, _tmp) = create_app();

    assert_eq!(app.customer(2).unwrap().customer_name, "PATRICIA JOHNSON");
    assert_eq!(app.rental_history(2).unwrap().len(), 3);
    assert_eq!(app.customer_top_movies(1, None).unwrap().len(), 2);

    assert!(matches!(app.customer(42), Err(AppError::CustomerNotFound(42))));
    assert!(matches!(
        app.rental_history(42),
        Err(AppError::CustomerNotFound(42))
    ));
    assert!(matches!(
        app.customer_top_movies(1, Some(0)),
        Err(AppError::InvalidArgument(_))
    ));
}

#[test]
fn test_unreachable_database() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::load_with(tmp.path()).unwrap();
    let source: Arc<dyn DataSource> =
        Arc::new(crate::source::SqliteSource::new(tmp.path().join("missing.db")));
    let loader: EmbedderLoader = Box::new(|| Ok(shared(VocabEmbedder::new())));
    let engine = Arc::new(RecommendationEngine::new(source.clone(), loader));
    let app = App::new(config, source, engine);

    assert!(matches!(app.connection_check(), Err(AppError::DataSource(_))));
    assert!(matches!(
        app.recommend("dog", None),
        Err(AppError::DataSource(_))
    ));
}
