//! Shared fixtures for the integration-style tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::semantic::{Embedder, EmbeddingError};
use crate::source::{DataSource, DataSourceError, Param, SqliteSource, Table};

mod app;

/// Bag-of-words embedder over a fixed vocabulary. Words outside the
/// vocabulary contribute nothing, so a text made only of unknown words
/// embeds to the zero vector.
pub struct VocabEmbedder {
    name: String,
    vocab: Vec<&'static str>,
    pub calls: AtomicUsize,
}

pub const VOCAB: &[&str] = &[
    "dog", "heroic", "adventure", "saves", "world", "romantic", "comedy", "paris", "space",
    "robot", "shark", "ocean", "love", "war", "detective", "crime",
];

impl VocabEmbedder {
    pub fn new() -> Self {
        Self::named("vocab-test")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vocab: VOCAB.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Same words, shorter vector: simulates a different model.
    pub fn truncated(name: &str, len: usize) -> Self {
        Self {
            name: name.to_string(),
            vocab: VOCAB[..len].to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Embedder for VocabEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.vocab.len()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut vector = vec![0.0; self.vocab.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if let Some(idx) = self.vocab.iter().position(|v| *v == word) {
                vector[idx] += 1.0;
            }
        }
        Ok(vector)
    }
}

/// A [`DataSource`] serving a canned table, switchable into a failing state.
pub struct MemorySource {
    table: Mutex<Table>,
    failing: AtomicBool,
    pub queries: AtomicUsize,
}

impl MemorySource {
    pub fn new(table: Table) -> Self {
        Self {
            table: Mutex::new(table),
            failing: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn set_table(&self, table: Table) {
        *self.table.lock().unwrap() = table;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl DataSource for MemorySource {
    fn query(&self, _sql: &str, _params: &[Param]) -> Result<Table, DataSourceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DataSourceError::Unreachable("connection refused".to_string()));
        }
        Ok(self.table.lock().unwrap().clone())
    }
}

/// Corpus-shaped table from (id, title, description, category) tuples.
pub fn corpus_table(rows: &[(i64, &str, &str, &str)]) -> Table {
    use crate::source::Cell;

    Table {
        columns: ["id", "title", "description", "category", "rating"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rows: rows
            .iter()
            .map(|(id, title, description, category)| {
                vec![
                    Cell::Integer(*id),
                    Cell::Text(title.to_string()),
                    Cell::Text(description.to_string()),
                    Cell::Text(category.to_string()),
                    Cell::Text("PG".to_string()),
                ]
            })
            .collect(),
    }
}

pub fn shared(embedder: VocabEmbedder) -> Arc<dyn Embedder> {
    Arc::new(embedder)
}

/// A cut-down Sakila database: two stores, a handful of films, rentals and payments.
pub fn create_fixture_db(path: &Path) -> SqliteSource {
    let conn = rusqlite::Connection::open(path).expect("failed to create fixture db");
    conn.execute_batch(FIXTURE_SQL).expect("failed to seed fixture db");
    SqliteSource::new(path)
}

const FIXTURE_SQL: &str = "
CREATE TABLE actor (actor_id INTEGER PRIMARY KEY, first_name TEXT, last_name TEXT);
CREATE TABLE country (country_id INTEGER PRIMARY KEY, country TEXT);
CREATE TABLE city (city_id INTEGER PRIMARY KEY, city TEXT, country_id INTEGER);
CREATE TABLE address (address_id INTEGER PRIMARY KEY, address TEXT, city_id INTEGER);
CREATE TABLE store (store_id INTEGER PRIMARY KEY, address_id INTEGER);
CREATE TABLE customer (
    customer_id INTEGER PRIMARY KEY, store_id INTEGER,
    first_name TEXT, last_name TEXT, address_id INTEGER
);
CREATE TABLE category (category_id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE film (
    film_id INTEGER PRIMARY KEY, title TEXT, description TEXT, rating TEXT
);
CREATE TABLE film_category (film_id INTEGER, category_id INTEGER);
CREATE TABLE inventory (inventory_id INTEGER PRIMARY KEY, film_id INTEGER, store_id INTEGER);
CREATE TABLE rental (
    rental_id INTEGER PRIMARY KEY, rental_date TEXT, inventory_id INTEGER,
    customer_id INTEGER, return_date TEXT
);
CREATE TABLE payment (
    payment_id INTEGER PRIMARY KEY, customer_id INTEGER, rental_id INTEGER, amount NUMERIC
);

INSERT INTO actor VALUES (1, 'PENELOPE', 'GUINESS'), (2, 'NICK', 'WAHLBERG'), (3, 'ED', 'CHASE');

INSERT INTO country VALUES (1, 'Canada'), (2, 'Australia');
INSERT INTO city VALUES (1, 'Lethbridge', 1), (2, 'Woodridge', 2);
INSERT INTO address VALUES (1, '47 MySakila Drive', 1), (2, '28 MySQL Boulevard', 2),
    (3, '1913 Hanoi Way', 1);
INSERT INTO store VALUES (1, 1), (2, 2);
INSERT INTO customer VALUES (1, 1, 'MARY', 'SMITH', 3), (2, 2, 'PATRICIA', 'JOHNSON', 2);

INSERT INTO category VALUES (1, 'Action'), (2, 'Comedy'), (3, 'Sci-Fi');
INSERT INTO film VALUES
    (1, 'DOG HEROES', 'A heroic dog saves the world', 'PG'),
    (2, 'PARIS LOVE', 'A romantic comedy in Paris', 'PG-13'),
    (3, 'ROBOT SPACE', 'A robot adventure in space', 'G'),
    (4, 'UNTITLED', NULL, 'R'),
    (5, 'BLANK', '   ', 'R');
INSERT INTO film_category VALUES (1, 1), (2, 2), (3, 3), (4, 1), (5, 2);

INSERT INTO inventory VALUES (1, 1, 1), (2, 2, 1), (3, 3, 2), (4, 1, 2);

INSERT INTO rental VALUES
    (1, '2005-05-24 22:53:30', 1, 1, '2005-05-26 22:04:30'),
    (2, '2005-05-24 23:03:39', 2, 1, '2005-05-28 19:40:33'),
    (3, '2005-05-25 10:00:00', 1, 2, NULL),
    (4, '2005-05-25 11:30:00', 3, 2, '2005-05-27 09:00:00'),
    (5, '2005-05-25 12:00:00', 4, 1, '2005-05-29 12:00:00'),
    (6, '2005-08-23 15:00:00', 4, 2, '2005-08-25 15:00:00'),
    (7, '2006-02-14 15:16:03', 1, 1, NULL);

INSERT INTO payment VALUES
    (1, 1, 1, 2.99), (2, 1, 2, 4.99), (3, 2, 3, 0.99),
    (4, 2, 4, 5.99), (5, 1, 5, 3.99), (6, 2, 6, 1.99), (7, 1, 7, 2.00);
";
