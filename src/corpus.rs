use serde::{Deserialize, Serialize};

use crate::source::{DataSource, DataSourceError, Table};

const CORPUS_QUERY: &str = "
    SELECT
        f.film_id AS id,
        f.title,
        f.description,
        c.name AS category,
        f.rating
    FROM film f
    JOIN film_category fc ON f.film_id = fc.film_id
    JOIN category c ON fc.category_id = c.category_id
    WHERE f.description IS NOT NULL
    ORDER BY f.film_id, c.name
";

/// A movie as seen by the recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub rating: String,
}

/// Load every movie that has a usable description, in `film_id` order.
pub fn load(source: &dyn DataSource) -> Result<Vec<CorpusRecord>, DataSourceError> {
    let table = source.query(CORPUS_QUERY, &[])?;
    let records = from_table(&table)?;

    log::info!(
        "loaded {} corpus records ({} skipped)",
        records.len(),
        table.len() - records.len()
    );

    Ok(records)
}

fn from_table(table: &Table) -> Result<Vec<CorpusRecord>, DataSourceError> {
    let mut records = Vec::with_capacity(table.len());

    for row in table.rows() {
        let description = match row.opt_string("description")? {
            Some(d) if !d.trim().is_empty() => d,
            _ => continue,
        };

        records.push(CorpusRecord {
            id: row.i64("id")?,
            title: row.opt_string("title")?.unwrap_or_default(),
            description,
            category: row.opt_string("category")?.unwrap_or_default(),
            rating: row.opt_string("rating")?.unwrap_or_default(),
        });
    }

    Ok(records)
}

/// Summary shown when previewing the loaded movies.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusOverview {
    pub total: usize,
    pub categories: Vec<String>,
    pub preview: Vec<CorpusRecord>,
}

/// Count, distinct categories in first-seen order, and the first `preview` rows.
pub fn overview(records: &[CorpusRecord], preview: usize) -> CorpusOverview {
    let mut categories: Vec<String> = Vec::new();
    for record in records {
        if !categories.contains(&record.category) {
            categories.push(record.category.clone());
        }
    }

    CorpusOverview {
        total: records.len(),
        categories,
        preview: records.iter().take(preview).cloned().collect(),
    }
}

/// Flatten records into a [`Table`] for CSV export.
pub fn to_table(records: &[CorpusRecord]) -> Table {
    use crate::source::Cell;

    Table {
        columns: ["id", "title", "description", "category", "rating"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rows: records
            .iter()
            .map(|r| {
                vec![
                    Cell::Integer(r.id),
                    Cell::Text(r.title.clone()),
                    Cell::Text(r.description.clone()),
                    Cell::Text(r.category.clone()),
                    Cell::Text(r.rating.clone()),
                ]
            })
            .collect(),
    }
}
