//! Dashboard queries over the rental schema and the metrics derived from them.
//!
//! Every query binds its inputs as parameters.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::dates::{format_date_with_ordinal, parse_date, parse_timestamp};
use crate::source::{DataSource, DataSourceError, Param, Row, Table};

const CONNECTION_CHECK_QUERY: &str = "SELECT * FROM actor ORDER BY last_name LIMIT 10";

const DAILY_RENTALS_QUERY: &str = "
    SELECT
        DATE(r.rental_date) AS rental_day,
        i.store_id,
        COUNT(r.rental_id) AS rental_count
    FROM rental r
    JOIN inventory i ON r.inventory_id = i.inventory_id
    WHERE strftime('%Y', r.rental_date) = ?1
    GROUP BY rental_day, i.store_id
    ORDER BY rental_day, i.store_id
";

const REVENUE_QUERY: &str = "
    SELECT
        s.store_id,
        SUM(p.amount) AS total_revenue
    FROM payment p
    JOIN rental r ON p.rental_id = r.rental_id
    JOIN inventory i ON r.inventory_id = i.inventory_id
    JOIN store s ON i.store_id = s.store_id
    GROUP BY s.store_id
    ORDER BY s.store_id
";

const TOP_MOVIES_QUERY: &str = "
    WITH ranked_movies AS (
        SELECT
            i.store_id,
            f.film_id,
            f.title,
            COUNT(r.rental_id) AS rental_count,
            ROW_NUMBER() OVER (
                PARTITION BY i.store_id
                ORDER BY COUNT(r.rental_id) DESC, f.film_id
            ) AS movie_rank
        FROM rental r
        JOIN inventory i ON r.inventory_id = i.inventory_id
        JOIN film f ON i.film_id = f.film_id
        WHERE strftime('%Y', r.rental_date) = ?1
        GROUP BY i.store_id, f.film_id, f.title
    )
    SELECT store_id, film_id, title, rental_count, movie_rank
    FROM ranked_movies
    WHERE movie_rank <= ?2
    ORDER BY store_id, movie_rank
";

const CUSTOMER_QUERY: &str = "
    SELECT
        cu.customer_id,
        cu.first_name || ' ' || cu.last_name AS customer_name,
        a.address,
        ci.city,
        co.country
    FROM customer cu
    JOIN address a ON cu.address_id = a.address_id
    JOIN city ci ON a.city_id = ci.city_id
    JOIN country co ON ci.country_id = co.country_id
    WHERE cu.customer_id = ?1
";

const RENTAL_HISTORY_QUERY: &str = "
    SELECT
        r.rental_id,
        f.film_id,
        f.title,
        f.description,
        c.name AS category,
        f.rating,
        r.rental_date,
        r.return_date
    FROM rental r
    JOIN inventory i ON r.inventory_id = i.inventory_id
    JOIN film f ON i.film_id = f.film_id
    JOIN film_category fc ON f.film_id = fc.film_id
    JOIN category c ON fc.category_id = c.category_id
    WHERE r.customer_id = ?1
    ORDER BY r.rental_date DESC, r.rental_id DESC
";

const CUSTOMER_TOP_MOVIES_QUERY: &str = "
    SELECT
        f.title,
        c.name AS category,
        f.rating,
        COUNT(r.rental_id) AS rental_count,
        MAX(r.rental_date) AS last_rented
    FROM rental r
    JOIN inventory i ON r.inventory_id = i.inventory_id
    JOIN film f ON i.film_id = f.film_id
    JOIN film_category fc ON f.film_id = fc.film_id
    JOIN category c ON fc.category_id = c.category_id
    WHERE r.customer_id = ?1
    GROUP BY f.film_id, c.name
    ORDER BY rental_count DESC, last_rented DESC
    LIMIT ?2
";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRentals {
    pub day: NaiveDate,
    pub store_id: i64,
    pub rental_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorePeak {
    pub store_id: i64,
    pub day: NaiveDate,
    pub rental_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRentalsSummary {
    pub total_days: usize,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    /// e.g. "May 24th to Aug 23rd"
    pub date_range: String,
    pub peaks: Vec<StorePeak>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRevenue {
    pub store_id: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub total: f64,
    pub max: f64,
    pub min: f64,
    pub min_store: i64,
    pub diff: f64,
    /// Difference relative to the lowest-earning store; `None` when that store earned nothing
    pub percent_diff: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMovie {
    pub store_id: i64,
    pub film_id: i64,
    pub title: String,
    pub rental_count: i64,
    pub movie_rank: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerInfo {
    pub customer_id: i64,
    pub customer_name: String,
    pub address: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentalRecord {
    pub rental_id: i64,
    pub film_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub rating: String,
    pub rental_date: NaiveDateTime,
    pub return_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerMovie {
    pub title: String,
    pub category: String,
    pub rating: String,
    pub rental_count: i64,
    pub last_rented: NaiveDateTime,
}

/// Smoke test: the first ten actors by last name.
pub fn connection_check(source: &dyn DataSource) -> Result<Table, DataSourceError> {
    source.query(CONNECTION_CHECK_QUERY, &[])
}

pub fn daily_rentals(
    source: &dyn DataSource,
    year: i32,
) -> Result<Vec<DailyRentals>, DataSourceError> {
    let table = source.query(DAILY_RENTALS_QUERY, &[Param::Text(year.to_string())])?;

    table
        .rows()
        .map(|row| {
            Ok(DailyRentals {
                day: date_column(&row, "rental_day")?,
                store_id: row.i64("store_id")?,
                rental_count: row.i64("rental_count")?,
            })
        })
        .collect()
}

/// Distinct days, formatted range and the busiest day of each store.
pub fn daily_rentals_summary(rows: &[DailyRentals]) -> Option<DailyRentalsSummary> {
    let first_day = rows.iter().map(|r| r.day).min()?;
    let last_day = rows.iter().map(|r| r.day).max()?;

    let mut days: Vec<NaiveDate> = rows.iter().map(|r| r.day).collect();
    days.sort();
    days.dedup();

    let mut peaks: Vec<StorePeak> = Vec::new();
    for row in rows {
        match peaks.iter_mut().find(|p| p.store_id == row.store_id) {
            Some(peak) => {
                // earliest day wins a tie
                if row.rental_count > peak.rental_count
                    || (row.rental_count == peak.rental_count && row.day < peak.day)
                {
                    peak.day = row.day;
                    peak.rental_count = row.rental_count;
                }
            }
            None => peaks.push(StorePeak {
                store_id: row.store_id,
                day: row.day,
                rental_count: row.rental_count,
            }),
        }
    }
    peaks.sort_by_key(|p| p.store_id);

    Some(DailyRentalsSummary {
        total_days: days.len(),
        first_day,
        last_day,
        date_range: format!(
            "{} to {}",
            format_date_with_ordinal(first_day),
            format_date_with_ordinal(last_day)
        ),
        peaks,
    })
}

pub fn revenue_by_store(source: &dyn DataSource) -> Result<Vec<StoreRevenue>, DataSourceError> {
    let table = source.query(REVENUE_QUERY, &[])?;

    table
        .rows()
        .map(|row| {
            Ok(StoreRevenue {
                store_id: row.i64("store_id")?,
                total_revenue: row.f64("total_revenue")?,
            })
        })
        .collect()
}

pub fn revenue_summary(rows: &[StoreRevenue]) -> Option<RevenueSummary> {
    let max = rows
        .iter()
        .map(|r| r.total_revenue)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))?;
    let min_row = rows.iter().fold(None, |acc: Option<&StoreRevenue>, r| match acc {
        Some(best) if best.total_revenue <= r.total_revenue => Some(best),
        _ => Some(r),
    })?;

    let min = min_row.total_revenue;
    let diff = max - min;

    Some(RevenueSummary {
        total: rows.iter().map(|r| r.total_revenue).sum(),
        max,
        min,
        min_store: min_row.store_id,
        diff,
        percent_diff: (min != 0.0).then(|| diff / min * 100.0),
    })
}

pub fn top_movies_by_store(
    source: &dyn DataSource,
    year: i32,
    per_store: usize,
) -> Result<Vec<RankedMovie>, DataSourceError> {
    let table = source.query(
        TOP_MOVIES_QUERY,
        &[Param::Text(year.to_string()), Param::Int(as_limit(per_store))],
    )?;

    table
        .rows()
        .map(|row| {
            Ok(RankedMovie {
                store_id: row.i64("store_id")?,
                film_id: row.i64("film_id")?,
                title: row.string("title")?,
                rental_count: row.i64("rental_count")?,
                movie_rank: row.i64("movie_rank")?,
            })
        })
        .collect()
}

/// The rank-1 movie of each store, in store order.
pub fn top_movie_per_store(movies: &[RankedMovie]) -> Vec<RankedMovie> {
    let mut top: Vec<RankedMovie> = movies
        .iter()
        .filter(|m| m.movie_rank == 1)
        .cloned()
        .collect();
    top.sort_by_key(|m| m.store_id);
    top
}

pub fn customer_info(
    source: &dyn DataSource,
    customer_id: i64,
) -> Result<Option<CustomerInfo>, DataSourceError> {
    let table = source.query(CUSTOMER_QUERY, &[Param::Int(customer_id)])?;

    let Some(row) = table.rows().next() else {
        return Ok(None);
    };

    Ok(Some(CustomerInfo {
        customer_id: row.i64("customer_id")?,
        customer_name: row.string("customer_name")?,
        address: row.opt_string("address")?.unwrap_or_default(),
        city: row.opt_string("city")?.unwrap_or_default(),
        country: row.opt_string("country")?.unwrap_or_default(),
    }))
}

/// Every rental of a customer, newest first.
pub fn rental_history(
    source: &dyn DataSource,
    customer_id: i64,
) -> Result<Vec<RentalRecord>, DataSourceError> {
    let table = source.query(RENTAL_HISTORY_QUERY, &[Param::Int(customer_id)])?;

    table
        .rows()
        .map(|row| {
            Ok(RentalRecord {
                rental_id: row.i64("rental_id")?,
                film_id: row.i64("film_id")?,
                title: row.string("title")?,
                description: row.opt_string("description")?,
                category: row.string("category")?,
                rating: row.opt_string("rating")?.unwrap_or_default(),
                rental_date: timestamp_column(&row, "rental_date")?,
                return_date: opt_timestamp_column(&row, "return_date")?,
            })
        })
        .collect()
}

/// A customer's most rented titles, ties broken by most recent rental.
pub fn customer_top_movies(
    source: &dyn DataSource,
    customer_id: i64,
    limit: usize,
) -> Result<Vec<CustomerMovie>, DataSourceError> {
    let table = source.query(
        CUSTOMER_TOP_MOVIES_QUERY,
        &[Param::Int(customer_id), Param::Int(as_limit(limit))],
    )?;

    table
        .rows()
        .map(|row| {
            Ok(CustomerMovie {
                title: row.string("title")?,
                category: row.string("category")?,
                rating: row.opt_string("rating")?.unwrap_or_default(),
                rental_count: row.i64("rental_count")?,
                last_rented: timestamp_column(&row, "last_rented")?,
            })
        })
        .collect()
}

fn as_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn date_column(row: &Row<'_>, column: &str) -> Result<NaiveDate, DataSourceError> {
    parse_date(&row.string(column)?).ok_or_else(|| DataSourceError::InvalidValue {
        column: column.to_string(),
        expected: "a date",
    })
}

fn timestamp_column(row: &Row<'_>, column: &str) -> Result<NaiveDateTime, DataSourceError> {
    opt_timestamp_column(row, column)?.ok_or_else(|| DataSourceError::InvalidValue {
        column: column.to_string(),
        expected: "a timestamp",
    })
}

fn opt_timestamp_column(
    row: &Row<'_>,
    column: &str,
) -> Result<Option<NaiveDateTime>, DataSourceError> {
    match row.opt_string(column)? {
        None => Ok(None),
        Some(value) => parse_timestamp(&value)
            .map(Some)
            .ok_or_else(|| DataSourceError::InvalidValue {
                column: column.to_string(),
                expected: "a timestamp",
            }),
    }
}
