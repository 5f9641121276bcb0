//! Read-only access to the relational store.
//!
//! The rest of the crate only sees the [`DataSource`] trait: hand it SQL and
//! bound parameters, get back a [`Table`]. [`SqliteSource`] is the
//! production implementation and opens a fresh read-only connection per
//! query, so nothing is held open between requests.

use std::io::Write;
use std::path::PathBuf;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, ToSql};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("data source unreachable: {0}")]
    Unreachable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("column '{0}' not found in result")]
    MissingColumn(String),

    #[error("column '{column}' does not hold {expected}")]
    InvalidValue {
        column: String,
        expected: &'static str,
    },

    #[error("csv export failed: {0}")]
    Export(String),
}

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Text(String),
}

impl ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Param::Int(value) => value.to_sql(),
            Param::Text(value) => value.to_sql(),
        }
    }
}

/// One cell of a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    fn from_sqlite(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Cell::Text(format!("<{} bytes>", bytes.len())),
        }
    }

    fn to_field(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Integer(i) => i.to_string(),
            Cell::Real(f) => f.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// An ordered, untyped query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, name: &str) -> Result<usize, DataSourceError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DataSourceError::MissingColumn(name.to_string()))
    }

    /// Iterate rows with by-name typed accessors.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row { table: self, cells })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DataSourceError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)
            .map_err(|e| DataSourceError::Export(e.to_string()))?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(Cell::to_field))
                .map_err(|e| DataSourceError::Export(e.to_string()))?;
        }
        wtr.flush()
            .map_err(|e| DataSourceError::Export(e.to_string()))
    }
}

/// Borrowed view of a single row.
pub struct Row<'a> {
    table: &'a Table,
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    fn cell(&self, column: &str) -> Result<&'a Cell, DataSourceError> {
        let idx = self.table.column_index(column)?;
        self.cells
            .get(idx)
            .ok_or_else(|| DataSourceError::MissingColumn(column.to_string()))
    }

    pub fn i64(&self, column: &str) -> Result<i64, DataSourceError> {
        match self.cell(column)? {
            Cell::Integer(i) => Ok(*i),
            Cell::Text(s) => s.trim().parse().map_err(|_| invalid(column, "an integer")),
            _ => Err(invalid(column, "an integer")),
        }
    }

    pub fn f64(&self, column: &str) -> Result<f64, DataSourceError> {
        match self.cell(column)? {
            Cell::Integer(i) => Ok(*i as f64),
            Cell::Real(f) => Ok(*f),
            Cell::Text(s) => s.trim().parse().map_err(|_| invalid(column, "a number")),
            Cell::Null => Err(invalid(column, "a number")),
        }
    }

    pub fn string(&self, column: &str) -> Result<String, DataSourceError> {
        self.opt_string(column)?
            .ok_or_else(|| invalid(column, "a string"))
    }

    /// `None` for SQL NULL. Numbers are rendered as text.
    pub fn opt_string(&self, column: &str) -> Result<Option<String>, DataSourceError> {
        match self.cell(column)? {
            Cell::Null => Ok(None),
            cell => Ok(Some(cell.to_field())),
        }
    }
}

fn invalid(column: &str, expected: &'static str) -> DataSourceError {
    DataSourceError::InvalidValue {
        column: column.to_string(),
        expected,
    }
}

pub trait DataSource: Send + Sync {
    fn query(&self, sql: &str, params: &[Param]) -> Result<Table, DataSourceError>;
}

/// SQLite-backed source. Every query opens the database read-only.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn connect(&self) -> Result<Connection, DataSourceError> {
        if !self.path.exists() {
            return Err(DataSourceError::Unreachable(format!(
                "database file {} does not exist",
                self.path.display()
            )));
        }

        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| DataSourceError::Unreachable(format!("{}: {}", self.path.display(), e)))
    }
}

impl DataSource for SqliteSource {
    fn query(&self, sql: &str, params: &[Param]) -> Result<Table, DataSourceError> {
        let connection = self.connect()?;

        let mut statement = connection
            .prepare(sql)
            .map_err(|e| DataSourceError::Query(e.to_string()))?;

        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let mut rows = statement
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(|e| DataSourceError::Query(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DataSourceError::Query(e.to_string()))?
        {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| DataSourceError::Query(e.to_string()))?;
                cells.push(Cell::from_sqlite(value));
            }
            out.push(cells);
        }

        log::debug!("query returned {} rows", out.len());

        Ok(Table { columns, rows: out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, SqliteSource) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER, name TEXT, amount REAL, note TEXT);
             INSERT INTO t VALUES (1, 'one', 1.5, NULL);
             INSERT INTO t VALUES (2, 'two, too', 2.0, 'x');",
        )
        .unwrap();
        (tmp, SqliteSource::new(path))
    }

    #[test]
    fn test_query_with_params() {
        let (_tmp, source) = fixture();
        let table = source
            .query("SELECT id, name FROM t WHERE id = ?1", &[Param::Int(2)])
            .unwrap();

        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.len(), 1);
        let row = table.rows().next().unwrap();
        assert_eq!(row.i64("id").unwrap(), 2);
        assert_eq!(row.string("name").unwrap(), "two, too");
    }

    #[test]
    fn test_typed_accessors() {
        let (_tmp, source) = fixture();
        let table = source.query("SELECT * FROM t ORDER BY id", &[]).unwrap();
        let rows: Vec<_> = table.rows().collect();

        assert_eq!(rows[0].f64("amount").unwrap(), 1.5);
        assert_eq!(rows[0].f64("id").unwrap(), 1.0);
        assert_eq!(rows[0].opt_string("note").unwrap(), None);
        assert!(matches!(
            rows[0].string("note"),
            Err(DataSourceError::InvalidValue { .. })
        ));
        assert!(matches!(
            rows[0].i64("missing"),
            Err(DataSourceError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_malformed_query() {
        let (_tmp, source) = fixture();
        let result = source.query("SELEC nope", &[]);
        assert!(matches!(result, Err(DataSourceError::Query(_))));
    }

    #[test]
    fn test_missing_database_is_unreachable() {
        let tmp = tempfile::tempdir().unwrap();
        let source = SqliteSource::new(tmp.path().join("absent.db"));
        let result = source.query("SELECT 1", &[]);
        assert!(matches!(result, Err(DataSourceError::Unreachable(_))));
    }

    #[test]
    fn test_read_only() {
        let (_tmp, source) = fixture();
        let result = source.query("DELETE FROM t", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_csv_quotes_fields() {
        let (_tmp, source) = fixture();
        let table = source
            .query("SELECT id, name, note FROM t ORDER BY id", &[])
            .unwrap();

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(text, "id,name,note\n1,one,\n2,\"two, too\",x\n");
    }
}
