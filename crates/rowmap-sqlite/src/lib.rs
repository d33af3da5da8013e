//! `SQLite` connection for rowmap.
//!
//! Wraps a [`rusqlite::Connection`] and implements [`rowmap::Connection`] so
//! the generated statements run against an embedded database. Intended for
//! development, tests and small single-process applications.
//!
//! ```ignore
//! use rowmap_sqlite::{ConnectOptions, SqliteConnection};
//!
//! let mut conn = SqliteConnection::open(&ConnectOptions::load()?)?;
//! conn.execute_batch("CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT)")?;
//! ```

use std::fmt;

use anyhow::{Context, Result};
use fromenv::FromEnv;
use rowmap::{DataType, Dialect, Field, Row};
use rusqlite::types::{Value, ValueRef};
use rusqlite::params_from_iter;
use tracing::instrument;

/// Options used to open the database.
///
/// Loaded from environment variables with [`ConnectOptions::load`].
#[derive(Debug, Clone, FromEnv)]
pub struct ConnectOptions {
    /// Path of the database file, or `:memory:`.
    #[env(from = "SQL_DATABASE", default = ":memory:")]
    pub database: String,
}

impl ConnectOptions {
    /// Load options from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::from_env().finalize().context("issue loading connection options")
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            database: ":memory:".to_string(),
        }
    }
}

/// A rowmap [`Connection`](rowmap::Connection) backed by `SQLite`.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    dialect: Dialect,
    database: String,
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").field("database", &self.database).finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open the database named by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened.
    #[instrument]
    pub fn open(options: &ConnectOptions) -> Result<Self> {
        tracing::debug!("opening SQLite database: {}", options.database);
        let conn = rusqlite::Connection::open(&options.database)
            .context("failed to open SQLite database")?;
        Ok(Self::from_rusqlite(conn, &options.database))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error when `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&ConnectOptions::default())
    }

    /// Wrap an existing handle.
    #[must_use]
    pub fn from_rusqlite(conn: rusqlite::Connection, database: impl Into<String>) -> Self {
        Self {
            conn,
            dialect: Dialect::sqlite(),
            database: database.into(),
        }
    }

    /// Run one or more semicolon separated statements without parameters,
    /// typically schema setup.
    ///
    /// # Errors
    ///
    /// Returns the first statement's error.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).context("failed to execute batch")
    }

    /// The underlying handle.
    #[must_use]
    pub const fn handle(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl rowmap::Connection for SqliteConnection {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    #[instrument(skip(self, params), fields(param_count = params.len()))]
    fn query(&mut self, sql: &str, params: &[DataType]) -> Result<Vec<Row>> {
        tracing::debug!("executing query: {sql}");
        let mut stmt = self.conn.prepare_cached(sql).context("failed to prepare statement")?;

        let values = params.iter().map(datatype_to_rusqlite_value).collect::<Result<Vec<_>>>()?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(ToString::to_string).collect();

        let mut rows = stmt.query(params_from_iter(values.iter())).context("failed to execute query")?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().context("failed to fetch row")? {
            let mut fields = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                let value = row.get_ref(i).context("failed to get column value")?;
                fields.push(Field {
                    name: name.clone(),
                    value: rusqlite_value_to_datatype(value)?,
                });
            }
            result.push(Row {
                index: result.len().to_string(),
                fields,
            });
        }

        Ok(result)
    }

    #[instrument(skip(self, params), fields(param_count = params.len()))]
    fn exec(&mut self, sql: &str, params: &[DataType]) -> Result<u64> {
        tracing::debug!("executing statement: {sql}");
        let mut stmt = self.conn.prepare_cached(sql).context("failed to prepare statement")?;

        let values = params.iter().map(datatype_to_rusqlite_value).collect::<Result<Vec<_>>>()?;
        let affected =
            stmt.execute(params_from_iter(values.iter())).context("failed to execute statement")?;

        Ok(affected as u64)
    }

    // SQLite reports the rowid of the last insert rather than returning rows;
    // it is the generated key of an INTEGER PRIMARY KEY column.
    fn insert(
        &mut self, sql: &str, params: &[DataType], generated: &[&str],
    ) -> Result<Vec<Row>> {
        self.exec(sql, params)?;
        if generated.is_empty() {
            return Ok(Vec::new());
        }

        let rowid = self.conn.last_insert_rowid();
        let fields = generated.iter().map(|label| Field::new(*label, rowid)).collect();
        Ok(vec![Row::new(fields)])
    }
}

// SQLite integers are signed 64-bit; wider unsigned values are rejected
// rather than stored as REAL.
fn datatype_to_rusqlite_value(dt: &DataType) -> Result<Value> {
    let value = match dt {
        DataType::Boolean(Some(b)) => Value::Integer(i64::from(*b)),
        DataType::Int32(Some(i)) => Value::Integer(i64::from(*i)),
        DataType::Int64(Some(i)) => Value::Integer(*i),
        DataType::Uint32(Some(u)) => Value::Integer(i64::from(*u)),
        DataType::Uint64(Some(u)) => Value::Integer(i64::try_from(*u).map_err(|_| {
            rowmap::Error::Conversion(format!("{u} does not fit an SQLite INTEGER"))
        })?),
        DataType::Float(Some(f)) => Value::Real(f64::from(*f)),
        DataType::Double(Some(f)) => Value::Real(*f),
        DataType::Str(Some(s))
        | DataType::Date(Some(s))
        | DataType::Time(Some(s))
        | DataType::Timestamp(Some(s)) => Value::Text(s.clone()),
        DataType::Binary(Some(b)) => Value::Blob(b.clone()),
        // all None variants map to NULL
        _ => Value::Null,
    };
    Ok(value)
}

fn rusqlite_value_to_datatype(value: ValueRef) -> Result<DataType> {
    match value {
        ValueRef::Null => Ok(DataType::Str(None)),
        ValueRef::Integer(i) => Ok(DataType::Int64(Some(i))),
        ValueRef::Real(f) => Ok(DataType::Double(Some(f))),
        ValueRef::Text(t) => {
            let s = std::str::from_utf8(t).context("invalid UTF-8 in text value")?;
            Ok(DataType::Str(Some(s.to_string())))
        }
        ValueRef::Blob(b) => Ok(DataType::Binary(Some(b.to_vec()))),
    }
}

#[cfg(test)]
mod tests {
    use rowmap::Connection as _;

    use super::*;

    #[test]
    fn raw_statements() {
        let mut conn = SqliteConnection::open_in_memory().expect("open");

        let affected = conn
            .exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)", &[])
            .expect("create table");
        assert_eq!(affected, 0);

        for (name, age) in [("Alice", 30), ("Bob", 25)] {
            let affected = conn
                .exec(
                    "INSERT INTO users (name, age) VALUES (?, ?)",
                    &[DataType::Str(Some(name.to_string())), DataType::Int32(Some(age))],
                )
                .expect("insert");
            assert_eq!(affected, 1);
        }

        let rows = conn.query("SELECT id, name, age FROM users ORDER BY name", &[]).expect("query");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].index, "1");
        assert_eq!(rows[0].fields[1].name, "name");
        assert_eq!(rows[0].get("name"), Some(&DataType::Str(Some("Alice".to_string()))));
    }

    #[test]
    fn insert_reports_rowid() {
        let mut conn = SqliteConnection::open_in_memory().expect("open");
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)").expect("schema");

        let sql = "INSERT INTO notes (body) VALUES (?)";
        let first = conn.insert(sql, &[DataType::Str(Some("a".to_string()))], &["id"]).expect("insert");
        let second = conn.insert(sql, &[DataType::Str(None)], &["id"]).expect("insert");

        assert_eq!(first[0].get("id"), Some(&DataType::Int64(Some(1))));
        assert_eq!(second[0].get("id"), Some(&DataType::Int64(Some(2))));
        assert!(conn.insert(sql, &[DataType::Str(None)], &[]).expect("insert").is_empty());
    }

    #[test]
    fn values_convert_both_ways() {
        assert_eq!(datatype_to_rusqlite_value(&DataType::Boolean(Some(true))).expect("bool"), Value::Integer(1));
        assert_eq!(
            datatype_to_rusqlite_value(&DataType::Date(Some("2024-02-29".to_string()))).expect("date"),
            Value::Text("2024-02-29".to_string())
        );
        assert_eq!(
            datatype_to_rusqlite_value(&DataType::Uint64(Some(1 << 62))).expect("fits"),
            Value::Integer(1 << 62)
        );
        assert_eq!(datatype_to_rusqlite_value(&DataType::Int64(None)).expect("null"), Value::Null);
        assert_eq!(rusqlite_value_to_datatype(ValueRef::Null).expect("null"), DataType::Str(None));
        assert!(rusqlite_value_to_datatype(ValueRef::Text(&[0xff])).is_err());
    }

    #[test]
    fn oversized_unsigned_is_a_conversion_error() {
        let err = datatype_to_rusqlite_value(&DataType::Uint64(Some(u64::MAX))).expect_err("too wide");
        assert!(err.downcast_ref::<rowmap::Error>().is_some_and(rowmap::Error::is_conversion));

        let mut conn = SqliteConnection::open_in_memory().expect("open");
        conn.execute_batch("CREATE TABLE counters (hits INTEGER)").expect("schema");
        let err = conn
            .exec("INSERT INTO counters (hits) VALUES (?)", &[DataType::Uint64(Some(u64::MAX))])
            .expect_err("rejected");
        assert!(rowmap::Error::from(err).is_conversion());
        assert!(conn.query("SELECT hits FROM counters", &[]).expect("query").is_empty());
    }
}
