//! The execution contract a database backend fulfils.

use std::fmt::{self, Debug};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::types::{DataType, Row};

/// Backends implement [`Connection`] to execute generated SQL against a live
/// database handle. Placeholders bind positionally, first parameter first.
///
/// Every call is synchronous and runs on the caller's thread. The handle
/// belongs to the caller; nothing here closes it.
pub trait Connection: Debug {
    /// SQL dialect spoken by the database behind this connection.
    fn dialect(&self) -> &Dialect;

    /// Execute a query and return the resulting rows with their column labels.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    fn query(&mut self, sql: &str, params: &[DataType]) -> anyhow::Result<Vec<Row>>;

    /// Execute a statement that does not return rows and report the number of
    /// rows affected.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    fn exec(&mut self, sql: &str, params: &[DataType]) -> anyhow::Result<u64>;

    /// Execute an INSERT and return the keys the database generated, one
    /// field per entry of `generated`, labelled by column where the backend
    /// knows the label.
    ///
    /// The default runs the statement as a query when keys are expected, which
    /// suits dialects whose INSERT carries a `RETURNING` clause.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    fn insert(
        &mut self, sql: &str, params: &[DataType], generated: &[&str],
    ) -> anyhow::Result<Vec<Row>> {
        if generated.is_empty() {
            self.exec(sql, params)?;
            return Ok(Vec::new());
        }
        self.query(sql, params)
    }

    /// Execute one INSERT for each entry of `batch`, in order, returning the
    /// generated keys of each entry.
    ///
    /// The default executes the entries one at a time.
    ///
    /// # Errors
    ///
    /// Returns the keys of the entries that completed together with the
    /// backend's error.
    fn insert_batch(
        &mut self, sql: &str, batch: &[Vec<DataType>], generated: &[&str],
    ) -> Result<Vec<Row>, BatchFailure> {
        let mut completed = Vec::with_capacity(batch.len());
        for params in batch {
            match self.insert(sql, params, generated) {
                Ok(rows) => completed.push(rows.into_iter().next().unwrap_or_default()),
                Err(error) => return Err(BatchFailure { completed, error }),
            }
        }
        Ok(completed)
    }
}

/// A batch that stopped part way. Entries before the failing one completed
/// and their generated keys are kept in submission order.
pub struct BatchFailure {
    /// Rows reported for the completed entries, one per entry.
    pub completed: Vec<Row>,
    /// Error of the entry that failed.
    pub error: anyhow::Error,
}

impl Debug for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchFailure")
            .field("completed", &self.completed.len())
            .field("error", &self.error)
            .finish()
    }
}

/// Run `work` inside a transaction on `conn`: committed when `work` succeeds,
/// rolled back when it fails.
///
/// # Errors
///
/// Returns the error from `work`, or the backend's error when the
/// transaction cannot be opened or committed. A failed rollback is logged
/// and the original error is returned.
pub fn transaction<C, F, R>(conn: &mut C, work: F) -> Result<R>
where
    C: Connection + ?Sized,
    F: FnOnce(&mut C) -> Result<R>,
{
    let begin = conn.dialect().begin;
    conn.exec(begin, &[])?;

    match work(conn) {
        Ok(value) => {
            conn.exec("COMMIT", &[])?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = conn.exec("ROLLBACK", &[]) {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(error)
        }
    }
}
