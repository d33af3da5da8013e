//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;

use chrono::NaiveDate;
use rowmap::{Connection, DataType, Dialect, Field, Row, entity, enumeration};
use tracing_subscriber::EnvFilter;

// Common test entities used across multiple test files

entity! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Customer {
        pub id: i64 => id(),
        pub name: String,
    }
}

entity! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Order {
        pub id: i64 => id().generated(),
        pub customer: Option<Box<Customer>> => join("customerId", "id"),
        pub total: i64,
    }
}

entity! {
    table = "employees",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Employee {
        pub id: i64 => id().generated(),
        pub name: String,
        pub manager: Option<Box<Employee>> => join("manager_id", "id"),
    }
}

entity! {
    table = "people",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Person {
        pub id: i64 => id(),
        pub name: String,
        pub age: i32,
    }
}

entity! {
    table = "memberships",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Membership {
        pub group_id: i64 => id(),
        pub user_id: i64 => id(),
        pub role: String,
    }
}

entity! {
    table = "audit_log",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct AuditEntry {
        pub message: String,
    }
}

enumeration! {
    pub enum Priority { Low, Medium, High }
}

entity! {
    table = "\"Tasks\"",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Task {
        pub id: i64 => id().generated(),
        pub title: String => column().rename("\"Title\""),
        pub priority: Priority => column().enum_by_name(),
        pub rank: Priority => column().enum_by_ordinal(),
        pub due: Option<NaiveDate>,
    }
}

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a row from `(label, value)` pairs.
pub fn row(fields: &[(&str, DataType)]) -> Row {
    Row::new(fields.iter().map(|(name, value)| Field::new(*name, value.clone())).collect())
}

/// A connection that records every statement and answers from a script.
#[derive(Debug)]
pub struct MockConnection {
    pub dialect: Dialect,
    pub statements: Vec<(String, Vec<DataType>)>,
    pub results: VecDeque<Vec<Row>>,
    pub affected: u64,
    pub next_key: i64,
    /// Number of inserts that succeed before every further insert fails.
    pub fail_after: Option<usize>,
    /// Report generated keys without column labels, as some drivers do.
    pub unlabelled: bool,
    inserts: usize,
}

impl MockConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            statements: Vec::new(),
            results: VecDeque::new(),
            affected: 1,
            next_key: 100,
            fail_after: None,
            unlabelled: false,
            inserts: 0,
        }
    }

    /// Queue the rows the next query returns.
    pub fn returning(mut self, rows: Vec<Row>) -> Self {
        self.results.push_back(rows);
        self
    }

    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|(sql, _)| sql.as_str()).collect()
    }
}

impl Connection for MockConnection {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn query(&mut self, sql: &str, params: &[DataType]) -> anyhow::Result<Vec<Row>> {
        self.statements.push((sql.to_string(), params.to_vec()));
        Ok(self.results.pop_front().unwrap_or_default())
    }

    fn exec(&mut self, sql: &str, params: &[DataType]) -> anyhow::Result<u64> {
        self.statements.push((sql.to_string(), params.to_vec()));
        Ok(self.affected)
    }

    fn insert(
        &mut self, sql: &str, params: &[DataType], generated: &[&str],
    ) -> anyhow::Result<Vec<Row>> {
        if self.fail_after.is_some_and(|limit| self.inserts >= limit) {
            anyhow::bail!("UNIQUE constraint failed");
        }
        self.inserts += 1;
        self.statements.push((sql.to_string(), params.to_vec()));

        let mut fields = Vec::new();
        for label in generated {
            let label = if self.unlabelled { "last_insert_rowid()" } else { *label };
            fields.push(Field::new(label, self.next_key));
            self.next_key += 1;
        }
        Ok(vec![Row::new(fields)])
    }
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize SQL for comparison by removing identifier quotes and normalizing whitespace.
/// Preserves quotes inside string literals.
fn canonicalize_sql(sql: &str) -> String {
    let mut cleaned = String::with_capacity(sql.len());
    let mut in_single_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_single_quote = !in_single_quote;
                cleaned.push(ch);
            }
            '"' if !in_single_quote => {
                // Strip identifier quoting to avoid brittle comparisons.
            }
            _ => cleaned.push(ch),
        }
    }

    normalize_sql(&cleaned)
}

/// Assert that SQL contains all expected fragments in order.
///
/// Identifier quotes and whitespace are normalized on both sides, so
/// fragments can be written without quoting.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        if fragment_canonical.is_empty() {
            continue;
        }

        if let Some(pos) = actual_canonical[search_start..].find(&fragment_canonical) {
            search_start += pos + fragment_canonical.len();
        } else {
            panic!(
                "expected SQL fragment `{fragment_canonical}` not found in `{actual_canonical}`"
            );
        }
    }
}
