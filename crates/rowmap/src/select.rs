use std::marker::PhantomData;

use sea_query::{ColumnRef, Expr, IntoIden, JoinType, SimpleExpr};

use crate::connection::Connection;
use crate::dialect::{Dialect, Name};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::filter::{Filter, Scope};
use crate::materialize::materialize_all;
use crate::metadata::{ClassMetadata, describe};
use crate::plan::Plan;
use crate::query::{Binds, Query, literal};
use crate::types::DataType;

const CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE", "ORDER", "GROUP", "HAVING", "LIMIT", "OFFSET", "FETCH", "JOIN", "UNION", "WINDOW",
];

/// Builder for constructing SELECT queries.
///
/// The column list is every selectable attribute of the entity, qualified by
/// its table, in declaration order. A raw `fragment` is appended verbatim
/// when it starts with a clause keyword (`WHERE`, `ORDER BY`, ...) or has its
/// own top-level `WHERE` or `JOIN`. Otherwise its leading predicate goes
/// after an implicit `WHERE` and any trailing clause (`ORDER BY`, `LIMIT`,
/// ...) follows it.
pub struct SelectBuilder<T: Entity> {
    filters: Vec<Filter>,
    keys: Option<Vec<DataType>>,
    fragment: Option<String>,
    params: Vec<DataType>,
    joined: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Default for SelectBuilder<T> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            keys: None,
            fragment: None,
            params: Vec::new(),
            joined: false,
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> SelectBuilder<T> {
    /// Creates a new SELECT query builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw predicate or trailing clause.
    #[must_use]
    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Binds the next placeholder of the raw fragment.
    #[must_use]
    pub fn bind(mut self, value: impl Into<DataType>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Adds a WHERE clause filter.
    #[must_use]
    pub fn r#where(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Restricts the query to the row with the given primary key values,
    /// supplied in key order.
    #[must_use]
    pub fn by_id(mut self, keys: &[DataType]) -> Self {
        self.keys = Some(keys.to_vec());
        self
    }

    /// LEFT JOINs every relation and labels each column `"table.column"` so
    /// related entities can be rebuilt from the same rows.
    #[must_use]
    pub const fn with_joins(mut self) -> Self {
        self.joined = true;
        self
    }

    /// Build the SELECT query.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the entity cannot be described, the
    /// key count is wrong, or the fragment conflicts with the filters.
    pub fn build(&self, dialect: &Dialect) -> Result<Query> {
        let meta = describe::<T>()?;
        let plan = if self.joined { Plan::joined(&meta)? } else { Plan::root(&meta) };

        let mut statement = sea_query::Query::select();
        for (index, node) in plan.nodes.iter().enumerate() {
            for attribute in plan.columns(index) {
                let qualifier = plan.qualifier(index, attribute);
                let column = table_column(dialect, qualifier, attribute.name());
                if self.joined {
                    let label = format!("{qualifier}.{}", attribute.name());
                    statement.expr_as(SimpleExpr::Column(column), dialect.label(label));
                } else {
                    statement.column(column);
                }
            }
            let Some(edge) = &node.edge else {
                continue;
            };
            let Some(relation) = edge.attribute.relation() else {
                continue;
            };
            let parent = &plan.nodes[edge.parent].alias;
            let on = Expr::col(table_column(dialect, &node.alias, relation.referenced()))
                .equals(table_column(dialect, parent, edge.attribute.name()));
            let table = dialect.ident(node.meta.table());
            if node.alias == *node.meta.table() {
                statement.join(JoinType::LeftJoin, table, on);
            } else {
                statement.join_as(JoinType::LeftJoin, table, dialect.ident(&node.alias), on);
            }
        }
        statement.from(dialect.ident(meta.table()));

        let mut binds = Binds::default();
        let conditions = self.conditions(&meta, dialect, &mut binds)?;
        let restricted = !conditions.is_empty();
        for condition in conditions {
            statement.and_where(condition);
        }

        let (mut sql, values) = statement.build(dialect.builder());
        let mut params = binds.resolve(values, literal)?;
        self.append_fragment(&mut sql, &mut params, restricted)?;

        tracing::debug!(
            table = %meta.table(),
            sql = %sql,
            param_count = params.len(),
            "SelectBuilder generated SQL"
        );

        Ok(Query { sql, params })
    }

    /// Build `SELECT COUNT(*)` over the same predicate.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::build`].
    pub fn build_count(&self, dialect: &Dialect) -> Result<Query> {
        let meta = describe::<T>()?;
        let mut statement = sea_query::Query::select();
        statement.expr(Expr::cust("COUNT(*)")).from(dialect.ident(meta.table()));

        let mut binds = Binds::default();
        let conditions = self.conditions(&meta, dialect, &mut binds)?;
        let restricted = !conditions.is_empty();
        for condition in conditions {
            statement.and_where(condition);
        }

        let (mut sql, values) = statement.build(dialect.builder());
        let mut params = binds.resolve(values, literal)?;
        self.append_fragment(&mut sql, &mut params, restricted)?;

        tracing::debug!(
            table = %meta.table(),
            sql = %sql,
            param_count = params.len(),
            "SelectBuilder generated count SQL"
        );

        Ok(Query { sql, params })
    }

    /// Execute the query and materialize every row.
    ///
    /// # Errors
    ///
    /// Returns build errors, the connection's error unchanged, or a
    /// conversion error for the first row that cannot be materialized.
    pub fn fetch<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<Vec<T>> {
        let query = self.build(conn.dialect())?;
        let rows = conn.query(&query.sql, &query.params)?;
        materialize_all::<T, _>(conn.dialect(), rows)?.collect()
    }

    /// Execute the query and materialize the first row, if any.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::fetch`].
    pub fn fetch_first<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<Option<T>> {
        let query = self.build(conn.dialect())?;
        let rows = conn.query(&query.sql, &query.params)?;
        materialize_all::<T, _>(conn.dialect(), rows)?.next().transpose()
    }

    fn conditions(
        &self, meta: &ClassMetadata, dialect: &Dialect, binds: &mut Binds<DataType>,
    ) -> Result<Vec<SimpleExpr>> {
        let mut conditions = Vec::new();
        if let Some(values) = &self.keys {
            let keys = meta.require_keys("load by id")?;
            if keys.len() != values.len() {
                return Err(Error::config(format!(
                    "{} has {} key column(s), got {} value(s)",
                    meta.type_name(),
                    keys.len(),
                    values.len()
                )));
            }
            for (key, value) in keys.iter().zip(values) {
                let stored = key.encoding().to_storage(value.clone())?;
                let column = table_column(dialect, meta.table(), key.name());
                conditions.push(Expr::col(column).eq(binds.push(stored)));
            }
        }

        let scope = Scope { meta, dialect };
        for filter in &self.filters {
            conditions.push(filter.clone().into_expr(&scope, binds)?);
        }
        Ok(conditions)
    }

    fn append_fragment(
        &self, sql: &mut String, params: &mut Vec<DataType>, restricted: bool,
    ) -> Result<()> {
        let fragment = self.fragment.as_deref().map(str::trim).filter(|fragment| !fragment.is_empty());
        let Some(fragment) = fragment else {
            if !self.params.is_empty() {
                return Err(Error::config("bound parameters given without a predicate fragment"));
            }
            return Ok(());
        };

        let keywords = clause_keywords(fragment);
        let leading = keywords.first().is_some_and(|(at, _)| *at == 0);
        let has_where = keywords.iter().any(|(_, keyword)| *keyword == "WHERE");
        let has_join = keywords.iter().any(|(_, keyword)| *keyword == "JOIN");

        if leading || has_where || has_join {
            if restricted && has_where {
                return Err(Error::config(
                    "fragment has its own WHERE clause and cannot be combined with filters",
                ));
            }
            sql.push(' ');
            sql.push_str(fragment);
        } else {
            let (predicate, tail) = match keywords.first() {
                Some((at, _)) => (fragment[..*at].trim_end(), Some(&fragment[*at..])),
                None => (fragment, None),
            };
            if restricted {
                sql.push_str(" AND (");
                sql.push_str(predicate);
                sql.push(')');
            } else {
                sql.push_str(" WHERE ");
                sql.push_str(predicate);
            }
            if let Some(tail) = tail {
                sql.push(' ');
                sql.push_str(tail);
            }
        }
        params.extend(self.params.iter().cloned());
        Ok(())
    }
}

pub(crate) fn table_column(dialect: &Dialect, table: &Name, column: &Name) -> ColumnRef {
    ColumnRef::TableColumn(dialect.ident(table).into_iden(), dialect.ident(column).into_iden())
}

/// Top-level clause keywords of a fragment with their byte offsets. Quoted
/// text, parenthesized subqueries and qualified names such as `Order.total`
/// are skipped.
fn clause_keywords(fragment: &str) -> Vec<(usize, &'static str)> {
    let mut found = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0_usize;
    let mut word = String::new();
    let mut start = 0;
    let mut after_dot = false;
    let mut previous = ' ';

    for (at, ch) in fragment.char_indices().chain(std::iter::once((fragment.len(), ' '))) {
        if let Some(close) = quote {
            if ch == close {
                quote = None;
            }
            previous = ch;
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if word.is_empty() {
                start = at;
                after_dot = previous == '.';
            }
            word.push(ch.to_ascii_uppercase());
            previous = ch;
            continue;
        }
        if depth == 0 && !after_dot && ch != '.' {
            if let Some(keyword) = CLAUSE_KEYWORDS.iter().find(|keyword| **keyword == word) {
                found.push((start, *keyword));
            }
        }
        word.clear();
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '[' => quote = Some(']'),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        previous = ch;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(fragment: &str) -> Vec<&'static str> {
        clause_keywords(fragment).into_iter().map(|(_, keyword)| keyword).collect()
    }

    #[test]
    fn keywords_outside_quotes() {
        assert!(keywords("status = 'WHERE' AND id > ?").is_empty());
        assert_eq!(keywords("order by name"), vec!["ORDER"]);
        assert_eq!(keywords("where \"group\" = 1 limit 5"), vec!["WHERE", "LIMIT"]);
        assert!(keywords("ordered = 1").is_empty());
        assert!(keywords("[order] = 1").is_empty());
    }

    #[test]
    fn keywords_skip_subqueries_and_qualified_names() {
        assert!(keywords("id IN (SELECT id FROM t WHERE x = ? ORDER BY y)").is_empty());
        assert!(keywords("Order.total > ? AND t.limit = 1").is_empty());
        assert_eq!(clause_keywords("total > ? ORDER BY total"), vec![(10, "ORDER")]);
    }
}
