use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::SimpleExpr;

use crate::dialect::{Dialect, GeneratedKeys};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::metadata::describe;
use crate::query::{Binds, Template, no_literals};

/// Builder for the INSERT template of an entity.
///
/// The column list is every insertable attribute in declaration order.
/// Database-generated keys are left out and, on dialects that support it,
/// returned through a `RETURNING` clause.
pub struct InsertBuilder<T: Entity> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Default for InsertBuilder<T> {
    fn default() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T: Entity> InsertBuilder<T> {
    /// Creates a new INSERT template builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the INSERT template.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the entity cannot be described.
    pub fn build(&self, dialect: &Dialect) -> Result<Template> {
        let meta = describe::<T>()?;
        let insertable: Vec<_> = meta.insertable().cloned().collect();
        let returning: Vec<_> = match dialect.generated_keys {
            GeneratedKeys::Returning => meta.generated().cloned().collect(),
            GeneratedKeys::Driver => Vec::new(),
        };

        let sql = if insertable.is_empty() {
            // sea-query has no DEFAULT VALUES form
            let mut sql = format!("INSERT INTO {} DEFAULT VALUES", dialect.render(meta.table()));
            if !returning.is_empty() {
                let columns: Vec<_> =
                    returning.iter().map(|attribute| dialect.render(attribute.name())).collect();
                sql.push_str(" RETURNING ");
                sql.push_str(&columns.join(", "));
            }
            sql
        } else {
            let mut statement = sea_query::Query::insert();
            statement.into_table(dialect.ident(meta.table()));
            statement.columns(insertable.iter().map(|attribute| dialect.ident(attribute.name())));

            let mut binds = Binds::default();
            let row: Vec<SimpleExpr> = insertable
                .iter()
                .map(|attribute| SimpleExpr::Value(binds.push(Arc::clone(attribute))))
                .collect();
            statement.values(row).map_err(|e| Error::config(format!("invalid INSERT: {e}")))?;

            for attribute in &returning {
                statement.returning_col(dialect.ident(attribute.name()));
            }

            let (sql, values) = statement.build(dialect.builder());
            let slots = binds.resolve(values, no_literals)?;
            if slots.len() != insertable.len() {
                return Err(Error::config("INSERT placeholders do not match its columns"));
            }
            sql
        };

        tracing::debug!(
            table = %meta.table(),
            sql = %sql,
            param_count = insertable.len(),
            "InsertBuilder generated SQL"
        );

        Ok(Template { sql, slots: insertable })
    }
}
