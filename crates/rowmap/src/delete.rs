use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::Expr;

use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::Result;
use crate::metadata::describe;
use crate::query::{Binds, Template, no_literals};

/// Builder for the delete-by-id template of an entity.
pub struct DeleteBuilder<T: Entity> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Default for DeleteBuilder<T> {
    fn default() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T: Entity> DeleteBuilder<T> {
    /// Creates a new DELETE template builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the DELETE template. Its slots are the key attributes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the entity has no key.
    pub fn build(&self, dialect: &Dialect) -> Result<Template> {
        let meta = describe::<T>()?;
        let keys = meta.require_keys("delete")?;

        let mut binds = Binds::default();
        let mut statement = sea_query::Query::delete();
        statement.from_table(dialect.ident(meta.table()));
        for key in &keys {
            statement.and_where(Expr::col(dialect.ident(key.name())).eq(binds.push(Arc::clone(key))));
        }

        let (sql, values) = statement.build(dialect.builder());
        let slots = binds.resolve(values, no_literals)?;

        tracing::debug!(
            table = %meta.table(),
            sql = %sql,
            param_count = slots.len(),
            "DeleteBuilder generated SQL"
        );

        Ok(Template { sql, slots })
    }
}
