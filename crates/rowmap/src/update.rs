use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::Expr;

use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::metadata::describe;
use crate::query::{Binds, Template, no_literals};

/// Builder for the UPDATE template of an entity.
///
/// The SET list is every updatable attribute minus the excluded ones; the
/// WHERE clause matches the primary key, columns AND-ed in key order.
pub struct UpdateBuilder<T: Entity> {
    excluded: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Default for UpdateBuilder<T> {
    fn default() -> Self {
        Self {
            excluded: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> UpdateBuilder<T> {
    /// Creates a new UPDATE template builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves a column out of the SET list, by storage or member name.
    #[must_use]
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    /// Leaves several columns out of the SET list.
    #[must_use]
    pub fn exclude_all<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    /// Build the UPDATE template.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the entity has no key or nothing is
    /// left to update.
    pub fn build(&self, dialect: &Dialect) -> Result<Template> {
        let meta = describe::<T>()?;
        let keys = meta.require_keys("update")?;
        let assignments: Vec<_> = meta
            .updatable()
            .filter(|attribute| {
                !self.excluded.iter().any(|name| {
                    attribute.name().matches(name) || attribute.member().eq_ignore_ascii_case(name)
                })
            })
            .cloned()
            .collect();
        if assignments.is_empty() {
            return Err(Error::config(format!("{} has no column left to update", meta.type_name())));
        }

        let mut binds = Binds::default();
        let mut statement = sea_query::Query::update();
        statement.table(dialect.ident(meta.table()));
        for attribute in &assignments {
            statement.value(dialect.ident(attribute.name()), binds.push(Arc::clone(attribute)));
        }
        for key in &keys {
            statement.and_where(Expr::col(dialect.ident(key.name())).eq(binds.push(Arc::clone(key))));
        }

        let (sql, values) = statement.build(dialect.builder());
        let slots = binds.resolve(values, no_literals)?;

        tracing::debug!(
            table = %meta.table(),
            sql = %sql,
            param_count = slots.len(),
            "UpdateBuilder generated SQL"
        );

        Ok(Template { sql, slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity;

    entity! {
        table = "accounts",
        #[derive(Debug, Default)]
        pub struct Account {
            pub region: String => id(),
            pub number: i64 => id(),
            pub owner: String,
            pub opened: String => column().updatable(false),
        }
    }

    #[test]
    fn composite_key_in_key_order() {
        let template = UpdateBuilder::<Account>::new().build(&Dialect::postgres()).unwrap();
        assert_eq!(
            template.sql,
            "UPDATE accounts SET owner = $1 WHERE region = $2 AND number = $3"
        );
        assert_eq!(template.columns().collect::<Vec<_>>(), vec!["owner", "region", "number"]);
    }

    #[test]
    fn nothing_left_to_update() {
        let err = UpdateBuilder::<Account>::new().exclude("OWNER").build(&Dialect::sqlite()).unwrap_err();
        assert!(err.is_config());
    }
}
