//! Persistence operations: statements executed through a [`Connection`] with
//! generated keys written back to the entity.

use std::any::Any;
use std::sync::Arc;

use crate::connection::{BatchFailure, Connection};
use crate::delete::DeleteBuilder;
use crate::dialect::Dialect;
use crate::descriptor::Attribute;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::insert::InsertBuilder;
use crate::metadata::describe;
use crate::select::SelectBuilder;
use crate::types::{DataType, Row};
use crate::update::UpdateBuilder;
use crate::value::FieldValue;

/// Insert `entity` and write database-generated keys back to it.
///
/// Keys are taken from the returned row by column label, or by position when
/// the backend does not label them. With more than one generated key the
/// backend must report them in key declaration order.
///
/// # Errors
///
/// Returns the backend's error unchanged, or a conversion error if a value
/// cannot be encoded or a generated key does not fit its member.
pub fn insert<'a, T: Entity, C: Connection + ?Sized>(
    conn: &mut C, entity: &'a mut T,
) -> Result<&'a mut T> {
    let meta = describe::<T>()?;
    let template = InsertBuilder::<T>::new().build(conn.dialect())?;
    let params = template.bind(&*entity)?;
    let generated: Vec<_> = meta.generated().cloned().collect();
    let labels: Vec<_> = generated.iter().map(|key| key.name().as_str()).collect();

    let rows = conn.insert(&template.sql, &params, &labels)?;
    if let Some(row) = rows.first() {
        assign_keys(conn.dialect(), &generated, &mut *entity, row)?;
    }
    Ok(entity)
}

/// Insert every entity, in order.
///
/// Batched, one INSERT template is bound once per entity and handed to the
/// backend as a single batch. Otherwise each entity is inserted on its own.
/// Either way a failure part way leaves the earlier rows inserted, with their
/// generated keys written back; rolling them back is the caller's concern.
///
/// # Errors
///
/// Returns the backend's error for the entity that failed.
pub fn insert_all<T: Entity, C: Connection + ?Sized>(
    conn: &mut C, entities: &mut [T], batched: bool,
) -> Result<()> {
    if !batched {
        for entity in entities.iter_mut() {
            insert(conn, entity)?;
        }
        return Ok(());
    }
    if entities.is_empty() {
        return Ok(());
    }

    let meta = describe::<T>()?;
    let template = InsertBuilder::<T>::new().build(conn.dialect())?;
    let batch =
        entities.iter().map(|entity| template.bind(entity)).collect::<Result<Vec<_>>>()?;
    let generated: Vec<_> = meta.generated().cloned().collect();
    let labels: Vec<_> = generated.iter().map(|key| key.name().as_str()).collect();

    let (rows, failure) = match conn.insert_batch(&template.sql, &batch, &labels) {
        Ok(rows) => (rows, None),
        Err(BatchFailure { completed, error }) => (completed, Some(error)),
    };
    tracing::debug!(
        table = %meta.table(),
        submitted = batch.len(),
        completed = rows.len(),
        "batch insert"
    );

    for (entity, row) in entities.iter_mut().zip(&rows) {
        assign_keys(conn.dialect(), &generated, entity, row)?;
    }
    match failure {
        Some(error) => Err(Error::from(error)),
        None => Ok(()),
    }
}

/// Update the row of `entity`, identified by its key, leaving the `excluded`
/// columns untouched.
///
/// # Errors
///
/// Returns a configuration error if the entity has no key, or the backend's
/// error unchanged.
pub fn update<'a, T: Entity, C: Connection + ?Sized>(
    conn: &mut C, entity: &'a T, excluded: &[&str],
) -> Result<&'a T> {
    let template =
        UpdateBuilder::<T>::new().exclude_all(excluded.iter().copied()).build(conn.dialect())?;
    let params = template.bind(entity)?;
    let affected = conn.exec(&template.sql, &params)?;
    tracing::debug!(affected, "update");
    Ok(entity)
}

/// Delete the row with the given key values, supplied in key order.
/// Returns the number of rows deleted.
///
/// # Errors
///
/// Returns a configuration error if the entity has no key or the number of
/// values does not match it.
pub fn delete_by_id<T: Entity, C: Connection + ?Sized>(
    conn: &mut C, keys: &[DataType],
) -> Result<u64> {
    let template = DeleteBuilder::<T>::new().build(conn.dialect())?;
    if template.slots.len() != keys.len() {
        return Err(Error::config(format!(
            "{} has {} key column(s), got {} value(s)",
            std::any::type_name::<T>(),
            template.slots.len(),
            keys.len()
        )));
    }
    let params = template
        .slots
        .iter()
        .zip(keys)
        .map(|(key, value)| key.encoding().to_storage(value.clone()))
        .collect::<Result<Vec<_>>>()?;
    Ok(conn.exec(&template.sql, &params)?)
}

/// Delete the row of `entity`, identified by its key.
///
/// # Errors
///
/// Returns a configuration error if the entity has no key.
pub fn delete<T: Entity, C: Connection + ?Sized>(conn: &mut C, entity: &T) -> Result<u64> {
    let template = DeleteBuilder::<T>::new().build(conn.dialect())?;
    let params = template.bind(entity)?;
    Ok(conn.exec(&template.sql, &params)?)
}

/// Load the entity with the given key values, related entities included.
/// Returns `None` when no row matches.
///
/// # Errors
///
/// Returns a configuration error if the entity has no key or the number of
/// values does not match it.
pub fn load_by_id<T: Entity, C: Connection + ?Sized>(
    conn: &mut C, keys: &[DataType],
) -> Result<Option<T>> {
    SelectBuilder::<T>::new().with_joins().by_id(keys).fetch_first(conn)
}

/// Select entities matching a raw predicate. An empty predicate selects
/// every row.
///
/// # Errors
///
/// Returns the backend's error unchanged, or a conversion error for the
/// first row that cannot be materialized.
pub fn select<T: Entity, C: Connection + ?Sized>(
    conn: &mut C, predicate: &str, params: &[DataType],
) -> Result<Vec<T>> {
    predicated::<T>(predicate, params).fetch(conn)
}

/// Like [`select`], with related entities loaded through joins.
///
/// # Errors
///
/// Returns the same errors as [`select`].
pub fn select_joined<T: Entity, C: Connection + ?Sized>(
    conn: &mut C, predicate: &str, params: &[DataType],
) -> Result<Vec<T>> {
    predicated::<T>(predicate, params).with_joins().fetch(conn)
}

/// Count the rows matching a raw predicate.
///
/// # Errors
///
/// Returns the backend's error unchanged, or a conversion error when the
/// count is not a number.
pub fn count<T: Entity, C: Connection + ?Sized>(
    conn: &mut C, predicate: &str, params: &[DataType],
) -> Result<u64> {
    let query = predicated::<T>(predicate, params).build_count(conn.dialect())?;
    let rows = conn.query(&query.sql, &query.params)?;
    let value = rows.first().and_then(|row| row.fields.first()).map(|field| &field.value);
    Ok(value.map(u64::from_data).transpose()?.flatten().unwrap_or_default())
}

fn predicated<T: Entity>(predicate: &str, params: &[DataType]) -> SelectBuilder<T> {
    let mut builder = SelectBuilder::<T>::new();
    if !predicate.trim().is_empty() {
        builder = builder.fragment(predicate);
    }
    params.iter().cloned().fold(builder, |builder, value| builder.bind(value))
}

fn assign_keys(
    dialect: &Dialect, generated: &[Arc<Attribute>], entity: &mut dyn Any, row: &Row,
) -> Result<()> {
    for (position, key) in generated.iter().enumerate() {
        let value = row
            .fields
            .iter()
            .find(|field| dialect.same_name(key.name(), &field.name))
            .map(|field| &field.value)
            .or_else(|| row.fields.get(position).map(|field| &field.value));
        if let Some(value) = value {
            key.write(entity, value).map_err(|e| e.in_column(key.name().as_str()))?;
        }
    }
    Ok(())
}
