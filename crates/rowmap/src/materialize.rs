//! Result materialization: rows of labelled columns back into entity graphs.
//!
//! Every row is matched against the join plan of the target entity. Columns
//! of the root entity match `table.column` labels first and bare `column`
//! labels otherwise; columns of related entities match qualified labels only.
//! A related instance is created only when the row carries at least one
//! non-NULL column of its own, so an outer-join miss leaves the relation
//! unset. Labels are compared under the dialect's identifier case rules.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::descriptor::mismatch;
use crate::dialect::{Dialect, Name};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::metadata::{ClassMetadata, describe};
use crate::plan::Plan;
use crate::types::{DataType, Row};

/// Materialize one row as a `T`.
///
/// # Errors
///
/// Returns a conversion error naming the column when a value does not fit
/// its attribute, or a configuration error when a column label is ambiguous.
pub fn materialize<T: Entity>(dialect: &Dialect, row: &Row) -> Result<T> {
    let meta = describe::<T>()?;
    let plan = Plan::joined(&meta)?;
    downcast(populate(&plan, dialect, row)?)
}

/// Materialize the first row, or `None` when there are no rows.
///
/// # Errors
///
/// Returns the same errors as [`materialize`].
pub fn materialize_first<T: Entity>(
    dialect: &Dialect, rows: impl IntoIterator<Item = Row>,
) -> Result<Option<T>> {
    materialize_all::<T, _>(dialect, rows)?.next().transpose()
}

/// Lazily materialize every row in result order.
///
/// # Errors
///
/// Returns a configuration error if `T` cannot be described or its relations
/// cannot be laid out as joins.
pub fn materialize_all<T: Entity, I: IntoIterator<Item = Row>>(
    dialect: &Dialect, rows: I,
) -> Result<Rows<T, I::IntoIter>> {
    let meta = describe::<T>()?;
    Ok(Rows {
        plan: Plan::joined(&meta)?,
        dialect: dialect.clone(),
        rows: rows.into_iter(),
        _marker: PhantomData,
    })
}

/// Materialize one row as an instance of the type `meta` describes.
///
/// # Errors
///
/// Returns the same errors as [`materialize`].
pub fn materialize_erased(
    meta: &Arc<ClassMetadata>, dialect: &Dialect, row: &Row,
) -> Result<Box<dyn Any + Send>> {
    let plan = Plan::joined(meta)?;
    populate(&plan, dialect, row)
}

/// Iterator over materialized rows. Each item is produced as the underlying
/// row is pulled; a failed row does not stop the rows after it.
pub struct Rows<T, I> {
    plan: Plan,
    dialect: Dialect,
    rows: I,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity, I: Iterator<Item = Row>> Iterator for Rows<T, I> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(populate(&self.plan, &self.dialect, &row).and_then(downcast))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

fn downcast<T: Entity>(instance: Box<dyn Any + Send>) -> Result<T> {
    match instance.downcast::<T>() {
        Ok(instance) => Ok(*instance),
        Err(_) => Err(mismatch::<T>()),
    }
}

fn populate(plan: &Plan, dialect: &Dialect, row: &Row) -> Result<Box<dyn Any + Send>> {
    let mut instances: Vec<Option<Box<dyn Any + Send>>> = Vec::with_capacity(plan.nodes.len());

    for (index, node) in plan.nodes.iter().enumerate() {
        let parent_present =
            node.edge.as_ref().is_none_or(|edge| instances[edge.parent].is_some());
        if !parent_present {
            instances.push(None);
            continue;
        }

        let mut instance = node.meta.construct();
        let mut present = index == 0;
        for attribute in plan.columns(index) {
            let qualifier = plan.qualifier(index, attribute);
            let Some(value) = locate(dialect, row, qualifier, attribute.name(), index == 0)? else {
                continue;
            };
            present |= !value.is_null();
            if attribute.is_relation() {
                // held by the related instance
                continue;
            }
            attribute
                .write(&mut *instance, value)
                .map_err(|e| e.in_column(&format!("{qualifier}.{}", attribute.name())))?;
        }

        if !present {
            tracing::trace!(
                entity = node.meta.type_name(),
                alias = %node.alias,
                "no related columns in row"
            );
        }
        instances.push(present.then_some(instance));
    }

    // children follow their parents, so assign deepest first
    for index in (1..plan.nodes.len()).rev() {
        let Some(child) = instances[index].take() else {
            continue;
        };
        let Some(edge) = &plan.nodes[index].edge else {
            continue;
        };
        let Some(relation) = edge.attribute.relation() else {
            continue;
        };
        if let Some(parent) = instances[edge.parent].as_mut() {
            relation.assign(&mut **parent, child)?;
        }
    }

    instances
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| Error::config("join plan has no root"))
}

/// Value of the column `qualifier.name`, falling back to a bare `name` label
/// when `bare` is set.
fn locate<'r>(
    dialect: &Dialect, row: &'r Row, qualifier: &Name, name: &Name, bare: bool,
) -> Result<Option<&'r DataType>> {
    let mut matches =
        row.fields.iter().filter(|field| dialect.same_qualified(qualifier, name, &field.name));
    if let Some(field) = matches.next() {
        if matches.next().is_some() {
            return Err(Error::config(format!("ambiguous column '{qualifier}.{name}' in result")));
        }
        return Ok(Some(&field.value));
    }
    if !bare {
        return Ok(None);
    }
    Ok(row.fields.iter().find(|field| dialect.same_name(name, &field.name)).map(|field| &field.value))
}
