//! Class metadata and the process-wide metadata cache.
//!
//! Metadata is built once per entity type from its [`Entity::declare`]
//! declaration and lives for the rest of the process. Concurrent first use of
//! the same type coalesces on a single build; reads of built entries never
//! wait on unrelated builds.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use moka::sync::Cache;

use crate::descriptor::{Attribute, Role};
use crate::dialect::Name;
use crate::entity::{Declaration, Entity};
use crate::error::{Error, Result};

static CACHE: LazyLock<Cache<TypeId, Arc<ClassMetadata>>> =
    LazyLock::new(|| Cache::builder().build());

/// Describe an entity type, building and caching its metadata on first use.
///
/// Relation targets are described too, so a relation whose target cannot be
/// described fails here rather than at first query.
///
/// # Errors
///
/// Returns a configuration error if the declaration of `T`, or of any entity
/// it is related to, is invalid.
pub fn describe<T: Entity>() -> Result<Arc<ClassMetadata>> {
    let metadata = lookup::<T>()?;
    metadata.resolve_relations(&mut HashSet::new())?;
    Ok(metadata)
}

/// Cached metadata of `T` without resolving its relations.
pub(crate) fn lookup<T: Entity>() -> Result<Arc<ClassMetadata>> {
    CACHE
        .try_get_with(TypeId::of::<T>(), || ClassMetadata::build::<T>().map(Arc::new))
        .map_err(|e| match e.as_ref() {
            Error::Config(message) => Error::Config(message.clone()),
            other => Error::Config(other.to_string()),
        })
}

fn construct<T: Entity>() -> Box<dyn Any + Send> {
    Box::new(T::default())
}

/// The persistent shape of one entity type.
pub struct ClassMetadata {
    type_id: TypeId,
    type_name: &'static str,
    table: Name,
    attributes: Vec<Arc<Attribute>>,
    by_name: HashMap<String, usize>,
    self_join: Option<usize>,
    construct: fn() -> Box<dyn Any + Send>,
}

impl ClassMetadata {
    fn build<T: Entity>() -> Result<Self> {
        let type_name = std::any::type_name::<T>();
        let mut declaration = Declaration::<T>::default();
        T::declare(&mut declaration);

        let table = declaration.table.take().unwrap_or_else(|| Name::parse(simple_name(type_name)));
        let mut errors = Vec::new();
        let mut attributes = Vec::with_capacity(declaration.members.len());
        for member in declaration.members {
            let (attribute, member_errors) = member.finish();
            errors.extend(member_errors);
            attributes.push(Arc::new(attribute));
        }

        let mut by_name = HashMap::new();
        let mut owned = HashSet::new();
        for (index, attribute) in attributes.iter().enumerate() {
            let storage = attribute.name().as_str().to_ascii_lowercase();
            let owner = attribute.table().map(|table| table.as_str().to_ascii_lowercase());
            if !owned.insert((owner, storage.clone())) {
                errors.push(format!("duplicate column '{}'", attribute.name()));
            }
            by_name.entry(storage).or_insert(index);
        }

        let self_joins: Vec<usize> = attributes
            .iter()
            .enumerate()
            .filter(|(_, attribute)| attribute.role() == Role::SelfJoin)
            .map(|(index, _)| index)
            .collect();
        if self_joins.len() > 1 {
            errors.push("more than one self-join".to_string());
        }

        if !errors.is_empty() {
            return Err(Error::config(format!("{type_name}: {}", errors.join("; "))));
        }

        tracing::debug!(
            entity = type_name,
            table = %table,
            attributes = attributes.len(),
            "described entity"
        );

        Ok(Self {
            type_id: TypeId::of::<T>(),
            type_name,
            table,
            attributes,
            by_name,
            self_join: self_joins.first().copied(),
            construct: construct::<T>,
        })
    }

    fn resolve_relations(&self, visited: &mut HashSet<TypeId>) -> Result<()> {
        if !visited.insert(self.type_id) {
            return Ok(());
        }
        for attribute in self.attributes.iter().filter(|attribute| attribute.is_relation()) {
            let Some(relation) = attribute.relation() else {
                continue;
            };
            let target = relation.target().map_err(|e| {
                Error::config(format!(
                    "{}.{}: join target cannot be described: {e}",
                    self.type_name,
                    attribute.member()
                ))
            })?;
            if target.attribute(relation.referenced().as_str()).is_none() {
                return Err(Error::config(format!(
                    "{}.{}: {} has no column '{}'",
                    self.type_name,
                    attribute.member(),
                    target.type_name,
                    relation.referenced()
                )));
            }
            target.resolve_relations(visited)?;
        }
        Ok(())
    }

    /// Type id of the described entity.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name of the described entity.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Resolved table name.
    #[must_use]
    pub const fn table(&self) -> &Name {
        &self.table
    }

    /// All attributes, in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[Arc<Attribute>] {
        &self.attributes
    }

    /// Attribute by storage name, ignoring case, or else by member name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .and_then(|index| self.attributes.get(*index))
            .or_else(|| self.attributes.iter().find(|attribute| attribute.member() == name))
    }

    /// Primary key attributes, in key order.
    pub fn keys(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.attributes.iter().filter(|attribute| attribute.is_key())
    }

    /// Keys the database generates on insert.
    pub fn generated(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.keys().filter(|attribute| attribute.is_generated())
    }

    /// Columns written by INSERT.
    pub fn insertable(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.attributes.iter().filter(|attribute| attribute.is_insertable())
    }

    /// Columns written by UPDATE.
    pub fn updatable(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.attributes.iter().filter(|attribute| attribute.is_updatable())
    }

    /// Every attribute maps to exactly one selected column.
    pub fn selectable(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.attributes.iter()
    }

    /// Relations to other entity types. The self-join is not included.
    pub fn joins(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.attributes.iter().filter(|attribute| attribute.role() == Role::Join)
    }

    /// The relation back to the entity's own type, if declared.
    #[must_use]
    pub fn self_join(&self) -> Option<&Arc<Attribute>> {
        self.self_join.and_then(|index| self.attributes.get(index))
    }

    /// Key attributes, failing when the entity declares none.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming `operation` when there is no key.
    pub fn require_keys(&self, operation: &str) -> Result<Vec<Arc<Attribute>>> {
        let keys: Vec<_> = self.keys().cloned().collect();
        if keys.is_empty() {
            return Err(Error::config(format!(
                "{} has no primary key; {operation} requires one",
                self.type_name
            )));
        }
        Ok(keys)
    }

    /// A new instance holding default values.
    #[must_use]
    pub fn construct(&self) -> Box<dyn Any + Send> {
        (self.construct)()
    }
}

impl fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

fn simple_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}
