//! Attribute descriptors: the resolved metadata of one persistent member.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::convert::Encoding;
use crate::dialect::Name;
use crate::error::{Error, Result};
use crate::metadata::ClassMetadata;
use crate::types::{DataType, ValueKind};

/// How a member is read and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Direct access to a struct field.
    Field,
    /// A getter and setter pair.
    Property,
}

/// What part a member plays in the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A plain column.
    Column,
    /// Part of the primary key.
    Key,
    /// A foreign key to another entity, held as the related instance.
    Join,
    /// A foreign key to another instance of the owning entity.
    SelfJoin,
}

/// Declared type of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    /// A value stored in a single column.
    Value(ValueKind),
    /// A related entity.
    Entity(TypeId, &'static str),
}

pub(crate) type Read = Arc<dyn Fn(&dyn Any) -> Result<DataType> + Send + Sync>;
pub(crate) type Write = Arc<dyn Fn(&mut dyn Any, &DataType) -> Result<()> + Send + Sync>;
pub(crate) type Assign = Arc<dyn Fn(&mut dyn Any, Box<dyn Any + Send>) -> Result<()> + Send + Sync>;

/// Type-erased get/set capability of a member.
#[derive(Clone)]
pub struct Accessor {
    pub(crate) read: Read,
    pub(crate) write: Write,
}

/// The related side of a join member.
pub struct Relation {
    pub(crate) referenced: Name,
    pub(crate) alias: Option<Name>,
    pub(crate) resolve: fn() -> Result<Arc<ClassMetadata>>,
    pub(crate) target: OnceLock<Arc<ClassMetadata>>,
    pub(crate) assign: Assign,
}

impl Relation {
    /// Column on the target entity the foreign key refers to.
    #[must_use]
    pub const fn referenced(&self) -> &Name {
        &self.referenced
    }

    /// Table alias used when the target is joined, if overridden.
    #[must_use]
    pub const fn alias(&self) -> Option<&Name> {
        self.alias.as_ref()
    }

    /// Metadata of the target entity, resolved on first use.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the target cannot be described.
    pub fn target(&self) -> Result<Arc<ClassMetadata>> {
        if let Some(target) = self.target.get() {
            return Ok(Arc::clone(target));
        }
        let target = (self.resolve)()?;
        Ok(Arc::clone(self.target.get_or_init(|| target)))
    }

    /// Install a materialized child on its parent.
    pub(crate) fn assign(&self, parent: &mut dyn Any, child: Box<dyn Any + Send>) -> Result<()> {
        (self.assign)(parent, child)
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("referenced", &self.referenced)
            .field("alias", &self.alias)
            .field("resolved", &self.target.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Resolved metadata of one persistent member.
pub struct Attribute {
    pub(crate) member: &'static str,
    pub(crate) name: Name,
    pub(crate) declared: DeclaredType,
    pub(crate) access: Access,
    pub(crate) role: Role,
    pub(crate) generated: bool,
    pub(crate) insertable: bool,
    pub(crate) updatable: bool,
    pub(crate) table: Option<Name>,
    pub(crate) encoding: Encoding,
    pub(crate) accessor: Accessor,
    pub(crate) relation: Option<Relation>,
}

impl Attribute {
    /// Rust member name.
    #[must_use]
    pub const fn member(&self) -> &'static str {
        self.member
    }

    /// Storage (column) name.
    #[must_use]
    pub const fn name(&self) -> &Name {
        &self.name
    }

    /// Rust type of the member.
    #[must_use]
    pub const fn declared(&self) -> DeclaredType {
        self.declared
    }

    /// Whether the member is read as a field or through accessors.
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    /// Role of the member in the entity.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Whether the column is part of the primary key.
    #[must_use]
    pub const fn is_key(&self) -> bool {
        matches!(self.role, Role::Key)
    }

    /// Whether the member holds a related entity.
    #[must_use]
    pub const fn is_relation(&self) -> bool {
        matches!(self.role, Role::Join | Role::SelfJoin)
    }

    /// Whether the database generates this key on insert.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.generated
    }

    /// Whether the column belongs in INSERT statements.
    #[must_use]
    pub const fn is_insertable(&self) -> bool {
        self.insertable && !self.generated && self.table.is_none()
    }

    /// Whether the column belongs in UPDATE SET lists.
    #[must_use]
    pub const fn is_updatable(&self) -> bool {
        self.updatable && !self.is_key() && self.table.is_none()
    }

    /// Owning sub-table, when the column lives outside the entity's table.
    #[must_use]
    pub const fn table(&self) -> Option<&Name> {
        self.table.as_ref()
    }

    /// How values convert between attribute and stored form.
    #[must_use]
    pub const fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// Join details, for relation members.
    #[must_use]
    pub const fn relation(&self) -> Option<&Relation> {
        self.relation.as_ref()
    }

    /// SQL NULL of the member's stored type.
    #[must_use]
    pub const fn null_value(&self) -> DataType {
        match self.declared {
            DeclaredType::Value(kind) => DataType::null(kind),
            DeclaredType::Entity(..) => DataType::Int64(None),
        }
    }

    /// Read the member from `entity` in stored form. Relations read the
    /// referenced column of the related instance, or NULL when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `entity` is not the owning type or the value
    /// cannot be encoded.
    pub fn read(&self, entity: &dyn Any) -> Result<DataType> {
        let value = (self.accessor.read)(entity)?;
        self.encoding.to_storage(value).map_err(|e| e.in_column(self.name.as_str()))
    }

    /// Write a stored value to the member of `entity`. NULL leaves a
    /// non-optional member at its current value.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if the value does not fit the member.
    pub fn write(&self, entity: &mut dyn Any, value: &DataType) -> Result<()> {
        let value = self.encoding.to_attribute(value.clone())?;
        (self.accessor.write)(entity, &value)
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("member", &self.member)
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("access", &self.access)
            .field("role", &self.role)
            .field("generated", &self.generated)
            .field("table", &self.table)
            .field("relation", &self.relation)
            .finish_non_exhaustive()
    }
}

pub(crate) fn mismatch<T>() -> Error {
    Error::config(format!("accessor applied to a value that is not {}", std::any::type_name::<T>()))
}
