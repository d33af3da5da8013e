use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::convert::{Converter, Encoding, EnumEncoding, Temporal};
use crate::descriptor::{
    Access, Accessor, Assign, Attribute, DeclaredType, Read, Relation, Role, Write, mismatch,
};
use crate::dialect::Name;
use crate::error::{Error, Result};
use crate::metadata;
use crate::types::DataType;
use crate::value::FieldValue;

/// Declares a mapped struct with an automatic `Entity` implementation.
///
/// Every field is a plain column named after the field unless it carries a
/// marker: `=> id()` for a key, `=> column()` to chain options, or
/// `=> join("fk_column", "referenced_column")` for a relation held as
/// `Option<Box<Target>>`. Marker options are the [`MemberDecl`] methods.
///
/// # Examples
///
/// ```ignore
/// entity! {
///     table = "orders",
///     #[derive(Debug, Clone, Default)]
///     pub struct Order {
///         pub id: i64 => id().generated(),
///         pub customer: Option<Box<Customer>> => join("customer_id", "id"),
///         pub total: f64,
///         pub status: Status => column().enum_by_name(),
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    (@member $decl:ident, $field:ident,) => {
        $decl.column(stringify!($field), |e| &e.$field, |e| &mut e.$field);
    };

    (
        @member $decl:ident, $field:ident,
        $kind:ident ($($arg:expr),*) $(.$method:ident ($($marg:expr),*))*
    ) => {
        $decl.$kind(stringify!($field), |e| &e.$field, |e| &mut e.$field $(, $arg)*)
            $(.$method($($marg),*))*;
    };

    (
        @define [$($table:literal)?]
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $field_type:ty
                $(=> $kind:ident ($($arg:expr),*) $(.$method:ident ($($marg:expr),*))*)?
            ),* $(,)?
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field : $field_type
            ),*
        }

        impl $crate::Entity for $name {
            fn declare(decl: &mut $crate::Declaration<Self>) {
                $( decl.table($table); )?
                $(
                    $crate::entity!(
                        @member decl, $field,
                        $($kind ($($arg),*) $(.$method ($($marg),*))*)?
                    );
                )*
            }
        }
    };

    (table = $table:literal, $($rest:tt)*) => {
        $crate::entity!(@define [$table] $($rest)*);
    };

    ($($rest:tt)*) => {
        $crate::entity!(@define [] $($rest)*);
    };
}

/// Declares a field-less enum usable as an attribute value.
///
/// The enum derives `Debug, Clone, Copy, PartialEq, Eq, Hash, Default` (the
/// first variant is the default) and is stored by ordinal unless the member
/// is declared with `enum_by_name()`.
#[macro_export]
macro_rules! enumeration {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $first:ident $(, $variant:ident)* $(,)? }
    ) => {
        #[allow(missing_docs)]
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis enum $name {
            #[default]
            $first,
            $($variant),*
        }

        #[allow(missing_docs)]
        impl $name {
            pub const VARIANTS: &'static [Self] = &[Self::$first, $(Self::$variant),*];
            pub const VARIANT_NAMES: &'static [&'static str] =
                &[stringify!($first), $(stringify!($variant)),*];
        }

        impl $crate::FieldValue for $name {
            const KIND: $crate::ValueKind = $crate::ValueKind::Int32;
            const NAMES: Option<&'static [&'static str]> = Some(Self::VARIANT_NAMES);

            fn to_data(&self) -> $crate::DataType {
                $crate::__private::ordinal_data(
                    Self::VARIANTS.iter().position(|variant| variant == self),
                )
            }

            fn from_data(value: &$crate::DataType) -> $crate::Result<Option<Self>> {
                $crate::__private::variant_at(value, Self::VARIANTS, stringify!($name))
            }
        }
    };
}

/// A mapped type.
///
/// Typically implemented via the `entity!` macro rather than manually. A
/// manual implementation lists the persistent members, in order, on the
/// supplied [`Declaration`].
pub trait Entity: Default + Send + Sync + 'static {
    /// Declare the persistent members of the type.
    fn declare(decl: &mut Declaration<Self>);
}

/// Collects the member declarations of one entity type.
pub struct Declaration<T> {
    pub(crate) table: Option<Name>,
    pub(crate) members: Vec<MemberDecl>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Default for Declaration<T> {
    fn default() -> Self {
        Self {
            table: None,
            members: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> Declaration<T> {
    /// Override the table name derived from the type name.
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table = Some(Name::parse(name));
        self
    }

    /// Declare a field-backed column.
    pub fn column<V, G, M>(&mut self, member: &'static str, get: G, get_mut: M) -> &mut MemberDecl
    where
        V: FieldValue,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let read: Read = Arc::new(move |entity: &dyn Any| -> Result<DataType> {
            let entity = entity.downcast_ref::<T>().ok_or_else(mismatch::<T>)?;
            Ok(get(entity).to_data())
        });
        let write: Write = Arc::new(move |entity: &mut dyn Any, value: &DataType| -> Result<()> {
            let entity = entity.downcast_mut::<T>().ok_or_else(mismatch::<T>)?;
            if let Some(value) = V::from_data(value)? {
                *get_mut(entity) = value;
            }
            Ok(())
        });
        self.push(MemberDecl::value::<V>(member, Access::Field, Accessor { read, write }))
    }

    /// Declare a field-backed primary key column.
    pub fn id<V, G, M>(&mut self, member: &'static str, get: G, get_mut: M) -> &mut MemberDecl
    where
        V: FieldValue,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        self.column(member, get, get_mut).key()
    }

    /// Declare a column read and written through a getter and setter pair.
    pub fn property<V, G, S>(&mut self, member: &'static str, getter: G, setter: S) -> &mut MemberDecl
    where
        V: FieldValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let read: Read = Arc::new(move |entity: &dyn Any| -> Result<DataType> {
            let entity = entity.downcast_ref::<T>().ok_or_else(mismatch::<T>)?;
            Ok(getter(entity).to_data())
        });
        let write: Write = Arc::new(move |entity: &mut dyn Any, value: &DataType| -> Result<()> {
            let entity = entity.downcast_mut::<T>().ok_or_else(mismatch::<T>)?;
            if let Some(value) = V::from_data(value)? {
                setter(entity, value);
            }
            Ok(())
        });
        self.push(MemberDecl::value::<V>(member, Access::Property, Accessor { read, write }))
    }

    /// Declare a primary key read and written through a getter and setter pair.
    pub fn property_id<V, G, S>(
        &mut self, member: &'static str, getter: G, setter: S,
    ) -> &mut MemberDecl
    where
        V: FieldValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.property(member, getter, setter).key()
    }

    /// Declare a relation stored as foreign key `column` referencing
    /// `referenced` on the target entity. A relation to `T` itself is the
    /// self-join.
    pub fn join<R, G, M>(
        &mut self, member: &'static str, get: G, get_mut: M, column: &str, referenced: &str,
    ) -> &mut MemberDecl
    where
        R: Entity,
        G: Fn(&T) -> &Option<Box<R>> + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut Option<Box<R>> + Send + Sync + 'static,
    {
        let referenced = Name::parse(referenced);
        let key = referenced.clone();
        let read: Read = Arc::new(move |entity: &dyn Any| -> Result<DataType> {
            let entity = entity.downcast_ref::<T>().ok_or_else(mismatch::<T>)?;
            let target = metadata::lookup::<R>()?;
            let attribute = target.attribute(key.as_str()).ok_or_else(|| {
                Error::config(format!("{} has no column '{key}'", target.type_name()))
            })?;
            match get(entity).as_deref() {
                Some(child) => attribute.read(child),
                None => Ok(attribute.null_value()),
            }
        });
        // the foreign key is never written back: children are rebuilt from
        // their own columns
        let write: Write = Arc::new(|_: &mut dyn Any, _: &DataType| -> Result<()> { Ok(()) });
        let assign: Assign = Arc::new(move |entity: &mut dyn Any, child: Box<dyn Any + Send>| -> Result<()> {
            let entity = entity.downcast_mut::<T>().ok_or_else(mismatch::<T>)?;
            let child = child.downcast::<R>().map_err(|_e| mismatch::<R>())?;
            *get_mut(entity) = Some(child);
            Ok(())
        });

        let role = if TypeId::of::<R>() == TypeId::of::<T>() { Role::SelfJoin } else { Role::Join };
        self.push(MemberDecl {
            member,
            name: Name::parse(column),
            declared: DeclaredType::Entity(TypeId::of::<R>(), std::any::type_name::<R>()),
            access: Access::Field,
            role,
            generated: false,
            insertable: true,
            updatable: true,
            table: None,
            encoding: Encoding::default(),
            accessor: Accessor { read, write },
            relation: Some(Relation {
                referenced,
                alias: None,
                resolve: metadata::lookup::<R>,
                target: OnceLock::new(),
                assign,
            }),
            errors: Vec::new(),
        })
    }

    fn push(&mut self, member: MemberDecl) -> &mut MemberDecl {
        let index = self.members.len();
        self.members.push(member);
        &mut self.members[index]
    }
}

/// Options of one declared member. Invalid combinations are reported when
/// the entity is described.
pub struct MemberDecl {
    member: &'static str,
    name: Name,
    declared: DeclaredType,
    access: Access,
    role: Role,
    generated: bool,
    insertable: bool,
    updatable: bool,
    table: Option<Name>,
    encoding: Encoding,
    accessor: Accessor,
    relation: Option<Relation>,
    errors: Vec<String>,
}

impl MemberDecl {
    fn value<V: FieldValue>(member: &'static str, access: Access, accessor: Accessor) -> Self {
        Self {
            member,
            name: Name::parse(member),
            declared: DeclaredType::Value(V::KIND),
            access,
            role: Role::Column,
            generated: false,
            insertable: true,
            updatable: true,
            table: None,
            encoding: Encoding {
                names: V::NAMES,
                ..Encoding::default()
            },
            accessor,
            relation: None,
            errors: Vec::new(),
        }
    }

    /// Make the member part of the primary key, in declaration order.
    pub fn key(&mut self) -> &mut Self {
        if self.relation.is_some() {
            self.errors.push("a relation cannot be part of the primary key".to_string());
        } else {
            self.role = Role::Key;
        }
        self
    }

    /// Mark a key as generated by the database on insert.
    pub fn generated(&mut self) -> &mut Self {
        if self.role == Role::Key {
            self.generated = true;
        } else {
            self.errors.push("only key members can be generated".to_string());
        }
        self
    }

    /// Override the storage name.
    pub fn rename(&mut self, name: &str) -> &mut Self {
        self.name = Name::parse(name);
        self
    }

    /// Owning table. For a column this is a sub-table reached through a join
    /// written by the caller; for a relation it is the alias the target table
    /// is joined under.
    pub fn table(&mut self, name: &str) -> &mut Self {
        let name = Name::parse(name);
        match &mut self.relation {
            Some(relation) => relation.alias = Some(name),
            None => self.table = Some(name),
        }
        self
    }

    /// Include or leave out the member in INSERT statements.
    pub fn insertable(&mut self, insertable: bool) -> &mut Self {
        self.insertable = insertable;
        self
    }

    /// Include or leave out the member in UPDATE SET lists.
    pub fn updatable(&mut self, updatable: bool) -> &mut Self {
        self.updatable = updatable;
        self
    }

    /// Store an enum by its declared variant name.
    pub fn enum_by_name(&mut self) -> &mut Self {
        if self.encoding.names.is_some() {
            self.encoding.enumerated = EnumEncoding::Name;
        } else {
            self.errors.push("enum_by_name requires an enumeration member".to_string());
        }
        self
    }

    /// Store an enum by ordinal (the default).
    pub fn enum_by_ordinal(&mut self) -> &mut Self {
        self.encoding.enumerated = EnumEncoding::Ordinal;
        self
    }

    /// Store a date or time value under a different temporal wire type.
    pub fn temporal(&mut self, temporal: Temporal) -> &mut Self {
        self.encoding.temporal = Some(temporal);
        self
    }

    /// Register a custom converter; it takes precedence over built-in ones.
    pub fn converter(&mut self, converter: Arc<dyn Converter>) -> &mut Self {
        self.encoding.converter = Some(converter);
        self
    }

    pub(crate) fn finish(self) -> (Attribute, Vec<String>) {
        let errors = self.errors.into_iter().map(|error| format!("{}: {error}", self.member)).collect();
        let attribute = Attribute {
            member: self.member,
            name: self.name,
            declared: self.declared,
            access: self.access,
            role: self.role,
            generated: self.generated,
            insertable: self.insertable,
            updatable: self.updatable,
            table: self.table,
            encoding: self.encoding,
            accessor: self.accessor,
            relation: self.relation,
        };
        (attribute, errors)
    }
}
