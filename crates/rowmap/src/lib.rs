//! A micro object-relational mapper.
//!
//! Plain structs declare their persistent shape once, through the
//! [`entity!`] macro or a hand-written [`Entity`] impl. From that declaration
//! the crate generates SELECT, INSERT, UPDATE and DELETE statements, binds
//! parameters in stored form, and rebuilds entities (related entities
//! included) from flat result rows.
//!
//! # Quick Start
//!
//! ## Define entities
//!
//! ```ignore
//! use rowmap::{entity, enumeration};
//!
//! enumeration! {
//!     pub enum Status { Open, Shipped }
//! }
//!
//! entity! {
//!     table = "customers",
//!     #[derive(Debug, Clone, Default)]
//!     pub struct Customer {
//!         pub id: i64 => id().generated(),
//!         pub name: String,
//!     }
//! }
//!
//! entity! {
//!     table = "orders",
//!     #[derive(Debug, Clone, Default)]
//!     pub struct Order {
//!         pub id: i64 => id().generated(),
//!         pub customer: Option<Box<Customer>> => join("customer_id", "id"),
//!         pub total: f64,
//!         pub status: Status => column().enum_by_name(),
//!     }
//! }
//! ```
//!
//! ## Persist and load
//!
//! ```ignore
//! let mut order = Order { total: 42.0, ..Order::default() };
//! rowmap::insert(&mut conn, &mut order)?;
//!
//! // related entities come back through LEFT JOINs
//! let loaded: Option<Order> = rowmap::load_by_id(&mut conn, &[order.id.into()])?;
//!
//! rowmap::update(&mut conn, &order, &["status"])?;
//! rowmap::delete_by_id::<Order, _>(&mut conn, &[order.id.into()])?;
//! ```
//!
//! ## Query
//!
//! ```ignore
//! use rowmap::{Filter, SelectBuilder};
//!
//! let shipped = SelectBuilder::<Order>::new()
//!     .r#where(Filter::eq("status", Status::Shipped))
//!     .r#where(Filter::gt("total", 10.0))
//!     .fragment("ORDER BY total DESC")
//!     .with_joins()
//!     .fetch(&mut conn)?;
//!
//! let open: Vec<Order> = rowmap::select(&mut conn, "status = ?", &["Open".to_string().into()])?;
//! ```
//!
//! Statements are executed through a [`Connection`], the contract a database
//! backend implements. `rowmap-sqlite` provides one for `SQLite`.

mod connection;
mod convert;
mod delete;
mod descriptor;
mod dialect;
mod entity;
mod error;
mod filter;
mod insert;
mod materialize;
mod metadata;
mod persist;
mod plan;
mod query;
mod select;
mod types;
mod update;
mod value;

pub use connection::{BatchFailure, Connection, transaction};
pub use convert::{Converter, Encoding, EnumEncoding, Temporal, converter};
pub use delete::DeleteBuilder;
pub use descriptor::{Access, Attribute, DeclaredType, Relation, Role};
pub use dialect::{Dialect, GeneratedKeys, Ident, Name};
pub use entity::{Declaration, Entity, MemberDecl};
pub use error::{Error, Result};
pub use filter::{Col, Filter};
pub use insert::InsertBuilder;
pub use materialize::{Rows, materialize, materialize_all, materialize_erased, materialize_first};
pub use metadata::{ClassMetadata, describe};
pub use persist::{
    count, delete, delete_by_id, insert, insert_all, load_by_id, select, select_joined, update,
};
pub use plan::MAX_JOIN_DEPTH;
pub use query::{Query, Template};
pub use select::SelectBuilder;
pub use types::{DATE_FORMAT, DataType, Field, Row, TIME_FORMAT, TIMESTAMP_FORMAT, ValueKind};
pub use update::UpdateBuilder;
pub use value::FieldValue;

// Re-exports for `enumeration!` macro use only.
#[doc(hidden)]
pub mod __private {
    pub use crate::value::{ordinal_data, variant_at};
}
