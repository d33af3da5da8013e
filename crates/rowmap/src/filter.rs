use sea_query::{ColumnRef, Expr, ExprTrait, SimpleExpr, Value};

use crate::descriptor::Attribute;
use crate::dialect::{Dialect, Name};
use crate::error::Result;
use crate::metadata::ClassMetadata;
use crate::query::Binds;
use crate::select::table_column;
use crate::types::DataType;

/// A column named in a filter: a storage or member name of the entity being
/// selected, optionally qualified by a table or join alias.
#[derive(Debug, Clone)]
pub struct Col {
    table: Option<&'static str>,
    name: &'static str,
}

impl Col {
    /// Column of the selected entity.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { table: None, name }
    }

    /// Column of a joined table, by table name or alias.
    #[must_use]
    pub const fn of(table: &'static str, name: &'static str) -> Self {
        Self {
            table: Some(table),
            name,
        }
    }
}

/// Typed predicate added to a SELECT as `WHERE` conditions.
///
/// Values bind as parameters. Unqualified columns resolve against the selected
/// entity and bind in that attribute's stored form, so an enum stored by name
/// can be filtered with the enum value itself.
#[derive(Debug, Clone)]
pub enum Filter {
    /// column = value
    Eq(Col, DataType),
    /// column != value
    Ne(Col, DataType),
    /// column > value
    Gt(Col, DataType),
    /// column >= value
    Gte(Col, DataType),
    /// column < value
    Lt(Col, DataType),
    /// column <= value
    Lte(Col, DataType),
    /// column IN (values)
    In(Col, Vec<DataType>),
    /// column NOT IN (values)
    NotIn(Col, Vec<DataType>),
    /// column IS NULL
    IsNull(Col),
    /// column IS NOT NULL
    IsNotNull(Col),
    /// column LIKE pattern
    Like(Col, String),
    /// column NOT LIKE pattern
    NotLike(Col, String),
    /// column BETWEEN low AND high
    Between(Col, DataType, DataType),
    /// column NOT BETWEEN low AND high
    NotBetween(Col, DataType, DataType),
    /// Column-to-column comparison: left = right
    ColEq(Col, Col),
    /// Logical AND of multiple filters
    And(Vec<Self>),
    /// Logical OR of multiple filters
    Or(Vec<Self>),
    /// Logical NOT of a filter
    Not(Box<Self>),
}

/// Resolution context for one SELECT.
pub(crate) struct Scope<'a> {
    pub(crate) meta: &'a ClassMetadata,
    pub(crate) dialect: &'a Dialect,
}

impl Scope<'_> {
    fn resolve(&self, col: &Col) -> (ColumnRef, Option<&Attribute>) {
        let attribute = match col.table {
            None => self.meta.attribute(col.name).map(AsRef::as_ref),
            Some(_) => None,
        };
        let table = match (col.table, attribute) {
            (Some(table), _) => Name::parse(table),
            (None, Some(attribute)) => attribute.table().unwrap_or(self.meta.table()).clone(),
            (None, None) => self.meta.table().clone(),
        };
        let name =
            attribute.map_or_else(|| Name::parse(col.name), |attribute| attribute.name().clone());
        (table_column(self.dialect, &table, &name), attribute)
    }

    fn column(&self, col: &Col) -> SimpleExpr {
        Expr::col(self.resolve(col).0).into()
    }

    fn bind(&self, binds: &mut Binds<DataType>, col: &Col, value: DataType) -> Result<Value> {
        let value = match self.resolve(col).1 {
            Some(attribute) => attribute.encoding().to_storage(value)?,
            None => value,
        };
        Ok(binds.push(value))
    }

    fn bind_all(
        &self, binds: &mut Binds<DataType>, col: &Col, values: Vec<DataType>,
    ) -> Result<Vec<Value>> {
        values.into_iter().map(|value| self.bind(binds, col, value)).collect()
    }
}

impl Filter {
    /// Convert to a `sea-query` expression, registering bound values.
    pub(crate) fn into_expr(
        self, scope: &Scope<'_>, binds: &mut Binds<DataType>,
    ) -> Result<SimpleExpr> {
        let expr = match self {
            Self::Eq(col, value) => scope.column(&col).eq(scope.bind(binds, &col, value)?),
            Self::Ne(col, value) => scope.column(&col).ne(scope.bind(binds, &col, value)?),
            Self::Gt(col, value) => scope.column(&col).gt(scope.bind(binds, &col, value)?),
            Self::Gte(col, value) => scope.column(&col).gte(scope.bind(binds, &col, value)?),
            Self::Lt(col, value) => scope.column(&col).lt(scope.bind(binds, &col, value)?),
            Self::Lte(col, value) => scope.column(&col).lte(scope.bind(binds, &col, value)?),
            // an empty list renders invalid SQL; IN () matches nothing
            Self::In(_, values) if values.is_empty() => Expr::value(false),
            Self::NotIn(_, values) if values.is_empty() => Expr::value(true),
            Self::In(col, values) => {
                scope.column(&col).is_in(scope.bind_all(binds, &col, values)?)
            }
            Self::NotIn(col, values) => {
                scope.column(&col).is_not_in(scope.bind_all(binds, &col, values)?)
            }
            Self::IsNull(col) => scope.column(&col).is_null(),
            Self::IsNotNull(col) => scope.column(&col).is_not_null(),
            Self::Like(col, pattern) => scope.column(&col).like(pattern),
            Self::NotLike(col, pattern) => scope.column(&col).not_like(pattern),
            Self::Between(col, low, high) => {
                let low = scope.bind(binds, &col, low)?;
                let high = scope.bind(binds, &col, high)?;
                scope.column(&col).between(low, high)
            }
            Self::NotBetween(col, low, high) => {
                let low = scope.bind(binds, &col, low)?;
                let high = scope.bind(binds, &col, high)?;
                scope.column(&col).not_between(low, high)
            }
            Self::ColEq(left, right) => scope.column(&left).eq(scope.column(&right)),
            Self::And(filters) => {
                let mut exprs = filters
                    .into_iter()
                    .map(|filter| filter.into_expr(scope, binds))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter();
                exprs.next().map_or_else(
                    || Expr::value(true), // no filters, so all conditions satisfied, hence `true`
                    |first| exprs.fold(first, SimpleExpr::and),
                )
            }
            Self::Or(filters) => {
                let mut exprs = filters
                    .into_iter()
                    .map(|filter| filter.into_expr(scope, binds))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter();
                exprs.next().map_or_else(
                    || Expr::value(false), // no filters, so 0 conditions satisfied, hence `false`
                    |first| exprs.fold(first, SimpleExpr::or),
                )
            }
            Self::Not(filter) => Expr::expr(filter.into_expr(scope, binds)?).not(),
        };
        Ok(expr)
    }

    /// Qualify every column of this filter that has no table yet.
    #[must_use]
    pub fn in_table(self, table: &'static str) -> Self {
        let qualify = |col: Col| Col {
            table: col.table.or(Some(table)),
            name: col.name,
        };
        match self {
            Self::Eq(col, value) => Self::Eq(qualify(col), value),
            Self::Ne(col, value) => Self::Ne(qualify(col), value),
            Self::Gt(col, value) => Self::Gt(qualify(col), value),
            Self::Gte(col, value) => Self::Gte(qualify(col), value),
            Self::Lt(col, value) => Self::Lt(qualify(col), value),
            Self::Lte(col, value) => Self::Lte(qualify(col), value),
            Self::In(col, values) => Self::In(qualify(col), values),
            Self::NotIn(col, values) => Self::NotIn(qualify(col), values),
            Self::IsNull(col) => Self::IsNull(qualify(col)),
            Self::IsNotNull(col) => Self::IsNotNull(qualify(col)),
            Self::Like(col, pattern) => Self::Like(qualify(col), pattern),
            Self::NotLike(col, pattern) => Self::NotLike(qualify(col), pattern),
            Self::Between(col, low, high) => Self::Between(qualify(col), low, high),
            Self::NotBetween(col, low, high) => Self::NotBetween(qualify(col), low, high),
            Self::ColEq(left, right) => Self::ColEq(qualify(left), qualify(right)),
            Self::And(filters) => {
                Self::And(filters.into_iter().map(|filter| filter.in_table(table)).collect())
            }
            Self::Or(filters) => {
                Self::Or(filters.into_iter().map(|filter| filter.in_table(table)).collect())
            }
            Self::Not(filter) => Self::Not(Box::new(filter.in_table(table))),
        }
    }

    /// Creates an equality filter (column = value).
    #[must_use]
    pub fn eq(col: &'static str, val: impl Into<DataType>) -> Self {
        Self::Eq(Col::new(col), val.into())
    }

    /// Creates an inequality filter (column != value).
    #[must_use]
    pub fn ne(col: &'static str, val: impl Into<DataType>) -> Self {
        Self::Ne(Col::new(col), val.into())
    }

    /// Creates a greater-than filter (column > value).
    #[must_use]
    pub fn gt(col: &'static str, val: impl Into<DataType>) -> Self {
        Self::Gt(Col::new(col), val.into())
    }

    /// Creates a greater-than-or-equal filter (column >= value).
    #[must_use]
    pub fn gte(col: &'static str, val: impl Into<DataType>) -> Self {
        Self::Gte(Col::new(col), val.into())
    }

    /// Creates a less-than filter (column < value).
    #[must_use]
    pub fn lt(col: &'static str, val: impl Into<DataType>) -> Self {
        Self::Lt(Col::new(col), val.into())
    }

    /// Creates a less-than-or-equal filter (column <= value).
    #[must_use]
    pub fn lte(col: &'static str, val: impl Into<DataType>) -> Self {
        Self::Lte(Col::new(col), val.into())
    }

    /// Creates an IN filter (column IN (values)).
    #[must_use]
    pub fn r#in(col: &'static str, vals: impl IntoIterator<Item = impl Into<DataType>>) -> Self {
        Self::In(Col::new(col), vals.into_iter().map(Into::into).collect())
    }

    /// Creates a NOT IN filter (column NOT IN (values)).
    #[must_use]
    pub fn not_in(col: &'static str, vals: impl IntoIterator<Item = impl Into<DataType>>) -> Self {
        Self::NotIn(Col::new(col), vals.into_iter().map(Into::into).collect())
    }

    /// Creates an IS NULL filter.
    #[must_use]
    pub const fn is_null(col: &'static str) -> Self {
        Self::IsNull(Col::new(col))
    }

    /// Creates an IS NOT NULL filter.
    #[must_use]
    pub const fn is_not_null(col: &'static str) -> Self {
        Self::IsNotNull(Col::new(col))
    }

    /// Creates a LIKE filter with pattern matching.
    #[must_use]
    pub fn like(col: &'static str, pattern: impl Into<String>) -> Self {
        Self::Like(Col::new(col), pattern.into())
    }

    /// Creates a NOT LIKE filter with pattern matching.
    #[must_use]
    pub fn not_like(col: &'static str, pattern: impl Into<String>) -> Self {
        Self::NotLike(Col::new(col), pattern.into())
    }

    /// Creates a BETWEEN filter (column BETWEEN low AND high).
    #[must_use]
    pub fn between(col: &'static str, low: impl Into<DataType>, high: impl Into<DataType>) -> Self {
        Self::Between(Col::new(col), low.into(), high.into())
    }

    /// Creates a NOT BETWEEN filter.
    #[must_use]
    pub fn not_between(
        col: &'static str, low: impl Into<DataType>, high: impl Into<DataType>,
    ) -> Self {
        Self::NotBetween(Col::new(col), low.into(), high.into())
    }

    /// Compare two columns for equality.
    /// Table names are required since we're comparing columns from different tables.
    #[must_use]
    pub const fn col_eq(
        table1: &'static str, col1: &'static str, table2: &'static str, col2: &'static str,
    ) -> Self {
        Self::ColEq(Col::of(table1, col1), Col::of(table2, col2))
    }

    /// Logical AND of `filters`.
    #[must_use]
    pub const fn and(filters: Vec<Self>) -> Self {
        Self::And(filters)
    }

    /// Logical OR of `filters`.
    #[must_use]
    pub const fn or(filters: Vec<Self>) -> Self {
        Self::Or(filters)
    }

    /// Logical NOT of `filter`.
    #[must_use]
    pub fn not(filter: Self) -> Self {
        Self::Not(Box::new(filter))
    }
}
