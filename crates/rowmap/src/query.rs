use std::any::Any;
use std::sync::Arc;

use sea_query::backend::{
    EscapeBuilder, OperLeftAssocDecider, PrecedenceDecider, QuotedBuilder, TableRefBuilder,
};
use sea_query::prepare::SqlWriter;
use sea_query::{BinOper, Oper, Quote, SimpleExpr, SubQueryStatement, Value, Values};

use crate::descriptor::Attribute;
use crate::error::{Error, Result};
use crate::types::DataType;

/// SQL text with its bound parameters, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Statement text.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub params: Vec<DataType>,
}

/// SQL text whose placeholders bind, in order, to attribute values read from
/// an entity.
#[derive(Debug, Clone)]
pub struct Template {
    /// Statement text.
    pub sql: String,
    /// Attribute bound to each placeholder, in order.
    pub slots: Vec<Arc<Attribute>>,
}

impl Template {
    /// Read every slot from `entity` in stored form.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if a value cannot be encoded.
    pub fn bind(&self, entity: &dyn Any) -> Result<Vec<DataType>> {
        self.slots.iter().map(|attribute| attribute.read(entity)).collect()
    }

    /// Storage names of the slots, in placeholder order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|attribute| attribute.name().as_str())
    }
}

/// Renders `sea-query` statements with unquoted plain identifiers and the
/// dialect's placeholder style.
pub struct QueryBuilder {
    pub placeholder: &'static str,
    pub numbered: bool,
}

impl QuotedBuilder for QueryBuilder {
    // identifiers render their own quotes
    fn quote(&self) -> Quote {
        Quote::new(b'"')
    }
}

impl EscapeBuilder for QueryBuilder {}

impl TableRefBuilder for QueryBuilder {}

impl OperLeftAssocDecider for QueryBuilder {
    fn well_known_left_associative(&self, op: &BinOper) -> bool {
        matches!(
            op,
            BinOper::And | BinOper::Or | BinOper::Add | BinOper::Sub | BinOper::Mul | BinOper::Mod
        )
    }
}

impl PrecedenceDecider for QueryBuilder {
    fn inner_expr_well_known_greater_precedence(
        &self, inner: &SimpleExpr, outer_oper: &Oper,
    ) -> bool {
        match inner {
            SimpleExpr::Column(_) | SimpleExpr::Value(_) | SimpleExpr::Keyword(_) => true,
            // comparisons bind tighter than AND / OR
            SimpleExpr::Binary(_, op, _) => {
                matches!(outer_oper, Oper::BinOper(BinOper::And | BinOper::Or))
                    && matches!(
                        op,
                        BinOper::Equal
                            | BinOper::NotEqual
                            | BinOper::SmallerThan
                            | BinOper::GreaterThan
                            | BinOper::SmallerThanOrEqual
                            | BinOper::GreaterThanOrEqual
                            | BinOper::Like
                            | BinOper::NotLike
                            | BinOper::Is
                            | BinOper::IsNot
                            | BinOper::In
                            | BinOper::NotIn
                            | BinOper::Between
                            | BinOper::NotBetween
                    )
            }
            _ => false,
        }
    }
}

impl sea_query::backend::QueryBuilder for QueryBuilder {
    fn prepare_query_statement(&self, query: &SubQueryStatement, sql: &mut dyn SqlWriter) {
        match query {
            SubQueryStatement::SelectStatement(s) => self.prepare_select_statement(s, sql),
            SubQueryStatement::InsertStatement(s) => self.prepare_insert_statement(s, sql),
            SubQueryStatement::UpdateStatement(s) => self.prepare_update_statement(s, sql),
            SubQueryStatement::DeleteStatement(s) => self.prepare_delete_statement(s, sql),
            SubQueryStatement::WithStatement(s) => self.prepare_with_query(s, sql),
        }
    }

    fn prepare_value(&self, value: &Value, sql: &mut dyn SqlWriter) {
        sql.push_param(value.clone(), self);
    }

    fn placeholder(&self) -> (&str, bool) {
        (self.placeholder, self.numbered)
    }
}

/// Placeholder values collected while building a statement.
///
/// Bound values enter `sea-query` as index markers so that their wire types
/// survive the build unchanged; [`Binds::resolve`] maps the built values back.
pub(crate) struct Binds<S> {
    slots: Vec<S>,
}

impl<S> Default for Binds<S> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<S: Clone> Binds<S> {
    pub(crate) fn push(&mut self, slot: S) -> Value {
        self.slots.push(slot);
        Value::BigUnsigned(Some((self.slots.len() - 1) as u64))
    }

    pub(crate) fn resolve(&self, values: Values, literal: impl Fn(Value) -> Result<S>) -> Result<Vec<S>> {
        values
            .into_iter()
            .map(|value| match value {
                Value::BigUnsigned(Some(index)) => usize::try_from(index)
                    .ok()
                    .and_then(|index| self.slots.get(index).cloned())
                    .ok_or_else(|| Error::config(format!("unknown bind marker {index}"))),
                other => literal(other),
            })
            .collect()
    }
}

/// Templates bind attribute slots only.
pub(crate) fn no_literals<S>(value: Value) -> Result<S> {
    Err(Error::config(format!("unexpected literal {value:?} in statement template")))
}

/// Convert a literal produced by `sea-query` itself (LIKE patterns, constant
/// booleans) into a bound value.
pub(crate) fn literal(value: Value) -> Result<DataType> {
    let data_type = match value {
        Value::Bool(v) => DataType::Boolean(v),
        Value::TinyInt(v) => DataType::Int32(v.map(i32::from)),
        Value::SmallInt(v) => DataType::Int32(v.map(i32::from)),
        Value::Int(v) => DataType::Int32(v),
        Value::BigInt(v) => DataType::Int64(v),
        Value::TinyUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::SmallUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::Unsigned(v) => DataType::Uint32(v),
        Value::BigUnsigned(v) => DataType::Uint64(v),
        Value::Float(v) => DataType::Float(v),
        Value::Double(v) => DataType::Double(v),
        Value::String(v) => DataType::Str(v.map(|value| *value)),
        Value::Char(v) => DataType::Str(v.map(|ch| ch.to_string())),
        Value::Bytes(v) => DataType::Binary(v.map(|bytes| *bytes)),
        other => {
            return Err(Error::config(format!("unsupported literal {other:?} in generated SQL")));
        }
    };
    Ok(data_type)
}
