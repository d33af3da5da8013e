//! Storage values exchanged with the execution layer.

/// Canonical text format for `Date` values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical text format for `Time` values.
pub const TIME_FORMAT: &str = "%H:%M:%S%.3f";
/// Canonical text format for `Timestamp` values.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A stored (wire) value. `None` is SQL NULL.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Boolean(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Uint32(Option<u32>),
    Uint64(Option<u64>),
    Float(Option<f32>),
    Double(Option<f64>),
    Str(Option<String>),
    Binary(Option<Vec<u8>>),
    /// Text in [`DATE_FORMAT`].
    Date(Option<String>),
    /// Text in [`TIME_FORMAT`].
    Time(Option<String>),
    /// Text in [`TIMESTAMP_FORMAT`].
    Timestamp(Option<String>),
}

/// The wire type of a [`DataType`], without its value.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    Str,
    Binary,
    Date,
    Time,
    Timestamp,
}

impl DataType {
    /// The NULL value of the given kind.
    #[must_use]
    pub const fn null(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Boolean => Self::Boolean(None),
            ValueKind::Int32 => Self::Int32(None),
            ValueKind::Int64 => Self::Int64(None),
            ValueKind::Uint32 => Self::Uint32(None),
            ValueKind::Uint64 => Self::Uint64(None),
            ValueKind::Float => Self::Float(None),
            ValueKind::Double => Self::Double(None),
            ValueKind::Str => Self::Str(None),
            ValueKind::Binary => Self::Binary(None),
            ValueKind::Date => Self::Date(None),
            ValueKind::Time => Self::Time(None),
            ValueKind::Timestamp => Self::Timestamp(None),
        }
    }

    /// Wire type of the value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Uint32(_) => ValueKind::Uint32,
            Self::Uint64(_) => ValueKind::Uint64,
            Self::Float(_) => ValueKind::Float,
            Self::Double(_) => ValueKind::Double,
            Self::Str(_) => ValueKind::Str,
            Self::Binary(_) => ValueKind::Binary,
            Self::Date(_) => ValueKind::Date,
            Self::Time(_) => ValueKind::Time,
            Self::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    /// Whether the value is SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Boolean(None)
                | Self::Int32(None)
                | Self::Int64(None)
                | Self::Uint32(None)
                | Self::Uint64(None)
                | Self::Float(None)
                | Self::Double(None)
                | Self::Str(None)
                | Self::Binary(None)
                | Self::Date(None)
                | Self::Time(None)
                | Self::Timestamp(None)
        )
    }
}

impl<T: crate::FieldValue> From<T> for DataType {
    fn from(value: T) -> Self {
        value.to_data()
    }
}

/// A named value in a result row. The name is the column label returned by
/// the driver; `table.column` labels are table-qualified.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Column label.
    pub name: String,
    /// Column value.
    pub value: DataType,
}

impl Field {
    /// Create a field from a label and value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<DataType>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Table qualifier of the label, if any.
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(table, _)| table)
    }

    /// Column part of the label.
    #[must_use]
    pub fn column(&self) -> &str {
        self.name.rsplit_once('.').map_or(self.name.as_str(), |(_, column)| column)
    }
}

/// One result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Position of the row in its result, as text.
    pub index: String,
    /// Columns in result order.
    pub fields: Vec<Field>,
}

impl Row {
    /// Create a row from its fields.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            index: String::new(),
            fields,
        }
    }

    /// Column labels in result order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Value of the first field whose label matches `name`, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.fields.iter().find(|field| field.name.eq_ignore_ascii_case(name)).map(|field| &field.value)
    }
}
