//! Conversions between an attribute's natural value and its stored form.
//!
//! Every attribute carries an [`Encoding`]. Outbound values pass through
//! [`Encoding::to_storage`] before binding; inbound values pass through
//! [`Encoding::to_attribute`] before the attribute's own `FieldValue`
//! conversion. The order of precedence is: a custom [`Converter`], then enum
//! name encoding, then temporal reinterpretation, then identity. NULL converts
//! to NULL in both directions.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::types::{DATE_FORMAT, DataType, TIME_FORMAT, TIMESTAMP_FORMAT};
use crate::value::instant;

/// How an enum attribute is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnumEncoding {
    /// Zero-based declaration index.
    #[default]
    Ordinal,
    /// Declared variant name, matched case-sensitively on read.
    Name,
}

/// Wire type a temporal attribute is stored as.
///
/// The value is reinterpreted through a single UTC instant, so storing a
/// timestamp as `Date` discards its time of day and storing it as `Time`
/// discards its date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal {
    /// Date only.
    Date,
    /// Time of day only.
    Time,
    /// Date and time.
    Timestamp,
}

/// A custom, bidirectional conversion registered against one attribute.
pub trait Converter: Send + Sync {
    /// Convert an attribute value to its stored form.
    ///
    /// # Errors
    ///
    /// Returns an error when the value has no stored representation.
    fn to_storage(&self, value: DataType) -> Result<DataType>;

    /// Convert a stored value to the attribute's natural form.
    ///
    /// # Errors
    ///
    /// Returns an error when the stored value is not understood.
    fn to_attribute(&self, value: DataType) -> Result<DataType>;
}

struct FnConverter<S, A> {
    to_storage: S,
    to_attribute: A,
}

impl<S, A> Converter for FnConverter<S, A>
where
    S: Fn(DataType) -> Result<DataType> + Send + Sync,
    A: Fn(DataType) -> Result<DataType> + Send + Sync,
{
    fn to_storage(&self, value: DataType) -> Result<DataType> {
        (self.to_storage)(value)
    }

    fn to_attribute(&self, value: DataType) -> Result<DataType> {
        (self.to_attribute)(value)
    }
}

/// Build a [`Converter`] from a pair of closures.
pub fn converter<S, A>(to_storage: S, to_attribute: A) -> Arc<dyn Converter>
where
    S: Fn(DataType) -> Result<DataType> + Send + Sync + 'static,
    A: Fn(DataType) -> Result<DataType> + Send + Sync + 'static,
{
    Arc::new(FnConverter {
        to_storage,
        to_attribute,
    })
}

/// Conversion settings of one attribute.
#[derive(Clone, Default)]
pub struct Encoding {
    /// Stored form of enum attributes.
    pub enumerated: EnumEncoding,
    /// Declared variant names, present for enum attributes.
    pub names: Option<&'static [&'static str]>,
    /// Wire type of date and time attributes.
    pub temporal: Option<Temporal>,
    /// Custom converter; takes precedence over the built-in encodings.
    pub converter: Option<Arc<dyn Converter>>,
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoding")
            .field("enumerated", &self.enumerated)
            .field("names", &self.names)
            .field("temporal", &self.temporal)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

impl Encoding {
    /// Convert an attribute value to the form bound to a statement.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if the value cannot be encoded.
    pub fn to_storage(&self, value: DataType) -> Result<DataType> {
        if value.is_null() {
            return Ok(value);
        }
        if let Some(converter) = &self.converter {
            return converter.to_storage(value);
        }
        if let (EnumEncoding::Name, Some(names)) = (self.enumerated, self.names) {
            return name_of(&value, names);
        }
        if let Some(temporal) = self.temporal {
            return Ok(render(temporal, instant(&value)?));
        }
        Ok(value)
    }

    /// Convert a stored value to the attribute's natural form.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if the stored value cannot be decoded, for
    /// example an enum name that matches no declared variant.
    pub fn to_attribute(&self, value: DataType) -> Result<DataType> {
        if value.is_null() {
            return Ok(value);
        }
        if let Some(converter) = &self.converter {
            return converter.to_attribute(value);
        }
        if let (EnumEncoding::Name, Some(names)) = (self.enumerated, self.names) {
            return ordinal_of(value, names);
        }
        if self.temporal.is_some() {
            return Ok(render(Temporal::Timestamp, instant(&value)?));
        }
        Ok(value)
    }
}

fn name_of(value: &DataType, names: &[&str]) -> Result<DataType> {
    let ordinal = match value {
        DataType::Int32(Some(ordinal)) => usize::try_from(*ordinal).ok(),
        DataType::Str(Some(name)) if names.contains(&name.as_str()) => {
            return Ok(value.clone());
        }
        _ => None,
    };
    ordinal
        .and_then(|ordinal| names.get(ordinal))
        .map(|name| DataType::Str(Some((*name).to_string())))
        .ok_or_else(|| Error::conversion(format!("{value:?} is not a declared variant")))
}

fn ordinal_of(value: DataType, names: &[&str]) -> Result<DataType> {
    match value {
        DataType::Str(Some(name)) => names
            .iter()
            .position(|declared| *declared == name)
            .map(|ordinal| crate::value::ordinal_data(Some(ordinal)))
            .ok_or_else(|| {
                Error::conversion(format!("unknown variant '{name}', expected one of {names:?}"))
            }),
        // ordinals stored before a switch to name encoding still read back
        other => Ok(other),
    }
}

fn render(temporal: Temporal, instant: NaiveDateTime) -> DataType {
    match temporal {
        Temporal::Date => DataType::Date(Some(instant.format(DATE_FORMAT).to_string())),
        Temporal::Time => DataType::Time(Some(instant.format(TIME_FORMAT).to_string())),
        Temporal::Timestamp => {
            DataType::Timestamp(Some(instant.format(TIMESTAMP_FORMAT).to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &["Draft", "Published", "Archived"];

    fn by_name() -> Encoding {
        Encoding {
            enumerated: EnumEncoding::Name,
            names: Some(NAMES),
            ..Encoding::default()
        }
    }

    #[test]
    fn enum_names_both_ways() {
        let encoding = by_name();
        let stored = encoding.to_storage(DataType::Int32(Some(1))).unwrap();
        assert_eq!(stored, DataType::Str(Some("Published".to_string())));
        assert_eq!(encoding.to_attribute(stored).unwrap(), DataType::Int32(Some(1)));
    }

    #[test]
    fn enum_names_are_case_sensitive() {
        let err = by_name().to_attribute(DataType::Str(Some("published".to_string()))).unwrap_err();
        assert!(err.is_conversion());
        assert!(err.to_string().contains("unknown variant 'published'"));
    }

    #[test]
    fn null_stays_null() {
        let encoding = Encoding {
            temporal: Some(Temporal::Date),
            ..by_name()
        };
        assert_eq!(encoding.to_storage(DataType::Int32(None)).unwrap(), DataType::Int32(None));
        assert_eq!(encoding.to_attribute(DataType::Str(None)).unwrap(), DataType::Str(None));
    }

    #[test]
    fn temporal_reinterpretation_is_lossy() {
        let encoding = Encoding {
            temporal: Some(Temporal::Date),
            ..Encoding::default()
        };
        let stored = encoding
            .to_storage(DataType::Timestamp(Some("2024-01-15 10:30:45.000".to_string())))
            .unwrap();
        assert_eq!(stored, DataType::Date(Some("2024-01-15".to_string())));

        let loaded = encoding.to_attribute(stored).unwrap();
        assert_eq!(loaded, DataType::Timestamp(Some("2024-01-15 00:00:00.000".to_string())));
    }

    #[test]
    fn custom_converter_wins() {
        let cents = converter(
            |value| match value {
                DataType::Double(Some(v)) => Ok(DataType::Int64(Some((v * 100.0).round() as i64))),
                other => Ok(other),
            },
            |value| match value {
                DataType::Int64(Some(v)) => Ok(DataType::Double(Some(v as f64 / 100.0))),
                other => Ok(other),
            },
        );
        let encoding = Encoding {
            temporal: Some(Temporal::Date),
            converter: Some(cents),
            ..Encoding::default()
        };
        assert_eq!(encoding.to_storage(DataType::Double(Some(12.5))).unwrap(), DataType::Int64(Some(1250)));
        assert_eq!(encoding.to_attribute(DataType::Int64(Some(99))).unwrap(), DataType::Double(Some(0.99)));
    }
}
