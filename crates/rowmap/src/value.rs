//! Declared attribute value types and their natural storage form.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::types::{DATE_FORMAT, DataType, TIME_FORMAT, TIMESTAMP_FORMAT, ValueKind};

/// Trait for types that can be held by a persistent attribute.
///
/// Implemented for the standard Rust types (`i32`, `String`, `DateTime`, etc.)
/// and for enums declared with the `enumeration!` macro. Inbound conversion is
/// lenient: drivers report integers, booleans and dates in whatever width or
/// text form the engine uses.
pub trait FieldValue: Sized + Send + Sync + 'static {
    /// The natural wire type of the attribute.
    const KIND: ValueKind;

    /// Declared variant names, for enum attributes.
    const NAMES: Option<&'static [&'static str]> = None;

    /// Convert to the natural storage form.
    fn to_data(&self) -> DataType;

    /// Convert from a stored value. Returns `None` for SQL NULL.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if the value cannot represent `Self`.
    fn from_data(value: &DataType) -> Result<Option<Self>>;
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NAMES: Option<&'static [&'static str]> = T::NAMES;

    fn to_data(&self) -> DataType {
        self.as_ref().map_or(DataType::null(T::KIND), FieldValue::to_data)
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(Some(None));
        }
        Ok(T::from_data(value)?.map(Some))
    }
}

macro_rules! integer_value {
    ($($ty:ty => $variant:ident($wire:ty)),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn to_data(&self) -> DataType {
                    DataType::$variant(Some(<$wire>::from(*self)))
                }

                fn from_data(value: &DataType) -> Result<Option<Self>> {
                    if value.is_null() {
                        return Ok(None);
                    }
                    let wide = as_i128(value)?;
                    Self::try_from(wide).map(Some).map_err(|_e| {
                        Error::conversion(format!("{wide} is out of range for {}", stringify!($ty)))
                    })
                }
            }
        )*
    };
}

integer_value! {
    i8 => Int32(i32),
    i16 => Int32(i32),
    i32 => Int32(i32),
    i64 => Int64(i64),
    u8 => Uint32(u32),
    u16 => Uint32(u32),
    u32 => Uint32(u32),
    u64 => Uint64(u64),
}

// Big integers travel as decimal text: no driver type holds 128 bits.
impl FieldValue for i128 {
    const KIND: ValueKind = ValueKind::Str;

    fn to_data(&self) -> DataType {
        DataType::Str(Some(self.to_string()))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        as_i128(value).map(Some)
    }
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn to_data(&self) -> DataType {
        DataType::Boolean(Some(*self))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        as_bool(value).map(Some)
    }
}

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn to_data(&self) -> DataType {
        DataType::Double(Some(*self))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        as_f64(value).map(Some)
    }
}

impl FieldValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_data(&self) -> DataType {
        DataType::Float(Some(*self))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(as_f64(value)? as Self))
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Str;

    fn to_data(&self) -> DataType {
        DataType::Str(Some(self.clone()))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        as_string(value).map(Some)
    }
}

impl FieldValue for char {
    const KIND: ValueKind = ValueKind::Str;

    fn to_data(&self) -> DataType {
        DataType::Str(Some(self.to_string()))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        let text = as_string(value)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Ok(Some(ch)),
            _ => Err(Error::conversion(format!("'{text}' is not a single character"))),
        }
    }
}

impl FieldValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Binary;

    fn to_data(&self) -> DataType {
        DataType::Binary(Some(self.clone()))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        match value {
            _ if value.is_null() => Ok(None),
            DataType::Binary(Some(bytes)) => Ok(Some(bytes.clone())),
            DataType::Str(Some(text)) => Ok(Some(text.clone().into_bytes())),
            other => Err(unexpected("binary", other)),
        }
    }
}

impl FieldValue for NaiveDateTime {
    const KIND: ValueKind = ValueKind::Timestamp;

    fn to_data(&self) -> DataType {
        DataType::Timestamp(Some(self.format(TIMESTAMP_FORMAT).to_string()))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        instant(value).map(Some)
    }
}

impl FieldValue for DateTime<Utc> {
    const KIND: ValueKind = ValueKind::Timestamp;

    fn to_data(&self) -> DataType {
        self.naive_utc().to_data()
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(instant(value)?.and_utc()))
    }
}

impl FieldValue for NaiveDate {
    const KIND: ValueKind = ValueKind::Date;

    fn to_data(&self) -> DataType {
        DataType::Date(Some(self.format(DATE_FORMAT).to_string()))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(instant(value)?.date()))
    }
}

impl FieldValue for NaiveTime {
    const KIND: ValueKind = ValueKind::Time;

    fn to_data(&self) -> DataType {
        DataType::Time(Some(self.format(TIME_FORMAT).to_string()))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(instant(value)?.time()))
    }
}

impl FieldValue for serde_json::Value {
    const KIND: ValueKind = ValueKind::Str;

    fn to_data(&self) -> DataType {
        DataType::Str(Some(self.to_string()))
    }

    fn from_data(value: &DataType) -> Result<Option<Self>> {
        let parsed = match value {
            _ if value.is_null() => return Ok(None),
            DataType::Str(Some(raw)) => serde_json::from_str(raw),
            DataType::Binary(Some(bytes)) => serde_json::from_slice(bytes),
            other => return Err(unexpected("json compatible", other)),
        };
        parsed.map(Some).map_err(|e| Error::conversion(format!("invalid json: {e}")))
    }
}

#[doc(hidden)]
#[must_use]
pub fn ordinal_data(ordinal: Option<usize>) -> DataType {
    DataType::Int32(ordinal.and_then(|ordinal| i32::try_from(ordinal).ok()))
}

#[doc(hidden)]
pub fn variant_at<E: Copy>(value: &DataType, variants: &[E], name: &str) -> Result<Option<E>> {
    if value.is_null() {
        return Ok(None);
    }
    let ordinal = as_i128(value)?;
    usize::try_from(ordinal)
        .ok()
        .and_then(|ordinal| variants.get(ordinal).copied())
        .map(Some)
        .ok_or_else(|| Error::conversion(format!("{name} has no variant with ordinal {ordinal}")))
}

/// Interpret any temporal, textual or epoch-millisecond value as a UTC instant.
pub(crate) fn instant(value: &DataType) -> Result<NaiveDateTime> {
    match value {
        DataType::Timestamp(Some(raw)) | DataType::Str(Some(raw)) => parse_timestamp(raw),
        DataType::Date(Some(raw)) => parse_date(raw).map(|date| date.and_time(NaiveTime::MIN)),
        DataType::Time(Some(raw)) => Ok(DateTime::<Utc>::UNIX_EPOCH.date_naive().and_time(parse_time(raw)?)),
        DataType::Int64(Some(millis)) => DateTime::from_timestamp_millis(*millis)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| Error::conversion(format!("{millis} is out of range for a timestamp"))),
        other => Err(unexpected("temporal", other)),
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }
    if let Ok(date) = parse_date(raw) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    if let Ok(time) = parse_time(raw) {
        return Ok(DateTime::<Utc>::UNIX_EPOCH.date_naive().and_time(time));
    }
    Err(Error::conversion(format!(
        "unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\" format"
    )))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_e| Error::conversion(format!("unsupported date: {raw}; expected \"%Y-%m-%d\" format")))
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_e| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_e| Error::conversion(format!("unsupported time: {raw}; expected \"%H:%M:%S%.f\" format")))
}

fn as_i128(value: &DataType) -> Result<i128> {
    match value {
        DataType::Boolean(Some(v)) => Ok(i128::from(*v)),
        DataType::Int32(Some(v)) => Ok(i128::from(*v)),
        DataType::Int64(Some(v)) => Ok(i128::from(*v)),
        DataType::Uint32(Some(v)) => Ok(i128::from(*v)),
        DataType::Uint64(Some(v)) => Ok(i128::from(*v)),
        DataType::Float(Some(v)) => integral(f64::from(*v)),
        DataType::Double(Some(v)) => integral(*v),
        DataType::Str(Some(raw)) => raw
            .trim()
            .parse()
            .map_err(|_e| Error::conversion(format!("'{raw}' is not an integer"))),
        other => Err(unexpected("integer", other)),
    }
}

fn integral(value: f64) -> Result<i128> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e38 {
        Ok(value as i128)
    } else {
        Err(Error::conversion(format!("{value} is not an integral number")))
    }
}

fn as_f64(value: &DataType) -> Result<f64> {
    match value {
        DataType::Double(Some(v)) => Ok(*v),
        DataType::Float(Some(v)) => Ok(f64::from(*v)),
        DataType::Int32(Some(v)) => Ok(f64::from(*v)),
        DataType::Uint32(Some(v)) => Ok(f64::from(*v)),
        DataType::Int64(Some(v)) => Ok(*v as f64),
        DataType::Uint64(Some(v)) => Ok(*v as f64),
        DataType::Str(Some(raw)) => {
            raw.trim().parse().map_err(|_e| Error::conversion(format!("'{raw}' is not a number")))
        }
        other => Err(unexpected("floating point", other)),
    }
}

fn as_bool(value: &DataType) -> Result<bool> {
    match value {
        DataType::Boolean(Some(v)) => Ok(*v),
        DataType::Int32(Some(v)) => Ok(*v != 0),
        DataType::Int64(Some(v)) => Ok(*v != 0),
        DataType::Uint32(Some(v)) => Ok(*v != 0),
        DataType::Uint64(Some(v)) => Ok(*v != 0),
        // single-bit fields arrive as one byte
        DataType::Binary(Some(bytes)) if bytes.len() == 1 => Ok(bytes[0] != 0),
        DataType::Str(Some(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" => Ok(true),
            "false" | "f" | "0" | "no" | "n" => Ok(false),
            _ => Err(Error::conversion(format!("'{raw}' is not a boolean"))),
        },
        other => Err(unexpected("boolean", other)),
    }
}

fn as_string(value: &DataType) -> Result<String> {
    match value {
        DataType::Str(Some(raw))
        | DataType::Date(Some(raw))
        | DataType::Time(Some(raw))
        | DataType::Timestamp(Some(raw)) => Ok(raw.clone()),
        DataType::Boolean(Some(v)) => Ok(v.to_string()),
        DataType::Int32(Some(v)) => Ok(v.to_string()),
        DataType::Int64(Some(v)) => Ok(v.to_string()),
        DataType::Uint32(Some(v)) => Ok(v.to_string()),
        DataType::Uint64(Some(v)) => Ok(v.to_string()),
        DataType::Float(Some(v)) => Ok(v.to_string()),
        DataType::Double(Some(v)) => Ok(v.to_string()),
        DataType::Binary(Some(bytes)) => String::from_utf8(bytes.clone())
            .map_err(|_e| Error::conversion("binary value is not valid UTF-8")),
        other => Err(unexpected("string", other)),
    }
}

fn unexpected(expected: &str, actual: &DataType) -> Error {
    Error::conversion(format!("expected {expected} data type, found {:?}", actual.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_coerce_across_widths() {
        assert_eq!(i32::from_data(&DataType::Int64(Some(42))).unwrap(), Some(42));
        assert_eq!(u8::from_data(&DataType::Int32(Some(7))).unwrap(), Some(7));
        assert_eq!(i64::from_data(&DataType::Str(Some(" 12 ".to_string()))).unwrap(), Some(12));
        assert_eq!(i64::from_data(&DataType::Double(Some(3.0))).unwrap(), Some(3));

        let err = i32::from_data(&DataType::Int64(Some(i64::MAX))).unwrap_err();
        assert!(err.to_string().contains("out of range for i32"));
        i64::from_data(&DataType::Double(Some(3.5))).unwrap_err();
    }

    #[test]
    fn null_is_never_a_default() {
        assert_eq!(i32::from_data(&DataType::Int32(None)).unwrap(), None);
        assert_eq!(<Option<i32>>::from_data(&DataType::Str(None)).unwrap(), Some(None));
        assert_eq!(<Option<String>>::None.to_data(), DataType::Str(None));
    }

    #[test]
    fn booleans_from_integers_text_and_bits() {
        assert_eq!(bool::from_data(&DataType::Int64(Some(1))).unwrap(), Some(true));
        assert_eq!(bool::from_data(&DataType::Str(Some("F".to_string()))).unwrap(), Some(false));
        assert_eq!(bool::from_data(&DataType::Binary(Some(vec![1]))).unwrap(), Some(true));
        bool::from_data(&DataType::Str(Some("maybe".to_string()))).unwrap_err();
    }

    #[test]
    fn big_integers_as_text() {
        let big = i128::from(u64::MAX) * 4;
        assert_eq!(big.to_data(), DataType::Str(Some(big.to_string())));
        assert_eq!(i128::from_data(&big.to_data()).unwrap(), Some(big));
    }

    #[test]
    fn temporal_text_forms() {
        let ts = NaiveDateTime::from_data(&DataType::Str(Some("2024-01-15T10:30:45Z".to_string())))
            .unwrap()
            .unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-15 10:30:45");

        let fallback = DateTime::<Utc>::from_data(&DataType::Timestamp(Some(
            "2024-01-15 10:30:45.123".to_string(),
        )))
        .unwrap()
        .unwrap();
        assert_eq!(fallback.timestamp_subsec_millis(), 123);

        let date = NaiveDate::from_data(&DataType::Timestamp(Some("2024-01-15 23:59:59".to_string())))
            .unwrap()
            .unwrap();
        assert_eq!(date.to_data(), DataType::Date(Some("2024-01-15".to_string())));

        let err = NaiveDateTime::from_data(&DataType::Str(Some("invalid date".to_string())))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported timestamp"));
    }

    #[test]
    fn epoch_millis_as_instant() {
        let ts = NaiveDateTime::from_data(&DataType::Int64(Some(86_400_000))).unwrap().unwrap();
        assert_eq!(ts.format("%Y-%m-%d").to_string(), "1970-01-02");
    }

    #[test]
    fn json_from_text_or_bytes() {
        let value = serde_json::Value::from_data(&DataType::Str(Some("{\"a\":1}".to_string())))
            .unwrap()
            .unwrap();
        assert_eq!(value["a"], 1);
        serde_json::Value::from_data(&DataType::Str(Some("not json".to_string()))).unwrap_err();
    }

    #[test]
    fn char_requires_one_character() {
        assert_eq!(char::from_data(&DataType::Str(Some("A".to_string()))).unwrap(), Some('A'));
        char::from_data(&DataType::Str(Some("AB".to_string()))).unwrap_err();
    }
}
