use std::str::FromStr;

use gpui::SharedString;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::value::{FieldName, FieldValue, Values};

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FieldValueError {
    #[error("field `{0}` is missing")]
    Missing(FieldName),
    #[error("field `{field}` expected {expected}, found {found}")]
    Mismatch {
        field: FieldName,
        expected: &'static str,
        found: &'static str,
    },
}

impl FieldValueError {
    pub fn mismatch(expected: &'static str, found: &FieldValue) -> Self {
        Self::Mismatch {
            field: FieldName::default(),
            expected,
            found: found.kind(),
        }
    }

    pub fn in_field(self, name: impl Into<FieldName>) -> Self {
        match self {
            Self::Mismatch {
                expected, found, ..
            } => Self::Mismatch {
                field: name.into(),
                expected,
                found,
            },
            missing @ Self::Missing(_) => missing,
        }
    }
}

/// A typed form model that round-trips through the engine's value map.
/// Usually derived with `#[derive(FormValues)]`.
pub trait FormValues: Sized {
    type Fields;

    fn fields() -> Self::Fields;
    fn to_values(&self) -> Values;
    fn from_values(values: &Values) -> Result<Self, FieldValueError>;
}

pub trait IntoFieldValue {
    fn to_field_value(&self) -> FieldValue;
}

pub trait FromFieldValue: Sized {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError>;

    /// Value used when the key is absent. `None` makes the field required.
    fn when_missing() -> Option<Self> {
        None
    }
}

/// Reads one field of `values`, used by the derive.
pub fn read_field<T>(values: &Values, name: &'static str) -> Result<T, FieldValueError>
where
    T: FromFieldValue,
{
    match values.get(&FieldName::from(name)) {
        Some(value) => T::from_field_value(value).map_err(|error| error.in_field(name)),
        None => T::when_missing().ok_or_else(|| FieldValueError::Missing(name.into())),
    }
}

impl IntoFieldValue for FieldValue {
    fn to_field_value(&self) -> FieldValue {
        self.clone()
    }
}

impl FromFieldValue for FieldValue {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        Ok(value.clone())
    }

    fn when_missing() -> Option<Self> {
        Some(FieldValue::Null)
    }
}

impl IntoFieldValue for SharedString {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }
}

impl FromFieldValue for SharedString {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        match value {
            FieldValue::Text(text) => Ok(text.clone()),
            other => Err(FieldValueError::mismatch("text", other)),
        }
    }
}

impl IntoFieldValue for String {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone().into())
    }
}

impl FromFieldValue for String {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        SharedString::from_field_value(value).map(|text| text.to_string())
    }
}

impl IntoFieldValue for bool {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        value
            .as_bool()
            .ok_or_else(|| FieldValueError::mismatch("bool", value))
    }
}

impl IntoFieldValue for Decimal {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(*self)
    }
}

// Number inputs bound through `handle_change` deliver text.
impl FromFieldValue for Decimal {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        match value {
            FieldValue::Number(number) => Ok(*number),
            FieldValue::Text(text) => Decimal::from_str(text.trim())
                .map_err(|_| FieldValueError::mismatch("number", value)),
            other => Err(FieldValueError::mismatch("number", other)),
        }
    }
}

impl IntoFieldValue for i64 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(Decimal::from(*self))
    }
}

impl FromFieldValue for i64 {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        let number = Decimal::from_field_value(value)?;
        if !number.fract().is_zero() {
            return Err(FieldValueError::mismatch("integer", value));
        }
        number
            .to_i64()
            .ok_or_else(|| FieldValueError::mismatch("integer", value))
    }
}

impl IntoFieldValue for u32 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(Decimal::from(*self))
    }
}

impl FromFieldValue for u32 {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        let number = i64::from_field_value(value)?;
        u32::try_from(number).map_err(|_| FieldValueError::mismatch("unsigned integer", value))
    }
}

impl IntoFieldValue for Values {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Object(self.clone())
    }
}

impl FromFieldValue for Values {
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        value
            .as_object()
            .cloned()
            .ok_or_else(|| FieldValueError::mismatch("object", value))
    }
}

impl<T> IntoFieldValue for Option<T>
where
    T: IntoFieldValue,
{
    fn to_field_value(&self) -> FieldValue {
        self.as_ref()
            .map_or(FieldValue::Null, IntoFieldValue::to_field_value)
    }
}

impl<T> FromFieldValue for Option<T>
where
    T: FromFieldValue,
{
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        match value {
            FieldValue::Null => Ok(None),
            // Cleared text inputs leave an empty string behind.
            FieldValue::Text(text) if text.trim().is_empty() => Ok(None),
            other => T::from_field_value(other).map(Some),
        }
    }

    fn when_missing() -> Option<Self> {
        Some(None)
    }
}

impl<T> IntoFieldValue for Vec<T>
where
    T: IntoFieldValue,
{
    fn to_field_value(&self) -> FieldValue {
        FieldValue::List(self.iter().map(IntoFieldValue::to_field_value).collect())
    }
}

impl<T> FromFieldValue for Vec<T>
where
    T: FromFieldValue,
{
    fn from_field_value(value: &FieldValue) -> Result<Self, FieldValueError> {
        value
            .as_list()
            .ok_or_else(|| FieldValueError::mismatch("list", value))?
            .iter()
            .map(T::from_field_value)
            .collect()
    }
}
