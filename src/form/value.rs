use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};

use gpui::SharedString;
use rust_decimal::Decimal;

/// Flat string key of a form field. Dotted names such as `address.city` are
/// a caller convention; the engine never splits them.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldName(SharedString);

impl FieldName {
    pub fn new(value: impl Into<SharedString>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    pub fn as_shared(&self) -> &SharedString {
        &self.0
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&'static str> for FieldName {
    fn from(value: &'static str) -> Self {
        Self(value.into())
    }
}

impl From<String> for FieldName {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<SharedString> for FieldName {
    fn from(value: SharedString) -> Self {
        Self(value)
    }
}

impl From<&FieldName> for FieldName {
    fn from(value: &FieldName) -> Self {
        value.clone()
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Text(SharedString),
    Number(Decimal),
    Bool(bool),
    List(Vec<FieldValue>),
    Object(Values),
}

impl FieldValue {
    pub fn text(value: impl Into<SharedString>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null, whitespace-only text and empty collections.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Object(values) => values.is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_ref()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Values> {
        match self {
            Self::Object(values) => Some(values),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }
}

impl From<SharedString> for FieldValue {
    fn from(value: SharedString) -> Self {
        Self::Text(value)
    }
}

impl From<&'static str> for FieldValue {
    fn from(value: &'static str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<Values> for FieldValue {
    fn from(value: Values) -> Self {
        Self::Object(value)
    }
}

impl<T> From<Vec<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Heterogeneous field map owned by one form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values(BTreeMap<FieldName, FieldValue>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<FieldName>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Shallow key-wise overwrite.
    pub fn merge(&mut self, other: Values) {
        self.0.extend(other.0);
    }

    pub fn into_inner(self) -> BTreeMap<FieldName, FieldValue> {
        self.0
    }
}

impl Deref for Values {
    type Target = BTreeMap<FieldName, FieldValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Values {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K, V> FromIterator<(K, V)> for Values
where
    K: Into<FieldName>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Values {
    type Item = (FieldName, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<FieldName, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = (&'a FieldName, &'a FieldValue);
    type IntoIter = std::collections::btree_map::Iter<'a, FieldName, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
