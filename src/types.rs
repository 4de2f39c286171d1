use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Values that can be stored in a database row or bound as query parameters.
///
/// Predicate and record helpers take `impl Into<RowValues>`, so plain Rust values work:
/// ```rust
/// use table_middleware::prelude::*;
///
/// let params: Vec<RowValues> = vec![1.into(), "alice".into(), true.into(), None::<i64>.into()];
/// assert_eq!(params[3], RowValues::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// UUID value
    Uuid(Uuid),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let RowValues::JSON(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// A `Uuid` value, or text that parses as one.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            RowValues::Uuid(value) => Some(*value),
            RowValues::Text(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<i16> for RowValues {
    fn from(value: i16) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<u32> for RowValues {
    fn from(value: u32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<Uuid> for RowValues {
    fn from(value: Uuid) -> Self {
        RowValues::Uuid(value)
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<f32> for RowValues {
    fn from(value: f32) -> Self {
        RowValues::Float(f64::from(value))
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_owned())
    }
}

impl From<&String> for RowValues {
    fn from(value: &String) -> Self {
        RowValues::Text(value.clone())
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// An ordered column → value mapping.
///
/// Used for insert rows, update patches and procedure arguments. Column order is the order
/// of first insertion; setting a column again replaces its value in place.
///
/// ```rust
/// use table_middleware::prelude::*;
///
/// let record = Record::new().with("key", "k").with("value", "v").with("key", "k2");
/// assert_eq!(record.columns().collect::<Vec<_>>(), vec!["key", "value"]);
/// assert_eq!(record.get("key"), Some(&RowValues::Text("k2".into())));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, RowValues)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Record::set`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<RowValues>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RowValues> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<RowValues>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.set(column, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, RowValues);
    type IntoIter = std::vec::IntoIter<(String, RowValues)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// A rendered statement and the parameters to bind, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// The SQL text, using `$n` placeholders
    pub sql: String,
    /// The parameters to be bound to the statement
    pub params: Vec<RowValues>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, params: Vec<RowValues>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_first_insertion_order() {
        let record: Record = [("b", 2), ("a", 1), ("b", 3)].into_iter().collect();
        let pairs: Vec<_> = record.iter().collect();
        assert_eq!(
            pairs,
            vec![("b", &RowValues::Int(3)), ("a", &RowValues::Int(1))]
        );
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(RowValues::from(None::<&str>), RowValues::Null);
        assert_eq!(RowValues::from(Some(7)), RowValues::Int(7));
    }

    #[test]
    fn values_serialize_untagged() {
        let values = vec![
            RowValues::Int(1),
            RowValues::Text("x".into()),
            RowValues::Null,
            RowValues::Bool(false),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[1,"x",null,false]"#);
    }

    #[test]
    fn uuid_serializes_as_string_and_parses_from_text() {
        let id = Uuid::parse_str("6f1c1f0e-8a43-4d8e-9a55-0b2f3f1e9c11").unwrap();
        let json = serde_json::to_string(&RowValues::from(id)).unwrap();
        assert_eq!(json, r#""6f1c1f0e-8a43-4d8e-9a55-0b2f3f1e9c11""#);
        assert_eq!(RowValues::Text(id.to_string()).as_uuid(), Some(id));
        assert_eq!(RowValues::Text("k".into()).as_uuid(), None);
    }

    #[test]
    fn text_parses_as_timestamp() {
        let value = RowValues::Text("2024-05-01 10:11:12".into());
        assert!(value.as_timestamp().is_some());
        assert!(RowValues::Int(3).as_timestamp().is_none());
    }
}
