//! Field encoding and decoding for log entries.
//!
//! An entry's wire representation is a flat alternating key/value text
//! sequence. Encoding drops fields whose value is null or the empty string;
//! `false` and `0` are kept as their string forms. Decoding tolerates an
//! odd-length sequence (a corrupt or partial write) by assigning the
//! dangling trailing key an empty-string value.

/// Input value for an entry field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Absent value; the field is dropped before encoding.
    Null,
}

impl FieldValue {
    /// Stringify for the wire, or `None` when the field must be dropped.
    pub fn into_wire(self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) if s.is_empty() => None,
            FieldValue::Text(s) => Some(s),
            FieldValue::Int(v) => Some(v.to_string()),
            FieldValue::Float(v) => Some(v.to_string()),
            FieldValue::Bool(v) => Some(v.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl<V: Into<FieldValue>> From<Option<V>> for FieldValue {
    fn from(v: Option<V>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Encode a field map into wire pairs, dropping null/empty values and
/// preserving input order.
pub fn encode_fields<K, V, I>(fields: I) -> Vec<(String, String)>
where
    K: Into<String>,
    V: Into<FieldValue>,
    I: IntoIterator<Item = (K, V)>,
{
    fields
        .into_iter()
        .filter_map(|(key, value)| value.into().into_wire().map(|v| (key.into(), v)))
        .collect()
}

/// Rebuild a field map from the flat alternating sequence.
pub fn decode_pairs(flat: &[String]) -> Vec<(String, String)> {
    flat.chunks(2)
        .map(|chunk| match chunk {
            [key, value] => (key.clone(), value.clone()),
            // dangling trailing key from a partial write
            [key] => (key.clone(), String::new()),
            _ => unreachable!("chunks(2) yields 1 or 2 items"),
        })
        .collect()
}
