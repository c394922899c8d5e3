//! Query-related data models.
//!
//! This module defines bind parameters and statement results.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data, written in JSON as `{"base64": "..."}` so it reads back
    /// as bytes rather than as a string
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// Arrays and objects, bound as JSON
    Json(JsonValue),
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Binary data as a single-key object holding base64 text.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Encoded {
        base64: String,
    }

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Encoded {
            base64: STANDARD.encode(bytes),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Encoded::deserialize(deserializer)?;
        STANDARD
            .decode(&encoded.base64)
            .map_err(serde::de::Error::custom)
    }
}

/// Bind values for one statement, in the shape the caller supplied them.
///
/// Positional values bind to `?`/`$n` placeholders in order. Named values bind
/// to `:name` markers in the statement text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Positional(Vec<QueryParam>),
    Named(BTreeMap<String, QueryParam>),
}

impl Params {
    /// No bind values.
    pub fn none() -> Self {
        Self::Positional(Vec::new())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::none()
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl From<Vec<QueryParam>> for Params {
    fn from(values: Vec<QueryParam>) -> Self {
        Self::Positional(values)
    }
}

impl<const N: usize> From<[QueryParam; N]> for Params {
    fn from(values: [QueryParam; N]) -> Self {
        Self::Positional(values.into())
    }
}

impl From<BTreeMap<String, QueryParam>> for Params {
    fn from(values: BTreeMap<String, QueryParam>) -> Self {
        Self::Named(values)
    }
}

impl<const N: usize> From<[(&str, QueryParam); N]> for Params {
    fn from(values: [(&str, QueryParam); N]) -> Self {
        Self::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Outcome of one executed statement, as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub rows_affected: u64,
}

impl StatementResult {
    /// Create a result for statements that return no rows.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Value of `column` in the first row, if any.
    pub fn first_value(&self, column: &str) -> Option<&JsonValue> {
        self.rows.first().and_then(|row| row.get(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_param_from_json() {
        let params: Vec<QueryParam> =
            serde_json::from_value(json!([null, true, 7, 1.5, "x", [1, 2]])).unwrap();
        assert_eq!(
            params,
            vec![
                QueryParam::Null,
                QueryParam::Bool(true),
                QueryParam::Int(7),
                QueryParam::Float(1.5),
                QueryParam::String("x".to_string()),
                QueryParam::Json(json!([1, 2])),
            ]
        );
    }

    #[test]
    fn test_bytes_serialize_as_tagged_base64() {
        let value = serde_json::to_value(QueryParam::Bytes(b"hi".to_vec())).unwrap();
        assert_eq!(value, json!({"base64": "aGk="}));
    }

    #[test]
    fn test_bytes_and_strings_read_back_as_themselves() {
        let params = vec![
            QueryParam::Bytes(vec![1, 2, 3]),
            QueryParam::String("AQID".to_string()),
            QueryParam::Json(json!({"base64": "AQID", "other": 1})),
        ];
        let text = serde_json::to_string(&params).unwrap();
        let back: Vec<QueryParam> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_params_shape_is_preserved() {
        let positional: Params = vec![QueryParam::Int(1)].into();
        assert_eq!(serde_json::to_value(&positional).unwrap(), json!([1]));

        let named: Params = [("id", QueryParam::Int(1))].into();
        assert_eq!(serde_json::to_value(&named).unwrap(), json!({"id": 1}));

        let empty: Params = ().into();
        assert!(empty.is_empty());
        assert_eq!(serde_json::to_value(&empty).unwrap(), json!([]));
    }

    #[test]
    fn test_option_param() {
        assert_eq!(QueryParam::from(None::<i64>), QueryParam::Null);
        assert_eq!(QueryParam::from(Some("a")), QueryParam::String("a".to_string()));
    }

    #[test]
    fn test_statement_result_accessors() {
        let mut row = serde_json::Map::new();
        row.insert("n".to_string(), json!(3));
        let result = StatementResult {
            columns: vec![ColumnMetadata::new("n", "INTEGER")],
            rows: vec![row],
            rows_affected: 0,
        };
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.first_value("n"), Some(&json!(3)));
        assert_eq!(StatementResult::affected(2).rows_affected, 2);
    }
}
