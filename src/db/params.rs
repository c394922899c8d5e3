//! Parameter binding for the sqlx backends.
//!
//! [`QueryParam`] implements sqlx's `Type` and `Encode` for every driver, so a
//! session binds caller values with a plain `query.bind(param)`. The SQL type
//! sent for each value follows its variant.

use crate::models::QueryParam;
use serde_json::Value as JsonValue;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::types::Json;
use sqlx::{Database, MySql, Postgres, Sqlite, Type};

/// Implement `Type` and `Encode` for one driver. `$json` is the wire type
/// for JSON documents and `$encode_json` builds it from the value.
macro_rules! impl_bind_value {
    ($db:ty, $json:ty, |$value:ident| $encode_json:expr) => {
        impl Type<$db> for QueryParam {
            fn type_info() -> <$db as Database>::TypeInfo {
                <String as Type<$db>>::type_info()
            }
        }

        impl<'q> Encode<'q, $db> for QueryParam {
            fn encode_by_ref(
                &self,
                buf: &mut <$db as Database>::ArgumentBuffer<'q>,
            ) -> Result<IsNull, BoxDynError> {
                match self {
                    QueryParam::Null => Ok(IsNull::Yes),
                    QueryParam::Bool(v) => <bool as Encode<'q, $db>>::encode_by_ref(v, buf),
                    QueryParam::Int(v) => <i64 as Encode<'q, $db>>::encode_by_ref(v, buf),
                    QueryParam::Float(v) => <f64 as Encode<'q, $db>>::encode_by_ref(v, buf),
                    QueryParam::String(v) => <String as Encode<'q, $db>>::encode_by_ref(v, buf),
                    QueryParam::Bytes(v) => <Vec<u8> as Encode<'q, $db>>::encode_by_ref(v, buf),
                    QueryParam::Json($value) => {
                        <$json as Encode<'q, $db>>::encode($encode_json, buf)
                    }
                }
            }

            fn produces(&self) -> Option<<$db as Database>::TypeInfo> {
                let type_info = match self {
                    // Untyped NULL goes over as text
                    QueryParam::Null | QueryParam::String(_) => <String as Type<$db>>::type_info(),
                    QueryParam::Bool(_) => <bool as Type<$db>>::type_info(),
                    QueryParam::Int(_) => <i64 as Type<$db>>::type_info(),
                    QueryParam::Float(_) => <f64 as Type<$db>>::type_info(),
                    QueryParam::Bytes(_) => <Vec<u8> as Type<$db>>::type_info(),
                    QueryParam::Json(_) => <$json as Type<$db>>::type_info(),
                };
                Some(type_info)
            }
        }
    };
}

impl_bind_value!(MySql, Json<&JsonValue>, |value| Json(value));
impl_bind_value!(Postgres, Json<&JsonValue>, |value| Json(value));
// No native JSON type, store as text
impl_bind_value!(Sqlite, String, |value| value.to_string());

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::TypeInfo;
    use sqlx::sqlite::SqliteArgumentValue;

    fn sqlite_type(param: &QueryParam) -> String {
        <QueryParam as Encode<Sqlite>>::produces(param)
            .map(|t| t.name().to_string())
            .unwrap_or_default()
    }

    fn pg_type(param: &QueryParam) -> String {
        <QueryParam as Encode<Postgres>>::produces(param)
            .map(|t| t.name().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn test_declared_type_follows_variant() {
        assert_eq!(pg_type(&QueryParam::Int(1)), "INT8");
        assert_eq!(pg_type(&QueryParam::Float(1.0)), "FLOAT8");
        assert_eq!(pg_type(&QueryParam::Bool(true)), "BOOL");
        assert_eq!(pg_type(&QueryParam::Bytes(vec![1])), "BYTEA");
        assert_eq!(pg_type(&QueryParam::from("x")), "TEXT");
        assert_eq!(pg_type(&QueryParam::Json(serde_json::json!({}))), "JSONB");

        assert_eq!(sqlite_type(&QueryParam::Int(1)), "INTEGER");
        assert_eq!(sqlite_type(&QueryParam::Float(1.0)), "REAL");
        assert_eq!(sqlite_type(&QueryParam::Bytes(vec![1])), "BLOB");
        assert_eq!(sqlite_type(&QueryParam::Json(serde_json::json!([1]))), "TEXT");
    }

    #[test]
    fn test_sqlite_encoding() {
        let mut buf: Vec<SqliteArgumentValue<'_>> = Vec::new();
        let null = <QueryParam as Encode<Sqlite>>::encode_by_ref(&QueryParam::Null, &mut buf);
        assert!(null.unwrap().is_null());
        assert!(buf.is_empty());

        let json = QueryParam::Json(serde_json::json!({"a": 1}));
        let written = <QueryParam as Encode<Sqlite>>::encode_by_ref(&json, &mut buf);
        assert!(!written.unwrap().is_null());
        match buf.as_slice() {
            [SqliteArgumentValue::Text(text)] => assert_eq!(text.as_ref(), r#"{"a":1}"#),
            other => panic!("unexpected arguments: {other:?}"),
        }

        let bytes = QueryParam::Bytes(vec![0, 255]);
        let written = <QueryParam as Encode<Sqlite>>::encode_by_ref(&bytes, &mut buf);
        assert!(!written.unwrap().is_null());
        assert!(matches!(&buf[1], SqliteArgumentValue::Blob(b) if b.as_ref() == [0u8, 255]));
    }
}
