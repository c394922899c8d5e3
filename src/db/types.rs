//! Row decoding for statement results.
//!
//! Column values are classified by their declared type name and then pulled
//! out with a backend-specific decoder into JSON values. SQL NULL is the only
//! thing that becomes JSON null; a value that cannot be decoded is an error.

use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ColumnMetadata};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::error::BoxDynError;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Uuid,
    Date,
    Time,
    /// Date and time without a zone (DATETIME, TIMESTAMP)
    DateTime,
    /// PostgreSQL TIMESTAMPTZ
    TimestampTz,
    Text,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, kind: BackendKind) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Checked first: "numeric" would otherwise fall through to float
    if lower.contains("decimal") || lower.contains("numeric") {
        if kind == BackendKind::Sqlite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    match lower.as_str() {
        "bool" | "boolean" => return TypeCategory::Boolean,
        "json" | "jsonb" => return TypeCategory::Json,
        "uuid" => return TypeCategory::Uuid,
        "date" => return TypeCategory::Date,
        "time" | "timetz" => return TypeCategory::Time,
        "datetime" | "timestamp" => return TypeCategory::DateTime,
        "timestamptz" => return TypeCategory::TimestampTz,
        "year" => return TypeCategory::Integer,
        "bit" if kind == BackendKind::MySql => return TypeCategory::Integer,
        "interval" => return TypeCategory::Text,
        _ => {}
    }

    // Before the integer check: TINYBLOB and TINYTEXT contain "tiny"
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    if lower.contains("text") || lower.contains("char") {
        return TypeCategory::Text;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    TypeCategory::Text
}

/// DECIMAL/NUMERIC values kept as their exact textual representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, BoxDynError> {
        // MySQL sends DECIMAL as text in both protocols
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
            PgValueFormat::Binary => Ok(RawDecimal(numeric_from_binary(value.as_bytes()?)?)),
        }
    }
}

/// Render a binary-format UUID in the 8-4-4-4-12 hex form.
fn uuid_from_binary(buf: &[u8]) -> Result<String, BoxDynError> {
    if buf.len() != 16 {
        return Err(format!("expected 16 bytes for UUID, got {}", buf.len()).into());
    }
    let mut out = String::with_capacity(36);
    for (i, byte) in buf.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(out)
}

const NUMERIC_NEGATIVE: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_POS_INF: u16 = 0xD000;
const NUMERIC_NEG_INF: u16 = 0xF000;

/// Render a binary-format PostgreSQL NUMERIC: a header of digit count,
/// weight, sign and display scale followed by base-10000 digits.
fn numeric_from_binary(buf: &[u8]) -> Result<String, BoxDynError> {
    let word = |i: usize| -> Result<u16, BoxDynError> {
        buf.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| BoxDynError::from("truncated NUMERIC value"))
    };

    let ndigits = word(0)? as usize;
    let weight = word(1)? as i16 as i32;
    let sign = word(2)?;
    let scale = word(3)? as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_POS_INF => return Ok("Infinity".to_string()),
        NUMERIC_NEG_INF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<_>, _>>()?;
    let digit = |pos: i32| {
        usize::try_from(pos)
            .ok()
            .and_then(|p| digits.get(p).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEGATIVE {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for pos in 1..=weight {
            out.push_str(&format!("{:04}", digit(pos)));
        }
    }

    if scale > 0 {
        let mut fraction = String::with_capacity(scale + 4);
        let mut pos = weight + 1;
        while fraction.len() < scale {
            fraction.push_str(&format!("{:04}", digit(pos)));
            pos += 1;
        }
        fraction.truncate(scale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

/// Binary column values are rendered as base64 strings.
pub fn encode_binary(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Boolean columns stored as integers: only 0 and 1 read as booleans.
fn bool_or_integer(v: i64) -> JsonValue {
    match v {
        0 => JsonValue::Bool(false),
        1 => JsonValue::Bool(true),
        other => JsonValue::Number(other.into()),
    }
}

fn naive_datetime(v: NaiveDateTime) -> JsonValue {
    JsonValue::String(v.to_string())
}

fn decode_failed(column: &str, type_name: &str, err: BoxDynError) -> DbError {
    DbError::backend_execution(
        format!("Failed to decode column '{column}' ({type_name}): {err}"),
        None,
    )
}

/// Conversion of a driver row into a JSON object keyed by column name.
pub trait RowToJson {
    fn to_json_map(&self) -> DbResult<serde_json::Map<String, JsonValue>>;
    fn column_metadata(&self) -> Vec<ColumnMetadata>;
}

macro_rules! impl_row_to_json {
    ($row:ty, $kind:expr, $decoder:path) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> DbResult<serde_json::Map<String, JsonValue>> {
                let mut map = serde_json::Map::with_capacity(self.len());
                for (idx, col) in self.columns().iter().enumerate() {
                    let type_name = col.type_info().name();
                    let category = categorize_type(type_name, $kind);
                    let value = $decoder(self, idx, category)
                        .map_err(|e| decode_failed(col.name(), type_name, e))?;
                    map.insert(col.name().to_string(), value);
                }
                Ok(map)
            }

            fn column_metadata(&self) -> Vec<ColumnMetadata> {
                self.columns()
                    .iter()
                    .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
                    .collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, BackendKind::MySql, mysql::decode_column);
impl_row_to_json!(PgRow, BackendKind::PgSql, postgres::decode_column);
impl_row_to_json!(SqliteRow, BackendKind::Sqlite, sqlite::decode_column);

mod mysql {
    use super::*;
    use sqlx::mysql::types::MySqlTime;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<JsonValue, BoxDynError> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(JsonValue::Null);
        }

        let value = match category {
            TypeCategory::Decimal => JsonValue::String(row.try_get::<RawDecimal, _>(idx)?.0),
            TypeCategory::Integer => decode_integer(row, idx)?,
            // BOOLEAN is TINYINT(1) and can hold any small integer
            TypeCategory::Boolean => match row.try_get::<i64, _>(idx) {
                Ok(v) => bool_or_integer(v),
                Err(_) => JsonValue::Bool(row.try_get::<bool, _>(idx)?),
            },
            TypeCategory::Float => match row.try_get::<f64, _>(idx) {
                Ok(v) => float_value(v),
                Err(_) => float_value(row.try_get::<f32, _>(idx)?.into()),
            },
            TypeCategory::Binary => encode_binary(&row.try_get::<Vec<u8>, _>(idx)?),
            TypeCategory::Json => row.try_get::<JsonValue, _>(idx)?,
            TypeCategory::Date => JsonValue::String(row.try_get::<NaiveDate, _>(idx)?.to_string()),
            // TIME is a duration on MySQL and may be negative or past 24h
            TypeCategory::Time => JsonValue::String(row.try_get::<MySqlTime, _>(idx)?.to_string()),
            TypeCategory::DateTime | TypeCategory::TimestampTz => {
                naive_datetime(row.try_get::<DateTime<Utc>, _>(idx)?.naive_utc())
            }
            TypeCategory::Uuid | TypeCategory::Text => {
                JsonValue::String(row.try_get::<String, _>(idx)?)
            }
        };
        Ok(value)
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<JsonValue, BoxDynError> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(JsonValue::Number(v.into()));
        }
        Ok(JsonValue::Number(row.try_get::<u64, _>(idx)?.into()))
    }
}

mod postgres {
    use super::*;
    use chrono::FixedOffset;
    use sqlx::postgres::types::PgTimeTz;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<JsonValue, BoxDynError> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(JsonValue::Null);
        }

        let value = match category {
            TypeCategory::Decimal => JsonValue::String(row.try_get::<RawDecimal, _>(idx)?.0),
            TypeCategory::Integer => decode_integer(row, idx)?,
            TypeCategory::Boolean => JsonValue::Bool(row.try_get::<bool, _>(idx)?),
            TypeCategory::Float => match row.try_get::<f64, _>(idx) {
                Ok(v) => float_value(v),
                Err(_) => float_value(row.try_get::<f32, _>(idx)?.into()),
            },
            TypeCategory::Binary => encode_binary(&row.try_get::<Vec<u8>, _>(idx)?),
            TypeCategory::Json => row.try_get::<JsonValue, _>(idx)?,
            TypeCategory::Uuid => {
                let raw = row.try_get_raw(idx)?;
                let text = match raw.format() {
                    PgValueFormat::Text => raw.as_str()?.to_string(),
                    PgValueFormat::Binary => uuid_from_binary(raw.as_bytes()?)?,
                };
                JsonValue::String(text)
            }
            TypeCategory::Date => JsonValue::String(row.try_get::<NaiveDate, _>(idx)?.to_string()),
            TypeCategory::Time => match row.try_get::<NaiveTime, _>(idx) {
                Ok(v) => JsonValue::String(v.to_string()),
                Err(_) => {
                    let v = row.try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(idx)?;
                    JsonValue::String(format!("{}{}", v.time, v.offset))
                }
            },
            TypeCategory::DateTime => naive_datetime(row.try_get::<NaiveDateTime, _>(idx)?),
            TypeCategory::TimestampTz => {
                JsonValue::String(row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339())
            }
            TypeCategory::Text => decode_text(row, idx)?,
        };
        Ok(value)
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<JsonValue, BoxDynError> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Ok(JsonValue::Number(v.into()));
        }
        Ok(JsonValue::Number(row.try_get::<i16, _>(idx)?.into()))
    }

    /// Types without a dedicated decoder (INTERVAL, INET, enums, ...) keep
    /// the server's own text when it was sent as text.
    fn decode_text(row: &PgRow, idx: usize) -> Result<JsonValue, BoxDynError> {
        match row.try_get::<String, _>(idx) {
            Ok(v) => Ok(JsonValue::String(v)),
            Err(e) => {
                let raw = row.try_get_raw(idx)?;
                if raw.format() == PgValueFormat::Text {
                    Ok(JsonValue::String(raw.as_str()?.to_string()))
                } else {
                    Err(e.into())
                }
            }
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::Sqlite;

    enum StorageClass {
        Integer,
        Real,
        Text,
        Blob,
    }

    /// SQLite is dynamically typed: the declared type is only an affinity,
    /// so every value is decoded by the storage class it actually has.
    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<JsonValue, BoxDynError> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }

        let storage = match raw.type_info().name() {
            "INTEGER" => StorageClass::Integer,
            "REAL" => StorageClass::Real,
            "BLOB" => StorageClass::Blob,
            _ => StorageClass::Text,
        };

        let value = match storage {
            StorageClass::Integer => {
                let v = <i64 as Decode<Sqlite>>::decode(raw)?;
                if category == TypeCategory::Boolean {
                    bool_or_integer(v)
                } else {
                    JsonValue::Number(v.into())
                }
            }
            StorageClass::Real => float_value(<f64 as Decode<Sqlite>>::decode(raw)?),
            StorageClass::Blob => encode_binary(<&[u8] as Decode<Sqlite>>::decode(raw)?),
            StorageClass::Text => JsonValue::String(<String as Decode<Sqlite>>::decode(raw)?),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::Connection;
    use sqlx::sqlite::SqliteConnection;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", BackendKind::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", BackendKind::PgSql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", BackendKind::PgSql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("YEAR", BackendKind::MySql),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", BackendKind::MySql),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", BackendKind::PgSql),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("numeric", BackendKind::Sqlite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal() {
        assert_eq!(
            categorize_type("DATE", BackendKind::MySql),
            TypeCategory::Date
        );
        assert_eq!(
            categorize_type("TIMETZ", BackendKind::PgSql),
            TypeCategory::Time
        );
        assert_eq!(
            categorize_type("DATETIME", BackendKind::MySql),
            TypeCategory::DateTime
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", BackendKind::PgSql),
            TypeCategory::TimestampTz
        );
        // "interval" contains "int"
        assert_eq!(
            categorize_type("INTERVAL", BackendKind::PgSql),
            TypeCategory::Text
        );
    }

    #[test]
    fn test_categorize_type_other() {
        assert_eq!(
            categorize_type("jsonb", BackendKind::PgSql),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("UUID", BackendKind::PgSql),
            TypeCategory::Uuid
        );
        assert_eq!(
            categorize_type("BLOB", BackendKind::Sqlite),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("TINYBLOB", BackendKind::MySql),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("TINYTEXT", BackendKind::MySql),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("VARCHAR", BackendKind::MySql),
            TypeCategory::Text
        );
    }

    #[test]
    fn test_encode_binary() {
        assert_eq!(
            encode_binary(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(encode_binary(&[]), JsonValue::String(String::new()));
    }

    #[test]
    fn test_bool_or_integer() {
        assert_eq!(bool_or_integer(0), json!(false));
        assert_eq!(bool_or_integer(1), json!(true));
        assert_eq!(bool_or_integer(7), json!(7));
    }

    fn numeric_bytes(weight: i16, sign: u16, scale: u16, digits: &[u16]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        buf.extend_from_slice(&weight.to_be_bytes());
        buf.extend_from_slice(&sign.to_be_bytes());
        buf.extend_from_slice(&scale.to_be_bytes());
        for d in digits {
            buf.extend_from_slice(&d.to_be_bytes());
        }
        buf
    }

    #[test]
    fn test_numeric_from_binary() {
        let bytes = numeric_bytes(1, 0, 3, &[1, 2345, 6780]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "12345.678");

        let bytes = numeric_bytes(-1, 0, 4, &[12]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "0.0012");

        let bytes = numeric_bytes(0, NUMERIC_NEGATIVE, 0, &[5]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "-5");

        let bytes = numeric_bytes(1, 0, 2, &[1]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "10000.00");

        let bytes = numeric_bytes(0, NUMERIC_NAN, 0, &[]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "NaN");

        assert!(numeric_from_binary(&[0, 1]).is_err());
    }

    #[test]
    fn test_uuid_from_binary() {
        let bytes: Vec<u8> = (0u8..16).map(|b| b * 17).collect();
        assert_eq!(
            uuid_from_binary(&bytes).unwrap(),
            "00112233-4455-6677-8899-aabbccddeeff"
        );
        assert!(uuid_from_binary(&bytes[..15]).is_err());
    }

    #[tokio::test]
    async fn test_sqlite_values_keep_their_storage_class() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE t (v INTEGER, f REAL, b BOOLEAN, d DATE)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO t VALUES ('abc', 'x', 'yes', '2024-02-29'), \
             (1.5, 2, 7, NULL), (3, 0.25, 1, 20240229)",
        )
        .execute(&mut conn)
        .await
        .unwrap();

        let rows = sqlx::query("SELECT v, f, b, d FROM t ORDER BY rowid")
            .fetch_all(&mut conn)
            .await
            .unwrap();
        let decoded: Vec<JsonValue> = rows
            .iter()
            .map(|row| JsonValue::Object(row.to_json_map().unwrap()))
            .collect();

        assert_eq!(
            decoded,
            vec![
                json!({"v": "abc", "f": "x", "b": "yes", "d": "2024-02-29"}),
                json!({"v": 1.5, "f": 2.0, "b": 7, "d": null}),
                json!({"v": 3, "f": 0.25, "b": true, "d": 20240229}),
            ]
        );
    }

    #[tokio::test]
    async fn test_sqlite_blob_and_expression_columns() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        let row = sqlx::query("SELECT x'010203' AS raw, 1 + 1 AS n, NULL AS \"nothing\"")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        let map = row.to_json_map().unwrap();
        assert_eq!(map["raw"], json!("AQID"));
        assert_eq!(map["n"], json!(2));
        assert_eq!(map["nothing"], JsonValue::Null);
    }
}
