use crate::ingest::schema::{ColumnType, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoerceError {
    #[error("invalid {type_tag} value {raw:?}: {reason}")]
    Parse {
        type_tag: ColumnType,
        raw: String,
        reason: String,
    },

    #[error("invalid data type {0}")]
    UnsupportedType(String),
}

/// Converts `raw` according to the textual type tag `type_tag`.
pub fn coerce(type_tag: &str, raw: &str) -> Result<Value, CoerceError> {
    type_tag.parse::<ColumnType>()?.coerce(raw)
}

impl ColumnType {
    pub fn coerce(&self, raw: &str) -> Result<Value, CoerceError> {
        let parse_error = |reason: String| CoerceError::Parse {
            type_tag: *self,
            raw: raw.to_string(),
            reason,
        };

        match self {
            ColumnType::Int64 => raw
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| parse_error(e.to_string())),
            ColumnType::Float64 => raw
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|e| parse_error(e.to_string())),
            ColumnType::Bool => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| parse_error("not a boolean literal".to_string())),
            ColumnType::String | ColumnType::Date | ColumnType::Timestamp => {
                Ok(Value::Text(raw.to_string()))
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
