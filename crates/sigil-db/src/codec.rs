//! Column encoding helpers shared by the repositories.
//!
//! UUIDs and enums are stored as strings, binary ciphertexts as base64.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

use crate::error::DbError;

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(field: &str, value: Option<&str>) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(field, v)).transpose()
}

pub(crate) fn encode_blob(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn decode_blob(field: &str, value: &str) -> Result<Vec<u8>, DbError> {
    STANDARD
        .decode(value)
        .map_err(|e| DbError::Decode(format!("invalid base64 in {field}: {e}")))
}

/// Parse a list of enum names as stored in an `array<string>` column.
pub(crate) fn parse_list<T>(values: Vec<String>) -> Result<Vec<T>, DbError>
where
    T: FromStr<Err = String>,
{
    values
        .iter()
        .map(|v| v.parse::<T>().map_err(DbError::Decode))
        .collect()
}

pub(crate) fn list_to_strings<T: ToString>(values: &[T]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}
