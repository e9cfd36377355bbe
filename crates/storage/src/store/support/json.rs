#![forbid(unsafe_code)]

use super::super::StoreError;
use serde_json::Value;

pub(in crate::store) fn encode_json(value: Option<&Value>) -> Result<Option<String>, StoreError> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(StoreError::from)
}

pub(in crate::store) fn decode_json(
    raw: Option<String>,
    column: usize,
) -> Result<Option<Value>, rusqlite::Error> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    serde_json::from_str(&raw).map(Some).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
    })
}
