//! JSON reader/writer over arbitrary nested values.

use serde_json::Value;

use super::FileError;

pub fn read(text: &str) -> Result<Value, FileError> {
    Ok(serde_json::from_str(text)?)
}

pub fn write(value: &Value) -> Result<String, FileError> {
    Ok(serde_json::to_string_pretty(value)?)
}
