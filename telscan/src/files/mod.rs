//! Input/output file formats (C8): CSV, JSON, and plain text.

pub mod csv;
pub mod json;
pub mod plain;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed CSV at line {line}: {message}")]
    Csv { line: usize, message: String },
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single record: keyed string fields, in header order. Used by the CSV
/// reader and shared with the CLI's `--input` host/port loading.
pub type Record = indexmap_like::OrderedMap;

/// A tiny insertion-order-preserving string map, since `HashMap` would
/// scramble CSV column order on write and this crate has no other use for
/// a real `indexmap` dependency.
pub mod indexmap_like {
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct OrderedMap {
        keys: Vec<String>,
        values: std::collections::HashMap<String, String>,
    }

    impl OrderedMap {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
            let key = key.into();
            if !self.values.contains_key(&key) {
                self.keys.push(key.clone());
            }
            self.values.insert(key, value.into());
        }

        pub fn get(&self, key: &str) -> Option<&str> {
            self.values.get(key).map(String::as_str)
        }

        pub fn keys(&self) -> impl Iterator<Item = &str> {
            self.keys.iter().map(String::as_str)
        }

        pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
            self.keys.iter().map(move |k| (k.as_str(), self.values[k].as_str()))
        }
    }
}
