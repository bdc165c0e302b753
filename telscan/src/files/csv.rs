//! Hand-rolled RFC 4180 subset: comma-separated fields, double-quote
//! escaping (`""` inside a quoted field is a literal quote), header row
//! required. No repo in the corpus depends on the `csv` crate, and the
//! format is small enough that a hand-rolled reader carries no
//! disproportionate correctness risk.

use super::indexmap_like::OrderedMap;
use super::FileError;

/// Parse `text` as CSV with a header row. Every row becomes a record keyed
/// by the header; short rows leave trailing columns unset.
pub fn read(text: &str) -> Result<Vec<OrderedMap>, FileError> {
    let mut lines = split_records(text).into_iter();
    let header = match lines.next() {
        Some(row) => row,
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for (i, row) in lines.enumerate() {
        if row.len() == 1 && row[0].is_empty() {
            continue; // trailing blank line
        }
        let mut record = OrderedMap::new();
        for (col, key) in header.iter().enumerate() {
            if let Some(value) = row.get(col) {
                record.insert(key.clone(), value.clone());
            }
        }
        if row.len() > header.len() {
            return Err(FileError::Csv {
                line: i + 2,
                message: format!("row has {} fields, header has {}", row.len(), header.len()),
            });
        }
        records.push(record);
    }
    Ok(records)
}

/// Render `records` as CSV using the union of keys (in first-seen order) as
/// the header.
pub fn write(records: &[OrderedMap]) -> String {
    let mut header: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !header.iter().any(|h| h == key) {
                header.push(key.to_owned());
            }
        }
    }

    let mut out = String::new();
    out.push_str(&header.iter().map(|h| quote(h)).collect::<Vec<_>>().join(","));
    out.push_str("\r\n");

    for record in records {
        let row: Vec<String> = header.iter().map(|h| quote(record.get(h).unwrap_or(""))).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

fn quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

/// Split `text` into rows of fields, honoring quoted fields that may span
/// embedded commas, double-quotes, and newlines.
fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => {
                    row.push(std::mem::take(&mut field));
                }
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                other => field.push(other),
            }
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}
