//! Plain-text output: a list becomes one item per line, a mapping becomes
//! `key: value` per line.

use super::indexmap_like::OrderedMap;

pub fn write_list(items: &[String]) -> String {
    let mut out = items.join("\n");
    if !items.is_empty() {
        out.push('\n');
    }
    out
}

pub fn write_map(map: &OrderedMap) -> String {
    let mut out = String::new();
    for (key, value) in map.iter() {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_one_item_per_line() {
        let items = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        assert_eq!(write_list(&items), "a\nb\nc\n");
    }

    #[test]
    fn empty_list_is_empty_string() {
        assert_eq!(write_list(&[]), "");
    }

    #[test]
    fn map_is_key_colon_value_per_line() {
        let mut m = OrderedMap::new();
        m.insert("host", "example.com");
        m.insert("port", "80");
        assert_eq!(write_map(&m), "host: example.com\nport: 80\n");
    }
}
