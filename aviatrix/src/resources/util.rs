//! State and config accessors shared by the resources.
//!
//! Optional attributes come back as errors from the typed getters when null;
//! these fold that into the domain default.

use tfplug::types::{AttributePath, Dynamic, DynamicValue};

pub fn string_or_default(value: &DynamicValue, attr: &str) -> String {
    value.get_string(&AttributePath::new(attr)).unwrap_or_default()
}

pub fn bool_or(value: &DynamicValue, attr: &str, default: bool) -> bool {
    value.get_bool(&AttributePath::new(attr)).unwrap_or(default)
}

pub fn number_or(value: &DynamicValue, attr: &str, default: i64) -> i64 {
    value
        .get_number(&AttributePath::new(attr))
        .map(|n| n as i64)
        .unwrap_or(default)
}

pub fn string_list(value: &DynamicValue, attr: &str) -> Vec<String> {
    value
        .get_list(&AttributePath::new(attr))
        .map(|items| {
            items
                .into_iter()
                .filter_map(|item| match item {
                    Dynamic::String(s) => Some(s),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attributes_fall_back_to_defaults() {
        let value = DynamicValue::empty_object();
        assert_eq!(string_or_default(&value, "name"), "");
        assert!(!bool_or(&value, "enabled", false));
        assert!(bool_or(&value, "enabled", true));
        assert_eq!(number_or(&value, "count", 50), 50);
        assert!(string_list(&value, "items").is_empty());
    }

    #[test]
    fn string_list_skips_non_string_entries() {
        let mut value = DynamicValue::empty_object();
        value
            .set_list(
                &AttributePath::new("items"),
                vec![
                    Dynamic::String("a".to_string()),
                    Dynamic::Number(1.0),
                    Dynamic::String("b".to_string()),
                ],
            )
            .unwrap();
        assert_eq!(
            string_list(&value, "items"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
