//! Attribute name to field accessor name conventions.
//!
//! Fields are matched through their upper camel case accessor names, see
//! [`proto_types::to_accessor_name`]. The two directions derive the lookup
//! key from an attribute name differently.

use proto_types::to_accessor_name;

/// Upper-case the first character and keep the rest as is.
pub fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lookup key used by sinks: `stringValue` -> `StringValue`.
pub fn sink_accessor_key(attribute: &str) -> String {
    capitalize_first(attribute)
}

/// Lookup key used by sources: separators are dropped and every word
/// capitalized, so `string_value` and `stringValue` both give `StringValue`.
pub fn source_accessor_key(attribute: &str) -> String {
    to_accessor_name(attribute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_key_only_touches_first_letter() {
        assert_eq!(sink_accessor_key("stringValue"), "StringValue");
        assert_eq!(sink_accessor_key("string_value"), "String_value");
        assert_eq!(sink_accessor_key(""), "");
    }

    #[test]
    fn test_source_key_strips_separators() {
        assert_eq!(source_accessor_key("string_value"), "StringValue");
        assert_eq!(source_accessor_key("stringValue"), "StringValue");
        assert_eq!(source_accessor_key("int_list_2"), "IntList2");
    }
}
