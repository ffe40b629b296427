//! Splitting of compact, URL-safe parameter values.
//!
//! Values never get trimmed or unescaped here; that already happened during
//! form decoding. An empty input always yields a single empty token.

/// Separator between values (`1,2,3`).
pub const VALUE_SEPARATOR: char = ',';

/// Separator between key segments (`0:and:age:gte`).
pub const KEY_SEPARATOR: char = ':';

/// Split a raw value on commas.
pub fn split_values(raw: &str) -> Vec<String> {
    raw.split(VALUE_SEPARATOR).map(str::to_string).collect()
}

/// Split a filter key or nesting segment on colons.
pub fn split_key(raw: &str) -> Vec<&str> {
    raw.split(KEY_SEPARATOR).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_values() {
        assert_eq!(split_values("1,2,3"), vec!["1", "2", "3"]);
        assert_eq!(split_values("single"), vec!["single"]);
    }

    #[test]
    fn test_empty_input_yields_single_empty_token() {
        assert_eq!(split_values(""), vec![""]);
        assert_eq!(split_key(""), vec![""]);
    }

    #[test]
    fn test_no_trimming() {
        assert_eq!(split_values(" a , b"), vec![" a ", " b"]);
        assert_eq!(split_values("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("0:or:age:gte"), vec!["0", "or", "age", "gte"]);
    }
}
