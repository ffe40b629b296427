//! `include=relation[:col,col]` eager-load requests.

use indexmap::IndexSet;
use serde::Serialize;

use crate::tokenizer::split_values;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludeSpec {
    pub relation_path: String,
    /// Requested columns; empty means every column of the relation.
    pub columns: IndexSet<String>,
}

impl IncludeSpec {
    pub fn all_columns(&self) -> bool {
        self.columns.is_empty()
    }
}

pub fn parse_include_values(raw: &str) -> IncludeSpec {
    let (relation, columns) = match raw.split_once(':') {
        Some((relation, columns)) => (relation, split_values(columns)),
        None => (raw, Vec::new()),
    };
    IncludeSpec {
        relation_path: relation.to_string(),
        columns: columns.into_iter().filter(|c| !c.is_empty()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_with_columns() {
        let spec = parse_include_values("posts:title,id,title");
        assert_eq!(spec.relation_path, "posts");
        assert_eq!(
            spec.columns.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["title", "id"]
        );
        assert!(!spec.all_columns());
    }

    #[test]
    fn test_relation_without_columns() {
        let spec = parse_include_values("posts.comments");
        assert_eq!(spec.relation_path, "posts.comments");
        assert!(spec.all_columns());

        assert!(parse_include_values("posts:").all_columns());
    }
}
