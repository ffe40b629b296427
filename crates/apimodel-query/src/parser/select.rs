//! Projection and ordering parameters: `sort`, `fields`, `groupBy`, `selectRaw`.

use serde::{Deserialize, Serialize};

use crate::alias::{AliasResolver, FieldSpec};
use crate::tokenizer::split_values;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub resolved_name: String,
    pub direction: SortDirection,
}

/// `-created_at,name` sorts by `created_at` descending, then `name`.
pub fn parse_sort_values(aliases: &AliasResolver<'_>, raw: &str) -> Vec<SortSpec> {
    split_values(raw)
        .iter()
        .map(|token| {
            let name = token.trim_start_matches('-');
            let direction = if name.len() == token.len() {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            };
            SortSpec {
                resolved_name: aliases.resolve_attribute(name),
                direction,
            }
        })
        .collect()
}

pub fn parse_fields_values(aliases: &AliasResolver<'_>, raw: &str) -> Vec<FieldSpec> {
    split_values(raw)
        .iter()
        .map(|token| aliases.resolve_field_with_alias(token))
        .collect()
}

/// Group-by names stay in client vocabulary when they carry an alias.
pub fn parse_group_by_values(aliases: &AliasResolver<'_>, raw: &str) -> Vec<String> {
    parse_fields_values(aliases, raw)
        .into_iter()
        .map(|field| field.client_alias.unwrap_or(field.resolved_name))
        .collect()
}

pub fn parse_select_raw_values(raw: &str) -> Vec<String> {
    split_values(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_sort_values() {
        let sorts = parse_sort_values(&AliasResolver::empty(), "-a,b");
        assert_eq!(
            sorts,
            vec![
                SortSpec {
                    resolved_name: "a".into(),
                    direction: SortDirection::Desc,
                },
                SortSpec {
                    resolved_name: "b".into(),
                    direction: SortDirection::Asc,
                },
            ]
        );
    }

    #[test]
    fn test_sort_resolves_aliases() {
        let attributes = BTreeMap::from([("created".to_string(), "created_at".to_string())]);
        let scopes = BTreeMap::new();
        let aliases = AliasResolver::new(&attributes, &scopes);
        let sorts = parse_sort_values(&aliases, "-created");
        assert_eq!(sorts[0].resolved_name, "created_at");
        assert_eq!(sorts[0].direction, SortDirection::Desc);
    }

    #[test]
    fn test_fields_with_aliases() {
        let fields = parse_fields_values(&AliasResolver::empty(), "id as account,email");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].resolved_name, "id");
        assert_eq!(fields[0].client_alias.as_deref(), Some("account"));
        assert_eq!(fields[1].client_alias, None);
    }

    #[test]
    fn test_group_by_prefers_alias() {
        let groups = parse_group_by_values(&AliasResolver::empty(), "status as state,country");
        assert_eq!(groups, vec!["state", "country"]);
    }

    #[test]
    fn test_empty_inputs_yield_single_empty_token() {
        let empty = AliasResolver::empty();
        assert_eq!(parse_sort_values(&empty, "").len(), 1);
        assert_eq!(parse_fields_values(&empty, "")[0].resolved_name, "");
        assert_eq!(parse_group_by_values(&empty, ""), vec![""]);
        assert_eq!(parse_select_raw_values(""), vec![""]);
    }
}
