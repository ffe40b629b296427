//! Decoding of `application/x-www-form-urlencoded` query strings.
//!
//! Bracketed `filter[key]=value` pairs are collected in request order,
//! `include` may repeat (`include=a&include[]=b`), every other parameter is
//! single-valued and the first occurrence wins.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use url::form_urlencoded;

/// Request parameters understood by the query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Param {
    #[serde(rename = "filter")]
    Filter,
    #[serde(rename = "sort")]
    Sort,
    #[serde(rename = "nested")]
    Nested,
    #[serde(rename = "queryType")]
    QueryType,
    #[serde(rename = "fields")]
    Fields,
    #[serde(rename = "include")]
    Include,
    #[serde(rename = "selectRaw")]
    SelectRaw,
    #[serde(rename = "groupBy")]
    GroupBy,
    #[serde(rename = "page")]
    Page,
    #[serde(rename = "per_page")]
    PerPage,
    #[serde(rename = "limit")]
    Limit,
    #[serde(rename = "offset")]
    Offset,
}

impl Param {
    pub const ALL: [Param; 12] = [
        Param::Filter,
        Param::Sort,
        Param::Nested,
        Param::QueryType,
        Param::Fields,
        Param::Include,
        Param::SelectRaw,
        Param::GroupBy,
        Param::Page,
        Param::PerPage,
        Param::Limit,
        Param::Offset,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Param::Filter => "filter",
            Param::Sort => "sort",
            Param::Nested => "nested",
            Param::QueryType => "queryType",
            Param::Fields => "fields",
            Param::Include => "include",
            Param::SelectRaw => "selectRaw",
            Param::GroupBy => "groupBy",
            Param::Page => "page",
            Param::PerPage => "per_page",
            Param::Limit => "limit",
            Param::Offset => "offset",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|param| param.name() == name)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The raw, still-encoded query language parameters of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    pub filter: IndexMap<String, String>,
    pub include: Vec<String>,
    pub sort: Option<String>,
    pub nested: Option<String>,
    pub query_type: Option<String>,
    pub fields: Option<String>,
    pub select_raw: Option<String>,
    pub group_by: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    /// Parameter names the query language does not know, in request order.
    pub unknown: Vec<String>,
}

impl RawQuery {
    /// Decode a query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut raw = Self::default();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            raw.push(&name, value.into_owned());
        }
        raw
    }

    /// Add one decoded `name=value` pair.
    pub fn push(&mut self, name: &str, value: String) {
        if let Some(key) = name
            .strip_prefix("filter[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            self.filter.entry(key.to_string()).or_insert(value);
            return;
        }
        if name == "include" || name == "include[]" {
            self.include.push(value);
            return;
        }

        let slot = match Param::from_name(name) {
            Some(Param::Sort) => &mut self.sort,
            Some(Param::Nested) => &mut self.nested,
            Some(Param::QueryType) => &mut self.query_type,
            Some(Param::Fields) => &mut self.fields,
            Some(Param::SelectRaw) => &mut self.select_raw,
            Some(Param::GroupBy) => &mut self.group_by,
            Some(Param::Page) => &mut self.page,
            Some(Param::PerPage) => &mut self.per_page,
            Some(Param::Limit) => &mut self.limit,
            Some(Param::Offset) => &mut self.offset,
            Some(Param::Filter) | Some(Param::Include) | None => {
                if !self.unknown.iter().any(|known| known == name) {
                    self.unknown.push(name.to_string());
                }
                return;
            }
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// Builder-style `push`, handy in tests.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.push(name, value.into());
        self
    }

    /// Single-valued parameter by name.
    pub fn value(&self, param: Param) -> Option<&str> {
        match param {
            Param::Sort => self.sort.as_deref(),
            Param::Nested => self.nested.as_deref(),
            Param::QueryType => self.query_type.as_deref(),
            Param::Fields => self.fields.as_deref(),
            Param::SelectRaw => self.select_raw.as_deref(),
            Param::GroupBy => self.group_by.as_deref(),
            Param::Page => self.page.as_deref(),
            Param::PerPage => self.per_page.as_deref(),
            Param::Limit => self.limit.as_deref(),
            Param::Offset => self.offset.as_deref(),
            Param::Filter | Param::Include => None,
        }
    }

    pub fn is_present(&self, param: Param) -> bool {
        match param {
            Param::Filter => !self.filter.is_empty(),
            Param::Include => !self.include.is_empty(),
            other => self.value(other).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_query() {
        let raw = RawQuery::parse(
            "filter%5B0%3Aage%3Agte%5D=18&sort=-created_at&fields=id,name&include=posts:title",
        );
        assert_eq!(raw.filter.get("0:age:gte").map(String::as_str), Some("18"));
        assert_eq!(raw.sort.as_deref(), Some("-created_at"));
        assert_eq!(raw.fields.as_deref(), Some("id,name"));
        assert_eq!(raw.include, vec!["posts:title"]);
        assert!(raw.unknown.is_empty());
    }

    #[test]
    fn test_unencoded_brackets() {
        let raw = RawQuery::parse("?filter[0:or:name:e]=ann&filter[age:lt]=30");
        let keys: Vec<_> = raw.filter.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["0:or:name:e", "age:lt"]);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let raw = RawQuery::parse("limit=5&limit=10&filter[id:e]=1&filter[id:e]=2");
        assert_eq!(raw.limit.as_deref(), Some("5"));
        assert_eq!(raw.filter.get("id:e").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_include_is_repeatable() {
        let raw = RawQuery::parse("include=posts&include[]=comments:id");
        assert_eq!(raw.include, vec!["posts", "comments:id"]);
        assert!(raw.is_present(Param::Include));
    }

    #[test]
    fn test_unknown_parameters_are_tracked() {
        let raw = RawQuery::parse("foo=1&filter=2&foo=3&per_page=20");
        assert_eq!(raw.unknown, vec!["foo", "filter"]);
        assert_eq!(raw.per_page.as_deref(), Some("20"));
    }

    #[test]
    fn test_plus_decodes_to_space() {
        let raw = RawQuery::parse("fields=id+as+account");
        assert_eq!(raw.fields.as_deref(), Some("id as account"));
    }

    #[test]
    fn test_param_names_round_trip() {
        for param in Param::ALL {
            assert_eq!(Param::from_name(param.name()), Some(param));
        }
        assert_eq!(Param::from_name("query_type"), None);
    }
}
