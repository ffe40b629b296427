//! Decoders for the compact query language.
//!
//! Each request parameter has its own parser producing an intermediate
//! representation; [`QueryParser::format`] runs all of them over a
//! [`RawQuery`] and yields the [`ParsedQuery`] handed to the builder.

pub mod filter;
pub mod include;
pub mod nested;
pub mod query_type;
pub mod select;

use indexmap::IndexMap;
use serde::Serialize;

pub use filter::{BooleanOp, ClauseKind, DatePart, FilterClause};
pub use include::IncludeSpec;
pub use nested::{NestGroup, NestMethod};
pub use query_type::{QueryMethod, QueryTypeSpec};
pub use select::{SortDirection, SortSpec};

use crate::alias::{AliasResolver, FieldSpec};
use crate::error::ParseError;
use crate::request::{Param, RawQuery};

/// Every parameter of one request, decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    pub filters: Vec<FilterClause>,
    pub nests: Vec<NestGroup>,
    pub sort: Vec<SortSpec>,
    pub fields: Vec<FieldSpec>,
    pub includes: Vec<IncludeSpec>,
    pub select_raw: Vec<String>,
    pub group_by: Vec<String>,
    pub query_type: QueryTypeSpec,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Default for ParsedQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            nests: vec![NestGroup::root()],
            sort: Vec::new(),
            fields: Vec::new(),
            includes: Vec::new(),
            select_raw: Vec::new(),
            group_by: Vec::new(),
            query_type: QueryTypeSpec::default(),
            page: None,
            per_page: None,
            limit: None,
            offset: None,
        }
    }
}

/// Parameter parsers bound to one resource's alias tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParser<'a> {
    aliases: AliasResolver<'a>,
}

impl<'a> QueryParser<'a> {
    pub fn new(aliases: AliasResolver<'a>) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasResolver<'a> {
        &self.aliases
    }

    pub fn parse_filter_value(&self, key: &str, value: &str) -> Result<FilterClause, ParseError> {
        filter::parse_filter_value(&self.aliases, key, value)
    }

    pub fn parse_filter_values(
        &self,
        filters: &IndexMap<String, String>,
    ) -> Result<Vec<FilterClause>, ParseError> {
        filters
            .iter()
            .map(|(key, value)| self.parse_filter_value(key, value))
            .collect()
    }

    /// Nest groups of a request; a missing legend is the single root group.
    pub fn parse_nested_values(&self, raw: Option<&str>) -> Result<Vec<NestGroup>, ParseError> {
        match raw {
            Some(raw) => nested::parse_nested_values(raw),
            None => Ok(vec![NestGroup::root()]),
        }
    }

    pub fn parse_sort_values(&self, raw: &str) -> Vec<SortSpec> {
        select::parse_sort_values(&self.aliases, raw)
    }

    pub fn parse_fields_values(&self, raw: &str) -> Vec<FieldSpec> {
        select::parse_fields_values(&self.aliases, raw)
    }

    pub fn parse_group_by_values(&self, raw: &str) -> Vec<String> {
        select::parse_group_by_values(&self.aliases, raw)
    }

    pub fn parse_select_raw_values(&self, raw: &str) -> Vec<String> {
        select::parse_select_raw_values(raw)
    }

    pub fn parse_include_values(&self, raw: &str) -> IncludeSpec {
        include::parse_include_values(raw)
    }

    pub fn parse_query_type_values(&self, raw: &str) -> QueryTypeSpec {
        query_type::parse_query_type_values(&self.aliases, raw)
    }

    /// Parse a pagination parameter.
    pub fn parse_integer(param: Param, raw: &str) -> Result<u64, ParseError> {
        raw.parse().map_err(|_| ParseError::NotAnInteger {
            param: param.name().to_string(),
            value: raw.to_string(),
        })
    }

    /// Decode every parameter of a request.
    pub fn format(&self, raw: &RawQuery) -> Result<ParsedQuery, ParseError> {
        if let Some(unknown) = raw.unknown.first() {
            return Err(ParseError::UnknownParameter(unknown.clone()));
        }

        let integer = |param: Param| -> Result<Option<u64>, ParseError> {
            raw.value(param)
                .map(|value| Self::parse_integer(param, value))
                .transpose()
        };

        Ok(ParsedQuery {
            filters: self.parse_filter_values(&raw.filter)?,
            nests: self.parse_nested_values(raw.nested.as_deref())?,
            sort: raw
                .sort
                .as_deref()
                .map(|value| self.parse_sort_values(value))
                .unwrap_or_default(),
            fields: raw
                .fields
                .as_deref()
                .map(|value| self.parse_fields_values(value))
                .unwrap_or_default(),
            includes: raw
                .include
                .iter()
                .map(|value| self.parse_include_values(value))
                .collect(),
            select_raw: raw
                .select_raw
                .as_deref()
                .map(|value| self.parse_select_raw_values(value))
                .unwrap_or_default(),
            group_by: raw
                .group_by
                .as_deref()
                .map(|value| self.parse_group_by_values(value))
                .unwrap_or_default(),
            query_type: raw
                .query_type
                .as_deref()
                .map(|value| self.parse_query_type_values(value))
                .unwrap_or_default(),
            page: integer(Param::Page)?,
            per_page: integer(Param::PerPage)?,
            limit: integer(Param::Limit)?,
            offset: integer(Param::Offset)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_defaults() {
        let parsed = QueryParser::default().format(&RawQuery::default()).unwrap();
        assert_eq!(parsed, ParsedQuery::default());
        assert_eq!(parsed.nests, vec![NestGroup::root()]);
        assert_eq!(parsed.query_type.method, "get");
    }

    #[test]
    fn test_format_full_request() {
        let raw = RawQuery::parse(
            "filter[0:age:gte]=18&nested=and,0:or&sort=-created_at&fields=id,name\
             &include=posts:title&queryType=count&page=2&per_page=15",
        );
        let parsed = QueryParser::default().format(&raw).unwrap();
        assert_eq!(parsed.filters.len(), 1);
        assert_eq!(parsed.nests.len(), 2);
        assert_eq!(parsed.sort[0].direction, SortDirection::Desc);
        assert_eq!(parsed.fields.len(), 2);
        assert_eq!(parsed.includes[0].relation_path, "posts");
        assert_eq!(parsed.query_type.method, "count");
        assert_eq!(parsed.page, Some(2));
        assert_eq!(parsed.per_page, Some(15));
    }

    #[test]
    fn test_format_rejects_bad_integers() {
        let raw = RawQuery::parse("limit=ten");
        assert_eq!(
            QueryParser::default().format(&raw),
            Err(ParseError::NotAnInteger {
                param: "limit".into(),
                value: "ten".into(),
            })
        );
        let negative = RawQuery::parse("offset=-1");
        assert!(QueryParser::default().format(&negative).is_err());
    }

    #[test]
    fn test_format_rejects_unknown_parameters() {
        let raw = RawQuery::parse("colour=red");
        assert_eq!(
            QueryParser::default().format(&raw),
            Err(ParseError::UnknownParameter("colour".into()))
        );
    }
}
