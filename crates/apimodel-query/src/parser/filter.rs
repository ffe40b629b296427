//! Classification of `filter[...]` keys into clause kinds.
//!
//! A key reads `[nest:][boolean:]column:operator`. The last segment selects
//! the clause kind after operator resolution; everything before the column is
//! the nesting/boolean prefix.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::alias::AliasResolver;
use crate::error::ParseError;
use crate::operators::{is_non_basic, resolve_operator};
use crate::schema::RawClauseKind;
use crate::tokenizer::{split_key, split_values};

/// How a clause or group combines with its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    #[default]
    And,
    Or,
}

impl BooleanOp {
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if value.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Part of a temporal column a date clause compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePart {
    Date,
    Time,
    Year,
    Day,
}

impl DatePart {
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "date" => Some(Self::Date),
            "time" => Some(Self::Time),
            "year" => Some(Self::Year),
            "day" => Some(Self::Day),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClauseKind {
    Basic {
        column: String,
        operator: String,
        value: String,
    },
    In {
        column: String,
        values: Vec<String>,
    },
    NotIn {
        column: String,
        values: Vec<String>,
    },
    InRaw {
        column: String,
        values: Vec<String>,
    },
    NotInRaw {
        column: String,
        values: Vec<String>,
    },
    Null {
        column: String,
    },
    NotNull {
        column: String,
    },
    Between {
        column: String,
        values: Vec<String>,
        not: bool,
    },
    DateCompare {
        part: DatePart,
        column: String,
        operator: String,
        value: String,
    },
    Raw {
        sql: String,
    },
    ColumnCompare {
        first: String,
        operator: String,
        second: String,
    },
    Scope {
        name: String,
        args: Vec<String>,
    },
}

impl ClauseKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::In { .. } => "in",
            Self::NotIn { .. } => "not_in",
            Self::InRaw { .. } => "in_raw",
            Self::NotInRaw { .. } => "not_in_raw",
            Self::Null { .. } => "null",
            Self::NotNull { .. } => "not_null",
            Self::Between { not: false, .. } => "between",
            Self::Between { not: true, .. } => "not_between",
            Self::DateCompare { .. } => "date",
            Self::Raw { .. } => "raw",
            Self::ColumnCompare { .. } => "column",
            Self::Scope { .. } => "scope",
        }
    }

    /// Columns the clause reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Basic { column, .. }
            | Self::In { column, .. }
            | Self::NotIn { column, .. }
            | Self::InRaw { column, .. }
            | Self::NotInRaw { column, .. }
            | Self::Null { column }
            | Self::NotNull { column }
            | Self::Between { column, .. }
            | Self::DateCompare { column, .. } => vec![column.as_str()],
            Self::ColumnCompare { first, second, .. } => vec![first.as_str(), second.as_str()],
            Self::Raw { .. } | Self::Scope { .. } => Vec::new(),
        }
    }

    /// Comparison operator, for kinds that carry one.
    pub fn operator(&self) -> Option<&str> {
        match self {
            Self::Basic { operator, .. }
            | Self::DateCompare { operator, .. }
            | Self::ColumnCompare { operator, .. } => Some(operator.as_str()),
            _ => None,
        }
    }

    /// Raw clause permission this kind requires.
    pub fn raw_clause(&self) -> Option<RawClauseKind> {
        match self {
            Self::Raw { .. } => Some(RawClauseKind::WhereRaw),
            Self::InRaw { .. } => Some(RawClauseKind::WhereInRaw),
            Self::NotInRaw { .. } => Some(RawClauseKind::WhereNotInRaw),
            _ => None,
        }
    }
}

/// One parsed filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterClause {
    pub key: String,
    pub nest_index: Option<usize>,
    pub boolean: BooleanOp,
    #[serde(flatten)]
    pub kind: ClauseKind,
}

/// Parse a single `filter[key]=value` pair.
pub fn parse_filter_value(
    aliases: &AliasResolver<'_>,
    key: &str,
    value: &str,
) -> Result<FilterClause, ParseError> {
    let segments = split_key(key);
    let Some((&last, head)) = segments.split_last() else {
        return Err(ParseError::InvalidFilterKey(key.to_string()));
    };
    let keyword = resolve_operator(last);
    let mut args = split_values(value);

    let (kind, prefix) = match keyword.as_str() {
        "scope" => {
            let (name, prefix) = column_and_prefix(key, head)?;
            let kind = ClauseKind::Scope {
                name: aliases.resolve_scope(name),
                args,
            };
            (kind, prefix)
        }
        "in" | "not in" | "in raw" | "not in raw" | "is null" | "is not null" => {
            let (column, prefix) = column_and_prefix(key, head)?;
            let column = aliases.resolve_attribute(column);
            let kind = match keyword.as_str() {
                "in" => ClauseKind::In { column, values: args },
                "not in" => ClauseKind::NotIn { column, values: args },
                "in raw" => ClauseKind::InRaw { column, values: args },
                "not in raw" => ClauseKind::NotInRaw { column, values: args },
                "is null" => ClauseKind::Null { column },
                _ => ClauseKind::NotNull { column },
            };
            (kind, prefix)
        }
        "between" | "not between" => {
            if args.len() != 2 {
                return Err(ParseError::InvalidArity {
                    clause: "between",
                    expected: 2,
                    actual: args.len(),
                });
            }
            let (column, prefix) = column_and_prefix(key, head)?;
            let kind = ClauseKind::Between {
                column: aliases.resolve_attribute(column),
                values: args,
                not: keyword == "not between",
            };
            (kind, prefix)
        }
        "date" | "day" | "year" | "time" => {
            let part = DatePart::parse(&keyword)
                .ok_or_else(|| ParseError::UnsupportedClause(key.to_string()))?;
            let Some((&operator, rest)) = head.split_last() else {
                return Err(ParseError::InvalidFilterKey(key.to_string()));
            };
            let (column, prefix) = column_and_prefix(key, rest)?;
            let kind = ClauseKind::DateCompare {
                part,
                column: aliases.resolve_attribute(column),
                operator: resolve_operator(operator),
                value: args.swap_remove(0),
            };
            (kind, prefix)
        }
        _ => match last.split('-').nth(1) {
            Some("column") => {
                let [first, operator, second]: [String; 3] =
                    args.try_into().map_err(|args: Vec<String>| ParseError::InvalidArity {
                        clause: "column",
                        expected: 3,
                        actual: args.len(),
                    })?;
                let kind = ClauseKind::ColumnCompare {
                    first: aliases.resolve_attribute(&first),
                    operator: resolve_operator(&operator),
                    second: aliases.resolve_attribute(&second),
                };
                (kind, head)
            }
            Some("raw") => (
                ClauseKind::Raw {
                    sql: args.swap_remove(0),
                },
                head,
            ),
            Some(_) => return Err(unsupported(key)),
            None if is_non_basic(&keyword) => return Err(unsupported(key)),
            None => {
                let (column, prefix) = column_and_prefix(key, head)?;
                let kind = ClauseKind::Basic {
                    column: aliases.resolve_attribute(column),
                    operator: keyword.clone(),
                    value: args.swap_remove(0),
                };
                (kind, prefix)
            }
        },
    };

    let (nest_index, boolean) = parse_prefix(key, prefix)?;
    Ok(FilterClause {
        key: key.to_string(),
        nest_index,
        boolean,
        kind,
    })
}

fn unsupported(key: &str) -> ParseError {
    warn!(filter = %key, "unsupported filter clause");
    ParseError::UnsupportedClause(key.to_string())
}

fn column_and_prefix<'k, 's>(
    key: &str,
    head: &'s [&'k str],
) -> Result<(&'k str, &'s [&'k str]), ParseError> {
    match head.split_last() {
        Some((&column, prefix)) if !column.is_empty() => Ok((column, prefix)),
        _ => Err(ParseError::InvalidFilterKey(key.to_string())),
    }
}

fn parse_prefix(key: &str, prefix: &[&str]) -> Result<(Option<usize>, BooleanOp), ParseError> {
    match prefix {
        [] => Ok((None, BooleanOp::And)),
        [single] => match parse_nest_index(single) {
            Some(index) => Ok((Some(index), BooleanOp::And)),
            None => Ok((None, parse_boolean(single)?)),
        },
        [nest, boolean] => {
            let index = parse_nest_index(nest)
                .ok_or_else(|| ParseError::InvalidNestIndex((*nest).to_string()))?;
            Ok((Some(index), parse_boolean(boolean)?))
        }
        _ => Err(ParseError::InvalidFilterKey(key.to_string())),
    }
}

/// Digits-only segment as a nest index.
pub(crate) fn parse_nest_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

pub(crate) fn parse_boolean(segment: &str) -> Result<BooleanOp, ParseError> {
    BooleanOp::parse(segment).ok_or_else(|| ParseError::InvalidBoolean(segment.to_string()))
}
