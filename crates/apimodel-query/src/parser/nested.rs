//! The `nested` legend: an ordered list of boolean groups.
//!
//! Each comma-separated segment reads `[parent:]boolean[:method]`; the
//! segment's position is the index filter keys refer to.

use serde::{Deserialize, Serialize};

use super::filter::{BooleanOp, parse_boolean, parse_nest_index};
use crate::error::ParseError;
use crate::tokenizer::{split_key, split_values};

/// Sub-query wrapping applied to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestMethod {
    Exists,
    NotExists,
}

impl NestMethod {
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "e" => Some(Self::Exists),
            "ne" => Some(Self::NotExists),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Exists => "e",
            Self::NotExists => "ne",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestGroup {
    pub parent: Option<usize>,
    pub boolean: BooleanOp,
    pub method: Option<NestMethod>,
}

impl NestGroup {
    /// The implicit group used when a request has no `nested` parameter.
    pub fn root() -> Self {
        Self {
            parent: None,
            boolean: BooleanOp::And,
            method: None,
        }
    }
}

/// Parse the whole legend.
pub fn parse_nested_values(raw: &str) -> Result<Vec<NestGroup>, ParseError> {
    split_values(raw)
        .iter()
        .map(|segment| parse_nested_segment(segment))
        .collect()
}

/// Parse one `[parent:]boolean[:method]` segment.
pub fn parse_nested_segment(segment: &str) -> Result<NestGroup, ParseError> {
    let parts = split_key(segment);
    match parts.as_slice() {
        [boolean] => Ok(NestGroup {
            parent: None,
            boolean: parse_boolean(boolean)?,
            method: None,
        }),
        [first, second] => match parse_nest_index(first) {
            Some(parent) => Ok(NestGroup {
                parent: Some(parent),
                boolean: parse_boolean(second)?,
                method: None,
            }),
            None => Ok(NestGroup {
                parent: None,
                boolean: parse_boolean(first)?,
                method: Some(parse_method(second)?),
            }),
        },
        [parent, boolean, method] => Ok(NestGroup {
            parent: Some(
                parse_nest_index(parent)
                    .ok_or_else(|| ParseError::InvalidNestIndex((*parent).to_string()))?,
            ),
            boolean: parse_boolean(boolean)?,
            method: Some(parse_method(method)?),
        }),
        _ => Err(ParseError::InvalidNestSegment(segment.to_string())),
    }
}

fn parse_method(code: &str) -> Result<NestMethod, ParseError> {
    NestMethod::parse(code).ok_or_else(|| ParseError::InvalidNestMethod(code.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_legend() {
        let groups = parse_nested_values("and,0:and:e,1:or,or:ne").unwrap();
        assert_eq!(
            groups,
            vec![
                NestGroup::root(),
                NestGroup {
                    parent: Some(0),
                    boolean: BooleanOp::And,
                    method: Some(NestMethod::Exists),
                },
                NestGroup {
                    parent: Some(1),
                    boolean: BooleanOp::Or,
                    method: None,
                },
                NestGroup {
                    parent: None,
                    boolean: BooleanOp::Or,
                    method: Some(NestMethod::NotExists),
                },
            ]
        );
    }

    #[test]
    fn test_invalid_segments() {
        assert_eq!(
            parse_nested_segment("xor"),
            Err(ParseError::InvalidBoolean("xor".into()))
        );
        assert_eq!(
            parse_nested_segment("and:exists"),
            Err(ParseError::InvalidNestMethod("exists".into()))
        );
        assert_eq!(
            parse_nested_segment("a:and:e"),
            Err(ParseError::InvalidNestIndex("a".into()))
        );
        assert_eq!(
            parse_nested_segment("0:and:e:x"),
            Err(ParseError::InvalidNestSegment("0:and:e:x".into()))
        );
    }

    #[test]
    fn test_empty_legend_is_rejected() {
        assert_eq!(
            parse_nested_values(""),
            Err(ParseError::InvalidBoolean(String::new()))
        );
    }

    #[test]
    fn test_method_codes() {
        assert_eq!(NestMethod::parse(NestMethod::Exists.code()), Some(NestMethod::Exists));
        assert_eq!(
            NestMethod::parse(NestMethod::NotExists.code()),
            Some(NestMethod::NotExists)
        );
    }
}
