//! `queryType`: which terminal method runs the query.

use serde::Serialize;

use crate::alias::AliasResolver;
use crate::error::BuildError;
use crate::tokenizer::split_values;

/// The method name and arguments as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryTypeSpec {
    pub method: String,
    pub args: Vec<String>,
}

impl Default for QueryTypeSpec {
    fn default() -> Self {
        Self {
            method: "get".to_string(),
            args: Vec::new(),
        }
    }
}

/// Accepts both `avg:price` and `avg,price`. Arguments are alias-resolved.
pub fn parse_query_type_values(aliases: &AliasResolver<'_>, raw: &str) -> QueryTypeSpec {
    let (method, args) = match raw.split_once(':') {
        Some((method, rest)) => (method.to_string(), split_values(rest)),
        None => {
            let mut tokens = split_values(raw);
            let method = tokens.remove(0);
            (method, tokens)
        }
    };
    QueryTypeSpec {
        method,
        args: args
            .iter()
            .filter(|arg| !arg.is_empty())
            .map(|arg| aliases.resolve_attribute(arg))
            .collect(),
    }
}

/// Terminal methods the builder knows how to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", content = "column", rename_all = "snake_case")]
pub enum QueryMethod {
    Get,
    Exists,
    Count(Option<String>),
    Avg(String),
    Sum(String),
    Min(String),
    Max(String),
    Delete,
}

impl QueryMethod {
    pub const NAMES: [&'static str; 8] =
        ["get", "exists", "count", "avg", "sum", "min", "max", "delete"];

    pub fn from_spec(spec: &QueryTypeSpec) -> Result<Self, BuildError> {
        let args = spec.args.as_slice();
        let method = match spec.method.as_str() {
            "get" => no_args(spec).map(|()| Self::Get)?,
            "exists" => no_args(spec).map(|()| Self::Exists)?,
            "delete" => no_args(spec).map(|()| Self::Delete)?,
            "count" => match args {
                [] => Self::Count(None),
                [column] => Self::Count(Some(column.clone())),
                _ => return Err(arity(spec, "0 or 1")),
            },
            "avg" | "sum" | "min" | "max" => {
                let [column] = args else {
                    return Err(arity(spec, "1"));
                };
                let column = column.clone();
                match spec.method.as_str() {
                    "avg" => Self::Avg(column),
                    "sum" => Self::Sum(column),
                    "min" => Self::Min(column),
                    _ => Self::Max(column),
                }
            }
            other => return Err(BuildError::UnsupportedMethod(other.to_string())),
        };
        Ok(method)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Exists => "exists",
            Self::Count(_) => "count",
            Self::Avg(_) => "avg",
            Self::Sum(_) => "sum",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Delete => "delete",
        }
    }

    /// Aggregates return a single scalar.
    pub fn is_aggregate(&self) -> bool {
        !matches!(self, Self::Get | Self::Exists | Self::Delete)
    }
}

fn no_args(spec: &QueryTypeSpec) -> Result<(), BuildError> {
    if spec.args.is_empty() {
        Ok(())
    } else {
        Err(arity(spec, "0"))
    }
}

fn arity(spec: &QueryTypeSpec, expected: &'static str) -> BuildError {
    BuildError::InvalidMethodArity {
        method: spec.method.clone(),
        expected,
        actual: spec.args.len(),
    }
}
