//! PostgreSQL rendering of prepared queries.
//!
//! [`SqlRenderer`] turns a [`PreparedQuery`] into one parameterized
//! statement. Every client value travels as a `$n` bind parameter; only
//! identifiers (validated and quoted), integers of `in raw` clauses and raw
//! clauses the resource explicitly allows are inlined.
//!
//! ## Features
//!
//! - **Terminal methods**: `SELECT`, `SELECT EXISTS`, aggregates, `DELETE`
//! - **Nested groups**: parenthesized groups and `EXISTS` sub-queries
//! - **Date parts**: casts for date/time, `EXTRACT` for year/day

use std::fmt;

use thiserror::Error;

use crate::builder::{Condition, PreparedQuery, SelectColumn, WhereNode};
use crate::parser::{DatePart, NestMethod, QueryMethod};

/// Maximum number of conditions allowed in one query.
pub const MAX_CONDITIONS: usize = 100;

/// Errors that can occur during SQL rendering.
#[derive(Debug, Error)]
pub enum SqlBuilderError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Feature not implemented: {0}")]
    NotImplemented(String),

    #[error("Query too complex: {0}")]
    QueryTooComplex(String),
}

/// Validate an identifier segment.
///
/// Only allows alphanumeric characters and underscores.
fn validate_identifier(name: &str) -> Result<(), SqlBuilderError> {
    if name.is_empty() {
        return Err(SqlBuilderError::InvalidIdentifier(
            "Empty identifier".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqlBuilderError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Escape a PostgreSQL identifier (table name, column name).
pub fn escape_identifier(name: &str) -> Result<String, SqlBuilderError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Quote a possibly table-qualified column; `*` and `table.*` are allowed.
pub fn escape_column(column: &str) -> Result<String, SqlBuilderError> {
    if column == "*" {
        return Ok("*".to_string());
    }
    let mut quoted = Vec::new();
    let mut segments = column.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segment == "*" && segments.peek().is_none() && !quoted.is_empty() {
            quoted.push("*".to_string());
        } else {
            quoted.push(escape_identifier(segment)?);
        }
    }
    if quoted.len() > 3 {
        return Err(SqlBuilderError::InvalidIdentifier(column.to_string()));
    }
    Ok(quoted.join("."))
}

/// Whether `name` renders as a single quoted identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    validate_identifier(name).is_ok()
}

/// Whether `column` renders as a column reference, `table.*` included.
pub fn is_valid_column(column: &str) -> bool {
    escape_column(column).is_ok()
}

/// A rendered statement with its bind parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

#[derive(Default)]
struct Binds {
    params: Vec<String>,
}

impl Binds {
    fn push(&mut self, value: &str) -> String {
        self.params.push(value.to_string());
        format!("${}", self.params.len())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SqlRenderer {
    schema: Option<String>,
}

impl SqlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Qualify the base table with a PostgreSQL schema.
    pub fn with_schema(schema: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
        }
    }

    pub fn render(&self, query: &PreparedQuery) -> Result<BuiltQuery, SqlBuilderError> {
        let conditions = query.conditions().len();
        if conditions > MAX_CONDITIONS {
            return Err(SqlBuilderError::QueryTooComplex(format!(
                "Too many conditions: {conditions} (max {MAX_CONDITIONS})"
            )));
        }

        let mut binds = Binds::default();
        let table = self.table(&query.table)?;
        let where_sql = render_nodes(&query.wheres, &mut binds)?;

        let mut sql = match &query.method {
            QueryMethod::Delete => format!("DELETE FROM {table}"),
            QueryMethod::Exists => format!("SELECT EXISTS (SELECT * FROM {table}"),
            QueryMethod::Get => format!("SELECT {} FROM {table}", projection(query)?),
            aggregate => format!(
                "SELECT {} AS \"aggregate\" FROM {table}",
                aggregate_sql(aggregate)?
            ),
        };

        if let Some(where_sql) = where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        if query.method == QueryMethod::Exists {
            sql.push_str(") AS \"exists\"");
            return Ok(BuiltQuery {
                sql,
                params: binds.params,
            });
        }

        if !query.group_by.is_empty() && query.method != QueryMethod::Delete {
            let columns = query
                .group_by
                .iter()
                .map(|column| escape_column(column))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }

        if query.method == QueryMethod::Get {
            if !query.orders.is_empty() {
                let orders = query
                    .orders
                    .iter()
                    .map(|order| {
                        Ok(format!(
                            "{} {}",
                            escape_column(&order.column)?,
                            order.direction.as_sql()
                        ))
                    })
                    .collect::<Result<Vec<_>, SqlBuilderError>>()?;
                sql.push_str(" ORDER BY ");
                sql.push_str(&orders.join(", "));
            }
            if let Some(limit) = query.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            if let Some(offset) = query.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        Ok(BuiltQuery {
            sql,
            params: binds.params,
        })
    }

    fn table(&self, table: &str) -> Result<String, SqlBuilderError> {
        match &self.schema {
            Some(schema) => Ok(format!(
                "{}.{}",
                escape_identifier(schema)?,
                escape_identifier(table)?
            )),
            None => escape_identifier(table),
        }
    }
}

fn projection(query: &PreparedQuery) -> Result<String, SqlBuilderError> {
    let mut columns = query
        .select
        .iter()
        .map(select_column)
        .collect::<Result<Vec<_>, _>>()?;
    columns.extend(query.select_raw.iter().cloned());
    if columns.is_empty() {
        return Ok("*".to_string());
    }
    Ok(columns.join(", "))
}

fn select_column(select: &SelectColumn) -> Result<String, SqlBuilderError> {
    let column = escape_column(&select.column)?;
    match &select.alias {
        Some(alias) => Ok(format!("{column} AS {}", escape_identifier(alias)?)),
        None => Ok(column),
    }
}

fn aggregate_sql(method: &QueryMethod) -> Result<String, SqlBuilderError> {
    let (function, column) = match method {
        QueryMethod::Count(None) => return Ok("COUNT(*)".to_string()),
        QueryMethod::Count(Some(column)) => ("COUNT", column),
        QueryMethod::Avg(column) => ("AVG", column),
        QueryMethod::Sum(column) => ("SUM", column),
        QueryMethod::Min(column) => ("MIN", column),
        QueryMethod::Max(column) => ("MAX", column),
        other => {
            return Err(SqlBuilderError::NotImplemented(format!(
                "aggregate for {}",
                other.name()
            )));
        }
    };
    Ok(format!("{function}({})", escape_column(column)?))
}

fn render_nodes(nodes: &[WhereNode], binds: &mut Binds) -> Result<Option<String>, SqlBuilderError> {
    let mut sql = String::new();
    for (position, node) in nodes.iter().enumerate() {
        if position > 0 {
            sql.push(' ');
            sql.push_str(node.boolean().as_sql());
            sql.push(' ');
        }
        sql.push_str(&render_node(node, binds)?);
    }
    Ok((!sql.is_empty()).then_some(sql))
}

fn render_node(node: &WhereNode, binds: &mut Binds) -> Result<String, SqlBuilderError> {
    match node {
        WhereNode::Condition { condition, .. } => render_condition(condition, binds),
        WhereNode::Group {
            method,
            subquery_table,
            children,
            ..
        } => {
            let inner = render_nodes(children, binds)?.unwrap_or_else(|| "TRUE".to_string());
            match (method, subquery_table) {
                (Some(method), Some(table)) => {
                    let keyword = match method {
                        NestMethod::Exists => "EXISTS",
                        NestMethod::NotExists => "NOT EXISTS",
                    };
                    Ok(format!(
                        "{keyword} (SELECT 1 FROM {} WHERE {inner})",
                        escape_identifier(table)?
                    ))
                }
                (Some(_), None) => Err(SqlBuilderError::NotImplemented(
                    "exists group without a related table".to_string(),
                )),
                (None, _) => Ok(format!("({inner})")),
            }
        }
    }
}

fn render_condition(condition: &Condition, binds: &mut Binds) -> Result<String, SqlBuilderError> {
    let sql = match condition {
        Condition::Basic {
            column,
            operator,
            value,
        } => format!("{} {} {}", escape_column(column)?, operator.as_sql(), binds.push(value)),
        Condition::In { column, values, not } => {
            if values.is_empty() {
                return Ok(if *not { "TRUE" } else { "FALSE" }.to_string());
            }
            let placeholders: Vec<String> = values.iter().map(|value| binds.push(value)).collect();
            format!(
                "{} {}IN ({})",
                escape_column(column)?,
                if *not { "NOT " } else { "" },
                placeholders.join(", ")
            )
        }
        Condition::InRaw { column, values, not } => {
            if values.is_empty() {
                return Ok(if *not { "TRUE" } else { "FALSE" }.to_string());
            }
            let inlined: Vec<String> = values.iter().map(i64::to_string).collect();
            format!(
                "{} {}IN ({})",
                escape_column(column)?,
                if *not { "NOT " } else { "" },
                inlined.join(", ")
            )
        }
        Condition::Null { column, not } => format!(
            "{} IS {}NULL",
            escape_column(column)?,
            if *not { "NOT " } else { "" }
        ),
        Condition::Between {
            column,
            low,
            high,
            not,
        } => format!(
            "{} {}BETWEEN {} AND {}",
            escape_column(column)?,
            if *not { "NOT " } else { "" },
            binds.push(low),
            binds.push(high)
        ),
        Condition::Date {
            part,
            column,
            operator,
            value,
        } => {
            let column = escape_column(column)?;
            let target = match part {
                DatePart::Date => format!("{column}::date"),
                DatePart::Time => format!("{column}::time"),
                DatePart::Year => format!("EXTRACT(YEAR FROM {column})"),
                DatePart::Day => format!("EXTRACT(DAY FROM {column})"),
            };
            format!("{target} {} {}", operator.as_sql(), binds.push(value))
        }
        Condition::Raw { sql } => format!("({sql})"),
        Condition::Column {
            first,
            operator,
            second,
        } => format!(
            "{} {} {}",
            escape_column(first)?,
            operator.as_sql(),
            escape_column(second)?
        ),
        Condition::Scope { name, .. } => {
            return Err(SqlBuilderError::NotImplemented(format!("scope '{name}'")));
        }
    };
    Ok(sql)
}
