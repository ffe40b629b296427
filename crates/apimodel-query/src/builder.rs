//! Query preparation and execution.
//!
//! The builder turns a validated [`ParsedQuery`] into a [`PreparedQuery`]:
//! a finite, typed description of the query that an executor can run
//! without re-interpreting client input. Steps run in a fixed order:
//! eager loads, select, where, order by, limit/offset, group by.
//!
//! Filter clauses are composed into a real tree. Clauses without a nest
//! index sit at the root; clauses with index `n` sit in group `n`; groups
//! hang below their parent group, and exists groups become correlated
//! sub-queries on the related table their columns name.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::alias::split_qualified;
use crate::columns::ColumnCatalog;
use crate::error::{BuildError, ExecutionError};
use crate::operators::Operator;
use crate::parser::{
    BooleanOp, ClauseKind, DatePart, FilterClause, NestGroup, NestMethod, ParsedQuery,
    QueryMethod, SortDirection,
};
use crate::policy::{PolicyAxis, PolicyMode};
use crate::schema::ResourceSchema;

/// One typed where primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Basic {
        column: String,
        operator: Operator,
        value: String,
    },
    In {
        column: String,
        values: Vec<String>,
        not: bool,
    },
    InRaw {
        column: String,
        values: Vec<i64>,
        not: bool,
    },
    Null {
        column: String,
        not: bool,
    },
    Between {
        column: String,
        low: String,
        high: String,
        not: bool,
    },
    Date {
        part: DatePart,
        column: String,
        operator: Operator,
        value: String,
    },
    Raw {
        sql: String,
    },
    Column {
        first: String,
        operator: Operator,
        second: String,
    },
    Scope {
        name: String,
        args: Vec<String>,
    },
}

impl Condition {
    /// Columns the condition reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Basic { column, .. }
            | Self::In { column, .. }
            | Self::InRaw { column, .. }
            | Self::Null { column, .. }
            | Self::Between { column, .. }
            | Self::Date { column, .. } => vec![column],
            Self::Column { first, second, .. } => vec![first, second],
            Self::Raw { .. } | Self::Scope { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum WhereNode {
    Condition {
        boolean: BooleanOp,
        condition: Condition,
    },
    Group {
        index: usize,
        boolean: BooleanOp,
        method: Option<NestMethod>,
        /// Related table of an exists/not-exists sub-query.
        subquery_table: Option<String>,
        children: Vec<WhereNode>,
    },
}

impl WhereNode {
    pub fn boolean(&self) -> BooleanOp {
        match self {
            Self::Condition { boolean, .. } | Self::Group { boolean, .. } => *boolean,
        }
    }

    fn with_boolean(mut self, value: BooleanOp) -> Self {
        match &mut self {
            Self::Condition { boolean, .. } | Self::Group { boolean, .. } => *boolean = value,
        }
        self
    }

    /// Visit every condition below this node, depth first.
    pub fn for_each_condition<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        match self {
            Self::Condition { condition, .. } => visit(condition),
            Self::Group { children, .. } => {
                for child in children {
                    child.for_each_condition(visit);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectColumn {
    pub column: String,
    pub alias: Option<String>,
}

impl SelectColumn {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: None,
        }
    }

    pub fn aliased(column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: Some(alias.into()),
        }
    }
}

impl fmt::Display for SelectColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} as {alias}", self.column),
            None => f.write_str(&self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EagerLoad {
    pub relation: String,
    /// Columns to load; empty loads every column.
    pub columns: Vec<String>,
}

/// A query ready for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedQuery {
    pub table: String,
    pub eager_loads: Vec<EagerLoad>,
    /// Projection; empty selects every column.
    pub select: Vec<SelectColumn>,
    pub select_raw: Vec<String>,
    pub wheres: Vec<WhereNode>,
    pub orders: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub group_by: Vec<String>,
    pub method: QueryMethod,
}

impl PreparedQuery {
    pub fn new(table: impl Into<String>, method: QueryMethod) -> Self {
        Self {
            table: table.into(),
            eager_loads: Vec::new(),
            select: Vec::new(),
            select_raw: Vec::new(),
            wheres: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            group_by: Vec::new(),
            method,
        }
    }

    /// Every condition of the where tree, depth first.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut conditions = Vec::new();
        for node in &self.wheres {
            node.for_each_condition(&mut |condition| conditions.push(condition));
        }
        conditions
    }

    /// Run the query and shape the result for the client.
    ///
    /// `get` rows lose their appended attributes when `strip_appends` is set,
    /// aggregates become `[{"aggregate": v}]`, `exists` becomes
    /// `[{"exists": b}]` and `delete` returns the affected row count.
    pub fn execute(
        &self,
        executor: &dyn QueryExecutor,
        strip_appends: bool,
    ) -> Result<Value, ExecutionError> {
        let outcome = executor.execute(self)?;
        match (&self.method, outcome) {
            (QueryMethod::Get, QueryOutcome::Rows(rows)) => Ok(Value::Array(
                rows.into_iter()
                    .map(|mut row| {
                        if strip_appends {
                            row.strip_appends();
                        }
                        row.into_value()
                    })
                    .collect(),
            )),
            (QueryMethod::Exists, QueryOutcome::Exists(exists)) => Ok(json!([{ "exists": exists }])),
            (QueryMethod::Delete, QueryOutcome::Affected(count)) => Ok(json!(count)),
            (method, QueryOutcome::Scalar(value)) if method.is_aggregate() => {
                Ok(json!([{ "aggregate": value }]))
            }
            (method, other) => Err(ExecutionError::UnexpectedOutcome {
                method: method.name(),
                outcome: other.kind(),
            }),
        }
    }
}

/// One result row; `appended` lists computed attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub attributes: Map<String, Value>,
    pub appended: Vec<String>,
}

impl Row {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            attributes,
            appended: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add a computed attribute.
    pub fn with_appended(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        self.attributes.insert(name.clone(), value.into());
        self.appended.push(name);
        self
    }

    pub fn strip_appends(&mut self) {
        for name in self.appended.drain(..) {
            self.attributes.remove(&name);
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.attributes)
    }
}

/// What an executor produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    Scalar(Value),
    Exists(bool),
    Affected(u64),
}

impl QueryOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Scalar(_) => "scalar",
            Self::Exists(_) => "exists",
            Self::Affected(_) => "affected",
        }
    }
}

/// The collaborator that actually talks to the database.
pub trait QueryExecutor {
    fn execute(&self, query: &PreparedQuery) -> Result<QueryOutcome, ExecutionError>;
}

/// Prepares queries for one resource.
pub struct QueryBuilder<'a> {
    schema: &'a ResourceSchema,
    catalog: Option<&'a dyn ColumnCatalog>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a ResourceSchema) -> Self {
        Self {
            schema,
            catalog: None,
        }
    }

    /// Catalog used to materialize deny-list projections.
    pub fn with_column_catalog(mut self, catalog: &'a dyn ColumnCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn prepare(&self, parsed: &ParsedQuery) -> Result<PreparedQuery, BuildError> {
        let method = QueryMethod::from_spec(&parsed.query_type)?;
        let mut query = PreparedQuery::new(self.schema.table.clone(), method);

        self.build_with(parsed, &mut query);
        self.build_select(parsed, &mut query)?;
        self.build_where(parsed, &mut query)?;
        self.build_order_by(parsed, &mut query);
        self.build_limit_offset(parsed, &mut query);
        self.build_group_by(parsed, &mut query);

        debug!(
            resource = %self.schema.name,
            method = query.method.name(),
            conditions = query.conditions().len(),
            eager_loads = query.eager_loads.len(),
            "prepared query"
        );
        Ok(query)
    }

    fn build_with(&self, parsed: &ParsedQuery, query: &mut PreparedQuery) {
        query.eager_loads = parsed
            .includes
            .iter()
            .map(|include| {
                let mut columns: Vec<String> = include.columns.iter().cloned().collect();
                if columns.is_empty()
                    && let Some(load) = self.schema.eager_load(&include.relation_path)
                {
                    columns = load.columns.clone();
                }
                EagerLoad {
                    relation: include.relation_path.clone(),
                    columns,
                }
            })
            .collect();
    }

    fn build_select(&self, parsed: &ParsedQuery, query: &mut PreparedQuery) -> Result<(), BuildError> {
        if parsed.fields.is_empty() {
            query.select = self.default_projection()?;
        } else {
            for field in &parsed.fields {
                if field.resolved_name == "*" {
                    let projection = self.default_projection()?;
                    if projection.is_empty() {
                        query.select.push(SelectColumn::new("*"));
                    } else {
                        query.select.extend(projection);
                    }
                    continue;
                }
                query.select.push(SelectColumn {
                    column: field.resolved_name.clone(),
                    alias: field.client_alias.clone(),
                });
            }
        }
        query.select_raw = parsed.select_raw.clone();
        Ok(())
    }

    /// Projection used when the client selects nothing explicitly.
    ///
    /// Alias targets are returned under their client names.
    fn default_projection(&self) -> Result<Vec<SelectColumn>, BuildError> {
        let decision = self.schema.policy(PolicyAxis::Attributes);
        let columns = match decision.mode {
            PolicyMode::AllowAll => return Ok(Vec::new()),
            PolicyMode::AllowList => decision.values.clone(),
            PolicyMode::DenyList => match self.catalog {
                Some(catalog) => {
                    let listing = catalog.list_columns(&self.schema.table_identity())?;
                    decision.materialize(&listing)
                }
                None => {
                    warn!(
                        resource = %self.schema.name,
                        "no column catalog, deny-list projection falls back to all columns"
                    );
                    return Ok(Vec::new());
                }
            },
        };

        let aliases = self.schema.aliases();
        let mut projection: Vec<SelectColumn> = columns
            .into_iter()
            .map(|column| match aliases.client_name_of(&column) {
                Some(client) => SelectColumn::aliased(column, client),
                None => SelectColumn::new(column),
            })
            .collect();
        for (client, target) in aliases.attribute_aliases() {
            if !projection.iter().any(|select| select.column == target) {
                projection.push(SelectColumn::aliased(target, client));
            }
        }
        Ok(projection)
    }

    fn build_where(&self, parsed: &ParsedQuery, query: &mut PreparedQuery) -> Result<(), BuildError> {
        let nests = &parsed.nests;
        for (index, group) in nests.iter().enumerate() {
            if let Some(parent) = group.parent
                && parent >= index
            {
                return Err(BuildError::InvalidNestParent { index, parent });
            }
        }

        let mut roots: Vec<WhereNode> = Vec::new();
        let mut grouped: Vec<Vec<WhereNode>> = vec![Vec::new(); nests.len()];
        for clause in &parsed.filters {
            let node = WhereNode::Condition {
                boolean: clause.boolean,
                condition: self.condition(clause)?,
            };
            match clause.nest_index {
                None => roots.push(node),
                Some(index) => grouped
                    .get_mut(index)
                    .ok_or(BuildError::UnknownNestGroup(index))?
                    .push(node),
            }
        }

        // Parents always precede children, so assembling from the back
        // finishes every child before its parent is built.
        let mut built: Vec<Option<WhereNode>> = vec![None; nests.len()];
        for index in (0..nests.len()).rev() {
            let mut children = std::mem::take(&mut grouped[index]);
            for (child, group) in nests.iter().enumerate().skip(index + 1) {
                if group.parent == Some(index)
                    && let Some(node) = built[child].take()
                {
                    children.push(node);
                }
            }
            if children.is_empty() {
                continue;
            }
            built[index] = Some(self.group(index, &nests[index], children)?);
        }

        for (index, group) in nests.iter().enumerate() {
            if group.parent.is_none()
                && let Some(node) = built[index].take()
            {
                roots.push(node);
            }
        }
        query.wheres = roots;
        Ok(())
    }

    fn group(
        &self,
        index: usize,
        nest: &NestGroup,
        mut children: Vec<WhereNode>,
    ) -> Result<WhereNode, BuildError> {
        match nest.method {
            None if children.len() == 1 => {
                let only = children.remove(0);
                Ok(only.with_boolean(nest.boolean))
            }
            None => Ok(WhereNode::Group {
                index,
                boolean: nest.boolean,
                method: None,
                subquery_table: None,
                children,
            }),
            Some(method) => {
                let table = self
                    .related_table(&children)
                    .ok_or(BuildError::MissingExistsTable(index))?;
                Ok(WhereNode::Group {
                    index,
                    boolean: nest.boolean,
                    method: Some(method),
                    subquery_table: Some(table),
                    children,
                })
            }
        }
    }

    /// First table other than the base table named by a qualified column.
    fn related_table(&self, children: &[WhereNode]) -> Option<String> {
        let mut found = None;
        for child in children {
            child.for_each_condition(&mut |condition| {
                if found.is_some() {
                    return;
                }
                found = condition.columns().into_iter().find_map(|column| {
                    match split_qualified(column) {
                        (Some(table), _) if table != self.schema.table => Some(table.to_string()),
                        _ => None,
                    }
                });
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    fn condition(&self, clause: &FilterClause) -> Result<Condition, BuildError> {
        let condition = match &clause.kind {
            ClauseKind::Basic {
                column,
                operator,
                value,
            } => Condition::Basic {
                column: column.clone(),
                operator: typed_operator(operator)?,
                value: value.clone(),
            },
            ClauseKind::In { column, values } => Condition::In {
                column: column.clone(),
                values: values.clone(),
                not: false,
            },
            ClauseKind::NotIn { column, values } => Condition::In {
                column: column.clone(),
                values: values.clone(),
                not: true,
            },
            ClauseKind::InRaw { column, values } => Condition::InRaw {
                column: column.clone(),
                values: integers(values)?,
                not: false,
            },
            ClauseKind::NotInRaw { column, values } => Condition::InRaw {
                column: column.clone(),
                values: integers(values)?,
                not: true,
            },
            ClauseKind::Null { column } => Condition::Null {
                column: column.clone(),
                not: false,
            },
            ClauseKind::NotNull { column } => Condition::Null {
                column: column.clone(),
                not: true,
            },
            ClauseKind::Between { column, values, not } => match values.as_slice() {
                [low, high] => Condition::Between {
                    column: column.clone(),
                    low: low.clone(),
                    high: high.clone(),
                    not: *not,
                },
                _ => {
                    return Err(BuildError::InvalidArity {
                        clause: "between",
                        expected: 2,
                        actual: values.len(),
                    });
                }
            },
            ClauseKind::DateCompare {
                part,
                column,
                operator,
                value,
            } => Condition::Date {
                part: *part,
                column: column.clone(),
                operator: typed_operator(operator)?,
                value: value.clone(),
            },
            ClauseKind::Raw { sql } => Condition::Raw { sql: sql.clone() },
            ClauseKind::ColumnCompare {
                first,
                operator,
                second,
            } => Condition::Column {
                first: first.clone(),
                operator: typed_operator(operator)?,
                second: second.clone(),
            },
            ClauseKind::Scope { name, args } => Condition::Scope {
                name: name.clone(),
                args: args.clone(),
            },
        };
        Ok(condition)
    }

    fn build_order_by(&self, parsed: &ParsedQuery, query: &mut PreparedQuery) {
        query.orders = parsed
            .sort
            .iter()
            .map(|sort| OrderBy {
                column: sort.resolved_name.clone(),
                direction: sort.direction,
            })
            .collect();
    }

    /// `limit`/`offset` win; otherwise `per_page` and `page` are translated.
    fn build_limit_offset(&self, parsed: &ParsedQuery, query: &mut PreparedQuery) {
        let size = parsed.limit.or(parsed.per_page);
        query.limit = size;
        query.offset = parsed.offset.or_else(|| match (parsed.page, size) {
            (Some(page), Some(size)) => Some(page.saturating_sub(1).saturating_mul(size)),
            _ => None,
        });
    }

    fn build_group_by(&self, parsed: &ParsedQuery, query: &mut PreparedQuery) {
        query.group_by = parsed.group_by.clone();
    }
}

fn typed_operator(operator: &str) -> Result<Operator, BuildError> {
    Operator::parse(operator).ok_or_else(|| BuildError::UnsupportedOperator(operator.to_string()))
}

fn integers(values: &[String]) -> Result<Vec<i64>, BuildError> {
    values
        .iter()
        .map(|value| {
            value
                .parse()
                .map_err(|_| BuildError::NonIntegerRawValue(value.clone()))
        })
        .collect()
}
