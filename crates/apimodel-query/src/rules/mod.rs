//! Validation rules, one per request parameter.
//!
//! Each rule re-parses its raw parameter and checks the result against the
//! resource's policies, stopping at the first offending value.

mod fields;
mod filter;
mod group_by;
mod include;
mod nested;
mod pagination;
mod query_type;
mod select_raw;
mod sort;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

pub use fields::FieldsRule;
pub use filter::FilterRule;
pub use group_by::GroupByRule;
pub use include::IncludeRule;
pub use nested::NestedRule;
pub use pagination::PaginationRule;
pub use query_type::QueryTypeRule;
pub use select_raw::SelectRawRule;
pub use sort::SortRule;

use crate::alias::split_qualified;
use crate::parser::{NestGroup, QueryParser};
use crate::policy::{PolicyAxis, PolicyDecision, PolicyMode};
use crate::request::{Param, RawQuery};
use crate::schema::ResourceSchema;
use crate::sql_builder::{is_valid_column, is_valid_identifier};

/// Why a value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum ViolationReason {
    Malformed(String),
    AttributeNotAllowed,
    ScopeNotAllowed,
    RawClauseNotAllowed,
    UnknownOperator,
    InvalidNesting,
    RelationNotAllowed,
    RelationColumnNotAllowed,
    MethodNotAllowed,
    UnsupportedMethod(String),
    RequestMethodNotAllowed(String),
    OutOfRange(String),
    UnknownParameter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub parameter: String,
    pub value: String,
    #[serde(flatten)]
    pub reason: ViolationReason,
}

impl RuleViolation {
    pub fn new(parameter: Param, value: impl Into<String>, reason: ViolationReason) -> Self {
        Self {
            parameter: parameter.name().to_string(),
            value: value.into(),
            reason,
        }
    }

    pub fn unknown_parameter(name: &str) -> Self {
        Self {
            parameter: name.to_string(),
            value: name.to_string(),
            reason: ViolationReason::UnknownParameter,
        }
    }

    /// Client-facing message for this violation.
    pub fn message(&self) -> String {
        let value = &self.value;
        let base = match self.parameter.as_str() {
            "filter" => format!("Invalid filter used: {value}"),
            "fields" => format!("Invalid select attribute: {value}"),
            "sort" => format!("Cannot order by restricted attribute: {value}"),
            "groupBy" => format!("Invalid groupBy attribute: {value}"),
            "include" => format!("Invalid relation or relation column used: {value}"),
            "nested" => format!("Invalid nested legend: {value}"),
            "queryType" => format!("Invalid queryType or queryType attribute: {value}"),
            "selectRaw" => "Invalid raw function: selectRaw".to_string(),
            "page" | "per_page" | "limit" | "offset" => {
                format!("The {} must be a non-negative integer.", self.parameter)
            }
            _ => format!("Unknown query parameter: {value}"),
        };
        match &self.reason {
            ViolationReason::OutOfRange(detail) => format!("The {} {detail}.", self.parameter),
            ViolationReason::Malformed(detail)
            | ViolationReason::UnsupportedMethod(detail)
            | ViolationReason::RequestMethodNotAllowed(detail) => format!("{base} ({detail})"),
            _ => base,
        }
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Everything a rule may consult while checking one request.
pub struct RuleContext<'a> {
    pub schema: &'a ResourceSchema,
    pub parser: QueryParser<'a>,
    pub raw: &'a RawQuery,
    pub request_method: Option<&'a str>,
    attributes: PolicyDecision,
    eager_loads: PolicyDecision,
    field_aliases: BTreeSet<String>,
}

impl<'a> RuleContext<'a> {
    pub fn new(schema: &'a ResourceSchema, raw: &'a RawQuery, request_method: Option<&'a str>) -> Self {
        let parser = schema.parser();
        let field_aliases = raw
            .fields
            .as_deref()
            .map(|fields| {
                parser
                    .parse_fields_values(fields)
                    .into_iter()
                    .filter_map(|field| field.client_alias)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            schema,
            parser,
            raw,
            request_method,
            attributes: schema.policy(PolicyAxis::Attributes),
            eager_loads: schema.policy(PolicyAxis::EagerLoads),
            field_aliases,
        }
    }

    /// Reject a column reference that cannot be rendered as an identifier.
    pub fn check_column_shape(&self, parameter: Param, column: &str) -> Result<(), RuleViolation> {
        if is_valid_column(column) {
            Ok(())
        } else {
            Err(malformed_identifier(parameter, column))
        }
    }

    /// Reject a client alias that is not a single plain identifier.
    pub fn check_alias_shape(&self, parameter: Param, alias: &str) -> Result<(), RuleViolation> {
        if is_valid_identifier(alias) {
            Ok(())
        } else {
            Err(malformed_identifier(parameter, alias))
        }
    }

    /// Nest groups of the request, or none if the legend is malformed.
    pub fn nest_groups(&self) -> Vec<NestGroup> {
        self.parser
            .parse_nested_values(self.raw.nested.as_deref())
            .unwrap_or_default()
    }

    /// Alias declared by this request's `fields` parameter.
    pub fn is_field_alias(&self, name: &str) -> bool {
        self.field_aliases.contains(name)
    }

    /// Attribute of the base table the client may touch.
    pub fn is_attribute_permitted(&self, attribute: &str) -> bool {
        self.attributes.is_allowed(attribute) || self.parser.aliases().is_alias_target(attribute)
    }

    /// Check a possibly table-qualified column.
    pub fn is_column_permitted(&self, column: &str) -> bool {
        match split_qualified(column) {
            (None, "*") => true,
            (None, attribute) => self.is_attribute_permitted(attribute),
            (Some(table), attribute) if table == self.schema.table => {
                attribute == "*" || self.is_attribute_permitted(attribute)
            }
            (Some(table), attribute) => self.is_related_column_permitted(table, attribute),
        }
    }

    /// Column of a related table reachable through an allowed eager load.
    ///
    /// Under a deny-list there are no relation definitions to consult, so the
    /// table qualifier is checked as a relation name.
    pub fn is_related_column_permitted(&self, table: &str, column: &str) -> bool {
        match self.eager_loads.mode {
            PolicyMode::AllowAll => true,
            PolicyMode::DenyList => self.eager_loads.is_allowed(table),
            PolicyMode::AllowList => self.schema.eager_loads_for_table(table).any(|load| {
                self.eager_loads.is_allowed(&load.relation) && load.allows_column(column)
            }),
        }
    }

    pub fn is_relation_allowed(&self, relation: &str) -> bool {
        self.eager_loads.is_allowed(relation)
    }
}

fn malformed_identifier(parameter: Param, name: &str) -> RuleViolation {
    RuleViolation::new(
        parameter,
        name,
        ViolationReason::Malformed("not a valid identifier".into()),
    )
}

/// A check applied to one request parameter.
pub trait SchemaRule: Send + Sync {
    fn parameter(&self) -> Param;

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation>;
}

/// The rule set applied to every request, in parameter order.
pub fn default_rules() -> Vec<Box<dyn SchemaRule>> {
    vec![
        Box::new(FilterRule),
        Box::new(NestedRule),
        Box::new(SortRule),
        Box::new(FieldsRule),
        Box::new(IncludeRule),
        Box::new(QueryTypeRule),
        Box::new(SelectRawRule),
        Box::new(GroupByRule),
        Box::new(PaginationRule::new(Param::Page)),
        Box::new(PaginationRule::new(Param::PerPage)),
        Box::new(PaginationRule::new(Param::Limit)),
        Box::new(PaginationRule::new(Param::Offset)),
    ]
}
