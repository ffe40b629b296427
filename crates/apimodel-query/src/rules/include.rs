use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::request::Param;

/// Checks requested relations and their column restrictions.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeRule;

impl SchemaRule for IncludeRule {
    fn parameter(&self) -> Param {
        Param::Include
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        for raw in &ctx.raw.include {
            let include = ctx.parser.parse_include_values(raw);
            let relation = include.relation_path.as_str();

            if relation.is_empty() || !ctx.is_relation_allowed(relation) {
                return Err(RuleViolation::new(
                    Param::Include,
                    relation,
                    ViolationReason::RelationNotAllowed,
                ));
            }

            let Some(load) = ctx.schema.eager_load(relation) else {
                continue;
            };
            if let Some(column) = include.columns.iter().find(|c| !load.allows_column(c)) {
                return Err(RuleViolation::new(
                    Param::Include,
                    format!("{relation}:{column}"),
                    ViolationReason::RelationColumnNotAllowed,
                ));
            }
        }
        Ok(())
    }
}
