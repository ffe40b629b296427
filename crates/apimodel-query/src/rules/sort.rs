use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::request::Param;

#[derive(Debug, Clone, Copy, Default)]
pub struct SortRule;

impl SchemaRule for SortRule {
    fn parameter(&self) -> Param {
        Param::Sort
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        let Some(raw) = ctx.raw.sort.as_deref() else {
            return Ok(());
        };

        for sort in ctx.parser.parse_sort_values(raw) {
            let name = sort.resolved_name;
            ctx.check_column_shape(Param::Sort, &name)?;
            if !ctx.is_field_alias(&name) && !ctx.is_column_permitted(&name) {
                return Err(RuleViolation::new(
                    Param::Sort,
                    name,
                    ViolationReason::AttributeNotAllowed,
                ));
            }
        }
        Ok(())
    }
}
