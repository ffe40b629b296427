use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::request::Param;

/// Checks selected columns, including `table.column` of eager-loaded relations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldsRule;

impl SchemaRule for FieldsRule {
    fn parameter(&self) -> Param {
        Param::Fields
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        let Some(raw) = ctx.raw.fields.as_deref() else {
            return Ok(());
        };

        for field in ctx.parser.parse_fields_values(raw) {
            ctx.check_column_shape(Param::Fields, &field.resolved_name)?;
            if let Some(alias) = &field.client_alias {
                ctx.check_alias_shape(Param::Fields, alias)?;
            }
            if !ctx.is_column_permitted(&field.resolved_name) {
                return Err(RuleViolation::new(
                    Param::Fields,
                    field.resolved_name,
                    ViolationReason::AttributeNotAllowed,
                ));
            }
        }
        Ok(())
    }
}
