use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::request::Param;
use crate::schema::RawClauseKind;

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectRawRule;

impl SchemaRule for SelectRawRule {
    fn parameter(&self) -> Param {
        Param::SelectRaw
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        match ctx.raw.select_raw.as_deref() {
            Some(raw) if !ctx.schema.allows_raw_clause(RawClauseKind::SelectRaw) => Err(
                RuleViolation::new(Param::SelectRaw, raw, ViolationReason::RawClauseNotAllowed),
            ),
            _ => Ok(()),
        }
    }
}
