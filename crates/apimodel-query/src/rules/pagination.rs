use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::parser::QueryParser;
use crate::request::Param;

/// Checks one of `page`, `per_page`, `limit` or `offset`.
#[derive(Debug, Clone, Copy)]
pub struct PaginationRule {
    param: Param,
}

impl PaginationRule {
    pub fn new(param: Param) -> Self {
        Self { param }
    }
}

impl SchemaRule for PaginationRule {
    fn parameter(&self) -> Param {
        self.param
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        let Some(raw) = ctx.raw.value(self.param) else {
            return Ok(());
        };
        let value = QueryParser::parse_integer(self.param, raw).map_err(|err| {
            RuleViolation::new(self.param, raw, ViolationReason::Malformed(err.to_string()))
        })?;

        match self.param {
            Param::Page if value == 0 => Err(RuleViolation::new(
                self.param,
                raw,
                ViolationReason::OutOfRange("must be at least 1".into()),
            )),
            Param::Limit | Param::PerPage => match ctx.schema.max_limit {
                Some(max) if value > max => Err(RuleViolation::new(
                    self.param,
                    raw,
                    ViolationReason::OutOfRange(format!("may not be greater than {max}")),
                )),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}
