use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::request::Param;

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupByRule;

impl SchemaRule for GroupByRule {
    fn parameter(&self) -> Param {
        Param::GroupBy
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        let Some(raw) = ctx.raw.group_by.as_deref() else {
            return Ok(());
        };

        let aliases = ctx.parser.aliases();
        for name in ctx.parser.parse_group_by_values(raw) {
            ctx.check_column_shape(Param::GroupBy, &name)?;
            let permitted = aliases.is_attribute_alias(&name)
                || ctx.is_field_alias(&name)
                || ctx.is_column_permitted(&name);
            if !permitted {
                return Err(RuleViolation::new(
                    Param::GroupBy,
                    name,
                    ViolationReason::AttributeNotAllowed,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{check, users};

    #[test]
    fn test_group_by_allowed() {
        assert!(check(&GroupByRule, &users(), "groupBy=age,name").is_ok());
        assert!(check(&GroupByRule, &users(), "groupBy=account").is_ok());
        assert!(check(&GroupByRule, &users(), "fields=age+as+years&groupBy=years").is_ok());
    }

    #[test]
    fn test_group_by_rejected() {
        let err = check(&GroupByRule, &users(), "groupBy=age,salary").unwrap_err();
        assert_eq!(err.message(), "Invalid groupBy attribute: salary");

        let open = crate::schema::ResourceSchema::new("users", "users").with_all_attributes();
        let err = check(&GroupByRule, &open, "groupBy=a-b").unwrap_err();
        assert!(matches!(err.reason, ViolationReason::Malformed(_)));
    }
}
