use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::parser::nested::parse_nested_segment;
use crate::request::Param;
use crate::tokenizer::split_values;

/// Checks the `nested` legend: well-formed segments, parents strictly earlier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NestedRule;

impl SchemaRule for NestedRule {
    fn parameter(&self) -> Param {
        Param::Nested
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        let Some(raw) = ctx.raw.nested.as_deref() else {
            return Ok(());
        };

        for (index, segment) in split_values(raw).iter().enumerate() {
            let group = parse_nested_segment(segment).map_err(|err| {
                RuleViolation::new(Param::Nested, segment.as_str(), ViolationReason::Malformed(err.to_string()))
            })?;
            if let Some(parent) = group.parent
                && parent >= index
            {
                return Err(RuleViolation::new(
                    Param::Nested,
                    segment.as_str(),
                    ViolationReason::InvalidNesting,
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
    fn test_valid_legend() {
        assert!(check(&NestedRule, &users(), "nested=and,0:or:e,1:and,or").is_ok());
    }

    #[test]
    fn test_parent_must_come_earlier() {
        let err = check(&NestedRule, &users(), "nested=and,1:or").unwrap_err();
        assert_eq!(err.value, "1:or");
        assert_eq!(err.reason, ViolationReason::InvalidNesting);

        let forward = check(&NestedRule, &users(), "nested=and,2:or,and").unwrap_err();
        assert_eq!(forward.value, "2:or");
    }

    #[test]
    fn test_malformed_segment() {
        let err = check(&NestedRule, &users(), "nested=and,0:xor").unwrap_err();
        assert!(matches!(err.reason, ViolationReason::Malformed(_)));
        assert_eq!(err.message(), "Invalid nested legend: 0:xor (invalid boolean 'xor', expected 'and' or 'or')");
    }
}
