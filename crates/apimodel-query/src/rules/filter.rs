use tracing::debug;

use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::operators::Operator;
use crate::parser::ClauseKind;
use crate::policy::PolicyAxis;
use crate::request::Param;

/// Checks every `filter[...]` clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterRule;

impl SchemaRule for FilterRule {
    fn parameter(&self) -> Param {
        Param::Filter
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        let nests = ctx.nest_groups();
        let scopes = ctx.schema.policy(PolicyAxis::Scopes);
        let reject = |value: &str, reason: ViolationReason| {
            debug!(parameter = "filter", value = %value, "filter rejected");
            RuleViolation::new(Param::Filter, value, reason)
        };

        for (key, value) in &ctx.raw.filter {
            let clause = ctx
                .parser
                .parse_filter_value(key, value)
                .map_err(|err| reject(key.as_str(), ViolationReason::Malformed(err.to_string())))?;

            if let Some(kind) = clause.kind.raw_clause()
                && !ctx.schema.allows_raw_clause(kind)
            {
                return Err(reject(kind.name(), ViolationReason::RawClauseNotAllowed));
            }

            if let Some(index) = clause.nest_index
                && index >= nests.len()
            {
                let label = format!("nesting {index}");
                return Err(reject(label.as_str(), ViolationReason::InvalidNesting));
            }

            for column in clause.kind.columns() {
                ctx.check_column_shape(Param::Filter, column)?;
            }

            if let Some(column) = clause
                .kind
                .columns()
                .into_iter()
                .find(|column| !ctx.is_column_permitted(column))
            {
                return Err(reject(column, ViolationReason::AttributeNotAllowed));
            }

            if let Some(operator) = clause.kind.operator()
                && Operator::parse(operator).is_none()
            {
                return Err(reject(operator, ViolationReason::UnknownOperator));
            }

            match &clause.kind {
                ClauseKind::InRaw { values, .. } | ClauseKind::NotInRaw { values, .. } => {
                    if let Some(bad) = values.iter().find(|v| v.parse::<i64>().is_err()) {
                        return Err(reject(
                            bad.as_str(),
                            ViolationReason::Malformed("raw IN values must be integers".into()),
                        ));
                    }
                }
                ClauseKind::Scope { name, .. } => {
                    let scope_alias = ctx.parser.aliases().is_scope_alias_target(name);
                    if !scopes.is_allowed(name) && !scope_alias {
                        return Err(reject(name.as_str(), ViolationReason::ScopeNotAllowed));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{check, users};
    use crate::schema::RawClauseKind;

    #[test]
    fn test_allowed_filter_passes() {
        assert!(check(&FilterRule, &users(), "filter[0:age:gte]=18").is_ok());
        assert!(check(&FilterRule, &users(), "filter[or:name:e]=ann").is_ok());
    }

    #[test]
    fn test_restricted_column_rejected() {
        let schema = users().with_restricted_attributes(["secret"]);
        let err = check(&FilterRule, &schema, "filter[0:secret:eq]=1").unwrap_err();
        assert_eq!(err.value, "secret");
        assert!(err.message().contains("secret"));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = check(&FilterRule, &users(), "filter[age:eq]=1").unwrap_err();
        assert_eq!(err.reason, ViolationReason::UnknownOperator);
        assert_eq!(err.value, "eq");
    }

    #[test]
    fn test_nest_integrity() {
        let err = check(&FilterRule, &users(), "filter[1:age:gte]=18").unwrap_err();
        assert_eq!(err.reason, ViolationReason::InvalidNesting);

        assert!(check(&FilterRule, &users(), "filter[1:age:gte]=18&nested=and,0:or").is_ok());
    }

    #[test]
    fn test_raw_clauses_need_permission() {
        let err = check(&FilterRule, &users(), "filter[x-raw]=1=1").unwrap_err();
        assert_eq!(err.value, "where_raw");
        assert_eq!(err.reason, ViolationReason::RawClauseNotAllowed);

        let schema = users().with_raw_clauses([RawClauseKind::WhereRaw, RawClauseKind::WhereInRaw]);
        assert!(check(&FilterRule, &schema, "filter[x-raw]=1=1").is_ok());
        assert!(check(&FilterRule, &schema, "filter[id:in_raw]=1,2").is_ok());
        assert!(check(&FilterRule, &schema, "filter[id:not_in_raw]=1").is_err());
    }

    #[test]
    fn test_raw_in_values_must_be_integers() {
        let schema = users().with_all_raw_clauses();
        let err = check(&FilterRule, &schema, "filter[id:in_raw]=1,drop").unwrap_err();
        assert_eq!(err.value, "drop");
    }

    #[test]
    fn test_column_compare_checks_both_sides() {
        assert!(check(&FilterRule, &users(), "filter[x-column]=age,gt,price").is_ok());
        let err = check(&FilterRule, &users(), "filter[x-column]=age,gt,salary").unwrap_err();
        assert_eq!(err.value, "salary");
    }

    #[test]
    fn test_related_columns() {
        assert!(check(&FilterRule, &users(), "filter[posts.title:e]=hello").is_ok());
        let err = check(&FilterRule, &users(), "filter[posts.draft:e]=1").unwrap_err();
        assert_eq!(err.value, "posts.draft");
    }

    #[test]
    fn test_scopes() {
        assert!(check(&FilterRule, &users(), "filter[popular:scope]=").is_ok());
        assert!(check(&FilterRule, &users(), "filter[active:scope]=2").is_ok());
        let err = check(&FilterRule, &users(), "filter[banned:scope]=").unwrap_err();
        assert_eq!(err.reason, ViolationReason::ScopeNotAllowed);
    }

    #[test]
    fn test_unsupported_clause_is_malformed() {
        let err = check(&FilterRule, &users(), "filter[name:fulltext]=x").unwrap_err();
        assert!(matches!(err.reason, ViolationReason::Malformed(_)));
        assert_eq!(err.value, "name:fulltext");
    }

    #[test]
    fn test_column_names_must_be_identifiers() {
        let open = crate::schema::ResourceSchema::new("users", "users").with_all_attributes();
        assert!(check(&FilterRule, &open, "filter[nickname:e]=x").is_ok());

        let err = check(&FilterRule, &open, "filter[na%22me:e]=1").unwrap_err();
        assert_eq!(err.value, "na\"me");
        assert!(matches!(err.reason, ViolationReason::Malformed(_)));

        let err = check(&FilterRule, &open, "filter[x-column]=age,gt,a-b").unwrap_err();
        assert_eq!(err.value, "a-b");
    }

    #[test]
    fn test_alias_targets_are_permitted() {
        assert!(check(&FilterRule, &users(), "filter[account:e]=NL01").is_ok());
    }
}
