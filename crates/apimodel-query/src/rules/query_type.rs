use tracing::debug;

use super::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
use crate::parser::QueryMethod;
use crate::policy::PolicyAxis;
use crate::request::Param;

/// Checks the terminal method, its arguments and the HTTP method mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryTypeRule;

impl SchemaRule for QueryTypeRule {
    fn parameter(&self) -> Param {
        Param::QueryType
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), RuleViolation> {
        let Some(raw) = ctx.raw.query_type.as_deref() else {
            return Ok(());
        };
        let spec = ctx.parser.parse_query_type_values(raw);

        if !ctx.schema.policy(PolicyAxis::Methods).is_allowed(&spec.method) {
            return Err(RuleViolation::new(
                Param::QueryType,
                spec.method,
                ViolationReason::MethodNotAllowed,
            ));
        }

        if let Err(err) = QueryMethod::from_spec(&spec) {
            return Err(RuleViolation::new(
                Param::QueryType,
                spec.method,
                ViolationReason::UnsupportedMethod(err.to_string()),
            ));
        }

        for arg in &spec.args {
            ctx.check_column_shape(Param::QueryType, arg)?;
        }

        if let Some(arg) = spec
            .args
            .iter()
            .find(|arg| !ctx.is_column_permitted(arg))
        {
            debug!(method = %spec.method, argument = %arg, "queryType argument rejected");
            return Err(RuleViolation::new(
                Param::QueryType,
                arg.as_str(),
                ViolationReason::AttributeNotAllowed,
            ));
        }

        if let Some(http_method) = ctx.request_method
            && !ctx.schema.request_methods.is_empty()
        {
            let allowed = ctx
                .schema
                .allowed_query_methods_for(http_method)
                .is_some_and(|methods| methods.iter().any(|m| *m == spec.method));
            if !allowed {
                return Err(RuleViolation::new(
                    Param::QueryType,
                    spec.method,
                    ViolationReason::RequestMethodNotAllowed(format!(
                        "not allowed for {} requests",
                        http_method.to_ascii_uppercase()
                    )),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RawQuery;
    use crate::rules::test_support::{check, users};
    use crate::schema::ResourceSchema;

    #[test]
    fn test_allowed_method_and_argument() {
        assert!(check(&QueryTypeRule, &users(), "queryType=avg:age").is_ok());
        assert!(check(&QueryTypeRule, &users(), "queryType=count").is_ok());
    }

    #[test]
    fn test_method_not_allowed() {
        let err = check(&QueryTypeRule, &users(), "queryType=delete").unwrap_err();
        assert_eq!(err.reason, ViolationReason::MethodNotAllowed);
        assert_eq!(err.value, "delete");
    }

    #[test]
    fn test_argument_not_allowed() {
        let schema = users().with_allowed_attributes(["age"]);
        let err = check(&QueryTypeRule, &schema, "queryType=avg:price").unwrap_err();
        assert_eq!(err.reason, ViolationReason::AttributeNotAllowed);
        assert_eq!(err.value, "price");
    }

    #[test]
    fn test_argument_must_be_a_column_name() {
        let open = ResourceSchema::new("users", "users")
            .with_all_attributes()
            .with_allowed_methods(["avg"]);
        let err = check(&QueryTypeRule, &open, "queryType=avg:a-b").unwrap_err();
        assert_eq!(err.value, "a-b");
        assert!(matches!(err.reason, ViolationReason::Malformed(_)));
    }

    #[test]
    fn test_unsupported_method_arity() {
        let err = check(&QueryTypeRule, &users(), "queryType=avg").unwrap_err();
        assert!(matches!(err.reason, ViolationReason::UnsupportedMethod(_)));

        let all = users().with_all_methods();
        let unknown = check(&QueryTypeRule, &all, "queryType=truncate").unwrap_err();
        assert!(matches!(unknown.reason, ViolationReason::UnsupportedMethod(_)));
    }

    #[test]
    fn test_request_method_mapping() {
        let schema = users()
            .with_request_methods("GET", ["get", "count"])
            .with_request_methods("DELETE", ["delete"]);

        let raw = RawQuery::parse("queryType=count");
        let get = RuleContext::new(&schema, &raw, Some("get"));
        assert!(QueryTypeRule.check(&get).is_ok());

        let delete = RuleContext::new(&schema, &raw, Some("DELETE"));
        let err = QueryTypeRule.check(&delete).unwrap_err();
        assert_eq!(
            err.reason,
            ViolationReason::RequestMethodNotAllowed("not allowed for DELETE requests".into())
        );

        let post = RuleContext::new(&schema, &raw, Some("POST"));
        assert!(QueryTypeRule.check(&post).is_err());
    }
}
