//! Request validation.
//!
//! [`RequestValidator`] runs the rule of every parameter present in a
//! request. Within one parameter the first offending value wins, but every
//! parameter is checked, so clients see all bad fields at once.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::parser::ParsedQuery;
use crate::request::RawQuery;
use crate::rules::{RuleContext, RuleViolation, SchemaRule, ViolationReason, default_rules};
use crate::schema::ResourceSchema;

/// HTTP status for rejected requests.
pub const STATUS_UNPROCESSABLE: u16 = 422;

/// Every violation found in one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    violations: Vec<RuleViolation>,
}

/// Response body for a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResponse {
    pub message: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new(violations: Vec<RuleViolation>) -> Self {
        Self { violations }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[RuleViolation] {
        &self.violations
    }

    /// Violation reported for a parameter, if any.
    pub fn get(&self, parameter: &str) -> Option<&RuleViolation> {
        self.violations.iter().find(|v| v.parameter == parameter)
    }

    pub fn status_code(&self) -> u16 {
        STATUS_UNPROCESSABLE
    }

    /// Map of parameter to messages.
    pub fn messages(&self) -> BTreeMap<String, Vec<String>> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for violation in &self.violations {
            errors
                .entry(violation.parameter.clone())
                .or_default()
                .push(violation.message());
        }
        errors
    }

    pub fn to_response(&self) -> ValidationResponse {
        ValidationResponse {
            message: self.summary(),
            errors: self.messages(),
        }
    }

    fn summary(&self) -> String {
        match self.violations.as_slice() {
            [] => "The given data was valid.".to_string(),
            [only] => only.message(),
            [first, rest @ ..] => format!(
                "{} (and {} more error{})",
                first.message(),
                rest.len(),
                if rest.len() == 1 { "" } else { "s" }
            ),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

impl Serialize for ValidationErrors {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_response().serialize(serializer)
    }
}

/// Validates requests against one resource schema.
pub struct RequestValidator<'a> {
    schema: &'a ResourceSchema,
    request_method: Option<&'a str>,
    rules: Vec<Box<dyn SchemaRule>>,
}

impl<'a> RequestValidator<'a> {
    pub fn new(schema: &'a ResourceSchema) -> Self {
        Self {
            schema,
            request_method: None,
            rules: default_rules(),
        }
    }

    /// HTTP method of the request, for the request-method mapping.
    pub fn with_request_method(mut self, method: &'a str) -> Self {
        self.request_method = Some(method);
        self
    }

    /// Add a rule after the default ones.
    pub fn with_rule(mut self, rule: Box<dyn SchemaRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Check the request and return its parsed form.
    pub fn validate(&self, raw: &RawQuery) -> Result<ParsedQuery, ValidationErrors> {
        let ctx = RuleContext::new(self.schema, raw, self.request_method);

        let mut violations: Vec<RuleViolation> = raw
            .unknown
            .iter()
            .map(|name| RuleViolation::unknown_parameter(name))
            .collect();

        for rule in &self.rules {
            if !raw.is_present(rule.parameter()) {
                continue;
            }
            if let Err(violation) = rule.check(&ctx) {
                debug!(
                    resource = %self.schema.name,
                    parameter = %violation.parameter,
                    value = %violation.value,
                    "request parameter rejected"
                );
                violations.push(violation);
            }
        }

        if !violations.is_empty() {
            return Err(ValidationErrors::new(violations));
        }

        ctx.parser.format(raw).map_err(|err| {
            ValidationErrors::new(vec![RuleViolation {
                parameter: "query".to_string(),
                value: err.to_string(),
                reason: ViolationReason::Malformed(err.to_string()),
            }])
        })
    }
}
