use thiserror::Error;

use crate::columns::CatalogError;
use crate::sql_builder::SqlBuilderError;
use crate::validator::ValidationErrors;

/// Problems with a resource schema or application configuration.
///
/// These are raised when schemas are registered or configuration is loaded,
/// never while serving a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Resource schema has an empty name")]
    EmptyResourceName,

    #[error("Resource '{resource}' does not define a table")]
    MissingTable { resource: String },

    #[error("Resource '{0}' is already registered")]
    DuplicateResource(String),

    #[error("Resource '{resource}': attribute alias '{alias}' points at restricted attribute '{target}'")]
    RestrictedAliasTarget {
        resource: String,
        alias: String,
        target: String,
    },

    #[error("Resource '{resource}': eager load '{relation}' does not define a table")]
    MissingRelationTable { resource: String, relation: String },

    #[error("Resource '{resource}': eager load '{relation}' is defined twice")]
    DuplicateEagerLoad { resource: String, relation: String },

    #[error("Configuration error: {0}")]
    Invalid(String),
}

impl ConfigurationError {
    /// Create a new Invalid error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// A request parameter whose value does not follow the query grammar.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported filter clause '{0}'")]
    UnsupportedClause(String),

    #[error("invalid filter key '{0}'")]
    InvalidFilterKey(String),

    #[error("invalid boolean '{0}', expected 'and' or 'or'")]
    InvalidBoolean(String),

    #[error("invalid nesting method '{0}'")]
    InvalidNestMethod(String),

    #[error("invalid nesting index '{0}'")]
    InvalidNestIndex(String),

    #[error("invalid nesting segment '{0}'")]
    InvalidNestSegment(String),

    #[error("{clause} expects {expected} values, got {actual}")]
    InvalidArity {
        clause: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("'{param}' must be a non-negative integer, got '{value}'")]
    NotAnInteger { param: String, value: String },

    #[error("unknown query parameter '{0}'")]
    UnknownParameter(String),
}

/// The builder was asked for something outside its finite set of primitives.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Unsupported query method: {0}")]
    UnsupportedMethod(String),

    #[error("Query method '{method}' expects {expected} arguments, got {actual}")]
    InvalidMethodArity {
        method: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("Filter references nest group {0} which does not exist")]
    UnknownNestGroup(usize),

    #[error("Nest group {index} has parent {parent}, parents must come earlier")]
    InvalidNestParent { index: usize, parent: usize },

    #[error("Exists group {0} does not reference a related table")]
    MissingExistsTable(usize),

    #[error("{clause} expects {expected} values, got {actual}")]
    InvalidArity {
        clause: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Raw IN value is not an integer: {0}")]
    NonIntegerRawValue(String),

    #[error("Column listing failed: {0}")]
    Catalog(#[from] CatalogError),
}

/// Failure reported by the query-execution collaborator.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Query execution failed: {0}")]
    Backend(String),

    #[error("Executor returned {outcome} for query method '{method}'")]
    UnexpectedOutcome {
        method: &'static str,
        outcome: &'static str,
    },
}

impl ExecutionError {
    /// Create a new Backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Umbrella error for the whole request pipeline.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Sql(#[from] SqlBuilderError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl QueryError {
    /// Create a new UnknownResource error
    pub fn unknown_resource(resource: impl Into<String>) -> Self {
        Self::UnknownResource(resource.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownResource(_) | Self::Validation(_) | Self::Build(_)
        )
    }

    /// HTTP status an outer layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownResource(_) => 404,
            Self::Validation(errors) => errors.status_code(),
            Self::Build(_) => 400,
            Self::Sql(SqlBuilderError::NotImplemented(_)) => 501,
            Self::Configuration(_) | Self::Sql(_) | Self::Execution(_) => 500,
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownResource(_) => ErrorCategory::NotFound,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Build(_) | Self::Sql(SqlBuilderError::NotImplemented(_)) => {
                ErrorCategory::UnsupportedOperation
            }
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Sql(_) | Self::Execution(_) => ErrorCategory::Execution,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    UnsupportedOperation,
    Configuration,
    Execution,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::UnsupportedOperation => write!(f, "unsupported_operation"),
            Self::Configuration => write!(f, "configuration"),
            Self::Execution => write!(f, "execution"),
        }
    }
}

/// Convenience result type for pipeline operations
pub type Result<T> = std::result::Result<T, QueryError>;
