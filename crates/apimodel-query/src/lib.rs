//! Declarative model queries over HTTP query strings.
//!
//! A request such as `?filter[0:age:gte]=18&sort=-created_at&include=posts:title`
//! is decoded, checked against the [`ResourceSchema`] of the resource it
//! targets and turned into a [`PreparedQuery`] that an executor can run.

pub mod alias;
pub mod builder;
pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod operators;
pub mod parser;
pub mod policy;
pub mod registry;
pub mod request;
pub mod rules;
pub mod schema;
pub mod sql_builder;
pub mod tokenizer;
pub mod validator;

pub use alias::{AliasResolver, FieldSpec};
pub use builder::{
    Condition, EagerLoad, OrderBy, PreparedQuery, QueryBuilder, QueryExecutor, QueryOutcome, Row,
    SelectColumn, WhereNode,
};
pub use columns::{
    CacheStats, CachedColumnCatalog, CatalogError, ColumnCatalog, StaticColumnCatalog,
    TableIdentity,
};
pub use config::{AppConfig, LoggingConfig, QuerySettings};
pub use engine::QueryEngine;
pub use error::{
    BuildError, ConfigurationError, ErrorCategory, ExecutionError, ParseError, QueryError, Result,
};
pub use operators::Operator;
pub use parser::{ParsedQuery, QueryMethod, QueryParser};
pub use policy::{AllowList, PolicyAxis, PolicyDecision, PolicyMode};
pub use registry::SchemaRegistry;
pub use request::{Param, RawQuery};
pub use rules::{RuleContext, RuleViolation, SchemaRule, ViolationReason};
pub use schema::{EagerLoadConfig, RawClauseKind, ResourceSchema};
pub use sql_builder::{BuiltQuery, SqlBuilderError, SqlRenderer};
pub use validator::{RequestValidator, ValidationErrors, ValidationResponse};
