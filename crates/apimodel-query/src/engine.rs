//! Request pipeline facade.
//!
//! [`QueryEngine`] ties the pieces together for one request: look up the
//! resource schema, validate the query string against it, prepare the
//! query and hand it to an executor.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::builder::{PreparedQuery, QueryBuilder, QueryExecutor};
use crate::columns::{CachedColumnCatalog, ColumnCatalog};
use crate::config::AppConfig;
use crate::error::{QueryError, Result};
use crate::parser::ParsedQuery;
use crate::registry::SchemaRegistry;
use crate::request::RawQuery;
use crate::schema::ResourceSchema;
use crate::sql_builder::{BuiltQuery, SqlRenderer};
use crate::validator::RequestValidator;

pub struct QueryEngine {
    registry: Arc<SchemaRegistry>,
    catalog: Option<Arc<dyn ColumnCatalog>>,
    strip_appends: bool,
}

impl QueryEngine {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            catalog: None,
            strip_appends: true,
        }
    }

    pub fn with_column_catalog(mut self, catalog: Arc<dyn ColumnCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_strip_appends(mut self, strip_appends: bool) -> Self {
        self.strip_appends = strip_appends;
        self
    }

    /// Engine over every configured resource.
    ///
    /// Configured column listings are served through a TTL cache.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut engine = Self::new(Arc::new(config.registry()?))
            .with_strip_appends(config.query.strip_appends);
        let catalog = config.column_catalog();
        if !catalog.is_empty() {
            engine = engine.with_column_catalog(Arc::new(CachedColumnCatalog::with_ttl(
                catalog,
                config.column_cache_ttl(),
            )));
        }
        Ok(engine)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn schema(&self, resource: &str) -> Result<Arc<ResourceSchema>> {
        self.registry
            .get(resource)
            .ok_or_else(|| QueryError::unknown_resource(resource))
    }

    /// Validate a query string and return its parsed form.
    pub fn validate(
        &self,
        resource: &str,
        request_method: Option<&str>,
        query: &str,
    ) -> Result<ParsedQuery> {
        let schema = self.schema(resource)?;
        Ok(validator(&schema, request_method).validate(&RawQuery::parse(query))?)
    }

    /// Validate and prepare a query.
    #[instrument(skip(self))]
    pub fn prepare(
        &self,
        resource: &str,
        request_method: Option<&str>,
        query: &str,
    ) -> Result<PreparedQuery> {
        let schema = self.schema(resource)?;
        let parsed = validator(&schema, request_method).validate(&RawQuery::parse(query))?;
        let mut builder = QueryBuilder::new(&schema);
        if let Some(catalog) = &self.catalog {
            builder = builder.with_column_catalog(catalog.as_ref());
        }
        Ok(builder.prepare(&parsed)?)
    }

    /// Prepare a query and render it as PostgreSQL.
    pub fn render_sql(
        &self,
        resource: &str,
        request_method: Option<&str>,
        query: &str,
    ) -> Result<BuiltQuery> {
        let prepared = self.prepare(resource, request_method, query)?;
        Ok(SqlRenderer::new().render(&prepared)?)
    }

    /// Prepare a query and run it on `executor`.
    pub fn run(
        &self,
        resource: &str,
        request_method: Option<&str>,
        query: &str,
        executor: &dyn QueryExecutor,
    ) -> Result<Value> {
        let prepared = self.prepare(resource, request_method, query)?;
        let result = prepared.execute(executor, self.strip_appends)?;
        debug!(resource = %resource, method = prepared.method.name(), "query executed");
        Ok(result)
    }
}

fn validator<'a>(schema: &'a ResourceSchema, request_method: Option<&'a str>) -> RequestValidator<'a> {
    let validator = RequestValidator::new(schema);
    match request_method {
        Some(method) => validator.with_request_method(method),
        None => validator,
    }
}
