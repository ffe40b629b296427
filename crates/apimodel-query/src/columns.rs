//! Table column listings.
//!
//! Deny-list attribute policies need the table's full column list to turn
//! "everything but these" into a concrete projection. Listing columns means a
//! round trip to the database, so [`CachedColumnCatalog`] keeps results per
//! table for a configurable TTL (24 hours by default).
//!
//! ## Design
//!
//! - **Cache Key**: database connection name + table name
//! - **Concurrent Access**: DashMap, no global lock
//! - **Expiry**: lazy, checked on access

use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

/// Default time a column listing stays fresh.
pub const DEFAULT_COLUMN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableIdentity {
    pub database: Option<String>,
    pub table: String,
}

impl TableIdentity {
    pub fn new(database: Option<String>, table: impl Into<String>) -> Self {
        Self {
            database,
            table: table.into(),
        }
    }

    pub fn table(table: impl Into<String>) -> Self {
        Self::new(None, table)
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            Some(database) => write!(f, "{database}.{}", self.table),
            None => f.write_str(&self.table),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column listing failed: {0}")]
    Backend(String),
}

/// Source of a table's column names.
pub trait ColumnCatalog: Send + Sync {
    fn list_columns(&self, table: &TableIdentity) -> Result<BTreeSet<String>, CatalogError>;
}

/// Fixed column listings, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticColumnCatalog {
    tables: BTreeMap<TableIdentity, BTreeSet<String>>,
}

impl StaticColumnCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<I, S>(mut self, table: TableIdentity, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(table, columns);
        self
    }

    pub fn insert<I, S>(&mut self, table: TableIdentity, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .insert(table, columns.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl ColumnCatalog for StaticColumnCatalog {
    fn list_columns(&self, table: &TableIdentity) -> Result<BTreeSet<String>, CatalogError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))
    }
}

#[derive(Debug)]
struct CachedColumns {
    columns: Arc<BTreeSet<String>>,
    fetched_at: Instant,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL cache in front of another catalog.
#[derive(Debug)]
pub struct CachedColumnCatalog<C> {
    inner: C,
    ttl: Duration,
    entries: DashMap<TableIdentity, CachedColumns>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: ColumnCatalog> CachedColumnCatalog<C> {
    pub fn new(inner: C) -> Self {
        Self::with_ttl(inner, DEFAULT_COLUMN_TTL)
    }

    pub fn with_ttl(inner: C, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Columns of `table`, refreshed from the inner catalog when stale.
    pub fn columns(&self, table: &TableIdentity) -> Result<Arc<BTreeSet<String>>, CatalogError> {
        if let Some(entry) = self.entries.get(table)
            && entry.fetched_at.elapsed() < self.ttl
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(table = %table, "column cache hit");
            return Ok(Arc::clone(&entry.columns));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let columns = Arc::new(self.inner.list_columns(table)?);
        debug!(table = %table, columns = columns.len(), "refreshed column listing");
        self.entries.insert(
            table.clone(),
            CachedColumns {
                columns: Arc::clone(&columns),
                fetched_at: Instant::now(),
            },
        );
        Ok(columns)
    }

    /// Drop the cached listing of one table.
    pub fn invalidate(&self, table: &TableIdentity) -> bool {
        self.entries.remove(table).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl<C: ColumnCatalog> ColumnCatalog for CachedColumnCatalog<C> {
    fn list_columns(&self, table: &TableIdentity) -> Result<BTreeSet<String>, CatalogError> {
        self.columns(table).map(|columns| columns.as_ref().clone())
    }
}
