//! Resource schema registry.
//!
//! Schemas are validated once on registration and then shared read-only.
//! Uses DashMap so lookups never block while an operator upserts a schema.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::info;

use crate::error::ConfigurationError;
use crate::schema::ResourceSchema;

/// Registry of queryable resources keyed by resource name.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    by_name: DashMap<String, Arc<ResourceSchema>>,
}

impl SchemaRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
        }
    }

    /// Build a registry from schemas, failing on the first invalid one.
    pub fn from_schemas<I>(schemas: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = ResourceSchema>,
    {
        let registry = Self::new();
        for schema in schemas {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    /// Validate and register a schema. Names must be unique.
    pub fn register(&self, schema: ResourceSchema) -> Result<Arc<ResourceSchema>, ConfigurationError> {
        schema.validate()?;
        match self.by_name.entry(schema.name.clone()) {
            Entry::Occupied(_) => Err(ConfigurationError::DuplicateResource(schema.name)),
            Entry::Vacant(slot) => {
                info!(resource = %schema.name, table = %schema.table, "registered resource schema");
                let schema = Arc::new(schema);
                slot.insert(schema.clone());
                Ok(schema)
            }
        }
    }

    /// Validate and register a schema, replacing an existing one.
    pub fn upsert(&self, schema: ResourceSchema) -> Result<Arc<ResourceSchema>, ConfigurationError> {
        schema.validate()?;
        info!(resource = %schema.name, "upserted resource schema");
        let schema = Arc::new(schema);
        self.by_name.insert(schema.name.clone(), schema.clone());
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceSchema>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> bool {
        self.by_name.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered resource names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let registry = SchemaRegistry::new();
        registry
            .register(ResourceSchema::new("users", "users"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("users").unwrap().table, "users");
        assert!(registry.get("posts").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = SchemaRegistry::new();
        registry.register(ResourceSchema::new("users", "users")).unwrap();
        let err = registry
            .register(ResourceSchema::new("users", "accounts"))
            .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateResource("users".into()));
        assert_eq!(registry.get("users").unwrap().table, "users");
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let registry = SchemaRegistry::new();
        assert!(registry.register(ResourceSchema::new("users", "")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_replaces() {
        let registry = SchemaRegistry::new();
        registry.register(ResourceSchema::new("users", "users")).unwrap();
        registry.upsert(ResourceSchema::new("users", "people")).unwrap();
        assert_eq!(registry.get("users").unwrap().table, "people");
    }

    #[test]
    fn test_remove_and_names() {
        let registry = SchemaRegistry::from_schemas([
            ResourceSchema::new("users", "users"),
            ResourceSchema::new("posts", "posts"),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["posts", "users"]);
        assert!(registry.remove("posts"));
        assert!(!registry.remove("posts"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_readers() {
        let registry = Arc::new(SchemaRegistry::new());
        registry.register(ResourceSchema::new("users", "users")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get("users").is_some())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
