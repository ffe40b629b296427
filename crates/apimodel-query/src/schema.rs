//! Per-resource query configuration.
//!
//! A [`ResourceSchema`] binds a logical resource name to a table and carries
//! everything the validator needs: alias tables, allow/deny pairs for each
//! policy axis, eager-load definitions, raw clause permissions and the
//! mapping from HTTP methods to query methods. Schemas deserialize from the
//! `[[resources]]` tables of the configuration file.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alias::AliasResolver;
use crate::columns::TableIdentity;
use crate::error::ConfigurationError;
use crate::parser::QueryParser;
use crate::policy::{AllowList, PolicyAxis, PolicyDecision};

/// Clause kinds that splice client text into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawClauseKind {
    WhereRaw,
    WhereInRaw,
    WhereNotInRaw,
    SelectRaw,
}

impl RawClauseKind {
    pub fn name(self) -> &'static str {
        match self {
            RawClauseKind::WhereRaw => "where_raw",
            RawClauseKind::WhereInRaw => "where_in_raw",
            RawClauseKind::WhereNotInRaw => "where_not_in_raw",
            RawClauseKind::SelectRaw => "select_raw",
        }
    }
}

impl fmt::Display for RawClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An allowed/restricted pair for one policy axis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessRule {
    #[serde(default)]
    pub allowed: AllowList<String>,
    #[serde(default)]
    pub restricted: Vec<String>,
}

impl AccessRule {
    pub fn decision(&self) -> PolicyDecision {
        PolicyDecision::decide(&self.allowed, &self.restricted)
    }
}

fn default_methods() -> AccessRule {
    AccessRule {
        allowed: AllowList::List(vec!["get".to_string(), "exists".to_string()]),
        restricted: Vec::new(),
    }
}

/// A relation that may be eager loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EagerLoadConfig {
    /// Relation path as clients name it (`posts`, `posts.comments`).
    pub relation: String,
    /// Table the relation lives in; qualified columns refer to it.
    pub table: String,
    /// Columns clients may request; empty means unrestricted.
    #[serde(default)]
    pub columns: Vec<String>,
}

impl EagerLoadConfig {
    pub fn allows_column(&self, column: &str) -> bool {
        column == "*" || self.columns.is_empty() || self.columns.iter().any(|c| c == column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EagerLoadAccess {
    #[serde(default)]
    pub allowed: AllowList<EagerLoadConfig>,
    #[serde(default)]
    pub restricted: Vec<String>,
}

impl EagerLoadAccess {
    pub fn decision(&self) -> PolicyDecision {
        let allowed = match &self.allowed {
            AllowList::All => AllowList::All,
            AllowList::List(loads) => {
                AllowList::List(loads.iter().map(|load| load.relation.clone()).collect())
            }
        };
        PolicyDecision::decide(&allowed, &self.restricted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub attribute_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub scope_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: AccessRule,
    #[serde(default)]
    pub scopes: AccessRule,
    #[serde(default = "default_methods")]
    pub methods: AccessRule,
    #[serde(default)]
    pub eager_loads: EagerLoadAccess,
    #[serde(default)]
    pub allowed_raw_clauses: AllowList<RawClauseKind>,
    /// HTTP method → query methods it may run. Empty means no restriction.
    #[serde(default)]
    pub request_methods: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub max_limit: Option<u64>,
}

impl ResourceSchema {
    /// A schema that denies everything except `get` and `exists`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            database: None,
            attribute_aliases: BTreeMap::new(),
            scope_aliases: BTreeMap::new(),
            attributes: AccessRule::default(),
            scopes: AccessRule::default(),
            methods: default_methods(),
            eager_loads: EagerLoadAccess::default(),
            allowed_raw_clauses: AllowList::default(),
            request_methods: BTreeMap::new(),
            max_limit: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_allowed_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.allowed = AllowList::List(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_all_attributes(mut self) -> Self {
        self.attributes.allowed = AllowList::All;
        self
    }

    pub fn with_restricted_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.restricted = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attribute_alias(mut self, client: impl Into<String>, server: impl Into<String>) -> Self {
        self.attribute_aliases.insert(client.into(), server.into());
        self
    }

    pub fn with_scope_alias(mut self, client: impl Into<String>, server: impl Into<String>) -> Self {
        self.scope_aliases.insert(client.into(), server.into());
        self
    }

    pub fn with_allowed_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.allowed = AllowList::List(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_restricted_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.restricted = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.allowed = AllowList::List(methods.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_all_methods(mut self) -> Self {
        self.methods.allowed = AllowList::All;
        self
    }

    pub fn with_restricted_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.restricted = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Allow eager loading `relation` from `table`, limited to `columns`.
    pub fn with_eager_load<I, S>(
        mut self,
        relation: impl Into<String>,
        table: impl Into<String>,
        columns: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let load = EagerLoadConfig {
            relation: relation.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        };
        match &mut self.eager_loads.allowed {
            AllowList::List(loads) => loads.push(load),
            AllowList::All => self.eager_loads.allowed = AllowList::List(vec![load]),
        }
        self
    }

    pub fn with_all_eager_loads(mut self) -> Self {
        self.eager_loads.allowed = AllowList::All;
        self
    }

    pub fn with_restricted_eager_loads<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.eager_loads.restricted = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_raw_clauses(mut self, kinds: impl IntoIterator<Item = RawClauseKind>) -> Self {
        self.allowed_raw_clauses = AllowList::List(kinds.into_iter().collect());
        self
    }

    pub fn with_all_raw_clauses(mut self) -> Self {
        self.allowed_raw_clauses = AllowList::All;
        self
    }

    pub fn with_request_methods<I, S>(mut self, http_method: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_methods.insert(
            http_method.into().to_ascii_uppercase(),
            methods.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = Some(max_limit);
        self
    }

    pub fn aliases(&self) -> AliasResolver<'_> {
        AliasResolver::new(&self.attribute_aliases, &self.scope_aliases)
    }

    pub fn parser(&self) -> QueryParser<'_> {
        QueryParser::new(self.aliases())
    }

    pub fn policy(&self, axis: PolicyAxis) -> PolicyDecision {
        match axis {
            PolicyAxis::Attributes => self.attributes.decision(),
            PolicyAxis::Scopes => self.scopes.decision(),
            PolicyAxis::Methods => self.methods.decision(),
            PolicyAxis::EagerLoads => self.eager_loads.decision(),
        }
    }

    /// Definition of an eager-loadable relation, if configured.
    pub fn eager_load(&self, relation: &str) -> Option<&EagerLoadConfig> {
        self.eager_loads
            .allowed
            .values()
            .iter()
            .find(|load| load.relation == relation)
    }

    /// Allowed relations living in `table`.
    pub fn eager_loads_for_table<'s>(
        &'s self,
        table: &'s str,
    ) -> impl Iterator<Item = &'s EagerLoadConfig> + 's {
        self.eager_loads
            .allowed
            .values()
            .iter()
            .filter(move |load| load.table == table)
    }

    pub fn allows_raw_clause(&self, kind: RawClauseKind) -> bool {
        self.allowed_raw_clauses.permits(&kind)
    }

    /// Query methods allowed for an HTTP method, matched case-insensitively.
    pub fn allowed_query_methods_for(&self, http_method: &str) -> Option<&[String]> {
        self.request_methods
            .iter()
            .find(|(method, _)| method.eq_ignore_ascii_case(http_method))
            .map(|(_, methods)| methods.as_slice())
    }

    pub fn table_identity(&self) -> TableIdentity {
        TableIdentity::new(self.database.clone(), self.table.clone())
    }

    /// Check the schema for contradictions before it is registered.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyResourceName);
        }
        if self.table.trim().is_empty() {
            return Err(ConfigurationError::MissingTable {
                resource: self.name.clone(),
            });
        }

        // Alias targets are always queryable, so they must not also be restricted.
        for (alias, target) in &self.attribute_aliases {
            if self.attributes.restricted.contains(target) {
                return Err(ConfigurationError::RestrictedAliasTarget {
                    resource: self.name.clone(),
                    alias: alias.clone(),
                    target: target.clone(),
                });
            }
        }

        let mut relations = BTreeSet::new();
        for load in self.eager_loads.allowed.values() {
            if load.table.trim().is_empty() {
                return Err(ConfigurationError::MissingRelationTable {
                    resource: self.name.clone(),
                    relation: load.relation.clone(),
                });
            }
            if !relations.insert(load.relation.as_str()) {
                return Err(ConfigurationError::DuplicateEagerLoad {
                    resource: self.name.clone(),
                    relation: load.relation.clone(),
                });
            }
        }

        if self.max_limit == Some(0) {
            return Err(ConfigurationError::invalid(format!(
                "resource '{}': max_limit must be greater than 0",
                self.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyMode;

    fn users() -> ResourceSchema {
        ResourceSchema::new("users", "users")
            .with_allowed_attributes(["id", "name", "age"])
            .with_attribute_alias("account", "iban")
            .with_eager_load("posts", "posts", ["title", "body"])
            .with_raw_clauses([RawClauseKind::WhereRaw])
            .with_request_methods("get", ["get", "count"])
    }

    #[test]
    fn test_policy_per_axis() {
        let schema = users();
        assert_eq!(schema.policy(PolicyAxis::Attributes).mode, PolicyMode::AllowList);
        assert_eq!(schema.policy(PolicyAxis::Scopes).mode, PolicyMode::AllowList);
        assert!(schema.policy(PolicyAxis::Methods).is_allowed("exists"));
        assert!(!schema.policy(PolicyAxis::Methods).is_allowed("delete"));
        assert!(schema.policy(PolicyAxis::EagerLoads).is_allowed("posts"));
        assert!(!schema.policy(PolicyAxis::EagerLoads).is_allowed("comments"));
    }

    #[test]
    fn test_eager_load_lookup() {
        let schema = users();
        let posts = schema.eager_load("posts").unwrap();
        assert!(posts.allows_column("title"));
        assert!(!posts.allows_column("secret"));
        assert_eq!(schema.eager_loads_for_table("posts").count(), 1);
        assert!(schema.eager_load("comments").is_none());
    }

    #[test]
    fn test_raw_clauses_and_request_methods() {
        let schema = users();
        assert!(schema.allows_raw_clause(RawClauseKind::WhereRaw));
        assert!(!schema.allows_raw_clause(RawClauseKind::SelectRaw));
        assert!(ResourceSchema::new("a", "a")
            .with_all_raw_clauses()
            .allows_raw_clause(RawClauseKind::SelectRaw));

        assert_eq!(
            schema.allowed_query_methods_for("GET"),
            Some(["get".to_string(), "count".to_string()].as_slice())
        );
        assert_eq!(schema.allowed_query_methods_for("DELETE"), None);
    }

    #[test]
    fn test_validate_accepts_schema() {
        assert_eq!(users().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_restricted_alias_target() {
        let schema = ResourceSchema::new("users", "users")
            .with_restricted_attributes(["iban"])
            .with_attribute_alias("account", "iban");
        assert!(matches!(
            schema.validate(),
            Err(ConfigurationError::RestrictedAliasTarget { alias, .. }) if alias == "account"
        ));
    }

    #[test]
    fn test_validate_rejects_missing_parts() {
        assert_eq!(
            ResourceSchema::new(" ", "users").validate(),
            Err(ConfigurationError::EmptyResourceName)
        );
        assert!(matches!(
            ResourceSchema::new("users", "").validate(),
            Err(ConfigurationError::MissingTable { .. })
        ));
        assert!(matches!(
            ResourceSchema::new("users", "users")
                .with_eager_load("posts", "", Vec::<String>::new())
                .validate(),
            Err(ConfigurationError::MissingRelationTable { .. })
        ));
        assert!(matches!(
            ResourceSchema::new("users", "users")
                .with_eager_load("posts", "posts", ["id"])
                .with_eager_load("posts", "posts", ["title"])
                .validate(),
            Err(ConfigurationError::DuplicateEagerLoad { .. })
        ));
    }

    #[test]
    fn test_deserialize_from_json() {
        let schema: ResourceSchema = serde_json::from_str(
            r#"{
                "name": "users",
                "table": "users",
                "attributes": { "allowed": "all", "restricted": ["password"] },
                "eager_loads": { "allowed": [{ "relation": "posts", "table": "posts" }] },
                "allowed_raw_clauses": ["where_in_raw"]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.policy(PolicyAxis::Attributes).mode, PolicyMode::DenyList);
        assert!(schema.eager_load("posts").unwrap().columns.is_empty());
        assert!(schema.allows_raw_clause(RawClauseKind::WhereInRaw));
        assert!(schema.policy(PolicyAxis::Methods).is_allowed("get"));
    }
}
