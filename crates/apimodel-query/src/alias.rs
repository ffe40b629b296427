//! Client-facing names and their server-side counterparts.

use std::collections::BTreeMap;

use serde::Serialize;

static NO_ALIASES: BTreeMap<String, String> = BTreeMap::new();

/// A selected column together with the name it is returned under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub resolved_name: String,
    pub client_alias: Option<String>,
}

impl FieldSpec {
    /// Name the column carries in the response.
    pub fn output_name(&self) -> &str {
        self.client_alias.as_deref().unwrap_or(&self.resolved_name)
    }
}

/// Maps client names to server names using a resource's alias tables.
#[derive(Debug, Clone, Copy)]
pub struct AliasResolver<'a> {
    attributes: &'a BTreeMap<String, String>,
    scopes: &'a BTreeMap<String, String>,
}

impl Default for AliasResolver<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> AliasResolver<'a> {
    pub fn new(
        attributes: &'a BTreeMap<String, String>,
        scopes: &'a BTreeMap<String, String>,
    ) -> Self {
        Self { attributes, scopes }
    }

    /// A resolver without any aliases.
    pub fn empty() -> Self {
        Self {
            attributes: &NO_ALIASES,
            scopes: &NO_ALIASES,
        }
    }

    pub fn resolve_attribute(&self, client: &str) -> String {
        self.attributes
            .get(client)
            .cloned()
            .unwrap_or_else(|| client.to_string())
    }

    pub fn resolve_scope(&self, client: &str) -> String {
        self.scopes
            .get(client)
            .cloned()
            .unwrap_or_else(|| client.to_string())
    }

    /// Resolve a `fields` token, honouring an explicit `col as alias`.
    pub fn resolve_field_with_alias(&self, token: &str) -> FieldSpec {
        let mut parts = token.split(" as ");
        let client = parts.next().unwrap_or_default();
        let explicit = parts.next();

        let client_alias = match explicit {
            Some(alias) => Some(alias.to_string()),
            None if self.is_attribute_alias(client) => Some(client.to_string()),
            None => None,
        };

        FieldSpec {
            resolved_name: self.resolve_attribute(client),
            client_alias,
        }
    }

    /// Client-visible name of a server attribute, if it is aliased.
    pub fn client_name_of(&self, server: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|(_, target)| target.as_str() == server)
            .map(|(client, _)| client.as_str())
    }

    pub fn is_attribute_alias(&self, client: &str) -> bool {
        self.attributes.contains_key(client)
    }

    /// Whether a server attribute is the target of some alias.
    pub fn is_alias_target(&self, server: &str) -> bool {
        self.attributes.values().any(|target| target == server)
    }

    /// Whether a server scope is the target of some alias.
    pub fn is_scope_alias_target(&self, server: &str) -> bool {
        self.scopes.values().any(|target| target == server)
    }

    pub fn attribute_aliases(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.attributes
            .iter()
            .map(|(client, server)| (client.as_str(), server.as_str()))
    }
}

/// Split `table.column` into its parts; unqualified names have no table.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((table, column)) => (Some(table), column),
        None => (None, name),
    }
}
