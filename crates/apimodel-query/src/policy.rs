//! Allow-list / deny-list policies.
//!
//! Every access axis of a resource (attributes, scopes, methods, eager loads)
//! is configured with an `allowed` list, which may be the keyword `"all"`,
//! and a `restricted` list. [`PolicyDecision::decide`] reduces the pair to
//! one of three modes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Either every value or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "AllowListRepr<T>",
    into = "AllowListRepr<T>",
    bound(serialize = "T: Serialize + Clone", deserialize = "T: Deserialize<'de>")
)]
pub enum AllowList<T> {
    All,
    List(Vec<T>),
}

impl<T> Default for AllowList<T> {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl<T> AllowList<T> {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Listed values; empty for `All`.
    pub fn values(&self) -> &[T] {
        match self {
            Self::All => &[],
            Self::List(values) => values,
        }
    }
}

impl<T: PartialEq> AllowList<T> {
    pub fn permits(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::List(values) => values.contains(value),
        }
    }
}

impl<T> From<Vec<T>> for AllowList<T> {
    fn from(values: Vec<T>) -> Self {
        Self::List(values)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AllowListRepr<T> {
    Keyword(String),
    List(Vec<T>),
}

impl<T> TryFrom<AllowListRepr<T>> for AllowList<T> {
    type Error = String;

    fn try_from(repr: AllowListRepr<T>) -> Result<Self, Self::Error> {
        match repr {
            AllowListRepr::Keyword(keyword) if keyword == "all" => Ok(Self::All),
            AllowListRepr::Keyword(other) => Err(format!(
                "expected \"all\" or a list, got \"{other}\""
            )),
            AllowListRepr::List(values) => Ok(Self::List(values)),
        }
    }
}

impl<T> From<AllowList<T>> for AllowListRepr<T> {
    fn from(list: AllowList<T>) -> Self {
        match list {
            AllowList::All => Self::Keyword("all".to_string()),
            AllowList::List(values) => Self::List(values),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    AllowAll,
    AllowList,
    DenyList,
}

/// Which access axis of a resource a decision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAxis {
    Attributes,
    Scopes,
    Methods,
    EagerLoads,
}

impl PolicyAxis {
    pub const ALL: [PolicyAxis; 4] = [
        PolicyAxis::Attributes,
        PolicyAxis::Scopes,
        PolicyAxis::Methods,
        PolicyAxis::EagerLoads,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PolicyAxis::Attributes => "attributes",
            PolicyAxis::Scopes => "scopes",
            PolicyAxis::Methods => "methods",
            PolicyAxis::EagerLoads => "eager_loads",
        }
    }
}

impl fmt::Display for PolicyAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    pub mode: PolicyMode,
    pub values: BTreeSet<String>,
}

impl PolicyDecision {
    /// Reduce an allowed/restricted pair to a decision.
    ///
    /// An empty or `"all"` allow-list with restrictions is a deny-list; any
    /// other explicit allow-list wins (so an empty one denies everything);
    /// `"all"` without restrictions allows everything.
    pub fn decide(allowed: &AllowList<String>, restricted: &[String]) -> Self {
        let allowed_is_open = match allowed {
            AllowList::All => true,
            AllowList::List(values) => values.is_empty(),
        };

        if allowed_is_open && !restricted.is_empty() {
            Self {
                mode: PolicyMode::DenyList,
                values: restricted.iter().cloned().collect(),
            }
        } else if let AllowList::List(values) = allowed {
            Self {
                mode: PolicyMode::AllowList,
                values: values.iter().cloned().collect(),
            }
        } else {
            Self::allow_all()
        }
    }

    pub fn allow_all() -> Self {
        Self {
            mode: PolicyMode::AllowAll,
            values: BTreeSet::new(),
        }
    }

    pub fn allows_everything(&self) -> bool {
        self.mode == PolicyMode::AllowAll
    }

    pub fn is_allowed(&self, value: &str) -> bool {
        match self.mode {
            PolicyMode::AllowAll => true,
            PolicyMode::AllowList => self.values.contains(value),
            PolicyMode::DenyList => !self.values.contains(value),
        }
    }

    /// Check every value, stopping at the first one that is not allowed.
    pub fn is_everything_allowed<'v, I>(&self, values: I) -> Result<(), &'v str>
    where
        I: IntoIterator<Item = &'v str>,
    {
        match values.into_iter().find(|value| !self.is_allowed(value)) {
            Some(denied) => Err(denied),
            None => Ok(()),
        }
    }

    /// Concrete column list given the table's full listing.
    pub fn materialize(&self, columns: &BTreeSet<String>) -> BTreeSet<String> {
        match self.mode {
            PolicyMode::AllowAll => columns.clone(),
            PolicyMode::AllowList => self.values.clone(),
            PolicyMode::DenyList => columns.difference(&self.values).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_deny_list() {
        let decision = PolicyDecision::decide(&AllowList::default(), &strings(&["secret"]));
        assert_eq!(decision.mode, PolicyMode::DenyList);
        assert!(!decision.is_allowed("secret"));
        assert!(decision.is_allowed("other"));

        let with_all = PolicyDecision::decide(&AllowList::All, &strings(&["secret"]));
        assert_eq!(with_all.mode, PolicyMode::DenyList);
    }

    #[test]
    fn test_allow_list() {
        let decision = PolicyDecision::decide(&strings(&["a", "b"]).into(), &[]);
        assert_eq!(decision.mode, PolicyMode::AllowList);
        assert!(decision.is_allowed("a"));
        assert!(!decision.is_allowed("c"));
    }

    #[test]
    fn test_allow_list_wins_over_restrictions() {
        let decision = PolicyDecision::decide(&strings(&["a"]).into(), &strings(&["a"]));
        assert_eq!(decision.mode, PolicyMode::AllowList);
        assert!(decision.is_allowed("a"));
    }

    #[test]
    fn test_empty_allow_list_denies_everything() {
        let decision = PolicyDecision::decide(&AllowList::default(), &[]);
        assert_eq!(decision.mode, PolicyMode::AllowList);
        assert!(!decision.is_allowed("anything"));
    }

    #[test]
    fn test_allow_all() {
        let decision = PolicyDecision::decide(&AllowList::All, &[]);
        assert!(decision.allows_everything());
        assert!(decision.is_allowed("anything"));
    }

    #[test]
    fn test_is_everything_allowed_reports_first_failure() {
        let decision = PolicyDecision::decide(&strings(&["a", "b"]).into(), &[]);
        assert_eq!(decision.is_everything_allowed(["a", "b"]), Ok(()));
        assert_eq!(decision.is_everything_allowed(["a", "x", "y"]), Err("x"));
    }

    #[test]
    fn test_materialize() {
        let columns: BTreeSet<String> = strings(&["id", "name", "secret"]).into_iter().collect();

        let deny = PolicyDecision::decide(&AllowList::All, &strings(&["secret"]));
        assert_eq!(
            deny.materialize(&columns),
            strings(&["id", "name"]).into_iter().collect()
        );

        let allow = PolicyDecision::decide(&strings(&["id"]).into(), &[]);
        assert_eq!(allow.materialize(&columns), strings(&["id"]).into_iter().collect());

        assert_eq!(PolicyDecision::allow_all().materialize(&columns), columns);
    }

    #[test]
    fn test_allow_list_serde() {
        let all: AllowList<String> = serde_json::from_str("\"all\"").unwrap();
        assert!(all.is_all());

        let list: AllowList<String> = serde_json::from_str("[\"id\",\"name\"]").unwrap();
        assert_eq!(list.values(), strings(&["id", "name"]).as_slice());

        assert!(serde_json::from_str::<AllowList<String>>("\"some\"").is_err());
        assert_eq!(serde_json::to_string(&AllowList::<String>::All).unwrap(), "\"all\"");
    }
}
