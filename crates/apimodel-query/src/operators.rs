//! Filter operators.
//!
//! Filter keys travel through URLs, so every canonical comparison operator
//! has a short alias (`gte` for `>=`). Input that is not an alias passes
//! through with underscores turned into spaces, which is how multi-word
//! keywords such as `not_in` reach the clause classifier.

use std::fmt;

use serde::{Serialize, Serializer};

/// Canonical operator paired with its URL-safe alias.
pub const OPERATORS_WITH_ALIAS: &[(&str, &str)] = &[
    ("=", "e"),
    ("<", "lt"),
    (">", "gt"),
    ("<=", "lte"),
    (">=", "gte"),
    ("<>", "ne"),
    ("|", "bo"),
    ("^", "beo"),
    ("<<", "ls"),
    (">>", "rs"),
    ("&", "ba"),
    ("&~", "bai"),
    ("~", "bi"),
    ("~*", "bim"),
    ("!~", "nbi"),
    ("!~*", "nbim"),
    ("~~*", "bibim"),
    ("!~~*", "nbibim"),
];

/// Keywords that select a dedicated clause kind instead of a basic comparison.
pub const NON_BASIC_OPERATORS: &[&str] = &[
    "in",
    "in raw",
    "not in",
    "not in raw",
    "is null",
    "is not null",
    "between",
    "not between",
    "fulltext",
    "date",
    "day",
    "year",
    "time",
    "scope",
];

/// Resolve an alias to its canonical operator.
///
/// Unknown input is returned with `_` replaced by spaces.
pub fn resolve_operator(alias: &str) -> String {
    OPERATORS_WITH_ALIAS
        .iter()
        .find(|(_, candidate)| *candidate == alias)
        .map(|(operator, _)| (*operator).to_string())
        .unwrap_or_else(|| alias.replace('_', " "))
}

/// Alias of a canonical operator, if it has one.
pub fn alias_of(operator: &str) -> Option<&'static str> {
    OPERATORS_WITH_ALIAS
        .iter()
        .find(|(candidate, _)| *candidate == operator)
        .map(|(_, alias)| *alias)
}

/// Whether a resolved keyword is reserved for a non-basic clause kind.
pub fn is_non_basic(keyword: &str) -> bool {
    NON_BASIC_OPERATORS.contains(&keyword)
}

/// The finite set of comparison operators the builder can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    /// `<>`
    Ne,
    /// `!=`
    NotEq,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitAndNot,
    Match,
    IMatch,
    NotMatch,
    NotIMatch,
    ILikeOp,
    NotILikeOp,
    Like,
    NotLike,
    ILike,
    NotILike,
}

impl Operator {
    pub const ALL: [Operator; 23] = [
        Operator::Eq,
        Operator::Lt,
        Operator::Gt,
        Operator::Le,
        Operator::Ge,
        Operator::Ne,
        Operator::NotEq,
        Operator::BitOr,
        Operator::BitXor,
        Operator::ShiftLeft,
        Operator::ShiftRight,
        Operator::BitAnd,
        Operator::BitAndNot,
        Operator::Match,
        Operator::IMatch,
        Operator::NotMatch,
        Operator::NotIMatch,
        Operator::ILikeOp,
        Operator::NotILikeOp,
        Operator::Like,
        Operator::NotLike,
        Operator::ILike,
        Operator::NotILike,
    ];

    /// Parse a canonical (already resolved) operator.
    pub fn parse(canonical: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_sql().eq_ignore_ascii_case(canonical))
    }

    /// SQL representation of this operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Ne => "<>",
            Operator::NotEq => "!=",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::ShiftLeft => "<<",
            Operator::ShiftRight => ">>",
            Operator::BitAnd => "&",
            Operator::BitAndNot => "&~",
            Operator::Match => "~",
            Operator::IMatch => "~*",
            Operator::NotMatch => "!~",
            Operator::NotIMatch => "!~*",
            Operator::ILikeOp => "~~*",
            Operator::NotILikeOp => "!~~*",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::NotILike => "not ilike",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_aliases() {
        assert_eq!(resolve_operator("gte"), ">=");
        assert_eq!(resolve_operator("e"), "=");
        assert_eq!(resolve_operator("ne"), "<>");
        assert_eq!(resolve_operator("nbibim"), "!~~*");
    }

    #[test]
    fn test_resolve_unknown_replaces_underscores() {
        assert_eq!(resolve_operator("not_between"), "not between");
        assert_eq!(resolve_operator("is_not_null"), "is not null");
        assert_eq!(resolve_operator("like"), "like");
    }

    #[test]
    fn test_alias_round_trip() {
        for (operator, alias) in OPERATORS_WITH_ALIAS {
            assert_eq!(alias_of(operator), Some(*alias));
            assert_eq!(resolve_operator(alias), *operator);
        }
    }

    #[test]
    fn test_not_equal_has_no_alias() {
        assert_eq!(alias_of("!="), None);
        assert_eq!(resolve_operator("!="), "!=");
        assert_eq!(Operator::parse("!="), Some(Operator::NotEq));
    }

    #[test]
    fn test_non_basic_keywords() {
        assert!(is_non_basic("in"));
        assert!(is_non_basic("not in raw"));
        assert!(is_non_basic("between"));
        assert!(is_non_basic("fulltext"));
        assert!(!is_non_basic(">="));
    }

    #[test]
    fn test_every_aliased_operator_is_typed() {
        for (operator, _) in OPERATORS_WITH_ALIAS {
            let typed = Operator::parse(operator).expect("aliased operator must be typed");
            assert_eq!(typed.as_sql(), *operator);
        }
    }

    #[test]
    fn test_unknown_operator_fails_closed() {
        assert_eq!(Operator::parse("eq"), None);
        assert_eq!(Operator::parse("drop table"), None);
        assert_eq!(Operator::parse("LIKE"), Some(Operator::Like));
    }
}
