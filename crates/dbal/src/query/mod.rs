//! Expression nodes that make up a query.
//!
//! Every node renders its SQL fragment through `Display`, serializes to a
//! keyed map, and deserializes from that map. The single-clause nodes also
//! accept a SQL fragment string (`"a AS b"`, `"x DESC"`, `"LIMIT 1 OFFSET 2"`);
//! those parsers are simple pattern matches, not a SQL grammar.

mod condition;
mod condition_builder;
mod from;
mod join;
mod limit;
mod order_by;
mod query_type;
mod select;

pub use condition::{Condition, ConditionGroup, GroupType, Predicate};
pub use condition_builder::{ConditionBuilder, Operand};
pub use from::{FromExpression, FromSource};
pub use join::{JoinExpression, JoinType};
pub use limit::Limit;
pub use order_by::{OrderByExpression, OrderDirection};
pub use query_type::QueryType;
pub use select::SelectExpression;

use std::sync::OnceLock;

/// Split `"<expr> AS <alias>"`. The last `AS` wins so that expressions
/// containing `AS` (e.g. `CAST(x AS int) AS n`) keep their inner keyword.
pub(crate) fn split_alias(input: &str) -> (String, Option<String>) {
    static ALIAS_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ALIAS_RE.get_or_init(|| {
        regex::Regex::new(r"(?is)^\s*(.*\S)\s+AS\s+(\S+)\s*$").expect("invalid built-in alias regex")
    });
    match re.captures(input) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
        None => (input.trim().to_string(), None),
    }
}

/// Empty aliases are treated as absent.
pub(crate) fn normalize_alias(alias: Option<&str>) -> Option<String> {
    alias
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_alias_uses_last_as() {
        assert_eq!(
            split_alias("CAST(x AS int) AS n"),
            ("CAST(x AS int)".to_string(), Some("n".to_string()))
        );
        assert_eq!(
            split_alias("MyExpression as MyAlias"),
            ("MyExpression".to_string(), Some("MyAlias".to_string()))
        );
        assert_eq!(split_alias(" 1+1 "), ("1+1".to_string(), None));
    }

    #[test]
    fn blank_alias_is_none() {
        assert_eq!(normalize_alias(Some("  ")), None);
        assert_eq!(normalize_alias(Some("t")), Some("t".to_string()));
        assert_eq!(normalize_alias(None), None);
    }
}
