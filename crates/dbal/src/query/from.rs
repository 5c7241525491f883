use super::{normalize_alias, split_alias};
use crate::builder::QueryBuilder;
use crate::error::{DbalError, DbalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a FROM entry reads from.
///
/// A subquery is owned by value, so cloning the enclosing builder clones the
/// nested one as well. Only the subquery's SQL is embedded; its parameters
/// must be added to the enclosing builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FromSource {
    Table(String),
    Subquery(Box<QueryBuilder>),
}

impl From<&str> for FromSource {
    fn from(table: &str) -> Self {
        FromSource::Table(table.to_string())
    }
}

impl From<String> for FromSource {
    fn from(table: String) -> Self {
        FromSource::Table(table)
    }
}

impl From<QueryBuilder> for FromSource {
    fn from(qb: QueryBuilder) -> Self {
        FromSource::Subquery(Box::new(qb))
    }
}

/// A FROM / INTO / UPDATE target: `table [AS alias]` or `(subquery) AS alias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FromRepr")]
pub struct FromExpression {
    #[serde(rename = "expression")]
    source: FromSource,
    alias: Option<String>,
}

impl FromExpression {
    /// Fails on an empty table name, on a subquery without an alias, and on a
    /// subquery that carries a build error of its own.
    pub fn new(source: impl Into<FromSource>, alias: Option<&str>) -> DbalResult<Self> {
        let source = source.into();
        let alias = normalize_alias(alias);
        match &source {
            FromSource::Table(table) if table.trim().is_empty() => {
                return Err(DbalError::validation("from expression cannot be empty"));
            }
            FromSource::Subquery(qb) => {
                if alias.is_none() {
                    return Err(DbalError::validation("subquery in FROM requires an alias"));
                }
                qb.validate()?;
            }
            FromSource::Table(_) => {}
        }
        Ok(Self { source, alias })
    }

    pub fn table(table: impl Into<String>, alias: Option<&str>) -> DbalResult<Self> {
        Self::new(FromSource::Table(table.into()), alias)
    }

    pub fn subquery(qb: QueryBuilder, alias: &str) -> DbalResult<Self> {
        Self::new(qb, Some(alias))
    }

    pub fn source(&self) -> &FromSource {
        &self.source
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn is_subquery(&self) -> bool {
        matches!(self.source, FromSource::Subquery(_))
    }
}

impl fmt::Display for FromExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            FromSource::Table(table) => f.write_str(table)?,
            FromSource::Subquery(qb) => write!(f, "({})", qb.render())?,
        }
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// Best-effort: `"table AS alias"` or a bare table. Never yields a subquery.
impl FromStr for FromExpression {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, alias) = split_alias(s);
        Self::table(table, alias.as_deref())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FromRepr {
    Text(String),
    Map {
        expression: FromSource,
        #[serde(default)]
        alias: Option<String>,
    },
}

impl TryFrom<FromRepr> for FromExpression {
    type Error = DbalError;

    fn try_from(repr: FromRepr) -> Result<Self, Self::Error> {
        match repr {
            FromRepr::Text(s) => s.parse(),
            FromRepr::Map { expression, alias } => Self::new(expression, alias.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_table_and_alias() {
        let e = FromExpression::table("from", Some("alias")).unwrap();
        assert_eq!(e.to_string(), "from AS alias");
        assert_eq!(FromExpression::table("book", None).unwrap().to_string(), "book");
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(FromExpression::table("", None).unwrap_err().is_validation());
    }

    #[test]
    fn subquery_requires_alias() {
        let err = FromExpression::new(QueryBuilder::new(), None).unwrap_err();
        assert!(err.is_validation());
        assert!(FromExpression::new(QueryBuilder::new(), Some("")).is_err());
    }

    #[test]
    fn subquery_renders_in_parentheses() {
        let e = FromExpression::subquery(QueryBuilder::new(), "t1").unwrap();
        assert_eq!(e.to_string(), "(SELECT ) AS t1");

        let inner = QueryBuilder::new().select(["id"]).from("book");
        let e = FromExpression::subquery(inner, "b").unwrap();
        assert!(e.is_subquery());
        assert_eq!(e.to_string(), "(SELECT id FROM book) AS b");
    }

    #[test]
    fn parses_fragment_string() {
        let e: FromExpression = "from AS alias".parse().unwrap();
        assert_eq!(e.alias(), Some("alias"));
        assert_eq!(e.source(), &FromSource::Table("from".into()));
    }

    #[test]
    fn structured_forms() {
        let e = FromExpression::table("book", Some("b")).unwrap();
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v, json!({"expression": "book", "alias": "b"}));
        assert_eq!(serde_json::from_value::<FromExpression>(v).unwrap(), e);

        let nested = json!({
            "expression": {"type": "SELECT", "select": ["2"]},
            "alias": "alias"
        });
        let e: FromExpression = serde_json::from_value(nested).unwrap();
        assert!(e.is_subquery());
        assert_eq!(e.to_string(), "(SELECT 2) AS alias");

        let missing_alias = json!({"expression": {"type": "SELECT"}});
        assert!(serde_json::from_value::<FromExpression>(missing_alias).is_err());
    }
}
