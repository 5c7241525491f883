use super::{normalize_alias, split_alias};
use crate::error::{DbalError, DbalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One entry of the SELECT list: `expression [AS alias]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SelectRepr")]
pub struct SelectExpression {
    expression: String,
    alias: Option<String>,
}

impl SelectExpression {
    /// Fails when `expression` is empty.
    pub fn new(expression: impl Into<String>, alias: Option<&str>) -> DbalResult<Self> {
        let expression = expression.into();
        if expression.trim().is_empty() {
            return Err(DbalError::validation("select expression cannot be empty"));
        }
        Ok(Self {
            expression,
            alias: normalize_alias(alias),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

impl fmt::Display for SelectExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// Best-effort: `"expr AS alias"` or a bare expression.
impl FromStr for SelectExpression {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (expression, alias) = split_alias(s);
        Self::new(expression, alias.as_deref())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectRepr {
    Text(String),
    Map {
        expression: String,
        #[serde(default)]
        alias: Option<String>,
    },
}

impl TryFrom<SelectRepr> for SelectExpression {
    type Error = DbalError;

    fn try_from(repr: SelectRepr) -> Result<Self, Self::Error> {
        match repr {
            SelectRepr::Text(s) => s.parse(),
            SelectRepr::Map { expression, alias } => Self::new(expression, alias.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_with_and_without_alias() {
        let e = SelectExpression::new("MyExpression", Some("MyAlias")).unwrap();
        assert_eq!(e.to_string(), "MyExpression AS MyAlias");
        let e = SelectExpression::new("1+1", None).unwrap();
        assert_eq!(e.to_string(), "1+1");
    }

    #[test]
    fn empty_expression_is_rejected() {
        assert!(SelectExpression::new("", None).unwrap_err().is_validation());
        assert!(SelectExpression::new("   ", Some("a")).is_err());
    }

    #[test]
    fn parses_fragment_string() {
        let e: SelectExpression = "MyExpression AS MyAlias".parse().unwrap();
        assert_eq!(e.expression(), "MyExpression");
        assert_eq!(e.alias(), Some("MyAlias"));
        assert_eq!(e.to_string(), "MyExpression AS MyAlias");

        let e: SelectExpression = "1+1".parse().unwrap();
        assert_eq!(e.alias(), None);
    }

    #[test]
    fn structured_forms() {
        let e = SelectExpression::new("count(*)", Some("n")).unwrap();
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v, json!({"expression": "count(*)", "alias": "n"}));

        let back: SelectExpression = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);

        let from_text: SelectExpression = serde_json::from_value(json!("a AS b")).unwrap();
        assert_eq!(from_text.to_string(), "a AS b");

        assert!(serde_json::from_value::<SelectExpression>(json!({"expression": ""})).is_err());
    }
}
