use crate::error::{DbalError, DbalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; an empty string is the default (`ASC`).
impl FromStr for OrderDirection {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ASC" => Ok(OrderDirection::Asc),
            "DESC" => Ok(OrderDirection::Desc),
            other => Err(DbalError::validation(format!(
                "unknown order direction: '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for OrderDirection {
    type Error = DbalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// `expression ASC|DESC`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OrderByRepr")]
pub struct OrderByExpression {
    expression: String,
    #[serde(rename = "type")]
    direction: OrderDirection,
}

impl OrderByExpression {
    pub fn new(expression: impl Into<String>, direction: OrderDirection) -> DbalResult<Self> {
        let expression = expression.into();
        if expression.trim().is_empty() {
            return Err(DbalError::validation("order by expression cannot be empty"));
        }
        Ok(Self {
            expression,
            direction,
        })
    }

    pub fn asc(expression: impl Into<String>) -> DbalResult<Self> {
        Self::new(expression, OrderDirection::Asc)
    }

    pub fn desc(expression: impl Into<String>) -> DbalResult<Self> {
        Self::new(expression, OrderDirection::Desc)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }
}

impl fmt::Display for OrderByExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expression, self.direction)
    }
}

/// Best-effort: a trailing `ASC`/`DESC` is taken as the direction.
impl FromStr for OrderByExpression {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static ORDER_RE: OnceLock<regex::Regex> = OnceLock::new();
        let re = ORDER_RE.get_or_init(|| {
            regex::Regex::new(r"(?is)^\s*(.*\S)\s+(ASC|DESC)\s*$")
                .expect("invalid built-in order by regex")
        });
        match re.captures(s) {
            Some(caps) => Self::new(&caps[1], caps[2].parse()?),
            None => Self::new(s.trim(), OrderDirection::Asc),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OrderByRepr {
    Text(String),
    Map {
        expression: String,
        #[serde(rename = "type", default)]
        direction: Option<OrderDirection>,
    },
}

impl TryFrom<OrderByRepr> for OrderByExpression {
    type Error = DbalError;

    fn try_from(repr: OrderByRepr) -> Result<Self, Self::Error> {
        match repr {
            OrderByRepr::Text(s) => s.parse(),
            OrderByRepr::Map {
                expression,
                direction,
            } => Self::new(expression, direction.unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_with_default_direction() {
        assert_eq!(OrderByExpression::asc("f").unwrap().to_string(), "f ASC");
        assert_eq!(OrderByExpression::desc("x").unwrap().to_string(), "x DESC");
    }

    #[test]
    fn empty_expression_is_rejected() {
        assert!(OrderByExpression::asc("").unwrap_err().is_validation());
    }

    #[test]
    fn parses_fragment_string() {
        let o: OrderByExpression = "MyExpression DESC".parse().unwrap();
        assert_eq!(o.expression(), "MyExpression");
        assert_eq!(o.direction(), OrderDirection::Desc);

        let o: OrderByExpression = "MyExpression".parse().unwrap();
        assert_eq!(o.to_string(), "MyExpression ASC");

        let o: OrderByExpression = "created_at desc".parse().unwrap();
        assert_eq!(o.to_string(), "created_at DESC");
    }

    #[test]
    fn structured_forms() {
        let o = OrderByExpression::desc("publication_date").unwrap();
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v, json!({"expression": "publication_date", "type": "DESC"}));
        assert_eq!(serde_json::from_value::<OrderByExpression>(v).unwrap(), o);

        let o: OrderByExpression = serde_json::from_value(json!({"expression": "a"})).unwrap();
        assert_eq!(o.direction(), OrderDirection::Asc);
        assert!(serde_json::from_value::<OrderByExpression>(json!({"expression": "a", "type": "UP"})).is_err());
    }
}
