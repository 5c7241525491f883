use crate::error::DbalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The statement kind a [`QueryBuilder`](crate::QueryBuilder) renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum QueryType {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::Delete => "DELETE",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SELECT" => Ok(QueryType::Select),
            "INSERT" => Ok(QueryType::Insert),
            "UPDATE" => Ok(QueryType::Update),
            "DELETE" => Ok(QueryType::Delete),
            other => Err(DbalError::validation(format!(
                "unknown query type: '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for QueryType {
    type Error = DbalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
