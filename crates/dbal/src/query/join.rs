use super::normalize_alias;
use crate::error::{DbalError, DbalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; an empty string is the default (`INNER`).
impl FromStr for JoinType {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "INNER" => Ok(JoinType::Inner),
            "LEFT" => Ok(JoinType::Left),
            "RIGHT" => Ok(JoinType::Right),
            "FULL" => Ok(JoinType::Full),
            other => Err(DbalError::validation(format!("unknown join type: '{other}'"))),
        }
    }
}

impl TryFrom<String> for JoinType {
    type Error = DbalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// `TYPE JOIN table [AS alias] ON on`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "JoinRepr")]
pub struct JoinExpression {
    #[serde(rename = "type")]
    kind: JoinType,
    table: String,
    on: String,
    alias: Option<String>,
}

impl JoinExpression {
    /// Fails when `table` or `on` is empty.
    pub fn new(
        kind: JoinType,
        table: impl Into<String>,
        on: impl Into<String>,
        alias: Option<&str>,
    ) -> DbalResult<Self> {
        let table = table.into();
        let on = on.into();
        if table.trim().is_empty() {
            return Err(DbalError::validation("join table cannot be empty"));
        }
        if on.trim().is_empty() {
            return Err(DbalError::validation("join condition cannot be empty"));
        }
        Ok(Self {
            kind,
            table,
            on,
            alias: normalize_alias(alias),
        })
    }

    pub fn kind(&self) -> JoinType {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn on(&self) -> &str {
        &self.on
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

impl fmt::Display for JoinExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} JOIN {}", self.kind, self.table)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        write!(f, " ON {}", self.on)
    }
}

/// Best-effort: `[INNER|LEFT|RIGHT|FULL [OUTER]] JOIN table [AS alias] ON condition`.
impl FromStr for JoinExpression {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static JOIN_RE: OnceLock<regex::Regex> = OnceLock::new();
        let re = JOIN_RE.get_or_init(|| {
            regex::Regex::new(
                r"(?is)^\s*(?:(INNER|LEFT|RIGHT|FULL)(?:\s+OUTER)?\s+)?JOIN\s+(\S+)(?:\s+AS\s+(\S+))?\s+ON\s+(.*\S)\s*$",
            )
            .expect("invalid built-in join regex")
        });
        let caps = re
            .captures(s)
            .ok_or_else(|| DbalError::validation(format!("cannot parse join expression: '{s}'")))?;
        let kind = caps.get(1).map_or(Ok(JoinType::Inner), |m| m.as_str().parse())?;
        Self::new(
            kind,
            &caps[2],
            &caps[4],
            caps.get(3).map(|m| m.as_str()),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JoinRepr {
    Text(String),
    Map {
        #[serde(rename = "type", default)]
        kind: Option<JoinType>,
        table: String,
        on: String,
        #[serde(default)]
        alias: Option<String>,
    },
}

impl TryFrom<JoinRepr> for JoinExpression {
    type Error = DbalError;

    fn try_from(repr: JoinRepr) -> Result<Self, Self::Error> {
        match repr {
            JoinRepr::Text(s) => s.parse(),
            JoinRepr::Map {
                kind,
                table,
                on,
                alias,
            } => Self::new(kind.unwrap_or_default(), table, on, alias.as_deref()),
        }
    }
}
