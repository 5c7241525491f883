use crate::error::{DbalError, DbalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// `LIMIT n [OFFSET m]`, or `OFFSET m` alone. At least one side is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LimitRepr")]
pub struct Limit {
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Limit {
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> DbalResult<Self> {
        if limit.is_none() && offset.is_none() {
            return Err(DbalError::validation(
                "limit requires a row count, an offset, or both",
            ));
        }
        Ok(Self { limit, offset })
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => write!(f, "LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => write!(f, "LIMIT {limit}"),
            (None, Some(offset)) => write!(f, "OFFSET {offset}"),
            (None, None) => Ok(()),
        }
    }
}

/// Best-effort: `LIMIT n`, `LIMIT n OFFSET m`, `OFFSET m`, or a bare count.
impl FromStr for Limit {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static LIMIT_RE: OnceLock<regex::Regex> = OnceLock::new();
        let re = LIMIT_RE.get_or_init(|| {
            regex::Regex::new(r"(?i)^\s*(?:LIMIT\s+(\d+))?\s*(?:OFFSET\s+(\d+))?\s*$")
                .expect("invalid built-in limit regex")
        });
        if let Ok(n) = s.trim().parse::<u64>() {
            return Self::new(Some(n), None);
        }
        let caps = re
            .captures(s)
            .ok_or_else(|| DbalError::validation(format!("cannot parse limit: '{s}'")))?;
        let num = |idx: usize| -> DbalResult<Option<u64>> {
            caps.get(idx)
                .map(|m| {
                    m.as_str()
                        .parse::<u64>()
                        .map_err(|e| DbalError::validation(format!("invalid limit value: {e}")))
                })
                .transpose()
        };
        Self::new(num(1)?, num(2)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LimitRepr {
    Count(u64),
    Text(String),
    Map {
        #[serde(default)]
        limit: Option<u64>,
        #[serde(default)]
        offset: Option<u64>,
    },
}

impl TryFrom<LimitRepr> for Limit {
    type Error = DbalError;

    fn try_from(repr: LimitRepr) -> Result<Self, Self::Error> {
        match repr {
            LimitRepr::Count(n) => Self::new(Some(n), None),
            LimitRepr::Text(s) => s.parse(),
            LimitRepr::Map { limit, offset } => Self::new(limit, offset),
        }
    }
}
