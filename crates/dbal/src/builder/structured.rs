//! Keyed-map form of a [`QueryBuilder`].
//!
//! Keys: `type`, `select`, `from`, `join`, `columns`, `where`, `orderBy`,
//! `limit`, `parameters`. A `from` entry whose `expression` is itself such a
//! map is a subquery. `limit` may be a map, a fragment string, or a bare count
//! with an optional sibling `offset` key.

use super::{DEFAULT_QUOTE_CHAR, QueryBuilder};
use crate::error::{DbalError, DbalResult};
use crate::query::{
    FromExpression, JoinExpression, Limit, OrderByExpression, Predicate, QueryType,
    SelectExpression,
};
use crate::value::Value;
use serde::ser::{self, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

impl Serialize for QueryBuilder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(err) = &self.build_error {
            return Err(ser::Error::custom(err));
        }
        let mut s = serializer.serialize_struct("QueryBuilder", 9)?;
        s.serialize_field("type", &self.query_type)?;
        s.serialize_field("select", &self.select)?;
        s.serialize_field("from", &self.from)?;
        s.serialize_field("join", &self.join)?;
        s.serialize_field("columns", &self.columns)?;
        s.serialize_field("where", &self.where_clause)?;
        s.serialize_field("orderBy", &self.order_by)?;
        s.serialize_field("limit", &self.limit)?;
        s.serialize_field("parameters", &self.parameters)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for QueryBuilder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = QueryData::deserialize(deserializer)?;
        QueryBuilder::try_from(data).map_err(serde::de::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(rename = "type", default)]
    query_type: Option<QueryType>,
    #[serde(default)]
    select: Vec<SelectExpression>,
    #[serde(default)]
    from: Vec<FromExpression>,
    #[serde(default)]
    join: Vec<JoinExpression>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(rename = "where", default)]
    where_clause: Option<Predicate>,
    #[serde(default)]
    order_by: Vec<OrderByExpression>,
    #[serde(default)]
    limit: Option<Limit>,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    parameters: Vec<Value>,
}

impl TryFrom<QueryData> for QueryBuilder {
    type Error = DbalError;

    fn try_from(data: QueryData) -> Result<Self, Self::Error> {
        let query_type = data
            .query_type
            .ok_or_else(|| DbalError::validation("missing query type"))?;

        // `"limit": 10, "offset": 20` arrives as a count plus a sibling key.
        let limit = match (data.limit, data.offset) {
            (Some(limit), Some(offset)) if limit.offset().is_none() => {
                Some(Limit::new(limit.limit(), Some(offset))?)
            }
            (None, Some(offset)) => Some(Limit::new(None, Some(offset))?),
            (limit, _) => limit,
        };

        Ok(QueryBuilder {
            query_type,
            select: data.select,
            from: data.from,
            join: data.join,
            columns: data.columns,
            where_clause: data.where_clause,
            order_by: data.order_by,
            limit,
            parameters: data.parameters,
            quote_char: DEFAULT_QUOTE_CHAR,
            build_error: None,
        })
    }
}

impl QueryBuilder {
    /// Serialize to the keyed-map form as JSON.
    pub fn to_json(&self) -> DbalResult<serde_json::Value> {
        self.validate()?;
        serde_json::to_value(self).map_err(|e| DbalError::Serialization(e.to_string()))
    }

    /// Rebuild from the keyed-map form. Any malformed part is a validation error.
    ///
    /// The quote character is not part of the stored form; the result uses
    /// [`DEFAULT_QUOTE_CHAR`]. Chain [`QueryBuilder::with_quote_char`] with
    /// `conn.quote_char()` to restore a connection's dialect.
    pub fn from_json(value: serde_json::Value) -> DbalResult<Self> {
        serde_json::from_value(value).map_err(|e| DbalError::validation(e.to_string()))
    }
}
