//! WHERE predicate trees.
//!
//! A [`Predicate`] is either a leaf [`Condition`] (`expression operator [value]`)
//! or a [`ConditionGroup`] joining its children with `AND` / `OR`.
//!
//! Structured form:
//! - condition: `{"expression": "a", "operator": "=", "value": "?"}` or
//!   `["a", "=", "?"]`; a missing operator is `=`, a missing value is `?`,
//!   an explicit `null` value means no value.
//! - group: a map with exactly one key naming the group type,
//!   `{"AND": [child, ...]}` (case-insensitive).

use crate::error::{DbalError, DbalResult};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Operators that never take a value.
const VALUELESS_OPERATORS: [&str; 2] = ["IS NULL", "IS NOT NULL"];

fn is_valueless(operator: &str) -> bool {
    VALUELESS_OPERATORS
        .iter()
        .any(|op| op.eq_ignore_ascii_case(operator.trim()))
}

/// A single comparison: `expression operator [value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    expression: String,
    operator: String,
    value: Option<String>,
}

impl Condition {
    /// `IS NULL` and `IS NOT NULL` drop whatever value is passed.
    pub fn new(
        expression: impl Into<String>,
        operator: impl Into<String>,
        value: Option<&str>,
    ) -> Self {
        let operator = operator.into();
        let value = if is_valueless(&operator) {
            None
        } else {
            value.map(str::to_string)
        };
        Self {
            expression: expression.into(),
            operator,
            value,
        }
    }

    /// `expression = ?`
    pub fn placeholder(expression: impl Into<String>) -> Self {
        Self::new(expression, "=", Some("?"))
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)?;
        if !self.operator.is_empty() {
            write!(f, " {}", self.operator)?;
        }
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Condition", 3)?;
        s.serialize_field("expression", &self.expression)?;
        s.serialize_field("operator", &self.operator)?;
        s.serialize_field("value", &self.value)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Predicate::deserialize(deserializer)? {
            Predicate::Condition(c) => Ok(c),
            Predicate::Group(_) => Err(de::Error::custom(
                "expected a condition, found a condition group",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupType {
    #[default]
    And,
    Or,
}

impl GroupType {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupType::And => "AND",
            GroupType::Or => "OR",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupType {
    type Err = DbalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("AND") {
            Ok(GroupType::And)
        } else if s.eq_ignore_ascii_case("OR") {
            Ok(GroupType::Or)
        } else {
            Err(DbalError::validation(format!(
                "unknown condition group type: '{s}'"
            )))
        }
    }
}

/// `(child TYPE child ...)`
///
/// A group with no children can be built and renders `()`, but
/// [`Predicate::validate`] rejects it, and so does every builder entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionGroup {
    kind: GroupType,
    conditions: Vec<Predicate>,
}

impl ConditionGroup {
    pub fn new<I, P>(kind: GroupType, conditions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        Self {
            kind,
            conditions: conditions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and<I, P>(conditions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        Self::new(GroupType::And, conditions)
    }

    pub fn or<I, P>(conditions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        Self::new(GroupType::Or, conditions)
    }

    pub fn kind(&self) -> GroupType {
        self.kind
    }

    pub fn conditions(&self) -> &[Predicate] {
        &self.conditions
    }

    pub fn push(&mut self, predicate: impl Into<Predicate>) {
        self.conditions.push(predicate.into());
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl fmt::Display for ConditionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, child) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.kind)?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}

impl Serialize for ConditionGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.as_str(), &self.conditions)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConditionGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Predicate::deserialize(deserializer)? {
            Predicate::Group(g) => Ok(g),
            Predicate::Condition(_) => Err(de::Error::custom(
                "expected a condition group, found a condition",
            )),
        }
    }
}

/// A node of a WHERE tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Condition(Condition),
    Group(ConditionGroup),
}

impl Predicate {
    /// Rejects empty groups anywhere in the tree.
    pub fn validate(&self) -> DbalResult<()> {
        match self {
            Predicate::Condition(_) => Ok(()),
            Predicate::Group(group) => {
                if group.is_empty() {
                    return Err(DbalError::validation(format!(
                        "{} condition group cannot be empty",
                        group.kind
                    )));
                }
                group.conditions.iter().try_for_each(Predicate::validate)
            }
        }
    }

    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Predicate::Condition(c) => Some(c),
            Predicate::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&ConditionGroup> {
        match self {
            Predicate::Group(g) => Some(g),
            Predicate::Condition(_) => None,
        }
    }
}

impl From<Condition> for Predicate {
    fn from(c: Condition) -> Self {
        Predicate::Condition(c)
    }
}

impl From<ConditionGroup> for Predicate {
    fn from(g: ConditionGroup) -> Self {
        Predicate::Group(g)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Condition(c) => c.fmt(f),
            Predicate::Group(g) => g.fmt(f),
        }
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Predicate::Condition(c) => c.serialize(serializer),
            Predicate::Group(g) => g.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let predicate = deserializer.deserialize_any(PredicateVisitor)?;
        predicate.validate().map_err(de::Error::custom)?;
        Ok(predicate)
    }
}

struct PredicateVisitor;

impl<'de> Visitor<'de> for PredicateVisitor {
    type Value = Predicate;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a condition list, a condition map, or a single-key AND/OR group map")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Predicate, A::Error> {
        let expression: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::custom("condition list requires an expression"))?;
        let operator: Option<String> = seq.next_element()?;
        let value: Option<Option<String>> = seq.next_element()?;
        if seq.next_element::<de::IgnoredAny>()?.is_some() {
            return Err(de::Error::custom(
                "condition list takes at most expression, operator and value",
            ));
        }
        Ok(Predicate::Condition(Condition::new(
            expression,
            operator.unwrap_or_else(|| "=".to_string()),
            value.unwrap_or(Some("?".to_string())).as_deref(),
        )))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Predicate, A::Error> {
        let mut expression: Option<String> = None;
        let mut operator: Option<String> = None;
        let mut value: Option<Option<String>> = None;
        let mut group: Option<ConditionGroup> = None;
        let mut unknown: Option<(String, DbalError)> = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "expression" => expression = Some(map.next_value()?),
                "operator" => operator = Some(map.next_value()?),
                "value" => value = Some(map.next_value()?),
                other => {
                    let kind: GroupType = match other.parse() {
                        Ok(kind) => kind,
                        Err(err) => {
                            map.next_value::<de::IgnoredAny>()?;
                            if unknown.is_none() {
                                unknown = Some((key.clone(), err));
                            }
                            continue;
                        }
                    };
                    if group.is_some() {
                        return Err(de::Error::custom(
                            "condition group map must have exactly one key",
                        ));
                    }
                    let children: Vec<Predicate> = map.next_value()?;
                    group = Some(ConditionGroup::new(kind, children));
                }
            }
        }

        // Any condition key makes the map a condition, so a stray key is an
        // unknown field rather than an unknown group type.
        if let Some((key, err)) = unknown {
            if expression.is_some() || operator.is_some() || value.is_some() {
                return Err(de::Error::custom(format!("unknown condition field: '{key}'")));
            }
            return Err(de::Error::custom(err));
        }

        match (group, expression) {
            (Some(_), _) if operator.is_some() || value.is_some() => Err(de::Error::custom(
                "condition group map must have exactly one key",
            )),
            (Some(_), Some(_)) => Err(de::Error::custom(
                "condition group map must have exactly one key",
            )),
            (Some(group), None) => Ok(Predicate::Group(group)),
            (None, Some(expression)) => Ok(Predicate::Condition(Condition::new(
                expression,
                operator.unwrap_or_else(|| "=".to_string()),
                value.unwrap_or(Some("?".to_string())).as_deref(),
            ))),
            (None, None) => Err(de::Error::missing_field("expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn condition_renders() {
        assert_eq!(Condition::new("a", "=", Some("?")).to_string(), "a = ?");
        assert_eq!(Condition::placeholder("book_id").to_string(), "book_id = ?");
    }

    #[test]
    fn valueless_operators_drop_value() {
        let c = Condition::new("a", "IS NULL", Some("?"));
        assert_eq!(c.value(), None);
        assert_eq!(c.to_string(), "a IS NULL");
        assert_eq!(
            Condition::new("a", "is not null", Some("x")).to_string(),
            "a is not null"
        );
    }

    #[test]
    fn nested_group_renders() {
        let g = ConditionGroup::and([
            Predicate::from(Condition::new("a", "=", Some("b"))),
            Condition::new("c", "=", Some("d")).into(),
            ConditionGroup::or([
                Condition::new("e", "=", Some("f")),
                Condition::new("g", "=", Some("h")),
            ])
            .into(),
        ]);
        assert_eq!(g.to_string(), "(a = b AND c = d AND (e = f OR g = h))");
    }

    #[test]
    fn empty_group_renders_but_fails_validation() {
        let g = ConditionGroup::and(Vec::<Condition>::new());
        assert_eq!(g.to_string(), "()");
        assert!(Predicate::from(g).validate().unwrap_err().is_validation());

        let nested = ConditionGroup::or([
            Predicate::from(Condition::placeholder("a")),
            ConditionGroup::and(Vec::<Condition>::new()).into(),
        ]);
        assert!(Predicate::from(nested).validate().is_err());
    }

    #[test]
    fn condition_structured_map_and_list() {
        let c = Condition::placeholder("a");
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v, json!({"expression": "a", "operator": "=", "value": "?"}));
        assert_eq!(serde_json::from_value::<Condition>(v).unwrap(), c);

        let c: Condition = serde_json::from_value(json!(["a", "<", "5"])).unwrap();
        assert_eq!(c.to_string(), "a < 5");
        let c: Condition = serde_json::from_value(json!(["a"])).unwrap();
        assert_eq!(c.to_string(), "a = ?");
        let c: Condition = serde_json::from_value(json!({"expression": "a"})).unwrap();
        assert_eq!(c.to_string(), "a = ?");
        let c: Condition =
            serde_json::from_value(json!({"expression": "a", "operator": "IS NULL", "value": null}))
                .unwrap();
        assert_eq!(c.to_string(), "a IS NULL");
    }

    #[test]
    fn condition_structured_errors() {
        assert!(serde_json::from_value::<Condition>(json!({"operator": "="})).is_err());
        assert!(serde_json::from_value::<Condition>(json!({"expression": 1})).is_err());
        assert!(serde_json::from_value::<Condition>(json!(["a", 2])).is_err());
        assert!(serde_json::from_value::<Condition>(json!([])).is_err());
    }

    #[test]
    fn group_structured_round_trip() {
        let g = ConditionGroup::or([
            Predicate::from(ConditionGroup::and([
                Condition::placeholder("isbn13"),
                Condition::placeholder("language_id"),
            ])),
            Condition::placeholder("title").into(),
        ]);
        let v = serde_json::to_value(&g).unwrap();
        assert_eq!(
            v,
            json!({"OR": [
                {"AND": [
                    {"expression": "isbn13", "operator": "=", "value": "?"},
                    {"expression": "language_id", "operator": "=", "value": "?"}
                ]},
                {"expression": "title", "operator": "=", "value": "?"}
            ]})
        );
        let back: ConditionGroup = serde_json::from_value(v).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn group_key_is_case_insensitive() {
        let p: Predicate = serde_json::from_value(json!({"or": [["a"], ["b"]]})).unwrap();
        assert_eq!(p.to_string(), "(a = ? OR b = ?)");
        assert_eq!(p.as_group().map(ConditionGroup::kind), Some(GroupType::Or));
    }

    #[test]
    fn group_structured_errors() {
        let err = serde_json::from_value::<Predicate>(json!({"XOR": [["a"]]})).unwrap_err();
        assert!(err.to_string().contains("unknown condition group type"));
        assert!(serde_json::from_value::<Predicate>(json!({"AND": []})).is_err());
        assert!(serde_json::from_value::<Predicate>(json!({"AND": [["a"]], "OR": [["b"]]})).is_err());
        assert!(serde_json::from_value::<ConditionGroup>(json!(["a"])).is_err());
    }

    #[test]
    fn condition_structured_unknown_field() {
        let err = serde_json::from_value::<Predicate>(json!({"expression": "a", "alias": "x"}))
            .unwrap_err();
        assert!(err.to_string().contains("unknown condition field: 'alias'"));

        let err = serde_json::from_value::<Predicate>(json!({"alias": "x", "operator": "<"}))
            .unwrap_err();
        assert!(err.to_string().contains("unknown condition field: 'alias'"));

        let err = serde_json::from_value::<Predicate>(json!({"XOR": [["a"]], "AND": [["b"]]}))
            .unwrap_err();
        assert!(err.to_string().contains("unknown condition group type"));
    }
}
