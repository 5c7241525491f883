use super::condition::{Condition, ConditionGroup, GroupType, Predicate};

/// Left-hand side of a comparison, optionally with an explicit right-hand side.
///
/// - `"a"` compares against the `?` placeholder.
/// - `("a", "b")` compares against `b` verbatim.
pub trait Operand {
    fn into_operand(self) -> (String, String);
}

impl Operand for &str {
    fn into_operand(self) -> (String, String) {
        (self.to_string(), "?".to_string())
    }
}

impl Operand for String {
    fn into_operand(self) -> (String, String) {
        (self, "?".to_string())
    }
}

impl<E: Into<String>, V: Into<String>> Operand for (E, V) {
    fn into_operand(self) -> (String, String) {
        (self.0.into(), self.1.into())
    }
}

/// Stateless factory for WHERE predicates.
///
/// ```ignore
/// let cb = ConditionBuilder::new();
/// let p = cb.or([
///     cb.and([cb.eq("isbn13"), cb.eq("language_id")]),
///     cb.eq("title"),
/// ]);
/// assert_eq!(p.to_string(), "((isbn13 = ? AND language_id = ?) OR title = ?)");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionBuilder;

impl ConditionBuilder {
    pub fn new() -> Self {
        Self
    }

    fn compare(&self, operand: impl Operand, operator: &str) -> Predicate {
        let (expression, value) = operand.into_operand();
        Condition::new(expression, operator, Some(&value)).into()
    }

    /// General form: `expression operator [value]`.
    pub fn condition(
        &self,
        expression: impl Into<String>,
        operator: impl Into<String>,
        value: Option<&str>,
    ) -> Predicate {
        Condition::new(expression, operator, value).into()
    }

    pub fn eq(&self, operand: impl Operand) -> Predicate {
        self.compare(operand, "=")
    }

    pub fn neq(&self, operand: impl Operand) -> Predicate {
        self.compare(operand, "!=")
    }

    pub fn lt(&self, operand: impl Operand) -> Predicate {
        self.compare(operand, "<")
    }

    pub fn lte(&self, operand: impl Operand) -> Predicate {
        self.compare(operand, "<=")
    }

    pub fn gt(&self, operand: impl Operand) -> Predicate {
        self.compare(operand, ">")
    }

    pub fn gte(&self, operand: impl Operand) -> Predicate {
        self.compare(operand, ">=")
    }

    pub fn like(&self, operand: impl Operand) -> Predicate {
        self.compare(operand, "LIKE")
    }

    pub fn not_like(&self, operand: impl Operand) -> Predicate {
        self.compare(operand, "NOT LIKE")
    }

    pub fn is_null(&self, expression: impl Into<String>) -> Predicate {
        Condition::new(expression, "IS NULL", None).into()
    }

    pub fn is_not_null(&self, expression: impl Into<String>) -> Predicate {
        Condition::new(expression, "IS NOT NULL", None).into()
    }

    pub fn and<I, P>(&self, conditions: I) -> Predicate
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        ConditionGroup::new(GroupType::And, conditions).into()
    }

    pub fn or<I, P>(&self, conditions: I) -> Predicate
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        ConditionGroup::new(GroupType::Or, conditions).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_operators() {
        let cb = ConditionBuilder::new();
        assert_eq!(cb.eq("a").to_string(), "a = ?");
        assert_eq!(cb.neq("a").to_string(), "a != ?");
        assert_eq!(cb.lt("a").to_string(), "a < ?");
        assert_eq!(cb.lte("a").to_string(), "a <= ?");
        assert_eq!(cb.gt("a").to_string(), "a > ?");
        assert_eq!(cb.gte("a").to_string(), "a >= ?");
        assert_eq!(cb.like("a").to_string(), "a LIKE ?");
        assert_eq!(cb.not_like("a").to_string(), "a NOT LIKE ?");
        assert_eq!(cb.is_null("a").to_string(), "a IS NULL");
        assert_eq!(cb.is_not_null("a").to_string(), "a IS NOT NULL");
        assert_eq!(cb.eq(("a", "b")).to_string(), "a = b");
        assert_eq!(cb.condition("a", "IN", Some("(1, 2)")).to_string(), "a IN (1, 2)");
    }

    #[test]
    fn nested_groups() {
        let cb = ConditionBuilder::new();
        let p = cb.and([
            cb.eq(("a", "b")),
            cb.eq(("c", "d")),
            cb.or([cb.eq(("e", "f")), cb.eq(("g", "h"))]),
        ]);
        assert_eq!(p.to_string(), "(a = b AND c = d AND (e = f OR g = h))");
    }
}
