//! The query builder aggregate.
//!
//! A [`QueryBuilder`] holds one statement at a time. Calls chain by value;
//! switching statement type (`select`, `update`, `insert`, `delete`,
//! `set_type`) clears every clause and the parameter list.
//!
//! ```ignore
//! use dbal::{OrderDirection, QueryBuilder};
//!
//! let qb = QueryBuilder::new()
//!     .select(["*"])
//!     .from("book")
//!     .where_with(|cb| cb.or([cb.and([cb.eq("isbn13"), cb.eq("language_id")]), cb.eq("title")]))
//!     .order_by("publication_date", OrderDirection::Desc)
//!     .limit(Some(3), None)
//!     .set_parameters(["9789998691568", "1", "Moby Dick"]);
//!
//! assert_eq!(
//!     qb.to_sql()?,
//!     "SELECT * FROM book WHERE ((isbn13 = ? AND language_id = ?) OR title = ?) \
//!      ORDER BY publication_date DESC LIMIT 3"
//! );
//! ```
//!
//! Invalid input (an empty table name, a subquery without alias, an empty
//! condition group, ...) does not panic; the first such error is kept and
//! returned by [`QueryBuilder::validate`], [`QueryBuilder::to_sql`], and the
//! execution methods.

mod structured;


use crate::connection::Connection;
use crate::error::{DbalError, DbalResult};
use crate::query::{
    Condition, ConditionBuilder, ConditionGroup, FromExpression, FromSource, GroupType,
    JoinExpression, JoinType, Limit, OrderByExpression, OrderDirection, Predicate, QueryType,
    SelectExpression,
};
use crate::result::{QueryResult, ResultStream};
use crate::value::Value;

/// Quote character used by [`QueryBuilder::new`].
pub const DEFAULT_QUOTE_CHAR: char = '`';

/// Anything that can become one SELECT list entry.
pub trait IntoSelect {
    fn into_select(self) -> DbalResult<SelectExpression>;
}

impl IntoSelect for &str {
    fn into_select(self) -> DbalResult<SelectExpression> {
        SelectExpression::new(self, None)
    }
}

impl IntoSelect for String {
    fn into_select(self) -> DbalResult<SelectExpression> {
        SelectExpression::new(self, None)
    }
}

impl IntoSelect for &String {
    fn into_select(self) -> DbalResult<SelectExpression> {
        SelectExpression::new(self.as_str(), None)
    }
}

impl IntoSelect for SelectExpression {
    fn into_select(self) -> DbalResult<SelectExpression> {
        Ok(self)
    }
}

/// SQL query builder for SELECT / INSERT / UPDATE / DELETE.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    query_type: QueryType,
    select: Vec<SelectExpression>,
    from: Vec<FromExpression>,
    join: Vec<JoinExpression>,
    columns: Vec<String>,
    where_clause: Option<Predicate>,
    order_by: Vec<OrderByExpression>,
    limit: Option<Limit>,
    parameters: Vec<Value>,
    quote_char: char,
    build_error: Option<String>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    /// An empty SELECT.
    pub fn new() -> Self {
        Self {
            query_type: QueryType::Select,
            select: Vec::new(),
            from: Vec::new(),
            join: Vec::new(),
            columns: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            parameters: Vec::new(),
            quote_char: DEFAULT_QUOTE_CHAR,
            build_error: None,
        }
    }

    /// Override the identifier quote character used by [`QueryBuilder::quote_identifier`].
    pub fn with_quote_char(mut self, quote_char: char) -> Self {
        self.quote_char = quote_char;
        self
    }

    pub fn quote_char(&self) -> char {
        self.quote_char
    }

    fn record<T>(&mut self, result: DbalResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(err) => {
                if self.build_error.is_none() {
                    self.build_error = Some(match err {
                        DbalError::Validation(message) => message,
                        other => other.to_string(),
                    });
                }
                None
            }
        }
    }

    // ==================== Query type ====================

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Switch statement type, discarding every clause and parameter.
    pub fn set_type(mut self, query_type: QueryType) -> Self {
        tracing::trace!(
            target: "dbal.builder",
            from = %self.query_type,
            to = %query_type,
            "query type reset"
        );
        self.query_type = query_type;
        self.select.clear();
        self.from.clear();
        self.join.clear();
        self.columns.clear();
        self.where_clause = None;
        self.order_by.clear();
        self.limit = None;
        self.parameters.clear();
        self
    }

    // ==================== SELECT list ====================

    /// Start a SELECT with the given list entries.
    pub fn select<I, S>(self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: IntoSelect,
    {
        exprs
            .into_iter()
            .fold(self.set_type(QueryType::Select), |qb, expr| qb.add_select(expr))
    }

    /// Append one SELECT list entry without resetting.
    pub fn add_select(mut self, expr: impl IntoSelect) -> Self {
        if let Some(expr) = self.record(expr.into_select()) {
            self.select.push(expr);
        }
        self
    }

    // ==================== FROM / INTO ====================

    /// Append a FROM entry. A [`QueryBuilder`] source needs [`QueryBuilder::from_as`].
    pub fn from(self, source: impl Into<FromSource>) -> Self {
        let expr = FromExpression::new(source, None);
        self.push_from(expr)
    }

    /// A subquery source keeps only its SQL. Its parameters are not merged;
    /// bind them on this builder in placeholder order.
    pub fn from_as(self, source: impl Into<FromSource>, alias: &str) -> Self {
        let expr = FromExpression::new(source, Some(alias));
        self.push_from(expr)
    }

    pub fn add_from(mut self, expr: FromExpression) -> Self {
        self.from.push(expr);
        self
    }

    fn push_from(mut self, expr: DbalResult<FromExpression>) -> Self {
        if let Some(expr) = self.record(expr) {
            self.from.push(expr);
        }
        self
    }

    /// Same storage as [`QueryBuilder::from`]; reads better for INSERT.
    pub fn into(self, table: impl Into<FromSource>) -> Self {
        self.from(table)
    }

    pub fn into_as(self, table: impl Into<FromSource>, alias: &str) -> Self {
        self.from_as(table, alias)
    }

    pub fn update(self, table: &str) -> Self {
        self.set_type(QueryType::Update).from(table)
    }

    pub fn update_as(self, table: &str, alias: &str) -> Self {
        self.set_type(QueryType::Update).from_as(table, alias)
    }

    pub fn insert(self, table: &str) -> Self {
        self.set_type(QueryType::Insert).into(table)
    }

    pub fn delete(self, table: &str) -> Self {
        self.set_type(QueryType::Delete).from(table)
    }

    pub fn delete_as(self, table: &str, alias: &str) -> Self {
        self.set_type(QueryType::Delete).from_as(table, alias)
    }

    // ==================== Column values ====================

    /// Append a column and bind its value as the next positional parameter.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push(column.into());
        self.parameters.push(value.into());
        self
    }

    /// [`QueryBuilder::value`] for each pair, in iteration order.
    pub fn values<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(self, |qb, (column, value)| qb.value(column, value))
    }

    /// Alias of [`QueryBuilder::values`].
    pub fn set<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.values(pairs)
    }

    // ==================== JOIN ====================

    pub fn join(self, table: &str, on: &str, alias: Option<&str>) -> Self {
        self.join_with(JoinType::Inner, table, on, alias)
    }

    pub fn left_join(self, table: &str, on: &str, alias: Option<&str>) -> Self {
        self.join_with(JoinType::Left, table, on, alias)
    }

    pub fn right_join(self, table: &str, on: &str, alias: Option<&str>) -> Self {
        self.join_with(JoinType::Right, table, on, alias)
    }

    pub fn full_join(self, table: &str, on: &str, alias: Option<&str>) -> Self {
        self.join_with(JoinType::Full, table, on, alias)
    }

    pub fn join_with(mut self, kind: JoinType, table: &str, on: &str, alias: Option<&str>) -> Self {
        if let Some(join) = self.record(JoinExpression::new(kind, table, on, alias)) {
            self.join.push(join);
        }
        self
    }

    pub fn add_join(mut self, join: JoinExpression) -> Self {
        self.join.push(join);
        self
    }

    // ==================== WHERE ====================

    /// `expression = ?`
    pub fn condition(expression: impl Into<String>) -> Condition {
        Condition::placeholder(expression)
    }

    pub fn conditions() -> ConditionBuilder {
        ConditionBuilder::new()
    }

    /// Replace the WHERE tree.
    pub fn where_(mut self, predicate: impl Into<Predicate>) -> Self {
        let predicate = predicate.into();
        if self.record(predicate.validate()).is_some() {
            self.where_clause = Some(predicate);
        }
        self
    }

    /// Replace the WHERE tree with the predicate built by `f`.
    pub fn where_with<F, P>(self, f: F) -> Self
    where
        F: FnOnce(&ConditionBuilder) -> P,
        P: Into<Predicate>,
    {
        let predicate = f(&ConditionBuilder::new());
        self.where_(predicate)
    }

    /// `(existing AND predicate)`, or just `predicate` when there is no WHERE yet.
    pub fn and_where(self, predicate: impl Into<Predicate>) -> Self {
        self.combine_where(GroupType::And, predicate.into())
    }

    pub fn and_where_with<F, P>(self, f: F) -> Self
    where
        F: FnOnce(&ConditionBuilder) -> P,
        P: Into<Predicate>,
    {
        let predicate = f(&ConditionBuilder::new());
        self.and_where(predicate)
    }

    /// `(existing OR predicate)`, or just `predicate` when there is no WHERE yet.
    pub fn or_where(self, predicate: impl Into<Predicate>) -> Self {
        self.combine_where(GroupType::Or, predicate.into())
    }

    pub fn or_where_with<F, P>(self, f: F) -> Self
    where
        F: FnOnce(&ConditionBuilder) -> P,
        P: Into<Predicate>,
    {
        let predicate = f(&ConditionBuilder::new());
        self.or_where(predicate)
    }

    // Always wraps; never flattens into an existing group of the same type.
    fn combine_where(mut self, kind: GroupType, predicate: Predicate) -> Self {
        match self.where_clause.take() {
            None => self.where_(predicate),
            Some(existing) => {
                if self.record(predicate.validate()).is_some() {
                    self.where_clause =
                        Some(ConditionGroup::new(kind, [existing, predicate]).into());
                } else {
                    self.where_clause = Some(existing);
                }
                self
            }
        }
    }

    // ==================== ORDER BY / LIMIT ====================

    pub fn order_by(mut self, expression: &str, direction: OrderDirection) -> Self {
        if let Some(order) = self.record(OrderByExpression::new(expression, direction)) {
            self.order_by.push(order);
        }
        self
    }

    pub fn add_order_by(mut self, order: OrderByExpression) -> Self {
        self.order_by.push(order);
        self
    }

    /// Replace the LIMIT clause. At least one of `limit`/`offset` must be set.
    pub fn limit(mut self, limit: Option<u64>, offset: Option<u64>) -> Self {
        if let Some(limit) = self.record(Limit::new(limit, offset)) {
            self.limit = Some(limit);
        }
        self
    }

    // ==================== Parameters ====================

    /// Replace the whole parameter list.
    pub fn set_parameters<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.parameters = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_parameter(mut self, value: impl Into<Value>) -> Self {
        self.parameters.push(value.into());
        self
    }

    pub fn add_parameters<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.parameters.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    // ==================== Accessors ====================

    pub fn select_list(&self) -> &[SelectExpression] {
        &self.select
    }

    pub fn from_list(&self) -> &[FromExpression] {
        &self.from
    }

    pub fn joins(&self) -> &[JoinExpression] {
        &self.join
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn where_clause(&self) -> Option<&Predicate> {
        self.where_clause.as_ref()
    }

    pub fn order_by_list(&self) -> &[OrderByExpression] {
        &self.order_by
    }

    pub fn limit_clause(&self) -> Option<&Limit> {
        self.limit.as_ref()
    }

    // ==================== Rendering ====================

    /// The first construction error recorded by a chained call, if any.
    pub fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    pub fn validate(&self) -> DbalResult<()> {
        match &self.build_error {
            Some(err) => Err(DbalError::Validation(err.clone())),
            None => Ok(()),
        }
    }

    /// Render the statement with `?` placeholders.
    pub fn to_sql(&self) -> DbalResult<String> {
        self.validate()?;
        Ok(self.render())
    }

    pub(crate) fn render(&self) -> String {
        let mut sql = String::new();
        match self.query_type {
            QueryType::Select => {
                sql.push_str("SELECT ");
                sql.push_str(&join_display(&self.select, ","));
                if !self.from.is_empty() {
                    sql.push_str(" FROM ");
                    sql.push_str(&join_display(&self.from, ", "));
                }
                self.push_joins(&mut sql);
                self.push_tail(&mut sql);
            }
            QueryType::Update => {
                sql.push_str("UPDATE");
                if !self.from.is_empty() {
                    sql.push(' ');
                    sql.push_str(&join_display(&self.from, ", "));
                }
                self.push_joins(&mut sql);
                if !self.columns.is_empty() {
                    let assignments: Vec<String> =
                        self.columns.iter().map(|c| format!("{c} = ?")).collect();
                    sql.push_str(" SET ");
                    sql.push_str(&assignments.join(", "));
                }
                self.push_tail(&mut sql);
            }
            QueryType::Insert => {
                let placeholders = vec!["?"; self.columns.len()];
                sql.push_str("INSERT");
                if !self.from.is_empty() {
                    sql.push_str(" INTO ");
                    sql.push_str(&join_display(&self.from, ", "));
                }
                sql.push_str(" (");
                sql.push_str(&self.columns.join(", "));
                sql.push_str(") VALUES(");
                sql.push_str(&placeholders.join(", "));
                sql.push(')');
            }
            QueryType::Delete => {
                sql.push_str("DELETE");
                if !self.from.is_empty() {
                    sql.push_str(" FROM ");
                    sql.push_str(&join_display(&self.from, ", "));
                }
                self.push_tail(&mut sql);
            }
        }
        sql
    }

    fn push_joins(&self, sql: &mut String) {
        if !self.join.is_empty() {
            sql.push(' ');
            sql.push_str(&join_display(&self.join, " "));
        }
    }

    /// WHERE, ORDER BY and LIMIT, each only when present.
    fn push_tail(&self, sql: &mut String) {
        if let Some(predicate) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.to_string());
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&join_display(&self.order_by, ", "));
        }
        if let Some(limit) = &self.limit {
            sql.push(' ');
            sql.push_str(&limit.to_string());
        }
    }

    // ==================== Identifiers ====================

    /// Quote each dot-separated segment: `foo.bar.id` -> `` `foo`.`bar`.`id` ``.
    /// A `*` segment is left bare.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    self.quote_single_identifier(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quote one identifier, doubling any embedded quote character.
    pub fn quote_single_identifier(&self, identifier: &str) -> String {
        let q = self.quote_char;
        let escaped = identifier.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    // ==================== Execution ====================

    /// Render and run on `conn`, binding [`QueryBuilder::parameters`] positionally.
    pub async fn execute<C>(&self, conn: &C) -> DbalResult<QueryResult>
    where
        C: Connection + ?Sized,
    {
        let sql = self.to_sql()?;
        conn.execute(&sql, &self.parameters).await
    }

    /// Render and stream rows from `conn`.
    pub async fn stream<C>(&self, conn: &C) -> DbalResult<ResultStream>
    where
        C: Connection + ?Sized,
    {
        let sql = self.to_sql()?;
        conn.stream(&sql, &self.parameters).await
    }
}

fn join_display<T: std::fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}
