//! Connection and driver capabilities.
//!
//! The query builder only renders SQL; anything that talks to a database
//! implements [`Connection`], and [`Driver`] produces connections from a
//! [`Config`]. Drivers are looked up by URI scheme through a
//! [`DriverRegistry`](crate::DriverRegistry).

use crate::builder::{DEFAULT_QUOTE_CHAR, QueryBuilder};
use crate::config::Config;
use crate::error::DbalResult;
use crate::result::{QueryResult, ResultStream};
use crate::value::Value;

/// An open database connection.
///
/// `sql` uses `?` placeholders; `params` bind to them by position.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Run a statement and materialize its result.
    async fn execute(&self, sql: &str, params: &[Value]) -> DbalResult<QueryResult>;

    /// Run a statement and read its rows incrementally.
    async fn stream(&self, sql: &str, params: &[Value]) -> DbalResult<ResultStream>;

    /// The configuration this connection was opened with.
    fn config(&self) -> &Config;

    fn database(&self) -> Option<&str> {
        self.config().db.as_deref()
    }

    /// Identifier quote character of the SQL dialect.
    fn quote_char(&self) -> char {
        DEFAULT_QUOTE_CHAR
    }

    /// A fresh builder that quotes identifiers for this dialect.
    fn query(&self) -> QueryBuilder {
        QueryBuilder::new().with_quote_char(self.quote_char())
    }
}

/// Opens connections for one URI scheme.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    async fn connect(&self, config: &Config) -> DbalResult<Box<dyn Connection>>;
}
