//! PostgreSQL driver over `tokio-postgres`.
//!
//! - `?` placeholders are rewritten to `$1..$n` before preparing.
//! - [`Value`] parameters adapt to the declared parameter type, so text such
//!   as `"42"` binds to an `int4` column and `"2024-01-01"` to a `date`.
//! - Result cells decode to [`Value`]; JSON, UUID and date/time columns come
//!   back as text.

use crate::config::Config;
use crate::connection::{Connection, Driver};
use crate::error::{DbalError, DbalResult};
use crate::result::{QueryResult, ResultStream};
use crate::value::{Row, Value};
use bytes::BytesMut;
use futures_core::Stream;
use std::error::Error;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_postgres::NoTls;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// URI schemes served by [`PostgresDriver`].
pub const SCHEMES: [&str; 2] = ["postgres", "postgresql"];

/// Longest SQL text written to logs.
const MAX_LOGGED_SQL: usize = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

#[async_trait::async_trait]
impl Driver for PostgresDriver {
    async fn connect(&self, config: &Config) -> DbalResult<Box<dyn Connection>> {
        Ok(Box::new(PostgresConnection::connect(config).await?))
    }
}

/// A single `tokio_postgres::Client` plus the config it came from.
pub struct PostgresConnection {
    client: tokio_postgres::Client,
    config: Config,
}

impl PostgresConnection {
    /// Connect without TLS and drive the connection on a tokio task.
    pub async fn connect(config: &Config) -> DbalResult<Self> {
        let pg = pg_config(config)?;
        let (client, connection) = pg
            .connect(NoTls)
            .await
            .map_err(|e| DbalError::Connection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "dbal.driver", error = %e, "postgres connection error");
            }
        });
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Wrap an already connected client.
    pub fn from_client(client: tokio_postgres::Client, config: Config) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("config", &self.config)
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

fn pg_config(config: &Config) -> DbalResult<tokio_postgres::Config> {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.host);
    if let Some(port) = config.port {
        pg.port(port);
    }
    if !config.user.is_empty() {
        pg.user(&config.user);
    }
    if let Some(pass) = &config.pass {
        pg.password(pass);
    }
    if let Some(db) = &config.db {
        pg.dbname(db);
    }
    for (key, value) in &config.params {
        match key.as_str() {
            "application_name" => {
                pg.application_name(value);
            }
            "options" => {
                pg.options(value);
            }
            "connect_timeout" => {
                let secs: u64 = value.parse().map_err(|_| {
                    DbalError::config(format!("connect_timeout must be seconds, got '{value}'"))
                })?;
                pg.connect_timeout(Duration::from_secs(secs));
            }
            other => {
                tracing::debug!(target: "dbal.driver", param = other, "ignoring connection parameter");
            }
        }
    }
    Ok(pg)
}

#[async_trait::async_trait]
impl Connection for PostgresConnection {
    async fn execute(&self, sql: &str, params: &[Value]) -> DbalResult<QueryResult> {
        let sql = rewrite_placeholders(sql);
        log_sql("execute", &sql, params.len());

        let statement = self.client.prepare(&sql).await.inspect_err(log_error)?;
        let refs = param_refs(params);
        if statement.columns().is_empty() {
            let affected = self
                .client
                .execute(&statement, &refs)
                .await
                .inspect_err(log_error)?;
            return Ok(QueryResult::from_affected(affected));
        }

        let rows = self
            .client
            .query(&statement, &refs)
            .await
            .inspect_err(log_error)?;
        let rows = rows.iter().map(decode_row).collect::<DbalResult<Vec<_>>>()?;
        Ok(QueryResult {
            affected_rows: rows.len() as u64,
            rows,
            ..QueryResult::default()
        })
    }

    async fn stream(&self, sql: &str, params: &[Value]) -> DbalResult<ResultStream> {
        let sql = rewrite_placeholders(sql);
        log_sql("stream", &sql, params.len());

        let statement = self.client.prepare(&sql).await.inspect_err(log_error)?;
        let refs = param_refs(params);
        let rows = self
            .client
            .query_raw(&statement, refs.iter().copied())
            .await
            .inspect_err(log_error)?;
        Ok(ResultStream::new(PgRowStream {
            inner: Box::pin(rows),
        }))
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn quote_char(&self) -> char {
        '"'
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn log_sql(kind: &'static str, sql: &str, params: usize) {
    let shown = truncate_sql_bytes(sql, MAX_LOGGED_SQL);
    if shown.len() < sql.len() {
        tracing::debug!(target: "dbal.sql", kind, params, sql = %format!("{shown}..."));
    } else {
        tracing::debug!(target: "dbal.sql", kind, params, sql);
    }
}

fn log_error(err: &tokio_postgres::Error) {
    tracing::warn!(target: "dbal.driver", error = %err, "postgres query failed");
}

/// Cut on a char boundary at or below `max_bytes`.
fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Rewrite `?` to `$1..$n`, leaving string literals (including `E'...'`
/// escape strings and `$tag$...$tag$` dollar quotes), quoted identifiers and
/// comments untouched.
pub fn rewrite_placeholders(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let word_before = i > 0 && is_ident_char(chars[i - 1]);
        match c {
            '?' => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
                i += 1;
            }
            'E' | 'e' if !word_before && chars.get(i + 1) == Some(&'\'') => {
                out.push(c);
                i = copy_quoted(&chars, i + 1, '\'', true, &mut out);
            }
            '\'' | '"' => i = copy_quoted(&chars, i, c, false, &mut out),
            '$' if !word_before => match dollar_tag(&chars, i) {
                Some(tag_len) => {
                    let tag = &chars[i..i + tag_len];
                    let body_end = (i + tag_len..chars.len())
                        .find(|&j| chars[j..].starts_with(tag))
                        .map_or(chars.len(), |j| j + tag_len);
                    out.extend(&chars[i..body_end]);
                    i = body_end;
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p + 1);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = (i + 3..chars.len())
                    .find(|&j| chars[j - 1] == '*' && chars[j] == '/')
                    .map_or(chars.len(), |j| j + 1);
                out.extend(&chars[i..end]);
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Copies a quoted run starting at the opening quote and returns the index
/// after the closing one. A doubled quote stays inside; with `backslash`, so
/// does any escaped character.
fn copy_quoted(chars: &[char], start: usize, quote: char, backslash: bool, out: &mut String) -> usize {
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if backslash && c == '\\' {
            if let Some(&next) = chars.get(i) {
                out.push(next);
                i += 1;
            }
        } else if c == quote {
            if chars.get(i) == Some(&quote) {
                out.push(quote);
                i += 1;
            } else {
                break;
            }
        }
    }
    i
}

/// Length of a `$tag$` opener at `start`, including both dollars. Tags follow
/// identifier rules, so `$1` is a positional parameter and not a tag.
fn dollar_tag(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if let Some(&first) = chars.get(i) {
        if first.is_ascii_digit() {
            return None;
        }
    }
    while let Some(&c) = chars.get(i) {
        if c == '$' {
            return Some(i - start + 1);
        }
        if !(c.is_alphanumeric() || c == '_') {
            return None;
        }
        i += 1;
    }
    None
}

struct PgRowStream {
    inner: Pin<Box<tokio_postgres::RowStream>>,
}

impl Stream for PgRowStream {
    type Item = DbalResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => Poll::Ready(Some(decode_row(&row))),
            Poll::Ready(Some(Err(e))) => {
                log_error(&e);
                Poll::Ready(Some(Err(DbalError::query(e))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn decode_row(row: &tokio_postgres::Row) -> DbalResult<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, idx, column.type_())
            .map_err(|e| DbalError::decode(column.name(), e))?;
        out.push(column.name(), value);
    }
    Ok(out)
}

fn decode_cell(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<Value, String> {
    fn get<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> Result<Option<T>, String>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
    }

    let value: Value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.into(),
        Type::CHAR => get::<i8>(row, idx)?.into(),
        Type::INT2 => get::<i16>(row, idx)?.into(),
        Type::INT4 => get::<i32>(row, idx)?.into(),
        Type::INT8 => get::<i64>(row, idx)?.into(),
        Type::OID => get::<u32>(row, idx)?.into(),
        Type::FLOAT4 => get::<f32>(row, idx)?.into(),
        Type::FLOAT8 => get::<f64>(row, idx)?.into(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, idx)?.into()
        }
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?
            .map(|v| v.to_string())
            .into(),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(|v| v.to_string()).into(),
        Type::DATE => get::<chrono::NaiveDate>(row, idx)?
            .map(|v| v.to_string())
            .into(),
        Type::TIME => get::<chrono::NaiveTime>(row, idx)?
            .map(|v| v.to_string())
            .into(),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx)?
            .map(|v| v.to_string())
            .into(),
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx)?
            .map(|v| v.to_rfc3339())
            .into(),
        _ => return Err(format!("unsupported column type: {ty}")),
    };
    Ok(value)
}

/// Binds by the declared parameter type. A value that cannot represent
/// that type is an error, never a reinterpretation of its bytes.
impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => bool_to_sql(*b, ty, out),
            Value::Int(i) => int_to_sql(*i, ty, out),
            Value::Float(f) => float_to_sql(*f, ty, out),
            Value::Text(s) => text_to_sql(s, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

type SqlResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

fn mismatch(kind: &str, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot bind {kind} value to parameter of type {ty}").into()
}

fn bool_to_sql(b: bool, ty: &Type, out: &mut BytesMut) -> SqlResult {
    if <bool as ToSql>::accepts(ty) {
        b.to_sql(ty, out)
    } else if <String as ToSql>::accepts(ty) {
        b.to_string().to_sql(ty, out)
    } else {
        Err(mismatch("boolean", ty))
    }
}

fn int_to_sql(i: i64, ty: &Type, out: &mut BytesMut) -> SqlResult {
    match *ty {
        Type::CHAR => i8::try_from(i)?.to_sql(ty, out),
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::OID => u32::try_from(i)?.to_sql(ty, out),
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::BOOL => (i != 0).to_sql(ty, out),
        _ if <i64 as ToSql>::accepts(ty) => i.to_sql(ty, out),
        _ if <String as ToSql>::accepts(ty) => i.to_string().to_sql(ty, out),
        _ => Err(mismatch("integer", ty)),
    }
}

// i64::MAX is not exactly representable; 2^63 is the first value out of range.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn float_to_sql(f: f64, ty: &Type, out: &mut BytesMut) -> SqlResult {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::CHAR | Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            if f.fract() != 0.0 || !(-I64_UPPER_BOUND..I64_UPPER_BOUND).contains(&f) {
                return Err(format!("float {f} does not fit integer parameter of type {ty}").into());
            }
            int_to_sql(f as i64, ty, out)
        }
        _ if <f64 as ToSql>::accepts(ty) => f.to_sql(ty, out),
        _ if <String as ToSql>::accepts(ty) => f.to_string().to_sql(ty, out),
        _ => Err(mismatch("float", ty)),
    }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> SqlResult {
    match *ty {
        Type::BOOL => s.parse::<bool>()?.to_sql(ty, out),
        Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
        Type::OID => s.trim().parse::<u32>()?.to_sql(ty, out),
        Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::UUID => s.parse::<uuid::Uuid>()?.to_sql(ty, out),
        Type::DATE => s.parse::<chrono::NaiveDate>()?.to_sql(ty, out),
        Type::TIME => s.parse::<chrono::NaiveTime>()?.to_sql(ty, out),
        Type::TIMESTAMP => parse_naive_datetime(s)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(s)?.to_sql(ty, out),
        _ if <&str as ToSql>::accepts(ty) => s.to_sql(ty, out),
        _ => Err(mismatch("text", ty)),
    }
}

fn parse_naive_datetime(s: &str) -> Result<chrono::NaiveDateTime, chrono::ParseError> {
    s.parse::<chrono::NaiveDateTime>()
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
}
