//! Execution results.

use crate::error::DbalResult;
use crate::value::Row;
use futures_core::Stream;
use futures_core::stream::FusedStream;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Outcome of [`Connection::execute`](crate::Connection::execute).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Last generated id, for drivers that report one.
    pub insert_id: Option<u64>,
    pub affected_rows: u64,
    pub warning_count: u64,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn from_affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A forward-only, single-pass sequence of rows.
///
/// Each poll yields a row (`Some(Ok(row))`), an error (`Some(Err(_))`), or
/// completion (`None`). After an error or completion the stream is closed and
/// only yields `None`. Dropping or [`close`](ResultStream::close)-ing it
/// releases the underlying driver stream.
#[must_use]
pub struct ResultStream {
    inner: Option<Pin<Box<dyn Stream<Item = DbalResult<Row>> + Send>>>,
}

impl ResultStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DbalResult<Row>> + Send + 'static,
    {
        Self {
            inner: Some(Box::pin(stream)),
        }
    }

    /// A stream over already materialized items.
    pub fn from_results(items: Vec<DbalResult<Row>>) -> Self {
        Self::new(IterStream {
            items: items.into_iter(),
        })
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::from_results(rows.into_iter().map(Ok).collect())
    }

    /// Stop reading. Idempotent.
    pub fn close(&mut self) {
        self.inner = None;
    }

    pub fn is_readable(&self) -> bool {
        self.inner.is_some()
    }

    /// Drain the stream, failing on the first error.
    pub async fn collect_rows(mut self) -> DbalResult<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(item) = std::future::poll_fn(|cx| Pin::new(&mut self).poll_next(cx)).await {
            rows.push(item?);
        }
        Ok(rows)
    }
}

impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("readable", &self.is_readable())
            .finish()
    }
}

impl Stream for ResultStream {
    type Item = DbalResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => Poll::Ready(Some(Ok(row))),
            Poll::Ready(Some(Err(e))) => {
                self.inner = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FusedStream for ResultStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}

struct IterStream {
    items: std::vec::IntoIter<DbalResult<Row>>,
}

impl Stream for IterStream {
    type Item = DbalResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.items.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbalError;
    use futures_util::StreamExt;

    fn row(id: i64) -> Row {
        Row::new().with("id", id)
    }

    #[tokio::test]
    async fn yields_rows_then_closes() {
        let mut stream = ResultStream::from_rows(vec![row(1), row(2)]);
        assert!(stream.is_readable());
        assert_eq!(stream.next().await.unwrap().unwrap(), row(1));
        assert_eq!(stream.next().await.unwrap().unwrap(), row(2));
        assert!(stream.next().await.is_none());
        assert!(!stream.is_readable());
        assert!(stream.is_terminated());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn error_closes_stream() {
        let mut stream = ResultStream::from_results(vec![
            Ok(row(1)),
            Err(DbalError::Other("boom".into())),
            Ok(row(2)),
        ]);
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(!stream.is_readable());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut stream = ResultStream::from_rows(vec![row(1)]);
        stream.close();
        stream.close();
        assert!(!stream.is_readable());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn collect_rows_stops_at_error() {
        let rows = ResultStream::from_rows(vec![row(1), row(2)])
            .collect_rows()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let err = ResultStream::from_results(vec![Ok(row(1)), Err(DbalError::Closed)])
            .collect_rows()
            .await
            .unwrap_err();
        assert!(matches!(err, DbalError::Closed));
    }

    #[test]
    fn query_result_serializes_camel_case() {
        let result = QueryResult {
            rows: vec![row(7)],
            insert_id: Some(7),
            affected_rows: 1,
            warning_count: 0,
        };
        assert_eq!(result.len(), 1);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({
                "rows": [{"id": 7}],
                "insertId": 7,
                "affectedRows": 1,
                "warningCount": 0
            })
        );
    }
}
