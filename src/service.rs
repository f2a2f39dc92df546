//! Log retrieval by recency or time range
//!
//! ```ignore
//! let service = LogQueryService::new(Arc::new(client), "logs", "logging");
//!
//! // three newest INFO records of one building, oldest first
//! let constraints = Constraints::new().tag("building", id).tag("level", "INFO");
//! let mut records = service.fetch_recent(3, constraints).await?;
//! while let Some(record) = records.try_next().await? {
//!     println!("{} {}", record.time, record.message);
//! }
//! ```

use crate::client::{QueryEngine, RowStream};
use crate::error::Result;
use crate::query::{FilterExpression, FilterNode, FluxQuery, Operator, TagConstraint, Timestamp};
use crate::record::LogRecord;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

/// Records of one query, decoded lazily. Dropping the stream closes the
/// underlying response.
pub type LogStream = BoxStream<'static, Result<LogRecord>>;

/// Optional query constraints: ad hoc tag pairs and/or an explicit filter
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    tags: TagConstraint,
    filter: Option<FilterExpression>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key == value`
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }

    /// Require an explicit filter expression, ANDed with any tag pairs
    pub fn filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.filter.is_none()
    }

    /// Normalise into a single expression
    ///
    /// Tag pairs become one AND-ed mapping; with an explicit filter as
    /// well, both become children of a new AND node.
    pub fn into_expression(self) -> Option<FilterExpression> {
        match (self.tags.is_empty(), self.filter) {
            (true, None) => None,
            (false, None) => Some(FilterExpression::tags(Operator::And, self.tags)),
            (true, Some(filter)) => Some(filter),
            (false, Some(filter)) => Some(FilterExpression::and([
                FilterNode::Leaf(self.tags),
                FilterNode::Group(filter),
            ])),
        }
    }
}

impl From<TagConstraint> for Constraints {
    fn from(tags: TagConstraint) -> Self {
        Self { tags, filter: None }
    }
}

impl From<FilterExpression> for Constraints {
    fn from(filter: FilterExpression) -> Self {
        Self {
            tags: TagConstraint::new(),
            filter: Some(filter),
        }
    }
}

/// Fetches log records of one measurement in one bucket
#[derive(Clone)]
pub struct LogQueryService {
    engine: Arc<dyn QueryEngine>,
    bucket: String,
    measurement: String,
}

impl LogQueryService {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        bucket: impl Into<String>,
        measurement: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            bucket: bucket.into(),
            measurement: measurement.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// The `limit` most recent records matching `constraints`, oldest first
    pub async fn fetch_recent(
        &self,
        limit: usize,
        constraints: impl Into<Constraints>,
    ) -> Result<LogStream> {
        let query = FluxQuery::recent(&self.bucket, &self.measurement, limit)
            .with_filter(constraints.into().into_expression());
        self.execute(&query.render()?).await
    }

    /// The single most recent record matching `constraints`
    pub async fn fetch_last(&self, constraints: impl Into<Constraints>) -> Result<Option<LogRecord>> {
        let mut records = self.fetch_recent(1, constraints).await?;
        records.next().await.transpose()
    }

    /// Records with `start <= time < end`, oldest first
    ///
    /// Both bounds must carry a timezone; a naive bound fails before any
    /// request is sent. `end` defaults to the server's current time. An
    /// empty or inverted window yields an empty stream.
    pub async fn fetch_by_time(
        &self,
        start: impl Into<Timestamp>,
        end: Option<Timestamp>,
        constraints: impl Into<Constraints>,
    ) -> Result<LogStream> {
        let start = start.into().require_zoned("start")?;
        let end = end.map(|end| end.require_zoned("end")).transpose()?;

        let query = FluxQuery::range(&self.bucket, &self.measurement, start, end)
            .with_filter(constraints.into().into_expression());
        let text = query.render()?;

        if matches!(end, Some(end) if end <= start) {
            tracing::debug!(%start, ?end, "Empty time window, skipping query");
            return Ok(stream::empty().boxed());
        }

        self.execute(&text).await
    }

    /// Run raw Flux text and map every row to a [`LogRecord`]
    pub async fn query(&self, flux: &str) -> Result<LogStream> {
        self.execute(flux).await
    }

    async fn execute(&self, flux: &str) -> Result<LogStream> {
        let rows = self.engine.query(flux).await?;
        Ok(map_rows(rows))
    }
}

/// Map rows to records, ending the stream after the first error
fn map_rows(rows: RowStream) -> LogStream {
    rows.scan(false, |failed, row| {
        if *failed {
            return future::ready(None);
        }
        let record = row.and_then(LogRecord::from_row);
        *failed = record.is_err();
        future::ready(Some(record))
    })
    .boxed()
}
