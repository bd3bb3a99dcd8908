//! Consumers of the aggregator's output: the idempotent relational upsert
//! and the point-in-time parquet snapshot.

mod postgres;
mod snapshot;

pub use postgres::PgSink;
pub use snapshot::ParquetExport;

use std::future::Future;

use crate::error::Result;
use crate::model::MatchRecord;

/// Idempotent relational writer. Insert when the identifier is absent,
/// otherwise update every non-identifier field, leaving `match_id` and the
/// creation timestamp untouched. Safe to invoke with the same batch any
/// number of times, and concurrently for different identifiers.
pub trait MatchSink {
    fn upsert_batch(&self, rows: &[MatchRecord]) -> impl Future<Output = Result<usize>> + Send;
}
