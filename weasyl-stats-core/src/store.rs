//! Backing store abstraction
//!
//! The query service only needs two things from the database: run a fixed
//! aggregate query and hand back its rows, and look up favorite counts for a
//! set of submissions. Everything is read-only.

pub mod postgres;

use async_trait::async_trait;

use crate::error::StatsResult;
use crate::scalar::Row;

/// Read-only access to the aggregate data.
///
/// Implementations must be safe to share between concurrent requests; each
/// call is independent and must not depend on state left by another call.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Run one fixed aggregate query and return its rows in result order.
    async fn run_query(&self, sql: &str) -> StatsResult<Vec<Row>>;

    /// Fetch `(submission_id, favorite_count)` for every submission in
    /// `submission_ids` that has at least one favorite. Submissions without
    /// favorites are simply absent from the result.
    async fn favorite_counts(&self, submission_ids: &[i64]) -> StatsResult<Vec<(i64, i64)>>;
}
