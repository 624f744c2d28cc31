//! In-memory store and analytics doubles for unit testing
//!
//! These let the query service and its HTTP layer be exercised without a
//! database or network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::analytics::{AnalyticsSource, PageUrlRecord};
use crate::error::{StatsError, StatsResult};
use crate::scalar::Row;
use crate::store::AggregateStore;

/// Mock aggregate store answering from canned result sets
#[derive(Debug, Default)]
pub struct MockStore {
    results: Mutex<HashMap<String, Vec<Row>>>,
    favorites: Mutex<HashMap<i64, i64>>,
    favorite_lookups: Mutex<Vec<Vec<i64>>>,
    queries_run: AtomicU64,
    delay: Option<Duration>,
    simulate_errors: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with `rows`
    pub fn with_result(self, sql: impl Into<String>, rows: Vec<Row>) -> Self {
        self.results.lock().insert(sql.into(), rows);
        self
    }

    /// Seed the favorite count table
    pub fn with_favorites<I>(self, favorites: I) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        self.favorites.lock().extend(favorites);
        self
    }

    /// Sleep this long before answering any call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call with a database error
    pub fn with_error_simulation(mut self) -> Self {
        self.simulate_errors = true;
        self
    }

    /// Replace the canned rows for `sql`
    pub fn set_result(&self, sql: impl Into<String>, rows: Vec<Row>) {
        self.results.lock().insert(sql.into(), rows);
    }

    /// Number of calls made so far, both kinds
    pub fn query_count(&self) -> u64 {
        self.queries_run.load(Ordering::SeqCst)
    }

    /// Id lists passed to `favorite_counts`, in call order
    pub fn favorite_lookups(&self) -> Vec<Vec<i64>> {
        self.favorite_lookups.lock().clone()
    }

    async fn begin_call(&self) -> StatsResult<()> {
        self.queries_run.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.simulate_errors {
            return Err(StatsError::database("simulated database failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl AggregateStore for MockStore {
    async fn run_query(&self, sql: &str) -> StatsResult<Vec<Row>> {
        self.begin_call().await?;
        trace!("Mock store answering query of {} bytes", sql.len());

        self.results
            .lock()
            .get(sql)
            .cloned()
            .ok_or_else(|| StatsError::database("relation does not exist"))
    }

    async fn favorite_counts(&self, submission_ids: &[i64]) -> StatsResult<Vec<(i64, i64)>> {
        self.begin_call().await?;
        self.favorite_lookups.lock().push(submission_ids.to_vec());

        let favorites = self.favorites.lock();
        Ok(submission_ids
            .iter()
            .filter_map(|id| favorites.get(id).map(|count| (*id, *count)))
            .collect())
    }
}

/// Mock analytics API returning a fixed report
#[derive(Debug, Default)]
pub struct MockAnalytics {
    records: Vec<PageUrlRecord>,
    calls: AtomicU64,
    simulate_errors: bool,
}

impl MockAnalytics {
    pub fn new(records: Vec<PageUrlRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Fail every call with an analytics error
    pub fn with_error_simulation(mut self) -> Self {
        self.simulate_errors = true;
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalyticsSource for MockAnalytics {
    async fn page_urls(&self) -> StatsResult<Vec<PageUrlRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.simulate_errors {
            return Err(StatsError::analytics("503 Service Unavailable"));
        }
        Ok(self.records.clone())
    }
}
