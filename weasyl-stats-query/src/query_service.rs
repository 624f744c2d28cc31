//! Query dispatch: registry lookup, cache check, producer run, write-through

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use weasyl_stats_core::{serialize_rows, AggregateStore, StatsError, StatsResult};

use crate::cache::{ResultCache, DEFAULT_TTL};
use crate::metrics::{ProducerTimer, QueryMetricsCollector};
use crate::registry::QueryRegistry;

/// Default bound on a single producer run
pub const DEFAULT_PRODUCER_TIMEOUT: Duration = Duration::from_secs(120);

/// What a request for a named query resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// No name given, or the name is not registered
    BadQuery,
    /// Served from a fresh cache entry
    Cached(Value),
    /// Freshly produced and written to the cache
    Produced(Value),
}

impl QueryOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, QueryOutcome::Cached(_))
    }

    /// JSON body sent to the client
    pub fn into_body(self) -> Value {
        match self {
            QueryOutcome::BadQuery => json!({ "error": "bad query" }),
            QueryOutcome::Cached(result) | QueryOutcome::Produced(result) => {
                json!({ "result": result })
            }
        }
    }
}

pub struct QueryService {
    registry: QueryRegistry,
    cache: ResultCache,
    store: Arc<dyn AggregateStore>,
    metrics: Arc<QueryMetricsCollector>,
    ttl: Duration,
    producer_timeout: Duration,
}

impl QueryService {
    pub fn new(
        registry: QueryRegistry,
        store: Arc<dyn AggregateStore>,
        metrics: Arc<QueryMetricsCollector>,
    ) -> Self {
        info!(
            "Query service initialized with {} named queries",
            registry.len()
        );
        debug!("Registered queries: {}", registry.names().join(", "));
        Self {
            registry,
            cache: ResultCache::new(),
            store,
            metrics,
            ttl: DEFAULT_TTL,
            producer_timeout: DEFAULT_PRODUCER_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_producer_timeout(mut self, timeout: Duration) -> Self {
        self.producer_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Resolve a request for `name`.
    ///
    /// A fresh cache entry is answered without touching the producer. On a
    /// miss the producer runs once for this request; its rows are serialized
    /// and only then written to the cache, so a failed run or an
    /// unserializable result leaves the previous entry in place.
    pub async fn execute(&self, name: Option<&str>) -> StatsResult<QueryOutcome> {
        self.metrics.record_request();

        let Some((name, producer)) = name
            .filter(|name| !name.is_empty())
            .and_then(|name| self.registry.lookup(name).map(|p| (name, p)))
        else {
            warn!("Bad query: {:?}", name);
            self.metrics.record_bad_query();
            return Ok(QueryOutcome::BadQuery);
        };

        let now = tokio::time::Instant::now();
        if let Some(entry) = self.cache.get(name) {
            if entry.is_fresh(self.ttl, now) {
                debug!("Cache hit for query: {}", name);
                self.metrics.record_cache_hit();
                let result = serialize_rows(&entry.value)?;
                return Ok(QueryOutcome::Cached(result));
            }
            debug!("Cache entry for {} is stale", name);
        } else {
            debug!("Cache miss for query: {}", name);
        }
        self.metrics.record_cache_miss();

        let timer = ProducerTimer::start();
        let work = producer.produce(&*self.store);
        let produced = match tokio::time::timeout(self.producer_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(StatsError::timeout(self.producer_timeout.as_millis() as u64)),
        };

        let rows = match produced {
            Ok(rows) => rows,
            Err(err) => {
                error!("Producer for {} failed: {}", name, err);
                self.metrics.record_error();
                return Err(err);
            }
        };

        let result = match serialize_rows(&rows) {
            Ok(result) => result,
            Err(err) => {
                error!("Result of {} could not be serialized: {}", name, err);
                self.metrics.record_error();
                return Err(err);
            }
        };

        info!(
            "Produced {} rows for {} ({}) in {:?}",
            rows.len(),
            name,
            producer.kind(),
            timer.elapsed()
        );
        timer.finish(&self.metrics, rows.len());
        // The reply body is complete; the swap below cannot fail or touch it.
        self.cache.put(name, rows);

        Ok(QueryOutcome::Produced(result))
    }
}
