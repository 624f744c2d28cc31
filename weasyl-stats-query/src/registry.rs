//! Named query registry
//!
//! Maps each public query name to the producer that computes it. The
//! registry is assembled once at startup and never changes afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use weasyl_stats_core::{AggregateStore, AnalyticsSource, Row, StatsResult};

use crate::composite::FavoritesVsViewTime;
use crate::queries::STORE_QUERIES;

/// A producer computed by custom code rather than a single store query.
#[async_trait]
pub trait CompositeHandler: Send + Sync {
    async fn produce(&self) -> StatsResult<Vec<Row>>;
}

/// An aggregate executed directly against the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub sql: String,
}

/// Anything that can yield a named query's rows.
#[derive(Clone)]
pub enum Producer {
    Store(StoreQuery),
    Composite(Arc<dyn CompositeHandler>),
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Producer::Store(query) => f.debug_tuple("Store").field(query).finish(),
            Producer::Composite(_) => f.write_str("Composite(..)"),
        }
    }
}

impl Producer {
    /// Run the producer. Store queries go to `store`; composite handlers
    /// bring their own upstreams.
    pub async fn produce(&self, store: &dyn AggregateStore) -> StatsResult<Vec<Row>> {
        match self {
            Producer::Store(query) => store.run_query(&query.sql).await,
            Producer::Composite(handler) => handler.produce().await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Producer::Store(_) => "store",
            Producer::Composite(_) => "composite",
        }
    }
}

/// Immutable name → producer mapping
#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    producers: HashMap<String, Producer>,
}

impl QueryRegistry {
    pub fn builder() -> QueryRegistryBuilder {
        QueryRegistryBuilder::default()
    }

    /// The registry the service runs with: every fixed aggregate plus the
    /// `favorites_vs_view_time` composite.
    pub fn standard(store: Arc<dyn AggregateStore>, analytics: Arc<dyn AnalyticsSource>) -> Self {
        let mut builder = Self::builder();
        for (name, sql) in STORE_QUERIES {
            builder = builder.store_query(*name, *sql);
        }
        builder
            .composite(
                FavoritesVsViewTime::NAME,
                Arc::new(FavoritesVsViewTime::new(store, analytics)),
            )
            .build()
    }

    pub fn lookup(&self, name: &str) -> Option<&Producer> {
        self.producers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.producers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.producers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

/// Collects registrations; composites shadow store queries of the same name
/// regardless of the order they were added in.
#[derive(Default)]
pub struct QueryRegistryBuilder {
    store_queries: HashMap<String, StoreQuery>,
    composites: HashMap<String, Arc<dyn CompositeHandler>>,
}

impl QueryRegistryBuilder {
    pub fn store_query(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.store_queries
            .insert(name.into(), StoreQuery { sql: sql.into() });
        self
    }

    pub fn composite(
        mut self,
        name: impl Into<String>,
        handler: Arc<dyn CompositeHandler>,
    ) -> Self {
        self.composites.insert(name.into(), handler);
        self
    }

    pub fn build(self) -> QueryRegistry {
        let mut producers: HashMap<String, Producer> = self
            .store_queries
            .into_iter()
            .map(|(name, query)| (name, Producer::Store(query)))
            .collect();
        producers.extend(
            self.composites
                .into_iter()
                .map(|(name, handler)| (name, Producer::Composite(handler))),
        );

        QueryRegistry { producers }
    }
}
