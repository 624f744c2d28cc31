//! # Weasyl Stats Core Library
//!
//! Shared building blocks for the stats query service:
//!
//! - **Rows**: the positional row model aggregate queries produce ([`Scalar`], [`Row`])
//! - **Serialization**: conversion of store-native values into JSON
//! - **Store**: the read-only [`AggregateStore`] abstraction and its PostgreSQL backend
//! - **Analytics**: the Piwik page view report client
//! - **Mocks**: in-memory doubles of both upstreams for tests

pub mod analytics;
pub mod error;
pub mod mock;
pub mod scalar;
pub mod serializer;
pub mod store;

// Re-export commonly used types
pub use analytics::{AnalyticsConfig, AnalyticsSource, PageUrlRecord, PiwikClient};
pub use error::{StatsError, StatsResult};
pub use scalar::{Row, Scalar};
pub use serializer::serialize_rows;
pub use store::postgres::{PostgresConfig, PostgresStore};
pub use store::AggregateStore;

/// Version information for weasyl-stats
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
