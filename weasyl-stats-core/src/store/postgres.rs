//! PostgreSQL implementation of [`AggregateStore`]
//!
//! Connections come from a deadpool pool. Every connection is opened with a
//! server-side `statement_timeout` and `default_transaction_read_only`, so a
//! slow aggregate cannot hang a request forever and nothing here can write.
//!
//! Sessions run in UTC. The aggregates bucket with `date_trunc` in the session
//! zone and `timestamptz` values arrive as UTC instants, so only a UTC session
//! makes a day bucket print as midnight.

use std::error::Error as StdError;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use super::AggregateStore;
use crate::error::{StatsError, StatsResult};
use crate::scalar::{Row, Scalar};

/// Favorite counts for a set of submissions, one row per favorited submission.
const FAVORITE_COUNTS_SQL: &str = "
    SELECT targetid::int8 submitid,
           count(*)       favorites
    FROM   favorite
    WHERE  type = 's'
           AND targetid = ANY($1::int8[])
    GROUP  BY targetid
";

/// Connection settings for the backing database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_dbname", alias = "database")]
    pub dbname: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Timeout for opening a connection and for waiting on the pool.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Server-side statement timeout applied to every query.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "weasyl".to_string()
}

fn default_user() -> String {
    "weasyl".to_string()
}

fn default_max_connections() -> usize {
    4
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_statement_timeout_ms() -> u64 {
    60_000
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: None,
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

/// Aggregate store backed by a PostgreSQL connection pool.
pub struct PostgresStore {
    pool: Pool,
    config: PostgresConfig,
}

impl Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("dbname", &self.config.dbname)
            .field("pool_status", &self.pool.status())
            .finish_non_exhaustive()
    }
}

impl PostgresStore {
    /// Create the pool and check that one connection can be opened.
    pub async fn new(config: PostgresConfig) -> StatsResult<Self> {
        let pool = Self::create_pool(&config)?;

        // Verify connectivity
        let client = pool.get().await?;
        drop(client);

        info!(
            "Connected to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.dbname
        );

        Ok(Self { pool, config })
    }

    /// Driver settings for one pooled connection.
    fn connection_config(config: &PostgresConfig) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .dbname(&config.dbname)
            .user(&config.user)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .options(&session_options(config));
        if let Some(password) = &config.password {
            pg.password(password);
        }
        pg
    }

    fn create_pool(config: &PostgresConfig) -> StatsResult<Pool> {
        let manager = Manager::from_config(
            Self::connection_config(config),
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(Duration::from_millis(config.connect_timeout_ms)))
            .build()
            .map_err(|e| StatsError::connection(format!("Failed to create pool: {}", e)))
    }
}

/// Server settings applied at connection start.
fn session_options(config: &PostgresConfig) -> String {
    format!(
        "-c statement_timeout={} -c default_transaction_read_only=on -c TimeZone=UTC",
        config.statement_timeout_ms
    )
}

#[async_trait]
impl AggregateStore for PostgresStore {
    async fn run_query(&self, sql: &str) -> StatsResult<Vec<Row>> {
        let client = self.pool.get().await?;
        let rows = client.query(sql, &[]).await?;
        debug!("Aggregate query returned {} rows", rows.len());

        rows.iter().map(convert_row).collect()
    }

    async fn favorite_counts(&self, submission_ids: &[i64]) -> StatsResult<Vec<(i64, i64)>> {
        let client = self.pool.get().await?;
        let rows = client.query(FAVORITE_COUNTS_SQL, &[&submission_ids]).await?;

        rows.iter()
            .map(|row| -> StatsResult<(i64, i64)> {
                Ok((row.try_get(0)?, row.try_get(1)?))
            })
            .collect()
    }
}

/// Convert a driver row into the positional row model.
fn convert_row(row: &tokio_postgres::Row) -> StatsResult<Row> {
    (0..row.len()).map(|idx| column_scalar(row, idx)).collect()
}

fn column_scalar(row: &tokio_postgres::Row, idx: usize) -> StatsResult<Scalar> {
    let ty = row.columns()[idx].type_();

    let scalar: Scalar = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(i64::from).into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(i64::from).into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.into(),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(f64::from).into(),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.into(),
        Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx)?.into(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(idx)?.into()
        }
        Type::TIMESTAMP => row.try_get::<_, Option<NaiveDateTime>>(idx)?.into(),
        // Delivered as a UTC instant; the session is pinned to UTC, so this is
        // also the wall clock `date_trunc` bucketed on.
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|ts| ts.fixed_offset())
            .into(),
        Type::INTERVAL => row
            .try_get::<_, Option<PgInterval>>(idx)?
            .map(|interval| interval.to_time_delta())
            .into(),
        _ => match row.try_get::<_, Option<AnyValue>>(idx)? {
            None => Scalar::Null,
            Some(AnyValue) => Scalar::Unsupported {
                type_name: ty.name().to_string(),
            },
        },
    };

    Ok(scalar)
}

/// Binary form of a PostgreSQL `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgInterval {
    pub months: i32,
    pub days: i32,
    pub microseconds: i64,
}

impl PgInterval {
    /// Flatten to an exact duration. Calendar parts are approximated the
    /// conventional way: a year is 365 days, a remaining month 30 days.
    pub fn to_time_delta(self) -> TimeDelta {
        let years = i64::from(self.months / 12);
        let months = i64::from(self.months % 12);
        let days = years * 365 + months * 30 + i64::from(self.days);

        TimeDelta::days(days) + TimeDelta::microseconds(self.microseconds)
    }
}

impl<'a> FromSql<'a> for PgInterval {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        if raw.len() != 16 {
            return Err(format!("invalid interval length: {}", raw.len()).into());
        }

        Ok(Self {
            microseconds: i64::from_be_bytes(raw[0..8].try_into()?),
            days: i32::from_be_bytes(raw[8..12].try_into()?),
            months: i32::from_be_bytes(raw[12..16].try_into()?),
        })
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }
}

/// Accepts any column type; used to tell NULL apart from an unsupported value.
struct AnyValue;

impl<'a> FromSql<'a> for AnyValue {
    fn from_sql(_ty: &Type, _raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(AnyValue)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
