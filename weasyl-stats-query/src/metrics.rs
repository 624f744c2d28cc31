//! Metrics collection and reporting for the query service

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Thread-safe metrics collector for the query service
#[derive(Debug)]
pub struct QueryMetricsCollector {
    /// Requests received on `/query`
    pub requests_total: AtomicU64,

    /// Requests answered with `bad query`
    pub bad_queries_total: AtomicU64,

    /// Cache hits
    pub cache_hits_total: AtomicU64,

    /// Cache misses (absent or stale entry)
    pub cache_misses_total: AtomicU64,

    /// Successful producer runs
    pub producer_runs_total: AtomicU64,

    /// Failed producer runs, timeouts and serialization failures included
    pub errors_total: AtomicU64,

    /// Total rows produced
    pub rows_produced_total: AtomicU64,

    /// Total producer execution time
    pub producer_time_total_ms: AtomicU64,

    /// Service start time
    start_time: Instant,
}

impl Default for QueryMetricsCollector {
    fn default() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            bad_queries_total: AtomicU64::new(0),
            cache_hits_total: AtomicU64::new(0),
            cache_misses_total: AtomicU64::new(0),
            producer_runs_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            rows_produced_total: AtomicU64::new(0),
            producer_time_total_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl QueryMetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bad_query(&self) {
        self.bad_queries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed producer run
    pub fn record_producer_run(&self, duration: Duration, rows_produced: usize) {
        self.producer_runs_total.fetch_add(1, Ordering::Relaxed);
        self.rows_produced_total
            .fetch_add(rows_produced as u64, Ordering::Relaxed);
        self.producer_time_total_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> QueryMetricsSnapshot {
        let runs = self.producer_runs_total.load(Ordering::Relaxed);
        let total_time = self.producer_time_total_ms.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits_total.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses_total.load(Ordering::Relaxed);

        QueryMetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            bad_queries_total: self.bad_queries_total.load(Ordering::Relaxed),
            cache_hits_total: cache_hits,
            cache_misses_total: cache_misses,
            producer_runs_total: runs,
            errors_total: self.errors_total.load(Ordering::Relaxed),
            rows_produced_total: self.rows_produced_total.load(Ordering::Relaxed),
            producer_time_total_ms: total_time,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            avg_producer_time_ms: if runs > 0 {
                total_time as f64 / runs as f64
            } else {
                0.0
            },
            cache_hit_rate: if cache_hits + cache_misses > 0 {
                cache_hits as f64 / (cache_hits + cache_misses) as f64
            } else {
                0.0
            },
        }
    }

    /// Generate Prometheus format metrics
    pub fn prometheus_format(&self) -> String {
        let snapshot = self.snapshot();

        format!(
            "# HELP weasyl_stats_requests_total Total number of query requests\n\
             # TYPE weasyl_stats_requests_total counter\n\
             weasyl_stats_requests_total {}\n\
             \n\
             # HELP weasyl_stats_bad_queries_total Requests naming no registered query\n\
             # TYPE weasyl_stats_bad_queries_total counter\n\
             weasyl_stats_bad_queries_total {}\n\
             \n\
             # HELP weasyl_stats_cache_hits_total Total number of cache hits\n\
             # TYPE weasyl_stats_cache_hits_total counter\n\
             weasyl_stats_cache_hits_total {}\n\
             \n\
             # HELP weasyl_stats_cache_misses_total Total number of cache misses\n\
             # TYPE weasyl_stats_cache_misses_total counter\n\
             weasyl_stats_cache_misses_total {}\n\
             \n\
             # HELP weasyl_stats_producer_runs_total Total number of successful producer runs\n\
             # TYPE weasyl_stats_producer_runs_total counter\n\
             weasyl_stats_producer_runs_total {}\n\
             \n\
             # HELP weasyl_stats_errors_total Total number of failed producer runs\n\
             # TYPE weasyl_stats_errors_total counter\n\
             weasyl_stats_errors_total {}\n\
             \n\
             # HELP weasyl_stats_rows_produced_total Total number of rows produced\n\
             # TYPE weasyl_stats_rows_produced_total counter\n\
             weasyl_stats_rows_produced_total {}\n\
             \n\
             # HELP weasyl_stats_producer_time_total_ms Total producer execution time in milliseconds\n\
             # TYPE weasyl_stats_producer_time_total_ms counter\n\
             weasyl_stats_producer_time_total_ms {}\n\
             \n\
             # HELP weasyl_stats_uptime_seconds Service uptime in seconds\n\
             # TYPE weasyl_stats_uptime_seconds gauge\n\
             weasyl_stats_uptime_seconds {}\n\
             \n\
             # HELP weasyl_stats_avg_producer_time_ms Average producer execution time in milliseconds\n\
             # TYPE weasyl_stats_avg_producer_time_ms gauge\n\
             weasyl_stats_avg_producer_time_ms {}\n\
             \n\
             # HELP weasyl_stats_cache_hit_rate Cache hit rate (0.0 to 1.0)\n\
             # TYPE weasyl_stats_cache_hit_rate gauge\n\
             weasyl_stats_cache_hit_rate {}\n",
            snapshot.requests_total,
            snapshot.bad_queries_total,
            snapshot.cache_hits_total,
            snapshot.cache_misses_total,
            snapshot.producer_runs_total,
            snapshot.errors_total,
            snapshot.rows_produced_total,
            snapshot.producer_time_total_ms,
            snapshot.uptime_seconds,
            snapshot.avg_producer_time_ms,
            snapshot.cache_hit_rate
        )
    }
}

/// Snapshot of query metrics at a point in time
#[derive(Debug, Clone)]
pub struct QueryMetricsSnapshot {
    pub requests_total: u64,
    pub bad_queries_total: u64,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub producer_runs_total: u64,
    pub errors_total: u64,
    pub rows_produced_total: u64,
    pub producer_time_total_ms: u64,
    pub uptime_seconds: u64,
    pub avg_producer_time_ms: f64,
    pub cache_hit_rate: f64,
}

/// Helper for timing producer runs
pub struct ProducerTimer {
    start: Instant,
}

impl ProducerTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish timing and record to metrics collector
    pub fn finish(self, collector: &QueryMetricsCollector, rows_produced: usize) {
        collector.record_producer_run(self.elapsed(), rows_produced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_query_metrics_collector() {
        let collector = QueryMetricsCollector::new();

        collector.record_request();
        collector.record_producer_run(Duration::from_millis(100), 12);
        collector.record_cache_hit();
        collector.record_error();
        collector.record_bad_query();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.requests_total, 1);
        assert_eq!(snapshot.producer_runs_total, 1);
        assert_eq!(snapshot.errors_total, 1);
        assert_eq!(snapshot.bad_queries_total, 1);
        assert_eq!(snapshot.cache_hits_total, 1);
        assert_eq!(snapshot.rows_produced_total, 12);
        assert_eq!(snapshot.avg_producer_time_ms, 100.0);
    }

    #[test]
    fn test_prometheus_format() {
        let collector = QueryMetricsCollector::new();
        collector.record_producer_run(Duration::from_millis(250), 500);

        let metrics = collector.prometheus_format();
        assert!(metrics.contains("weasyl_stats_producer_runs_total 1"));
        assert!(metrics.contains("weasyl_stats_rows_produced_total 500"));
        assert!(metrics.contains("# HELP"));
        assert!(metrics.contains("# TYPE"));
    }

    #[test]
    fn test_cache_hit_rate() {
        let collector = QueryMetricsCollector::new();

        collector.record_cache_hit();
        collector.record_cache_hit();
        collector.record_cache_miss();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.cache_hit_rate, 2.0 / 3.0);
    }

    #[test]
    fn test_producer_timer() {
        let collector = QueryMetricsCollector::new();
        let timer = ProducerTimer::start();

        thread::sleep(Duration::from_millis(10));
        timer.finish(&collector, 100);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.producer_runs_total, 1);
        assert_eq!(snapshot.rows_produced_total, 100);
        assert!(snapshot.avg_producer_time_ms >= 10.0);
    }
}
