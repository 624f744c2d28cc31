//! Composite producers that blend the analytics API with the store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use weasyl_stats_core::{
    AggregateStore, AnalyticsSource, PageUrlRecord, Row, Scalar, StatsError, StatsResult,
};

use crate::registry::CompositeHandler;

/// Yesterday's average view time and visit count per submission page,
/// next to the submission's all-time favorite count.
///
/// Output rows are `[submitid, avg_time_on_page, nb_visits, favorites]`.
pub struct FavoritesVsViewTime {
    store: Arc<dyn AggregateStore>,
    analytics: Arc<dyn AnalyticsSource>,
}

impl FavoritesVsViewTime {
    pub const NAME: &'static str = "favorites_vs_view_time";

    pub fn new(store: Arc<dyn AggregateStore>, analytics: Arc<dyn AnalyticsSource>) -> Self {
        Self { store, analytics }
    }
}

#[async_trait]
impl CompositeHandler for FavoritesVsViewTime {
    async fn produce(&self) -> StatsResult<Vec<Row>> {
        let records = self.analytics.page_urls().await?;
        let submission_ids = submission_ids(&records)?;
        debug!(
            "Page URL report has {} records, {} submission pages",
            records.len(),
            submission_ids.len()
        );

        // No submission pages: answer with no rows rather than failing on an
        // empty favorites lookup. This empty result is cached like any other.
        if submission_ids.is_empty() {
            return Ok(Vec::new());
        }

        let favorites: HashMap<i64, i64> = self
            .store
            .favorite_counts(&submission_ids)
            .await?
            .into_iter()
            .collect();

        let rows = pair_rows(&records, &submission_ids, &favorites)?;
        info!("Built {} rows for {}", rows.len(), Self::NAME);
        Ok(rows)
    }
}

/// Submission ids of the records whose label is one, in report order.
fn submission_ids(records: &[PageUrlRecord]) -> StatsResult<Vec<i64>> {
    records
        .iter()
        .filter_map(PageUrlRecord::submission_id)
        .map(|label| {
            label
                .parse::<i64>()
                .map_err(|e| StatsError::malformed(format!("submission id {}: {}", label, e)))
        })
        .collect()
}

/// Pair report records with submission ids by position.
///
/// The id list is the *filtered* one while the records are the *unfiltered*
/// report, so once a non-submission record precedes a submission record the
/// metrics in a row come from a different page than its id. This matches the
/// established output of this query and is kept as-is.
fn pair_rows(
    records: &[PageUrlRecord],
    submission_ids: &[i64],
    favorites: &HashMap<i64, i64>,
) -> StatsResult<Vec<Row>> {
    records
        .iter()
        .zip(submission_ids)
        .map(|(record, &submitid)| -> StatsResult<Row> {
            Ok(vec![
                Scalar::Integer(submitid),
                required(record, "avg_time_on_page", &record.avg_time_on_page)?,
                required(record, "nb_visits", &record.nb_visits)?,
                Scalar::Integer(favorites.get(&submitid).copied().unwrap_or(0)),
            ])
        })
        .collect()
}

fn required(record: &PageUrlRecord, field: &str, value: &Option<Scalar>) -> StatsResult<Scalar> {
    match value {
        Some(value) => Ok(value.clone()),
        None => Err(StatsError::malformed(format!("record {:?} has no {}", record.label, field))),
    }
}
