//! Channel pricing statistics.
//!
//! Scans every rule row of a product in fixed-size pages and counts, per
//! channel and year, the distinct dates that have at least one rule. A date
//! with both a "base" and a "dynamic" row still counts once.

use chrono::{Datelike, NaiveDate};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::cache::GenerationToken;
use crate::db;
use crate::error::Result;
use crate::models::channel::normalize_channel_name;

use super::queries::{self, StatsRow};

/// Rows fetched per scan page.
pub const STATS_PAGE_SIZE: i64 = 1000;

/// Distinct priced-date counts, keyed by year.
pub type YearCounts = BTreeMap<i32, usize>;

/// Aggregated statistics for one product.
#[derive(Debug, Clone, Default)]
pub struct PricingStatistics {
    pub by_channel_id: HashMap<Uuid, YearCounts>,
    pub by_channel_name: HashMap<String, YearCounts>,
}

/// Best-effort date extraction from the raw stored value.
///
/// Historical rows carry `YYYY-MM-DD`, `YYYY/MM/DD`, or a full timestamp;
/// anything else is unusable and the row is skipped.
pub fn extract_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%Y/%m/%d"))
        .ok()
}

/// Streaming accumulator over stats rows, deduplicating per (channel, date).
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    seen_by_id: HashSet<(Uuid, NaiveDate)>,
    seen_by_name: HashSet<(String, NaiveDate)>,
    stats: PricingStatistics,
    skipped: usize,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one row in. `channel_names` maps channel ids to normalized
    /// display names; unknown channels fall back to their id string.
    pub fn add_row(&mut self, row: &StatsRow, channel_names: &HashMap<Uuid, String>) {
        let Some(date) = extract_date(&row.date_raw) else {
            self.skipped += 1;
            tracing::debug!(channel_id = %row.channel_id, raw = %row.date_raw, "skipping rule row with unusable date");
            return;
        };
        let year = date.year();

        if self.seen_by_id.insert((row.channel_id, date)) {
            *self
                .stats
                .by_channel_id
                .entry(row.channel_id)
                .or_default()
                .entry(year)
                .or_default() += 1;
        }

        let name = channel_names
            .get(&row.channel_id)
            .cloned()
            .unwrap_or_else(|| row.channel_id.to_string());
        if self.seen_by_name.insert((name.clone(), date)) {
            *self
                .stats
                .by_channel_name
                .entry(name)
                .or_default()
                .entry(year)
                .or_default() += 1;
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn finish(self) -> PricingStatistics {
        self.stats
    }
}

/// Aggregate statistics for a product.
///
/// When a `token` is supplied and the selection it belongs to has been
/// superseded by the time the scan finishes, the result is dropped and
/// `None` is returned so a stale load can never overwrite newer state.
pub async fn aggregate_product_stats(
    pool: &PgPool,
    product_id: Uuid,
    token: Option<&GenerationToken>,
) -> Result<Option<PricingStatistics>> {
    let channels = db::queries::get_channels(pool).await?;
    let channel_names: HashMap<Uuid, String> = channels
        .iter()
        .map(|c| (c.id, normalize_channel_name(&c.name)))
        .collect();

    let mut acc = StatsAccumulator::new();
    let mut offset = 0i64;
    loop {
        let page = queries::fetch_stats_page(pool, product_id, STATS_PAGE_SIZE, offset).await?;
        let page_len = page.len();
        for row in &page {
            acc.add_row(row, &channel_names);
        }
        if (page_len as i64) < STATS_PAGE_SIZE {
            break;
        }
        offset += STATS_PAGE_SIZE;
    }

    if let Some(token) = token {
        if !token.is_current() {
            tracing::debug!(%product_id, "dropping stale statistics result");
            return Ok(None);
        }
    }

    if acc.skipped() > 0 {
        tracing::warn!(%product_id, skipped = acc.skipped(), "statistics skipped rows with unusable dates");
    }
    Ok(Some(acc.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(channel_id: Uuid, raw: &str) -> StatsRow {
        StatsRow {
            channel_id,
            date_raw: raw.to_string(),
        }
    }

    #[test]
    fn extracts_dates_from_known_encodings() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(extract_date("2025-03-09"), Some(d));
        assert_eq!(extract_date("2025/03/09"), Some(d));
        assert_eq!(extract_date("2025-03-09 14:22:01"), Some(d));
        assert_eq!(extract_date("2025-03-09T14:22:01Z"), Some(d));
        assert_eq!(extract_date(" 2025-03-09 "), Some(d));
    }

    #[test]
    fn unusable_dates_are_none() {
        assert_eq!(extract_date(""), None);
        assert_eq!(extract_date("not a date"), None);
        assert_eq!(extract_date("2025-13-40"), None);
        assert_eq!(extract_date("09-03-2025"), None);
    }

    #[test]
    fn same_date_counts_once_across_price_types() {
        let channel = Uuid::new_v4();
        let names = HashMap::from([(channel, "naver".to_string())]);

        let mut acc = StatsAccumulator::new();
        // A "base" and a "dynamic" row for the same channel and day
        acc.add_row(&row(channel, "2025-06-01"), &names);
        acc.add_row(&row(channel, "2025-06-01"), &names);
        acc.add_row(&row(channel, "2025-06-02"), &names);

        let stats = acc.finish();
        assert_eq!(stats.by_channel_id[&channel][&2025], 2);
        assert_eq!(stats.by_channel_name["naver"][&2025], 2);
    }

    #[test]
    fn counts_split_by_year_and_channel() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let names = HashMap::from([(a, "klook".to_string()), (b, "kkday".to_string())]);

        let mut acc = StatsAccumulator::new();
        acc.add_row(&row(a, "2024-12-31"), &names);
        acc.add_row(&row(a, "2025-01-01"), &names);
        acc.add_row(&row(b, "2025-01-01"), &names);

        let stats = acc.finish();
        assert_eq!(stats.by_channel_id[&a][&2024], 1);
        assert_eq!(stats.by_channel_id[&a][&2025], 1);
        assert_eq!(stats.by_channel_id[&b][&2025], 1);
        assert_eq!(stats.by_channel_name["klook"].values().sum::<usize>(), 2);
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let channel = Uuid::new_v4();
        let names = HashMap::new();

        let mut acc = StatsAccumulator::new();
        acc.add_row(&row(channel, "garbage"), &names);
        acc.add_row(&row(channel, "2025-06-01"), &names);

        assert_eq!(acc.skipped(), 1);
        let stats = acc.finish();
        assert_eq!(stats.by_channel_id[&channel][&2025], 1);
    }

    #[test]
    fn unknown_channel_falls_back_to_id_string() {
        let channel = Uuid::new_v4();
        let mut acc = StatsAccumulator::new();
        acc.add_row(&row(channel, "2025-06-01"), &HashMap::new());

        let stats = acc.finish();
        assert!(stats.by_channel_name.contains_key(&channel.to_string()));
    }
}
