// History series and chart arithmetic.
//
// Snapshots are bucketed by UTC day or month. Flows (budget values) are
// summed inside a bucket; stocks (balance-sheet values) take each item's
// latest value and carry it forward into later buckets.

use crate::entities::ValueSnapshot;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    #[default]
    Month,
}

impl Granularity {
    /// Bucket key: the UTC day, or the first day of the UTC month
    pub fn bucket(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        let day = timestamp.date_naive();
        match self {
            Granularity::Day => day,
            Granularity::Month => day.with_day(1).unwrap_or(day),
        }
    }

    pub fn label(&self, bucket: NaiveDate) -> String {
        match self {
            Granularity::Day => bucket.format("%Y-%m-%d").to_string(),
            Granularity::Month => bucket.format("%Y-%m").to_string(),
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Granularity::Day => Granularity::Month,
            Granularity::Month => Granularity::Day,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub bucket: NaiveDate,
    pub value: f64,
}

/// Sum of all values falling in each bucket, oldest bucket first
pub fn group_sum(values: &[ValueSnapshot], granularity: Granularity) -> Vec<SeriesPoint> {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for v in values {
        *buckets.entry(granularity.bucket(v.timestamp)).or_insert(0.0) += v.value;
    }

    buckets
        .into_iter()
        .map(|(bucket, value)| SeriesPoint { bucket, value })
        .collect()
}

/// Per bucket, the sum over items of each item's latest known value.
/// An item with no snapshot in a bucket contributes its previous value.
pub fn group_latest(values: &[ValueSnapshot], granularity: Granularity) -> Vec<SeriesPoint> {
    // item -> bucket -> latest snapshot within that bucket
    let mut per_item: BTreeMap<i64, BTreeMap<NaiveDate, &ValueSnapshot>> = BTreeMap::new();
    let mut all_buckets = BTreeSet::new();

    for v in values {
        let bucket = granularity.bucket(v.timestamp);
        all_buckets.insert(bucket);

        let slot = per_item.entry(v.item_id).or_default().entry(bucket).or_insert(v);
        if (v.timestamp, v.id) > (slot.timestamp, slot.id) {
            *slot = v;
        }
    }

    all_buckets
        .into_iter()
        .map(|bucket| {
            let value = per_item
                .values()
                .filter_map(|history| history.range(..=bucket).next_back())
                .map(|(_, snapshot)| snapshot.value)
                .sum();
            SeriesPoint { bucket, value }
        })
        .collect()
}

/// Value of a carried-forward series at `bucket` (zero before its first point)
pub fn value_at(series: &[SeriesPoint], bucket: NaiveDate) -> f64 {
    series
        .iter()
        .take_while(|p| p.bucket <= bucket)
        .last()
        .map_or(0.0, |p| p.value)
}

/// Asset series minus liability series over the union of their buckets
pub fn net_worth_series(
    assets: &[ValueSnapshot],
    liabilities: &[ValueSnapshot],
    granularity: Granularity,
) -> Vec<SeriesPoint> {
    let asset_series = group_latest(assets, granularity);
    let liability_series = group_latest(liabilities, granularity);

    let buckets: BTreeSet<NaiveDate> = asset_series
        .iter()
        .chain(liability_series.iter())
        .map(|p| p.bucket)
        .collect();

    buckets
        .into_iter()
        .map(|bucket| SeriesPoint {
            bucket,
            value: value_at(&asset_series, bucket) - value_at(&liability_series, bucket),
        })
        .collect()
}

/// One segment of the donut chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    pub fraction: f64,
}

/// Share of each positive entry in the positive total. Zero or negative
/// entries are dropped; an all-zero input yields no slices.
pub fn proportions(entries: &[(String, f64)]) -> Vec<Slice> {
    let total: f64 = entries.iter().map(|(_, v)| *v).filter(|v| *v > 0.0).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    entries
        .iter()
        .filter(|(_, v)| *v > 0.0)
        .map(|(label, value)| Slice {
            label: label.clone(),
            value: *value,
            fraction: value / total,
        })
        .collect()
}

/// `part` as a percentage of `whole`; zero when `whole` is zero
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}
