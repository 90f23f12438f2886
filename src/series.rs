use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DigitizeError;

/// The six mobility charts of a report, in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartType {
    RetailAndRecreation,
    GroceryAndPharmacy,
    Parks,
    TransitStations,
    Workplaces,
    Residential,
}

impl ChartType {
    /// Page 1 carries the first three, page 2 the last three.
    pub const ALL: [ChartType; 6] = [
        ChartType::RetailAndRecreation,
        ChartType::GroceryAndPharmacy,
        ChartType::Parks,
        ChartType::TransitStations,
        ChartType::Workplaces,
        ChartType::Residential,
    ];

    /// Kebab-case name used in export file names.
    pub fn slug(self) -> &'static str {
        match self {
            ChartType::RetailAndRecreation => "retail-and-recreation",
            ChartType::GroceryAndPharmacy => "grocery-and-pharmacy",
            ChartType::Parks => "parks",
            ChartType::TransitStations => "transit-stations",
            ChartType::Workplaces => "workplaces",
            ChartType::Residential => "residential",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Country,
    State,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Country => "country",
            Category::State => "state",
        }
    }
}

/// A series sample after coordinate mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainPoint {
    pub timestamp: NaiveDateTime,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub points: Vec<DailyPoint>,
}

/// Keep one sample per calendar day: the one furthest along the curve.
///
/// Scans from the end, so the output runs latest date first.
pub fn downsample_daily(points: &[DomainPoint]) -> ChartSeries {
    let mut seen = HashSet::new();
    let points = points
        .iter()
        .rev()
        .filter_map(|p| {
            let date = p.timestamp.date();
            seen.insert(date).then_some(DailyPoint {
                date,
                value: p.value,
            })
        })
        .collect();
    ChartSeries { points }
}

/// Which run's value survives when both carry the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// The previously stored value is kept.
    #[default]
    Base,
    /// The fresh extraction overrides stored values.
    Newer,
}

impl ChartSeries {
    /// Union of both runs, one point per date, newest date first.
    ///
    /// Under [`MergePolicy::Base`] `self` wins date collisions; under
    /// [`MergePolicy::Newer`] `newer` does. The date set is the same either way.
    pub fn merge(&self, newer: &ChartSeries, policy: MergePolicy) -> ChartSeries {
        let (first, second) = match policy {
            MergePolicy::Base => (self, newer),
            MergePolicy::Newer => (newer, self),
        };

        let mut seen = HashSet::new();
        let mut points: Vec<DailyPoint> = first
            .points
            .iter()
            .chain(&second.points)
            .filter(|p| seen.insert(p.date))
            .copied()
            .collect();
        points.sort_by(|a, b| b.date.cmp(&a.date));
        ChartSeries { points }
    }

    pub fn latest(&self) -> Option<&DailyPoint> {
        self.points.iter().max_by_key(|p| p.date)
    }
}

/// All six series of one geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordFile", try_from = "RecordFile")]
pub struct GeographyResult {
    pub category: Category,
    pub series: BTreeMap<ChartType, ChartSeries>,
}

/// On-disk shape: `{ "<category>": { "<chartType>": { "points": [...] } } }`.
type RecordFile = BTreeMap<Category, BTreeMap<ChartType, ChartSeries>>;

impl From<GeographyResult> for RecordFile {
    fn from(result: GeographyResult) -> Self {
        BTreeMap::from([(result.category, result.series)])
    }
}

impl TryFrom<RecordFile> for GeographyResult {
    type Error = String;

    fn try_from(file: RecordFile) -> Result<Self, Self::Error> {
        let mut entries = file.into_iter();
        let (category, series) = entries
            .next()
            .ok_or_else(|| "record has no category".to_string())?;
        if entries.next().is_some() {
            return Err("record has more than one category".to_string());
        }
        Ok(GeographyResult { category, series })
    }
}

impl GeographyResult {
    pub fn empty(category: Category) -> Self {
        GeographyResult {
            category,
            series: BTreeMap::new(),
        }
    }

    /// Assign chart types by position across both pages.
    pub fn from_charts(category: Category, charts: Vec<ChartSeries>) -> Result<Self, DigitizeError> {
        if charts.len() != ChartType::ALL.len() {
            return Err(DigitizeError::ChartCount {
                expected: ChartType::ALL.len(),
                found: charts.len(),
            });
        }
        Ok(GeographyResult {
            category,
            series: ChartType::ALL.into_iter().zip(charts).collect(),
        })
    }

    pub fn chart(&self, chart_type: ChartType) -> Option<&ChartSeries> {
        self.series.get(&chart_type)
    }

    /// Merge a fresh extraction into this stored record, chart by chart.
    pub fn merge(&self, newer: &GeographyResult, policy: MergePolicy) -> GeographyResult {
        let base_applies = self.category == newer.category;
        if !base_applies {
            warn!(
                "Stored record is a {} record, new one is a {}; ignoring stored values",
                self.category.as_str(),
                newer.category.as_str()
            );
        }

        let empty = ChartSeries::default();
        let series = ChartType::ALL
            .into_iter()
            .map(|ct| {
                let base = if base_applies { self.chart(ct) } else { None };
                let fresh = newer.chart(ct).unwrap_or(&empty);
                (ct, base.unwrap_or(&empty).merge(fresh, policy))
            })
            .collect();

        GeographyResult {
            category: newer.category,
            series,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(points: &[(&str, i64)]) -> ChartSeries {
        ChartSeries {
            points: points
                .iter()
                .map(|(d, v)| DailyPoint {
                    date: day(d),
                    value: *v,
                })
                .collect(),
        }
    }

    fn sample(ts: &str, value: i64) -> DomainPoint {
        DomainPoint {
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M").unwrap(),
            value,
        }
    }

    #[test]
    fn latest_sample_of_each_day_wins() {
        let points = vec![
            sample("2020-03-01 02:00", 1),
            sample("2020-03-01 20:00", 2),
            sample("2020-03-02 01:00", 3),
            sample("2020-03-02 23:59", 4),
            sample("2020-03-03 00:00", 5),
        ];
        let daily = downsample_daily(&points);
        assert_eq!(
            daily,
            series(&[("2020-03-03", 5), ("2020-03-02", 4), ("2020-03-01", 2)])
        );
    }

    #[test]
    fn downsampling_daily_data_only_reverses_it() {
        let points = vec![
            sample("2020-03-01 00:00", 5),
            sample("2020-03-02 00:00", 6),
            sample("2020-03-03 00:00", 7),
        ];
        let once = downsample_daily(&points);
        assert_eq!(once, series(&[("2020-03-03", 7), ("2020-03-02", 6), ("2020-03-01", 5)]));
    }

    #[test]
    fn merge_unions_dates_and_sorts_descending() {
        let a = series(&[("2020-03-01", 5), ("2020-03-02", 6)]);
        let b = series(&[("2020-03-02", 9), ("2020-03-03", 7)]);
        assert_eq!(
            a.merge(&b, MergePolicy::Base),
            series(&[("2020-03-03", 7), ("2020-03-02", 6), ("2020-03-01", 5)])
        );
    }

    #[test]
    fn first_argument_wins_collisions() {
        let a = series(&[("2020-03-01", 10)]);
        let b = series(&[("2020-03-01", -5)]);
        assert_eq!(a.merge(&b, MergePolicy::Base), series(&[("2020-03-01", 10)]));
        // Swapping arguments keeps the date set but flips the surviving value.
        assert_eq!(b.merge(&a, MergePolicy::Base), series(&[("2020-03-01", -5)]));
    }

    #[test]
    fn newer_policy_lets_fresh_values_win() {
        let a = series(&[("2020-03-01", 5), ("2020-03-02", 6)]);
        let b = series(&[("2020-03-02", 9), ("2020-03-03", 7)]);
        assert_eq!(
            a.merge(&b, MergePolicy::Newer),
            series(&[("2020-03-03", 7), ("2020-03-02", 9), ("2020-03-01", 5)])
        );
    }

    #[test]
    fn merge_is_idempotent_and_associative_on_dates() {
        let a = series(&[("2020-03-01", 5), ("2020-03-02", 6)]);
        let b = series(&[("2020-03-02", 9), ("2020-03-03", 7)]);
        let c = series(&[("2020-03-03", 1), ("2020-03-04", 2)]);

        let ab = a.merge(&b, MergePolicy::Base);
        assert_eq!(ab.merge(&b, MergePolicy::Base), ab);
        assert_eq!(ab.merge(&ab, MergePolicy::Base), ab);

        let dates = |s: &ChartSeries| s.points.iter().map(|p| p.date).collect::<Vec<_>>();
        let left = ab.merge(&c, MergePolicy::Base);
        let right = a.merge(&b.merge(&c, MergePolicy::Base), MergePolicy::Base);
        assert_eq!(dates(&left), dates(&right));
        assert_eq!(left, right);
    }

    #[test]
    fn merge_with_empty_prior_sorts_new_run() {
        let fresh = series(&[("2020-03-01", 1), ("2020-03-03", 3), ("2020-03-02", 2)]);
        assert_eq!(
            ChartSeries::default().merge(&fresh, MergePolicy::Base),
            series(&[("2020-03-03", 3), ("2020-03-02", 2), ("2020-03-01", 1)])
        );
    }

    #[test]
    fn result_needs_exactly_six_charts() {
        let five = vec![ChartSeries::default(); 5];
        assert!(matches!(
            GeographyResult::from_charts(Category::Country, five),
            Err(DigitizeError::ChartCount { expected: 6, found: 5 })
        ));

        let six: Vec<_> = (0..6).map(|i| series(&[("2020-03-01", i)])).collect();
        let result = GeographyResult::from_charts(Category::State, six).unwrap();
        assert_eq!(result.chart(ChartType::Parks).unwrap().points[0].value, 2);
        assert_eq!(result.chart(ChartType::Residential).unwrap().points[0].value, 5);
    }

    #[test]
    fn record_serializes_under_category_key() {
        let six: Vec<_> = (0..6).map(|i| series(&[("2020-03-01", i - 3)])).collect();
        let result = GeographyResult::from_charts(Category::Country, six).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["country"]["retailAndRecreation"]["points"][0],
            serde_json::json!({ "date": "2020-03-01", "value": -3 })
        );
        assert_eq!(json["country"]["transitStations"]["points"][0]["value"], 0);

        let back: GeographyResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn merge_fills_chart_types_missing_from_prior() {
        let prior: GeographyResult =
            serde_json::from_str(r#"{"state":{"parks":{"points":[{"date":"2020-02-20","value":4}]}}}"#)
                .unwrap();
        let six: Vec<_> = (0..6).map(|_| series(&[("2020-02-21", 1)])).collect();
        let fresh = GeographyResult::from_charts(Category::State, six).unwrap();

        let merged = prior.merge(&fresh, MergePolicy::Base);
        assert_eq!(merged.series.len(), 6);
        assert_eq!(
            merged.chart(ChartType::Parks).unwrap(),
            &series(&[("2020-02-21", 1), ("2020-02-20", 4)])
        );
        assert_eq!(
            merged.chart(ChartType::Workplaces).unwrap(),
            &series(&[("2020-02-21", 1)])
        );
    }
}
