//! Per-timestamp ensemble statistics for realization-indexed vectors.
//!
//! Percentile labels follow the oil-industry convention: `P10` is the high-side value
//! (statistical 90th percentile) and `P90` the low-side value (statistical 10th percentile).

use crate::error::{AnalysisError, AnalysisResult};
use crate::frame::{Frame, Key};
use crate::stats::quantile::{nan_mean, quantile_sorted, sorted_present};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_TIME_COLUMN: &str = "DATE";
pub const DEFAULT_ID_COLUMN: &str = "REAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatisticKind {
    Mean,
    Min,
    Max,
    P10,
    P90,
    P50,
}

impl StatisticKind {
    /// Display order of the statistic columns.
    pub const ALL: [StatisticKind; 6] = [
        StatisticKind::Mean,
        StatisticKind::Min,
        StatisticKind::Max,
        StatisticKind::P10,
        StatisticKind::P90,
        StatisticKind::P50,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Mean => "MEAN",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::P10 => "P10",
            Self::P90 => "P90",
            Self::P50 => "P50",
        }
    }

    /// Statistical percentile behind a percentile label. P10 and P90 are inverted.
    pub fn percentile(self) -> Option<f64> {
        match self {
            Self::P10 => Some(90.0),
            Self::P90 => Some(10.0),
            Self::P50 => Some(50.0),
            Self::Mean | Self::Min | Self::Max => None,
        }
    }
}

impl std::fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The six statistics of one vector at one timestamp. NaN when every value was missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct StatisticValues {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p10: f64,
    pub p90: f64,
    pub p50: f64,
}

impl StatisticValues {
    pub const UNDEFINED: StatisticValues = StatisticValues {
        mean: f64::NAN,
        min: f64::NAN,
        max: f64::NAN,
        p10: f64::NAN,
        p90: f64::NAN,
        p50: f64::NAN,
    };

    /// Statistics of one group of samples, ignoring NaN.
    pub fn from_samples(samples: &[f64]) -> Self {
        let sorted = sorted_present(samples);
        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Self::UNDEFINED;
        };
        let mean = nan_mean(&sorted);
        let pct = |kind: StatisticKind| {
            kind.percentile()
                .and_then(|p| quantile_sorted(&sorted, p / 100.0))
                .unwrap_or(f64::NAN)
        };
        Self {
            mean,
            min,
            max,
            p10: pct(StatisticKind::P10),
            p90: pct(StatisticKind::P90),
            p50: pct(StatisticKind::P50),
        }
    }

    pub fn get(&self, kind: StatisticKind) -> f64 {
        match kind {
            StatisticKind::Mean => self.mean,
            StatisticKind::Min => self.min,
            StatisticKind::Max => self.max,
            StatisticKind::P10 => self.p10,
            StatisticKind::P90 => self.p90,
            StatisticKind::P50 => self.p50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorStatistics {
    pub name: String,
    /// One entry per timestamp of the owning table.
    pub values: Vec<StatisticValues>,
}

impl VectorStatistics {
    pub fn column(&self, kind: StatisticKind) -> Vec<f64> {
        self.values.iter().map(|v| v.get(kind)).collect()
    }

    /// Band view for fan-chart renderers: low band is P90, high band is P10.
    pub fn fan_chart(&self) -> FanChart {
        FanChart {
            low: self.column(StatisticKind::P90),
            high: self.column(StatisticKind::P10),
            minimum: self.column(StatisticKind::Min),
            maximum: self.column(StatisticKind::Max),
            mean: self.column(StatisticKind::Mean),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanChart {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
    pub minimum: Vec<f64>,
    pub maximum: Vec<f64>,
    pub mean: Vec<f64>,
}

/// Rows keyed by timestamp; columns are (vector, statistic kind).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsTable {
    time_column: String,
    timestamps: Vec<Key>,
    vectors: Vec<VectorStatistics>,
}

/// One flattened (timestamp, vector, statistic, value) cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticCell<'a> {
    pub timestamp: &'a Key,
    pub vector: &'a str,
    pub kind: StatisticKind,
    pub value: f64,
}

impl StatisticsTable {
    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn timestamps(&self) -> &[Key] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn vectors(&self) -> &[VectorStatistics] {
        &self.vectors
    }

    pub fn vector_names(&self) -> impl Iterator<Item = &str> {
        self.vectors.iter().map(|v| v.name.as_str())
    }

    pub fn vector(&self, name: &str) -> Option<&VectorStatistics> {
        self.vectors.iter().find(|v| v.name == name)
    }

    pub fn column(&self, vector: &str, kind: StatisticKind) -> Option<Vec<f64>> {
        self.vector(vector).map(|v| v.column(kind))
    }

    pub fn value(&self, vector: &str, row: usize, kind: StatisticKind) -> Option<f64> {
        self.vector(vector)?.values.get(row).map(|v| v.get(kind))
    }

    pub fn cells(&self) -> impl Iterator<Item = StatisticCell<'_>> {
        self.timestamps.iter().enumerate().flat_map(move |(row, timestamp)| {
            self.vectors.iter().flat_map(move |vector| {
                let values = vector.values[row];
                StatisticKind::ALL.into_iter().map(move |kind| StatisticCell {
                    timestamp,
                    vector: vector.name.as_str(),
                    kind,
                    value: values.get(kind),
                })
            })
        })
    }
}

/// Which columns of the input play which role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsRequest {
    pub time_column: String,
    pub id_column: String,
    /// `None` means every column other than the time, id and partition columns, in input order.
    pub vector_columns: Option<Vec<String>>,
    /// Partition columns for [`compute_partitioned_statistics`] (e.g. ENSEMBLE, SATNUM).
    pub group_by: Vec<String>,
}

impl Default for StatisticsRequest {
    fn default() -> Self {
        Self {
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            vector_columns: None,
            group_by: Vec::new(),
        }
    }
}

impl StatisticsRequest {
    pub fn with_vectors<S: Into<String>>(mut self, vectors: impl IntoIterator<Item = S>) -> Self {
        self.vector_columns = Some(vectors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_group_by<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    fn is_reserved(&self, name: &str) -> bool {
        name == self.time_column
            || name == self.id_column
            || self.group_by.iter().any(|g| g == name)
    }
}

/// Group by timestamp and compute MEAN, MIN, MAX, P10, P90 and P50 per vector.
///
/// Timestamps come out in ascending key order; rows with a missing timestamp are dropped.
/// Input-shape problems abort the whole computation; all-missing groups produce NaN cells.
pub fn compute_statistics(
    frame: &Frame,
    request: &StatisticsRequest,
) -> AnalysisResult<StatisticsTable> {
    let time_column = request.time_column.as_str();
    let id_column = request.id_column.as_str();
    let times = frame.keys(time_column)?;
    let ids = frame.keys(id_column)?;

    let vector_names = resolve_vector_columns(frame, request)?;
    let vector_values = vector_names
        .iter()
        .map(|name| frame.numeric(name))
        .collect::<AnalysisResult<Vec<&[f64]>>>()?;

    let mut groups: BTreeMap<&Key, Vec<usize>> = BTreeMap::new();
    let mut dropped = 0usize;
    for (row, time) in times.iter().enumerate() {
        match time {
            Some(time) => groups.entry(time).or_default().push(row),
            None => dropped += 1,
        }
    }

    for (time, rows) in &groups {
        let mut seen: HashSet<&Key> = HashSet::with_capacity(rows.len());
        for id in rows.iter().filter_map(|row| ids[*row].as_ref()) {
            if !seen.insert(id) {
                return Err(AnalysisError::DuplicateRealization {
                    timestamp: time.to_string(),
                    realization: id.to_string(),
                });
            }
        }
    }

    let vectors = vector_names
        .iter()
        .zip(vector_values.iter())
        .map(|(name, values)| {
            let per_time = groups
                .values()
                .map(|rows| {
                    let samples: Vec<f64> = rows.iter().map(|row| values[*row]).collect();
                    StatisticValues::from_samples(&samples)
                })
                .collect();
            VectorStatistics {
                name: name.clone(),
                values: per_time,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        rows = frame.len(),
        timestamps = groups.len(),
        vectors = vectors.len(),
        dropped_rows = dropped,
        "computed vector statistics"
    );

    Ok(StatisticsTable {
        time_column: time_column.to_string(),
        timestamps: groups.into_keys().cloned().collect(),
        vectors,
    })
}

fn resolve_vector_columns(
    frame: &Frame,
    request: &StatisticsRequest,
) -> AnalysisResult<Vec<String>> {
    let reserved = |name: &str| request.is_reserved(name);
    let names: Vec<String> = match &request.vector_columns {
        None => frame
            .column_names()
            .filter(|name| !reserved(name))
            .map(str::to_string)
            .collect(),
        Some(explicit) => {
            let mut seen: HashSet<&str> = HashSet::with_capacity(explicit.len());
            let mut names = Vec::with_capacity(explicit.len());
            for name in explicit {
                if reserved(name) {
                    return Err(AnalysisError::ReservedColumn(name.clone()));
                }
                if !frame.has_column(name) {
                    return Err(AnalysisError::MissingColumn(name.clone()));
                }
                if seen.insert(name.as_str()) {
                    names.push(name.clone());
                }
            }
            names
        }
    };
    if names.is_empty() {
        return Err(AnalysisError::NoVectorColumns {
            time_column: request.time_column.clone(),
            id_column: request.id_column.clone(),
        });
    }
    Ok(names)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionValue {
    pub column: String,
    pub value: Key,
}

/// Statistics of the rows sharing one combination of partition values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsPartition {
    /// One entry per `group_by` column, in request order. Empty when nothing is partitioned.
    pub partition: Vec<PartitionValue>,
    pub table: StatisticsTable,
}

/// [`compute_statistics`] once per distinct combination of the `group_by` columns.
///
/// Partitions come out in ascending key order; rows with a missing partition value are dropped.
/// Without `group_by` the whole frame is a single partition.
pub fn compute_partitioned_statistics(
    frame: &Frame,
    request: &StatisticsRequest,
) -> AnalysisResult<Vec<StatisticsPartition>> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(request.group_by.len());
    let mut partition_keys = Vec::with_capacity(request.group_by.len());
    for column in &request.group_by {
        if *column == request.time_column || *column == request.id_column {
            return Err(AnalysisError::ReservedColumn(column.clone()));
        }
        if !seen.insert(column.as_str()) {
            return Err(AnalysisError::DuplicateColumn(column.clone()));
        }
        partition_keys.push(frame.keys(column)?);
    }
    if partition_keys.is_empty() {
        return Ok(vec![StatisticsPartition {
            partition: Vec::new(),
            table: compute_statistics(frame, request)?,
        }]);
    }
    resolve_vector_columns(frame, request)?;

    let mut partitions: BTreeMap<Vec<Key>, Vec<usize>> = BTreeMap::new();
    let mut dropped = 0usize;
    for row in 0..frame.len() {
        let key: Option<Vec<Key>> = partition_keys.iter().map(|keys| keys[row].clone()).collect();
        match key {
            Some(key) => partitions.entry(key).or_default().push(row),
            None => dropped += 1,
        }
    }
    tracing::debug!(
        partitions = partitions.len(),
        dropped_rows = dropped,
        "partitioned statistics input"
    );

    partitions
        .into_iter()
        .map(|(key, rows)| {
            let table = compute_statistics(&frame.take(&rows), request)?;
            let partition = request
                .group_by
                .iter()
                .cloned()
                .zip(key)
                .map(|(column, value)| PartitionValue { column, value })
                .collect();
            Ok(StatisticsPartition { partition, table })
        })
        .collect()
}
