use crate::error::{AnalysisError, AnalysisResult};
use crate::frame::Frame;
use crate::stats::pearson::pearson_pairwise;
use serde::Serialize;

/// Correlation of one candidate column against the target. NaN when undefined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub name: String,
    pub coefficient: f64,
}

/// Candidate name -> coefficient, in the column order of the input table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationSeries {
    target: String,
    entries: Vec<Correlation>,
}

impl CorrelationSeries {
    pub fn new(target: impl Into<String>, entries: Vec<Correlation>) -> Self {
        Self {
            target: target.into(),
            entries,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Correlation> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.coefficient)
    }

    /// Largest absolute coefficient; NaN entries are skipped and ties keep the earliest column.
    pub fn strongest(&self) -> Option<&Correlation> {
        let mut best: Option<&Correlation> = None;
        for entry in self.entries.iter().filter(|c| !c.coefficient.is_nan()) {
            match best {
                Some(current) if entry.coefficient.abs() <= current.coefficient.abs() => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    /// Descending by absolute value, stable on ties, NaN last.
    pub fn ranked(&self) -> Vec<&Correlation> {
        let mut ranked: Vec<&Correlation> = self.entries.iter().collect();
        ranked.sort_by(|a, b| match (a.coefficient.is_nan(), b.coefficient.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => b.coefficient.abs().total_cmp(&a.coefficient.abs()),
        });
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<&Correlation> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }
}

/// Pearson correlation of every column against `target_column`, pairing rows by position.
///
/// Missing values are excluded pairwise. The target itself is not part of the result.
/// Zero-variance candidates get a NaN coefficient instead of an error.
pub fn correlate(frame: &Frame, target_column: &str) -> AnalysisResult<CorrelationSeries> {
    if !frame.has_column(target_column) {
        return Err(AnalysisError::MissingColumn(target_column.to_string()));
    }
    if frame.len() < 2 {
        return Err(AnalysisError::InsufficientRows {
            rows: frame.len(),
            required: 2,
        });
    }
    let target = frame.numeric(target_column)?;

    let mut entries = Vec::with_capacity(frame.columns().len().saturating_sub(1));
    for name in frame.column_names().filter(|name| *name != target_column) {
        let values = frame.numeric(name)?;
        let coefficient = pearson_pairwise(values, target).unwrap_or(f64::NAN);
        entries.push(Correlation {
            name: name.to_string(),
            coefficient,
        });
    }

    let undefined = entries.iter().filter(|c| c.coefficient.is_nan()).count();
    tracing::debug!(
        target = target_column,
        rows = frame.len(),
        candidates = entries.len(),
        undefined,
        "computed correlations"
    );

    Ok(CorrelationSeries::new(target_column, entries))
}

/// Default parameter when none is selected: the strongest absolute correlation,
/// earliest column on ties.
pub fn select_default_parameter(series: &CorrelationSeries) -> Option<&str> {
    series.strongest().map(|c| c.name.as_str())
}
