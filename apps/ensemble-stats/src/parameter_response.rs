//! Parameter vs. simulated RFT response analysis over a realization pivot table
//! (one row per realization, one column per parameter and per simulated response).

use crate::correlation::{correlate, select_default_parameter, CorrelationSeries};
use crate::error::{AnalysisError, AnalysisResult};
use crate::frame::{ColumnData, Frame};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Correlate the selected response against every parameter.
    #[default]
    SimVsParam,
    /// Correlate the selected parameter against every simulated response.
    ParamVsSim,
}

impl CorrelationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SimVsParam => "sim_vs_param",
            Self::ParamVsSim => "param_vs_sim",
        }
    }
}

/// Column name of a simulated response: `"{well} {date} {zone}"`.
pub fn response_key(well: &str, date: &str, zone: &str) -> String {
    format!("{well} {date} {zone}")
}

/// Candidates with at least two distinct non-missing numeric values, in candidate order.
/// Unknown and non-numeric candidates are left out.
pub fn non_constant_parameters<S: AsRef<str>>(frame: &Frame, candidates: &[S]) -> Vec<String> {
    candidates
        .iter()
        .map(|c| -> &str { c.as_ref() })
        .filter(|name| match frame.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(values)) => {
                let mut present = values.iter().filter(|v| !v.is_nan());
                match present.next() {
                    Some(first) => present.any(|v| v != first),
                    None => false,
                }
            }
            _ => false,
        })
        .map(str::to_string)
        .collect()
}

/// Min-max normalization to `[0, 1]`, NaN preserved.
///
/// A constant (or single-valued) input maps every present value to the 0.5 midpoint.
pub fn normalize_parameter(values: &[f64]) -> Vec<f64> {
    let (min, max) = nan_range(values);
    let span = max - min;
    values
        .iter()
        .map(|v| {
            if v.is_nan() {
                f64::NAN
            } else if span > 0.0 && span.is_finite() {
                (v - min) / span
            } else {
                0.5
            }
        })
        .collect()
}

fn nan_range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f64::NAN, f64::NAN), |(lo, hi), v| {
            (
                if lo.is_nan() { *v } else { lo.min(*v) },
                if hi.is_nan() { *v } else { hi.max(*v) },
            )
        })
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterResponseQuery<'a> {
    /// Selected simulated response column.
    pub response_key: &'a str,
    /// Non-constant parameters of the selected ensemble.
    pub parameters: &'a [String],
    /// Simulated responses to correlate against in [`CorrelationMode::ParamVsSim`].
    pub responses: &'a [String],
    /// Explicitly selected parameter, if any.
    pub parameter: Option<&'a str>,
    pub mode: CorrelationMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterResponse {
    pub mode: CorrelationMode,
    pub parameter: String,
    pub response_key: String,
    pub title: String,
    /// Bar to emphasize in the ranked correlation view.
    pub highlight: String,
    pub correlations: CorrelationSeries,
    pub scatter_x: String,
    pub scatter_y: String,
    /// NaN-ignoring min and max of the parameter column.
    pub parameter_range: (f64, f64),
    /// Parameter value of every realization row scaled to `[0, 1]`, for coloring.
    pub normalized_parameter: Vec<f64>,
}

/// Ranked correlations plus the selected parameter for one well/date/zone response.
pub fn analyze_parameter_response(
    frame: &Frame,
    query: &ParameterResponseQuery<'_>,
) -> AnalysisResult<ParameterResponse> {
    if frame.is_empty() {
        return Err(AnalysisError::NoData);
    }
    if let Some(parameter) = query.parameter {
        if !query.parameters.iter().any(|p| p == parameter) {
            return Err(AnalysisError::UnknownParameter(parameter.to_string()));
        }
    }
    if query.parameters.is_empty() {
        return Err(AnalysisError::NoNonConstantParameters);
    }

    let key = query.response_key;
    let (correlations, title, highlight, parameter) = match query.mode {
        CorrelationMode::SimVsParam => {
            let (series, parameter) = correlate_against_response(frame, query)?;
            let title = format!("{key} vs parameters");
            (series, title, parameter.clone(), parameter)
        }
        CorrelationMode::ParamVsSim => {
            let parameter = match query.parameter {
                Some(parameter) => parameter.to_string(),
                None => correlate_against_response(frame, query)?.1,
            };
            let columns = with_target(query.responses, &parameter);
            let series = correlate(&frame.select(&columns)?, &parameter)?;
            let title = format!("{parameter} vs simulated RFTs");
            (series, title, key.to_string(), parameter)
        }
    };
    let parameter_values = frame.numeric(&parameter)?;
    let parameter_range = nan_range(parameter_values);
    let normalized_parameter = normalize_parameter(parameter_values);

    Ok(ParameterResponse {
        mode: query.mode,
        parameter: parameter.clone(),
        response_key: key.to_string(),
        title,
        highlight,
        correlations,
        scatter_x: parameter,
        scatter_y: key.to_string(),
        parameter_range,
        normalized_parameter,
    })
}

/// Response vs. every parameter; the explicit parameter wins, otherwise the strongest one.
fn correlate_against_response(
    frame: &Frame,
    query: &ParameterResponseQuery<'_>,
) -> AnalysisResult<(CorrelationSeries, String)> {
    let key = query.response_key;
    let columns = with_target(query.parameters, key);
    let series = correlate(&frame.select(&columns)?, key)?;
    let parameter = match query.parameter {
        Some(parameter) => parameter.to_string(),
        None => {
            let chosen = select_default_parameter(&series)
                .ok_or_else(|| AnalysisError::UndefinedCorrelations(key.to_string()))?
                .to_string();
            tracing::debug!(response = key, parameter = %chosen, "selected default parameter");
            chosen
        }
    };
    Ok((series, parameter))
}

fn with_target<'a>(columns: &'a [String], target: &'a str) -> Vec<&'a str> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(columns.len() + 1);
    let mut out: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| *c != target && seen.insert(*c))
        .collect();
    out.push(target);
    out
}
