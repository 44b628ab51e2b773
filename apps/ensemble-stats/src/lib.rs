//! Ensemble statistics over simulation realizations.
//!
//! [`statistics::compute_statistics`] reduces realization-indexed vectors to per-timestamp
//! MEAN/MIN/MAX/P10/P90/P50, and [`correlation::correlate`] ranks parameters against a response.

pub mod config;
pub mod correlation;
pub mod error;
pub mod frame;
pub mod io;
pub mod parameter_response;
pub mod statistics;
pub mod stats;

pub use correlation::{correlate, select_default_parameter, Correlation, CorrelationSeries};
pub use error::{AnalysisError, AnalysisResult};
pub use frame::{Column, ColumnData, Frame, Key};
pub use statistics::{
    compute_partitioned_statistics, compute_statistics, StatisticKind, StatisticsPartition,
    StatisticsRequest, StatisticsTable,
};
