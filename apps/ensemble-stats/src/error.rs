use thiserror::Error;

/// Input-shape failures. Numeric degeneracy (constant columns, all-missing groups) is never
/// reported here; it surfaces as NaN in the affected cell only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("column `{0}` not found")]
    MissingColumn(String),
    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),
    #[error("column `{name}` has {actual} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("column `{0}` is not numeric")]
    NotNumeric(String),
    #[error("vector column `{0}` collides with the time, realization or partition column")]
    ReservedColumn(String),
    #[error("no vector columns remain after excluding `{time_column}` and `{id_column}`")]
    NoVectorColumns {
        time_column: String,
        id_column: String,
    },
    #[error("realization {realization} appears more than once at {timestamp}")]
    DuplicateRealization {
        timestamp: String,
        realization: String,
    },
    #[error("table has {rows} rows, at least {required} are required")]
    InsufficientRows { rows: usize, required: usize },
    #[error("no data matching the given filter criteria")]
    NoData,
    #[error("parameter `{0}` is not valid for the selected ensemble")]
    UnknownParameter(String),
    #[error("the selected ensemble has no non-constant parameters")]
    NoNonConstantParameters,
    #[error("every correlation against `{0}` is undefined")]
    UndefinedCorrelations(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
