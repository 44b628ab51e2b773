use crate::error::{AnalysisError, AnalysisResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Grouping / identifier value (timestamps, realization ids, saturation axis values).
///
/// Keys are totally ordered. Numbers (`Int`, `Float`) compare by value and sort before
/// timestamps (`Date`, `DateTime`, a bare date being midnight), which sort before `Text`.
/// Equal values of different variants order by variant so that `Ord` agrees with `Hash`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Key {
    /// Numeric cell as a key. Integral values become `Int` so that `1.0` and `1` group together.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            return Some(Self::Int(value as i64));
        }
        Some(Self::Float(value))
    }

    fn variant(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Float(_) => 1,
            Self::Date(_) => 2,
            Self::DateTime(_) => 3,
            Self::Text(_) => 4,
        }
    }

    fn class(&self) -> u8 {
        match self {
            Self::Int(_) | Self::Float(_) => 0,
            Self::Date(_) | Self::DateTime(_) => 1,
            Self::Text(_) => 2,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64)
                .total_cmp(b)
                .then(Ordering::Less),
            (Self::Float(a), Self::Int(b)) => a
                .total_cmp(&(*b as f64))
                .then(Ordering::Greater),
            (Self::Date(a), Self::DateTime(b)) => midnight(a)
                .map_or(Ordering::Less, |a| a.cmp(b))
                .then(Ordering::Less),
            (Self::DateTime(a), Self::Date(b)) => midnight(b)
                .map_or(Ordering::Greater, |b| a.cmp(&b))
                .then(Ordering::Greater),
            _ => self.class().cmp(&other.class()),
        }
    }
}

fn midnight(date: &NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant().hash(state);
        match self {
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Date(v) => v.hash(state),
            Self::DateTime(v) => v.hash(state),
            Self::Text(v) => v.hash(state),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Self::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// NaN marks a missing value.
    Numeric(Vec<f64>),
    Key(Vec<Option<Key>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Key(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn keys(name: impl Into<String>, values: Vec<Option<Key>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Key(values),
        }
    }

    pub fn dates(name: impl Into<String>, values: Vec<NaiveDate>) -> Self {
        Self::keys(name, values.into_iter().map(|d| Some(Key::Date(d))).collect())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// In-memory table: uniquely named columns of equal length, rows aligned by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
    rows: usize,
}

impl Frame {
    pub fn new(columns: Vec<Column>) -> AnalysisResult<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen: HashSet<&str> = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(AnalysisError::DuplicateColumn(column.name.clone()));
            }
            if column.len() != rows {
                return Err(AnalysisError::LengthMismatch {
                    name: column.name.clone(),
                    expected: rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric(&self, name: &str) -> AnalysisResult<&[f64]> {
        let column = self
            .column(name)
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))?;
        match &column.data {
            ColumnData::Numeric(values) => Ok(values),
            ColumnData::Key(_) => Err(AnalysisError::NotNumeric(name.to_string())),
        }
    }

    /// Any column viewed as grouping keys; numeric cells go through [`Key::from_f64`].
    pub fn keys(&self, name: &str) -> AnalysisResult<Vec<Option<Key>>> {
        let column = self
            .column(name)
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))?;
        Ok(match &column.data {
            ColumnData::Key(values) => values.clone(),
            ColumnData::Numeric(values) => values.iter().map(|v| Key::from_f64(*v)).collect(),
        })
    }

    /// Projection in the requested order. Repeated names are kept once.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> AnalysisResult<Frame> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !seen.insert(name) {
                continue;
            }
            let column = self
                .column(name)
                .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))?;
            columns.push(column.clone());
        }
        Ok(Frame {
            columns,
            rows: self.rows,
        })
    }

    /// Rows at the given positions, in the given order.
    pub fn take(&self, rows: &[usize]) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|column| Column {
                name: column.name.clone(),
                data: match &column.data {
                    ColumnData::Numeric(values) => {
                        ColumnData::Numeric(rows.iter().map(|r| values[*r]).collect())
                    }
                    ColumnData::Key(values) => {
                        ColumnData::Key(rows.iter().map(|r| values[*r].clone()).collect())
                    }
                },
            })
            .collect();
        Frame {
            columns,
            rows: rows.len(),
        }
    }
}
