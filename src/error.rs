//! Error types for loading, validation and calculation.
//!
//! Row-level validation failures are collected, never thrown. Calculation
//! failures are kept as markers on the metric they affect.

use serde::Serialize;
use thiserror::Error;

/// Why a single input row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationKind {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid numeric value")]
    InvalidNumericValue,

    #[error("duplicate week")]
    DuplicateWeek,

    #[error("value out of range: {0}")]
    OutOfRange(String),
}

/// A rejected row: 1-based data row index, offending column and reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row}: {kind}")]
pub struct RowError {
    pub row: usize,
    pub column: Option<String>,
    pub kind: ValidationKind,
}

impl RowError {
    pub fn new(row: usize, column: &str, kind: ValidationKind) -> Self {
        Self {
            row,
            column: Some(column.to_string()),
            kind,
        }
    }

    pub fn to_export_row(&self) -> RejectedRow {
        RejectedRow {
            row: self.row,
            column: self.column.clone().unwrap_or_default(),
            reason: self.kind.to_string(),
        }
    }
}

/// Flat form of a [`RowError`] for CSV export.
#[derive(Debug, Clone, Serialize, tabled::Tabled)]
pub struct RejectedRow {
    #[serde(rename = "Row")]
    #[tabled(rename = "Row")]
    pub row: usize,
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Reason")]
    #[tabled(rename = "Reason")]
    pub reason: String,
}

/// A metric that has no finite value for this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalcError {
    /// Promo margin is negative, so no lift recovers baseline profit.
    #[error("breakeven unreachable")]
    BreakevenUnreachable,

    #[error("division undefined")]
    DivisionUndefined,
}

pub type Metric = Result<f64, CalcError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No data loaded: {0}")]
    NoData(String),
}

pub type AppResult<T> = Result<T, AppError>;
