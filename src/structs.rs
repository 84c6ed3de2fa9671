//! Consolidated public types for the pcakit crate
//!
//! This module contains the data entities passed between pipeline stages.
//! Each one is produced by exactly one stage and consumed read-only by the next.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub use crate::error::{PcaError, Result};

// ============================================================================
// Input Types
// ============================================================================

/// A single cell of a raw input table
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Numeric value of the cell after comma-decimal normalization.
    ///
    /// Returns `None` for missing, unparseable or non-finite values.
    #[must_use]
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) | Self::Missing => None,
            Self::Text(s) => parse_decimal(s),
        }
    }

    /// Text rendering used for identifiers and diagnostics
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::Missing => String::new(),
        }
    }
}

/// Parse a number that may use a comma as decimal separator (`"1,5"` -> `1.5`)
#[must_use]
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Ordered row records with named columns, as delivered by the calling layer
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    /// Each row has exactly `columns.len()` cells
    pub rows: Vec<Vec<CellValue>>,
    /// Identifier column declared by the input format itself (split JSON index)
    pub declared_identifier: Option<String>,
}

impl RawTable {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            declared_identifier: None,
        }
    }

    /// Append a row, padding short rows with `Missing` and truncating long ones
    pub fn push_row(&mut self, mut cells: Vec<CellValue>) {
        cells.resize(self.columns.len(), CellValue::Missing);
        self.rows.push(cells);
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }
}

/// How the feature-identifier column is chosen
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierColumn {
    /// First column whose first-row value is non-numeric
    #[default]
    Infer,
    /// Caller-declared column name
    Named(String),
    /// Synthesized `row_<n>` identifiers
    RowIndex,
}

/// Which axis of the cleaned matrix becomes the PCA observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Samples are points, features are variables (requires a transpose)
    #[default]
    SamplesAsObservations,
    /// Features are points, samples are variables
    FeaturesAsObservations,
}

// ============================================================================
// Cleaning Types
// ============================================================================

/// Numeric feature x sample matrix with stable feature identifiers
#[derive(Debug, Clone)]
pub struct CleanedMatrix {
    /// Name of the column the identifiers came from
    pub id_column: String,
    /// Row labels, unique, in input order
    pub feature_ids: Vec<String>,
    /// Column labels
    pub sample_ids: Vec<String>,
    /// Shape: (n_features, n_samples). Every cell is finite.
    pub values: Array2<f64>,
}

impl CleanedMatrix {
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_ids.len()
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }
}

/// A row removed during cleaning, with the first offending cell
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRow {
    /// 0-based position in the raw table
    pub position: usize,
    pub feature_id: String,
    pub column: String,
    pub value: String,
}

/// What the cleaner discarded on the way to a `CleanedMatrix`
#[derive(Debug, Clone, Default)]
pub struct CleaningReport {
    pub original_rows: usize,
    pub dropped_rows: Vec<DroppedRow>,
    pub discarded_columns: Vec<String>,
    pub duplicate_ids: Vec<String>,
}

impl CleaningReport {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} input rows, {} dropped (non-numeric or missing), {} duplicate identifiers, discarded columns: [{}]",
            self.original_rows,
            self.dropped_rows.len(),
            self.duplicate_ids.len(),
            self.discarded_columns.join(", ")
        )
    }
}

// ============================================================================
// PCA Types
// ============================================================================

/// Z-scored matrix in the orientation PCA consumes
#[derive(Debug, Clone)]
pub struct StandardizedMatrix {
    /// Shape: (n_observations, n_variables). Every column has mean 0, unit or zero variance.
    pub data: Array2<f64>,
    pub observation_ids: Vec<String>,
    pub variable_ids: Vec<String>,
    /// Label for the variable identifiers (identifier column name or "sample")
    pub variable_label: String,
    pub means: Vec<f64>,
    /// Population standard deviations before sanitizing; 0.0 marks a constant variable
    pub std_devs: Vec<f64>,
    /// Indices of variables standardized to all zeros
    pub zero_variance: Vec<usize>,
    pub orientation: Orientation,
}

impl StandardizedMatrix {
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.data.nrows()
    }

    #[must_use]
    pub fn n_variables(&self) -> usize {
        self.data.ncols()
    }
}

/// Decomposition strategy used by the PCA engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcaSolver {
    /// Covariance when variables <= observations, SVD otherwise
    #[default]
    Auto,
    Covariance,
    Svd,
}

/// One principal component
#[derive(Debug, Clone)]
pub struct PrincipalComponent {
    /// `PC1`, `PC2`, ...
    pub label: String,
    /// Variance along the component (sample covariance, divisor n - 1)
    pub eigenvalue: f64,
    pub explained_variance_ratio: f64,
    /// One coefficient per variable, unit norm
    pub loadings: Vec<f64>,
    /// One value per observation
    pub scores: Vec<f64>,
}

/// Ordered components, PC1 first
#[derive(Debug, Clone)]
pub struct PrincipalComponentSet {
    pub components: Vec<PrincipalComponent>,
    pub observation_ids: Vec<String>,
    pub variable_ids: Vec<String>,
    pub variable_label: String,
    /// Trace of the covariance matrix
    pub total_variance: f64,
    /// `min(n_observations - 1, n_variables)`
    pub max_components: usize,
    pub solver: PcaSolver,
}

impl PrincipalComponentSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.components.iter().map(|c| c.label.clone()).collect()
    }

    #[must_use]
    pub fn ratios(&self) -> Vec<f64> {
        self.components
            .iter()
            .map(|c| c.explained_variance_ratio)
            .collect()
    }
}

/// Component label for a 0-based index
#[must_use]
pub fn component_label(index: usize) -> String {
    format!("PC{}", index + 1)
}

/// Explained and cumulative variance per component
#[derive(Debug, Clone)]
pub struct VarianceSummary {
    pub labels: Vec<String>,
    pub ratios: Vec<f64>,
    /// Full precision percentages
    pub individual_pct: Vec<f64>,
    pub cumulative_pct: Vec<f64>,
    /// One-decimal percentages for display
    pub individual_pct_display: Vec<f64>,
    pub cumulative_pct_display: Vec<f64>,
    pub threshold: f64,
    /// 0-based index of the first component whose cumulative percentage reaches `threshold`
    pub crossing_index: usize,
}

/// A feature and its signed loading on one component
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFeature {
    pub feature_id: String,
    pub position: usize,
    pub loading: f64,
}

/// Ranked features for one component
#[derive(Debug, Clone)]
pub struct ComponentContributors {
    pub component: String,
    pub features: Vec<RankedFeature>,
}

/// Top (and optionally bottom) contributors for every component
#[derive(Debug, Clone)]
pub struct ContributorRanking {
    pub k: usize,
    /// Descending absolute loading
    pub top: Vec<ComponentContributors>,
    /// Ascending absolute loading
    pub bottom: Option<Vec<ComponentContributors>>,
}
