use thiserror::Error;

#[derive(Error, Debug)]
pub enum PcaError {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Insufficient data: {rows} usable rows x {columns} sample columns (need at least 2 x 2)")]
    InsufficientData { rows: usize, columns: usize },

    #[error("Invalid component count: requested {requested}, at most {max} available")]
    InvalidComponentCount { requested: usize, max: usize },

    /// Cell-level failure. Recorded in the cleaning report, never returned by the pipeline.
    #[error("Cannot convert value '{value}' in column '{column}' to a number")]
    NumericConversion { column: String, value: String },

    #[error("Cumulative explained variance never reaches {threshold}% (reached {reached:.4}%)")]
    ThresholdUnreachable { threshold: f64, reached: f64 },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Input too large: {cells} cells exceeds limit of {limit}")]
    InputTooLarge { cells: usize, limit: usize },

    #[error("Linear algebra error: {0}")]
    Linalg(String),

    #[error("Table store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, PcaError>;
