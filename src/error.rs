use thiserror::Error;

#[derive(Error, Debug)]
pub enum PurchaseReportError {
    #[error("Invalid month name '{0}': not part of the configured calendar order")]
    InvalidMonth(String),

    #[error("Percentage shares are undefined: total purchase amount is zero")]
    DivisionUndefined,

    #[error("Amount overflow: sums exceed the supported decimal range")]
    Overflow,

    #[error("Required column '{0}' is missing from the input header")]
    MissingColumn(String),

    #[error("Invalid value '{value}' in column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worksheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PurchaseReportError {
    /// True when the error only means "nothing to show" and should be rendered
    /// as an empty-state notice rather than a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::DivisionUndefined)
    }
}

pub type Result<T> = std::result::Result<T, PurchaseReportError>;
