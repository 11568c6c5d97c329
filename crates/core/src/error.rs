#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed selection record at line {line}: {reason}")]
    SelectionFormat { line: usize, reason: String },
}
