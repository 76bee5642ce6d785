/// Errors raised while building or decoding a [`crate::Snapshot`].
///
/// # Examples
///
/// ```rust
/// use wstrack_common::ModelError;
///
/// let err = ModelError::Uncoercible {
///     field: "views",
///     value: "\"lots\"".to_string(),
/// };
/// assert!(err.to_string().contains("views"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// The details record was not a JSON object.
    #[error("Model: details record is not an object: {0}")]
    NotAnObject(String),

    /// A counter field was present but could not be read as a non-negative integer.
    #[error("Model: field '{field}' is not a non-negative integer: {value}")]
    Uncoercible { field: &'static str, value: String },

    /// The title was present but was not a string.
    #[error("Model: title is not a string: {0}")]
    InvalidTitle(String),

    /// A log row had the wrong number of columns.
    #[error("Model: expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    /// A log row column could not be parsed back into its field.
    #[error("Model: invalid value in column '{column}': {value}")]
    InvalidColumn { column: &'static str, value: String },
}

/// Convenience `Result` alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
