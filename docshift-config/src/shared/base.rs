use thiserror::Error;

/// Configuration and argument validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The requested transformation is not one of the supported names.
    #[error(
        "unknown transformation `{0}`, expected one of `clear-identifiers`, `assign-identifiers`, `csv-to-json`"
    )]
    UnknownTransformation(String),
    /// The indentation value is neither a number nor `tabs`.
    #[error("invalid indent `{0}`, expected a number of spaces or `tabs`")]
    InvalidIndent(String),
    /// The store url is not an absolute http(s) url.
    #[error("invalid store url `{0}`, expected an absolute http or https url")]
    InvalidStoreUrl(String),
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
