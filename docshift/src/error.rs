//! Error types and result definitions for transformation runs.
//!
//! [`TransformError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, an optional source error and the location it was raised at. It is cheap to
//! clone so a single failure can be delivered to many waiters.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use docshift_config::shared::ValidationError;

/// Convenient result type for transformation operations using [`TransformError`].
pub type TransformResult<T> = Result<T, TransformError>;

/// Specific categories of errors that can occur during a transformation run.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The source is not valid JSON or CSV, or holds something other than documents.
    ParseError,
    /// Reading the source failed.
    SourceIoError,
    /// Writing to the target failed.
    SinkError,
    /// The remote store could not provide identifiers.
    FetchError,
    /// Configuration or arguments are invalid.
    ValidationError,
    /// A component was used out of order.
    InvalidState,
    /// A document could not be serialized.
    SerializationError,
}

/// Main error type for transformation runs.
#[derive(Debug, Clone)]
pub struct TransformError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl TransformError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// The stored source is preserved across clones and exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`TransformError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        TransformError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

impl PartialEq for TransformError {
    fn eq(&self, other: &TransformError) -> bool {
        self.kind == other.kind && self.description == other.description
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        write_detail(self.detail.as_deref(), f, 1)?;
        write_backtrace(self.backtrace.as_ref(), f, 1)?;

        Ok(())
    }
}

impl error::Error for TransformError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Writes the captured backtrace with indentation.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() && !rendered_backtrace.contains("disabled") {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            if line.trim().is_empty() {
                write!(f, "\n{indent_str}  ")?;
            } else {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                if line.trim().is_empty() {
                    write!(f, "\n{indent_str}  ")?;
                } else {
                    write!(f, "\n{indent_str}  {line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Creates a [`TransformError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for TransformError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> TransformError {
        TransformError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`TransformError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for TransformError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> TransformError {
        TransformError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`ValidationError`] to [`TransformError`] with [`ErrorKind::ValidationError`].
impl From<ValidationError> for TransformError {
    #[track_caller]
    fn from(err: ValidationError) -> TransformError {
        let detail = err.to_string();
        TransformError::from_components(
            ErrorKind::ValidationError,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`TransformError`] with the appropriate error kind.
///
/// Syntax, data and end-of-input failures are parse errors; I/O failures can only come from the
/// writer side and map to [`ErrorKind::SinkError`].
impl From<serde_json::Error> for TransformError {
    #[track_caller]
    fn from(err: serde_json::Error) -> TransformError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::SinkError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::ParseError, "JSON deserialization failed")
            }
        };

        let detail = err.to_string();
        TransformError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`csv_async::Error`] to [`TransformError`].
impl From<csv_async::Error> for TransformError {
    #[track_caller]
    fn from(err: csv_async::Error) -> TransformError {
        let (kind, description) = if matches!(err.kind(), csv_async::ErrorKind::Io(_)) {
            (ErrorKind::SourceIoError, "CSV source read failed")
        } else {
            (ErrorKind::ParseError, "CSV parsing failed")
        };

        let detail = err.to_string();
        TransformError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`reqwest::Error`] to [`TransformError`] with [`ErrorKind::FetchError`].
impl From<reqwest::Error> for TransformError {
    #[track_caller]
    fn from(err: reqwest::Error) -> TransformError {
        let description = if err.is_decode() {
            "Identifier response could not be decoded"
        } else if err.is_status() {
            "Identifier request was rejected by the store"
        } else {
            "Identifier request failed"
        };

        let detail = err.to_string();
        TransformError::from_components(
            ErrorKind::FetchError,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
