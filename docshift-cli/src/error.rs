use docshift::error::TransformError;
use docshift_config::shared::ValidationError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for command line operations.
pub type CliResult<T> = Result<T, CliError>;

/// Captured backtrace wrapper for variants that do not carry their own.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the `docshift` binary.
///
/// Wraps [`TransformError`] for failures during a run and provides variants for problems
/// detected before any file is touched.
#[derive(Debug)]
pub enum CliError {
    /// The transformation failed.
    Transform(TransformError),
    /// A command line argument is invalid.
    Usage(ValidationError, CapturedBacktrace),
    /// Configuration could not be loaded or is invalid.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error outside of a transformation, such as building the runtime.
    Io(std::io::Error, CapturedBacktrace),
}

impl CliError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Transform(_) => "transformation error",
            CliError::Usage(_, _) => "usage error",
            CliError::Config(_, _) => "configuration error",
            CliError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        match self {
            CliError::Transform(err) => err.backtrace(),
            CliError::Usage(_, cb) => &cb.0,
            CliError::Config(_, cb) => &cb.0,
            CliError::Io(_, cb) => &cb.0,
        }
    }

    /// Creates a configuration error from any source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        CliError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("docshift failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if matches!(self, CliError::Usage(_, _)) {
            out.push_str("run `docshift --help` for usage\n");
        }

        if should_render_backtrace() && !matches!(self, CliError::Transform(_)) {
            out.push_str("backtrace:\n");
            out.push_str(&self.backtrace().to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Transform(err) => write!(f, "{err}"),
            CliError::Usage(source, _) => write!(f, "{source}"),
            CliError::Config(source, _) => write!(f, "configuration error: {source}"),
            CliError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CliError::Transform(err) => err.source(),
            CliError::Usage(_, _) => None,
            CliError::Config(source, _) => Some(source.as_ref()),
            CliError::Io(source, _) => Some(source),
        }
    }
}

impl From<TransformError> for CliError {
    fn from(err: TransformError) -> Self {
        CliError::Transform(err)
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        CliError::Usage(err, CapturedBacktrace::capture())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err, CapturedBacktrace::capture())
    }
}
