use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for viewdex operations.
///
/// Each kind describes one category of failure in the view indexing and
/// query engine, enabling callers to match on the failure class without
/// parsing messages.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A map/reduce definition failed to compile; the view is unusable
    /// until recompiled
    CompileError,
    /// Update or query attempted on a view with no successful compile
    ViewNotReady,
    /// Contradictory or malformed query options
    InvalidQuery,
    /// A non-finite number or malformed structure was presented to the
    /// collation codec
    InvalidKey,
    /// Storage or transaction failure during an index update or scan
    IndexError,
    /// The requested entry does not exist (e.g. a stale full-text lookup)
    NotFound,
    /// The owning database has been closed or torn down
    DatabaseClosed,
    /// Generic IO error
    IOError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::CompileError => write!(f, "Compile error"),
            ErrorKind::ViewNotReady => write!(f, "View not ready"),
            ErrorKind::InvalidQuery => write!(f, "Invalid query"),
            ErrorKind::InvalidKey => write!(f, "Invalid key"),
            ErrorKind::IndexError => write!(f, "Index error"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::DatabaseClosed => write!(f, "Database closed"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom viewdex error type.
///
/// `ViewdexError` encapsulates the error message, kind, and an optional
/// cause. It supports error chaining and backtraces for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use viewdex::errors::{ViewdexError, ErrorKind, ViewdexResult};
///
/// fn example() -> ViewdexResult<()> {
///     Err(ViewdexError::new("view 'by_tag' has no compiled map function",
///                           ErrorKind::ViewNotReady))
/// }
/// ```
#[derive(Clone)]
pub struct ViewdexError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<ViewdexError>>,
    backtrace: Atomic<Backtrace>,
}

impl ViewdexError {
    /// Creates a new `ViewdexError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        ViewdexError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `ViewdexError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: ViewdexError) -> Self {
        ViewdexError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&Box<ViewdexError>> {
        self.cause.as_ref()
    }
}

impl Display for ViewdexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for ViewdexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for ViewdexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for viewdex operations.
///
/// `ViewdexResult<T>` is shorthand for `Result<T, ViewdexError>`.
/// All fallible viewdex operations return this type.
pub type ViewdexResult<T> = Result<T, ViewdexError>;

// From trait implementations for automatic error conversion
impl From<std::io::Error> for ViewdexError {
    fn from(err: std::io::Error) -> Self {
        ViewdexError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<std::string::FromUtf8Error> for ViewdexError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ViewdexError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::InvalidKey,
        )
    }
}

impl From<String> for ViewdexError {
    fn from(msg: String) -> Self {
        ViewdexError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for ViewdexError {
    fn from(msg: &str) -> Self {
        ViewdexError::new(msg, ErrorKind::InternalError)
    }
}
