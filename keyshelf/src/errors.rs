use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Error kinds for keyshelf operations.
///
/// Every fallible call returns one of these kinds so callers can branch on the
/// failure without parsing messages. `KeyNotFound` in particular is kept apart
/// from `ReadFailure` so an absent key never looks like a broken store.
///
/// # Examples
///
/// ```rust,ignore
/// use keyshelf::{ErrorKind, StoreAccessor};
///
/// match accessor.get("missing") {
///     Ok(value) => println!("{:?}", value),
///     Err(e) if e.kind() == &ErrorKind::KeyNotFound => println!("absent"),
///     Err(e) => return Err(e),
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// The storage path was changed while a connection is established
    AlreadyOpen,
    /// The engine could not open or create the store at the configured path
    OpenFailure,
    /// An operation ran without a live connection (released or force-closed)
    ConnectionInvalid,
    /// The engine rejected a write
    WriteFailure,
    /// The engine failed a read for a reason other than a missing key
    ReadFailure,
    /// Lookup miss
    KeyNotFound,
    /// The key could not be composed from the given segments
    InvalidKey,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::AlreadyOpen => write!(f, "Already open"),
            ErrorKind::OpenFailure => write!(f, "Open failure"),
            ErrorKind::ConnectionInvalid => write!(f, "Connection invalid"),
            ErrorKind::WriteFailure => write!(f, "Write failure"),
            ErrorKind::ReadFailure => write!(f, "Read failure"),
            ErrorKind::KeyNotFound => write!(f, "Key not found"),
            ErrorKind::InvalidKey => write!(f, "Invalid key"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Keyspace accessor error.
///
/// Carries a message, the [`ErrorKind`] callers match on, and an optional cause
/// for chained failures.
///
/// # Examples
///
/// ```rust,ignore
/// use keyshelf::{ErrorKind, ShelfError};
///
/// let err = ShelfError::new("Store is already open", ErrorKind::AlreadyOpen);
/// assert_eq!(err.kind(), &ErrorKind::AlreadyOpen);
/// ```
#[derive(Clone)]
pub struct ShelfError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<ShelfError>>,
}

impl ShelfError {
    /// Creates a new `ShelfError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        ShelfError {
            message: message.to_string(),
            error_kind,
            cause: None,
        }
    }

    /// Creates a new `ShelfError` wrapping the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: ShelfError) -> Self {
        ShelfError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&ShelfError> {
        self.cause.as_deref()
    }

    /// Shorthand for `kind() == &ErrorKind::KeyNotFound`.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.error_kind == ErrorKind::KeyNotFound
    }
}

impl Display for ShelfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for ShelfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})\nCaused by: {:?}", self.message, self.error_kind, cause),
            None => write!(f, "{} ({})", self.message, self.error_kind),
        }
    }
}

impl Error for ShelfError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// `ShelfResult<T>` is shorthand for `Result<T, ShelfError>`.
pub type ShelfResult<T> = Result<T, ShelfError>;

/// Wraps an engine error under the kind of the operation that hit it, keeping
/// the engine's own text in the message.
pub(crate) fn to_shelf_error(error: impl Error, kind: ErrorKind, context: &str) -> ShelfError {
    ShelfError::new(&format!("{}: {}", context, error), kind)
}

pub(crate) fn connection_invalid() -> ShelfError {
    ShelfError::new(
        "Store connection is invalid (released or force-closed)",
        ErrorKind::ConnectionInvalid,
    )
}
