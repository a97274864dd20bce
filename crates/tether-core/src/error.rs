//! Error taxonomy for the Tether pipeline.
//!
//! Three kinds of failure travel through a handler invocation:
//!
//! - [`InternalWarning`] – misuse of the adapter itself. Logged (unless
//!   silenced), published on the response's diagnostic channel, then swallowed.
//! - [`DomainError`] – an intentional, caller-facing failure carrying its own
//!   payload and status code.
//! - anything else – an unformatted error, boxed as [`BoxError`]. It never
//!   reaches the client verbatim.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Type-erased error used at every seam where user code can fail.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Domain errors
// =============================================================================

/// An intentional failure whose payload and status are sent to the client.
///
/// Handlers may either return it as a value or raise it through `Err`; both
/// paths end up in the same place.
///
/// # Example
///
/// ```rust
/// use tether_core::DomainError;
/// use http::StatusCode;
///
/// let err = DomainError::new(StatusCode::NOT_FOUND, "user not found");
/// assert_eq!(err.status(), StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("domain error ({status}): {payload}")]
pub struct DomainError {
    payload: Value,
    status: StatusCode,
}

impl DomainError {
    /// Creates a domain error from a status and any JSON-convertible payload.
    pub fn new(status: StatusCode, payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            status,
        }
    }

    /// Shorthand for a `400 Bad Request` domain error.
    pub fn bad_request(payload: impl Into<Value>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, payload)
    }

    /// Shorthand for a `404 Not Found` domain error.
    pub fn not_found(payload: impl Into<Value>) -> Self {
        Self::new(StatusCode::NOT_FOUND, payload)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Splits the error into its payload and status.
    pub fn into_parts(self) -> (Value, StatusCode) {
        (self.payload, self.status)
    }
}

// =============================================================================
// Internal warnings
// =============================================================================

/// A misuse of the adapter. Never sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal warning: {message}")]
pub struct InternalWarning {
    message: String,
}

impl InternalWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Raised when a result settles after another writer already sent headers.
    pub fn headers_sent() -> Self {
        Self::new("a handler result settled after the response headers were already sent")
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// =============================================================================
// Extraction errors
// =============================================================================

/// Errors that can occur while extracting handler parameters from an exchange.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// A path parameter the handler asked for was not captured by the route.
    #[error("missing path parameter '{0}'")]
    MissingParam(String),

    /// The request carried no body.
    #[error("request body is missing")]
    MissingBody,

    /// The request body could not be deserialized into the expected type.
    #[error("invalid request body for '{expected}': {reason}")]
    InvalidBody {
        /// Expected type name.
        expected: &'static str,
        /// Deserializer message.
        reason: String,
    },

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Extraction failures are the client's fault, so they surface as `400`.
impl From<ExtractError> for DomainError {
    fn from(err: ExtractError) -> Self {
        DomainError::bad_request(serde_json::json!({ "error": err.to_string() }))
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

// =============================================================================
// Failure
// =============================================================================

/// A raised failure, tagged by kind.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Warning(#[from] InternalWarning),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Other(BoxError),
}

impl Failure {
    /// Classifies a boxed error by downcasting to the known tags.
    ///
    /// A boxed `Failure` is unwrapped, so re-raising a failure keeps its kind.
    pub fn from_boxed(err: BoxError) -> Self {
        let err = match err.downcast::<Failure>() {
            Ok(failure) => return *failure,
            Err(err) => err,
        };
        let err = match err.downcast::<DomainError>() {
            Ok(domain) => return Failure::Domain(*domain),
            Err(err) => err,
        };
        let err = match err.downcast::<ExtractError>() {
            Ok(extract) => return Failure::Domain((*extract).into()),
            Err(err) => err,
        };
        match err.downcast::<InternalWarning>() {
            Ok(warning) => Failure::Warning(*warning),
            Err(err) => Failure::Other(err),
        }
    }

    /// Wraps any error, classifying it on the way in.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::from_boxed(err.into())
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Failure::Warning(_))
    }

    pub fn is_domain(&self) -> bool {
        matches!(self, Failure::Domain(_))
    }
}

impl From<ExtractError> for Failure {
    fn from(err: ExtractError) -> Self {
        Failure::Domain(err.into())
    }
}
