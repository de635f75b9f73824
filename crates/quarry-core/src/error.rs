use serde_json::Value;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Fatal error raised when a guarantee owed by the caller (or by a delegate)
/// does not hold. These are not user-facing validation outcomes and are not
/// meant to be handled gracefully: they indicate a bug upstream of the core.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// The offending value, when one exists.
    pub payload: Option<Value>,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            payload: None,
        }
    }

    /// Construct a query-origin consistency violation.
    pub(crate) fn query_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Query,
            message.into(),
        )
    }

    /// Construct a normalize-origin internal error for delegate failures
    /// the forge does not recognize at that boundary.
    pub(crate) fn normalize_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Normalize, message.into())
    }

    /// Attach the offending value as diagnostic payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self.class, ErrorClass::InvariantViolation)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// A precondition the caller was responsible for did not hold.
    InvariantViolation,
    /// A delegate failed in a way the boundary does not classify.
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvariantViolation => "invariant_violation",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Query,
    Ontology,
    Normalize,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Query => "query",
            Self::Ontology => "ontology",
            Self::Normalize => "normalize",
        };
        write!(f, "{label}")
    }
}
