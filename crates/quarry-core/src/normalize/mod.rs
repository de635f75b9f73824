//! Value normalizers.
//!
//! Pure functions that turn loosely shaped user input (primary key values,
//! criteria, new records, values to set) into canonical form against the
//! ontology. Each one fails with a [`NormalizeError`]; the forge owns the
//! mapping from these codes onto user-facing error codes.

mod coerce;
mod criteria;
mod pk;
mod record;
mod sort;
mod where_clause;


use crate::model::ontology::OntologyError;
use thiserror::Error as ThisError;

// re-exports
pub use criteria::{Criteria, normalize_criteria};
pub use pk::normalize_pk_values;
pub use record::{normalize_new_record, normalize_value_to_set};
pub use sort::{SortClause, SortDirection};

///
/// CONSTANTS
///

/// Largest integer exactly representable as an IEEE-754 double.
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Limit applied when criteria do not set one.
pub const DEFAULT_LIMIT: u64 = MAX_SAFE_INTEGER;

/// Skip applied when criteria do not set one.
pub const DEFAULT_SKIP: u64 = 0;

/// Selection marker meaning "every attribute".
pub const WILDCARD: &str = "*";

///
/// TypeSafety
///
/// Strict mode rejects any value whose JSON type differs from the declared
/// attribute type. Relaxed mode attempts loss-free coercion first.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TypeSafety {
    #[default]
    Strict,
    Relaxed,
}

impl TypeSafety {
    #[must_use]
    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

///
/// NormalizeError
///
/// Failure signals raised by the normalizers.
/// Which variants a given normalizer can raise is part of its contract.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum NormalizeError {
    #[error("{0}")]
    HighlyIrregular(String),

    #[error("{0}")]
    WouldResultInNothing(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    MissingRequired(String),

    #[error("{0}")]
    ShouldBeIgnored(String),

    #[error("{0}")]
    InvalidPkValue(String),

    #[error(transparent)]
    Ontology(#[from] OntologyError),
}

impl NormalizeError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::HighlyIrregular(_) => "E_HIGHLY_IRREGULAR",
            Self::WouldResultInNothing(_) => "E_WOULD_RESULT_IN_NOTHING",
            Self::Invalid(_) => "E_INVALID",
            Self::MissingRequired(_) => "E_MISSING_REQUIRED",
            Self::ShouldBeIgnored(_) => "E_SHOULD_BE_IGNORED",
            Self::InvalidPkValue(_) => "E_INVALID_PK_VALUE",
            Self::Ontology(err) => err.code(),
        }
    }

    pub(crate) fn irregular(message: impl Into<String>) -> Self {
        Self::HighlyIrregular(message.into())
    }
}
