//! In-memory join integration.
//!
//! Rebuilds populated associations from the flat per-table row sets a
//! storage adapter without native joins returns. Everything here is a pure
//! transform over rows already in memory.

mod integrate;
mod plan;
mod primitives;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

// re-exports
pub use integrate::{RowCache, integrate};
pub use plan::{PlanError, plan_populate_joins};
pub use primitives::{PopulateSpec, inner_join, left_outer_join, populate, qualify};

///
/// Cardinality
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    /// Singular association: a record or null.
    One,

    /// Plural association: an array, possibly empty.
    #[default]
    Many,
}

///
/// JoinInstruction
///
/// One relational hop. A populate through a junction model is two hops
/// sharing an alias; a direct association is one.
///
/// `child_pk` names the primary key of `child` and is always filled from
/// the ontology, since the join keys alone cannot determine it.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinInstruction {
    pub parent: String,
    pub child: String,
    pub parent_key: String,
    pub child_key: String,
    pub alias: String,
    pub child_pk: String,
    #[serde(default)]
    pub cardinality: Cardinality,
}

///
/// JoinError
///
/// Validation failures reported through the integrator's completion.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum JoinError {
    #[error("at least one join instruction is required")]
    NoInstructions,

    #[error("table '{table}' is not present in the row cache")]
    MissingTable { table: String },

    #[error("alias '{alias}' has {hops} join instructions; expected one or two")]
    MalformedAlias { alias: String, hops: usize },

    #[error("join instructions for alias '{alias}' do not form a chain: {message}")]
    ConflictingAlias { alias: String, message: String },
}
