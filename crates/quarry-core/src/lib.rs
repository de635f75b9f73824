//! Query compilation core for an object-relational mapping layer: the
//! stage-two forge that validates and normalizes queries against an
//! ontology, and the in-memory join integrator that rebuilds populated
//! associations from flat row sets.

// public exports are one module level down
pub mod config;
pub mod error;
pub mod join;
pub mod model;
pub mod normalize;
pub mod obs;
pub mod query;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

/// One row or record: attribute name to value, in insertion order.
pub type Record = serde_json::Map<String, serde_json::Value>;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sinks or normalizer internals are re-exported here.
///

pub mod prelude {
    pub use crate::{
        Record,
        join::{Cardinality, JoinInstruction, RowCache},
        model::{
            attribute::{AttributeDef, AttributeType},
            entity::ModelDef,
            ontology::{Ontology, Schema},
        },
        query::{Method, QueryForge, RawQuery, StageOneQuery, StageTwoQuery},
    };
}
