//! Query model and the stage-two forge.
//!
//! A stage-1 query is what a caller hands over: loosely shaped values keyed
//! by method. A stage-2 query is what a storage adapter receives: every field
//! canonical and consistent with the ontology.

pub mod forge;
pub mod method;
pub mod stage_one;
pub mod stage_two;


// re-exports
pub use forge::{
    ForgeError, QueryForge, UsageError, UsageErrorCode, forge_stage_two_query,
};
pub use method::Method;
pub use stage_one::{Arg, CollectionArgs, Iteratee, RawQuery, StageOneOp, StageOneQuery};
pub use stage_two::{
    CollectionOp, PopulateDirective, Populates, StageTwoOp, StageTwoQuery, StreamIteratee,
};
