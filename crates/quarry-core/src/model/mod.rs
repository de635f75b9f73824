//! Runtime schema definitions.
//!
//! `model` holds the ontology the forge validates against: models, their
//! attributes and associations, and the [`ontology::Ontology`] capability
//! that resolves them by name.
pub mod attribute;
pub mod entity;
pub mod ontology;
