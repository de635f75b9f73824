use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{
        attribute::{Association, AttributeDef, AttributeType},
        entity::ModelDef,
    },
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

///
/// OntologyError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum OntologyError {
    #[error("model '{identity}' is not registered")]
    ModelNotRegistered { identity: String },

    #[error("attribute '{attribute}' is not registered on model '{model}'")]
    AttrNotRegistered { attribute: String, model: String },

    #[error("model '{model}' is malformed: {message}")]
    InvalidModel { model: String, message: String },
}

impl OntologyError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ModelNotRegistered { .. } => "E_MODEL_NOT_REGISTERED",
            Self::AttrNotRegistered { .. } => "E_ATTR_NOT_REGISTERED",
            Self::InvalidModel { .. } => "E_INVALID_MODEL",
        }
    }
}

impl From<OntologyError> for InternalError {
    fn from(err: OntologyError) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Ontology,
            err.to_string(),
        )
    }
}

///
/// Ontology
///
/// Read-only schema capability consumed by the forge and the join planner.
/// Implementations must stay immutable for the duration of one call.
///

pub trait Ontology {
    /// Resolve a model definition by identity.
    fn model(&self, identity: &str) -> Result<&ModelDef, OntologyError>;

    /// Resolve one attribute of a model.
    fn attribute(&self, name: &str, model: &str) -> Result<&AttributeDef, OntologyError> {
        self.model(model)?
            .get(name)
            .ok_or_else(|| OntologyError::AttrNotRegistered {
                attribute: name.to_string(),
                model: model.to_string(),
            })
    }

    /// Whether the storage layer can satisfy a populate of `attr` natively.
    fn is_capable_of_optimized_populate(&self, attr: &str, model: &str) -> bool;

    /// Declared type of a model's primary key.
    fn primary_key_type(&self, model: &str) -> Result<AttributeType, OntologyError> {
        let def = self.model(model)?;
        Ok(self.attribute(&def.primary_key, model)?.kind)
    }
}

///
/// Schema
///
/// Immutable ontology snapshot. Built once and shared by reference.
///

#[derive(Clone, Debug, Default)]
pub struct Schema {
    models: BTreeMap<String, ModelDef>,
    join_capable_datastores: BTreeSet<String>,
}

impl Schema {
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    fn supports_native_joins(&self, datastore: &str) -> bool {
        self.join_capable_datastores.contains(datastore)
    }
}

impl Ontology for Schema {
    fn model(&self, identity: &str) -> Result<&ModelDef, OntologyError> {
        self.models
            .get(identity)
            .ok_or_else(|| OntologyError::ModelNotRegistered {
                identity: identity.to_string(),
            })
    }

    fn is_capable_of_optimized_populate(&self, attr: &str, model: &str) -> bool {
        let Ok(parent) = self.model(model) else {
            return false;
        };
        let Some(association) = parent.get(attr).and_then(|a| a.association.as_ref()) else {
            return false;
        };
        let Ok(child) = self.model(association.target()) else {
            return false;
        };

        // every model touched by the join must share one join-capable datastore
        let mut datastores = vec![&parent.datastore, &child.datastore];
        if let Association::Collection {
            through: Some(junction),
            ..
        } = association
        {
            match self.model(junction) {
                Ok(junction) => datastores.push(&junction.datastore),
                Err(_) => return false,
            }
        }

        datastores.iter().all(|ds| *ds == &parent.datastore)
            && self.supports_native_joins(&parent.datastore)
    }
}

///
/// SchemaBuilder
///

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    models: Vec<ModelDef>,
    join_capable_datastores: BTreeSet<String>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn model(mut self, model: ModelDef) -> Self {
        self.models.push(model);
        self
    }

    /// Mark a datastore as able to run joins natively.
    #[must_use]
    pub fn join_capable_datastore(mut self, datastore: impl Into<String>) -> Self {
        self.join_capable_datastores.insert(datastore.into());
        self
    }

    /// Validate cross-model references and freeze the snapshot.
    pub fn build(self) -> Result<Schema, OntologyError> {
        let mut models = BTreeMap::new();
        for model in self.models {
            if models.contains_key(&model.identity) {
                return Err(invalid(&model, "registered more than once"));
            }
            models.insert(model.identity.clone(), model);
        }

        for model in models.values() {
            let pk = model
                .primary_key_attribute()
                .ok_or_else(|| invalid(model, "primary key attribute is not declared"))?;
            if !pk.kind.is_keyable() {
                return Err(invalid(
                    model,
                    format!("primary key must be a string or number, found {}", pk.kind),
                ));
            }

            for attr in model.attributes.values() {
                let Some(association) = &attr.association else {
                    continue;
                };
                if !models.contains_key(association.target()) {
                    return Err(invalid(
                        model,
                        format!(
                            "association '{}' targets unknown model '{}'",
                            attr.name,
                            association.target()
                        ),
                    ));
                }
                if let Association::Collection {
                    through: Some(junction),
                    ..
                } = association
                    && !models.contains_key(junction)
                {
                    return Err(invalid(
                        model,
                        format!(
                            "association '{}' goes through unknown model '{junction}'",
                            attr.name
                        ),
                    ));
                }
            }
        }

        Ok(Schema {
            models,
            join_capable_datastores: self.join_capable_datastores,
        })
    }
}

fn invalid(model: &ModelDef, message: impl Into<String>) -> OntologyError {
    OntologyError::InvalidModel {
        model: model.identity.clone(),
        message: message.into(),
    }
}
