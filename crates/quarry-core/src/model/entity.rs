use crate::model::attribute::AttributeDef;
use std::collections::BTreeMap;

/// Datastore assigned to models that do not name one.
pub const DEFAULT_DATASTORE: &str = "default";

///
/// ModelDef
/// Runtime definition of one registered model.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ModelDef {
    /// Stable identity used in `using` and association targets.
    pub identity: String,
    /// Name of the primary key attribute (points at an entry in `attributes`).
    pub primary_key: String,
    /// Datastore the model lives in.
    pub datastore: String,
    pub attributes: BTreeMap<String, AttributeDef>,
}

impl ModelDef {
    #[must_use]
    pub fn new(identity: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            primary_key: primary_key.into(),
            datastore: DEFAULT_DATASTORE.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn datastore(mut self, datastore: impl Into<String>) -> Self {
        self.datastore = datastore.into();
        self
    }

    /// Register an attribute, replacing any previous one with the same name.
    #[must_use]
    pub fn attribute(mut self, attr: AttributeDef) -> Self {
        self.attributes.insert(attr.name.clone(), attr);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn primary_key_attribute(&self) -> Option<&AttributeDef> {
        self.attributes.get(&self.primary_key)
    }
}
