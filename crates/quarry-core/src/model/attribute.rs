use serde_json::Value;
use std::fmt::{self, Display};

///
/// AttributeType
///
/// Declared storage type of an attribute.
/// Association attributes carry `Ref`; their values are checked against the
/// associated model's primary key instead.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    Json,
    Ref,
}

impl AttributeType {
    /// Whether values of this type can be used as primary keys.
    #[must_use]
    pub const fn is_keyable(self) -> bool {
        matches!(self, Self::String | Self::Number)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Ref => "ref",
        }
    }
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// Association
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Association {
    /// Singular ("model") association: at most one associated record.
    Model { model: String },

    /// Plural ("collection") association: zero or more associated records.
    ///
    /// `via` names the attribute on the associated model that points back.
    /// `through` names a junction model for many-to-many associations.
    Collection {
        collection: String,
        via: Option<String>,
        through: Option<String>,
    },
}

impl Association {
    /// Identity of the associated model.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Model { model } => model,
            Self::Collection { collection, .. } => collection,
        }
    }
}

///
/// AttributeDef
///
/// Runtime attribute metadata used by normalization and join planning.
///

#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttributeType,
    pub association: Option<Association>,
    pub required: bool,
    pub default_value: Option<Value>,
    pub auto_increment: bool,

    /// Creation timestamp maintained by the adapter; updates never rewrite it.
    pub auto_created_at: bool,
}

impl AttributeDef {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
            association: None,
            required: false,
            default_value: None,
            auto_increment: false,
            auto_created_at: false,
        }
    }

    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String)
    }

    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Number)
    }

    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Boolean)
    }

    #[must_use]
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Json)
    }

    /// Singular association to `target`.
    #[must_use]
    pub fn model(name: impl Into<String>, target: impl Into<String>) -> Self {
        let mut attr = Self::new(name, AttributeType::Ref);
        attr.association = Some(Association::Model {
            model: target.into(),
        });
        attr
    }

    /// Plural association to `target`.
    #[must_use]
    pub fn collection(name: impl Into<String>, target: impl Into<String>) -> Self {
        let mut attr = Self::new(name, AttributeType::Ref);
        attr.association = Some(Association::Collection {
            collection: target.into(),
            via: None,
            through: None,
        });
        attr
    }

    /// Set the back-reference attribute of a plural association.
    #[must_use]
    pub fn via(mut self, attr: impl Into<String>) -> Self {
        if let Some(Association::Collection { via, .. }) = &mut self.association {
            *via = Some(attr.into());
        }
        self
    }

    /// Set the junction model of a plural association.
    #[must_use]
    pub fn through(mut self, junction: impl Into<String>) -> Self {
        if let Some(Association::Collection { through, .. }) = &mut self.association {
            *through = Some(junction.into());
        }
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub const fn auto_created_at(mut self) -> Self {
        self.auto_created_at = true;
        self
    }

    #[must_use]
    pub const fn is_singular_association(&self) -> bool {
        matches!(self.association, Some(Association::Model { .. }))
    }

    #[must_use]
    pub const fn is_plural_association(&self) -> bool {
        matches!(self.association, Some(Association::Collection { .. }))
    }
}
