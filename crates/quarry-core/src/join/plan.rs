use crate::{
    join::{Cardinality, JoinInstruction},
    model::{
        attribute::Association,
        entity::ModelDef,
        ontology::{Ontology, OntologyError},
    },
};
use thiserror::Error as ThisError;

///
/// PlanError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PlanError {
    #[error(transparent)]
    Ontology(#[from] OntologyError),

    #[error("'{attribute}' of model '{model}' is not an association")]
    NotAnAssociation { attribute: String, model: String },

    #[error("cannot join '{attribute}' of model '{model}': {reason}")]
    NoJoinPath {
        attribute: String,
        model: String,
        reason: String,
    },
}

/// Build the join instructions that populate `attr` on `model`.
///
/// Singular associations and plural ones declared `via` a back-reference
/// are one hop; plural associations `through` a junction model are two.
/// Every hop carries its child's primary key, read from the ontology.
pub fn plan_populate_joins<O>(
    ontology: &O,
    model: &str,
    attr: &str,
) -> Result<Vec<JoinInstruction>, PlanError>
where
    O: Ontology + ?Sized,
{
    let parent = ontology.model(model)?;
    let association = ontology.attribute(attr, model)?.association.as_ref().ok_or_else(|| {
        PlanError::NotAnAssociation {
            attribute: attr.to_string(),
            model: model.to_string(),
        }
    })?;

    let hop = |child: &ModelDef, parent_key: &str, child_key: &str, cardinality| JoinInstruction {
        parent: model.to_string(),
        child: child.identity.clone(),
        parent_key: parent_key.to_string(),
        child_key: child_key.to_string(),
        alias: attr.to_string(),
        child_pk: child.primary_key.clone(),
        cardinality,
    };

    match association {
        Association::Model { model: target } => {
            let child = ontology.model(target)?;
            Ok(vec![hop(child, attr, &child.primary_key, Cardinality::One)])
        }
        Association::Collection {
            collection,
            via,
            through: None,
        } => {
            let child = ontology.model(collection)?;
            let via = via.as_deref().ok_or_else(|| PlanError::NoJoinPath {
                attribute: attr.to_string(),
                model: model.to_string(),
                reason: "a plural association needs 'via' or 'through'".to_string(),
            })?;
            Ok(vec![hop(child, &parent.primary_key, via, Cardinality::Many)])
        }
        Association::Collection {
            collection,
            via,
            through: Some(junction),
        } => {
            let junction = ontology.model(junction)?;
            let child = ontology.model(collection)?;
            let (to_parent, to_child) = junction_links(junction, model, collection, via.as_deref())
                .ok_or_else(|| PlanError::NoJoinPath {
                    attribute: attr.to_string(),
                    model: model.to_string(),
                    reason: format!(
                        "junction '{}' must reference both '{model}' and '{collection}'",
                        junction.identity
                    ),
                })?;

            let to_junction = hop(junction, &parent.primary_key, to_parent, Cardinality::Many);
            let to_child = JoinInstruction {
                parent: junction.identity.clone(),
                ..hop(child, to_child, &child.primary_key, Cardinality::Many)
            };

            Ok(vec![to_junction, to_child])
        }
    }
}

/// Find the junction attributes referencing the parent and the child.
/// `via`, when given, names the parent side.
fn junction_links<'j>(
    junction: &'j ModelDef,
    parent: &str,
    child: &str,
    via: Option<&str>,
) -> Option<(&'j str, &'j str)> {
    let to_parent = match via {
        Some(via) => references(junction, parent).find(|name| *name == via)?,
        None => references(junction, parent).next()?,
    };
    let to_child = references(junction, child).find(|name| *name != to_parent)?;

    Some((to_parent, to_child))
}

/// Singular associations of `junction` pointing at `target`.
fn references<'j>(junction: &'j ModelDef, target: &str) -> impl Iterator<Item = &'j str> {
    junction
        .attributes
        .values()
        .filter(move |attr| {
            matches!(&attr.association, Some(Association::Model { model }) if model == target)
        })
        .map(|attr| attr.name.as_str())
}
