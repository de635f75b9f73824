use crate::{
    Record,
    model::{
        attribute::{Association, AttributeDef},
        ontology::{Ontology, OntologyError},
    },
    normalize::{
        NormalizeError, TypeSafety,
        coerce::{coerce_to_type, describe},
        normalize_pk_values,
        pk::normalize_pk_value,
    },
};
use serde_json::Value;

/// Normalize one value that is about to be written to `attr_name`.
///
/// Fails with `ShouldBeIgnored` for adapter-maintained attributes,
/// `HighlyIrregular` for unknown attributes and `Invalid` for values that
/// do not fit the declared type.
pub fn normalize_value_to_set<O>(
    value: &Value,
    attr_name: &str,
    model: &str,
    ontology: &O,
    safety: TypeSafety,
) -> Result<Value, NormalizeError>
where
    O: Ontology + ?Sized,
{
    let def = ontology.model(model)?;
    let attr = match ontology.attribute(attr_name, model) {
        Ok(attr) => attr,
        Err(OntologyError::AttrNotRegistered { .. }) => {
            return Err(NormalizeError::irregular(format!(
                "'{attr_name}' is not a recognized attribute of model '{model}'"
            )));
        }
        Err(err) => return Err(err.into()),
    };

    if attr.auto_created_at {
        return Err(NormalizeError::ShouldBeIgnored(format!(
            "'{attr_name}' is maintained automatically"
        )));
    }

    if value.is_null() {
        if attr.required || attr_name == def.primary_key || attr.is_plural_association() {
            return Err(NormalizeError::Invalid(format!(
                "'{attr_name}' cannot be set to null"
            )));
        }
        return Ok(Value::Null);
    }

    if attr_name == def.primary_key {
        return normalize_pk_value(value, attr.kind).map_err(|err| invalid_for(attr, &err));
    }

    match &attr.association {
        Some(Association::Model { model: target }) => {
            let pk_type = ontology.primary_key_type(target)?;
            normalize_pk_value(value, pk_type).map_err(|err| invalid_for(attr, &err))
        }
        Some(Association::Collection { collection, .. }) => {
            if !value.is_array() {
                return Err(NormalizeError::Invalid(format!(
                    "'{attr_name}' expects an array of '{collection}' primary keys, got {}",
                    describe(value)
                )));
            }
            let pk_type = ontology.primary_key_type(collection)?;
            normalize_pk_values(value, pk_type)
                .map(Value::Array)
                .map_err(|err| invalid_for(attr, &err))
        }
        None => coerce_to_type(value, attr.kind, safety).map_err(|mismatch| {
            NormalizeError::Invalid(format!("invalid value for '{attr_name}': {mismatch}"))
        }),
    }
}

/// Normalize a dictionary describing a record that is about to be created.
///
/// Supplied values go through [`normalize_value_to_set`]; missing
/// attributes receive their declared default (plural associations become
/// `[]`) or fail with `MissingRequired`.
pub fn normalize_new_record<O>(
    record: Value,
    model: &str,
    ontology: &O,
    safety: TypeSafety,
) -> Result<Record, NormalizeError>
where
    O: Ontology + ?Sized,
{
    let def = ontology.model(model)?;
    let Value::Object(supplied) = record else {
        return Err(NormalizeError::irregular(format!(
            "a new record must be a dictionary, got {}",
            describe(&record)
        )));
    };

    let mut normalized = Record::new();
    for (attr_name, value) in supplied {
        let auto_pk = attr_name == def.primary_key
            && def.primary_key_attribute().is_some_and(|pk| pk.auto_increment);
        if auto_pk && value.is_null() {
            continue;
        }

        match normalize_value_to_set(&value, &attr_name, model, ontology, safety) {
            Ok(value) => {
                normalized.insert(attr_name, value);
            }
            Err(NormalizeError::ShouldBeIgnored(_)) => {}
            Err(err) => return Err(err),
        }
    }

    for attr in def.attributes.values() {
        if normalized.contains_key(&attr.name) || attr.auto_created_at {
            continue;
        }

        if attr.name == def.primary_key {
            if attr.auto_increment {
                continue;
            }
            return Err(missing(model, attr));
        }
        if let Some(default) = &attr.default_value {
            normalized.insert(attr.name.clone(), default.clone());
        } else if attr.is_plural_association() {
            normalized.insert(attr.name.clone(), Value::Array(Vec::new()));
        } else if attr.required {
            return Err(missing(model, attr));
        }
    }

    Ok(normalized)
}

fn invalid_for(attr: &AttributeDef, err: &NormalizeError) -> NormalizeError {
    NormalizeError::Invalid(format!("invalid value for '{}': {err}", attr.name))
}

fn missing(model: &str, attr: &AttributeDef) -> NormalizeError {
    NormalizeError::MissingRequired(format!(
        "missing value for required attribute '{}' of model '{model}'",
        attr.name
    ))
}
