use crate::{
    model::{
        attribute::{AttributeDef, AttributeType},
        entity::ModelDef,
        ontology::Ontology,
    },
    normalize::{
        NormalizeError, TypeSafety,
        coerce::{coerce_to_type, describe},
        pk::normalize_pk_value,
    },
};
use serde_json::{Map, Value};

const COMPARISON_MODIFIERS: [&str; 5] = ["<", "<=", ">", ">=", "!="];
const TEXT_MODIFIERS: [&str; 4] = ["like", "contains", "startsWith", "endsWith"];

/// Normalize a WHERE clause into canonical form.
///
/// Keys are attribute names or the `and` / `or` conjunctions. Attribute
/// constraints are either an equality value or a dictionary of modifiers;
/// an array is shorthand for `{ in: [...] }`.
pub(crate) fn normalize_where<O>(
    ontology: &O,
    model: &ModelDef,
    clause: Option<Value>,
    safety: TypeSafety,
) -> Result<Map<String, Value>, NormalizeError>
where
    O: Ontology + ?Sized,
{
    let clause = match clause {
        None => return Ok(Map::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(NormalizeError::irregular(format!(
                "the where clause must be a dictionary, got {}",
                describe(&other)
            )));
        }
    };

    let ctx = WhereContext {
        ontology,
        model,
        safety,
    };

    ctx.normalize_branch(clause)
}

struct WhereContext<'a, O: ?Sized> {
    ontology: &'a O,
    model: &'a ModelDef,
    safety: TypeSafety,
}

impl<O> WhereContext<'_, O>
where
    O: Ontology + ?Sized,
{
    fn normalize_branch(&self, clause: Map<String, Value>) -> Result<Map<String, Value>, NormalizeError> {
        let mut normalized = Map::new();

        for (key, rhs) in clause {
            let rhs = match key.as_str() {
                "and" | "or" => self.normalize_conjunction(&key, rhs)?,
                _ => self.normalize_constraint(&key, rhs)?,
            };
            normalized.insert(key, rhs);
        }

        Ok(normalized)
    }

    fn normalize_conjunction(&self, key: &str, rhs: Value) -> Result<Value, NormalizeError> {
        let Value::Array(branches) = rhs else {
            return Err(NormalizeError::irregular(format!(
                "'{key}' must be an array of dictionaries, got {}",
                describe(&rhs)
            )));
        };
        if key == "or" && branches.is_empty() {
            return Err(NormalizeError::WouldResultInNothing(
                "an empty 'or' matches no records".to_string(),
            ));
        }

        let mut normalized = Vec::with_capacity(branches.len());
        for branch in branches {
            let Value::Object(branch) = branch else {
                return Err(NormalizeError::irregular(format!(
                    "every branch of '{key}' must be a dictionary, got {}",
                    describe(&branch)
                )));
            };
            normalized.push(Value::Object(self.normalize_branch(branch)?));
        }

        Ok(Value::Array(normalized))
    }

    fn normalize_constraint(&self, attribute: &str, rhs: Value) -> Result<Value, NormalizeError> {
        let attr = self.model.get(attribute).ok_or_else(|| {
            NormalizeError::irregular(format!(
                "cannot filter by '{attribute}': no such attribute on model '{}'",
                self.model.identity
            ))
        })?;
        if attr.is_plural_association() {
            return Err(NormalizeError::irregular(format!(
                "cannot filter by '{attribute}': it is a plural association"
            )));
        }

        match rhs {
            Value::Array(items) => {
                let mut modifiers = Map::new();
                modifiers.insert("in".to_string(), Value::Array(items));
                self.normalize_modifiers(attr, modifiers)
            }
            Value::Object(modifiers) => self.normalize_modifiers(attr, modifiers),
            eq => self.normalize_eq_value(attr, &eq),
        }
    }

    fn normalize_modifiers(
        &self,
        attr: &AttributeDef,
        modifiers: Map<String, Value>,
    ) -> Result<Value, NormalizeError> {
        if modifiers.is_empty() {
            return Err(NormalizeError::irregular(format!(
                "the constraint for '{}' is an empty dictionary",
                attr.name
            )));
        }

        let mut normalized = Map::new();
        for (modifier, operand) in modifiers {
            let operand = match modifier.as_str() {
                "in" | "nin" => self.normalize_set_operand(attr, &modifier, operand)?,
                m if COMPARISON_MODIFIERS.contains(&m) => self.normalize_eq_value(attr, &operand)?,
                m if TEXT_MODIFIERS.contains(&m) => normalize_text_operand(attr, m, operand)?,
                other => {
                    return Err(NormalizeError::irregular(format!(
                        "unrecognized modifier '{other}' in the constraint for '{}'",
                        attr.name
                    )));
                }
            };
            normalized.insert(modifier, operand);
        }

        Ok(Value::Object(normalized))
    }

    fn normalize_set_operand(
        &self,
        attr: &AttributeDef,
        modifier: &str,
        operand: Value,
    ) -> Result<Value, NormalizeError> {
        let Value::Array(items) = operand else {
            return Err(NormalizeError::irregular(format!(
                "'{modifier}' for '{}' must be an array, got {}",
                attr.name,
                describe(&operand)
            )));
        };
        if modifier == "in" && items.is_empty() {
            return Err(NormalizeError::WouldResultInNothing(format!(
                "'in' with an empty array for '{}' matches no records",
                attr.name
            )));
        }

        let mut normalized: Vec<Value> = Vec::with_capacity(items.len());
        for item in &items {
            let item = self.normalize_eq_value(attr, item)?;
            if !normalized.contains(&item) {
                normalized.push(item);
            }
        }

        Ok(Value::Array(normalized))
    }

    fn normalize_eq_value(&self, attr: &AttributeDef, value: &Value) -> Result<Value, NormalizeError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if matches!(value, Value::Array(_) | Value::Object(_))
            && !matches!(attr.kind, AttributeType::Json | AttributeType::Ref)
        {
            return Err(NormalizeError::irregular(format!(
                "cannot compare '{}' against {}",
                attr.name,
                describe(value)
            )));
        }

        // keys and foreign keys compare as the referenced primary key type
        let key_type = if attr.name == self.model.primary_key {
            Some(attr.kind)
        } else if let Some(association) = &attr.association {
            Some(self.ontology.primary_key_type(association.target())?)
        } else {
            None
        };

        match key_type {
            Some(pk_type) => normalize_pk_value(value, pk_type).map_err(|err| {
                NormalizeError::irregular(format!("invalid value for '{}': {err}", attr.name))
            }),
            None => coerce_to_type(value, attr.kind, self.safety).map_err(|mismatch| {
                NormalizeError::irregular(format!("invalid value for '{}': {mismatch}", attr.name))
            }),
        }
    }
}

fn normalize_text_operand(
    attr: &AttributeDef,
    modifier: &str,
    operand: Value,
) -> Result<Value, NormalizeError> {
    if matches!(attr.kind, AttributeType::Number | AttributeType::Boolean) {
        return Err(NormalizeError::irregular(format!(
            "'{modifier}' cannot be used with '{}', which is a {}",
            attr.name, attr.kind
        )));
    }
    match operand {
        Value::String(_) => Ok(operand),
        other => Err(NormalizeError::irregular(format!(
            "'{modifier}' for '{}' must be a string, got {}",
            attr.name,
            describe(&other)
        ))),
    }
}
