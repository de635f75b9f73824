use crate::{
    model::{entity::ModelDef, ontology::Ontology},
    normalize::{
        DEFAULT_LIMIT, DEFAULT_SKIP, NormalizeError, TypeSafety, WILDCARD,
        coerce::{as_whole_number, describe, parse_number},
        sort::{SortClause, normalize_sort},
        where_clause::normalize_where,
    },
};
use serde_json::{Map, Value};

const CLAUSE_KEYS: [&str; 6] = ["where", "limit", "skip", "sort", "select", "omit"];

///
/// Criteria
///
/// Canonical criteria. `select` and `omit` are always present after
/// normalization; the forge strips them for methods that cannot project.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Criteria {
    pub where_clause: Map<String, Value>,
    pub limit: u64,
    pub skip: u64,
    pub sort: Vec<SortClause>,
    pub select: Option<Vec<String>>,
    pub omit: Option<Vec<String>>,
}

impl Criteria {
    /// Whether `select` is absent or the wildcard selection.
    #[must_use]
    pub fn selects_everything(&self) -> bool {
        self.select
            .as_ref()
            .is_none_or(|select| select.iter().any(|attr| attr == WILDCARD))
    }

    /// Whether `attribute` is named as a sort key.
    #[must_use]
    pub fn sorts_by(&self, attribute: &str) -> bool {
        self.sort.iter().any(|clause| clause.attribute == attribute)
    }

    #[must_use]
    pub fn omits(&self, attribute: &str) -> bool {
        self.omit
            .as_ref()
            .is_some_and(|omit| omit.iter().any(|attr| attr == attribute))
    }

    /// Render back into the dictionary form accepted by [`normalize_criteria`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("where".to_string(), Value::Object(self.where_clause.clone()));
        map.insert("limit".to_string(), Value::from(self.limit));
        map.insert("skip".to_string(), Value::from(self.skip));
        map.insert(
            "sort".to_string(),
            Value::Array(self.sort.iter().map(SortClause::to_value).collect()),
        );
        if let Some(select) = &self.select {
            map.insert("select".to_string(), Value::from(select.clone()));
        }
        if let Some(omit) = &self.omit {
            map.insert("omit".to_string(), Value::from(omit.clone()));
        }

        Value::Object(map)
    }
}

/// Normalize criteria for `model`.
///
/// A bare primary key value (or array of them) is shorthand for a WHERE
/// clause on the primary key; a dictionary without any clause keys is the
/// WHERE clause itself.
pub fn normalize_criteria<O>(
    criteria: Value,
    model: &str,
    ontology: &O,
    safety: TypeSafety,
) -> Result<Criteria, NormalizeError>
where
    O: Ontology + ?Sized,
{
    let def = ontology.model(model)?;
    let mut clauses = expand_shorthand(def, criteria)?;

    let where_clause = normalize_where(ontology, def, clauses.remove("where"), safety)?;
    let limit = normalize_limit(clauses.remove("limit"), safety)?;
    let skip = normalize_skip(clauses.remove("skip"), safety)?;
    let sort = normalize_sort(def, clauses.remove("sort"))?;
    let select = normalize_select(def, clauses.remove("select"))?;
    let omit = normalize_omit(def, clauses.remove("omit"), &select)?;

    Ok(Criteria {
        where_clause,
        limit,
        skip,
        sort,
        select: Some(select),
        omit: Some(omit),
    })
}

fn expand_shorthand(def: &ModelDef, criteria: Value) -> Result<Map<String, Value>, NormalizeError> {
    let mut clauses = Map::new();

    match criteria {
        Value::Object(map) => {
            let clause_keys = map.keys().filter(|k| CLAUSE_KEYS.contains(&k.as_str())).count();
            if clause_keys == map.len() {
                return Ok(map);
            }
            if clause_keys > 0 {
                let stray: Vec<&str> = map
                    .keys()
                    .map(String::as_str)
                    .filter(|k| !CLAUSE_KEYS.contains(k))
                    .collect();
                return Err(NormalizeError::irregular(format!(
                    "unrecognized top-level criteria key(s) {stray:?}; attribute constraints belong inside 'where'"
                )));
            }
            clauses.insert("where".to_string(), Value::Object(map));
        }
        Value::String(_) | Value::Number(_) => {
            let mut where_clause = Map::new();
            where_clause.insert(def.primary_key.clone(), criteria);
            clauses.insert("where".to_string(), Value::Object(where_clause));
        }
        Value::Array(ids) => {
            let mut in_modifier = Map::new();
            in_modifier.insert("in".to_string(), Value::Array(ids));
            let mut where_clause = Map::new();
            where_clause.insert(def.primary_key.clone(), Value::Object(in_modifier));
            clauses.insert("where".to_string(), Value::Object(where_clause));
        }
        other => {
            return Err(NormalizeError::irregular(format!(
                "criteria must be a dictionary or primary key value(s), got {}",
                describe(&other)
            )));
        }
    }

    Ok(clauses)
}

fn normalize_limit(limit: Option<Value>, safety: TypeSafety) -> Result<u64, NormalizeError> {
    let limit = match limit {
        None | Some(Value::Null) => return Ok(DEFAULT_LIMIT),
        Some(value) => whole_number("limit", &value, safety)?,
    };
    if limit == 0 {
        return Err(NormalizeError::WouldResultInNothing(
            "a limit of 0 matches no records".to_string(),
        ));
    }

    Ok(limit.min(DEFAULT_LIMIT))
}

fn normalize_skip(skip: Option<Value>, safety: TypeSafety) -> Result<u64, NormalizeError> {
    match skip {
        None | Some(Value::Null) => Ok(DEFAULT_SKIP),
        Some(value) => whole_number("skip", &value, safety),
    }
}

fn whole_number(clause: &str, value: &Value, safety: TypeSafety) -> Result<u64, NormalizeError> {
    let parsed = match value {
        Value::String(raw) if !safety.is_strict() => parse_number(raw).map(Value::Number),
        other => Some(other.clone()),
    };

    parsed.as_ref().and_then(as_whole_number).ok_or_else(|| {
        NormalizeError::irregular(format!(
            "'{clause}' must be a non-negative integer, got {}",
            describe(value)
        ))
    })
}

fn normalize_select(def: &ModelDef, select: Option<Value>) -> Result<Vec<String>, NormalizeError> {
    let attrs = match select {
        None | Some(Value::Null) => return Ok(vec![WILDCARD.to_string()]),
        Some(value) => string_list("select", value)?,
    };
    if attrs.is_empty() {
        return Err(NormalizeError::irregular(
            "'select' cannot be an empty array",
        ));
    }
    if attrs.iter().any(|attr| attr == WILDCARD) {
        if attrs.len() > 1 {
            return Err(NormalizeError::irregular(
                "'select' cannot mix '*' with attribute names",
            ));
        }
        return Ok(attrs);
    }

    for attr in &attrs {
        match def.get(attr) {
            None => {
                return Err(NormalizeError::irregular(format!(
                    "cannot select '{attr}': no such attribute on model '{}'",
                    def.identity
                )));
            }
            Some(found) if found.is_plural_association() => {
                return Err(NormalizeError::irregular(format!(
                    "cannot select '{attr}': it is a plural association"
                )));
            }
            Some(_) => {}
        }
    }

    // the primary key is always fetched
    let mut selected = Vec::with_capacity(attrs.len() + 1);
    selected.push(def.primary_key.clone());
    for attr in attrs {
        if !selected.contains(&attr) {
            selected.push(attr);
        }
    }

    Ok(selected)
}

fn normalize_omit(
    def: &ModelDef,
    omit: Option<Value>,
    select: &[String],
) -> Result<Vec<String>, NormalizeError> {
    let attrs = match omit {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(value) => string_list("omit", value)?,
    };
    if attrs.is_empty() {
        return Ok(attrs);
    }
    if select.iter().all(|attr| attr != WILDCARD) {
        return Err(NormalizeError::irregular(
            "'omit' cannot be combined with an explicit 'select'",
        ));
    }

    let mut omitted: Vec<String> = Vec::with_capacity(attrs.len());
    for attr in attrs {
        if attr == def.primary_key {
            return Err(NormalizeError::irregular(format!(
                "cannot omit the primary key '{attr}'"
            )));
        }
        if def.get(&attr).is_none() {
            return Err(NormalizeError::irregular(format!(
                "cannot omit '{attr}': no such attribute on model '{}'",
                def.identity
            )));
        }
        if !omitted.contains(&attr) {
            omitted.push(attr);
        }
    }

    Ok(omitted)
}

fn string_list(clause: &str, value: Value) -> Result<Vec<String>, NormalizeError> {
    let Value::Array(items) = value else {
        return Err(NormalizeError::irregular(format!(
            "'{clause}' must be an array of attribute names, got {}",
            describe(&value)
        )));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) if !name.is_empty() => Ok(name),
            other => Err(NormalizeError::irregular(format!(
                "'{clause}' must only contain attribute names, got {}",
                describe(&other)
            ))),
        })
        .collect()
}
