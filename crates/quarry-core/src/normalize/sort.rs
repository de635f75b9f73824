use crate::{
    model::entity::ModelDef,
    normalize::{NormalizeError, coerce::describe},
};
use serde_json::{Map, Value};
use std::fmt::{self, Display};

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s.eq_ignore_ascii_case("asc") => Some(Self::Asc),
            Value::String(s) if s.eq_ignore_ascii_case("desc") => Some(Self::Desc),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(Self::Asc),
                Some(-1) => Some(Self::Desc),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// SortClause
/// One canonical sort key; renders as `{ "<attribute>": "ASC" | "DESC" }`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortClause {
    pub attribute: String,
    pub direction: SortDirection,
}

impl SortClause {
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            self.attribute.clone(),
            Value::String(self.direction.as_str().to_string()),
        );
        Value::Object(map)
    }
}

/// Normalize any accepted sort syntax into canonical sort clauses.
///
/// Accepted: `"age DESC"`, `"age DESC, name"`, arrays of such strings or of
/// single-key dictionaries, and a dictionary of `attribute: direction`.
pub(crate) fn normalize_sort(
    model: &ModelDef,
    sort: Option<Value>,
) -> Result<Vec<SortClause>, NormalizeError> {
    let Some(sort) = sort else {
        return Ok(Vec::new());
    };

    let mut clauses = Vec::new();
    match sort {
        Value::Null => {}
        Value::String(raw) => {
            for piece in raw.split(',') {
                clauses.push(parse_sort_string(piece)?);
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(raw) => clauses.push(parse_sort_string(&raw)?),
                    Value::Object(map) if map.len() == 1 => clauses.extend(parse_sort_map(map)?),
                    other => {
                        return Err(NormalizeError::irregular(format!(
                            "each sort entry must be a string or a single-key dictionary, got {}",
                            describe(&other)
                        )));
                    }
                }
            }
        }
        Value::Object(map) => clauses.extend(parse_sort_map(map)?),
        other => {
            return Err(NormalizeError::irregular(format!(
                "the sort clause cannot be {}",
                describe(&other)
            )));
        }
    }

    for (idx, clause) in clauses.iter().enumerate() {
        check_sortable(model, &clause.attribute)?;
        if clauses[..idx]
            .iter()
            .any(|earlier| earlier.attribute == clause.attribute)
        {
            return Err(NormalizeError::irregular(format!(
                "attribute '{}' appears in the sort clause more than once",
                clause.attribute
            )));
        }
    }

    Ok(clauses)
}

fn parse_sort_string(raw: &str) -> Result<SortClause, NormalizeError> {
    let mut parts = raw.split_whitespace();
    let (Some(attribute), direction, None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(NormalizeError::irregular(format!(
            "cannot parse sort expression '{raw}'; expected '<attribute> [ASC|DESC]'"
        )));
    };

    let direction = match direction {
        None => SortDirection::Asc,
        Some(word) => SortDirection::parse(&Value::String(word.to_string())).ok_or_else(|| {
            NormalizeError::irregular(format!("unknown sort direction '{word}' in '{raw}'"))
        })?,
    };

    Ok(SortClause {
        attribute: attribute.to_string(),
        direction,
    })
}

fn parse_sort_map(map: Map<String, Value>) -> Result<Vec<SortClause>, NormalizeError> {
    map.into_iter()
        .map(|(attribute, direction)| {
            let direction = SortDirection::parse(&direction).ok_or_else(|| {
                NormalizeError::irregular(format!(
                    "sort direction for '{attribute}' must be ASC, DESC, 1 or -1, got {}",
                    describe(&direction)
                ))
            })?;
            Ok(SortClause {
                attribute,
                direction,
            })
        })
        .collect()
}

fn check_sortable(model: &ModelDef, attribute: &str) -> Result<(), NormalizeError> {
    let Some(attr) = model.get(attribute) else {
        return Err(NormalizeError::irregular(format!(
            "cannot sort by '{attribute}': no such attribute on model '{}'",
            model.identity
        )));
    };
    if attr.is_plural_association() {
        return Err(NormalizeError::irregular(format!(
            "cannot sort by '{attribute}': it is a plural association"
        )));
    }

    Ok(())
}
