use crate::{Record, join::Cardinality};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Largest integer an IEEE-754 double holds exactly.
const MAX_SAFE_FLOAT: f64 = 9_007_199_254_740_991.0;

/// Column name of `column` from `table` once merged into a joined row.
#[must_use]
pub fn qualify(table: &str, column: &str) -> String {
    format!("{table}.{column}")
}

/// Join key of a row. Missing and null keys never match anything.
fn key_of<'r>(row: &'r Record, key: &str) -> Option<&'r Value> {
    row.get(key).filter(|value| !value.is_null())
}

/// Canonical hash key for a join value.
///
/// Numbers compare by value, so an integral float such as `1.0` keys the
/// same as `1`. Strings stay apart from numbers: `1` and `"1"` never match.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn index_key(value: &Value) -> String {
    if let Value::Number(number) = value
        && let Some(float) = number.as_f64().filter(|_| number.is_f64())
        && float.trunc() == float
        && float.abs() <= MAX_SAFE_FLOAT
    {
        return (float as i64).to_string();
    }

    value.to_string()
}

fn index_rows<'r>(rows: &'r [Record], key: &str) -> HashMap<String, Vec<&'r Record>> {
    let mut index: HashMap<String, Vec<&Record>> = HashMap::new();
    for row in rows {
        if let Some(value) = key_of(row, key) {
            index.entry(index_key(value)).or_default().push(row);
        }
    }

    index
}

fn merge(left: &Record, right: &Record, right_table: &str) -> Record {
    let mut merged = left.clone();
    for (column, value) in right {
        merged.insert(qualify(right_table, column), value.clone());
    }

    merged
}

fn join(
    left: &[Record],
    right: &[Record],
    left_key: &str,
    right_key: &str,
    right_table: &str,
    keep_unmatched: bool,
) -> Vec<Record> {
    let index = index_rows(right, right_key);
    let mut joined = Vec::with_capacity(left.len());

    for row in left {
        let matches = key_of(row, left_key).and_then(|value| index.get(&index_key(value)));
        match matches {
            Some(matches) => {
                joined.extend(matches.iter().map(|right| merge(row, right, right_table)));
            }
            None if keep_unmatched => joined.push(row.clone()),
            None => {}
        }
    }

    joined
}

/// Every left row paired with each matching right row, or alone when
/// nothing matches. Right columns are qualified with `right_table`.
/// Left order is preserved and right matches are not deduplicated.
#[must_use]
pub fn left_outer_join(
    left: &[Record],
    right: &[Record],
    left_key: &str,
    right_key: &str,
    right_table: &str,
) -> Vec<Record> {
    join(left, right, left_key, right_key, right_table, true)
}

/// Left rows with at least one match, paired with each match.
#[must_use]
pub fn inner_join(
    left: &[Record],
    right: &[Record],
    left_key: &str,
    right_key: &str,
    right_table: &str,
) -> Vec<Record> {
    join(left, right, left_key, right_key, right_table, false)
}

///
/// PopulateSpec
///
/// How joined rows map back onto their parents.
///
/// `parent_key` correlates a parent row with the joined rows derived from
/// it. `fk_to_child` is the joined-row column holding the child's join
/// value; a joined row without it carries no child.
///

#[derive(Clone, Copy, Debug)]
pub struct PopulateSpec<'a> {
    pub alias: &'a str,
    pub parent_key: &'a str,
    pub child_table: &'a str,
    pub child_pk: &'a str,
    pub fk_to_child: &'a str,
    pub cardinality: Cardinality,
}

/// Attach the children found in `joined` to each parent under the alias.
///
/// Children are deduplicated per parent by their primary key, first seen
/// wins. Plural aliases always receive an array; singular ones receive the
/// child record or null.
pub fn populate(parents: &mut [Record], joined: &[Record], spec: &PopulateSpec<'_>) {
    let prefix = qualify(spec.child_table, "");
    let mut children: HashMap<String, Vec<Record>> = HashMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for row in joined {
        let (Some(parent), Some(_)) = (key_of(row, spec.parent_key), key_of(row, spec.fk_to_child))
        else {
            continue;
        };

        let child: Record = row
            .iter()
            .filter_map(|(column, value)| {
                column
                    .strip_prefix(&prefix)
                    .map(|column| (column.to_string(), value.clone()))
            })
            .collect();
        let parent = index_key(parent);
        let identity = key_of(&child, spec.child_pk).map(index_key);
        if let Some(identity) = identity
            && !seen.insert((parent.clone(), identity))
        {
            continue;
        }

        children.entry(parent).or_default().push(child);
    }

    for parent in parents {
        let group = key_of(parent, spec.parent_key)
            .and_then(|value| children.get(&index_key(value)))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let attached = match spec.cardinality {
            Cardinality::Many => Value::Array(group.iter().cloned().map(Value::Object).collect()),
            Cardinality::One => group
                .first()
                .cloned()
                .map_or(Value::Null, Value::Object),
        };
        parent.insert(spec.alias.to_string(), attached);
    }
}
