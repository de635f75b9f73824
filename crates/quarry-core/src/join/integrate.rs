use crate::{
    Record,
    join::{
        JoinError, JoinInstruction,
        primitives::{PopulateSpec, inner_join, left_outer_join, populate, qualify},
    },
};
use derive_more::{Deref, DerefMut, IntoIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

///
/// RowCache
///
/// Rows fetched for one query execution, keyed by table name.
/// Built by the adapter, consumed once by [`integrate`].
///

#[derive(
    Clone, Debug, Default, Deref, DerefMut, Deserialize, Eq, IntoIterator, PartialEq, Serialize,
)]
#[into_iterator(owned, ref)]
#[serde(transparent)]
pub struct RowCache(BTreeMap<String, Vec<Record>>);

impl RowCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>, rows: Vec<Record>) -> Self {
        self.0.insert(table.into(), rows);
        self
    }

    fn table(&self, table: &str) -> Result<&[Record], JoinError> {
        self.0
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| JoinError::MissingTable {
                table: table.to_string(),
            })
    }
}

impl FromIterator<(String, Vec<Record>)> for RowCache {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Record>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Integrate `cache` along `instructions` and hand the nested result set to
/// `done`.
///
/// The root result set is the cached rows of the first instruction's parent
/// table, each one carrying every alias once integration finishes. Failures
/// are delivered to `done` as values; this function never panics on bad
/// input. Completion currently runs before returning.
pub fn integrate<F>(cache: &RowCache, instructions: &[JoinInstruction], done: F)
where
    F: FnOnce(Result<Vec<Record>, JoinError>),
{
    done(integrate_rows(cache, instructions));
}

fn integrate_rows(
    cache: &RowCache,
    instructions: &[JoinInstruction],
) -> Result<Vec<Record>, JoinError> {
    let first = instructions.first().ok_or(JoinError::NoInstructions)?;
    let mut root = cache.table(&first.parent)?.to_vec();

    for (alias, hops) in group_by_alias(instructions) {
        match hops.as_slice() {
            [hop] => {
                expect_root(alias, hop, &first.parent)?;
                let child = cache.table(&hop.child)?;
                let joined = inner_join(&root, child, &hop.parent_key, &hop.child_key, &hop.child);
                let fk_to_child = qualify(&hop.child, &hop.child_key);

                attach(&mut root, &joined, hop, hop, &fk_to_child);
                debug!(alias, rows = joined.len(), hops = 1, "integrated alias");
            }
            [to_junction, to_child] => {
                expect_root(alias, to_junction, &first.parent)?;
                if to_child.parent != to_junction.child {
                    return Err(JoinError::ConflictingAlias {
                        alias: alias.to_string(),
                        message: format!(
                            "second hop starts at '{}' but the first hop ends at '{}'",
                            to_child.parent, to_junction.child
                        ),
                    });
                }

                let junction = cache.table(&to_junction.child)?;
                let child = cache.table(&to_child.child)?;
                let through = left_outer_join(
                    &root,
                    junction,
                    &to_junction.parent_key,
                    &to_junction.child_key,
                    &to_junction.child,
                );
                let joined = inner_join(
                    &through,
                    child,
                    &qualify(&to_child.parent, &to_child.parent_key),
                    &to_child.child_key,
                    &to_child.child,
                );
                let fk_to_child = qualify(&to_child.child, &to_child.child_key);

                attach(&mut root, &joined, to_junction, to_child, &fk_to_child);
                debug!(alias, rows = joined.len(), hops = 2, "integrated alias");
            }
            _ => {
                return Err(JoinError::MalformedAlias {
                    alias: alias.to_string(),
                    hops: hops.len(),
                });
            }
        }
    }

    Ok(root)
}

/// Correlate on the root hop's parent key; take the child shape from the
/// final hop.
fn attach(
    root: &mut [Record],
    joined: &[Record],
    root_hop: &JoinInstruction,
    final_hop: &JoinInstruction,
    fk_to_child: &str,
) {
    let spec = PopulateSpec {
        alias: &final_hop.alias,
        parent_key: &root_hop.parent_key,
        child_table: &final_hop.child,
        child_pk: &final_hop.child_pk,
        fk_to_child,
        cardinality: final_hop.cardinality,
    };

    populate(root, joined, &spec);
}

fn expect_root(alias: &str, hop: &JoinInstruction, root: &str) -> Result<(), JoinError> {
    if hop.parent == root {
        return Ok(());
    }

    Err(JoinError::ConflictingAlias {
        alias: alias.to_string(),
        message: format!(
            "first hop starts at '{}' but the result set is '{root}'",
            hop.parent
        ),
    })
}

/// Group instructions by alias, in first-seen order.
fn group_by_alias(instructions: &[JoinInstruction]) -> Vec<(&str, Vec<&JoinInstruction>)> {
    let mut groups: Vec<(&str, Vec<&JoinInstruction>)> = Vec::new();
    for instruction in instructions {
        match groups
            .iter_mut()
            .find(|(alias, _)| *alias == instruction.alias)
        {
            Some((_, hops)) => hops.push(instruction),
            None => groups.push((&instruction.alias, vec![instruction])),
        }
    }

    groups
}
