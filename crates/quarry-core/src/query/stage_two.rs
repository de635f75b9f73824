use crate::{
    Record,
    normalize::Criteria,
    query::{
        method::{
            KEY_ASSOCIATED_IDS, KEY_COLLECTION_ATTR_NAME, KEY_CRITERIA, KEY_EACH_BATCH_FN,
            KEY_EACH_RECORD_FN, KEY_META, KEY_METHOD, KEY_NEW_RECORD, KEY_NEW_RECORDS,
            KEY_NUMERIC_ATTR_NAME, KEY_POPULATES, KEY_TARGET_RECORD_IDS, KEY_USING,
            KEY_VALUES_TO_SET, Method,
        },
        stage_one::Iteratee,
    },
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

///
/// PopulateDirective
///
/// Normalized right-hand side of one `populates` entry.
///

#[derive(Clone, Debug, PartialEq)]
pub enum PopulateDirective {
    /// Singular association: fetch the one associated record.
    Singular,

    /// Plural association with its normalized sub-criteria.
    Plural(Criteria),
}

impl PopulateDirective {
    #[must_use]
    pub const fn subcriteria(&self) -> Option<&Criteria> {
        match self {
            Self::Singular => None,
            Self::Plural(criteria) => Some(criteria),
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Singular => Value::Bool(true),
            Self::Plural(criteria) => criteria.to_value(),
        }
    }
}

/// Populated association name to its directive.
pub type Populates = BTreeMap<String, PopulateDirective>;

///
/// StreamIteratee
///

#[derive(Clone, Debug)]
pub enum StreamIteratee {
    EachRecord(Iteratee),
    EachBatch(Iteratee),
}

impl StreamIteratee {
    /// Deliver one batch, one record at a time for each-record iteratees.
    pub fn deliver(&self, batch: &[Record]) {
        match self {
            Self::EachRecord(f) => {
                for record in batch {
                    f.call(std::slice::from_ref(record));
                }
            }
            Self::EachBatch(f) => f.call(batch),
        }
    }

    const fn key(&self) -> &'static str {
        match self {
            Self::EachRecord(_) => KEY_EACH_RECORD_FN,
            Self::EachBatch(_) => KEY_EACH_BATCH_FN,
        }
    }
}

///
/// CollectionOp
///

#[derive(Clone, Debug, PartialEq)]
pub struct CollectionOp {
    pub target_record_ids: Vec<Value>,
    pub collection_attr_name: String,
    pub associated_ids: Vec<Value>,
}

///
/// StageTwoOp
///
/// Method-specific payload of a forged query. Every field is canonical.
///

#[derive(Clone, Debug)]
pub enum StageTwoOp {
    Find {
        criteria: Criteria,
        populates: Populates,
    },
    FindOne {
        criteria: Criteria,
        populates: Populates,
    },
    Stream {
        criteria: Criteria,
        populates: Populates,
        iteratee: StreamIteratee,
    },
    Count {
        criteria: Criteria,
    },
    Sum {
        numeric_attr_name: String,
        criteria: Criteria,
    },
    Avg {
        numeric_attr_name: String,
        criteria: Criteria,
    },
    Create {
        new_record: Record,
    },
    CreateEach {
        new_records: Vec<Record>,
    },
    FindOrCreate {
        criteria: Criteria,
        new_record: Record,
    },
    Update {
        criteria: Criteria,
        values_to_set: Record,
    },
    Destroy {
        criteria: Criteria,
    },
    AddToCollection(CollectionOp),
    RemoveFromCollection(CollectionOp),
    ReplaceCollection(CollectionOp),
}

impl StageTwoOp {
    #[must_use]
    pub const fn method(&self) -> Method {
        match self {
            Self::Find { .. } => Method::Find,
            Self::FindOne { .. } => Method::FindOne,
            Self::Stream { .. } => Method::Stream,
            Self::Count { .. } => Method::Count,
            Self::Sum { .. } => Method::Sum,
            Self::Avg { .. } => Method::Avg,
            Self::Create { .. } => Method::Create,
            Self::CreateEach { .. } => Method::CreateEach,
            Self::FindOrCreate { .. } => Method::FindOrCreate,
            Self::Update { .. } => Method::Update,
            Self::Destroy { .. } => Method::Destroy,
            Self::AddToCollection(_) => Method::AddToCollection,
            Self::RemoveFromCollection(_) => Method::RemoveFromCollection,
            Self::ReplaceCollection(_) => Method::ReplaceCollection,
        }
    }

    #[must_use]
    pub const fn criteria(&self) -> Option<&Criteria> {
        match self {
            Self::Find { criteria, .. }
            | Self::FindOne { criteria, .. }
            | Self::Stream { criteria, .. }
            | Self::Count { criteria }
            | Self::Sum { criteria, .. }
            | Self::Avg { criteria, .. }
            | Self::FindOrCreate { criteria, .. }
            | Self::Update { criteria, .. }
            | Self::Destroy { criteria } => Some(criteria),
            Self::Create { .. }
            | Self::CreateEach { .. }
            | Self::AddToCollection(_)
            | Self::RemoveFromCollection(_)
            | Self::ReplaceCollection(_) => None,
        }
    }

    #[must_use]
    pub const fn populates(&self) -> Option<&Populates> {
        match self {
            Self::Find { populates, .. }
            | Self::FindOne { populates, .. }
            | Self::Stream { populates, .. } => Some(populates),
            _ => None,
        }
    }
}

///
/// StageTwoQuery
///
/// A validated, adapter-ready logical statement.
///

#[derive(Clone, Debug)]
pub struct StageTwoQuery {
    pub using: String,
    pub meta: Option<Map<String, Value>>,
    pub op: StageTwoOp,
}

impl StageTwoQuery {
    #[must_use]
    pub const fn method(&self) -> Method {
        self.op.method()
    }

    #[must_use]
    pub const fn criteria(&self) -> Option<&Criteria> {
        self.op.criteria()
    }

    #[must_use]
    pub const fn populates(&self) -> Option<&Populates> {
        self.op.populates()
    }

    /// Render as a dictionary for adapters that consume untyped statements.
    /// Iteratees appear as a placeholder string.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(KEY_USING.to_string(), Value::String(self.using.clone()));
        map.insert(
            KEY_METHOD.to_string(),
            Value::String(self.method().as_str().to_string()),
        );
        if let Some(meta) = &self.meta {
            map.insert(KEY_META.to_string(), Value::Object(meta.clone()));
        }
        if let Some(criteria) = self.criteria() {
            map.insert(KEY_CRITERIA.to_string(), criteria.to_value());
        }
        if let Some(populates) = self.populates() {
            let rendered = populates
                .iter()
                .map(|(attr, directive)| (attr.clone(), directive.to_value()))
                .collect();
            map.insert(KEY_POPULATES.to_string(), Value::Object(rendered));
        }

        match &self.op {
            StageTwoOp::Stream { iteratee, .. } => {
                map.insert(
                    iteratee.key().to_string(),
                    Value::String("<callable>".to_string()),
                );
            }
            StageTwoOp::Sum {
                numeric_attr_name, ..
            }
            | StageTwoOp::Avg {
                numeric_attr_name, ..
            } => {
                map.insert(
                    KEY_NUMERIC_ATTR_NAME.to_string(),
                    Value::String(numeric_attr_name.clone()),
                );
            }
            StageTwoOp::Create { new_record } | StageTwoOp::FindOrCreate { new_record, .. } => {
                map.insert(KEY_NEW_RECORD.to_string(), Value::Object(new_record.clone()));
            }
            StageTwoOp::CreateEach { new_records } => {
                map.insert(
                    KEY_NEW_RECORDS.to_string(),
                    Value::Array(new_records.iter().cloned().map(Value::Object).collect()),
                );
            }
            StageTwoOp::Update { values_to_set, .. } => {
                map.insert(
                    KEY_VALUES_TO_SET.to_string(),
                    Value::Object(values_to_set.clone()),
                );
            }
            StageTwoOp::AddToCollection(op)
            | StageTwoOp::RemoveFromCollection(op)
            | StageTwoOp::ReplaceCollection(op) => {
                map.insert(
                    KEY_TARGET_RECORD_IDS.to_string(),
                    Value::Array(op.target_record_ids.clone()),
                );
                map.insert(
                    KEY_COLLECTION_ATTR_NAME.to_string(),
                    Value::String(op.collection_attr_name.clone()),
                );
                map.insert(
                    KEY_ASSOCIATED_IDS.to_string(),
                    Value::Array(op.associated_ids.clone()),
                );
            }
            StageTwoOp::Find { .. }
            | StageTwoOp::FindOne { .. }
            | StageTwoOp::Count { .. }
            | StageTwoOp::Destroy { .. } => {}
        }

        Value::Object(map)
    }
}
