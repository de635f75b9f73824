use crate::{
    Record,
    error::InternalError,
    query::method::{
        KEY_ASSOCIATED_IDS, KEY_COLLECTION_ATTR_NAME, KEY_CRITERIA, KEY_EACH_BATCH_FN,
        KEY_EACH_RECORD_FN, KEY_META, KEY_METHOD, KEY_NEW_RECORD, KEY_NEW_RECORDS,
        KEY_NUMERIC_ATTR_NAME, KEY_POPULATES, KEY_TARGET_RECORD_IDS, KEY_USING,
        KEY_VALUES_TO_SET, Method,
    },
};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};

///
/// Iteratee
///
/// Callback handed to `stream`. Each-record iteratees receive a one-record
/// slice, each-batch iteratees receive the whole batch.
///

#[derive(Clone)]
pub struct Iteratee(Arc<dyn Fn(&[Record]) + Send + Sync>);

impl Iteratee {
    pub fn new(f: impl Fn(&[Record]) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, records: &[Record]) {
        (self.0)(records);
    }
}

impl fmt::Debug for Iteratee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Iteratee(<fn>)")
    }
}

///
/// Arg
///
/// One loosely shaped stage-1 value: plain data or a callable.
///

#[derive(Clone, Debug)]
pub enum Arg {
    Value(Value),
    Callable(Iteratee),
}

impl Arg {
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Callable(_) => None,
        }
    }

    /// Diagnostic rendering; callables become a placeholder string.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Callable(_) => Value::String("<callable>".to_string()),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Iteratee> for Arg {
    fn from(iteratee: Iteratee) -> Self {
        Self::Callable(iteratee)
    }
}

///
/// RawQuery
///
/// Untyped stage-1 dictionary, as it arrives from a dynamic caller.
/// Converting it into a [`StageOneQuery`] enforces the method table.
///

#[derive(Clone, Debug, Default)]
pub struct RawQuery {
    entries: BTreeMap<String, Arg>,
}

impl RawQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, arg: impl Into<Arg>) -> Self {
        self.insert(key, arg);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, arg: impl Into<Arg>) {
        self.entries.insert(key.into(), arg.into());
    }

    /// Build from a JSON dictionary.
    pub fn from_json(value: Value) -> Result<Self, InternalError> {
        let Value::Object(map) = value else {
            return Err(
                InternalError::query_invariant("a stage-1 query must be a dictionary")
                    .with_payload(value),
            );
        };

        Ok(Self {
            entries: map
                .into_iter()
                .map(|(key, value)| (key, Arg::Value(value)))
                .collect(),
        })
    }

    fn take(&mut self, key: &str) -> Option<Arg> {
        self.entries.remove(key)
    }

    fn take_name(&mut self, key: &str) -> Result<String, InternalError> {
        match self.take(key) {
            Some(Arg::Value(Value::String(name))) if !name.is_empty() => Ok(name),
            other => Err(InternalError::query_invariant(format!(
                "'{key}' must be a non-empty string"
            ))
            .with_payload(other.as_ref().map_or(Value::Null, Arg::to_payload))),
        }
    }
}

///
/// CollectionArgs
/// Stage-1 fields shared by the three collection methods.
///

#[derive(Clone, Debug, Default)]
pub struct CollectionArgs {
    pub target_record_ids: Option<Arg>,
    pub collection_attr_name: Option<Arg>,
    pub associated_ids: Option<Arg>,
}

///
/// StageOneOp
///
/// Tagged union keyed by method; each variant holds exactly its legal keys.
///

#[derive(Clone, Debug)]
pub enum StageOneOp {
    Find {
        criteria: Option<Arg>,
        populates: Option<Arg>,
    },
    FindOne {
        criteria: Option<Arg>,
        populates: Option<Arg>,
    },
    Stream {
        criteria: Option<Arg>,
        populates: Option<Arg>,
        each_record_fn: Option<Arg>,
        each_batch_fn: Option<Arg>,
    },
    Count {
        criteria: Option<Arg>,
    },
    Sum {
        numeric_attr_name: Option<Arg>,
        criteria: Option<Arg>,
    },
    Avg {
        numeric_attr_name: Option<Arg>,
        criteria: Option<Arg>,
    },
    Create {
        new_record: Option<Arg>,
    },
    CreateEach {
        new_records: Option<Arg>,
    },
    FindOrCreate {
        criteria: Option<Arg>,
        new_record: Option<Arg>,
    },
    Update {
        criteria: Option<Arg>,
        values_to_set: Option<Arg>,
    },
    Destroy {
        criteria: Option<Arg>,
    },
    AddToCollection(CollectionArgs),
    RemoveFromCollection(CollectionArgs),
    ReplaceCollection(CollectionArgs),
}

impl StageOneOp {
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

    fn from_raw(method: Method, raw: &mut RawQuery) -> Self {
        fn collection(raw: &mut RawQuery) -> CollectionArgs {
            CollectionArgs {
                target_record_ids: raw.take(KEY_TARGET_RECORD_IDS),
                collection_attr_name: raw.take(KEY_COLLECTION_ATTR_NAME),
                associated_ids: raw.take(KEY_ASSOCIATED_IDS),
            }
        }

        match method {
            Method::Find => Self::Find {
                criteria: raw.take(KEY_CRITERIA),
                populates: raw.take(KEY_POPULATES),
            },
            Method::FindOne => Self::FindOne {
                criteria: raw.take(KEY_CRITERIA),
                populates: raw.take(KEY_POPULATES),
            },
            Method::Stream => Self::Stream {
                criteria: raw.take(KEY_CRITERIA),
                populates: raw.take(KEY_POPULATES),
                each_record_fn: raw.take(KEY_EACH_RECORD_FN),
                each_batch_fn: raw.take(KEY_EACH_BATCH_FN),
            },
            Method::Count => Self::Count {
                criteria: raw.take(KEY_CRITERIA),
            },
            Method::Sum => Self::Sum {
                numeric_attr_name: raw.take(KEY_NUMERIC_ATTR_NAME),
                criteria: raw.take(KEY_CRITERIA),
            },
            Method::Avg => Self::Avg {
                numeric_attr_name: raw.take(KEY_NUMERIC_ATTR_NAME),
                criteria: raw.take(KEY_CRITERIA),
            },
            Method::Create => Self::Create {
                new_record: raw.take(KEY_NEW_RECORD),
            },
            Method::CreateEach => Self::CreateEach {
                new_records: raw.take(KEY_NEW_RECORDS),
            },
            Method::FindOrCreate => Self::FindOrCreate {
                criteria: raw.take(KEY_CRITERIA),
                new_record: raw.take(KEY_NEW_RECORD),
            },
            Method::Update => Self::Update {
                criteria: raw.take(KEY_CRITERIA),
                values_to_set: raw.take(KEY_VALUES_TO_SET),
            },
            Method::Destroy => Self::Destroy {
                criteria: raw.take(KEY_CRITERIA),
            },
            Method::AddToCollection => Self::AddToCollection(collection(raw)),
            Method::RemoveFromCollection => Self::RemoveFromCollection(collection(raw)),
            Method::ReplaceCollection => Self::ReplaceCollection(collection(raw)),
        }
    }
}

///
/// StageOneQuery
///

#[derive(Clone, Debug)]
pub struct StageOneQuery {
    pub using: String,
    pub meta: Option<Arg>,
    pub op: StageOneOp,
}

impl StageOneQuery {
    #[must_use]
    pub fn new(using: impl Into<String>, op: StageOneOp) -> Self {
        Self {
            using: using.into(),
            meta: None,
            op,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: impl Into<Arg>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.op.method()
    }
}

impl TryFrom<RawQuery> for StageOneQuery {
    type Error = InternalError;

    /// Enforce `using`, `method` and the allowed-keys table.
    ///
    /// Every failure here is a consistency violation: the caller was
    /// responsible for handing over a well-formed query.
    fn try_from(mut raw: RawQuery) -> Result<Self, Self::Error> {
        let using = raw.take_name(KEY_USING)?;
        let method_name = raw.take_name(KEY_METHOD)?;
        let method = Method::from_name(&method_name).ok_or_else(|| {
            InternalError::query_invariant(format!("unrecognized method '{method_name}'"))
                .with_payload(Value::String(method_name.clone()))
        })?;

        let extraneous: Vec<String> = raw
            .entries
            .keys()
            .filter(|key| !method.allows_key(key))
            .cloned()
            .collect();
        if !extraneous.is_empty() {
            return Err(InternalError::query_invariant(format!(
                "extraneous key(s) {extraneous:?} for method '{method}'"
            ))
            .with_payload(Value::from(extraneous)));
        }

        let meta = raw.take(KEY_META);
        let op = StageOneOp::from_raw(method, &mut raw);

        Ok(Self { using, meta, op })
    }
}
