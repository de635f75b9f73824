//! Stage-two query forge.
//!
//! Turns a [`StageOneQuery`] into a [`StageTwoQuery`] in a single pass.
//! Every delegated normalizer failure is re-classified here: the forge owns
//! the usage-error taxonomy, and anything it does not recognize is fatal.

mod populates;


use crate::{
    Record,
    config::ForgeConfig,
    error::InternalError,
    model::{
        attribute::{Association, AttributeDef, AttributeType},
        ontology::{Ontology, OntologyError},
    },
    normalize::{
        Criteria, NormalizeError, TypeSafety, normalize_criteria, normalize_new_record,
        normalize_pk_values, normalize_value_to_set,
    },
    obs::sink::{DiagnosticSink, TracingSink},
    query::{
        method::Method,
        stage_one::{Arg, CollectionArgs, RawQuery, StageOneOp, StageOneQuery},
        stage_two::{CollectionOp, StageTwoOp, StageTwoQuery, StreamIteratee},
    },
};
use serde_json::{Map, Value};
use std::fmt::{self, Display};
use thiserror::Error as ThisError;
use tracing::debug;

/// Meta key whose empty-string value relaxes type safety.
const META_TYPE_SAFETY: &str = "typeSafety";

static TRACING_SINK: TracingSink = TracingSink;

///
/// UsageErrorCode
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UsageErrorCode {
    InvalidMeta,
    InvalidCriteria,
    InvalidPopulates,
    InvalidNumericAttrName,
    InvalidStreamIteratee,
    InvalidNewRecord,
    InvalidNewRecords,
    InvalidValuesToSet,
    InvalidTargetRecordIds,
    InvalidCollectionAttrName,
    InvalidAssociatedIds,
}

impl UsageErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidMeta => "E_INVALID_META",
            Self::InvalidCriteria => "E_INVALID_CRITERIA",
            Self::InvalidPopulates => "E_INVALID_POPULATES",
            Self::InvalidNumericAttrName => "E_INVALID_NUMERIC_ATTR_NAME",
            Self::InvalidStreamIteratee => "E_INVALID_STREAM_ITERATEE",
            Self::InvalidNewRecord => "E_INVALID_NEW_RECORD",
            Self::InvalidNewRecords => "E_INVALID_NEW_RECORDS",
            Self::InvalidValuesToSet => "E_INVALID_VALUES_TO_SET",
            Self::InvalidTargetRecordIds => "E_INVALID_TARGET_RECORD_IDS",
            Self::InvalidCollectionAttrName => "E_INVALID_COLLECTION_ATTR_NAME",
            Self::InvalidAssociatedIds => "E_INVALID_ASSOCIATED_IDS",
        }
    }
}

impl Display for UsageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// UsageError
///
/// Expected, user-facing validation outcome. Callers branch on `code`.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{code}: {message}")]
pub struct UsageError {
    pub code: UsageErrorCode,
    pub message: String,

    /// Delegate detail, such as the normalizer message for one element.
    pub detail: Option<String>,
}

impl UsageError {
    pub fn new(code: UsageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

///
/// ForgeError
///

#[derive(Clone, Debug, ThisError)]
pub enum ForgeError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl ForgeError {
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    #[must_use]
    pub const fn usage_code(&self) -> Option<UsageErrorCode> {
        match self {
            Self::Usage(err) => Some(err.code),
            Self::Internal(_) => None,
        }
    }

    #[must_use]
    pub const fn as_internal(&self) -> Option<&InternalError> {
        match self {
            Self::Usage(_) => None,
            Self::Internal(err) => Some(err),
        }
    }
}

impl From<OntologyError> for ForgeError {
    fn from(err: OntologyError) -> Self {
        Self::Internal(err.into())
    }
}

fn usage(code: UsageErrorCode, message: impl Into<String>) -> ForgeError {
    UsageError::new(code, message).into()
}

/// Fatal error for a delegate failure the forge has no mapping for.
fn unrecognized(delegate: &str, err: &NormalizeError, payload: Value) -> ForgeError {
    InternalError::normalize_internal(format!(
        "unexpected {} from {delegate}: {err}",
        err.code()
    ))
    .with_payload(payload)
    .into()
}

///
/// QueryForge
///
/// Holds the injected collaborators of one forging context: the ontology,
/// the environment configuration and the diagnostic sink.
///

pub struct QueryForge<'a, O: Ontology + ?Sized> {
    ontology: &'a O,
    config: ForgeConfig,
    sink: &'a dyn DiagnosticSink,
}

impl<'a, O: Ontology + ?Sized> QueryForge<'a, O> {
    /// Forge against `ontology`, configured from the environment, reporting
    /// diagnostics through `tracing`.
    #[must_use]
    pub fn new(ontology: &'a O) -> Self {
        Self {
            ontology,
            config: ForgeConfig::from_env(),
            sink: &TRACING_SINK,
        }
    }

    #[must_use]
    pub const fn with_config(mut self, config: ForgeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }

    /// Parse an untyped query and forge it.
    pub fn forge_raw(&self, raw: RawQuery) -> Result<StageTwoQuery, ForgeError> {
        let query = StageOneQuery::try_from(raw)?;

        self.forge(query)
    }

    /// Validate and normalize a stage-1 query.
    pub fn forge(&self, query: StageOneQuery) -> Result<StageTwoQuery, ForgeError> {
        let StageOneQuery { using, meta, op } = query;
        let method = op.method();

        let (meta, safety) = forge_meta(meta)?;

        if let Err(err) = self.ontology.model(&using) {
            return Err(InternalError::query_invariant(format!(
                "'using' does not name a registered model: {err}"
            ))
            .with_payload(Value::String(using))
            .into());
        }

        let pass = ForgePass {
            ontology: self.ontology,
            sink: self.sink,
            hardened: self.config.hardened,
            using: &using,
            method,
            safety,
        };
        let op = pass.forge_op(op)?;

        debug!(model = %using, method = %method, ?safety, "forged stage-2 query");

        Ok(StageTwoQuery { using, meta, op })
    }
}

/// Forge with a default [`QueryForge`] for `ontology`.
pub fn forge_stage_two_query<O>(
    query: StageOneQuery,
    ontology: &O,
) -> Result<StageTwoQuery, ForgeError>
where
    O: Ontology + ?Sized,
{
    QueryForge::new(ontology).forge(query)
}

fn forge_meta(meta: Option<Arg>) -> Result<(Option<Map<String, Value>>, TypeSafety), ForgeError> {
    match meta {
        None => Ok((None, TypeSafety::Strict)),
        Some(Arg::Value(Value::Object(meta))) => {
            let safety = match meta.get(META_TYPE_SAFETY) {
                Some(Value::String(s)) if s.is_empty() => TypeSafety::Relaxed,
                _ => TypeSafety::Strict,
            };
            Ok((Some(meta), safety))
        }
        Some(other) => Err(UsageError::new(
            UsageErrorCode::InvalidMeta,
            "if provided, 'meta' must be a dictionary",
        )
        .with_detail(other.to_payload().to_string())
        .into()),
    }
}

///
/// ForgePass
/// State of one forging call, after meta and `using` have been checked.
///

struct ForgePass<'p, O: Ontology + ?Sized> {
    ontology: &'p O,
    sink: &'p dyn DiagnosticSink,
    hardened: bool,
    using: &'p str,
    method: Method,
    safety: TypeSafety,
}

impl<O: Ontology + ?Sized> ForgePass<'_, O> {
    fn forge_op(&self, op: StageOneOp) -> Result<StageTwoOp, ForgeError> {
        let op = match op {
            StageOneOp::Find {
                criteria,
                populates,
            } => {
                let mut criteria = self.criteria(criteria)?;
                let populates = self.populates(populates, &mut criteria)?;
                StageTwoOp::Find {
                    criteria,
                    populates,
                }
            }
            StageOneOp::FindOne {
                criteria,
                populates,
            } => {
                let mut criteria = self.criteria(criteria)?;
                let populates = self.populates(populates, &mut criteria)?;
                StageTwoOp::FindOne {
                    criteria,
                    populates,
                }
            }
            StageOneOp::Stream {
                criteria,
                populates,
                each_record_fn,
                each_batch_fn,
            } => {
                let mut criteria = self.criteria(criteria)?;
                let populates = self.populates(populates, &mut criteria)?;
                let iteratee = stream_iteratee(each_record_fn, each_batch_fn)?;
                StageTwoOp::Stream {
                    criteria,
                    populates,
                    iteratee,
                }
            }
            StageOneOp::Count { criteria } => StageTwoOp::Count {
                criteria: self.criteria(criteria)?,
            },
            StageOneOp::Sum {
                numeric_attr_name,
                criteria,
            } => {
                let criteria = self.criteria(criteria)?;
                StageTwoOp::Sum {
                    numeric_attr_name: self.numeric_attr_name(numeric_attr_name)?,
                    criteria,
                }
            }
            StageOneOp::Avg {
                numeric_attr_name,
                criteria,
            } => {
                let criteria = self.criteria(criteria)?;
                StageTwoOp::Avg {
                    numeric_attr_name: self.numeric_attr_name(numeric_attr_name)?,
                    criteria,
                }
            }
            StageOneOp::Create { new_record } => StageTwoOp::Create {
                new_record: self.new_record(new_record)?,
            },
            StageOneOp::CreateEach { new_records } => StageTwoOp::CreateEach {
                new_records: self.new_records(new_records)?,
            },
            StageOneOp::FindOrCreate {
                criteria,
                new_record,
            } => {
                let criteria = self.criteria(criteria)?;
                StageTwoOp::FindOrCreate {
                    criteria,
                    new_record: self.new_record(new_record)?,
                }
            }
            StageOneOp::Update {
                criteria,
                values_to_set,
            } => {
                let criteria = self.criteria(criteria)?;
                StageTwoOp::Update {
                    criteria,
                    values_to_set: self.values_to_set(values_to_set)?,
                }
            }
            StageOneOp::Destroy { criteria } => StageTwoOp::Destroy {
                criteria: self.criteria(criteria)?,
            },
            StageOneOp::AddToCollection(args) => {
                StageTwoOp::AddToCollection(self.collection(args)?)
            }
            StageOneOp::RemoveFromCollection(args) => {
                StageTwoOp::RemoveFromCollection(self.collection(args)?)
            }
            StageOneOp::ReplaceCollection(args) => {
                StageTwoOp::ReplaceCollection(self.collection(args)?)
            }
        };

        Ok(op)
    }

    // ---------------------------------------------------------------------
    // criteria
    // ---------------------------------------------------------------------

    fn criteria(&self, criteria: Option<Arg>) -> Result<Criteria, ForgeError> {
        let raw = match criteria {
            None => Value::Object(Map::new()),
            Some(Arg::Value(value)) => value,
            Some(Arg::Callable(_)) => {
                return Err(usage(
                    UsageErrorCode::InvalidCriteria,
                    "criteria cannot be a function",
                ));
            }
        };

        // must run before normalization fills in defaults
        self.check_criteria_clauses(&raw)?;

        let mut criteria = normalize_criteria(raw.clone(), self.using, self.ontology, self.safety)
            .map_err(|err| match err {
                NormalizeError::HighlyIrregular(message) => usage(
                    UsageErrorCode::InvalidCriteria,
                    format!("invalid criteria: {message}"),
                ),
                NormalizeError::WouldResultInNothing(message) => {
                    InternalError::query_invariant(format!(
                        "criteria that can never match should have been handled before \
                         forging: {message}"
                    ))
                    .with_payload(raw.clone())
                    .into()
                }
                other => unrecognized("the criteria normalizer", &other, raw.clone()),
            })?;

        if !self.method.can_project() {
            criteria.select = None;
            criteria.omit = None;
        }

        Ok(criteria)
    }

    fn check_criteria_clauses(&self, raw: &Value) -> Result<(), ForgeError> {
        let Value::Object(clauses) = raw else {
            return Ok(());
        };

        if !self.method.can_project() {
            for clause in ["select", "omit"] {
                if clauses.contains_key(clause) {
                    return Err(usage(
                        UsageErrorCode::InvalidCriteria,
                        format!(
                            "cannot use '{clause}' with method '{}'; it does not return records",
                            self.method
                        ),
                    ));
                }
            }
        }
        if !self.method.can_limit() && clauses.contains_key("limit") {
            return Err(usage(
                UsageErrorCode::InvalidCriteria,
                format!(
                    "cannot use 'limit' with method '{}'; it cannot bound the rows it affects",
                    self.method
                ),
            ));
        }

        Ok(())
    }

    // ---------------------------------------------------------------------
    // numericAttrName
    // ---------------------------------------------------------------------

    fn numeric_attr_name(&self, arg: Option<Arg>) -> Result<String, ForgeError> {
        let name = match arg {
            Some(Arg::Value(Value::String(name))) if !name.is_empty() => name,
            _ => {
                return Err(usage(
                    UsageErrorCode::InvalidNumericAttrName,
                    "please specify the numeric attribute as a non-empty string",
                ));
            }
        };

        let attr = self.resolve_attribute(&name, UsageErrorCode::InvalidNumericAttrName)?;
        if attr.kind != AttributeType::Number {
            return Err(usage(
                UsageErrorCode::InvalidNumericAttrName,
                format!(
                    "attribute '{name}' is declared as {}, not a number",
                    attr.kind
                ),
            ));
        }

        Ok(name)
    }

    // ---------------------------------------------------------------------
    // records
    // ---------------------------------------------------------------------

    fn new_record(&self, arg: Option<Arg>) -> Result<Record, ForgeError> {
        let raw = match arg {
            None => Value::Object(Map::new()),
            Some(Arg::Value(value)) => value,
            Some(Arg::Callable(_)) => {
                return Err(usage(
                    UsageErrorCode::InvalidNewRecord,
                    "a new record cannot be a function",
                ));
            }
        };

        normalize_new_record(raw.clone(), self.using, self.ontology, self.safety).map_err(|err| {
            match err {
                NormalizeError::Invalid(_)
                | NormalizeError::MissingRequired(_)
                | NormalizeError::HighlyIrregular(_) => usage(
                    UsageErrorCode::InvalidNewRecord,
                    format!("invalid new record: {err}"),
                ),
                other => unrecognized("the new record normalizer", &other, raw),
            }
        })
    }

    fn new_records(&self, arg: Option<Arg>) -> Result<Vec<Record>, ForgeError> {
        let Some(Arg::Value(Value::Array(items))) = arg else {
            return Err(usage(
                UsageErrorCode::InvalidNewRecords,
                "expecting an array of new records",
            ));
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                normalize_new_record(item.clone(), self.using, self.ontology, self.safety)
                    .map_err(|err| match err {
                        NormalizeError::Invalid(_)
                        | NormalizeError::MissingRequired(_)
                        | NormalizeError::HighlyIrregular(_) => UsageError::new(
                            UsageErrorCode::InvalidNewRecords,
                            format!("could not use the new record at index {index}"),
                        )
                        .with_detail(err.to_string())
                        .into(),
                        other => unrecognized("the new record normalizer", &other, item),
                    })
            })
            .collect()
    }

    fn values_to_set(&self, arg: Option<Arg>) -> Result<Record, ForgeError> {
        let Some(Arg::Value(Value::Object(values))) = arg else {
            return Err(usage(
                UsageErrorCode::InvalidValuesToSet,
                "expecting a dictionary of values to set",
            ));
        };

        let mut normalized = Record::new();
        for (attr_name, value) in values {
            match normalize_value_to_set(&value, &attr_name, self.using, self.ontology, self.safety)
            {
                Ok(value) => {
                    normalized.insert(attr_name, value);
                }
                Err(NormalizeError::ShouldBeIgnored(reason)) => {
                    debug!(attribute = %attr_name, %reason, "ignoring value to set");
                }
                Err(
                    err @ (NormalizeError::HighlyIrregular(_)
                    | NormalizeError::Invalid(_)
                    | NormalizeError::InvalidPkValue(_)),
                ) => {
                    return Err(UsageError::new(
                        UsageErrorCode::InvalidValuesToSet,
                        format!("could not use the value provided for '{attr_name}'"),
                    )
                    .with_detail(err.to_string())
                    .into());
                }
                Err(other) => {
                    return Err(unrecognized("the value-to-set normalizer", &other, value));
                }
            }
        }

        Ok(normalized)
    }

    // ---------------------------------------------------------------------
    // collections
    // ---------------------------------------------------------------------

    fn collection(&self, args: CollectionArgs) -> Result<CollectionOp, ForgeError> {
        let CollectionArgs {
            target_record_ids,
            collection_attr_name,
            associated_ids,
        } = args;

        let pk_type = self.ontology.primary_key_type(self.using)?;
        let target_record_ids = pk_values(
            target_record_ids,
            pk_type,
            UsageErrorCode::InvalidTargetRecordIds,
        )?;

        let collection_attr_name = match collection_attr_name {
            Some(Arg::Value(Value::String(name))) => name,
            _ => {
                return Err(usage(
                    UsageErrorCode::InvalidCollectionAttrName,
                    "expecting the name of a plural association as a string",
                ));
            }
        };
        let attr =
            self.resolve_attribute(&collection_attr_name, UsageErrorCode::InvalidCollectionAttrName)?;
        let target = match &attr.association {
            Some(association @ Association::Collection { .. }) => association.target().to_string(),
            _ => {
                return Err(usage(
                    UsageErrorCode::InvalidCollectionAttrName,
                    format!("'{collection_attr_name}' is not a plural association"),
                ));
            }
        };

        let associated_pk_type = self.ontology.primary_key_type(&target)?;
        let associated_ids = pk_values(
            associated_ids,
            associated_pk_type,
            UsageErrorCode::InvalidAssociatedIds,
        )?;

        Ok(CollectionOp {
            target_record_ids,
            collection_attr_name,
            associated_ids,
        })
    }

    /// Resolve an attribute of the queried model, reporting an unknown name
    /// with `code`.
    fn resolve_attribute(
        &self,
        name: &str,
        code: UsageErrorCode,
    ) -> Result<&AttributeDef, ForgeError> {
        match self.ontology.attribute(name, self.using) {
            Ok(attr) => Ok(attr),
            Err(OntologyError::AttrNotRegistered { .. }) => Err(usage(
                code,
                format!(
                    "there is no attribute named '{name}' on model '{}'",
                    self.using
                ),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

fn stream_iteratee(
    each_record_fn: Option<Arg>,
    each_batch_fn: Option<Arg>,
) -> Result<StreamIteratee, ForgeError> {
    match (each_record_fn, each_batch_fn) {
        (Some(Arg::Callable(f)), None) => Ok(StreamIteratee::EachRecord(f)),
        (None, Some(Arg::Callable(f))) => Ok(StreamIteratee::EachBatch(f)),
        (Some(_), Some(_)) => Err(usage(
            UsageErrorCode::InvalidStreamIteratee,
            "an iteratee must be provided as either 'eachRecordFn' or 'eachBatchFn', not both",
        )),
        (None, None) => Err(usage(
            UsageErrorCode::InvalidStreamIteratee,
            "an iteratee must be provided as either 'eachRecordFn' or 'eachBatchFn'",
        )),
        _ => Err(usage(
            UsageErrorCode::InvalidStreamIteratee,
            "the provided iteratee is not a function",
        )),
    }
}

fn pk_values(
    arg: Option<Arg>,
    pk_type: AttributeType,
    code: UsageErrorCode,
) -> Result<Vec<Value>, ForgeError> {
    let raw = match arg {
        Some(Arg::Value(value)) => value,
        Some(Arg::Callable(_)) | None => Value::Null,
    };

    normalize_pk_values(&raw, pk_type).map_err(|err| match err {
        NormalizeError::InvalidPkValue(message) => usage(code, message),
        other => unrecognized("the primary key normalizer", &other, raw.clone()),
    })
}
