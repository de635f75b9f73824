use crate::{
    error::InternalError,
    model::{
        attribute::{Association, AttributeDef},
        ontology::{Ontology, OntologyError},
    },
    normalize::{Criteria, DEFAULT_LIMIT, DEFAULT_SKIP, NormalizeError, normalize_criteria},
    obs::sink::DiagnosticEvent,
    query::{
        forge::{ForgeError, ForgePass, UsageErrorCode, unrecognized, usage},
        stage_one::Arg,
        stage_two::{PopulateDirective, Populates},
    },
};
use serde_json::{Map, Value};

impl<O: Ontology + ?Sized> ForgePass<'_, O> {
    /// Normalize the `populates` dictionary.
    ///
    /// `criteria` is the already-normalized primary criteria; a populated
    /// singular association's foreign key is appended to an explicit `select`.
    pub(super) fn populates(
        &self,
        populates: Option<Arg>,
        criteria: &mut Criteria,
    ) -> Result<Populates, ForgeError> {
        let entries = match populates {
            None => return Ok(Populates::new()),
            Some(Arg::Value(Value::Object(entries))) => entries,
            Some(_) => {
                return Err(usage(
                    UsageErrorCode::InvalidPopulates,
                    "'populates' must be a dictionary",
                ));
            }
        };

        let mut forged = Populates::new();
        for (attr_name, rhs) in entries {
            if matches!(rhs, Value::Null | Value::Bool(false)) {
                continue;
            }

            let directive = self.populate(&attr_name, rhs, criteria)?;
            forged.insert(attr_name, directive);
        }

        Ok(forged)
    }

    fn populate(
        &self,
        attr_name: &str,
        rhs: Value,
        criteria: &mut Criteria,
    ) -> Result<PopulateDirective, ForgeError> {
        if criteria.omits(attr_name) {
            return Err(usage(
                UsageErrorCode::InvalidPopulates,
                format!("cannot populate '{attr_name}' because it is also omitted"),
            ));
        }

        if criteria.sorts_by(attr_name) {
            return Err(usage(
                UsageErrorCode::InvalidPopulates,
                format!("cannot populate '{attr_name}' while also sorting by it"),
            ));
        }

        let attr = match self.ontology.attribute(attr_name, self.using) {
            Ok(attr) => Some(attr),
            Err(OntologyError::AttrNotRegistered { .. }) => None,
            Err(err) => return Err(err.into()),
        };

        // plural associations have no column on the parent to select
        if attr.is_some_and(AttributeDef::is_singular_association)
            && !criteria.selects_everything()
            && let Some(select) = criteria.select.as_mut()
            && !select.iter().any(|selected| selected == attr_name)
        {
            select.push(attr_name.to_string());
        }

        let association = attr.and_then(|attr| attr.association.as_ref());
        match association {
            Some(Association::Model { .. }) => singular(attr_name, rhs),
            Some(Association::Collection { collection, .. }) => {
                self.plural(attr_name, collection, rhs)
            }
            None => Err(usage(
                UsageErrorCode::InvalidPopulates,
                format!(
                    "'{attr_name}' is not an association of model '{}'",
                    self.using
                ),
            )),
        }
    }

    fn plural(
        &self,
        attr_name: &str,
        target: &str,
        rhs: Value,
    ) -> Result<PopulateDirective, ForgeError> {
        let rhs = match rhs {
            Value::Bool(true) => Value::Object(Map::new()),
            Value::Object(subcriteria) => Value::Object(subcriteria),
            other => {
                return Err(usage(
                    UsageErrorCode::InvalidPopulates,
                    format!(
                        "populating '{attr_name}' expects `true` or sub-criteria, got {other}"
                    ),
                ));
            }
        };

        let subcriteria = normalize_criteria(rhs.clone(), target, self.ontology, self.safety)
            .map_err(|err| match err {
                NormalizeError::HighlyIrregular(message) => usage(
                    UsageErrorCode::InvalidPopulates,
                    format!("invalid sub-criteria for '{attr_name}': {message}"),
                ),
                NormalizeError::WouldResultInNothing(message) => {
                    InternalError::query_invariant(format!(
                        "sub-criteria for '{attr_name}' can never match: {message}"
                    ))
                    .with_payload(rhs.clone())
                    .into()
                }
                other => unrecognized("the criteria normalizer", &other, rhs.clone()),
            })?;

        let custom_sort = !subcriteria.sort.is_empty();
        if subcriteria.sorts_by(attr_name) {
            return Err(usage(
                UsageErrorCode::InvalidPopulates,
                format!("sub-criteria for '{attr_name}' cannot sort by the association itself"),
            ));
        }

        if self.hardened
            && !self
                .ontology
                .is_capable_of_optimized_populate(attr_name, self.using)
            && (subcriteria.skip != DEFAULT_SKIP
                || subcriteria.limit != DEFAULT_LIMIT
                || custom_sort)
        {
            self.sink.record(DiagnosticEvent::UnoptimizedPopulate {
                model: self.using.to_string(),
                attribute: attr_name.to_string(),
                skip: subcriteria.skip,
                limit: subcriteria.limit,
                custom_sort,
            });
        }

        Ok(PopulateDirective::Plural(subcriteria))
    }
}

fn singular(attr_name: &str, rhs: Value) -> Result<PopulateDirective, ForgeError> {
    match rhs {
        Value::Bool(true) => Ok(PopulateDirective::Singular),
        Value::Object(subcriteria) if subcriteria.is_empty() => Ok(PopulateDirective::Singular),
        _ => Err(usage(
            UsageErrorCode::InvalidPopulates,
            format!(
                "'{attr_name}' is a singular association; at most one record can match, \
                 so sub-criteria are not allowed"
            ),
        )),
    }
}
