//! Generic row mapper walking the [`MappingRule`] table in both directions.
//!
//! [`ExportRun`] turns application rows into exchange rows: it owns the run's
//! TID translator and basket pointer and guards references against the
//! adapted selection. [`ImportRun`] applies the inverse translation to rows
//! read back from the exchange schema. Each field kind pairs an export
//! normalizer with its inverse so that export followed by import is stable.

use std::collections::HashMap;

use log::{debug, info};
use thiserror::Error;

use crate::basket::{Basket, BasketAssigner, BasketError, Topic};
use crate::config::ExchangeConfig;
use crate::diagnostics::{Diagnostics, FieldSite, MappingWarning};
use crate::model::EntityType;
use crate::normalize::{blank_to_null, normalize_angle, null_to_blank, truncate};
use crate::rules::{
    FieldKind, LABEL_TEXT_LENGTH, Membership, MappingRule, RefScope, TEXT_POSITION_TABLE,
    TEXT_POSITION_TYPE,
};
use crate::selection::AdaptedSelection;
use crate::tid::{Tid, TidTranslator};
use crate::value::{Attributes, Value};
use crate::value_list::ValueLists;

/// A row of the application schema, keyed by application column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRecord {
    /// Natural key (`obj_id`).
    pub key: String,
    /// Column values.
    pub attributes: Attributes,
}

impl SourceRecord {
    /// Create a record without attributes.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: Attributes::new(),
        }
    }

    /// Set an attribute.
    #[must_use]
    pub fn with(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.attributes.insert(column, value.into());
        self
    }

    /// Text value of `column`, if any.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).and_then(Value::as_text)
    }
}

/// A row of the exchange schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRow {
    /// Exchange table receiving the row.
    pub table: &'static str,
    /// `t_id` of the row.
    pub tid: Tid,
    /// `t_basket` of the row.
    pub basket: Tid,
    /// `t_type` of the row.
    pub type_tag: &'static str,
    /// `t_ili_tid`: the natural key, absent for synthetic rows.
    pub natural_key: Option<String>,
    /// Mapped columns keyed by exchange column.
    pub columns: Attributes,
}

/// A label produced by external GIS tooling, exported as a text position.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Label {
    /// Natural key of the labelled element or structure.
    pub obj_id: String,
    /// Label text.
    #[cfg_attr(feature = "serde", serde(default))]
    pub text: Option<String>,
    /// Opaque anchor point geometry.
    #[cfg_attr(feature = "serde", serde(default))]
    pub position: Option<String>,
    /// Rotation in degrees.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rotation: Option<f64>,
}

/// Organisation display names keyed by organisation natural key.
#[derive(Debug, Clone, Default)]
pub struct OrganisationNames {
    names: HashMap<String, String>,
}

impl OrganisationNames {
    /// Register an organisation.
    pub fn insert(&mut self, key: impl Into<String>, name: impl Into<String>) {
        self.names.insert(key.into(), name.into());
    }

    /// Display name of the organisation `key`.
    pub fn name_for(&self, key: &str) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, N: Into<String>> FromIterator<(K, N)> for OrganisationNames {
    fn from_iter<I: IntoIterator<Item = (K, N)>>(iter: I) -> Self {
        let mut names = Self::default();
        for (key, name) in iter {
            names.insert(key, name);
        }
        names
    }
}

/// Natural keys of exchange rows keyed by `t_id`.
#[derive(Debug, Clone, Default)]
pub struct NaturalKeys {
    keys: HashMap<i64, String>,
}

impl NaturalKeys {
    /// Register the natural key of a row.
    pub fn insert(&mut self, tid: i64, key: impl Into<String>) {
        self.keys.insert(tid, key.into());
    }

    /// Natural key of the row with `t_id` `tid`.
    pub fn key_for(&self, tid: i64) -> Option<&str> {
        self.keys.get(&tid).map(String::as_str)
    }

    /// Number of known rows.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no row is known.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(i64, K)> for NaturalKeys {
    fn from_iter<I: IntoIterator<Item = (i64, K)>>(iter: I) -> Self {
        let mut keys = Self::default();
        for (tid, key) in iter {
            keys.insert(tid, key);
        }
        keys
    }
}

/// Structural failures of the export mapping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// Basket bookkeeping failed.
    #[error(transparent)]
    Basket(#[from] BasketError),
    /// A rule was mapped while another topic's basket was current.
    #[error("{entity} rows belong to topic {expected}, but basket {current} is current")]
    TopicMismatch {
        /// Entity type being mapped.
        entity: EntityType,
        /// Topic of the rule.
        expected: Topic,
        /// Topic of the current basket.
        current: Topic,
    },
    /// Exported rows reference keys that were never exported themselves.
    #[error("exported rows reference {} rows that were not exported: {}", .keys.len(), .keys.join(", "))]
    UnresolvedReferences {
        /// Referenced natural keys without a row.
        keys: Vec<String>,
    },
}

/// Summary of a completed export mapping.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// Warnings raised while mapping.
    pub diagnostics: Diagnostics,
    /// Baskets the rows were assigned to.
    pub baskets: Vec<Basket>,
    /// Number of natural keys translated to TIDs.
    pub translated_keys: usize,
}

/// State of one export run.
///
/// # Examples
/// ```
/// use netxfer_core::basket::Topic;
/// use netxfer_core::config::ExchangeConfig;
/// use netxfer_core::mapping::{ExportRun, OrganisationNames, SourceRecord};
/// use netxfer_core::model::EntityType;
/// use netxfer_core::rules::rule_for;
/// use netxfer_core::selection::AdaptedSelection;
/// use netxfer_core::tid::TidTranslator;
/// use netxfer_core::value_list::ValueLists;
///
/// let config = ExchangeConfig::default();
/// let selection = AdaptedSelection { whole_dataset: true, ..AdaptedSelection::default() };
/// let lists = ValueLists::new();
/// let organisations = OrganisationNames::default();
/// let mut run = ExportRun::new(&config, &selection, &lists, &organisations, TidTranslator::default());
/// run.begin_topic(Topic::Administration).expect("administration basket");
///
/// let rule = rule_for(EntityType::Organisation).expect("organisation rule");
/// let record = SourceRecord::new("org-1").with("identifier", "Stadt Bern");
/// let row = run.map_row(rule, record).expect("mapped row");
/// assert_eq!(row.natural_key.as_deref(), Some("org-1"));
/// assert!(run.finish().is_ok());
/// ```
#[derive(Debug)]
pub struct ExportRun<'a> {
    config: &'a ExchangeConfig,
    selection: &'a AdaptedSelection,
    value_lists: &'a ValueLists,
    organisations: &'a OrganisationNames,
    translator: TidTranslator,
    baskets: BasketAssigner,
    diagnostics: Diagnostics,
}

impl<'a> ExportRun<'a> {
    /// Start a run, allocating one basket per topic of the configured model.
    pub fn new(
        config: &'a ExchangeConfig,
        selection: &'a AdaptedSelection,
        value_lists: &'a ValueLists,
        organisations: &'a OrganisationNames,
        mut translator: TidTranslator,
    ) -> Self {
        let baskets = BasketAssigner::open(&config.dataset, config.model.topics(), &mut translator);
        Self {
            config,
            selection,
            value_lists,
            organisations,
            translator,
            baskets,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Baskets of the run.
    pub fn baskets(&self) -> &[Basket] {
        self.baskets.baskets()
    }

    /// Whether the model exports `topic`.
    pub fn exports_topic(&self, topic: Topic) -> bool {
        self.baskets.declares(topic)
    }

    /// Advance to the basket of `topic`.
    ///
    /// # Errors
    /// See [`BasketAssigner::switch_to`].
    pub fn begin_topic(&mut self, topic: Topic) -> Result<&Basket, BasketError> {
        let basket = self.baskets.switch_to(topic)?;
        info!("mapping topic {topic} into basket {}", basket.tid);
        Ok(basket)
    }

    /// Whether `record` of `rule` belongs to the export.
    pub fn admits(&self, rule: &MappingRule, record: &SourceRecord) -> bool {
        let selection = self.selection;
        match rule.membership {
            Membership::All => true,
            Membership::Structures => selection.contains_structure(&record.key),
            Membership::Elements => selection.contains_element(&record.key),
            Membership::OwnedBy(_) | Membership::Referencing(_) if selection.whole_dataset => true,
            Membership::OwnedBy(column) => record
                .text(column)
                .is_some_and(|owner| selection.contains_structure(owner)),
            Membership::Referencing(column) => record
                .text(column)
                .is_some_and(|element| selection.contains_element(element)),
        }
    }

    /// Map one application row into the current basket.
    ///
    /// # Errors
    /// [`MappingError::Basket`] before the first topic and
    /// [`MappingError::TopicMismatch`] when `rule` belongs to another topic.
    pub fn map_row(
        &mut self,
        rule: &MappingRule,
        mut record: SourceRecord,
    ) -> Result<ExchangeRow, MappingError> {
        let basket = self.current_basket_for(rule)?;
        let tid = self.translator.row_tid(&record.key);
        self.translator.mark_emitted(tid);

        let mut columns = Attributes::new();
        for field in rule.fields() {
            let value = record.attributes.remove(field.source).unwrap_or_default();
            let site = FieldSite::new(&record.key, field.source);
            let mapped = self.export_value(field.kind, value, site);
            columns.insert(field.target, mapped);
        }
        Ok(ExchangeRow {
            table: rule.exchange_table,
            tid,
            basket,
            type_tag: rule.type_tag,
            natural_key: Some(record.key),
            columns,
        })
    }

    /// Map a label into a text position row.
    ///
    /// Labels of objects outside the export are skipped.
    ///
    /// # Errors
    /// [`MappingError::Basket`] before the first topic.
    pub fn map_label(&mut self, label: Label) -> Result<Option<ExchangeRow>, MappingError> {
        let key = label.obj_id.as_str();
        if !self.selection.contains_element(key) && !self.selection.contains_structure(key) {
            debug!("skipping label of {key}, which is not exported");
            return Ok(None);
        }
        let basket = self.baskets.current()?.tid;
        let tid = self.translator.next_tid();
        self.translator.mark_emitted(tid);
        let labelled = self.translator.reference(key);

        let text = truncate(
            label.text,
            LABEL_TEXT_LENGTH,
            FieldSite::new(key, "plaintext"),
            &mut self.diagnostics,
        );
        let orientation = normalize_angle(label.rotation, self.config.label_orientation_offset);
        let columns = Attributes::from([
            ("plaintext", Value::from(text)),
            ("textpos", Value::from(label.position)),
            ("textori", Value::from(orientation)),
            ("labelled_object", Value::Integer(labelled.get())),
        ]);
        Ok(Some(ExchangeRow {
            table: TEXT_POSITION_TABLE,
            tid,
            basket,
            type_tag: TEXT_POSITION_TYPE,
            natural_key: None,
            columns,
        }))
    }

    /// Translate a reference if its target is part of the export.
    ///
    /// Targets outside the selection yield `None` and a
    /// [`MappingWarning::DanglingReference`].
    pub fn resolve_if_in_selection(
        &mut self,
        key: &str,
        scope: RefScope,
        site: FieldSite<'_>,
    ) -> Option<Tid> {
        let member = match scope {
            RefScope::Elements => self.selection.contains_element(key),
            RefScope::Structures => self.selection.contains_structure(key),
            RefScope::Unguarded => true,
        };
        if member {
            return Some(self.translator.reference(key));
        }
        self.diagnostics.record(MappingWarning::DanglingReference {
            key: site.key.to_owned(),
            field: site.field,
            reference: key.to_owned(),
        });
        None
    }

    /// Warnings recorded so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Finish the run, verifying that every reference points at an exported
    /// row.
    ///
    /// # Errors
    /// [`MappingError::UnresolvedReferences`] listing the missing keys.
    pub fn finish(self) -> Result<ExportOutcome, MappingError> {
        let unresolved = self.translator.unresolved_references();
        if !unresolved.is_empty() {
            return Err(MappingError::UnresolvedReferences {
                keys: unresolved.into_iter().map(str::to_owned).collect(),
            });
        }
        info!(
            "export mapping finished: {} keys translated, {} warnings",
            self.translator.translated_keys(),
            self.diagnostics.len()
        );
        Ok(ExportOutcome {
            translated_keys: self.translator.translated_keys(),
            baskets: self.baskets.baskets().to_vec(),
            diagnostics: self.diagnostics,
        })
    }

    fn current_basket_for(&self, rule: &MappingRule) -> Result<Tid, MappingError> {
        let basket = self.baskets.current()?;
        if basket.topic != rule.topic {
            return Err(MappingError::TopicMismatch {
                entity: rule.entity,
                expected: rule.topic,
                current: basket.topic,
            });
        }
        Ok(basket.tid)
    }

    fn export_value(&mut self, kind: FieldKind, value: Value, site: FieldSite<'_>) -> Value {
        match kind {
            FieldKind::Text { mandatory, max_len } => {
                let text = if mandatory {
                    Some(null_to_blank(value.into_text(), site, &mut self.diagnostics))
                } else {
                    blank_to_null(value.into_text(), site, &mut self.diagnostics)
                };
                Value::from(match max_len {
                    Some(limit) => truncate(text, limit, site, &mut self.diagnostics),
                    None => text,
                })
            }
            FieldKind::Plain => value,
            FieldKind::Code { list } => self.code_to_display(list, &value, site),
            FieldKind::Reference { scope } => value
                .into_text()
                .and_then(|key| self.resolve_if_in_selection(&key, scope, site))
                .map_or(Value::Null, |tid| Value::Integer(tid.get())),
            FieldKind::Organisation => match value.into_text() {
                None => Value::Null,
                Some(key) => {
                    if let Some(name) = self.organisations.name_for(&key) {
                        Value::from(name)
                    } else {
                        self.diagnostics.record(MappingWarning::DanglingReference {
                            key: site.key.to_owned(),
                            field: site.field,
                            reference: key,
                        });
                        Value::Null
                    }
                }
            },
        }
    }

    fn code_to_display(&mut self, list: &'static str, value: &Value, site: FieldSite<'_>) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        if let Some(display) = value
            .as_integer()
            .and_then(|code| self.value_lists.display_for(list, code))
        {
            return Value::from(display);
        }
        self.diagnostics.record(MappingWarning::ValueListMiss {
            key: site.key.to_owned(),
            field: site.field,
            list,
            value: value.clone().into_text().unwrap_or_default(),
        });
        Value::Null
    }
}

/// State of one import run.
#[derive(Debug)]
pub struct ImportRun<'a> {
    value_lists: &'a ValueLists,
    keys: &'a NaturalKeys,
    diagnostics: Diagnostics,
}

impl<'a> ImportRun<'a> {
    /// Start a run resolving references through `keys`.
    pub const fn new(value_lists: &'a ValueLists, keys: &'a NaturalKeys) -> Self {
        Self {
            value_lists,
            keys,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Map exchange columns of the row `key` back to application columns.
    ///
    /// Organisation names are handed to `resolve_organisation`, which returns
    /// the natural key of the matching or newly created organisation.
    ///
    /// # Errors
    /// Propagates errors of `resolve_organisation`.
    pub fn map_row<F, E>(
        &mut self,
        rule: &MappingRule,
        key: &str,
        mut columns: Attributes,
        mut resolve_organisation: F,
    ) -> Result<Attributes, E>
    where
        F: FnMut(&str) -> Result<String, E>,
    {
        let mut attributes = Attributes::new();
        for field in rule.fields() {
            let value = columns.remove(field.target).unwrap_or_default();
            let site = FieldSite::new(key, field.source);
            let mapped = match field.kind {
                FieldKind::Text {
                    mandatory: true, ..
                } => Value::from(blank_to_null(value.into_text(), site, &mut self.diagnostics)),
                FieldKind::Text { .. } | FieldKind::Plain => value,
                FieldKind::Code { list } => self.display_to_code(list, value, site),
                FieldKind::Reference { .. } => self.natural_key_for(&value, site),
                FieldKind::Organisation => match value.into_text() {
                    Some(name) if !name.is_empty() => Value::from(resolve_organisation(&name)?),
                    _ => Value::Null,
                },
            };
            attributes.insert(field.source, mapped);
        }
        Ok(attributes)
    }

    /// Warnings recorded so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Consume the run, returning its warnings.
    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn display_to_code(&mut self, list: &'static str, value: Value, site: FieldSite<'_>) -> Value {
        let Some(display) = value.into_text() else {
            return Value::Null;
        };
        if let Some(code) = self.value_lists.code_for(list, &display) {
            return Value::Integer(code);
        }
        self.diagnostics.record(MappingWarning::ValueListMiss {
            key: site.key.to_owned(),
            field: site.field,
            list,
            value: display,
        });
        Value::Null
    }

    fn natural_key_for(&mut self, value: &Value, site: FieldSite<'_>) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        if let Some(key) = value.as_integer().and_then(|tid| self.keys.key_for(tid)) {
            return Value::from(key);
        }
        self.diagnostics.record(MappingWarning::DanglingReference {
            key: site.key.to_owned(),
            field: site.field,
            reference: value.clone().into_text().unwrap_or_default(),
        });
        Value::Null
    }
}
