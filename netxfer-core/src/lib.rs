//! Exchange mapping engine for sewer-network asset data.
//!
//! The engine moves rows between an application schema and an exchange
//! schema shared with external transfer-file tooling. It performs no I/O:
//! storage adapters feed it [`mapping::SourceRecord`]s and a
//! [`model::NetworkSnapshot`] and persist what it returns.
//!
//! Export runs compute the referential closure of a partial selection
//! ([`closure`]), assign run-scoped TIDs ([`tid`]) and baskets ([`basket`])
//! and translate attributes through the declarative rule table ([`rules`],
//! [`mapping`]). Import runs reverse the translation and stage instances for
//! idempotent create-or-update ([`upsert`]).
#![forbid(unsafe_code)]

pub mod basket;
pub mod closure;
pub mod config;
pub mod diagnostics;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod rules;
pub mod selection;
pub mod tid;
pub mod upsert;
pub mod value;
pub mod value_list;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use basket::{Basket, BasketAssigner, BasketError, Topic};
pub use closure::resolve_closure;
pub use config::{
    ClosureOptions, ClosureStrategy, ExchangeConfig, ModelVariant, ValidationPolicy,
};
pub use diagnostics::{Diagnostics, FieldSite, MappingWarning};
pub use mapping::{
    ExchangeRow, ExportOutcome, ExportRun, ImportRun, Label, MappingError, NaturalKeys,
    OrganisationNames, SourceRecord,
};
pub use model::{
    ElementKind, EntityType, NetworkElement, NetworkSnapshot, StructureKind, StructureRecord,
    UnknownDiscriminator,
};
pub use rules::{FieldKind, MappingRule, RULES, rule_for, rules_for_topic};
pub use selection::{AdaptedSelection, Selection};
pub use tid::{Tid, TidTranslator};
pub use upsert::{InstanceState, InstanceStore, ReferenceResolver, StagedInstance, UpsertResolver};
pub use value::{Attributes, Value};
pub use value_list::{ValueListEntry, ValueLists};
