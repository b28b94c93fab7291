//! Test doubles and fixtures shared by unit and behaviour tests.
//!
//! Enabled for this crate's own tests and, for downstream crates, through the
//! `test-support` feature.

use std::collections::BTreeMap;
use std::convert::Infallible;

use crate::model::{EntityType, NetworkElement, NetworkSnapshot, StructureKind, StructureRecord};
use crate::upsert::{InstanceStore, StagedInstance};
use crate::value::{Attributes, Value};
use crate::value_list::{ValueListEntry, ValueLists};

/// In-memory [`InstanceStore`] keyed by entity type and natural key.
#[derive(Debug, Default, Clone)]
pub struct MemoryInstanceStore {
    rows: BTreeMap<(EntityType, String), Attributes>,
    writes: usize,
}

impl MemoryInstanceStore {
    /// Seed a persisted instance.
    pub fn insert(&mut self, entity: EntityType, key: &str, attributes: Attributes) {
        self.rows.insert((entity, key.to_owned()), attributes);
    }

    /// Persisted attributes of `key`.
    pub fn attributes(&self, entity: EntityType, key: &str) -> Option<&Attributes> {
        self.rows.get(&(entity, key.to_owned()))
    }

    /// Number of persisted instances of `entity`.
    pub fn count(&self, entity: EntityType) -> usize {
        self.rows
            .keys()
            .filter(|(stored, _)| *stored == entity)
            .count()
    }

    /// Number of writes performed.
    pub const fn writes(&self) -> usize {
        self.writes
    }
}

impl InstanceStore for MemoryInstanceStore {
    type Error = Infallible;

    fn load(&self, entity: EntityType, key: &str) -> Result<Option<Attributes>, Self::Error> {
        Ok(self.attributes(entity, key).cloned())
    }

    fn find_key_by(
        &self,
        entity: EntityType,
        column: &'static str,
        value: &Value,
    ) -> Result<Option<String>, Self::Error> {
        Ok(self
            .rows
            .iter()
            .find(|((stored, _), attributes)| {
                *stored == entity && attributes.get(column) == Some(value)
            })
            .map(|((_, key), _)| key.clone()))
    }

    fn write(&mut self, instance: &StagedInstance) -> Result<(), Self::Error> {
        self.writes += 1;
        self.rows.insert(
            (instance.entity, instance.key.clone()),
            instance.attributes.clone(),
        );
        Ok(())
    }
}

/// A small network: manhole `S1` holding node `A`, special structure `S2`
/// holding node `B`, reach `R1` from `A` to `B`, reach `R2` from `B` to `C`,
/// and a treatment plant structure `W1` holding node `P`.
pub fn sample_network() -> NetworkSnapshot {
    NetworkSnapshot::new(
        [
            NetworkElement::node("A").with_structure("S1"),
            NetworkElement::node("B").with_structure("S2"),
            NetworkElement::node("C").with_overflow_to("A"),
            NetworkElement::node("P").with_structure("W1"),
            NetworkElement::reach("R1", Some("A".into()), Some("B".into())),
            NetworkElement::reach("R2", Some("B".into()), Some("C".into())),
        ],
        [
            StructureRecord::new("S1", StructureKind::Manhole),
            StructureRecord::new("S2", StructureKind::SpecialStructure),
            StructureRecord::new("W1", StructureKind::WwtpStructure),
        ],
    )
}

/// Value lists covering the codes used by [`sample_network`] fixtures.
pub fn sample_value_lists() -> ValueLists {
    [
        ValueListEntry::new("wastewater_structure_status", 8493, "operational"),
        ValueListEntry::new("manhole_function", 4532, "drop_structure"),
        ValueListEntry::new("reach_material", 5081, "concrete"),
        ValueListEntry::new("cover_material", 5355, "cast_iron"),
        ValueListEntry::new("structure_part_renovation_demand", 138, "urgent"),
    ]
    .into_iter()
    .collect()
}
