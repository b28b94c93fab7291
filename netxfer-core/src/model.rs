//! Network graph and entity vocabulary shared by both mapping directions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Whether a network element is a node or a reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A wastewater node (junction, manhole bottom, outlet).
    Node,
    /// A reach (pipe or channel) connecting two endpoints.
    Reach,
}

/// A node or reach of the sewer network graph.
///
/// Reaches name their endpoints by natural key; an endpoint may itself be a
/// reach when a pipe joins another pipe without a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkElement {
    /// Natural key.
    pub obj_id: String,
    /// Node or reach.
    pub kind: ElementKind,
    /// Natural key of the owning structure.
    pub structure: Option<String>,
    /// Upstream endpoint of a reach.
    pub from: Option<String>,
    /// Downstream endpoint of a reach.
    pub to: Option<String>,
    /// Element receiving this node's overflow.
    pub overflow_to: Option<String>,
}

impl NetworkElement {
    /// Create a node without structure or overflow.
    pub fn node(obj_id: impl Into<String>) -> Self {
        Self {
            obj_id: obj_id.into(),
            kind: ElementKind::Node,
            structure: None,
            from: None,
            to: None,
            overflow_to: None,
        }
    }

    /// Create a reach between two endpoints.
    pub fn reach(obj_id: impl Into<String>, from: Option<String>, to: Option<String>) -> Self {
        Self {
            obj_id: obj_id.into(),
            kind: ElementKind::Reach,
            structure: None,
            from,
            to,
            overflow_to: None,
        }
    }

    /// Attach the element to an owning structure.
    #[must_use]
    pub fn with_structure(mut self, structure: impl Into<String>) -> Self {
        self.structure = Some(structure.into());
        self
    }

    /// Route the element's overflow to another element.
    #[must_use]
    pub fn with_overflow_to(mut self, target: impl Into<String>) -> Self {
        self.overflow_to = Some(target.into());
        self
    }

    /// Whether the element is a reach.
    pub fn is_reach(&self) -> bool {
        self.kind == ElementKind::Reach
    }
}

/// Category of a wastewater structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum StructureKind {
    /// Manhole.
    Manhole,
    /// Special structure (overflow chamber, pumping station shell, ...).
    SpecialStructure,
    /// Discharge point into a receiving water.
    DischargePoint,
    /// Infiltration installation.
    InfiltrationInstallation,
    /// Structure of a wastewater treatment plant.
    WwtpStructure,
}

impl StructureKind {
    /// Every structure kind.
    pub const ALL: [Self; 5] = [
        Self::Manhole,
        Self::SpecialStructure,
        Self::DischargePoint,
        Self::InfiltrationInstallation,
        Self::WwtpStructure,
    ];

    /// Discriminator stored in the application schema.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manhole => "manhole",
            Self::SpecialStructure => "special_structure",
            Self::DischargePoint => "discharge_point",
            Self::InfiltrationInstallation => "infiltration_installation",
            Self::WwtpStructure => "wwtp_structure",
        }
    }

    /// Entity type mapping this kind, if the exchange model represents it.
    pub const fn entity_type(self) -> Option<EntityType> {
        match self {
            Self::Manhole => Some(EntityType::Manhole),
            Self::SpecialStructure => Some(EntityType::SpecialStructure),
            Self::DischargePoint => Some(EntityType::DischargePoint),
            Self::InfiltrationInstallation => Some(EntityType::InfiltrationInstallation),
            Self::WwtpStructure => None,
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown discriminator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {category} discriminator {value:?}")]
pub struct UnknownDiscriminator {
    /// Kind of discriminator being parsed.
    pub category: &'static str,
    /// Rejected input.
    pub value: String,
}

impl FromStr for StructureKind {
    type Err = UnknownDiscriminator;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownDiscriminator {
                category: "structure",
                value: value.to_owned(),
            })
    }
}

/// A physical structure owning network elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureRecord {
    /// Natural key.
    pub obj_id: String,
    /// Structure category.
    pub kind: StructureKind,
}

impl StructureRecord {
    /// Create a structure record.
    pub fn new(obj_id: impl Into<String>, kind: StructureKind) -> Self {
        Self {
            obj_id: obj_id.into(),
            kind,
        }
    }
}

/// Entity types carried by the exchange model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    /// Organisation (owner, operator, data owner, provider).
    Organisation,
    /// Manhole structure.
    Manhole,
    /// Special structure.
    SpecialStructure,
    /// Discharge point.
    DischargePoint,
    /// Infiltration installation.
    InfiltrationInstallation,
    /// Wastewater node.
    WastewaterNode,
    /// Reach.
    Reach,
    /// Cover (structure part).
    Cover,
    /// Access aid (structure part).
    AccessAid,
    /// Examination of a reach.
    Examination,
}

impl EntityType {
    /// Stable lowercase name, used as the type tag in both schemas.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organisation => "organisation",
            Self::Manhole => "manhole",
            Self::SpecialStructure => "special_structure",
            Self::DischargePoint => "discharge_point",
            Self::InfiltrationInstallation => "infiltration_installation",
            Self::WastewaterNode => "wastewater_node",
            Self::Reach => "reach",
            Self::Cover => "cover",
            Self::AccessAid => "access_aid",
            Self::Examination => "examination",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the source network used by the selection closure.
#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    elements: BTreeMap<String, NetworkElement>,
    structures: BTreeMap<String, StructureRecord>,
}

impl NetworkSnapshot {
    /// Build a snapshot from elements and structures.
    pub fn new<E, S>(elements: E, structures: S) -> Self
    where
        E: IntoIterator<Item = NetworkElement>,
        S: IntoIterator<Item = StructureRecord>,
    {
        Self {
            elements: elements
                .into_iter()
                .map(|element| (element.obj_id.clone(), element))
                .collect(),
            structures: structures
                .into_iter()
                .map(|structure| (structure.obj_id.clone(), structure))
                .collect(),
        }
    }

    /// Look up an element by natural key.
    pub fn element(&self, key: &str) -> Option<&NetworkElement> {
        self.elements.get(key)
    }

    /// Look up a structure by natural key.
    pub fn structure(&self, key: &str) -> Option<&StructureRecord> {
        self.structures.get(key)
    }

    /// All elements in key order.
    pub fn elements(&self) -> impl Iterator<Item = &NetworkElement> {
        self.elements.values()
    }

    /// All structures in key order.
    pub fn structures(&self) -> impl Iterator<Item = &StructureRecord> {
        self.structures.values()
    }

    /// Kind of the structure owning `element`, if it is known.
    pub fn owner_kind(&self, element: &NetworkElement) -> Option<StructureKind> {
        element
            .structure
            .as_deref()
            .and_then(|key| self.structure(key))
            .map(|structure| structure.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn structure_kinds_round_trip_through_discriminators() {
        for kind in StructureKind::ALL {
            assert_eq!(kind.as_str().parse::<StructureKind>(), Ok(kind));
        }
        assert!("pumping_station".parse::<StructureKind>().is_err());
    }

    #[rstest]
    fn treatment_plant_structures_are_out_of_model() {
        assert_eq!(StructureKind::WwtpStructure.entity_type(), None);
        assert_eq!(
            StructureKind::Manhole.entity_type(),
            Some(EntityType::Manhole)
        );
    }
}
