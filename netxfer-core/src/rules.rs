//! Declarative mapping table shared by the export and import directions.
//!
//! Every entity type is described once by a [`MappingRule`]: where its rows
//! live in the application schema, which exchange table receives them and an
//! ordered list of [`FieldGroup`]s. Groups shared by sibling types (ownership,
//! wastewater-structure fields, structure-part fields) are declared once and
//! composed into each rule, replacing per-type mapping code.

use crate::basket::Topic;
use crate::model::EntityType;

/// Selection a guarded reference is checked against on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefScope {
    /// Target must be a selected network element.
    Elements,
    /// Target must be a selected structure.
    Structures,
    /// Target is always exported alongside the row; an unmapped target is a
    /// structural failure.
    Unguarded,
}

/// How a single attribute is translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text with an optional length limit in the exchange schema.
    Text {
        /// Whether the exchange schema requires a value.
        mandatory: bool,
        /// Maximum length in characters.
        max_len: Option<usize>,
    },
    /// Value copied unchanged (numbers, dates, opaque geometry).
    Plain,
    /// Integer code exchanged as its display string.
    Code {
        /// Name of the value list.
        list: &'static str,
    },
    /// Foreign key exchanged as a TID.
    Reference {
        /// Selection guarding the reference on export.
        scope: RefScope,
    },
    /// Organisation key exchanged as the organisation's name.
    Organisation,
}

/// Translation of one application column to one exchange column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Column in the application schema.
    pub source: &'static str,
    /// Column in the exchange schema.
    pub target: &'static str,
    /// Translation applied in both directions.
    pub kind: FieldKind,
}

impl FieldRule {
    const fn text(name: &'static str, max_len: usize) -> Self {
        Self {
            source: name,
            target: name,
            kind: FieldKind::Text {
                mandatory: false,
                max_len: Some(max_len),
            },
        }
    }

    const fn mandatory(name: &'static str, max_len: usize) -> Self {
        Self {
            source: name,
            target: name,
            kind: FieldKind::Text {
                mandatory: true,
                max_len: Some(max_len),
            },
        }
    }

    const fn plain(name: &'static str) -> Self {
        Self {
            source: name,
            target: name,
            kind: FieldKind::Plain,
        }
    }

    const fn code(name: &'static str, list: &'static str) -> Self {
        Self {
            source: name,
            target: name,
            kind: FieldKind::Code { list },
        }
    }

    const fn reference(source: &'static str, target: &'static str, scope: RefScope) -> Self {
        Self {
            source,
            target,
            kind: FieldKind::Reference { scope },
        }
    }

    const fn organisation(source: &'static str, target: &'static str) -> Self {
        Self {
            source,
            target,
            kind: FieldKind::Organisation,
        }
    }
}

/// Application table a field group is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// The supertype table; the leaf table when the rule has no parent.
    Parent,
    /// The leaf table.
    Leaf,
}

/// Named, reusable list of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGroup {
    /// Group name used in diagnostics.
    pub name: &'static str,
    /// Where the group's columns are stored.
    pub storage: Storage,
    /// Fields in column order.
    pub fields: &'static [FieldRule],
}

/// Which source rows a partial export emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Every row.
    All,
    /// Rows whose key is in the structure selection.
    Structures,
    /// Rows whose key is in the element selection.
    Elements,
    /// Rows whose named column holds a selected structure.
    OwnedBy(&'static str),
    /// Rows whose named column holds a selected element.
    Referencing(&'static str),
}

/// Mapping of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRule {
    /// Entity type described.
    pub entity: EntityType,
    /// Topic whose basket receives the rows.
    pub topic: Topic,
    /// Value of the exchange `t_type` column.
    pub type_tag: &'static str,
    /// Supertype table in the application schema.
    pub parent_table: Option<&'static str>,
    /// Leaf table in the application schema.
    pub leaf_table: &'static str,
    /// Table in the exchange schema.
    pub exchange_table: &'static str,
    /// Partial-export filter.
    pub membership: Membership,
    /// Field groups, capability groups first.
    pub groups: &'static [FieldGroup],
}

impl MappingRule {
    /// Application table storing `storage`.
    pub fn table_for(&self, storage: Storage) -> &'static str {
        match storage {
            Storage::Parent => self.parent_table.unwrap_or(self.leaf_table),
            Storage::Leaf => self.leaf_table,
        }
    }

    /// Every field of the rule in group order.
    pub fn fields(&self) -> impl Iterator<Item = &'static FieldRule> + use<> {
        let groups: &'static [FieldGroup] = self.groups;
        groups.iter().flat_map(|group| group.fields.iter())
    }

    /// Fields stored in the application table `table`.
    pub fn fields_in_table(&self, table: &str) -> Vec<&'static FieldRule> {
        let groups: &'static [FieldGroup] = self.groups;
        groups
            .iter()
            .filter(|group| self.table_for(group.storage) == table)
            .flat_map(|group| group.fields.iter())
            .collect()
    }

    /// Application tables of the rule, supertype first.
    pub fn tables(&self) -> Vec<&'static str> {
        self.parent_table
            .into_iter()
            .chain(std::iter::once(self.leaf_table))
            .collect()
    }

    /// Application table storing the column `source`.
    pub fn table_of(&self, source: &str) -> Option<&'static str> {
        let groups: &'static [FieldGroup] = self.groups;
        groups
            .iter()
            .find(|group| group.fields.iter().any(|field| field.source == source))
            .map(|group| self.table_for(group.storage))
    }

    /// Field with application column `source`.
    pub fn field(&self, source: &str) -> Option<&'static FieldRule> {
        self.fields().find(|field| field.source == source)
    }
}

/// Length limit of remarks in every group.
pub const REMARK_LENGTH: usize = 80;

const OWNERSHIP: FieldGroup = FieldGroup {
    name: "ownership",
    storage: Storage::Parent,
    fields: &[
        FieldRule::plain("last_modification"),
        FieldRule::organisation("fk_dataowner", "data_owner"),
        FieldRule::organisation("fk_provider", "provider"),
    ],
};

const WASTEWATER_STRUCTURE: FieldGroup = FieldGroup {
    name: "wastewater structure",
    storage: Storage::Parent,
    fields: &[
        FieldRule::mandatory("identifier", 20),
        FieldRule::text("remark", REMARK_LENGTH),
        FieldRule::code("status", "wastewater_structure_status"),
        FieldRule::plain("year_of_construction"),
        FieldRule::organisation("fk_owner", "owner"),
        FieldRule::organisation("fk_operator", "operator"),
        FieldRule::reference("fk_main_cover", "main_cover", RefScope::Unguarded),
    ],
};

const NETWORK_ELEMENT: FieldGroup = FieldGroup {
    name: "network element",
    storage: Storage::Parent,
    fields: &[
        FieldRule::mandatory("identifier", 20),
        FieldRule::text("remark", REMARK_LENGTH),
        FieldRule::reference(
            "fk_wastewater_structure",
            "wastewater_structure",
            RefScope::Structures,
        ),
    ],
};

const STRUCTURE_PART: FieldGroup = FieldGroup {
    name: "structure part",
    storage: Storage::Parent,
    fields: &[
        FieldRule::text("identifier", 20),
        FieldRule::text("remark", REMARK_LENGTH),
        FieldRule::code("renovation_demand", "structure_part_renovation_demand"),
        FieldRule::reference(
            "fk_wastewater_structure",
            "wastewater_structure",
            RefScope::Structures,
        ),
    ],
};

const STRUCTURE_PARENT: Option<&str> = Some("od_wastewater_structure");
const ELEMENT_PARENT: Option<&str> = Some("od_wastewater_networkelement");
const PART_PARENT: Option<&str> = Some("od_structure_part");

/// Every mapped entity type, in dependency order.
pub const RULES: &[MappingRule] = &[
    MappingRule {
        entity: EntityType::Organisation,
        topic: Topic::Administration,
        type_tag: "Administration.Organisation",
        parent_table: None,
        leaf_table: "od_organisation",
        exchange_table: "organisation",
        membership: Membership::All,
        groups: &[FieldGroup {
            name: "leaf",
            storage: Storage::Leaf,
            fields: &[
                FieldRule::mandatory("identifier", REMARK_LENGTH),
                FieldRule::text("uid", 12),
                FieldRule::text("remark", REMARK_LENGTH),
            ],
        }],
    },
    MappingRule {
        entity: EntityType::Manhole,
        topic: Topic::Wastewater,
        type_tag: "Wastewater.Manhole",
        parent_table: STRUCTURE_PARENT,
        leaf_table: "od_manhole",
        exchange_table: "manhole",
        membership: Membership::Structures,
        groups: &[
            OWNERSHIP,
            WASTEWATER_STRUCTURE,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[
                    FieldRule::code("function", "manhole_function"),
                    FieldRule::plain("dimension1"),
                    FieldRule::plain("dimension2"),
                    FieldRule::plain("depth"),
                ],
            },
        ],
    },
    MappingRule {
        entity: EntityType::SpecialStructure,
        topic: Topic::Wastewater,
        type_tag: "Wastewater.SpecialStructure",
        parent_table: STRUCTURE_PARENT,
        leaf_table: "od_special_structure",
        exchange_table: "special_structure",
        membership: Membership::Structures,
        groups: &[
            OWNERSHIP,
            WASTEWATER_STRUCTURE,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[
                    FieldRule::code("function", "special_structure_function"),
                    FieldRule::plain("upper_elevation"),
                ],
            },
        ],
    },
    MappingRule {
        entity: EntityType::DischargePoint,
        topic: Topic::Wastewater,
        type_tag: "Wastewater.DischargePoint",
        parent_table: STRUCTURE_PARENT,
        leaf_table: "od_discharge_point",
        exchange_table: "discharge_point",
        membership: Membership::Structures,
        groups: &[
            OWNERSHIP,
            WASTEWATER_STRUCTURE,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[
                    FieldRule::code("relevance", "discharge_point_relevance"),
                    FieldRule::plain("waterlevel_hydraulic"),
                ],
            },
        ],
    },
    MappingRule {
        entity: EntityType::InfiltrationInstallation,
        topic: Topic::Wastewater,
        type_tag: "Wastewater.InfiltrationInstallation",
        parent_table: STRUCTURE_PARENT,
        leaf_table: "od_infiltration_installation",
        exchange_table: "infiltration_installation",
        membership: Membership::Structures,
        groups: &[
            OWNERSHIP,
            WASTEWATER_STRUCTURE,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[
                    FieldRule::code("kind", "infiltration_installation_kind"),
                    FieldRule::plain("absorption_capacity"),
                ],
            },
        ],
    },
    MappingRule {
        entity: EntityType::WastewaterNode,
        topic: Topic::Wastewater,
        type_tag: "Wastewater.WastewaterNode",
        parent_table: ELEMENT_PARENT,
        leaf_table: "od_wastewater_node",
        exchange_table: "wastewater_node",
        membership: Membership::Elements,
        groups: &[
            OWNERSHIP,
            NETWORK_ELEMENT,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[
                    FieldRule::plain("backflow_level"),
                    FieldRule::plain("bottom_level"),
                    FieldRule::plain("situation_geometry"),
                    FieldRule::reference("fk_overflow_to", "overflow_to", RefScope::Elements),
                ],
            },
        ],
    },
    MappingRule {
        entity: EntityType::Reach,
        topic: Topic::Wastewater,
        type_tag: "Wastewater.Reach",
        parent_table: ELEMENT_PARENT,
        leaf_table: "od_reach",
        exchange_table: "reach",
        membership: Membership::Elements,
        groups: &[
            OWNERSHIP,
            NETWORK_ELEMENT,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[
                    FieldRule::plain("clear_height"),
                    FieldRule::code("material", "reach_material"),
                    FieldRule::plain("length_effective"),
                    FieldRule::plain("progression_geometry"),
                    FieldRule::reference("fk_from", "from_element", RefScope::Elements),
                    FieldRule::reference("fk_to", "to_element", RefScope::Elements),
                ],
            },
        ],
    },
    MappingRule {
        entity: EntityType::Cover,
        topic: Topic::Wastewater,
        type_tag: "Wastewater.Cover",
        parent_table: PART_PARENT,
        leaf_table: "od_cover",
        exchange_table: "cover",
        membership: Membership::OwnedBy("fk_wastewater_structure"),
        groups: &[
            OWNERSHIP,
            STRUCTURE_PART,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[
                    FieldRule::plain("level"),
                    FieldRule::code("material", "cover_material"),
                    FieldRule::code("positional_accuracy", "cover_positional_accuracy"),
                    FieldRule::plain("situation_geometry"),
                ],
            },
        ],
    },
    MappingRule {
        entity: EntityType::AccessAid,
        topic: Topic::Wastewater,
        type_tag: "Wastewater.AccessAid",
        parent_table: PART_PARENT,
        leaf_table: "od_access_aid",
        exchange_table: "access_aid",
        membership: Membership::OwnedBy("fk_wastewater_structure"),
        groups: &[
            OWNERSHIP,
            STRUCTURE_PART,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[FieldRule::code("kind", "access_aid_kind")],
            },
        ],
    },
    MappingRule {
        entity: EntityType::Examination,
        topic: Topic::Inspection,
        type_tag: "Inspection.Examination",
        parent_table: None,
        leaf_table: "od_examination",
        exchange_table: "examination",
        membership: Membership::Referencing("fk_reach"),
        groups: &[
            OWNERSHIP,
            FieldGroup {
                name: "leaf",
                storage: Storage::Leaf,
                fields: &[
                    FieldRule::mandatory("identifier", 20),
                    FieldRule::text("remark", REMARK_LENGTH),
                    FieldRule::plain("recording_date"),
                    FieldRule::code("recording_type", "examination_recording_type"),
                    FieldRule::reference("fk_reach", "reach", RefScope::Elements),
                ],
            },
        ],
    },
];

/// Exchange table receiving label text positions.
pub const TEXT_POSITION_TABLE: &str = "text_position";

/// `t_type` of label text positions.
pub const TEXT_POSITION_TYPE: &str = "Wastewater.TextPosition";

/// Maximum length of label text.
pub const LABEL_TEXT_LENGTH: usize = 80;

/// Rule describing `entity`.
pub fn rule_for(entity: EntityType) -> Option<&'static MappingRule> {
    RULES.iter().find(|rule| rule.entity == entity)
}

/// Rules whose rows belong to `topic`, in dependency order.
pub fn rules_for_topic(topic: Topic) -> impl Iterator<Item = &'static MappingRule> {
    RULES.iter().filter(move |rule| rule.topic == topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    fn every_entity_type_has_one_rule() {
        let entities: HashSet<EntityType> = RULES.iter().map(|rule| rule.entity).collect();
        assert_eq!(entities.len(), RULES.len());
        assert!(rule_for(EntityType::Cover).is_some());
    }

    #[rstest]
    fn target_columns_are_unique_per_rule() {
        for rule in RULES {
            let mut seen = HashSet::new();
            for field in rule.fields() {
                assert!(
                    seen.insert(field.target),
                    "{} maps {} twice",
                    rule.entity,
                    field.target
                );
            }
        }
    }

    #[rstest]
    fn structure_part_remarks_are_limited() {
        let Some(rule) = rule_for(EntityType::AccessAid) else {
            panic!("access aid rule");
        };
        let remark = rule.field("remark").map(|field| field.kind);
        assert_eq!(
            remark,
            Some(FieldKind::Text {
                mandatory: false,
                max_len: Some(80)
            })
        );
    }

    #[rstest]
    fn groups_without_parent_are_stored_in_the_leaf() {
        let Some(rule) = rule_for(EntityType::Examination) else {
            panic!("examination rule");
        };
        assert_eq!(rule.tables(), vec!["od_examination"]);
        assert_eq!(
            rule.fields_in_table("od_examination").len(),
            rule.fields().count()
        );
    }

    #[rstest]
    fn topics_follow_dependency_order() {
        let topics: Vec<Topic> = RULES.iter().map(|rule| rule.topic).collect();
        let mut sorted = topics.clone();
        sorted.sort();
        assert_eq!(topics, sorted);
        assert_eq!(rules_for_topic(Topic::Inspection).count(), 1);
    }
}
