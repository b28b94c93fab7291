//! Run configuration, built once and passed by reference to every component.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::basket::Topic;
use crate::model::{StructureKind, UnknownDiscriminator};

/// Exchange model variant targeted by a run.
///
/// Variants share the administrative and wastewater topics; the inspection
/// variant adds a third basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ModelVariant {
    /// Network data with administrative references.
    #[default]
    Wastewater,
    /// Network data plus inspection results.
    WastewaterInspection,
}

impl ModelVariant {
    /// Topics exported for this variant, in basket order.
    pub const fn topics(self) -> &'static [Topic] {
        match self {
            Self::Wastewater => &[Topic::Administration, Topic::Wastewater],
            Self::WastewaterInspection => {
                &[Topic::Administration, Topic::Wastewater, Topic::Inspection]
            }
        }
    }

    /// Model names handed to the external schema and transfer tools.
    pub const fn model_names(self) -> &'static [&'static str] {
        match self {
            Self::Wastewater => &["NETXFER_WASTEWATER_2020"],
            Self::WastewaterInspection => &["NETXFER_WASTEWATER_2020", "NETXFER_INSPECTION_2020"],
        }
    }

    /// Name accepted by [`FromStr`].
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wastewater => "wastewater",
            Self::WastewaterInspection => "wastewater-inspection",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = UnknownDiscriminator;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Self::Wastewater, Self::WastewaterInspection]
            .into_iter()
            .find(|variant| variant.as_str() == value)
            .ok_or_else(|| UnknownDiscriminator {
                category: "model",
                value: value.to_owned(),
            })
    }
}

/// How far the selection closure expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ClosureStrategy {
    /// Expand once from the caller's selection.
    #[default]
    SinglePass,
    /// Expand until no further element is reachable.
    Fixpoint,
}

impl FromStr for ClosureStrategy {
    type Err = UnknownDiscriminator;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "single-pass" => Ok(Self::SinglePass),
            "fixpoint" => Ok(Self::Fixpoint),
            other => Err(UnknownDiscriminator {
                category: "closure strategy",
                value: other.to_owned(),
            }),
        }
    }
}

/// What a run does when the external validator rejects a transfer file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ValidationPolicy {
    /// Abort the run.
    Enforce,
    /// Log the failure and continue.
    #[default]
    Warn,
    /// Do not run the validator.
    Skip,
}

impl FromStr for ValidationPolicy {
    type Err = UnknownDiscriminator;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "enforce" => Ok(Self::Enforce),
            "warn" => Ok(Self::Warn),
            "skip" => Ok(Self::Skip),
            other => Err(UnknownDiscriminator {
                category: "validation policy",
                value: other.to_owned(),
            }),
        }
    }
}

/// Options for [`crate::closure::resolve_closure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureOptions {
    /// Expansion strategy.
    pub strategy: ClosureStrategy,
    /// Structure kinds the exchange model does not represent.
    pub excluded_structures: BTreeSet<StructureKind>,
}

impl Default for ClosureOptions {
    fn default() -> Self {
        Self {
            strategy: ClosureStrategy::default(),
            excluded_structures: BTreeSet::from([StructureKind::WwtpStructure]),
        }
    }
}

impl ClosureOptions {
    /// Whether structures of `kind` are left out of exports.
    pub fn excludes(&self, kind: StructureKind) -> bool {
        self.excluded_structures.contains(&kind)
    }
}

/// Configuration for one export or import run.
///
/// # Examples
/// ```
/// use netxfer_core::config::{ClosureStrategy, ExchangeConfig, ModelVariant};
///
/// let config = ExchangeConfig::default()
///     .with_dataset("ara-nord")
///     .with_model(ModelVariant::WastewaterInspection)
///     .with_closure_strategy(ClosureStrategy::Fixpoint);
/// assert_eq!(config.model.topics().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeConfig {
    /// Dataset name written to the exchange schema.
    pub dataset: String,
    /// Active exchange model.
    pub model: ModelVariant,
    /// Selection closure options.
    pub closure: ClosureOptions,
    /// Degrees added to label rotations before wrapping.
    pub label_orientation_offset: f64,
    /// Handling of validator failures.
    pub validation: ValidationPolicy,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            dataset: String::from("netxfer"),
            model: ModelVariant::default(),
            closure: ClosureOptions::default(),
            label_orientation_offset: 0.0,
            validation: ValidationPolicy::default(),
        }
    }
}

impl ExchangeConfig {
    /// Set the dataset name.
    #[must_use]
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = dataset.into();
        self
    }

    /// Set the exchange model.
    #[must_use]
    pub fn with_model(mut self, model: ModelVariant) -> Self {
        self.model = model;
        self
    }

    /// Set the closure strategy.
    #[must_use]
    pub fn with_closure_strategy(mut self, strategy: ClosureStrategy) -> Self {
        self.closure.strategy = strategy;
        self
    }

    /// Set the validation policy.
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = validation;
        self
    }

    /// Set the label orientation offset in degrees.
    #[must_use]
    pub fn with_label_orientation_offset(mut self, degrees: f64) -> Self {
        self.label_orientation_offset = degrees;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("wastewater", ModelVariant::Wastewater)]
    #[case("wastewater-inspection", ModelVariant::WastewaterInspection)]
    fn parses_model_names(#[case] raw: &str, #[case] expected: ModelVariant) {
        assert_eq!(raw.parse::<ModelVariant>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_strategies() {
        let err = "forever".parse::<ClosureStrategy>().expect_err("unknown strategy");
        assert_eq!(err.value, "forever");
    }

    #[rstest]
    #[case("enforce", ValidationPolicy::Enforce)]
    #[case("warn", ValidationPolicy::Warn)]
    #[case("skip", ValidationPolicy::Skip)]
    fn parses_validation_policies(#[case] raw: &str, #[case] expected: ValidationPolicy) {
        assert_eq!(raw.parse::<ValidationPolicy>(), Ok(expected));
    }

    #[rstest]
    fn treatment_plants_are_excluded_by_default() {
        assert!(ClosureOptions::default().excludes(StructureKind::WwtpStructure));
        assert!(!ClosureOptions::default().excludes(StructureKind::Manhole));
    }
}
