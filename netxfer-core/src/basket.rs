//! Exchange partitions and the run's current-basket pointer.
//!
//! A run emits rows into one basket per topic. Phases advance the pointer
//! explicitly and may only move forward in the declared topic order, so
//! inter-basket references always point at an earlier basket.

use std::fmt;

use thiserror::Error;

use crate::tid::{Tid, TidTranslator};

/// Named sub-model of the exchange format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Organisations referenced by every other topic.
    Administration,
    /// Structures, network elements and structure parts.
    Wastewater,
    /// Examinations of reaches.
    Inspection,
}

impl Topic {
    /// Qualified topic name written to the basket table.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Administration => "Administration",
            Self::Wastewater => "Wastewater",
            Self::Inspection => "Inspection",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One partition of the exchange output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basket {
    /// Basket identifier, allocated from the run's TID sequence.
    pub tid: Tid,
    /// Dataset the basket belongs to.
    pub dataset: String,
    /// Topic of the rows in the basket.
    pub topic: Topic,
}

/// Errors raised by [`BasketAssigner`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BasketError {
    /// The active model does not carry the requested topic.
    #[error("topic {topic} is not part of the active model")]
    UndeclaredTopic {
        /// Requested topic.
        topic: Topic,
    },
    /// A phase tried to return to an earlier basket.
    #[error("cannot switch back from basket {current} to {requested}")]
    OutOfOrder {
        /// Topic of the current basket.
        current: Topic,
        /// Requested topic.
        requested: Topic,
    },
    /// A row was built before any basket was selected.
    #[error("no basket selected yet")]
    NoCurrentBasket,
}

/// Run-scoped basket pointer.
///
/// # Examples
/// ```
/// use netxfer_core::basket::{BasketAssigner, Topic};
/// use netxfer_core::tid::TidTranslator;
///
/// let mut translator = TidTranslator::default();
/// let mut assigner = BasketAssigner::open(
///     "netxfer",
///     &[Topic::Administration, Topic::Wastewater],
///     &mut translator,
/// );
/// assert!(assigner.current().is_err());
/// assert_eq!(assigner.switch_to(Topic::Administration).map(|b| b.topic), Ok(Topic::Administration));
/// assert!(assigner.switch_to(Topic::Wastewater).is_ok());
/// assert!(assigner.switch_to(Topic::Administration).is_err());
/// ```
#[derive(Debug)]
pub struct BasketAssigner {
    baskets: Vec<Basket>,
    current: Option<usize>,
}

impl BasketAssigner {
    /// Allocate one basket per topic, in the order given.
    pub fn open(dataset: &str, topics: &[Topic], translator: &mut TidTranslator) -> Self {
        let baskets = topics
            .iter()
            .map(|topic| Basket {
                tid: translator.next_tid(),
                dataset: dataset.to_owned(),
                topic: *topic,
            })
            .collect();
        Self {
            baskets,
            current: None,
        }
    }

    /// Make the basket of `topic` current.
    ///
    /// Re-selecting the current topic is allowed.
    ///
    /// # Errors
    /// [`BasketError::UndeclaredTopic`] for topics outside the model and
    /// [`BasketError::OutOfOrder`] when moving backwards.
    pub fn switch_to(&mut self, topic: Topic) -> Result<&Basket, BasketError> {
        let position = self
            .baskets
            .iter()
            .position(|basket| basket.topic == topic)
            .ok_or(BasketError::UndeclaredTopic { topic })?;
        if let Some(current) = self.current.filter(|current| *current > position) {
            let current_topic = self
                .baskets
                .get(current)
                .map_or(topic, |basket| basket.topic);
            return Err(BasketError::OutOfOrder {
                current: current_topic,
                requested: topic,
            });
        }
        self.current = Some(position);
        self.current()
    }

    /// Basket rows are currently assigned to.
    ///
    /// # Errors
    /// [`BasketError::NoCurrentBasket`] before the first switch.
    pub fn current(&self) -> Result<&Basket, BasketError> {
        self.current
            .and_then(|index| self.baskets.get(index))
            .ok_or(BasketError::NoCurrentBasket)
    }

    /// Whether the model declares `topic`.
    pub fn declares(&self, topic: Topic) -> bool {
        self.baskets.iter().any(|basket| basket.topic == topic)
    }

    /// All baskets of the run, in topic order.
    pub fn baskets(&self) -> &[Basket] {
        &self.baskets
    }
}
