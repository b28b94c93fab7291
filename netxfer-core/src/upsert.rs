//! Create-or-update resolution of imported instances.
//!
//! [`UpsertResolver`] stages every imported row under its natural key. A key
//! seen before in the run, or already present in the target store, is updated
//! in place; anything else is created. Staged instances are written through
//! an [`InstanceStore`] on [`UpsertResolver::flush`], so importing the same
//! data twice leaves the number of instances unchanged.
//!
//! Foreign keys are written as they arrive. The store is expected to defer
//! constraint checks to commit time, so no ordering between instances is
//! computed here.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};
use uuid::Uuid;

use crate::model::EntityType;
use crate::value::{Attributes, Value};

/// Target store of an import.
pub trait InstanceStore {
    /// Error raised by the store.
    type Error;

    /// Load the persisted attributes of `key`, if the instance exists.
    ///
    /// # Errors
    /// Store-specific read failures.
    fn load(&self, entity: EntityType, key: &str) -> Result<Option<Attributes>, Self::Error>;

    /// Natural key of a persisted instance whose `column` equals `value`.
    ///
    /// # Errors
    /// Store-specific read failures.
    fn find_key_by(
        &self,
        entity: EntityType,
        column: &'static str,
        value: &Value,
    ) -> Result<Option<String>, Self::Error>;

    /// Insert or overwrite an instance.
    ///
    /// # Errors
    /// Store-specific write failures.
    fn write(&mut self, instance: &StagedInstance) -> Result<(), Self::Error>;
}

/// Whether a staged instance is new to the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// The key was unknown to the store.
    Created,
    /// The key already existed in the store.
    Updated,
}

/// An instance staged for writing.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedInstance {
    /// Entity type of the instance.
    pub entity: EntityType,
    /// Natural key.
    pub key: String,
    /// Merged attributes.
    pub attributes: Attributes,
    /// Creation state.
    pub state: InstanceState,
}

type InstanceId = (EntityType, String);

/// Run-scoped arena of staged instances.
#[derive(Debug, Default)]
pub struct UpsertResolver {
    staged: BTreeMap<InstanceId, StagedInstance>,
    dirty: BTreeSet<InstanceId>,
}

impl UpsertResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `attributes` for the instance `key`.
    ///
    /// Attributes overwrite those of an instance staged earlier in the run or
    /// loaded from `store`. The instance is marked dirty even when nothing
    /// changed.
    ///
    /// # Errors
    /// Propagates [`InstanceStore::load`] failures.
    pub fn upsert<S: InstanceStore>(
        &mut self,
        store: &S,
        entity: EntityType,
        key: &str,
        attributes: Attributes,
    ) -> Result<&StagedInstance, S::Error> {
        let id = (entity, key.to_owned());
        let instance = match self.staged.entry(id.clone()) {
            Entry::Occupied(entry) => {
                let instance = entry.into_mut();
                instance.attributes.extend(attributes);
                instance
            }
            Entry::Vacant(entry) => {
                let (state, mut merged) = match store.load(entity, key)? {
                    Some(existing) => (InstanceState::Updated, existing),
                    None => (InstanceState::Created, Attributes::new()),
                };
                merged.extend(attributes);
                entry.insert(StagedInstance {
                    entity,
                    key: key.to_owned(),
                    attributes: merged,
                    state,
                })
            }
        };
        self.dirty.insert(id);
        Ok(instance)
    }

    /// Staged instance of `entity` whose `column` equals `value`.
    pub fn find_staged(
        &self,
        entity: EntityType,
        column: &str,
        value: &Value,
    ) -> Option<&StagedInstance> {
        self.staged.values().find(|instance| {
            instance.entity == entity && instance.attributes.get(column) == Some(value)
        })
    }

    /// Staged instance with natural key `key`.
    pub fn get(&self, entity: EntityType, key: &str) -> Option<&StagedInstance> {
        self.staged.get(&(entity, key.to_owned()))
    }

    /// Write dirty instances and clear the dirty set.
    ///
    /// Instances stay staged, so later upserts in the same run still see them.
    ///
    /// # Errors
    /// Propagates [`InstanceStore::write`] failures.
    pub fn flush<S: InstanceStore>(&mut self, store: &mut S) -> Result<usize, S::Error> {
        let dirty = std::mem::take(&mut self.dirty);
        let mut written = 0;
        for id in &dirty {
            if let Some(instance) = self.staged.get(id) {
                store.write(instance)?;
                written += 1;
            }
        }
        debug!("flushed {written} instances");
        Ok(written)
    }

    /// Number of staged instances new to the store.
    pub fn created(&self) -> usize {
        self.count(InstanceState::Created)
    }

    /// Number of staged instances that already existed.
    pub fn updated(&self) -> usize {
        self.count(InstanceState::Updated)
    }

    fn count(&self, state: InstanceState) -> usize {
        self.staged
            .values()
            .filter(|instance| instance.state == state)
            .count()
    }
}

/// Memoized lookup of loosely identified references.
///
/// Organisations travel by name only. The first lookup of a name searches the
/// staged and then the persisted instances for a matching attribute and
/// creates a new instance on a miss; later lookups of the same name in the
/// run return the memoized key.
#[derive(Debug)]
pub struct ReferenceResolver {
    entity: EntityType,
    column: &'static str,
    memo: HashMap<String, String>,
}

impl ReferenceResolver {
    /// Resolver for organisations, matched on `identifier`.
    pub fn organisations() -> Self {
        Self {
            entity: EntityType::Organisation,
            column: "identifier",
            memo: HashMap::new(),
        }
    }

    /// Natural key of the instance named `name`, creating it if needed.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn resolve_or_create_reference<S: InstanceStore>(
        &mut self,
        upserts: &mut UpsertResolver,
        store: &S,
        name: &str,
    ) -> Result<String, S::Error> {
        if let Some(key) = self.memo.get(name) {
            return Ok(key.clone());
        }
        let needle = Value::from(name);
        let key = if let Some(staged) = upserts.find_staged(self.entity, self.column, &needle) {
            staged.key.clone()
        } else if let Some(persisted) = store.find_key_by(self.entity, self.column, &needle)? {
            persisted
        } else {
            let created = Uuid::new_v4().simple().to_string();
            info!("creating {} {created} for unknown name {name:?}", self.entity);
            upserts.upsert(
                store,
                self.entity,
                &created,
                Attributes::from([(self.column, needle)]),
            )?;
            created
        };
        self.memo.insert(name.to_owned(), key.clone());
        Ok(key)
    }

    /// Number of memoized names.
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    /// Whether no name was resolved yet.
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}
