use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::bail_store;
use crate::errors::{StoreError, StoreResult};
use crate::resources::{Object, ObjectKey, ObjectKind};
use crate::store::{ObjectStore, Operation};

/// One call made against the store, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: Operation,
    pub key: ObjectKey,
}

/// A scripted failure for the next matching call.
struct Fault {
    op: Operation,
    kind: ObjectKind,
    error: StoreError,
    /// Written as if by another actor just before the call fails.
    racing_write: Option<Object>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Object>,
    last_version: u64,
}

impl State {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn insert(&mut self, mut object: Object) -> Object {
        let version = self.next_version();
        let meta = object.meta_mut();
        meta.resource_version = version;
        if meta.uid.is_empty() {
            meta.uid = Uuid::new_v4().to_string();
        }
        self.objects.insert(object.key(), object.clone());
        object
    }

    fn current_version(&self, key: &ObjectKey) -> StoreResult<u64> {
        self.objects
            .get(key)
            .map(|o| o.meta().resource_version)
            .ok_or_else(|| StoreError::not_found(key.kind, key.name.clone()))
    }

    /// Remove every object whose controller is `owner`, transitively.
    fn collect_garbage(&mut self, owner: Object) {
        let mut pending = VecDeque::from([owner]);
        while let Some(owner) = pending.pop_front() {
            let owner_meta = owner.meta();
            let dependents: Vec<ObjectKey> = self
                .objects
                .iter()
                .filter(|(_, o)| {
                    o.meta().controller().is_some_and(|c| {
                        c.kind == owner.kind()
                            && c.name == owner_meta.name
                            && (c.uid.is_empty() || c.uid == owner_meta.uid)
                    })
                })
                .map(|(k, _)| k.clone())
                .collect();

            for key in dependents {
                if let Some(dependent) = self.objects.remove(&key) {
                    debug!("Garbage collected {} owned by {}", key, owner.key());
                    pending.push_back(dependent);
                }
            }
        }
    }
}

/// In-memory store for tests and development.
///
/// Cloning yields another handle onto the same objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    journal: Arc<RwLock<Vec<StoreCall>>>,
    faults: Arc<RwLock<Vec<Fault>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an object directly, bypassing the journal.
    pub fn seed(&self, object: impl Into<Object>) -> Object {
        self.state.write().insert(object.into())
    }

    /// Read an object directly, bypassing the journal.
    pub fn snapshot(&self, key: &ObjectKey) -> Option<Object> {
        self.state.read().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.state.read().objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Simulate a concurrent writer: bump the version of `key` without
    /// changing its content. Returns the new version.
    pub fn touch(&self, key: &ObjectKey) -> Option<u64> {
        let mut state = self.state.write();
        let object = state.objects.get(key).cloned()?;
        Some(state.insert(object).meta().resource_version)
    }

    /// Flag `key` for deletion the way a store does while finalizers run.
    pub fn mark_for_deletion(&self, key: &ObjectKey) -> bool {
        let mut state = self.state.write();
        match state.objects.get(key).cloned() {
            Some(mut object) => {
                object.meta_mut().deletion_timestamp = Some(Utc::now());
                state.insert(object);
                true
            }
            None => false,
        }
    }

    /// Make the next `op` on an object of `kind` fail with `error`.
    pub fn fail_next(&self, op: Operation, kind: ObjectKind, error: StoreError) {
        self.faults.write().push(Fault {
            op,
            kind,
            error,
            racing_write: None,
        });
    }

    /// Make the next `op` on an object of `kind` lose a race: `winner` is
    /// written first, then the call fails with `error`.
    pub fn race_next(&self, op: Operation, kind: ObjectKind, winner: impl Into<Object>, error: StoreError) {
        self.faults.write().push(Fault {
            op,
            kind,
            error,
            racing_write: Some(winner.into()),
        });
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.journal.read().clone()
    }

    pub fn mutating_calls(&self) -> Vec<StoreCall> {
        self.journal
            .read()
            .iter()
            .filter(|c| c.op.is_mutating())
            .cloned()
            .collect()
    }

    pub fn clear_journal(&self) {
        self.journal.write().clear();
    }

    fn enter(&self, op: Operation, key: &ObjectKey) -> StoreResult<()> {
        self.journal.write().push(StoreCall {
            op,
            key: key.clone(),
        });

        let fault = {
            let mut faults = self.faults.write();
            let pos = faults.iter().position(|f| f.op == op && f.kind == key.kind);
            pos.map(|pos| faults.remove(pos))
        };

        match fault {
            Some(fault) => {
                if let Some(winner) = fault.racing_write {
                    self.state.write().insert(winner);
                }
                debug!("Injected {:?} failure on {}: {}", op, key, fault.error);
                Err(fault.error)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<Object> {
        self.enter(Operation::Get, key)?;
        self.state
            .read()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key.kind, key.name.clone()))
    }

    async fn create(&self, object: Object) -> StoreResult<Object> {
        let key = object.key();
        self.enter(Operation::Create, &key)?;

        if key.kind.is_namespaced() != key.namespace.is_some() {
            bail_store!(invalid, "{} has the wrong scope", key);
        }

        let mut state = self.state.write();
        if state.objects.contains_key(&key) {
            return Err(StoreError::already_exists(key.kind, key.name));
        }
        let stored = state.insert(object);
        debug!("Created {} at version {}", key, stored.meta().resource_version);
        Ok(stored)
    }

    async fn update(&self, mut object: Object, expected_version: u64) -> StoreResult<Object> {
        let key = object.key();
        self.enter(Operation::Update, &key)?;

        let mut state = self.state.write();
        let actual = state.current_version(&key)?;
        if actual != expected_version {
            return Err(StoreError::conflict(key.kind, key.name, expected_version, actual));
        }

        let current = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key.kind, key.name.clone()))?;

        // Store-owned fields and the status sub-resource are not writable here.
        {
            let meta = object.meta_mut();
            meta.uid = current.meta().uid.clone();
            meta.deletion_timestamp = current.meta().deletion_timestamp;
        }
        if let (Object::Tenant(next), Object::Tenant(prev)) = (&mut object, &current) {
            next.status = prev.status.clone();
        }

        let stored = state.insert(object);
        debug!("Updated {} to version {}", key, stored.meta().resource_version);
        Ok(stored)
    }

    async fn update_status(&self, object: Object, expected_version: u64) -> StoreResult<Object> {
        let key = object.key();
        self.enter(Operation::UpdateStatus, &key)?;

        let Object::Tenant(next) = object else {
            bail_store!(invalid, "{} has no status sub-resource", key);
        };

        let mut state = self.state.write();
        let actual = state.current_version(&key)?;
        if actual != expected_version {
            return Err(StoreError::conflict(key.kind, key.name, expected_version, actual));
        }

        let mut current = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key.kind, key.name.clone()))?
            .into_tenant()?;
        current.status = next.status;

        let stored = state.insert(Object::Tenant(current));
        debug!("Updated status of {} to version {}", key, stored.meta().resource_version);
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        self.enter(Operation::Delete, key)?;

        let mut state = self.state.write();
        let removed = state
            .objects
            .remove(key)
            .ok_or_else(|| StoreError::not_found(key.kind, key.name.clone()))?;
        debug!("Deleted {}", key);
        state.collect_garbage(removed);
        Ok(())
    }
}
