//! Keyed Container
//!
//! Ordered, case-insensitive string-keyed map with a two-phase change protocol.
//! Every mutation notifies `changing` observers before touching the backing map
//! and `changed` observers afterwards. A failing `changing` observer vetoes the
//! operation; a failing `changed` observer rolls the backing map back to its
//! pre-operation state and the failure is returned to the caller.
//!
//! The map lock is coarse and non-reentrant, but it is never held while
//! observers run, so an observer may read or mutate the same container.
//! Interleaving of such reentrant mutations is not ordered.

use crate::error::{ContainerError, ObserverError};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

/// Fold a key for case-insensitive comparison (NFC, then lowercase).
pub fn fold_key(key: &str) -> String {
    key.nfc().collect::<String>().to_lowercase()
}

/// Kind of container change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Remove,
    Replace,
    Reset,
}

/// Change notification payload.
///
/// For `Replace` produced by a key rename, `old_key` is set; for a value
/// replacement, `old_value` is set. `Reset` carries no key or value.
#[derive(Debug)]
pub struct ContainerChange<'a, V> {
    pub action: ChangeAction,
    pub key: Option<&'a str>,
    pub old_key: Option<&'a str>,
    pub value: Option<&'a V>,
    pub old_value: Option<&'a V>,
}

impl<V> ContainerChange<'_, V> {
    fn describe_key(&self) -> String {
        self.key.unwrap_or("*").to_string()
    }
}

/// Observer of container changes. Both phases default to accepting.
pub trait ContainerObserver<V>: Send + Sync {
    /// Called before the backing map is mutated. An error vetoes the change.
    fn changing(&self, _change: &ContainerChange<'_, V>) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Called after the backing map was mutated. An error rolls the change back.
    fn changed(&self, _change: &ContainerChange<'_, V>) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Token returned by [`KeyedContainer::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Slot<V> {
    key: String,
    value: V,
}

type ObserverList<V> = Vec<(SubscriptionId, Arc<dyn ContainerObserver<V>>)>;

/// Case-insensitive keyed container with transactional change notification
pub struct KeyedContainer<V> {
    /// folded key -> (original key, value), iterated in folded-key order
    entries: Mutex<BTreeMap<String, Slot<V>>>,
    observers: RwLock<ObserverList<V>>,
    next_subscription: AtomicU64,
}

impl<V> Default for KeyedContainer<V>
where
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyedContainer<V>
where
    V: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            observers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Register an observer for both phases
    pub fn subscribe(&self, observer: Arc<dyn ContainerObserver<V>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    pub fn insert(&self, key: &str, value: V) -> Result<(), ContainerError> {
        let folded = fold_key(key);
        if self.entries.lock().contains_key(&folded) {
            return Err(ContainerError::KeyExists(key.to_string()));
        }

        let change = ContainerChange {
            action: ChangeAction::Add,
            key: Some(key),
            old_key: None,
            value: Some(&value),
            old_value: None,
        };
        self.notify_changing(&change)?;

        {
            let mut entries = self.entries.lock();
            if entries.contains_key(&folded) {
                return Err(ContainerError::KeyExists(key.to_string()));
            }
            entries.insert(
                folded.clone(),
                Slot {
                    key: key.to_string(),
                    value: value.clone(),
                },
            );
        }

        if let Err(e) = self.notify_changed(&change) {
            self.entries.lock().remove(&folded);
            return Err(ContainerError::ObserverFailed {
                key: key.to_string(),
                reason: e.0,
            });
        }
        Ok(())
    }

    /// Remove `key`. Returns `Ok(false)` when the key is absent.
    pub fn remove(&self, key: &str) -> Result<bool, ContainerError> {
        let folded = fold_key(key);
        let existing = match self.entries.lock().get(&folded) {
            Some(slot) => slot.clone(),
            None => return Ok(false),
        };

        let change = ContainerChange {
            action: ChangeAction::Remove,
            key: Some(&existing.key),
            old_key: None,
            value: Some(&existing.value),
            old_value: None,
        };
        self.notify_changing(&change)?;

        let removed = match self.entries.lock().remove(&folded) {
            Some(slot) => slot,
            None => return Ok(false),
        };

        if let Err(e) = self.notify_changed(&change) {
            self.entries.lock().insert(folded, removed);
            return Err(ContainerError::ObserverFailed {
                key: existing.key.clone(),
                reason: e.0,
            });
        }
        Ok(true)
    }

    /// Rebind the value stored under `old_key` to `new_key`.
    ///
    /// Fails if `new_key` is already bound to a different value. A rename that
    /// only changes letter case is always allowed.
    pub fn replace_key(&self, old_key: &str, new_key: &str) -> Result<(), ContainerError> {
        let old_folded = fold_key(old_key);
        let new_folded = fold_key(new_key);

        let existing = self.check_replace_key(&old_folded, &new_folded, old_key, new_key)?;

        let change = ContainerChange {
            action: ChangeAction::Replace,
            key: Some(new_key),
            old_key: Some(&existing.key),
            value: Some(&existing.value),
            old_value: None,
        };
        self.notify_changing(&change)?;

        let (old_slot, displaced) = {
            let mut entries = self.entries.lock();
            Self::validate_replace_key(&entries, &old_folded, &new_folded, &existing.value, new_key)?;
            let old_slot = entries
                .remove(&old_folded)
                .ok_or_else(|| ContainerError::KeyNotFound(old_key.to_string()))?;
            let displaced = entries.insert(
                new_folded.clone(),
                Slot {
                    key: new_key.to_string(),
                    value: old_slot.value.clone(),
                },
            );
            (old_slot, displaced)
        };

        if let Err(e) = self.notify_changed(&change) {
            let mut entries = self.entries.lock();
            entries.remove(&new_folded);
            if let Some(displaced) = displaced {
                entries.insert(new_folded, displaced);
            }
            entries.insert(old_folded, old_slot);
            return Err(ContainerError::ObserverFailed {
                key: new_key.to_string(),
                reason: e.0,
            });
        }
        Ok(())
    }

    /// Replace the value stored under an existing `key`
    pub fn replace_value(&self, key: &str, value: V) -> Result<(), ContainerError> {
        let folded = fold_key(key);
        let existing = self
            .entries
            .lock()
            .get(&folded)
            .cloned()
            .ok_or_else(|| ContainerError::KeyNotFound(key.to_string()))?;

        let change = ContainerChange {
            action: ChangeAction::Replace,
            key: Some(&existing.key),
            old_key: None,
            value: Some(&value),
            old_value: Some(&existing.value),
        };
        self.notify_changing(&change)?;

        let previous = {
            let mut entries = self.entries.lock();
            let slot = entries
                .get_mut(&folded)
                .ok_or_else(|| ContainerError::KeyNotFound(key.to_string()))?;
            std::mem::replace(&mut slot.value, value.clone())
        };

        if let Err(e) = self.notify_changed(&change) {
            if let Some(slot) = self.entries.lock().get_mut(&folded) {
                slot.value = previous;
            }
            return Err(ContainerError::ObserverFailed {
                key: existing.key.clone(),
                reason: e.0,
            });
        }
        Ok(())
    }

    /// Remove every entry (action `Reset`)
    pub fn clear(&self) -> Result<(), ContainerError> {
        let change: ContainerChange<'_, V> = ContainerChange {
            action: ChangeAction::Reset,
            key: None,
            old_key: None,
            value: None,
            old_value: None,
        };
        self.notify_changing(&change)?;

        let snapshot = std::mem::take(&mut *self.entries.lock());

        if let Err(e) = self.notify_changed(&change) {
            self.entries.lock().extend(snapshot);
            return Err(ContainerError::ObserverFailed {
                key: change.describe_key(),
                reason: e.0,
            });
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries
            .lock()
            .get(&fold_key(key))
            .map(|slot| slot.value.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(&fold_key(key))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Keys with their original spelling, in iteration order
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().values().map(|s| s.key.clone()).collect()
    }

    /// Values in iteration order (ascending folded key)
    pub fn values(&self) -> Vec<V> {
        self.entries.lock().values().map(|s| s.value.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(String, V)> {
        self.entries
            .lock()
            .values()
            .map(|s| (s.key.clone(), s.value.clone()))
            .collect()
    }

    /// Key currently bound to `value`, if any
    pub fn key_of(&self, value: &V) -> Option<String> {
        self.entries
            .lock()
            .values()
            .find(|s| s.value == *value)
            .map(|s| s.key.clone())
    }

    // Silent variants used by the tree to undo earlier steps of a multi-container
    // operation. They bypass observers.

    pub(crate) fn insert_silent(&self, key: &str, value: V) -> bool {
        let mut entries = self.entries.lock();
        let folded = fold_key(key);
        if entries.contains_key(&folded) {
            return false;
        }
        entries.insert(
            folded,
            Slot {
                key: key.to_string(),
                value,
            },
        );
        true
    }

    pub(crate) fn remove_silent(&self, key: &str) -> Option<V> {
        self.entries.lock().remove(&fold_key(key)).map(|s| s.value)
    }

    pub(crate) fn replace_key_silent(&self, old_key: &str, new_key: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.remove(&fold_key(old_key)) {
            Some(slot) => {
                entries.insert(
                    fold_key(new_key),
                    Slot {
                        key: new_key.to_string(),
                        value: slot.value,
                    },
                );
                true
            }
            None => false,
        }
    }

    fn check_replace_key(
        &self,
        old_folded: &str,
        new_folded: &str,
        old_key: &str,
        new_key: &str,
    ) -> Result<Slot<V>, ContainerError> {
        let entries = self.entries.lock();
        let existing = entries
            .get(old_folded)
            .cloned()
            .ok_or_else(|| ContainerError::KeyNotFound(old_key.to_string()))?;
        Self::validate_replace_key(&entries, old_folded, new_folded, &existing.value, new_key)?;
        Ok(existing)
    }

    fn validate_replace_key(
        entries: &BTreeMap<String, Slot<V>>,
        old_folded: &str,
        new_folded: &str,
        value: &V,
        new_key: &str,
    ) -> Result<(), ContainerError> {
        if old_folded == new_folded {
            return Ok(());
        }
        match entries.get(new_folded) {
            Some(other) if other.value != *value => {
                Err(ContainerError::KeyExists(new_key.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn snapshot_observers(&self) -> Vec<Arc<dyn ContainerObserver<V>>> {
        self.observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }

    fn notify_changing(&self, change: &ContainerChange<'_, V>) -> Result<(), ContainerError> {
        for observer in self.snapshot_observers() {
            observer
                .changing(change)
                .map_err(|e| ContainerError::Vetoed {
                    key: change.describe_key(),
                    reason: e.0,
                })?;
        }
        Ok(())
    }

    fn notify_changed(&self, change: &ContainerChange<'_, V>) -> Result<(), ObserverError> {
        for observer in self.snapshot_observers() {
            observer.changed(change)?;
        }
        Ok(())
    }
}

impl<V> fmt::Debug for KeyedContainer<V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_map()
            .entries(entries.values().map(|s| (&s.key, &s.value)))
            .finish()
    }
}

/// Read and observe access to a container whose mutations are owned elsewhere.
///
/// The tree hands these out for node child collections so that structural
/// changes only go through its validated setters.
///
/// ```compile_fail
/// use arbor::tree::Tree;
///
/// let mut tree: Tree<(), ()> = Tree::new(());
/// let root = tree.root();
/// tree.add_node(root, "a", ()).unwrap();
/// tree.root_node().nodes().remove("a");
/// ```
pub struct ContainerView<'a, V> {
    inner: &'a KeyedContainer<V>,
}

impl<V> Clone for ContainerView<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for ContainerView<'_, V> {}

impl<'a, V> ContainerView<'a, V>
where
    V: Clone + PartialEq,
{
    pub(crate) fn new(inner: &'a KeyedContainer<V>) -> Self {
        Self { inner }
    }

    pub fn subscribe(&self, observer: Arc<dyn ContainerObserver<V>>) -> SubscriptionId {
        self.inner.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn values(&self) -> Vec<V> {
        self.inner.values()
    }

    pub fn entries(&self) -> Vec<(String, V)> {
        self.inner.entries()
    }

    pub fn key_of(&self, value: &V) -> Option<String> {
        self.inner.key_of(value)
    }
}

impl<V> fmt::Debug for ContainerView<'_, V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}
