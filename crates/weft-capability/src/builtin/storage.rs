//! In-memory state storage with per-session transaction overlays.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use parity_scale_codec::Encode;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::backend::Storage;
use crate::builtin::hashing::blake2_256;
use crate::capability::Capability;
use crate::error::{CapabilityError, CapabilityResult};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// Pending writes; `None` marks a deletion.
type Changes = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

#[derive(Debug, Default)]
struct Committed {
    top: Map,
    children: BTreeMap<Vec<u8>, Map>,
}

impl Committed {
    fn apply(&mut self, layer: Layer) {
        for (key, value) in layer.top {
            match value {
                Some(value) => {
                    self.top.insert(key, value);
                }
                None => {
                    self.top.remove(&key);
                }
            }
        }

        for (child, changes) in layer.children {
            if changes.killed {
                self.children.remove(&child);
            }
            let trie = self.children.entry(child.clone()).or_default();
            for (key, value) in changes.entries {
                match value {
                    Some(value) => {
                        trie.insert(key, value);
                    }
                    None => {
                        trie.remove(&key);
                    }
                }
            }
            if trie.is_empty() {
                self.children.remove(&child);
            }
        }
    }
}

/// Writes to one child trie inside a transaction. `entries` were made after
/// the kill, if there was one.
#[derive(Debug, Default)]
struct ChildChanges {
    killed: bool,
    entries: Changes,
}

/// Writes made inside one transaction.
#[derive(Debug, Default)]
struct Layer {
    top: Changes,
    children: BTreeMap<Vec<u8>, ChildChanges>,
}

impl Layer {
    /// Fold an inner transaction's writes into this one.
    fn absorb(&mut self, inner: Layer) {
        self.top.extend(inner.top);
        for (child, changes) in inner.children {
            if changes.killed {
                self.children.insert(child, changes);
            } else {
                self.children
                    .entry(child)
                    .or_default()
                    .entries
                    .extend(changes.entries);
            }
        }
    }

    fn child(&mut self, child: &[u8]) -> &mut ChildChanges {
        self.children.entry(child.to_vec()).or_default()
    }
}

/// Root over a sorted key/value map: BLAKE2-256 of its SCALE encoding.
///
/// This is a content commitment, not a Merkle-Patricia root; proofs are the
/// business of a real trie backend.
fn content_root(map: &Map) -> [u8; 32] {
    blake2_256(&map.encode())
}

fn apply_changes(map: &mut Map, changes: &Changes) {
    for (key, value) in changes {
        match value {
            Some(value) => {
                map.insert(key.clone(), value.clone());
            }
            None => {
                map.remove(key);
            }
        }
    }
}

/// A [`Storage`] backend that keeps all state in memory.
///
/// Committed state is shared by every handle made with
/// [`session`](Storage::session). Each handle keeps its own stack of open
/// transactions as overlays over that state: reads look through the
/// overlays first, commit folds the innermost overlay into the next one, and
/// the outermost commit writes it to the shared state. Writes made with no
/// transaction open go straight to the shared state.
///
/// # Example
///
/// ```
/// use weft_capability::backend::Storage;
/// use weft_capability::builtin::MemoryStorage;
///
/// let storage = MemoryStorage::new();
/// storage.set(b"a", b"1").unwrap();
///
/// storage.start_transaction().unwrap();
/// storage.set(b"a", b"2").unwrap();
/// storage.rollback_transaction().unwrap();
///
/// assert_eq!(storage.get(b"a").unwrap(), Some(b"1".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    committed: Arc<RwLock<Committed>>,
    pending: Mutex<Vec<Layer>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let top = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            committed: Arc::new(RwLock::new(Committed {
                top,
                ..Committed::default()
            })),
            pending: Mutex::default(),
        }
    }

    /// Copy of the committed top-level key space.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.committed.read().top.clone()
    }

    /// Number of transactions open on this handle.
    pub fn transaction_depth(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run `change` against the innermost open transaction, or apply it to
    /// the committed state directly when none is open.
    fn stage(&self, change: impl FnOnce(&mut Layer)) {
        let mut pending = self.pending.lock();
        match pending.last_mut() {
            Some(layer) => change(layer),
            None => {
                let mut layer = Layer::default();
                change(&mut layer);
                self.committed.write().apply(layer);
            }
        }
    }

    /// Every pending top-level write of this handle, later ones winning.
    fn pending_top(&self) -> Changes {
        let mut merged = Changes::new();
        for layer in self.pending.lock().iter() {
            merged.extend(layer.top.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    /// The top-level key space as this handle sees it.
    fn visible_top(&self) -> Map {
        let pending = self.pending_top();
        let mut top = self.committed.read().top.clone();
        apply_changes(&mut top, &pending);
        top
    }
}

impl Capability for MemoryStorage {
    fn name(&self) -> &str {
        "memory-storage"
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> CapabilityResult<Option<Vec<u8>>> {
        let pending = self.pending.lock();
        for layer in pending.iter().rev() {
            if let Some(value) = layer.top.get(key) {
                return Ok(value.clone());
            }
        }
        Ok(self.committed.read().top.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> CapabilityResult<()> {
        self.stage(|layer| {
            layer.top.insert(key.to_vec(), Some(value.to_vec()));
        });
        Ok(())
    }

    fn clear(&self, key: &[u8]) -> CapabilityResult<()> {
        self.stage(|layer| {
            layer.top.insert(key.to_vec(), None);
        });
        Ok(())
    }

    fn clear_prefix(&self, prefix: &[u8]) -> CapabilityResult<()> {
        let mut doomed: BTreeSet<Vec<u8>> = self
            .committed
            .read()
            .top
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        doomed.extend(
            self.pending_top()
                .into_keys()
                .filter(|key| key.starts_with(prefix)),
        );

        trace!(removed = doomed.len(), "Cleared storage prefix");
        self.stage(|layer| {
            for key in doomed {
                layer.top.insert(key, None);
            }
        });
        Ok(())
    }

    fn next_key(&self, key: &[u8]) -> CapabilityResult<Option<Vec<u8>>> {
        let pending = self.pending_top();
        let after = (Bound::Excluded(key), Bound::Unbounded);

        let from_pending = pending
            .range::<[u8], _>(after)
            .find(|(_, value)| value.is_some())
            .map(|(key, _)| key.clone());
        let from_committed = self
            .committed
            .read()
            .top
            .range::<[u8], _>(after)
            .map(|(key, _)| key)
            .find(|key| !pending.contains_key(*key))
            .cloned();

        Ok(match (from_pending, from_committed) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        })
    }

    fn root(&self) -> CapabilityResult<[u8; 32]> {
        Ok(content_root(&self.visible_top()))
    }

    fn session(self: Arc<Self>) -> Arc<dyn Storage> {
        Arc::new(Self {
            committed: Arc::clone(&self.committed),
            pending: Mutex::default(),
        })
    }

    fn start_transaction(&self) -> CapabilityResult<()> {
        let mut pending = self.pending.lock();
        pending.push(Layer::default());
        debug!(depth = pending.len(), "Started storage transaction");
        Ok(())
    }

    fn commit_transaction(&self) -> CapabilityResult<()> {
        let mut pending = self.pending.lock();
        let layer = pending.pop().ok_or(CapabilityError::NoOpenTransaction)?;
        match pending.last_mut() {
            Some(parent) => parent.absorb(layer),
            None => self.committed.write().apply(layer),
        }
        debug!(depth = pending.len(), "Committed storage transaction");
        Ok(())
    }

    fn rollback_transaction(&self) -> CapabilityResult<()> {
        let mut pending = self.pending.lock();
        let layer = pending.pop().ok_or(CapabilityError::NoOpenTransaction)?;
        debug!(
            depth = pending.len(),
            reverted = layer.top.len() + layer.children.len(),
            "Rolled back storage transaction"
        );
        Ok(())
    }

    fn child_get(&self, child: &[u8], key: &[u8]) -> CapabilityResult<Option<Vec<u8>>> {
        let pending = self.pending.lock();
        for layer in pending.iter().rev() {
            if let Some(changes) = layer.children.get(child) {
                if let Some(value) = changes.entries.get(key) {
                    return Ok(value.clone());
                }
                if changes.killed {
                    return Ok(None);
                }
            }
        }
        Ok(self
            .committed
            .read()
            .children
            .get(child)
            .and_then(|trie| trie.get(key).cloned()))
    }

    fn child_set(&self, child: &[u8], key: &[u8], value: &[u8]) -> CapabilityResult<()> {
        self.stage(|layer| {
            layer
                .child(child)
                .entries
                .insert(key.to_vec(), Some(value.to_vec()));
        });
        Ok(())
    }

    fn child_clear(&self, child: &[u8], key: &[u8]) -> CapabilityResult<()> {
        self.stage(|layer| {
            layer.child(child).entries.insert(key.to_vec(), None);
        });
        Ok(())
    }

    fn child_root(&self, child: &[u8]) -> CapabilityResult<[u8; 32]> {
        let pending = self.pending.lock();
        let mut trie = self
            .committed
            .read()
            .children
            .get(child)
            .cloned()
            .unwrap_or_default();
        for changes in pending.iter().filter_map(|layer| layer.children.get(child)) {
            if changes.killed {
                trie.clear();
            }
            apply_changes(&mut trie, &changes.entries);
        }
        Ok(content_root(&trie))
    }

    fn child_kill(&self, child: &[u8]) -> CapabilityResult<()> {
        self.stage(|layer| {
            layer.children.insert(
                child.to_vec(),
                ChildChanges {
                    killed: true,
                    entries: Changes::new(),
                },
            );
        });
        Ok(())
    }
}
