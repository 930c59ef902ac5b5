//! Item/category tree
//!
//! [`Tree`] owns an arena of nodes (categories) and leaf items addressed by
//! copyable handles, the root node, and two flattened indexes mapping full
//! paths to nodes and items. Every structural mutation goes through the
//! validated operations in [`node`] and [`item`], which drive the per-node
//! [`KeyedContainer`]s, keep the indexes consistent and emit [`TreeEvent`]s.
//!
//! Paths are memoised per entry and invalidated for a whole subtree on rename
//! or move; they are recomputed on the next read.

pub mod events;
pub mod item;
pub mod node;
pub mod path;
pub mod view;

pub use events::{TreeEvent, TreeListener};
pub use view::{ItemRef, Named, NodeRef, PathAddressable};

use crate::container::KeyedContainer;
use crate::error::TreeError;
use crate::types::{EntryId, ItemAttributes, ItemId, NodeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

/// Extended, user-defined metadata attached to a node or item
pub type Properties = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposal {
    Live,
    Disposing,
    Disposed,
}

/// Attachment lifecycle of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not reachable from the root
    Detached,
    /// Reachable from the root and visible in the indexes
    Attached,
    /// Transient, while a delete is in progress
    Disposing,
    /// Terminal; every mutation fails
    Disposed,
}

struct NodeSlot<N> {
    /// `None` for anonymous nodes, which cannot be attached
    name: Option<String>,
    parent: Option<NodeId>,
    depth: usize,
    attributes: ItemAttributes,
    disposal: Disposal,
    path: OnceLock<String>,
    items: KeyedContainer<ItemId>,
    nodes: KeyedContainer<NodeId>,
    /// Combined item + node namespace used for uniqueness checks
    children: KeyedContainer<EntryId>,
    properties: Option<Box<Properties>>,
    listeners: Vec<Arc<dyn TreeListener>>,
    payload: N,
}

impl<N> NodeSlot<N> {
    fn new(name: Option<String>, attributes: ItemAttributes, payload: N) -> Self {
        Self {
            name,
            parent: None,
            depth: 0,
            attributes,
            disposal: Disposal::Live,
            path: OnceLock::new(),
            items: KeyedContainer::new(),
            nodes: KeyedContainer::new(),
            children: KeyedContainer::new(),
            properties: None,
            listeners: Vec::new(),
            payload,
        }
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

struct ItemSlot<I> {
    name: String,
    /// `None` only once the item is disposed
    category: Option<NodeId>,
    attributes: ItemAttributes,
    disposed: bool,
    path: OnceLock<String>,
    properties: Option<Box<Properties>>,
    listeners: Vec<Arc<dyn TreeListener>>,
    payload: I,
}

/// Hierarchy of nodes (type `N` payload) and leaf items (type `I` payload)
///
/// Slots are never reclaimed: deleted entries and rejected `add_*` calls leave
/// disposed slots behind, so memory grows with the number of entries ever
/// created, not with the number currently live.
pub struct Tree<I, N> {
    nodes: Vec<NodeSlot<N>>,
    items: Vec<ItemSlot<I>>,
    root: NodeId,
    node_index: HashMap<String, NodeId>,
    item_index: HashMap<String, ItemId>,
    listeners: Vec<Arc<dyn TreeListener>>,
}

impl<I, N> Tree<I, N> {
    /// Create a tree whose root node carries `root_payload`.
    ///
    /// The root has an empty name, path `/` and attributes
    /// `ROOT | INDESTRUCTIBLE | UNIQUE_NAME`.
    pub fn new(root_payload: N) -> Self {
        let attributes =
            ItemAttributes::ROOT | ItemAttributes::INDESTRUCTIBLE | ItemAttributes::UNIQUE_NAME;
        let root = NodeId(0);
        let mut tree = Self {
            nodes: vec![NodeSlot::new(None, attributes, root_payload)],
            items: Vec::new(),
            root,
            node_index: HashMap::new(),
            item_index: HashMap::new(),
            listeners: Vec::new(),
        };
        let root_path = tree.node_path(root).to_string();
        tree.node_index.insert(path::path_key(&root_path), root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> NodeRef<'_, I, N> {
        NodeRef::new(self, self.root, &self.nodes[self.root.0])
    }

    pub fn node(&self, id: NodeId) -> Result<NodeRef<'_, I, N>, TreeError> {
        let slot = self.node_slot(id)?;
        Ok(NodeRef::new(self, id, slot))
    }

    pub fn item(&self, id: ItemId) -> Result<ItemRef<'_, I, N>, TreeError> {
        let slot = self.item_slot(id)?;
        Ok(ItemRef::new(self, id, slot))
    }

    /// Look up an attached node by full path (case-insensitive).
    /// The trailing separator may be omitted.
    pub fn find_node(&self, path: &str) -> Option<NodeId> {
        self.node_index
            .get(&path::path_key(&path::normalize_node_path(path)))
            .copied()
    }

    /// Look up an attached item by full path (case-insensitive)
    pub fn find_item(&self, path: &str) -> Option<ItemId> {
        self.item_index.get(&path::path_key(path)).copied()
    }

    /// Every attached node, ordered by path
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut entries: Vec<(&String, NodeId)> =
            self.node_index.iter().map(|(k, v)| (k, *v)).collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id).collect()
    }

    /// Every attached item, ordered by path
    pub fn items(&self) -> Vec<ItemId> {
        let mut entries: Vec<(&String, ItemId)> =
            self.item_index.iter().map(|(k, v)| (k, *v)).collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id).collect()
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn item_count(&self) -> usize {
        self.item_index.len()
    }

    /// Register a context-level listener for events from anywhere in the tree
    pub fn subscribe(&mut self, listener: Arc<dyn TreeListener>) {
        self.listeners.push(listener);
    }

    /// True when `node` is reachable from the root
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            let Some(slot) = self.nodes.get(current.0) else {
                return false;
            };
            if slot.disposal == Disposal::Disposed {
                return false;
            }
            if current == self.root {
                return true;
            }
            match slot.parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Pre-order walk below `node` (excluding `node` itself): each node is
    /// followed by its items, then its sub-nodes.
    pub fn descendants(&self, node: NodeId) -> Result<Vec<EntryId>, TreeError> {
        self.node_slot(node)?;
        let mut entries = self.subtree(node);
        entries.remove(0);
        Ok(entries)
    }

    // --- slot access -------------------------------------------------------

    fn node_slot(&self, id: NodeId) -> Result<&NodeSlot<N>, TreeError> {
        self.nodes.get(id.0).ok_or(TreeError::UnknownNode(id))
    }

    fn item_slot(&self, id: ItemId) -> Result<&ItemSlot<I>, TreeError> {
        self.items.get(id.0).ok_or(TreeError::UnknownItem(id))
    }

    /// Slot of a node that may still be mutated
    fn live_node(&self, id: NodeId) -> Result<&NodeSlot<N>, TreeError> {
        let slot = self.node_slot(id)?;
        if slot.disposal != Disposal::Live {
            return Err(TreeError::Disposed(slot.name().to_string()));
        }
        Ok(slot)
    }

    fn live_node_mut(&mut self, id: NodeId) -> Result<&mut NodeSlot<N>, TreeError> {
        self.live_node(id)?;
        Ok(&mut self.nodes[id.0])
    }

    fn live_item(&self, id: ItemId) -> Result<&ItemSlot<I>, TreeError> {
        let slot = self.item_slot(id)?;
        if slot.disposed {
            return Err(TreeError::Disposed(slot.name.clone()));
        }
        Ok(slot)
    }

    fn live_item_mut(&mut self, id: ItemId) -> Result<&mut ItemSlot<I>, TreeError> {
        self.live_item(id)?;
        Ok(&mut self.items[id.0])
    }

    // --- paths -------------------------------------------------------------

    fn node_path(&self, id: NodeId) -> &str {
        let slot = &self.nodes[id.0];
        slot.path.get_or_init(|| {
            let parent_path = slot.parent.map(|p| self.node_path(p));
            path::node_path(parent_path, slot.name())
        })
    }

    fn item_path(&self, id: ItemId) -> &str {
        let slot = &self.items[id.0];
        slot.path.get_or_init(|| {
            let category_path = slot.category.map(|c| self.node_path(c));
            path::item_path(category_path, &slot.name)
        })
    }

    fn entry_path(&self, entry: EntryId) -> &str {
        match entry {
            EntryId::Node(id) => self.node_path(id),
            EntryId::Item(id) => self.item_path(id),
        }
    }

    fn entry_attached(&self, entry: EntryId) -> bool {
        match entry {
            EntryId::Node(id) => self.is_attached(id),
            EntryId::Item(id) => {
                let slot = &self.items[id.0];
                !slot.disposed && slot.category.is_some_and(|c| self.is_attached(c))
            }
        }
    }

    /// `node` followed by its pre-order descendants
    fn subtree(&self, node: NodeId) -> Vec<EntryId> {
        let mut entries = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let slot = &self.nodes[current.0];
            entries.push(EntryId::Node(current));
            entries.extend(slot.items.values().into_iter().map(EntryId::Item));
            let mut sub_nodes = slot.nodes.values();
            sub_nodes.reverse();
            stack.extend(sub_nodes);
        }
        entries
    }

    fn snapshot_paths(&self, entries: Vec<EntryId>) -> Vec<(EntryId, String)> {
        entries
            .into_iter()
            .map(|e| (e, self.entry_path(e).to_string()))
            .collect()
    }

    /// Re-derive state for `entries` after their head (first entry) was renamed
    /// or moved: reset cached paths, recompute depths, re-key the indexes.
    ///
    /// Returns `(entry, old_path, new_path)` for every entry.
    fn relocate(
        &mut self,
        entries: &[(EntryId, String)],
        was_attached: bool,
    ) -> Vec<(EntryId, String, String)> {
        let Some((head, old_prefix)) = entries.first() else {
            return Vec::new();
        };
        let head = *head;
        let old_prefix = old_prefix.clone();

        for (entry, _) in entries {
            match *entry {
                EntryId::Node(id) => {
                    let depth = match self.nodes[id.0].parent {
                        Some(parent) => self.nodes[parent.0].depth + 1,
                        None => 0,
                    };
                    let slot = &mut self.nodes[id.0];
                    slot.depth = depth;
                    slot.path = OnceLock::new();
                }
                EntryId::Item(id) => self.items[id.0].path = OnceLock::new(),
            }
        }

        let new_prefix = self.entry_path(head).to_string();
        let now_attached = self.entry_attached(head);

        let changes: Vec<(EntryId, String, String)> = entries
            .iter()
            .map(|(entry, old)| {
                let suffix = old.strip_prefix(old_prefix.as_str()).unwrap_or("");
                (*entry, old.clone(), format!("{}{}", new_prefix, suffix))
            })
            .collect();

        if was_attached {
            for (entry, old, _) in &changes {
                self.unindex(*entry, old);
            }
        }
        if now_attached {
            for (entry, _, new) in &changes {
                self.index(*entry, new);
            }
        }
        changes
    }

    fn index(&mut self, entry: EntryId, path: &str) {
        let key = path::path_key(path);
        match entry {
            EntryId::Node(id) => {
                self.node_index.insert(key, id);
            }
            EntryId::Item(id) => {
                self.item_index.insert(key, id);
            }
        }
    }

    fn unindex(&mut self, entry: EntryId, path: &str) {
        let key = path::path_key(path);
        match entry {
            EntryId::Node(id) => {
                if self.node_index.get(&key) == Some(&id) {
                    self.node_index.remove(&key);
                }
            }
            EntryId::Item(id) => {
                if self.item_index.get(&key) == Some(&id) {
                    self.item_index.remove(&key);
                }
            }
        }
    }

    // --- child containers --------------------------------------------------

    /// Insert `entry` into `parent`'s typed container and combined namespace.
    /// On failure nothing stays inserted.
    fn attach_child(&self, parent: NodeId, entry: EntryId, name: &str) -> Result<(), TreeError> {
        let slot = &self.nodes[parent.0];
        match entry {
            EntryId::Node(id) => slot.nodes.insert(name, id)?,
            EntryId::Item(id) => slot.items.insert(name, id)?,
        }
        if let Err(e) = slot.children.insert(name, entry) {
            Self::typed_remove_silent(slot, entry, name);
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove `entry` from `parent`'s containers. On failure nothing stays removed.
    fn detach_child(&self, parent: NodeId, entry: EntryId, name: &str) -> Result<(), TreeError> {
        let slot = &self.nodes[parent.0];
        match entry {
            EntryId::Node(_) => slot.nodes.remove(name)?,
            EntryId::Item(_) => slot.items.remove(name)?,
        };
        if let Err(e) = slot.children.remove(name) {
            Self::typed_insert_silent(slot, entry, name);
            return Err(e.into());
        }
        Ok(())
    }

    /// Undo a successful [`detach_child`](Self::detach_child) without notifications
    fn restore_child(&self, parent: NodeId, entry: EntryId, name: &str) {
        let slot = &self.nodes[parent.0];
        Self::typed_insert_silent(slot, entry, name);
        slot.children.insert_silent(name, entry);
    }

    /// Rebind `entry` from `old_name` to `new_name` in `parent`'s containers
    fn rename_child(
        &self,
        parent: NodeId,
        entry: EntryId,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), TreeError> {
        let slot = &self.nodes[parent.0];
        match entry {
            EntryId::Node(_) => slot.nodes.replace_key(old_name, new_name)?,
            EntryId::Item(_) => slot.items.replace_key(old_name, new_name)?,
        }
        if let Err(e) = slot.children.replace_key(old_name, new_name) {
            match entry {
                EntryId::Node(_) => slot.nodes.replace_key_silent(new_name, old_name),
                EntryId::Item(_) => slot.items.replace_key_silent(new_name, old_name),
            };
            return Err(e.into());
        }
        Ok(())
    }

    fn typed_insert_silent(slot: &NodeSlot<N>, entry: EntryId, name: &str) {
        match entry {
            EntryId::Node(id) => slot.nodes.insert_silent(name, id),
            EntryId::Item(id) => slot.items.insert_silent(name, id),
        };
    }

    fn typed_remove_silent(slot: &NodeSlot<N>, entry: EntryId, name: &str) {
        match entry {
            EntryId::Node(_) => slot.nodes.remove_silent(name).is_some(),
            EntryId::Item(_) => slot.items.remove_silent(name).is_some(),
        };
    }

    /// The existing child of `parent` named `name` if it is not `entry`
    fn conflicting_child(&self, parent: NodeId, name: &str, entry: EntryId) -> Option<EntryId> {
        self.nodes[parent.0]
            .children
            .get(name)
            .filter(|existing| *existing != entry)
    }

    fn duplicate_error(&self, parent: NodeId, name: &str) -> TreeError {
        TreeError::DuplicateName {
            name: name.to_string(),
            parent_path: self.node_path(parent).to_string(),
        }
    }

    // --- events ------------------------------------------------------------

    fn emit(&self, events: &[TreeEvent]) {
        for event in events {
            let entry_listeners = match event.target() {
                EntryId::Node(id) => &self.nodes[id.0].listeners,
                EntryId::Item(id) => &self.items[id.0].listeners,
            };
            for listener in entry_listeners.iter().chain(self.listeners.iter()) {
                listener.on_event(event);
            }
        }
    }

    fn path_events(changes: &[(EntryId, String, String)]) -> Vec<TreeEvent> {
        changes
            .iter()
            .filter(|(_, old, new)| old != new)
            .map(|(entry, old, new)| TreeEvent::PathChanged {
                target: *entry,
                old_path: old.clone(),
                new_path: new.clone(),
            })
            .collect()
    }
}

impl<I, N: Default> Default for Tree<I, N> {
    fn default() -> Self {
        Self::new(N::default())
    }
}
