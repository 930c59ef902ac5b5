//! Node (category) operations: construction, move, rename, delete
//!
//! Every operation validates first and fails without side effects. Container
//! steps run next and are undone if a later step fails; only then are slots,
//! cached paths and indexes updated and events emitted.

use super::path::validate_name;
use super::{Disposal, NodeSlot, NodeState, Properties, Tree, TreeEvent, TreeListener};
use crate::error::TreeError;
use crate::types::{EntryId, ItemAttributes, NodeId};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

impl<I, N> Tree<I, N> {
    /// Create a detached node. `None` creates an anonymous node, which must be
    /// named before it can be attached.
    pub fn create_node(&mut self, name: Option<&str>, payload: N) -> Result<NodeId, TreeError> {
        if let Some(name) = name {
            validate_name(name)?;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSlot::new(
            name.map(str::to_string),
            ItemAttributes::NONE,
            payload,
        ));
        Ok(id)
    }

    /// Check that a new node or item named `name` may be added below `parent`
    pub fn validate_new_child(&self, parent: NodeId, name: &str) -> Result<(), TreeError> {
        validate_name(name)?;
        self.live_node(parent)?;
        self.ensure_children_writable(parent)?;
        if self.nodes[parent.0].children.contains_key(name) {
            return Err(self.duplicate_error(parent, name));
        }
        Ok(())
    }

    /// Create a node and attach it below `parent`
    pub fn add_node(&mut self, parent: NodeId, name: &str, payload: N) -> Result<NodeId, TreeError> {
        self.validate_new_child(parent, name)?;

        let id = self.create_node(Some(name), payload)?;
        if let Err(e) = self.set_parent(id, Some(parent)) {
            self.nodes[id.0].disposal = Disposal::Disposed;
            return Err(e);
        }
        Ok(id)
    }

    /// Check whether `node` may be moved below `new_parent` (`None` detaches it)
    pub fn validate_node_move(
        &self,
        node: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<(), TreeError> {
        let slot = self.live_node(node)?;
        if node == self.root {
            return Err(TreeError::RootImmutable);
        }
        if slot.attributes.contains(ItemAttributes::READ_ONLY) {
            return Err(TreeError::ReadOnly(self.node_path(node).to_string()));
        }
        if let Some(old_parent) = slot.parent {
            if Some(old_parent) != new_parent {
                self.ensure_children_writable(old_parent)?;
            }
        }

        let Some(parent) = new_parent else {
            return Ok(());
        };
        if parent == node {
            return Err(TreeError::SelfParent);
        }
        let name = slot.name.as_deref().ok_or(TreeError::UnnamedNode)?;
        self.live_node(parent)?;
        if self.is_ancestor(node, parent) {
            return Err(TreeError::CyclicParent {
                node: self.node_path(node).to_string(),
                parent: self.node_path(parent).to_string(),
            });
        }
        if slot.parent != Some(parent) {
            self.ensure_children_writable(parent)?;
        }
        if self
            .conflicting_child(parent, name, EntryId::Node(node))
            .is_some()
        {
            return Err(self.duplicate_error(parent, name));
        }
        Ok(())
    }

    /// Move `node` below `new_parent`, or detach it with `None`.
    ///
    /// The whole subtree follows: cached paths are invalidated, depths and index
    /// entries are updated. Emits `Moved` then `PathChanged` for every entry of
    /// the subtree.
    pub fn set_parent(&mut self, node: NodeId, new_parent: Option<NodeId>) -> Result<(), TreeError> {
        if self.live_node(node)?.parent == new_parent {
            return Ok(());
        }
        self.validate_node_move(node, new_parent)?;

        let slot = &self.nodes[node.0];
        let name = slot.name().to_string();
        let old_parent = slot.parent;
        let old_parent_path = old_parent.map(|p| self.node_path(p).to_string());
        let was_attached = self.is_attached(node);
        let entries = self.snapshot_paths(self.subtree(node));

        if let Some(old) = old_parent {
            self.detach_child(old, EntryId::Node(node), &name)?;
        }
        if let Some(new) = new_parent {
            if let Err(e) = self.attach_child(new, EntryId::Node(node), &name) {
                if let Some(old) = old_parent {
                    self.restore_child(old, EntryId::Node(node), &name);
                }
                return Err(e);
            }
        }

        self.nodes[node.0].parent = new_parent;
        let changes = self.relocate(&entries, was_attached);
        let (old_path, new_path) = (changes[0].1.clone(), changes[0].2.clone());

        debug!(
            old_path = %old_path,
            new_path = %new_path,
            subtree = changes.len(),
            "Moved node"
        );

        let mut events = vec![TreeEvent::Moved {
            target: EntryId::Node(node),
            old_path,
            old_parent_path,
            new_path,
        }];
        events.extend(Self::path_events(&changes));
        self.emit(&events);
        Ok(())
    }

    /// Check whether `node` may be renamed to `new_name`
    pub fn validate_node_rename(&self, node: NodeId, new_name: &str) -> Result<(), TreeError> {
        let slot = self.live_node(node)?;
        if node == self.root {
            return Err(TreeError::RootImmutable);
        }
        if slot.attributes.contains(ItemAttributes::UNIQUE_NAME) {
            return Err(TreeError::UniqueName(self.node_path(node).to_string()));
        }
        if slot.attributes.contains(ItemAttributes::READ_ONLY) {
            return Err(TreeError::ReadOnly(self.node_path(node).to_string()));
        }
        validate_name(new_name)?;
        if let Some(parent) = slot.parent {
            if self
                .conflicting_child(parent, new_name, EntryId::Node(node))
                .is_some()
            {
                return Err(self.duplicate_error(parent, new_name));
            }
        }
        Ok(())
    }

    /// Rename `node`. Emits `Renamed` then `PathChanged` for every entry of the subtree.
    pub fn set_node_name(&mut self, node: NodeId, new_name: &str) -> Result<(), TreeError> {
        if self.live_node(node)?.name.as_deref() == Some(new_name) {
            return Ok(());
        }
        self.validate_node_rename(node, new_name)?;

        let slot = &self.nodes[node.0];
        let old_name = slot.name.clone();
        let parent = slot.parent;
        let was_attached = self.is_attached(node);
        let entries = self.snapshot_paths(self.subtree(node));

        if let (Some(parent), Some(old_name)) = (parent, old_name.as_deref()) {
            self.rename_child(parent, EntryId::Node(node), old_name, new_name)?;
        }

        self.nodes[node.0].name = Some(new_name.to_string());
        let changes = self.relocate(&entries, was_attached);
        let (old_path, new_path) = (changes[0].1.clone(), changes[0].2.clone());

        debug!(
            old_path = %old_path,
            new_path = %new_path,
            subtree = changes.len(),
            "Renamed node"
        );

        let mut events = vec![TreeEvent::Renamed {
            target: EntryId::Node(node),
            old_name: old_name.unwrap_or_default(),
            old_path,
            new_path,
        }];
        events.extend(Self::path_events(&changes));
        self.emit(&events);
        Ok(())
    }

    /// Check whether `node` may be deleted
    pub fn validate_node_delete(&self, node: NodeId) -> Result<(), TreeError> {
        let slot = self.live_node(node)?;
        if node == self.root {
            return Err(TreeError::RootImmutable);
        }
        if slot.attributes.contains(ItemAttributes::INDESTRUCTIBLE) {
            return Err(TreeError::Indestructible(self.node_path(node).to_string()));
        }
        if slot.attributes.contains(ItemAttributes::READ_ONLY) {
            return Err(TreeError::ReadOnly(self.node_path(node).to_string()));
        }
        if let Some(parent) = slot.parent {
            self.ensure_children_writable(parent)?;
        }
        Ok(())
    }

    /// Delete `node`: every descendant node and item ends disposed, the node is
    /// removed from its parent and the indexes, and `Deleted` is emitted with
    /// the pre-delete path.
    pub fn delete_node(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.validate_node_delete(node)?;

        let slot = &self.nodes[node.0];
        let name = slot.name().to_string();
        let parent = slot.parent;
        let was_attached = self.is_attached(node);
        let entries = self.snapshot_paths(self.subtree(node));
        let path = entries[0].1.clone();

        self.nodes[node.0].disposal = Disposal::Disposing;
        if let Some(parent) = parent {
            if let Err(e) = self.detach_child(parent, EntryId::Node(node), &name) {
                self.nodes[node.0].disposal = Disposal::Live;
                return Err(e);
            }
        }

        for (entry, entry_path) in &entries {
            match *entry {
                EntryId::Node(id) => self.nodes[id.0].disposal = Disposal::Disposed,
                EntryId::Item(id) => self.items[id.0].disposed = true,
            }
            if was_attached {
                self.unindex(*entry, entry_path);
            }
        }

        let slot = &mut self.nodes[node.0];
        slot.parent = None;
        slot.depth = 0;
        slot.path = Default::default();

        debug!(path = %path, disposed = entries.len(), "Deleted node");

        self.emit(&[TreeEvent::Deleted {
            target: EntryId::Node(node),
            path,
        }]);
        Ok(())
    }

    /// Set or clear attribute flags. [`ItemAttributes::ROOT`] is never toggled.
    pub fn set_node_attributes(
        &mut self,
        node: NodeId,
        flags: ItemAttributes,
        value: bool,
    ) -> Result<(), TreeError> {
        self.live_node_mut(node)?.attributes.set(flags, value);
        Ok(())
    }

    pub fn node_state(&self, node: NodeId) -> Result<NodeState, TreeError> {
        Ok(self.node(node)?.state())
    }

    /// Register a listener for events targeting `node`
    pub fn watch_node(
        &mut self,
        node: NodeId,
        listener: Arc<dyn TreeListener>,
    ) -> Result<(), TreeError> {
        self.live_node_mut(node)?.listeners.push(listener);
        Ok(())
    }

    pub fn node_payload_mut(&mut self, node: NodeId) -> Result<&mut N, TreeError> {
        Ok(&mut self.live_node_mut(node)?.payload)
    }

    /// Extended property bag, created on first access
    pub fn node_properties_mut(&mut self, node: NodeId) -> Result<&mut Properties, TreeError> {
        Ok(self
            .live_node_mut(node)?
            .properties
            .get_or_insert_with(Default::default))
    }

    /// Ordering used for sorted listings: by depth, then by parent, then by path
    pub fn compare_nodes(&self, a: NodeId, b: NodeId) -> Result<Ordering, TreeError> {
        self.node_slot(a)?;
        self.node_slot(b)?;
        Ok(self.compare_node_slots(a, b))
    }

    /// Reference to `path` relative to `node`'s path
    pub fn make_relative(&self, node: NodeId, path: &str) -> Result<String, TreeError> {
        self.node_slot(node)?;
        Ok(super::path::relative_path(self.node_path(node), path))
    }

    fn compare_node_slots(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (sa, sb) = (&self.nodes[a.0], &self.nodes[b.0]);
        if sa.parent == sb.parent {
            return super::path::path_key(self.node_path(a))
                .cmp(&super::path::path_key(self.node_path(b)));
        }
        match (sa.depth.cmp(&sb.depth), sa.parent, sb.parent) {
            (Ordering::Equal, Some(pa), Some(pb)) => self.compare_node_slots(pa, pb),
            (Ordering::Equal, _, _) => self.node_path(a).cmp(self.node_path(b)),
            (ordering, _, _) => ordering,
        }
    }

    /// True when `ancestor` is `node` or one of its ancestors
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    pub(super) fn ensure_children_writable(&self, node: NodeId) -> Result<(), TreeError> {
        if self.nodes[node.0]
            .attributes
            .contains(ItemAttributes::READ_ONLY)
        {
            return Err(TreeError::ReadOnly(self.node_path(node).to_string()));
        }
        Ok(())
    }
}
