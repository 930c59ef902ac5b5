//! Borrowed views over tree entries

use super::{Disposal, ItemSlot, NodeSlot, NodeState, Properties, Tree};
use crate::container::ContainerView;
use crate::types::{EntryId, ItemAttributes, ItemId, NodeId};
use std::fmt;

/// Anything with a name unique among its siblings
pub trait Named {
    fn name(&self) -> &str;
}

/// Anything addressable by a full separator-delimited path
pub trait PathAddressable {
    fn path(&self) -> &str;
}

/// Read-only view of a node
pub struct NodeRef<'a, I, N> {
    tree: &'a Tree<I, N>,
    id: NodeId,
    slot: &'a NodeSlot<N>,
}

impl<'a, I, N> NodeRef<'a, I, N> {
    pub(super) fn new(tree: &'a Tree<I, N>, id: NodeId, slot: &'a NodeSlot<N>) -> Self {
        Self { tree, id, slot }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Empty for the root and for anonymous nodes
    pub fn name(&self) -> &'a str {
        self.slot.name()
    }

    pub fn path(&self) -> &'a str {
        self.tree.node_path(self.id)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.slot.parent
    }

    pub fn depth(&self) -> usize {
        self.slot.depth
    }

    pub fn attributes(&self) -> ItemAttributes {
        self.slot.attributes
    }

    pub fn is_root(&self) -> bool {
        self.id == self.tree.root
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.disposal == Disposal::Disposed
    }

    pub fn state(&self) -> NodeState {
        match self.slot.disposal {
            Disposal::Disposed => NodeState::Disposed,
            Disposal::Disposing => NodeState::Disposing,
            Disposal::Live if self.tree.is_attached(self.id) => NodeState::Attached,
            Disposal::Live => NodeState::Detached,
        }
    }

    /// Child items keyed by name
    pub fn items(&self) -> ContainerView<'a, ItemId> {
        ContainerView::new(&self.slot.items)
    }

    /// Child nodes keyed by name
    pub fn nodes(&self) -> ContainerView<'a, NodeId> {
        ContainerView::new(&self.slot.nodes)
    }

    /// Combined item + node namespace
    pub fn children(&self) -> ContainerView<'a, EntryId> {
        ContainerView::new(&self.slot.children)
    }

    pub fn child_node(&self, name: &str) -> Option<NodeId> {
        self.slot.nodes.get(name)
    }

    pub fn child_item(&self, name: &str) -> Option<ItemId> {
        self.slot.items.get(name)
    }

    pub fn payload(&self) -> &'a N {
        &self.slot.payload
    }

    pub fn properties(&self) -> Option<&'a Properties> {
        self.slot.properties.as_deref()
    }
}

impl<I, N> Named for NodeRef<'_, I, N> {
    fn name(&self) -> &str {
        self.slot.name()
    }
}

impl<I, N> PathAddressable for NodeRef<'_, I, N> {
    fn path(&self) -> &str {
        self.tree.node_path(self.id)
    }
}

impl<I, N> fmt::Display for NodeRef<'_, I, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tree.node_path(self.id))
    }
}

/// Read-only view of a leaf item
pub struct ItemRef<'a, I, N> {
    tree: &'a Tree<I, N>,
    id: ItemId,
    slot: &'a ItemSlot<I>,
}

impl<'a, I, N> ItemRef<'a, I, N> {
    pub(super) fn new(tree: &'a Tree<I, N>, id: ItemId, slot: &'a ItemSlot<I>) -> Self {
        Self { tree, id, slot }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        &self.slot.name
    }

    pub fn path(&self) -> &'a str {
        self.tree.item_path(self.id)
    }

    /// Owning node; `None` only once the item is disposed
    pub fn category(&self) -> Option<NodeId> {
        self.slot.category
    }

    pub fn attributes(&self) -> ItemAttributes {
        self.slot.attributes
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.disposed
    }

    pub fn payload(&self) -> &'a I {
        &self.slot.payload
    }

    pub fn properties(&self) -> Option<&'a Properties> {
        self.slot.properties.as_deref()
    }
}

impl<I, N> Named for ItemRef<'_, I, N> {
    fn name(&self) -> &str {
        &self.slot.name
    }
}

impl<I, N> PathAddressable for ItemRef<'_, I, N> {
    fn path(&self) -> &str {
        self.tree.item_path(self.id)
    }
}

impl<I, N> fmt::Display for ItemRef<'_, I, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tree.item_path(self.id))
    }
}

impl<I, N> fmt::Debug for NodeRef<'_, I, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<I, N> fmt::Debug for ItemRef<'_, I, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRef").field("id", &self.id).finish_non_exhaustive()
    }
}
