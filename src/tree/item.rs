//! Leaf item operations
//!
//! Items share the node rename/move/delete protocol but have no descendants,
//! so path changes and disposal never cascade.

use super::path::validate_name;
use super::{ItemSlot, Properties, Tree, TreeEvent, TreeListener};
use crate::error::TreeError;
use crate::types::{EntryId, ItemAttributes, ItemId, NodeId};
use std::sync::{Arc, OnceLock};
use tracing::debug;

impl<I, N> Tree<I, N> {
    /// Create an item named `name` owned by `category`.
    ///
    /// Validation happens before the item exists; an item is never observable
    /// without an owning node.
    pub fn add_item(&mut self, category: NodeId, name: &str, payload: I) -> Result<ItemId, TreeError> {
        self.validate_new_child(category, name)?;

        let id = ItemId(self.items.len());
        self.items.push(ItemSlot {
            name: name.to_string(),
            category: None,
            attributes: ItemAttributes::NONE,
            disposed: false,
            path: OnceLock::new(),
            properties: None,
            listeners: Vec::new(),
            payload,
        });

        if let Err(e) = self.attach_child(category, EntryId::Item(id), name) {
            self.items[id.0].disposed = true;
            return Err(e);
        }

        let entries = vec![(EntryId::Item(id), name.to_string())];
        self.items[id.0].category = Some(category);
        let changes = self.relocate(&entries, false);
        let new_path = changes[0].2.clone();

        debug!(path = %new_path, "Added item");

        let mut events = vec![TreeEvent::Moved {
            target: EntryId::Item(id),
            old_path: name.to_string(),
            old_parent_path: None,
            new_path,
        }];
        events.extend(Self::path_events(&changes));
        self.emit(&events);
        Ok(id)
    }

    /// Check whether `item` may be moved into `category`
    pub fn validate_item_move(&self, item: ItemId, category: NodeId) -> Result<(), TreeError> {
        let slot = self.live_item(item)?;
        if slot.attributes.contains(ItemAttributes::READ_ONLY) {
            return Err(TreeError::ReadOnly(self.item_path(item).to_string()));
        }
        self.live_node(category)?;
        if slot.category == Some(category) {
            return Ok(());
        }
        if let Some(old) = slot.category {
            self.ensure_children_writable(old)?;
        }
        self.ensure_children_writable(category)?;
        if self
            .conflicting_child(category, &slot.name, EntryId::Item(item))
            .is_some()
        {
            return Err(self.duplicate_error(category, &slot.name));
        }
        Ok(())
    }

    /// Move `item` into `category`. Emits `Moved` then `PathChanged`.
    pub fn set_item_category(&mut self, item: ItemId, category: NodeId) -> Result<(), TreeError> {
        if self.live_item(item)?.category == Some(category) {
            return Ok(());
        }
        self.validate_item_move(item, category)?;

        let slot = &self.items[item.0];
        let name = slot.name.clone();
        let old_category = slot.category;
        let old_parent_path = old_category.map(|c| self.node_path(c).to_string());
        let was_attached = self.entry_attached(EntryId::Item(item));
        let entries = self.snapshot_paths(vec![EntryId::Item(item)]);

        if let Some(old) = old_category {
            self.detach_child(old, EntryId::Item(item), &name)?;
        }
        if let Err(e) = self.attach_child(category, EntryId::Item(item), &name) {
            if let Some(old) = old_category {
                self.restore_child(old, EntryId::Item(item), &name);
            }
            return Err(e);
        }

        self.items[item.0].category = Some(category);
        let changes = self.relocate(&entries, was_attached);
        let (old_path, new_path) = (changes[0].1.clone(), changes[0].2.clone());

        debug!(old_path = %old_path, new_path = %new_path, "Moved item");

        let mut events = vec![TreeEvent::Moved {
            target: EntryId::Item(item),
            old_path,
            old_parent_path,
            new_path,
        }];
        events.extend(Self::path_events(&changes));
        self.emit(&events);
        Ok(())
    }

    /// Check whether `item` may be renamed to `new_name`
    pub fn validate_item_rename(&self, item: ItemId, new_name: &str) -> Result<(), TreeError> {
        let slot = self.live_item(item)?;
        if slot.attributes.contains(ItemAttributes::UNIQUE_NAME) {
            return Err(TreeError::UniqueName(self.item_path(item).to_string()));
        }
        if slot.attributes.contains(ItemAttributes::READ_ONLY) {
            return Err(TreeError::ReadOnly(self.item_path(item).to_string()));
        }
        validate_name(new_name)?;
        if let Some(category) = slot.category {
            if self
                .conflicting_child(category, new_name, EntryId::Item(item))
                .is_some()
            {
                return Err(self.duplicate_error(category, new_name));
            }
        }
        Ok(())
    }

    /// Rename `item`. Emits `Renamed` then `PathChanged`.
    pub fn set_item_name(&mut self, item: ItemId, new_name: &str) -> Result<(), TreeError> {
        if self.live_item(item)?.name == new_name {
            return Ok(());
        }
        self.validate_item_rename(item, new_name)?;

        let slot = &self.items[item.0];
        let old_name = slot.name.clone();
        let category = slot.category;
        let was_attached = self.entry_attached(EntryId::Item(item));
        let entries = self.snapshot_paths(vec![EntryId::Item(item)]);

        if let Some(category) = category {
            self.rename_child(category, EntryId::Item(item), &old_name, new_name)?;
        }

        self.items[item.0].name = new_name.to_string();
        let changes = self.relocate(&entries, was_attached);
        let (old_path, new_path) = (changes[0].1.clone(), changes[0].2.clone());

        debug!(old_path = %old_path, new_path = %new_path, "Renamed item");

        let mut events = vec![TreeEvent::Renamed {
            target: EntryId::Item(item),
            old_name,
            old_path,
            new_path,
        }];
        events.extend(Self::path_events(&changes));
        self.emit(&events);
        Ok(())
    }

    /// Check whether `item` may be deleted
    pub fn validate_item_delete(&self, item: ItemId) -> Result<(), TreeError> {
        let slot = self.live_item(item)?;
        if slot.attributes.contains(ItemAttributes::INDESTRUCTIBLE) {
            return Err(TreeError::Indestructible(self.item_path(item).to_string()));
        }
        if slot.attributes.contains(ItemAttributes::READ_ONLY) {
            return Err(TreeError::ReadOnly(self.item_path(item).to_string()));
        }
        if let Some(category) = slot.category {
            self.ensure_children_writable(category)?;
        }
        Ok(())
    }

    /// Delete `item`, removing it from its category and the item index
    pub fn delete_item(&mut self, item: ItemId) -> Result<(), TreeError> {
        self.validate_item_delete(item)?;

        let slot = &self.items[item.0];
        let name = slot.name.clone();
        let category = slot.category;
        let was_attached = self.entry_attached(EntryId::Item(item));
        let path = self.item_path(item).to_string();

        if let Some(category) = category {
            self.detach_child(category, EntryId::Item(item), &name)?;
        }
        if was_attached {
            self.unindex(EntryId::Item(item), &path);
        }

        let slot = &mut self.items[item.0];
        slot.disposed = true;
        slot.category = None;
        slot.path = OnceLock::new();

        debug!(path = %path, "Deleted item");

        self.emit(&[TreeEvent::Deleted {
            target: EntryId::Item(item),
            path,
        }]);
        Ok(())
    }

    /// Set or clear attribute flags. [`ItemAttributes::ROOT`] is never toggled.
    pub fn set_item_attributes(
        &mut self,
        item: ItemId,
        flags: ItemAttributes,
        value: bool,
    ) -> Result<(), TreeError> {
        self.live_item_mut(item)?.attributes.set(flags, value);
        Ok(())
    }

    /// Register a listener for events targeting `item`
    pub fn watch_item(
        &mut self,
        item: ItemId,
        listener: Arc<dyn TreeListener>,
    ) -> Result<(), TreeError> {
        self.live_item_mut(item)?.listeners.push(listener);
        Ok(())
    }

    pub fn item_payload_mut(&mut self, item: ItemId) -> Result<&mut I, TreeError> {
        Ok(&mut self.live_item_mut(item)?.payload)
    }

    /// Extended property bag, created on first access
    pub fn item_properties_mut(&mut self, item: ItemId) -> Result<&mut Properties, TreeError> {
        Ok(self
            .live_item_mut(item)?
            .properties
            .get_or_insert_with(Default::default))
    }
}
