//! In-memory storage

use super::{content_hash, Storage};
use crate::error::StorageError;
use crate::tree::path::{absolute_path, normalize_node_path};
use crate::tree::Tree;
use crate::types::{ItemId, NodeId, SEPARATOR};
use chrono::{DateTime, Utc};
use tracing::debug;

/// File contents held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    pub data: Vec<u8>,
    pub modified: DateTime<Utc>,
}

impl MemoryFile {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            modified: Utc::now(),
        }
    }
}

pub struct MemoryStorage {
    name: String,
    tree: Tree<MemoryFile, ()>,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tree: Tree::new(()),
        }
    }

    /// Build a storage from `(path, contents)` pairs, creating folders on demand
    pub fn from_buffers<P, B>(
        name: impl Into<String>,
        buffers: impl IntoIterator<Item = (P, B)>,
    ) -> Result<Self, StorageError>
    where
        P: AsRef<str>,
        B: Into<Vec<u8>>,
    {
        let mut storage = Self::new(name);
        for (path, data) in buffers {
            storage.write_file(path.as_ref(), data)?;
        }
        Ok(storage)
    }

    /// Mutable access for renames, moves and attribute changes. Nothing
    /// outside the tree needs to be kept in sync.
    pub fn tree_mut(&mut self) -> &mut Tree<MemoryFile, ()> {
        &mut self.tree
    }

    /// Make sure every folder along `path` exists and return the last one
    pub fn create_folders(&mut self, path: &str) -> Result<NodeId, StorageError> {
        let mut current = self.tree.root();
        for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()) {
            current = match self.tree.node(current)?.child_node(segment) {
                Some(existing) => existing,
                None => self.tree.add_node(current, segment, ())?,
            };
        }
        Ok(current)
    }

    /// Create or overwrite the file at `path`
    pub fn write_file(&mut self, path: &str, data: impl Into<Vec<u8>>) -> Result<ItemId, StorageError> {
        let path = absolute_path(path);
        let (folder, name) = split_file_path(&path)?;
        let category = self.create_folders(folder)?;
        let file = MemoryFile::new(data.into());

        if let Some(existing) = self.tree.node(category)?.child_item(name) {
            *self.tree.item_payload_mut(existing)? = file;
            return Ok(existing);
        }
        let size = file.data.len();
        let id = self.tree.add_item(category, name, file)?;
        debug!(storage = %self.name, path = %path, size, "Wrote file");
        Ok(id)
    }

    /// Contents of the file at `path`; a missing leading separator is implied
    pub fn read_file(&self, path: &str) -> Result<&[u8], StorageError> {
        let id = self
            .tree
            .find_item(&absolute_path(path))
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        Ok(&self.tree.item(id)?.payload().data)
    }

    /// Delete the file or folder at `path`
    pub fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        let absolute = absolute_path(path);
        if let Some(item) = self.tree.find_item(&absolute) {
            self.tree.delete_item(item)?;
            return Ok(());
        }
        match self.tree.find_node(&normalize_node_path(&absolute)) {
            Some(node) => Ok(self.tree.delete_node(node)?),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }
}

impl Storage for MemoryStorage {
    type File = MemoryFile;
    type Folder = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn tree(&self) -> &Tree<MemoryFile, ()> {
        &self.tree
    }

    fn file_hash(&self, item: ItemId) -> Result<String, StorageError> {
        Ok(content_hash(&self.tree.item(item)?.payload().data))
    }
}

/// Split `path` into its folder part and file name
fn split_file_path(path: &str) -> Result<(&str, &str), StorageError> {
    let (folder, name) = path.rsplit_once(SEPARATOR).unwrap_or(("", path));
    if name.is_empty() {
        return Err(StorageError::NotFound(path.to_string()));
    }
    Ok((folder, name))
}
