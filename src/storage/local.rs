//! Local filesystem storage
//!
//! Loads a directory into a [`Tree`] and mirrors structural changes back to
//! disk. Each mutating operation validates against the tree first, performs
//! the filesystem operation, then commits the tree mutation.

use super::{content_hash, matches_ignore_pattern, Storage};
use crate::config::StorageConfig;
use crate::error::{StorageError, TreeError};
use crate::tree::path::validate_name;
use crate::tree::{Tree, TreeListener};
use crate::types::{EntryId, ItemId, NodeId, SEPARATOR};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// File metadata captured at load or write time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Folder metadata captured at load or create time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFolder {
    pub modified: Option<DateTime<Utc>>,
}

pub struct LocalStorage {
    root: PathBuf,
    name: String,
    tree: Tree<LocalFile, LocalFolder>,
}

fn modified_time(metadata: &fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

impl LocalStorage {
    /// Scan `root` into a new storage
    pub fn open(root: &Path, config: &StorageConfig) -> Result<Self, StorageError> {
        let root = dunce::canonicalize(root)
            .map_err(|e| StorageError::InvalidRoot(format!("{}: {}", root.display(), e)))?;
        let metadata = fs::metadata(&root)?;
        if !metadata.is_dir() {
            return Err(StorageError::InvalidRoot(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut storage = Self {
            name: root.to_string_lossy().into_owned(),
            tree: Tree::new(LocalFolder {
                modified: modified_time(&metadata),
            }),
            root,
        };
        storage.load(config)?;

        debug!(
            root = %storage.name,
            folders = storage.tree.node_count(),
            files = storage.tree.item_count(),
            "Opened local storage"
        );
        Ok(storage)
    }

    fn load(&mut self, config: &StorageConfig) -> Result<(), StorageError> {
        let mut walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(config.follow_links)
            .sort_by_file_name();
        if let Some(depth) = config.max_depth {
            walker = walker.max_depth(depth);
        }

        let root = self.root.clone();
        let patterns = &config.ignore_patterns;
        let accept = |entry: &DirEntry| -> bool {
            let relative = relative_path(&root, entry.path());
            if patterns.iter().any(|p| matches_ignore_pattern(&relative, p)) {
                debug!(path = %relative, "Ignored by pattern");
                return false;
            }
            let Some(name) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "Skipping entry with non UTF-8 name");
                return false;
            };
            if let Err(e) = validate_name(name) {
                warn!(path = %relative, error = %e, "Skipping entry");
                return false;
            }
            true
        };

        let mut folders: HashMap<PathBuf, NodeId> = HashMap::new();
        folders.insert(self.root.clone(), self.tree.root());

        for entry in walker.into_iter().filter_entry(accept) {
            let entry = entry?;
            let Some(parent) = entry.path().parent().and_then(|p| folders.get(p)).copied() else {
                // parent folder was skipped
                continue;
            };
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let metadata = entry.metadata()?;
            let file_type = entry.file_type();

            let added = if file_type.is_dir() {
                let folder = LocalFolder {
                    modified: modified_time(&metadata),
                };
                self.tree
                    .add_node(parent, name, folder)
                    .map(|id| {
                        folders.insert(entry.path().to_path_buf(), id);
                    })
            } else if file_type.is_file() {
                let file = LocalFile {
                    size: metadata.len(),
                    modified: modified_time(&metadata),
                };
                self.tree.add_item(parent, name, file).map(|_| ())
            } else {
                debug!(path = %entry.path().display(), "Skipping special file");
                Ok(())
            };

            match added {
                Ok(()) => {}
                Err(e @ TreeError::DuplicateName { .. }) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping entry");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Canonical root directory
    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// On-disk location of a tree entry
    pub fn local_path(&self, entry: impl Into<EntryId>) -> Result<PathBuf, StorageError> {
        let path = match entry.into() {
            EntryId::Node(id) => self.tree.node(id)?.path().to_string(),
            EntryId::Item(id) => self.tree.item(id)?.path().to_string(),
        };
        Ok(path
            .split(SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }

    /// Register a listener for every tree event
    pub fn subscribe(&mut self, listener: Arc<dyn TreeListener>) {
        self.tree.subscribe(listener);
    }

    /// Create the folder `name` below `parent`
    pub fn create_folder(&mut self, parent: NodeId, name: &str) -> Result<NodeId, StorageError> {
        self.tree.validate_new_child(parent, name)?;
        let path = self.local_path(parent)?.join(name);
        fs::create_dir(&path)?;
        let folder = LocalFolder {
            modified: fs::metadata(&path).ok().as_ref().and_then(modified_time),
        };

        match self.tree.add_node(parent, name, folder) {
            Ok(id) => Ok(id),
            Err(e) => {
                undo(fs::remove_dir(&path), &path);
                Err(e.into())
            }
        }
    }

    /// Write `data` to the file `name` below `category`, creating it if needed
    pub fn write_file(
        &mut self,
        category: NodeId,
        name: &str,
        data: &[u8],
    ) -> Result<ItemId, StorageError> {
        if let Some(item) = self.tree.node(category)?.child_item(name) {
            let path = self.local_path(item)?;
            fs::write(&path, data)?;
            let metadata = fs::metadata(&path)?;
            *self.tree.item_payload_mut(item)? = LocalFile {
                size: metadata.len(),
                modified: modified_time(&metadata),
            };
            debug!(path = %path.display(), size = data.len(), "Overwrote file");
            return Ok(item);
        }

        self.tree.validate_new_child(category, name)?;
        let path = self.local_path(category)?.join(name);
        fs::write(&path, data)?;
        let metadata = fs::metadata(&path)?;
        let file = LocalFile {
            size: metadata.len(),
            modified: modified_time(&metadata),
        };

        match self.tree.add_item(category, name, file) {
            Ok(id) => Ok(id),
            Err(e) => {
                undo(fs::remove_file(&path), &path);
                Err(e.into())
            }
        }
    }

    pub fn read_file(&self, item: ItemId) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(self.local_path(item)?)?)
    }

    pub fn rename_folder(&mut self, node: NodeId, new_name: &str) -> Result<(), StorageError> {
        self.tree.validate_node_rename(node, new_name)?;
        let from = self.local_path(node)?;
        let to = from.with_file_name(new_name);
        fs::rename(&from, &to)?;

        if let Err(e) = self.tree.set_node_name(node, new_name) {
            undo(fs::rename(&to, &from), &to);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn rename_file(&mut self, item: ItemId, new_name: &str) -> Result<(), StorageError> {
        self.tree.validate_item_rename(item, new_name)?;
        let from = self.local_path(item)?;
        let to = from.with_file_name(new_name);
        fs::rename(&from, &to)?;

        if let Err(e) = self.tree.set_item_name(item, new_name) {
            undo(fs::rename(&to, &from), &to);
            return Err(e.into());
        }
        Ok(())
    }

    /// Move a folder below `new_parent`
    pub fn move_folder(&mut self, node: NodeId, new_parent: NodeId) -> Result<(), StorageError> {
        self.tree.validate_node_move(node, Some(new_parent))?;
        let from = self.local_path(node)?;
        let to = self.local_path(new_parent)?.join(self.tree.node(node)?.name());
        fs::rename(&from, &to)?;

        if let Err(e) = self.tree.set_parent(node, Some(new_parent)) {
            undo(fs::rename(&to, &from), &to);
            return Err(e.into());
        }
        Ok(())
    }

    /// Move a file into `category`
    pub fn move_file(&mut self, item: ItemId, category: NodeId) -> Result<(), StorageError> {
        self.tree.validate_item_move(item, category)?;
        let from = self.local_path(item)?;
        let to = self.local_path(category)?.join(self.tree.item(item)?.name());
        fs::rename(&from, &to)?;

        if let Err(e) = self.tree.set_item_category(item, category) {
            undo(fs::rename(&to, &from), &to);
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete a folder and everything below it.
    ///
    /// The folder is first renamed aside so a failed tree commit can put it back.
    pub fn delete_folder(&mut self, node: NodeId) -> Result<(), StorageError> {
        self.tree.validate_node_delete(node)?;
        let path = self.local_path(node)?;
        let staged = stage_removal(&path)?;

        if let Err(e) = self.tree.delete_node(node) {
            undo(fs::rename(&staged, &path), &staged);
            return Err(e.into());
        }
        if let Err(e) = fs::remove_dir_all(&staged) {
            warn!(path = %staged.display(), error = %e, "Failed to remove deleted folder");
        }
        Ok(())
    }

    pub fn delete_file(&mut self, item: ItemId) -> Result<(), StorageError> {
        self.tree.validate_item_delete(item)?;
        let path = self.local_path(item)?;
        let staged = stage_removal(&path)?;

        if let Err(e) = self.tree.delete_item(item) {
            undo(fs::rename(&staged, &path), &staged);
            return Err(e.into());
        }
        if let Err(e) = fs::remove_file(&staged) {
            warn!(path = %staged.display(), error = %e, "Failed to remove deleted file");
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    type File = LocalFile;
    type Folder = LocalFolder;

    fn name(&self) -> &str {
        &self.name
    }

    fn tree(&self) -> &Tree<LocalFile, LocalFolder> {
        &self.tree
    }

    fn file_hash(&self, item: ItemId) -> Result<String, StorageError> {
        Ok(content_hash(&self.read_file(item)?))
    }
}

/// `/`-separated path of `path` relative to `root`
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Rename `path` to an unused hidden sibling and return the new location
fn stage_removal(path: &Path) -> Result<PathBuf, StorageError> {
    let name = path
        .file_name()
        .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?
        .to_string_lossy()
        .into_owned();
    let mut attempt = 0u32;
    let staged = loop {
        let candidate = path.with_file_name(format!(".{}.deleting-{}", name, attempt));
        if fs::symlink_metadata(&candidate).is_err() {
            break candidate;
        }
        attempt += 1;
    };
    fs::rename(path, &staged)?;
    Ok(staged)
}

/// Report a failed filesystem rollback; the tree error is what the caller sees
fn undo(result: std::io::Result<()>, path: &Path) {
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to undo filesystem change");
    }
}
