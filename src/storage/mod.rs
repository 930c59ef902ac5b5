//! Storage adapters
//!
//! A storage is a [`Tree`] whose items are files and whose nodes are folders.
//! [`LocalStorage`] mirrors a directory on disk; [`MemoryStorage`] keeps file
//! contents in memory.

pub mod local;
pub mod memory;

pub use local::{LocalFile, LocalFolder, LocalStorage};
pub use memory::{MemoryFile, MemoryStorage};

use crate::error::StorageError;
use crate::tree::Tree;
use crate::types::ItemId;

/// Common surface of the storage adapters
pub trait Storage {
    type File;
    type Folder;

    /// Display name (the root directory for local storages)
    fn name(&self) -> &str;

    fn tree(&self) -> &Tree<Self::File, Self::Folder>;

    /// Hex content hash of a file, see [`content_hash`]
    fn file_hash(&self, item: ItemId) -> Result<String, StorageError>;
}

/// Lowercase hex BLAKE3 digest of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Match a `/`-separated relative path against an ignore pattern.
///
/// Supports `prefix**suffix`, a single `*` wildcard and plain substrings.
pub fn matches_ignore_pattern(path: &str, pattern: &str) -> bool {
    let path = path.replace('\\', "/");
    let pattern = pattern.replace('\\', "/");

    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if let [prefix, suffix] = parts.as_slice() {
            return match (prefix.is_empty(), suffix.is_empty()) {
                (true, _) => path.contains(suffix),
                (false, true) => path.starts_with(prefix),
                (false, false) => path.starts_with(prefix) && path.contains(suffix),
            };
        }
    }

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if let [prefix, suffix] = parts.as_slice() {
            return path.starts_with(prefix) && path.ends_with(suffix);
        }
    }

    path == pattern || path.split('/').any(|segment| segment == pattern)
}
