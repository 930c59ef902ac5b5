//! Error types
//!
//! One enum per layer. Validation errors are raised before anything is
//! mutated; notification failures are raised after the mutation has been
//! rolled back.

use crate::types::{ItemId, NodeId};
use thiserror::Error;

/// Error raised by a container observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors from [`KeyedContainer`](crate::container::KeyedContainer) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("Key already exists: {0}")]
    KeyExists(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// A `changing` observer refused the operation; nothing was mutated.
    #[error("Change to '{key}' vetoed: {reason}")]
    Vetoed { key: String, reason: String },

    /// A `changed` observer failed; the mutation was rolled back.
    #[error("Observer failed after change to '{key}' (rolled back): {reason}")]
    ObserverFailed { key: String, reason: String },
}

/// Errors from tree mutations and lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("'{name}' already exists in '{parent_path}'")]
    DuplicateName { name: String, parent_path: String },

    #[error("A node cannot be its own parent")]
    SelfParent,

    #[error("An unnamed node cannot have a parent")]
    UnnamedNode,

    #[error("Cannot move '{node}' below its own descendant '{parent}'")]
    CyclicParent { node: String, parent: String },

    #[error("Object is disposed: {0}")]
    Disposed(String),

    #[error("Object is indestructible: {0}")]
    Indestructible(String),

    #[error("Object has a unique name and cannot be renamed: {0}")]
    UniqueName(String),

    #[error("Object is read-only: {0}")]
    ReadOnly(String),

    #[error("The root node cannot be moved, renamed or deleted")]
    RootImmutable,

    #[error("Unknown node handle: {0:?}")]
    UnknownNode(NodeId),

    #[error("Unknown item handle: {0:?}")]
    UnknownItem(ItemId),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Errors from storage adapters
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Invalid storage root: {0}")]
    InvalidRoot(String),

    #[error("Path not found: {0}")]
    NotFound(String),
}

/// Errors surfaced to the CLI and ambient setup (config, logging)
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    StorageError(#[from] StorageError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}
