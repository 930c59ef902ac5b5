//! Arbor: path-addressed item/category trees
//!
//! A [`Tree`](tree::Tree) holds named categories (nodes) and leaf items under a
//! single root. Entries are addressable by full path through case-insensitive
//! indexes kept in step with every validated rename, move and delete. Child
//! collections are [`KeyedContainer`](container::KeyedContainer)s with
//! two-phase change notification and rollback. Storage adapters expose a
//! local directory or in-memory buffers as such a tree.

pub mod config;
pub mod container;
pub mod error;
pub mod logging;
pub mod storage;
pub mod tooling;
pub mod tree;
pub mod types;

pub use container::{
    ChangeAction, ContainerChange, ContainerObserver, ContainerView, KeyedContainer,
};
pub use error::{ApiError, ContainerError, ObserverError, StorageError, TreeError};
pub use tree::{Tree, TreeEvent, TreeListener};
pub use types::{EntryId, ItemAttributes, ItemId, NodeId};
