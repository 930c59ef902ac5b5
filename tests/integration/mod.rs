//! Integration tests for the arbor item/category tree

mod index_consistency;
mod local_storage;
mod memory_storage;
mod notification_rollback;
mod tree_scenarios;
