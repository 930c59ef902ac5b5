use std::sync::Arc;

use arbor::container::{ChangeAction, ContainerChange, ContainerObserver, KeyedContainer};
use arbor::tree::Tree;
use arbor::{ContainerError, ObserverError, TreeError};

/// Fails the `changed` phase of one kind of change
struct FailAfter(ChangeAction);

impl<V> ContainerObserver<V> for FailAfter {
    fn changed(&self, change: &ContainerChange<'_, V>) -> Result<(), ObserverError> {
        if change.action == self.0 {
            return Err(ObserverError::new("downstream refused"));
        }
        Ok(())
    }
}

/// Vetoes every change in the `changing` phase
struct Veto;

impl<V> ContainerObserver<V> for Veto {
    fn changing(&self, _change: &ContainerChange<'_, V>) -> Result<(), ObserverError> {
        Err(ObserverError::new("locked"))
    }
}

#[test]
fn failed_insert_leaves_key_absent() {
    let container: KeyedContainer<u32> = KeyedContainer::new();
    container.subscribe(Arc::new(FailAfter(ChangeAction::Add)));

    let err = container.insert("Key", 1).unwrap_err();
    assert!(matches!(err, ContainerError::ObserverFailed { .. }));
    assert!(!container.contains_key("key"));
    assert!(container.is_empty());
}

#[test]
fn failed_remove_restores_original_value() {
    let container: KeyedContainer<u32> = KeyedContainer::new();
    container.insert("Key", 7).unwrap();
    container.subscribe(Arc::new(FailAfter(ChangeAction::Remove)));

    assert!(container.remove("KEY").is_err());
    assert_eq!(container.get("key"), Some(7));
    assert_eq!(container.keys(), vec!["Key".to_string()]);
}

#[test]
fn failed_rename_in_tree_leaves_everything_in_place() {
    let mut tree: Tree<(), ()> = Tree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let f = tree.add_item(a, "f.txt", ()).unwrap();
    tree.root_node()
        .nodes()
        .subscribe(Arc::new(FailAfter(ChangeAction::Replace)));

    let err = tree.set_node_name(a, "b").unwrap_err();
    assert!(matches!(
        err,
        TreeError::Container(ContainerError::ObserverFailed { .. })
    ));

    assert_eq!(tree.node(a).unwrap().name(), "a");
    assert_eq!(tree.root_node().child_node("a"), Some(a));
    assert_eq!(tree.root_node().child_node("b"), None);
    assert!(tree.root_node().children().contains_key("a"));
    assert_eq!(tree.find_item("/a/f.txt"), Some(f));
    assert_eq!(tree.find_item("/b/f.txt"), None);
}

#[test]
fn failed_move_restores_old_parent() {
    let mut tree: Tree<(), ()> = Tree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let dest = tree.add_node(root, "dest", ()).unwrap();
    let sub = tree.add_node(a, "sub", ()).unwrap();
    tree.node(dest)
        .unwrap()
        .children()
        .subscribe(Arc::new(FailAfter(ChangeAction::Add)));

    assert!(tree.set_parent(sub, Some(dest)).is_err());

    assert_eq!(tree.node(sub).unwrap().parent(), Some(a));
    assert_eq!(tree.node(a).unwrap().child_node("sub"), Some(sub));
    assert!(tree.node(a).unwrap().children().contains_key("sub"));
    assert!(tree.node(dest).unwrap().nodes().is_empty());
    assert!(tree.node(dest).unwrap().children().is_empty());
    assert_eq!(tree.find_node("/a/sub/"), Some(sub));
}

#[test]
fn vetoed_delete_keeps_subtree_alive() {
    let mut tree: Tree<(), ()> = Tree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let f = tree.add_item(a, "f", ()).unwrap();
    tree.root_node().nodes().subscribe(Arc::new(Veto));

    let err = tree.delete_node(a).unwrap_err();
    assert!(matches!(
        err,
        TreeError::Container(ContainerError::Vetoed { .. })
    ));
    assert!(!tree.node(a).unwrap().is_disposed());
    assert!(!tree.item(f).unwrap().is_disposed());
    assert_eq!(tree.find_item("/a/f"), Some(f));
}
