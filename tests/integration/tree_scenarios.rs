use std::sync::Arc;

use arbor::tree::{NodeState, PathAddressable, Tree, TreeEvent};
use arbor::{ContainerView, EntryId, ItemAttributes, NodeId, TreeError};
use parking_lot::Mutex;

type FileTree = Tree<String, ()>;

fn record(tree: &mut FileTree) -> Arc<Mutex<Vec<TreeEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    tree.subscribe(Arc::new(move |event: &TreeEvent| {
        sink.lock().push(event.clone())
    }));
    log
}

#[test]
fn renaming_a_node_moves_its_items_in_the_index() {
    let mut tree = FileTree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let f = tree.add_item(a, "f.txt", "contents".to_string()).unwrap();

    assert_eq!(tree.node(a).unwrap().path(), "/a/");
    assert_eq!(tree.item(f).unwrap().path(), "/a/f.txt");

    tree.set_node_name(a, "b").unwrap();

    assert_eq!(tree.item(f).unwrap().path(), "/b/f.txt");
    assert_eq!(tree.find_item("/a/f.txt"), None);
    assert_eq!(tree.find_item("/b/f.txt"), Some(f));
}

#[test]
fn second_child_with_same_name_is_rejected() {
    let mut tree = FileTree::new(());
    let root = tree.root();
    let x = tree.add_node(root, "x", ()).unwrap();

    let err = tree.add_node(root, "x", ()).unwrap_err();
    assert!(matches!(err, TreeError::DuplicateName { .. }));

    let detached = tree.create_node(Some("X"), ()).unwrap();
    assert!(matches!(
        tree.set_parent(detached, Some(root)),
        Err(TreeError::DuplicateName { .. })
    ));

    let root_node = tree.root_node();
    assert_eq!(root_node.children().len(), 1);
    assert_eq!(root_node.child_node("x"), Some(x));
    assert_eq!(tree.node_state(detached).unwrap(), NodeState::Detached);
}

#[test]
fn cycle_is_rejected_without_changes() {
    let mut tree = FileTree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let b = tree.add_node(a, "b", ()).unwrap();
    let before: Vec<String> = tree
        .nodes()
        .into_iter()
        .map(|id| tree.node(id).unwrap().path().to_string())
        .collect();

    assert!(matches!(
        tree.set_parent(a, Some(b)),
        Err(TreeError::CyclicParent { .. })
    ));
    assert!(matches!(
        tree.set_parent(a, Some(a)),
        Err(TreeError::SelfParent)
    ));

    let after: Vec<String> = tree
        .nodes()
        .into_iter()
        .map(|id| tree.node(id).unwrap().path().to_string())
        .collect();
    assert_eq!(before, after);
    assert_eq!(tree.node(b).unwrap().parent(), Some(a));
}

#[test]
fn delete_disposes_every_descendant() {
    let mut tree = FileTree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let b = tree.add_node(a, "b", ()).unwrap();
    let f = tree.add_item(a, "f", String::new()).unwrap();
    let g = tree.add_item(b, "g", String::new()).unwrap();
    let keep = tree.add_node(root, "keep", ()).unwrap();

    tree.set_node_attributes(keep, ItemAttributes::INDESTRUCTIBLE, true)
        .unwrap();
    assert!(matches!(
        tree.delete_node(keep),
        Err(TreeError::Indestructible(_))
    ));

    let log = record(&mut tree);
    tree.delete_node(a).unwrap();

    assert!(tree.node(a).unwrap().is_disposed());
    assert!(tree.node(b).unwrap().is_disposed());
    assert!(tree.item(f).unwrap().is_disposed());
    assert!(tree.item(g).unwrap().is_disposed());
    assert_eq!(tree.find_node("/a/b/"), None);
    assert_eq!(tree.find_item("/a/b/g"), None);
    assert_eq!(tree.node_count(), 2);
    assert_eq!(tree.item_count(), 0);

    assert_eq!(
        *log.lock(),
        vec![TreeEvent::Deleted {
            target: EntryId::Node(a),
            path: "/a/".to_string(),
        }]
    );

    assert!(matches!(
        tree.set_node_name(b, "z"),
        Err(TreeError::Disposed(_))
    ));
}

#[test]
fn move_emits_moved_then_path_changes_for_the_subtree() {
    let mut tree = FileTree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let dest = tree.add_node(root, "dest", ()).unwrap();
    let f = tree.add_item(a, "f", String::new()).unwrap();

    let log = record(&mut tree);
    tree.set_parent(a, Some(dest)).unwrap();

    let events = log.lock().clone();
    assert_eq!(
        events,
        vec![
            TreeEvent::Moved {
                target: EntryId::Node(a),
                old_path: "/a/".to_string(),
                old_parent_path: Some("/".to_string()),
                new_path: "/dest/a/".to_string(),
            },
            TreeEvent::PathChanged {
                target: EntryId::Node(a),
                old_path: "/a/".to_string(),
                new_path: "/dest/a/".to_string(),
            },
            TreeEvent::PathChanged {
                target: EntryId::Item(f),
                old_path: "/a/f".to_string(),
                new_path: "/dest/a/f".to_string(),
            },
        ]
    );
    assert_eq!(tree.find_item("/dest/a/f"), Some(f));
}

#[test]
fn entry_listeners_run_before_context_listeners() {
    let mut tree = FileTree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let node_sink = Arc::clone(&order);
    tree.watch_node(
        a,
        Arc::new(move |_: &TreeEvent| node_sink.lock().push("node")),
    )
    .unwrap();
    let context_sink = Arc::clone(&order);
    tree.subscribe(Arc::new(move |event: &TreeEvent| {
        if matches!(event, TreeEvent::Renamed { .. }) {
            context_sink.lock().push("context")
        }
    }));

    tree.set_node_name(a, "b").unwrap();
    assert_eq!(order.lock()[..2], ["node", "context"]);
}

#[test]
fn views_expose_paths_through_traits() {
    fn paths<T: PathAddressable>(entries: &[T]) -> Vec<String> {
        entries.iter().map(|e| e.path().to_string()).collect()
    }

    let mut tree = FileTree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let b = tree.add_node(a, "b", ()).unwrap();
    let views = vec![tree.node(a).unwrap(), tree.node(b).unwrap()];

    assert_eq!(paths(&views), vec!["/a/", "/a/b/"]);
    assert_eq!(tree.node(b).unwrap().to_string(), "/a/b/");
}

#[test]
fn child_collections_are_read_only_views() {
    let mut tree = FileTree::new(());
    let root = tree.root();
    let a = tree.add_node(root, "a", ()).unwrap();
    let f = tree.add_item(a, "f.txt", "body".to_string()).unwrap();

    let nodes: ContainerView<'_, NodeId> = tree.root_node().nodes();
    assert_eq!(nodes.entries(), vec![("a".to_string(), a)]);
    let a_node = tree.node(a).unwrap();
    assert_eq!(a_node.children().get("F.TXT"), Some(EntryId::Item(f)));
    assert_eq!(a_node.items().key_of(&f), Some("f.txt".to_string()));

    tree.set_node_name(a, "b").unwrap();
    assert_eq!(tree.root_node().nodes().keys(), vec!["b".to_string()]);
    assert_eq!(tree.find_node("/b/"), Some(a));
    assert!(tree.add_node(root, "a", ()).is_ok());
}
