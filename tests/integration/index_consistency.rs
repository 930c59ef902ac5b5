//! Property tests: after any sequence of structural operations the path
//! indexes agree with a full walk of the tree.

use arbor::tree::Tree;
use arbor::{EntryId, ItemId, NodeId};
use proptest::prelude::*;

const NAMES: [&str; 5] = ["a", "A", "b", "c", "d.txt"];

#[derive(Debug, Clone)]
enum Op {
    AddNode { parent: usize, name: usize },
    AddItem { parent: usize, name: usize },
    RenameNode { node: usize, name: usize },
    RenameItem { item: usize, name: usize },
    MoveNode { node: usize, parent: usize },
    DetachNode { node: usize },
    MoveItem { item: usize, parent: usize },
    DeleteNode { node: usize },
    DeleteItem { item: usize },
}

fn op() -> impl Strategy<Value = Op> {
    let idx = 0..16usize;
    let name = 0..NAMES.len();
    prop_oneof![
        3 => (idx.clone(), name.clone()).prop_map(|(parent, name)| Op::AddNode { parent, name }),
        3 => (idx.clone(), name.clone()).prop_map(|(parent, name)| Op::AddItem { parent, name }),
        2 => (idx.clone(), name.clone()).prop_map(|(node, name)| Op::RenameNode { node, name }),
        2 => (idx.clone(), name.clone()).prop_map(|(item, name)| Op::RenameItem { item, name }),
        2 => (idx.clone(), idx.clone()).prop_map(|(node, parent)| Op::MoveNode { node, parent }),
        1 => idx.clone().prop_map(|node| Op::DetachNode { node }),
        2 => (idx.clone(), idx.clone()).prop_map(|(item, parent)| Op::MoveItem { item, parent }),
        1 => idx.clone().prop_map(|node| Op::DeleteNode { node }),
        1 => idx.prop_map(|item| Op::DeleteItem { item }),
    ]
}

struct Model {
    tree: Tree<(), ()>,
    nodes: Vec<NodeId>,
    items: Vec<ItemId>,
}

impl Model {
    fn new() -> Self {
        let tree = Tree::new(());
        let nodes = vec![tree.root()];
        Self {
            tree,
            nodes,
            items: Vec::new(),
        }
    }

    fn node(&self, i: usize) -> NodeId {
        self.nodes[i % self.nodes.len()]
    }

    fn item(&self, i: usize) -> Option<ItemId> {
        (!self.items.is_empty()).then(|| self.items[i % self.items.len()])
    }

    /// Apply `op`, ignoring rejected operations
    fn apply(&mut self, op: &Op) {
        match *op {
            Op::AddNode { parent, name } => {
                let parent = self.node(parent);
                if let Ok(id) = self.tree.add_node(parent, NAMES[name], ()) {
                    self.nodes.push(id);
                }
            }
            Op::AddItem { parent, name } => {
                let parent = self.node(parent);
                if let Ok(id) = self.tree.add_item(parent, NAMES[name], ()) {
                    self.items.push(id);
                }
            }
            Op::RenameNode { node, name } => {
                let node = self.node(node);
                let _ = self.tree.set_node_name(node, NAMES[name]);
            }
            Op::RenameItem { item, name } => {
                if let Some(item) = self.item(item) {
                    let _ = self.tree.set_item_name(item, NAMES[name]);
                }
            }
            Op::MoveNode { node, parent } => {
                let (node, parent) = (self.node(node), self.node(parent));
                let _ = self.tree.set_parent(node, Some(parent));
            }
            Op::DetachNode { node } => {
                let node = self.node(node);
                let _ = self.tree.set_parent(node, None);
            }
            Op::MoveItem { item, parent } => {
                if let Some(item) = self.item(item) {
                    let parent = self.node(parent);
                    let _ = self.tree.set_item_category(item, parent);
                }
            }
            Op::DeleteNode { node } => {
                let node = self.node(node);
                let _ = self.tree.delete_node(node);
            }
            Op::DeleteItem { item } => {
                if let Some(item) = self.item(item) {
                    let _ = self.tree.delete_item(item);
                }
            }
        }
    }

    fn check(&self) -> Result<(), TestCaseError> {
        let tree = &self.tree;
        let root = tree.root();
        let walked = tree.descendants(root).unwrap();

        let mut walked_nodes = 1;
        let mut walked_items = 0;
        for entry in walked {
            match entry {
                EntryId::Node(id) => {
                    walked_nodes += 1;
                    let node = tree.node(id).unwrap();
                    prop_assert!(!node.is_disposed());
                    prop_assert_eq!(tree.find_node(node.path()), Some(id));

                    let parent = tree.node(node.parent().unwrap()).unwrap();
                    prop_assert_eq!(
                        node.path().to_string(),
                        format!("{}{}/", parent.path(), node.name())
                    );
                    prop_assert_eq!(node.depth(), parent.depth() + 1);
                }
                EntryId::Item(id) => {
                    walked_items += 1;
                    let item = tree.item(id).unwrap();
                    prop_assert!(!item.is_disposed());
                    prop_assert_eq!(tree.find_item(item.path()), Some(id));

                    let category = tree.node(item.category().unwrap()).unwrap();
                    prop_assert_eq!(
                        item.path().to_string(),
                        format!("{}{}", category.path(), item.name())
                    );
                }
            }
        }

        prop_assert_eq!(tree.node_count(), walked_nodes);
        prop_assert_eq!(tree.item_count(), walked_items);
        Ok(())
    }
}

proptest! {
    #[test]
    fn indexes_match_tree_walk(ops in prop::collection::vec(op(), 1..60)) {
        let mut model = Model::new();
        for op in &ops {
            model.apply(op);
            model.check()?;
        }
    }

    #[test]
    fn sibling_names_stay_unique(ops in prop::collection::vec(op(), 1..60)) {
        let mut model = Model::new();
        for op in &ops {
            model.apply(op);
        }
        for id in model.nodes.iter().copied() {
            let node = model.tree.node(id).unwrap();
            if node.is_disposed() {
                continue;
            }
            let mut keys: Vec<String> =
                node.children().keys().iter().map(|k| k.to_lowercase()).collect();
            let total = keys.len();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), total);
            prop_assert_eq!(total, node.items().len() + node.nodes().len());
        }
    }
}
