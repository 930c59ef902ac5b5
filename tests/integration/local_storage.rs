use std::fs;
use std::sync::Arc;

use arbor::config::StorageConfig;
use arbor::container::{ChangeAction, ContainerChange, ContainerObserver};
use arbor::error::ObserverError;
use arbor::storage::{content_hash, LocalStorage, Storage};
use arbor::tree::TreeEvent;
use arbor::{EntryId, StorageError, TreeError};
use parking_lot::Mutex;
use tempfile::TempDir;

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src/nested")).unwrap();
    fs::create_dir_all(root.join(".git/objects")).unwrap();
    fs::write(root.join("README.md"), "readme").unwrap();
    fs::write(root.join("src/lib.rs"), "pub fn f() {}").unwrap();
    fs::write(root.join("src/nested/deep.rs"), "").unwrap();
    fs::write(root.join("src/scratch.tmp"), "junk").unwrap();
    fs::write(root.join(".git/HEAD"), "ref").unwrap();
    temp
}

#[test]
fn open_loads_folders_and_files() {
    let temp = workspace();
    let storage = LocalStorage::open(temp.path(), &StorageConfig::default()).unwrap();
    let tree = storage.tree();

    assert!(tree.find_node("/src/nested/").is_some());
    assert!(tree.find_node("/.git/").is_none());

    let lib = tree.find_item("/src/lib.rs").unwrap();
    assert_eq!(tree.item(lib).unwrap().payload().size, 13);
    assert!(tree.item(lib).unwrap().payload().modified.is_some());
    assert_eq!(tree.find_item("/readme.md"), tree.find_item("/README.md"));
    assert_eq!(
        storage.local_path(lib).unwrap(),
        storage.root_path().join("src").join("lib.rs")
    );
}

#[test]
fn open_honours_ignore_patterns_and_depth() {
    let temp = workspace();
    let config = StorageConfig {
        follow_links: false,
        max_depth: Some(2),
        ignore_patterns: vec![".git".to_string(), "*.tmp".to_string()],
    };
    let storage = LocalStorage::open(temp.path(), &config).unwrap();
    let tree = storage.tree();

    assert!(tree.find_item("/src/scratch.tmp").is_none());
    assert!(tree.find_node("/src/nested/").is_some());
    assert!(tree.find_item("/src/nested/deep.rs").is_none());
    assert_eq!(tree.item_count(), 2);
}

#[test]
fn mutations_are_mirrored_to_disk() {
    let temp = workspace();
    let mut storage = LocalStorage::open(temp.path(), &StorageConfig::default()).unwrap();
    let root = storage.tree().root();
    let src = storage.tree().find_node("/src/").unwrap();

    let docs = storage.create_folder(root, "docs").unwrap();
    assert!(temp.path().join("docs").is_dir());

    let guide = storage.write_file(docs, "guide.md", b"# Guide").unwrap();
    assert_eq!(fs::read(temp.path().join("docs/guide.md")).unwrap(), b"# Guide");
    assert_eq!(storage.tree().item(guide).unwrap().payload().size, 7);

    let again = storage.write_file(docs, "GUIDE.md", b"# Guide v2").unwrap();
    assert_eq!(again, guide);
    assert_eq!(storage.read_file(guide).unwrap(), b"# Guide v2");
    assert_eq!(storage.file_hash(guide).unwrap(), content_hash(b"# Guide v2"));

    storage.rename_file(guide, "intro.md").unwrap();
    assert!(temp.path().join("docs/intro.md").is_file());
    assert!(!temp.path().join("docs/guide.md").exists());

    storage.rename_folder(docs, "manual").unwrap();
    assert!(temp.path().join("manual/intro.md").is_file());
    assert_eq!(storage.tree().find_item("/manual/intro.md"), Some(guide));

    storage.move_folder(docs, src).unwrap();
    assert!(temp.path().join("src/manual/intro.md").is_file());

    storage.move_file(guide, root).unwrap();
    assert!(temp.path().join("intro.md").is_file());
    assert_eq!(storage.tree().find_item("/intro.md"), Some(guide));

    storage.delete_file(guide).unwrap();
    assert!(!temp.path().join("intro.md").exists());

    storage.delete_folder(src).unwrap();
    assert!(!temp.path().join("src").exists());
    assert!(storage.tree().find_item("/src/lib.rs").is_none());
}

#[test]
fn rejected_operations_do_not_touch_disk() {
    let temp = workspace();
    let mut storage = LocalStorage::open(temp.path(), &StorageConfig::default()).unwrap();
    let root = storage.tree().root();
    let src = storage.tree().find_node("/src/").unwrap();
    let readme = storage.tree().find_item("/README.md").unwrap();

    assert!(matches!(
        storage.create_folder(root, "readme.md"),
        Err(StorageError::Tree(TreeError::DuplicateName { .. }))
    ));
    assert!(matches!(
        storage.rename_folder(src, "bad/name"),
        Err(StorageError::Tree(TreeError::InvalidName { .. }))
    ));
    assert!(matches!(
        storage.delete_folder(root),
        Err(StorageError::Tree(TreeError::RootImmutable))
    ));
    assert!(matches!(
        storage.rename_file(readme, "SRC"),
        Err(StorageError::Tree(TreeError::DuplicateName { .. }))
    ));

    assert!(temp.path().join("src/lib.rs").is_file());
    assert!(temp.path().join("README.md").is_file());
}

#[test]
fn subscribers_see_mirrored_renames() {
    let temp = workspace();
    let mut storage = LocalStorage::open(temp.path(), &StorageConfig::default()).unwrap();
    let src = storage.tree().find_node("/src/").unwrap();

    let renamed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&renamed);
    storage.subscribe(Arc::new(move |event: &TreeEvent| {
        if let TreeEvent::Renamed { new_path, .. } = event {
            sink.lock().push(new_path.clone());
        }
    }));

    storage.rename_folder(src, "source").unwrap();
    assert_eq!(*renamed.lock(), vec!["/source/".to_string()]);
}

/// Fails every removal after it happened, forcing the tree to roll back
struct FailRemoval;

impl ContainerObserver<EntryId> for FailRemoval {
    fn changed(&self, change: &ContainerChange<'_, EntryId>) -> Result<(), ObserverError> {
        match change.action {
            ChangeAction::Remove => Err(ObserverError::new("removal rejected")),
            _ => Ok(()),
        }
    }
}

#[test]
fn failed_delete_keeps_disk_and_tree_in_step() {
    let temp = workspace();
    let mut storage = LocalStorage::open(temp.path(), &StorageConfig::default()).unwrap();
    let root = storage.tree().root();
    let src = storage.tree().find_node("/src/").unwrap();
    let lib = storage.tree().find_item("/src/lib.rs").unwrap();
    storage
        .tree()
        .node(root)
        .unwrap()
        .children()
        .subscribe(Arc::new(FailRemoval));
    storage
        .tree()
        .node(src)
        .unwrap()
        .children()
        .subscribe(Arc::new(FailRemoval));

    assert!(storage.delete_file(lib).is_err());
    assert_eq!(
        fs::read(temp.path().join("src/lib.rs")).unwrap(),
        b"pub fn f() {}"
    );
    assert_eq!(storage.tree().find_item("/src/lib.rs"), Some(lib));

    assert!(storage.delete_folder(src).is_err());
    assert!(temp.path().join("src/nested/deep.rs").is_file());
    assert_eq!(storage.tree().find_node("/src/"), Some(src));

    let leftovers: Vec<_> = fs::read_dir(temp.path().join("src"))
        .unwrap()
        .chain(fs::read_dir(temp.path()).unwrap())
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".deleting-"))
        .collect();
    assert!(leftovers.is_empty(), "staged copies left behind: {:?}", leftovers);
}
