use arbor::storage::{content_hash, MemoryStorage, Storage};
use arbor::{ItemAttributes, StorageError, TreeError};

#[test]
fn buffers_become_a_browsable_tree() {
    let storage = MemoryStorage::from_buffers(
        "fixtures",
        [
            ("/config/app.toml", b"name = 'x'".to_vec()),
            ("/config/env/dev.toml", b"debug = true".to_vec()),
            ("/data.bin", vec![0u8, 1, 2]),
        ],
    )
    .unwrap();

    assert_eq!(storage.name(), "fixtures");
    let tree = storage.tree();
    assert_eq!(tree.node_count(), 3);
    assert_eq!(tree.item_count(), 3);

    let dev = tree.find_item("/config/env/dev.toml").unwrap();
    assert_eq!(storage.file_hash(dev).unwrap(), content_hash(b"debug = true"));
    assert_eq!(storage.read_file("/data.bin").unwrap(), &[0u8, 1, 2]);
}

#[test]
fn renames_through_the_tree_update_lookups() {
    let mut storage = MemoryStorage::from_buffers("mem", [("/a/f.txt", "x")]).unwrap();
    let a = storage.tree().find_node("/a").unwrap();

    storage.tree_mut().set_node_name(a, "b").unwrap();

    assert!(matches!(
        storage.read_file("/a/f.txt"),
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(storage.read_file("/b/f.txt").unwrap(), b"x");
    let id = storage.write_file("/b/f.txt", "y").unwrap();
    assert_eq!(storage.tree().item(id).unwrap().path(), "/b/f.txt");
}

#[test]
fn read_only_folder_rejects_new_files() {
    let mut storage = MemoryStorage::new("mem");
    let locked = storage.create_folders("/locked").unwrap();
    storage
        .tree_mut()
        .set_node_attributes(locked, ItemAttributes::READ_ONLY, true)
        .unwrap();

    assert!(matches!(
        storage.write_file("/locked/new.txt", "x"),
        Err(StorageError::Tree(TreeError::ReadOnly(_)))
    ));
    assert!(matches!(
        storage.remove("/locked"),
        Err(StorageError::Tree(TreeError::ReadOnly(_)))
    ));
}
