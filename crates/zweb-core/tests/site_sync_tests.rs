//! End-to-end tests for publishing, fetching and removing sites
//!
//! Everything runs against the in-memory storage backend, optionally wrapped
//! in an adapter that injects backend failures.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use zweb_core::{KeyStore, SiteSync, SyncConfig, SyncError};
use zweb_storage::{MemoryStorage, StorageAdapter, StorageError, StorageRef};

/// Memory storage with switchable failures
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    puts_before_failure: Option<usize>,
    puts: AtomicUsize,
    fail_remove: bool,
    fail_refresh: bool,
}

#[async_trait]
impl StorageAdapter for FlakyStorage {
    async fn put(&self, name: &str, blob: &str) -> zweb_storage::Result<StorageRef> {
        let done = self.puts.fetch_add(1, Ordering::SeqCst);
        if matches!(self.puts_before_failure, Some(limit) if done >= limit) {
            return Err(StorageError::Write("network unavailable".to_string()));
        }
        self.inner.put(name, blob).await
    }

    async fn get(&self, storage_ref: &StorageRef) -> zweb_storage::Result<String> {
        self.inner.get(storage_ref).await
    }

    async fn remove(&self, storage_ref: &StorageRef) -> zweb_storage::Result<()> {
        if self.fail_remove {
            return Err(StorageError::Remove("peer went away".to_string()));
        }
        self.inner.remove(storage_ref).await
    }

    async fn refresh_membership(&self) -> zweb_storage::Result<()> {
        if self.fail_refresh {
            return Err(StorageError::Membership("no peers".to_string()));
        }
        self.inner.refresh_membership().await
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

struct Fixture {
    dir: TempDir,
    storage: Arc<MemoryStorage>,
    sync: SiteSync,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let sync = build_sync(dir.path(), storage.clone());
        Self { dir, storage, sync }
    }

    fn site_dir(&self, files: &[(&str, &str)]) -> PathBuf {
        let root = self.dir.path().join("src");
        write_tree(&root, files);
        root
    }

    fn scratch_root(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    fn key_store(&self) -> KeyStore {
        KeyStore::new(self.dir.path().join("keys.json"))
    }
}

fn build_sync(dir: &Path, storage: Arc<dyn StorageAdapter>) -> SiteSync {
    SiteSync::new(KeyStore::new(dir.join("keys.json")), storage)
        .with_config(SyncConfig::default().with_scratch_root(dir.join("scratch")))
}

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    std::fs::create_dir_all(root).unwrap();
    for (path, content) in files {
        let target = root.join(path);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(target, content).unwrap();
    }
}

#[tokio::test]
async fn test_fetch_after_publish() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("a.txt", "hello"), ("sub/b.txt", "world")]);

    let report = fx.sync.publish("demo", &root).await.unwrap();
    assert_eq!(report.files, 2);

    let site = fx.sync.fetch("demo").await.unwrap();
    assert_eq!(site.files(), 2);
    assert_eq!(std::fs::read_to_string(site.dir().join("a.txt")).unwrap(), "hello");
    assert_eq!(
        std::fs::read_to_string(site.dir().join("sub").join("b.txt")).unwrap(),
        "world"
    );
}

#[tokio::test]
async fn test_binary_files_survive() {
    let fx = Fixture::new();
    let root = fx.dir.path().join("src");
    std::fs::create_dir_all(&root).unwrap();
    let bytes: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();
    std::fs::write(root.join("image.bin"), &bytes).unwrap();

    fx.sync.publish("bin", &root).await.unwrap();
    let site = fx.sync.fetch("bin").await.unwrap();

    assert_eq!(std::fs::read(site.dir().join("image.bin")).unwrap(), bytes);
}

#[tokio::test]
async fn test_one_key_per_file() {
    let fx = Fixture::new();
    let files: Vec<(String, String)> = (0..12)
        .map(|i| (format!("dir{}/file{}.txt", i % 3, i), "same content".to_string()))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    let root = fx.site_dir(&refs);

    fx.sync.publish("keys", &root).await.unwrap();

    let document = fx.key_store().load().await;
    let record = document.find("keys").unwrap();
    assert_eq!(record.len(), 12);

    let keys: HashSet<String> = record.file_keys.values().map(|e| e.key.to_hex()).collect();
    assert_eq!(keys.len(), 12);

    let storage_keys: HashSet<&StorageRef> =
        record.file_keys.values().map(|e| &e.storage_key).collect();
    assert_eq!(storage_keys.len(), 12);
}

#[tokio::test]
async fn test_publish_overwrite_drops_deleted_files() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("keep.txt", "v1"), ("gone.txt", "bye")]);

    fx.sync.publish("site", &root).await.unwrap();
    let first = fx.key_store().load().await.find("site").unwrap().clone();

    std::fs::remove_file(root.join("gone.txt")).unwrap();
    std::fs::write(root.join("keep.txt"), "v2").unwrap();
    fx.sync.publish("site", &root).await.unwrap();

    let document = fx.key_store().load().await;
    assert_eq!(document.len(), 1);
    let record = document.find("site").unwrap();
    assert_eq!(record.file_keys.keys().collect::<Vec<_>>(), vec!["keep.txt"]);
    assert_ne!(record.file_keys["keep.txt"].key, first.file_keys["keep.txt"].key);

    // Old blobs were released before the rebuild.
    assert_eq!(fx.storage.len(), 1);
    for entry in first.file_keys.values() {
        assert!(!fx.storage.contains(&entry.storage_key));
    }

    let site = fx.sync.fetch("site").await.unwrap();
    assert_eq!(std::fs::read_to_string(site.dir().join("keep.txt")).unwrap(), "v2");
    assert!(!site.dir().join("gone.txt").exists());
}

#[tokio::test]
async fn test_fetch_unknown_site_writes_nothing() {
    let fx = Fixture::new();

    let result = fx.sync.fetch("nonexistent").await;

    assert!(matches!(result, Err(SyncError::SiteNotFound(ref name)) if name == "nonexistent"));
    assert!(result.err().unwrap().is_not_found());
    assert!(!fx.scratch_root().exists());
    assert!(!fx.key_store().path().exists());
}

#[tokio::test]
async fn test_empty_directory() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[]);

    let report = fx.sync.publish("empty", &root).await.unwrap();
    assert_eq!(report.files, 0);

    let document = fx.key_store().load().await;
    assert!(document.find("empty").unwrap().is_empty());

    let site = fx.sync.fetch("empty").await.unwrap();
    assert!(site.dir().is_dir());
    assert_eq!(std::fs::read_dir(site.dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_remove_twice() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("index.html", "<p>x</p>")]);
    fx.sync.publish("site", &root).await.unwrap();

    let first = fx.sync.remove("site").await.unwrap();
    assert!(first.existed);
    assert_eq!(first.released, 1);

    let second = fx.sync.remove("site").await.unwrap();
    assert!(!second.existed);

    assert!(fx.key_store().load().await.find("site").is_none());
    assert!(fx.storage.is_empty());
}

#[tokio::test]
async fn test_remove_keeps_other_sites() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("a", "1")]);
    fx.sync.publish("one", &root).await.unwrap();
    fx.sync.publish("two", &root).await.unwrap();

    fx.sync.remove("one").await.unwrap();

    let document = fx.key_store().load().await;
    assert_eq!(document.names().collect::<Vec<_>>(), vec!["two"]);
    assert!(fx.sync.fetch("two").await.is_ok());
}

#[tokio::test]
async fn test_remove_tolerates_backend_failures() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("src");
    write_tree(&root, &[("a", "1"), ("b", "2"), ("c", "3")]);

    let storage = Arc::new(FlakyStorage {
        fail_remove: true,
        ..Default::default()
    });
    let sync = build_sync(dir.path(), storage.clone());

    sync.publish("site", &root).await.unwrap();
    let report = sync.remove("site").await.unwrap();

    assert_eq!(report.failed, 3);
    assert_eq!(report.released, 0);
    assert!(sync.key_store().load().await.find("site").is_none());
    // The blobs leak; the index is still clean.
    assert_eq!(storage.inner.len(), 3);
}

#[tokio::test]
async fn test_failed_upload_leaves_no_record() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("src");
    write_tree(&root, &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);

    let storage = Arc::new(FlakyStorage {
        puts_before_failure: Some(2),
        ..Default::default()
    });
    let sync = build_sync(dir.path(), storage.clone());

    let result = sync.publish("site", &root).await;

    assert!(matches!(result, Err(SyncError::StorageWrite { .. })));
    assert!(sync.key_store().load().await.find("site").is_none());
    assert_eq!(storage.inner.refresh_count(), 0);
}

#[tokio::test]
async fn test_membership_failure_does_not_fail_publish() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("src");
    write_tree(&root, &[("index.html", "hi")]);

    let storage = Arc::new(FlakyStorage {
        fail_refresh: true,
        ..Default::default()
    });
    let sync = build_sync(dir.path(), storage);

    let report = sync.publish("site", &root).await.unwrap();

    assert!(report.membership_error.unwrap().contains("no peers"));
    assert!(sync.key_store().load().await.find("site").is_some());
}

#[tokio::test]
async fn test_publish_of_missing_dir_keeps_existing_site() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("a", "1")]);
    fx.sync.publish("site", &root).await.unwrap();

    let result = fx.sync.publish("site", fx.dir.path().join("typo")).await;

    assert!(matches!(result, Err(SyncError::NotADirectory(_))));
    assert!(fx.key_store().load().await.find("site").is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_file_aborts_publish() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("a.txt", "hello")]);
    std::os::unix::fs::symlink(root.join("nowhere"), root.join("broken")).unwrap();

    let result = fx.sync.publish("site", &root).await;

    assert!(matches!(result, Err(SyncError::Traversal { .. })));
    assert!(fx.key_store().load().await.find("site").is_none());
}

#[tokio::test]
async fn test_key_store_write_failure_fails_publish() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("src");
    write_tree(&root, &[("a.txt", "hello")]);
    std::fs::write(dir.path().join("blocker"), "").unwrap();

    let key_store = KeyStore::new(dir.path().join("blocker").join("keys.json"));
    let sync = SiteSync::new(key_store, Arc::new(MemoryStorage::new()))
        .with_config(SyncConfig::default().with_scratch_root(dir.path().join("scratch")));

    let result = sync.publish("site", &root).await;
    assert!(matches!(result, Err(SyncError::Persistence { .. })));
}

#[tokio::test]
async fn test_similar_site_names_keep_separate_scratch_dirs() {
    let fx = Fixture::new();
    let first = fx.dir.path().join("first");
    let second = fx.dir.path().join("second");
    write_tree(&first, &[("one.txt", "1")]);
    write_tree(&second, &[("two.txt", "2")]);
    fx.sync.publish("my site", &first).await.unwrap();
    fx.sync.publish("my_site", &second).await.unwrap();

    let spaced = fx.sync.fetch("my site").await.unwrap();
    let underscored = fx.sync.fetch("my_site").await.unwrap();

    assert_ne!(spaced.dir(), underscored.dir());
    assert!(spaced.dir().join("one.txt").exists());
    assert!(underscored.dir().join("two.txt").exists());
    assert!(!underscored.dir().join("one.txt").exists());
}

#[tokio::test]
async fn test_fetches_keys_with_leading_slash() {
    let fx = Fixture::new();
    let (key, blob) = zweb_crypto::transport::seal(b"hello").unwrap();
    let storage_ref = fx.storage.put("/old/a.txt", &blob).await.unwrap();

    let document = format!(
        r#"[{{"name":"old","fileKeys":{{"/a.txt":{{"storageKey":"{}","key":"{}"}}}}}}]"#,
        storage_ref,
        key.to_hex()
    );
    std::fs::write(fx.key_store().path(), document).unwrap();

    let site = fx.sync.fetch("old").await.unwrap();
    assert_eq!(std::fs::read_to_string(site.dir().join("a.txt")).unwrap(), "hello");
}

#[tokio::test]
async fn test_corrupted_blob_fails_fetch() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("a.txt", "hello")]);
    fx.sync.publish("site", &root).await.unwrap();

    let document = fx.key_store().load().await;
    let storage_key = &document.find("site").unwrap().file_keys["a.txt"].storage_key;
    fx.storage.replace(storage_key, "00ff");

    let result = fx.sync.fetch("site").await;
    assert!(matches!(result, Err(SyncError::Decryption { ref path, .. }) if path == "a.txt"));
}

#[tokio::test]
async fn test_missing_blob_fails_fetch() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("a.txt", "hello")]);
    fx.sync.publish("site", &root).await.unwrap();
    fx.storage.clear();

    let result = fx.sync.fetch("site").await;
    assert!(matches!(result, Err(SyncError::StorageRead { .. })));
}

#[tokio::test]
async fn test_tampered_key_store_cannot_escape_scratch_dir() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("a.txt", "hello")]);
    fx.sync.publish("site", &root).await.unwrap();

    let path = fx.key_store().path().to_path_buf();
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, raw.replace("\"a.txt\"", "\"../escaped.txt\"")).unwrap();

    let result = fx.sync.fetch("site").await;
    assert!(matches!(result, Err(SyncError::InvalidPath(_))));
    assert!(!fx.scratch_root().join("escaped.txt").exists());
}

#[tokio::test]
async fn test_refetch_clears_stale_files() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("a.txt", "hello")]);
    fx.sync.publish("site", &root).await.unwrap();

    let site = fx.sync.fetch("site").await.unwrap();
    std::fs::write(site.dir().join("stale.txt"), "old").unwrap();

    let site = fx.sync.fetch("site").await.unwrap();
    assert!(!site.dir().join("stale.txt").exists());
    assert!(site.dir().join("a.txt").exists());
}

#[tokio::test]
async fn test_serve_and_cleanup() {
    let fx = Fixture::new();
    let root = fx.site_dir(&[("index.html", "<h1>home</h1>"), ("css/site.css", "body{}")]);
    fx.sync.publish("site", &root).await.unwrap();

    let mut site = fx.sync.fetch("site").await.unwrap();
    site.start(0).await.unwrap();
    let url = site.url().unwrap();

    let home = reqwest::get(format!("{}/", url)).await.unwrap().text().await.unwrap();
    assert_eq!(home, "<h1>home</h1>");
    let css = reqwest::get(format!("{}/css/site.css", url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(css, "body{}");

    site.stop().await.unwrap();
    assert!(site.url().is_none());

    site.cleanup().await.unwrap();
    assert!(site.dir().is_dir());
    assert_eq!(std::fs::read_dir(site.dir()).unwrap().count(), 0);
}
