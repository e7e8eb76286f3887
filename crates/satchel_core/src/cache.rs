use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

/// Raw key/value store backing both the content-addressed blobs and the
/// per-request cache entries. Readback failures surface as `None` and are
/// treated as cache misses by callers, never as fatal errors.
pub trait Cache: Send + Sync {
  fn get(&self, key: &str) -> Option<Vec<u8>>;
  fn set(&self, key: &str, value: Vec<u8>);
  fn has(&self, key: &str) -> bool;
}

pub type CacheRef = Arc<dyn Cache>;

#[derive(Default)]
pub struct InMemoryCache {
  entries: DashMap<String, Vec<u8>>,
}

impl InMemoryCache {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Cache for InMemoryCache {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    self.entries.get(key).map(|entry| entry.value().clone())
  }

  fn set(&self, key: &str, value: Vec<u8>) {
    self.entries.insert(key.to_owned(), value);
  }

  fn has(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }
}

/// One file per key under the cache directory. Writes go through a temp
/// file and a rename so that a replaced entry is always either the old or
/// the new bytes, never a torn write.
pub struct FsCache {
  dir: PathBuf,
}

impl FsCache {
  pub fn new(dir: PathBuf) -> Self {
    FsCache { dir }
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(key.replace(['/', '\\', ':'], "_"))
  }
}

impl Cache for FsCache {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    match std::fs::read(self.path_for(key)) {
      Ok(bytes) => Some(bytes),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
      Err(err) => {
        tracing::warn!("cache read failed for {key}: {err}");
        None
      }
    }
  }

  fn set(&self, key: &str, value: Vec<u8>) {
    let path = self.path_for(key);
    let write = || -> std::io::Result<()> {
      std::fs::create_dir_all(&self.dir)?;
      let tmp = path.with_extension("tmp");
      std::fs::write(&tmp, &value)?;
      std::fs::rename(&tmp, &path)
    };
    if let Err(err) = write() {
      tracing::warn!("cache write failed for {key}: {err}");
    }
  }

  fn has(&self, key: &str) -> bool {
    self.path_for(key).is_file()
  }
}
