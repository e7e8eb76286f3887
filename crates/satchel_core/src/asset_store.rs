use std::path::PathBuf;

use dashmap::DashMap;
use satchel_filesystem::FileSystemRef;
use serde::{Deserialize, Serialize};

use crate::cache::CacheRef;
use crate::fingerprint::fingerprint_file;
use crate::transformation::{InternalAsset, PluginConfig, TransformError};
use crate::types::{Asset, ConnectedFile, Environment};

/// The persisted result of a successful asset request. Content lives in the
/// content-addressed store; the entry records the keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
  pub file_path: PathBuf,
  pub env: Environment,
  /// Content hash of the source the entry was built from.
  pub hash: String,
  pub assets: Vec<Asset>,
  /// Pre-post-process assets, present only when a post-process step
  /// rewrote the pipeline's outputs.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub initial_assets: Option<Vec<Asset>>,
  /// Config requests discovered while transforming, replayed on cache hits
  /// so their invalidation edges are re-registered.
  #[serde(default)]
  pub config_requests: Vec<PluginConfig>,
}

/// Owns committed intermediate assets: writes content, map, and AST blobs
/// under content-derived keys and re-reads them on demand.
pub struct AssetStore {
  cache: CacheRef,
  fs: FileSystemRef,
  committed: DashMap<String, ()>,
}

impl AssetStore {
  pub fn new(cache: CacheRef, fs: FileSystemRef) -> Self {
    AssetStore {
      cache,
      fs,
      committed: DashMap::new(),
    }
  }

  /// Commit an asset's artifacts. Idempotent on content hash: concurrent
  /// commits of the same key coalesce into one write.
  pub fn commit(&self, internal: &mut InternalAsset) -> Result<(), TransformError> {
    let content_key = internal.asset.hash.clone();
    let map_key = internal.map.as_ref().map(|_| format!("{content_key}.map"));
    let ast_key = internal.ast.as_ref().map(|_| format!("{content_key}.ast"));

    if self.committed.insert(content_key.clone(), ()).is_none() {
      let bytes = internal
        .content
        .read(&self.fs)
        .map_err(|source| TransformError::Io {
          path: internal.asset.file_path.clone(),
          source,
        })?;
      self.cache.set(&content_key, bytes);
      if let (Some(key), Some(map)) = (&map_key, &internal.map) {
        self.cache.set(key, map.0.clone());
      }
      if let (Some(key), Some(ast)) = (&ast_key, &internal.ast) {
        if let Ok(bytes) = serde_json::to_vec(ast.program.as_ref()) {
          self.cache.set(key, bytes);
        }
      }
    }

    internal.asset.content_key = content_key;
    internal.asset.map_key = map_key;
    internal.asset.ast_key = ast_key;
    Ok(())
  }

  /// Read a committed blob back. A missing blob is a corrupt-cache signal;
  /// callers treat it as a miss.
  pub fn read_blob(&self, key: &str) -> Result<Vec<u8>, TransformError> {
    self
      .cache
      .get(key)
      .ok_or_else(|| TransformError::CacheCorrupt {
        key: key.to_owned(),
      })
  }

  /// True iff every recorded connected-file hash still matches the file on
  /// disk. Unreadable files count as changed.
  pub fn check_connected_files(&self, files: &[ConnectedFile]) -> bool {
    files.iter().all(|file| {
      fingerprint_file(&self.fs, &file.file_path)
        .map(|hash| hash == file.hash)
        .unwrap_or(false)
    })
  }

  /// Validate a retrieved entry by re-hashing the connected files of every
  /// asset it records.
  pub fn check_cached_assets(&self, entry: &CacheEntry) -> bool {
    entry
      .assets
      .iter()
      .chain(entry.initial_assets.iter().flatten())
      .all(|asset| {
        self.cache.has(&asset.content_key) && self.check_connected_files(&asset.connected_files)
      })
  }

  pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
    let bytes = self.cache.get(key)?;
    match serde_json::from_slice(&bytes) {
      Ok(entry) => Some(entry),
      Err(err) => {
        tracing::warn!("discarding corrupt cache entry {key}: {err}");
        None
      }
    }
  }

  pub fn set_entry(&self, key: &str, entry: &CacheEntry) {
    match serde_json::to_vec(entry) {
      Ok(bytes) => self.cache.set(key, bytes),
      Err(err) => tracing::warn!("failed to serialize cache entry {key}: {err}"),
    }
  }
}
