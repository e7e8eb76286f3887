use std::path::PathBuf;
use std::sync::Arc;

use satchel_filesystem::{FileSystemRef, InMemoryFileSystem};

use crate::cache::{CacheRef, InMemoryCache};

/// Shared process options. Excluded from every request identity: requests
/// receive these through the run context, never through their input.
pub struct BuildOptions {
  /// Filesystem all source reads go through.
  pub input_fs: FileSystemRef,

  /// Backing store for content blobs and cache entries.
  pub cache: CacheRef,

  /// Opts out of cache lookups entirely. Entries are still written so a
  /// later build can warm-start.
  pub should_disable_cache: bool,

  pub cache_dir: PathBuf,

  /// When set, dep-version requests invalidate on updates to this file.
  pub lock_file: Option<PathBuf>,

  pub project_root: PathBuf,
}

impl BuildOptions {
  pub fn new(input_fs: FileSystemRef) -> Self {
    BuildOptions {
      input_fs,
      cache: Arc::new(InMemoryCache::new()),
      should_disable_cache: false,
      cache_dir: PathBuf::from(".satchel-cache"),
      lock_file: None,
      project_root: PathBuf::from("/"),
    }
  }
}

impl Default for BuildOptions {
  fn default() -> Self {
    BuildOptions::new(Arc::new(InMemoryFileSystem::new()))
  }
}
