use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod in_memory_file_system;
pub mod os_file_system;

pub use in_memory_file_system::InMemoryFileSystem;
pub use os_file_system::OsFileSystem;

/// The filesystem seam the build core reads sources through.
///
/// All reads go through this trait so that builds can run against the real
/// OS filesystem, an overlay, or an in-memory filesystem in tests.
pub trait FileSystem: Send + Sync {
  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

  fn read_to_string(&self, path: &Path) -> io::Result<String>;

  /// Open a fresh byte stream over the file. Callers may open the same file
  /// more than once; each call returns an independent reader.
  fn read_stream(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

  /// Resolve symlinks and lexical `.`/`..` segments to a canonical path.
  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

  fn file_size(&self, path: &Path) -> io::Result<u64>;

  fn is_file(&self, path: &Path) -> bool;

  fn is_dir(&self, path: &Path) -> bool;
}

pub type FileSystemRef = Arc<dyn FileSystem>;
