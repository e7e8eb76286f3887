use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;

use crate::FileSystem;

/// An in-memory filesystem for tests and virtual inputs.
///
/// Paths are normalized lexically (`.` and `..` segments are collapsed), so
/// `canonicalize` is stable without touching the disk.
#[derive(Default)]
pub struct InMemoryFileSystem {
  files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl InMemoryFileSystem {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn write_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
    self
      .files
      .write()
      .insert(normalize(path.as_ref()), contents.into());
  }

  pub fn remove_file(&self, path: impl AsRef<Path>) {
    self.files.write().remove(&normalize(path.as_ref()));
  }
}

fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::Prefix(prefix) => out.push(prefix.as_os_str()),
      Component::RootDir => out.push(Component::RootDir),
      Component::CurDir => {}
      Component::ParentDir => {
        out.pop();
      }
      Component::Normal(part) => out.push(part),
    }
  }
  out
}

fn not_found(path: &Path) -> io::Error {
  io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
}

impl FileSystem for InMemoryFileSystem {
  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    self
      .files
      .read()
      .get(&normalize(path))
      .cloned()
      .ok_or_else(|| not_found(path))
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    String::from_utf8(self.read(path)?)
      .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
  }

  fn read_stream(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
    Ok(Box::new(Cursor::new(self.read(path)?)))
  }

  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
    // There are no symlinks here, so the lexically normalized path is
    // canonical whether or not the file exists yet.
    Ok(normalize(path))
  }

  fn file_size(&self, path: &Path) -> io::Result<u64> {
    Ok(self.read(path)?.len() as u64)
  }

  fn is_file(&self, path: &Path) -> bool {
    self.files.read().contains_key(&normalize(path))
  }

  fn is_dir(&self, path: &Path) -> bool {
    let prefix = normalize(path);
    self
      .files
      .read()
      .keys()
      .any(|file| file.parent().map_or(false, |dir| dir.starts_with(&prefix)))
  }
}
