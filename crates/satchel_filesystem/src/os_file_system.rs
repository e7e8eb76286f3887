use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::FileSystem;

/// The real OS filesystem.
#[derive(Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path)
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    std::fs::read_to_string(path)
  }

  fn read_stream(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    Ok(Box::new(file))
  }

  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
    std::fs::canonicalize(path)
  }

  fn file_size(&self, path: &Path) -> io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
  }

  fn is_file(&self, path: &Path) -> bool {
    path.is_file()
  }

  fn is_dir(&self, path: &Path) -> bool {
    path.is_dir()
  }
}

#[cfg(test)]
mod tests {
  use assert_fs::prelude::*;

  use super::*;

  #[test]
  fn reads_files_and_streams() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("a.txt").write_str("hello").unwrap();

    let fs = OsFileSystem;
    let path = dir.child("a.txt").path().to_path_buf();
    assert_eq!(fs.read(&path).unwrap(), b"hello");
    assert_eq!(fs.read_to_string(&path).unwrap(), "hello");
    assert_eq!(fs.file_size(&path).unwrap(), 5);
    assert!(fs.is_file(&path));
    assert!(!fs.is_dir(&path));

    let mut out = String::new();
    fs.read_stream(&path)
      .unwrap()
      .read_to_string(&mut out)
      .unwrap();
    assert_eq!(out, "hello");
  }

  #[test]
  fn missing_file_is_an_error() {
    let fs = OsFileSystem;
    assert!(fs.read(Path::new("/definitely/not/here")).is_err());
  }
}
