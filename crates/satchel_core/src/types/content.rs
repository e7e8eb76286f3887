use std::io;
use std::path::PathBuf;

use satchel_filesystem::FileSystemRef;

/// Asset content is either held in memory or re-read from disk on demand.
///
/// Small files are buffered; files above the streaming threshold carry only
/// the path so that a fresh stream can be opened when the bytes are needed.
#[derive(Clone, Debug)]
pub enum Content {
  Blob(Vec<u8>),
  Stream(PathBuf),
}

impl Content {
  pub fn empty() -> Content {
    Content::Blob(Vec::new())
  }

  pub fn is_blob(&self) -> bool {
    matches!(self, Content::Blob(_))
  }

  /// Materialize the full byte content, re-opening the backing file for the
  /// stream representation.
  pub fn read(&self, fs: &FileSystemRef) -> io::Result<Vec<u8>> {
    match self {
      Content::Blob(bytes) => Ok(bytes.clone()),
      Content::Stream(path) => fs.read(path),
    }
  }
}

impl From<Vec<u8>> for Content {
  fn from(bytes: Vec<u8>) -> Content {
    Content::Blob(bytes)
  }
}

impl From<&str> for Content {
  fn from(s: &str) -> Content {
    Content::Blob(s.as_bytes().to_vec())
  }
}
