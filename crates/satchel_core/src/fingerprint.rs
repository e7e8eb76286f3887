use std::hash::{Hash, Hasher};
use std::io::{self, Read};
use std::path::Path;

use satchel_filesystem::FileSystemRef;
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// Files up to this size are buffered in memory while hashing; larger files
/// fall back to the stream representation and are re-read on demand.
pub const STREAM_BUFFER_LIMIT: u64 = 5 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;

/// Deterministic digest of a structured value. Digests are opaque equality
/// tokens: identical inputs yield identical digests across processes and
/// runs, and nothing ever parses one.
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> String {
  let mut hasher = Xxh3::new();
  value.hash(&mut hasher);
  format!("{:016x}", hasher.finish())
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
  format!("{:016x}", xxh3_64(bytes))
}

pub fn fingerprint_string(s: &str) -> String {
  fingerprint_bytes(s.as_bytes())
}

/// Digest of a JSON value. Maps are key-sorted by construction, so field
/// order in the source document does not affect the digest.
pub fn fingerprint_json(value: &serde_json::Value) -> String {
  match serde_json::to_vec(value) {
    Ok(bytes) => fingerprint_bytes(&bytes),
    Err(_) => fingerprint_string(&value.to_string()),
  }
}

pub fn fingerprint_file(fs: &FileSystemRef, path: &Path) -> io::Result<String> {
  hash_stream(fs.read_stream(path)?, |_| {})
}

/// Stream bytes through a digest, invoking `tap` once per chunk so callers
/// can buffer and measure in the same pass.
pub fn hash_stream<R: Read>(mut reader: R, mut tap: impl FnMut(&[u8])) -> io::Result<String> {
  let mut hasher = Xxh3::new();
  let mut chunk = [0u8; CHUNK_SIZE];
  loop {
    let read = reader.read(&mut chunk)?;
    if read == 0 {
      break;
    }
    hasher.update(&chunk[..read]);
    tap(&chunk[..read]);
  }
  Ok(format!("{:016x}", hasher.digest()))
}
