use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

use super::dependency::Dependency;
use super::environment::Environment;
use super::json::JSONObject;
use crate::bitflags_serde;

/// The effective type of an asset, derived from its file extension. It
/// selects the transformer pipeline and may change mid-pipeline when a
/// transformer emits a result of a different type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
  Js,
  Jsx,
  Ts,
  Tsx,
  Css,
  Html,
  Json,
  Other(String),
}

impl FileType {
  pub fn from_extension(ext: &str) -> FileType {
    match ext {
      "js" | "mjs" | "cjs" => FileType::Js,
      "jsx" => FileType::Jsx,
      "ts" | "mts" | "cts" => FileType::Ts,
      "tsx" => FileType::Tsx,
      "css" => FileType::Css,
      "html" | "htm" => FileType::Html,
      "json" => FileType::Json,
      other => FileType::Other(other.to_owned()),
    }
  }

  pub fn extension(&self) -> &str {
    match self {
      FileType::Js => "js",
      FileType::Jsx => "jsx",
      FileType::Ts => "ts",
      FileType::Tsx => "tsx",
      FileType::Css => "css",
      FileType::Html => "html",
      FileType::Json => "json",
      FileType::Other(ext) => ext,
    }
  }
}

bitflags! {
  #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Default)]
  pub struct AssetFlags: u8 {
    const SIDE_EFFECTS = 1 << 0;
    const IS_SOURCE = 1 << 1;
    const IS_ISOLATED = 1 << 2;
  }
}

bitflags_serde!(AssetFlags);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStats {
  /// Content size in bytes.
  pub size: u64,
  /// Wall time spent producing the asset, in milliseconds.
  pub time: u64,
}

/// A file whose content influenced an asset. Any change to a connected file
/// must invalidate the asset, so the recorded hash is re-checked on cache
/// reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedFile {
  pub file_path: PathBuf,
  pub hash: String,
}

/// An opaque source map payload, carried alongside content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap(#[serde(with = "serde_bytes")] pub Vec<u8>);

/// The persisted record of an intermediate asset. Content, map, and AST
/// bytes live in the content-addressed store under the recorded keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
  /// The file path for file inputs, or the content hash for inline inputs.
  pub id_base: String,

  /// Per-result salt distinguishing sibling assets emitted by one
  /// transformer invocation.
  pub unique_key: Option<String>,

  pub file_path: PathBuf,

  #[serde(rename = "type")]
  pub file_type: FileType,

  pub env: Environment,

  /// Content hash over the materialized bytes at the time of construction.
  pub hash: String,

  /// Key of the committed content in the content-addressed store. Empty
  /// until the asset is committed.
  pub content_key: String,

  pub map_key: Option<String>,

  pub ast_key: Option<String>,

  pub stats: AssetStats,

  pub flags: AssetFlags,

  #[serde(default)]
  pub meta: JSONObject,

  #[serde(default)]
  pub dependencies: Vec<Dependency>,

  #[serde(default)]
  pub connected_files: Vec<ConnectedFile>,
}

impl Asset {
  pub fn id(&self) -> u64 {
    let mut hasher = Xxh3::new();
    self.id_base.hash(&mut hasher);
    self.unique_key.hash(&mut hasher);
    self.file_type.hash(&mut hasher);
    self.env.hash(&mut hasher);
    hasher.finish()
  }

  pub fn side_effects(&self) -> bool {
    self.flags.contains(AssetFlags::SIDE_EFFECTS)
  }
}
