use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use xxhash_rust::xxh3::Xxh3;

use super::environment::Environment;
use super::json::JSONObject;
use crate::bitflags_serde;

/// A dependency denotes a connection between two assets, discovered by a
/// transformer while processing the source asset.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
  /// The import or export specifier that connects two assets together
  pub specifier: String,

  /// How the specifier should be interpreted
  pub specifier_type: SpecifierType,

  /// The environment of the dependency
  pub env: Environment,

  /// Determines when the dependency should be loaded
  pub priority: Priority,

  /// Information that represents the state of the dependency
  pub flags: DependencyFlags,

  /// The file path of the asset with this dependency
  pub source_path: Option<PathBuf>,

  /// Plugin-specific metadata for the dependency
  #[serde(default)]
  pub meta: JSONObject,
}

impl Dependency {
  pub fn new(specifier: String, env: Environment) -> Dependency {
    Dependency {
      specifier,
      specifier_type: SpecifierType::default(),
      env,
      priority: Priority::default(),
      flags: DependencyFlags::empty(),
      source_path: None,
      meta: JSONObject::new(),
    }
  }

  pub fn id(&self) -> u64 {
    let mut hasher = Xxh3::new();
    self.specifier.hash(&mut hasher);
    self.specifier_type.hash(&mut hasher);
    self.env.hash(&mut hasher);
    self.priority.hash(&mut hasher);
    self.source_path.hash(&mut hasher);
    hasher.finish()
  }
}

bitflags! {
  #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Default)]
  pub struct DependencyFlags: u8 {
    const ENTRY    = 1 << 0;
    const OPTIONAL = 1 << 1;
    const NEEDS_STABLE_NAME = 1 << 2;
    const IS_ESM = 1 << 3;
  }
}

bitflags_serde!(DependencyFlags);

/// Determines when a dependency should load
#[derive(Clone, Copy, Debug, Default, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u8)]
pub enum Priority {
  #[default]
  Sync = 0,
  Parallel = 1,
  Lazy = 2,
}

/// The type of the import specifier
#[derive(Clone, Copy, Debug, Default, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u8)]
pub enum SpecifierType {
  #[default]
  Esm = 0,
  CommonJS = 1,
  Url = 2,
  Custom = 3,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_is_stable_and_distinguishes_specifiers() {
    let env = Environment::default();
    let a = Dependency::new("./a".into(), env.clone());
    let b = Dependency::new("./b".into(), env.clone());
    assert_eq!(a.id(), Dependency::new("./a".into(), env).id());
    assert_ne!(a.id(), b.id());
  }
}
