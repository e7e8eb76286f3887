use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::bitflags_serde;

/// The target an asset is built for. Treated strictly as an equality key:
/// two requests with different environments are unrelated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
  pub context: EnvironmentContext,
  pub output_format: OutputFormat,
  pub source_type: SourceType,
  pub flags: EnvironmentFlags,
  pub engines: Engines,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engines {
  #[serde(default)]
  pub browsers: Vec<String>,
  pub node: Option<String>,
  pub electron: Option<String>,
}

bitflags! {
  #[derive(Clone, Copy, Hash, Debug, PartialEq, Eq, Default)]
  pub struct EnvironmentFlags: u8 {
    const IS_LIBRARY = 1 << 0;
    const SHOULD_OPTIMIZE = 1 << 1;
    const SHOULD_SCOPE_HOIST = 1 << 2;
  }
}

bitflags_serde!(EnvironmentFlags);

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum EnvironmentContext {
  #[default]
  Browser = 0,
  WebWorker = 1,
  ServiceWorker = 2,
  Node = 3,
  ElectronMain = 4,
  ElectronRenderer = 5,
}

impl EnvironmentContext {
  pub fn is_node(&self) -> bool {
    use EnvironmentContext::*;
    matches!(self, Node | ElectronMain | ElectronRenderer)
  }

  pub fn is_browser(&self) -> bool {
    use EnvironmentContext::*;
    matches!(self, Browser | WebWorker | ServiceWorker | ElectronRenderer)
  }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SourceType {
  #[default]
  Module = 0,
  Script = 1,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum OutputFormat {
  #[default]
  Global = 0,
  Commonjs = 1,
  Esmodule = 2,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn environment_is_an_equality_key() {
    let browser = Environment::default();
    let node = Environment {
      context: EnvironmentContext::Node,
      ..Default::default()
    };
    assert_eq!(browser, browser.clone());
    assert_ne!(browser, node);
  }

  #[test]
  fn serde_round_trip() {
    let env = Environment {
      context: EnvironmentContext::Node,
      output_format: OutputFormat::Esmodule,
      flags: EnvironmentFlags::IS_LIBRARY | EnvironmentFlags::SHOULD_OPTIMIZE,
      engines: Engines {
        node: Some(">= 18".into()),
        ..Default::default()
      },
      ..Default::default()
    };
    let json = serde_json::to_string(&env).unwrap();
    let back: Environment = serde_json::from_str(&json).unwrap();
    assert_eq!(env, back);
  }
}
