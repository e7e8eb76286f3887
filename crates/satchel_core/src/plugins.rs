use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob_match::glob_match;

use crate::transformation::Transformer;

/// A named handle to an interned transformer instance. The config layer
/// hands out one instance per plugin, so pointer identity is the equality
/// test for pipeline comparison.
#[derive(Clone)]
pub struct PluginNode {
  pub name: String,
  pub plugin: Arc<dyn Transformer>,
}

impl PluginNode {
  pub fn new(name: impl Into<String>, plugin: Arc<dyn Transformer>) -> Self {
    PluginNode {
      name: name.into(),
      plugin,
    }
  }
}

impl PartialEq for PluginNode {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.plugin, &other.plugin)
  }
}

impl Eq for PluginNode {}

impl fmt::Debug for PluginNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PluginNode").field("name", &self.name).finish()
  }
}

/// Maps a source file to its ordered transformer chain. Named pipelines are
/// consulted first, then glob patterns in declaration order against the file
/// name and the full path.
#[derive(Default)]
pub struct PipelineMap {
  patterns: Vec<(String, Vec<PluginNode>)>,
  named: HashMap<String, Vec<PluginNode>>,
}

impl PipelineMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, pattern: impl Into<String>, pipeline: Vec<PluginNode>) {
    self.patterns.push((pattern.into(), pipeline));
  }

  pub fn add_named(&mut self, name: impl Into<String>, pipeline: Vec<PluginNode>) {
    self.named.insert(name.into(), pipeline);
  }

  pub fn get(&self, path: &Path, named: Option<&str>) -> Vec<PluginNode> {
    if let Some(pipeline) = named.and_then(|name| self.named.get(name)) {
      return pipeline.clone();
    }

    let file_name = path
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or_default();
    let full_path = path.to_string_lossy();
    for (pattern, pipeline) in &self.patterns {
      if glob_match(pattern, file_name) || glob_match(pattern, &full_path) {
        return pipeline.clone();
      }
    }
    Vec::new()
  }
}

/// Resolver seam backed by the resolution subsystem.
pub trait Resolver: Send + Sync {
  fn resolve(&self, from: &Path, specifier: &str) -> Result<PathBuf, anyhow::Error>;
}

pub type ResolverRef = Arc<dyn Resolver>;

#[cfg(test)]
pub(crate) struct NoopResolver;

#[cfg(test)]
impl Resolver for NoopResolver {
  fn resolve(&self, _from: &Path, specifier: &str) -> Result<PathBuf, anyhow::Error> {
    Err(anyhow::anyhow!("no resolver configured for {specifier}"))
  }
}

/// The loaded plugin configuration for a build, provided by the config
/// service. `cache_path` is the serializable handle workers use to reload
/// the same configuration out of process.
pub struct Plugins {
  pub pipelines: PipelineMap,
  pub resolver: ResolverRef,

  /// The config file this was loaded from, if it came from disk.
  pub config_path: Option<PathBuf>,

  pub cache_path: PathBuf,
}

impl Plugins {
  pub fn new(pipelines: PipelineMap, resolver: ResolverRef) -> Self {
    Plugins {
      pipelines,
      resolver,
      config_path: None,
      cache_path: PathBuf::from("plugin-config"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transformation::{Transformed, Transformer, TransformerContext};

  #[derive(Debug)]
  struct Noop;

  impl Transformer for Noop {
    fn name(&self) -> &str {
      "noop"
    }

    fn transform(
      &self,
      _asset: &mut crate::transformation::InternalAsset,
      _config: Option<&serde_json::Value>,
      _ctx: &TransformerContext,
    ) -> Result<Vec<Transformed>, anyhow::Error> {
      Ok(vec![Transformed::Input])
    }
  }

  #[test]
  fn pipelines_compare_by_plugin_identity() {
    let plugin: Arc<dyn Transformer> = Arc::new(Noop);
    let a = PluginNode::new("noop", plugin.clone());
    let b = PluginNode::new("noop-again", plugin);
    let c = PluginNode::new("noop", Arc::new(Noop));

    assert_eq!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn named_pipelines_win_over_patterns() {
    let plugin: Arc<dyn Transformer> = Arc::new(Noop);
    let by_ext = vec![PluginNode::new("ext", plugin.clone())];
    let by_name = vec![PluginNode::new("named", plugin.clone())];

    let mut map = PipelineMap::new();
    map.add("*.js", by_ext.clone());
    map.add_named("inline", by_name.clone());

    assert_eq!(map.get(Path::new("/src/a.js"), None), by_ext);
    assert_eq!(map.get(Path::new("/src/a.js"), Some("inline")), by_name);
    assert!(map.get(Path::new("/src/a.wat"), None).is_empty());
  }
}
