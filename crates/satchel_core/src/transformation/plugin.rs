use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use satchel_filesystem::FileSystemRef;
use serde::{Deserialize, Serialize};

use crate::options::BuildOptions;
use crate::plugins::Resolver;
use crate::transformation::TransformError;
use crate::types::{
  Asset, ConnectedFile, Content, Dependency, Environment, FileType, JSONObject, SourceMap,
};

/// An opaque AST handle. The core never inspects `program`; it only carries
/// it between adjacent transformers and drops it once code is generated.
/// `plugin_name` identifies the producer for `can_reuse_ast` checks.
#[derive(Clone, Debug)]
pub struct Ast {
  pub plugin_name: String,
  pub program: Arc<serde_json::Value>,
}

impl Ast {
  pub fn new(plugin_name: impl Into<String>, program: serde_json::Value) -> Self {
    Ast {
      plugin_name: plugin_name.into(),
      program: Arc::new(program),
    }
  }
}

pub struct GenerateOutput {
  pub content: Vec<u8>,
  pub map: Option<SourceMap>,
}

/// Invalidation metadata for a configuration a plugin loaded. Surfaced out
/// of the transformation as a config request so the request graph can
/// install the matching edges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
  pub plugin_name: String,

  /// The config file the plugin settled on, if any.
  pub resolved_path: Option<PathBuf>,

  /// Every file read while producing the config.
  pub included_files: Vec<PathBuf>,

  /// Glob whose first match should re-run config resolution.
  pub watch_glob: Option<String>,

  pub should_invalidate_on_startup: bool,

  /// Module specifiers whose installed versions this config depends on.
  pub dev_deps: Vec<String>,
}

/// The result of a `load_config` hook: the opaque value handed to the other
/// hooks, plus the invalidation metadata behind it.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
  pub value: Option<Arc<serde_json::Value>>,
  pub config: PluginConfig,
}

/// One produced asset, as declared by a transformer.
#[derive(Clone, Debug)]
pub struct TransformerResult {
  pub file_type: FileType,
  pub content: Content,
  pub ast: Option<Ast>,
  pub map: Option<SourceMap>,
  pub dependencies: Vec<Dependency>,
  pub connected_files: Vec<ConnectedFile>,
  /// `None` inherits the input's environment.
  pub env: Option<Environment>,
  pub is_isolated: bool,
  pub meta: JSONObject,
}

impl TransformerResult {
  pub fn new(file_type: FileType, content: impl Into<Content>) -> Self {
    TransformerResult {
      file_type,
      content: content.into(),
      ast: None,
      map: None,
      dependencies: Vec::new(),
      connected_files: Vec::new(),
      env: None,
      is_isolated: false,
      meta: JSONObject::new(),
    }
  }
}

/// What a transform invocation hands back to the runner.
pub enum Transformed {
  /// The mutated input asset carries forward as an output of this step.
  Input,
  /// A freshly emitted result, possibly of a different type.
  Emitted(TransformerResult),
}

/// An asset flowing through the pipeline. Hooks mutate it in place; the
/// runner commits it exactly once, after which it is immutable.
#[derive(Clone, Debug)]
pub struct InternalAsset {
  pub asset: Asset,
  pub content: Content,
  pub map: Option<SourceMap>,
  pub ast: Option<Ast>,
}

impl InternalAsset {
  /// Materialize the full content bytes, re-opening the backing stream if
  /// the content is not buffered.
  pub fn content_bytes(&self, fs: &FileSystemRef) -> io::Result<Vec<u8>> {
    self.content.read(fs)
  }
}

/// Context handed to every transformer hook.
pub struct TransformerContext<'a> {
  pub options: &'a BuildOptions,
  pub resolver: &'a dyn Resolver,
}

impl TransformerContext<'_> {
  pub fn fs(&self) -> &FileSystemRef {
    &self.options.input_fs
  }

  /// Resolve a dependency specifier. Failures surface as a typed error;
  /// the transformer decides whether to rethrow.
  pub fn resolve(&self, from: &Path, specifier: &str) -> Result<PathBuf, anyhow::Error> {
    self.resolver.resolve(from, specifier).map_err(|_| {
      TransformError::ResolveFailed {
        specifier: specifier.to_owned(),
        from: from.to_owned(),
      }
      .into()
    })
  }
}

/// A transformer plugin over a single source type. Implementations provide
/// any subset of the hooks; only `transform` is required.
pub trait Transformer: Send + Sync {
  fn name(&self) -> &str;

  /// Load per-plugin configuration. Invoked once per pipeline step; the
  /// returned value is passed unchanged to the other hooks.
  fn load_config(
    &self,
    _asset: &InternalAsset,
    _ctx: &TransformerContext,
  ) -> Result<Option<LoadedConfig>, anyhow::Error> {
    Ok(None)
  }

  /// Whether this transformer can consume an AST left by `ast.plugin_name`
  /// without re-parsing generated code.
  fn can_reuse_ast(&self, _ast: &Ast) -> bool {
    false
  }

  fn parse(
    &self,
    _asset: &mut InternalAsset,
    _config: Option<&serde_json::Value>,
    _ctx: &TransformerContext,
  ) -> Result<Option<Ast>, anyhow::Error> {
    Ok(None)
  }

  fn transform(
    &self,
    asset: &mut InternalAsset,
    config: Option<&serde_json::Value>,
    ctx: &TransformerContext,
  ) -> Result<Vec<Transformed>, anyhow::Error>;

  /// Materialize code and a map from an AST this transformer produced.
  /// `Ok(None)` means the transformer provides no generate.
  fn generate(
    &self,
    _asset: &Asset,
    _ast: &Ast,
    _config: Option<&serde_json::Value>,
    _ctx: &TransformerContext,
  ) -> Result<Option<GenerateOutput>, anyhow::Error> {
    Ok(None)
  }

  /// Rewrite the full set of assets this pipeline produced. `Ok(None)`
  /// keeps the assets as-is.
  fn post_process(
    &self,
    _assets: &[InternalAsset],
    _config: Option<&serde_json::Value>,
    _ctx: &TransformerContext,
  ) -> Result<Option<Vec<TransformerResult>>, anyhow::Error> {
    Ok(None)
  }
}
