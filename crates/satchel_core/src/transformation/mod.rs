mod pipeline;
mod plugin;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use satchel_filesystem::FileSystemRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use plugin::{
  Ast, GenerateOutput, InternalAsset, LoadedConfig, PluginConfig, Transformed, Transformer,
  TransformerContext, TransformerResult,
};

use crate::asset_store::{AssetStore, CacheEntry};
use crate::fingerprint::{fingerprint, fingerprint_bytes, hash_stream, STREAM_BUFFER_LIMIT};
use crate::options::BuildOptions;
use crate::plugins::Plugins;
use crate::types::{Asset, AssetFlags, AssetStats, Content, Environment, FileType, JSONObject};
use crate::worker_farm::WorkerError;

#[derive(Debug, Error)]
pub enum TransformError {
  /// An asset carries an AST but its producer provides no `generate`, and
  /// the pipeline must emit code.
  #[error("transformer {transformer} left an AST for {file_path} but provides no generate")]
  TransformerMissingGenerate {
    transformer: String,
    file_path: PathBuf,
  },

  #[error("failed to resolve {specifier} from {from}")]
  ResolveFailed { specifier: String, from: PathBuf },

  #[error("no transformer pipeline matched {0}")]
  EmptyPipeline(PathBuf),

  #[error("failed to read {path}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A committed blob could not be read back. Treated as a cache miss by
  /// every caller, never as fatal.
  #[error("cache blob {key} could not be read back")]
  CacheCorrupt { key: String },

  #[error(transparent)]
  Worker(#[from] WorkerError),

  #[error(transparent)]
  Plugin(anyhow::Error),
}

/// The serializable input to a transformation, safe to hand to a worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
  pub file_path: PathBuf,

  /// Inline source for virtual assets. When set, the request is identified
  /// by content and never served from the cache.
  #[serde(with = "serde_bytes", default)]
  pub code: Option<Vec<u8>>,

  pub env: Environment,

  pub side_effects: bool,

  /// Named pipeline hint, consulted before the extension match.
  pub pipeline: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TransformationResult {
  pub assets: Vec<Asset>,
  pub config_requests: Vec<PluginConfig>,
}

pub(crate) struct TransformCtx<'a> {
  pub options: &'a Arc<BuildOptions>,
  pub store: &'a AssetStore,
  pub plugins: &'a Plugins,
  pub pipeline_hint: Option<String>,
  pub config_requests: Vec<PluginConfig>,
}

/// Hash content in a single streaming pass, buffering into memory up to the
/// streaming threshold. Above it the buffer is discarded and the stream
/// representation is kept, so the bytes are re-read on demand.
pub(crate) fn hash_content(
  content: Content,
  fs: &FileSystemRef,
) -> Result<(Content, String, u64), TransformError> {
  match content {
    Content::Blob(bytes) => {
      let hash = fingerprint_bytes(&bytes);
      let size = bytes.len() as u64;
      Ok((Content::Blob(bytes), hash, size))
    }
    Content::Stream(path) => {
      let io_error = |source| TransformError::Io {
        path: path.clone(),
        source,
      };
      let stream = fs.read_stream(&path).map_err(&io_error)?;
      let mut buffer: Option<Vec<u8>> = Some(Vec::new());
      let mut size: u64 = 0;
      let hash = hash_stream(stream, |chunk| {
        size += chunk.len() as u64;
        if size > STREAM_BUFFER_LIMIT {
          buffer = None;
        } else if let Some(buffer) = buffer.as_mut() {
          buffer.extend_from_slice(chunk);
        }
      })
      .map_err(&io_error)?;
      let content = match buffer {
        Some(bytes) => Content::Blob(bytes),
        None => Content::Stream(path),
      };
      Ok((content, hash, size))
    }
  }
}

/// Run the transformer pipeline for one request: materialize the input,
/// serve it whole from the cache when nothing changed, otherwise walk the
/// pipeline and write a fresh cache entry.
pub fn run_transform(
  request: &TransformRequest,
  plugins: &Plugins,
  options: &Arc<BuildOptions>,
  store: &AssetStore,
) -> Result<TransformationResult, TransformError> {
  let started = Instant::now();
  let fs = &options.input_fs;
  let file_type = FileType::from_extension(
    request
      .file_path
      .extension()
      .and_then(|ext| ext.to_str())
      .unwrap_or(""),
  );

  let (content, hash, size, id_base) = match &request.code {
    Some(code) => {
      // Inline snippets are identified by content, not path, so two
      // distinct snippets at the same path never alias.
      let hash = fingerprint_bytes(code);
      (Content::Blob(code.clone()), hash.clone(), code.len() as u64, hash)
    }
    None => {
      let (content, hash, size) = hash_content(Content::Stream(request.file_path.clone()), fs)?;
      (
        content,
        hash.clone(),
        size,
        request.file_path.to_string_lossy().into_owned(),
      )
    }
  };

  let mut flags = AssetFlags::empty();
  flags.set(AssetFlags::SIDE_EFFECTS, request.side_effects);
  flags.set(
    AssetFlags::IS_SOURCE,
    !request
      .file_path
      .components()
      .any(|c| c.as_os_str() == "node_modules"),
  );

  let asset = InternalAsset {
    asset: Asset {
      id_base,
      unique_key: None,
      file_path: request.file_path.clone(),
      file_type,
      env: request.env.clone(),
      hash: hash.clone(),
      content_key: String::new(),
      map_key: None,
      ast_key: None,
      stats: AssetStats { size, time: 0 },
      flags,
      meta: JSONObject::new(),
      dependencies: Vec::new(),
      // The source file itself is tracked by the request's own update
      // edge and the entry-level hash, not as a connected file; listing
      // it here would defeat per-child reuse after a source edit.
      connected_files: Vec::new(),
    },
    content,
    map: None,
    ast: None,
  };

  let cache_key = format!(
    "asset_request_cache:{}",
    fingerprint(&(&request.file_path, &request.env))
  );
  let is_inline = request.code.is_some();
  let cache_entry = if is_inline || options.should_disable_cache {
    None
  } else {
    store.get_entry(&cache_key)
  };

  if let Some(entry) = &cache_entry {
    if entry.hash == hash && store.check_cached_assets(entry) {
      tracing::debug!("full cache hit for {}", request.file_path.display());
      return Ok(TransformationResult {
        assets: entry.assets.clone(),
        config_requests: entry.config_requests.clone(),
      });
    }
  }

  let chain = plugins
    .pipelines
    .get(&request.file_path, request.pipeline.as_deref());
  if chain.is_empty() {
    return Err(TransformError::EmptyPipeline(request.file_path.clone()));
  }

  let mut ctx = TransformCtx {
    options,
    store,
    plugins,
    pipeline_hint: request.pipeline.clone(),
    config_requests: Vec::new(),
  };
  let output = pipeline::run_pipeline(asset, &Arc::new(chain), 0, cache_entry.as_ref(), None, &mut ctx)?;

  let elapsed = started.elapsed().as_millis() as u64;
  let mut commit = |assets: Vec<InternalAsset>| -> Result<Vec<Asset>, TransformError> {
    let mut committed = Vec::with_capacity(assets.len());
    for mut internal in assets {
      store.commit(&mut internal)?;
      internal.asset.stats.time = elapsed;
      committed.push(internal.asset);
    }
    Ok(committed)
  };
  let assets = commit(output.assets)?;
  let initial_assets = output.initial_assets.map(&mut commit).transpose()?;

  let mut config_requests: Vec<PluginConfig> = Vec::new();
  for config in ctx.config_requests {
    if !config_requests.contains(&config) {
      config_requests.push(config);
    }
  }

  // Inline requests are never persisted: their identity already includes
  // the content, but aliasing through the file path is still possible.
  if !is_inline {
    let entry = CacheEntry {
      file_path: request.file_path.clone(),
      env: request.env.clone(),
      hash,
      assets: assets.clone(),
      initial_assets,
      config_requests: config_requests.clone(),
    };
    store.set_entry(&cache_key, &entry);
  }

  Ok(TransformationResult {
    assets,
    config_requests,
  })
}
