use std::sync::Arc;

use crate::asset_store::CacheEntry;
use crate::plugins::PluginNode;
use crate::types::{Asset, AssetFlags, Content, SourceMap};

use super::plugin::{
  InternalAsset, Transformed, TransformerContext, TransformerResult,
};
use super::{hash_content, TransformCtx, TransformError};

pub(crate) struct PipelineOutput {
  pub assets: Vec<InternalAsset>,
  /// Pre-post-process assets, recorded only when a post-process step
  /// rewrote the output set.
  pub initial_assets: Option<Vec<InternalAsset>>,
}

/// The generate hook of the step that produced the current AST, carried
/// forward so the next step can force code out lazily.
#[derive(Clone)]
pub(crate) struct PreviousGenerate {
  plugin: PluginNode,
  config: Option<Arc<serde_json::Value>>,
}

impl PreviousGenerate {
  /// Materialize code and map from the asset's AST, overwriting content and
  /// dropping the AST.
  fn materialize(
    &self,
    asset: &mut InternalAsset,
    tctx: &TransformerContext,
  ) -> Result<(), TransformError> {
    let Some(ast) = asset.ast.take() else {
      return Ok(());
    };
    let output = self
      .plugin
      .plugin
      .generate(&asset.asset, &ast, self.config.as_deref(), tctx)
      .map_err(TransformError::Plugin)?;
    match output {
      Some(generated) => {
        asset.asset.hash = crate::fingerprint::fingerprint_bytes(&generated.content);
        asset.asset.stats.size = generated.content.len() as u64;
        asset.content = Content::Blob(generated.content);
        asset.map = generated.map;
        Ok(())
      }
      None => Err(TransformError::TransformerMissingGenerate {
        transformer: self.plugin.name.clone(),
        file_path: asset.asset.file_path.clone(),
      }),
    }
  }
}

/// Walk the transformer chain from `pipeline[start]`, recursing for every
/// produced child until the chain ends or jumps to another pipeline.
pub(crate) fn run_pipeline(
  mut asset: InternalAsset,
  pipeline: &Arc<Vec<PluginNode>>,
  start: usize,
  cache_entry: Option<&CacheEntry>,
  previous_generate: Option<PreviousGenerate>,
  ctx: &mut TransformCtx<'_>,
) -> Result<PipelineOutput, TransformError> {
  let options = ctx.options;
  let plugins = ctx.plugins;
  let tctx = TransformerContext {
    options: options.as_ref(),
    resolver: plugins.resolver.as_ref(),
  };
  let step = pipeline[start].clone();
  tracing::trace!(
    "running {} over {}",
    step.name,
    asset.asset.file_path.display()
  );

  // Config load.
  let loaded = step
    .plugin
    .load_config(&asset, &tctx)
    .map_err(TransformError::Plugin)?;
  let config = loaded.as_ref().and_then(|loaded| loaded.value.clone());
  if let Some(loaded) = loaded {
    ctx.config_requests.push(loaded.config);
  }

  // AST reconciliation. An AST the current step cannot consume is flushed
  // to code through the producing step's generate; a reusable one is kept
  // so adjacent steps share it without a re-parse.
  let reuse = match &asset.ast {
    Some(ast) => step.plugin.can_reuse_ast(ast),
    None => true,
  };
  if !reuse {
    match &previous_generate {
      Some(previous) => previous.materialize(&mut asset, &tctx)?,
      None => {
        let producer = asset
          .ast
          .as_ref()
          .map(|ast| ast.plugin_name.clone())
          .unwrap_or_default();
        return Err(TransformError::TransformerMissingGenerate {
          transformer: producer,
          file_path: asset.asset.file_path.clone(),
        });
      }
    }
  }
  if asset.ast.is_none() {
    if let Some(ast) = step
      .plugin
      .parse(&mut asset, config.as_deref(), &tctx)
      .map_err(TransformError::Plugin)?
    {
      asset.ast = Some(ast);
    }
  }

  // Transform.
  let input_type = asset.asset.file_type.clone();
  let outputs = step
    .plugin
    .transform(&mut asset, config.as_deref(), &tctx)
    .map_err(TransformError::Plugin)?;

  let is_last = start + 1 == pipeline.len();
  let current_generate = PreviousGenerate {
    plugin: step.clone(),
    config: config.clone(),
  };
  let mut collected: Vec<InternalAsset> = Vec::new();

  for (index, output) in outputs.into_iter().enumerate() {
    let (result, unique_key) = match output {
      Transformed::Input => (normalize_input(&asset), asset.asset.unique_key.clone()),
      Transformed::Emitted(result) => (result, Some(index.to_string())),
    };
    let child = make_child_asset(&asset, result, unique_key, ctx)?;

    // A cached asset with the same content hash and live connected files
    // stands in for the rest of this child's pipeline.
    if let Some(entry) = cache_entry {
      if let Some(reused) = reuse_cached_assets(entry, &child, ctx) {
        collected.push(reused);
        continue;
      }
    }

    let next_pipeline = if child.asset.file_type == input_type {
      None
    } else {
      let hypothetical = child
        .asset
        .file_path
        .with_extension(child.asset.file_type.extension());
      let next = plugins
        .pipelines
        .get(&hypothetical, ctx.pipeline_hint.as_deref());
      if next.is_empty() {
        return Err(TransformError::EmptyPipeline(hypothetical));
      }
      // Plugin handles are interned, so pointer identity decides whether
      // the recomputed pipeline is the one already running.
      if next == **pipeline {
        None
      } else {
        Some(next)
      }
    };

    match next_pipeline {
      None if is_last => {
        let mut child = child;
        finalize(&mut child, &current_generate, &tctx)?;
        collected.push(child);
      }
      None => {
        let output = run_pipeline(
          child,
          pipeline,
          start + 1,
          cache_entry,
          Some(current_generate.clone()),
          ctx,
        )?;
        collected.extend(output.assets);
      }
      Some(next) => {
        let output = run_pipeline(
          child,
          &Arc::new(next),
          0,
          cache_entry,
          Some(current_generate.clone()),
          ctx,
        )?;
        collected.extend(output.assets);
      }
    }
  }

  // Post-process. The rewritten set replaces the emitted assets; the
  // original set is preserved so future cache checks can match either.
  let processed = step
    .plugin
    .post_process(&collected, config.as_deref(), &tctx)
    .map_err(TransformError::Plugin)?;
  if let Some(results) = processed {
    let initial = collected;
    let mut assets = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
      let mut child = make_child_asset(&asset, result, Some(format!("p{index}")), ctx)?;
      finalize(&mut child, &current_generate, &tctx)?;
      assets.push(child);
    }
    return Ok(PipelineOutput {
      assets,
      initial_assets: Some(initial),
    });
  }

  Ok(PipelineOutput {
    assets: collected,
    initial_assets: None,
  })
}

/// The mutated input carries forward: read its current state back as a
/// result record.
fn normalize_input(asset: &InternalAsset) -> TransformerResult {
  TransformerResult {
    file_type: asset.asset.file_type.clone(),
    content: asset.content.clone(),
    ast: asset.ast.clone(),
    map: asset.map.clone(),
    dependencies: asset.asset.dependencies.clone(),
    connected_files: asset.asset.connected_files.clone(),
    env: None,
    is_isolated: asset.asset.flags.contains(AssetFlags::IS_ISOLATED),
    meta: asset.asset.meta.clone(),
  }
}

fn make_child_asset(
  parent: &InternalAsset,
  result: TransformerResult,
  unique_key: Option<String>,
  ctx: &TransformCtx<'_>,
) -> Result<InternalAsset, TransformError> {
  let (content, hash, size) = hash_content(result.content, &ctx.options.input_fs)?;

  let mut flags = parent.asset.flags & (AssetFlags::SIDE_EFFECTS | AssetFlags::IS_SOURCE);
  flags.set(AssetFlags::IS_ISOLATED, result.is_isolated);

  let mut connected_files = parent.asset.connected_files.clone();
  for file in result.connected_files {
    if !connected_files.contains(&file) {
      connected_files.push(file);
    }
  }

  let mut asset = parent.asset.clone();
  asset.unique_key = unique_key;
  asset.file_type = result.file_type;
  asset.env = result.env.unwrap_or_else(|| parent.asset.env.clone());
  asset.hash = hash;
  asset.content_key = String::new();
  asset.map_key = None;
  asset.ast_key = None;
  asset.stats.size = size;
  asset.flags = flags;
  asset.meta = result.meta;
  asset.dependencies = result.dependencies;
  asset.connected_files = connected_files;

  Ok(InternalAsset {
    asset,
    content,
    map: result.map,
    ast: result.ast,
  })
}

/// End of the chain: an asset still holding an AST is flushed to code
/// through the final step's generate.
fn finalize(
  child: &mut InternalAsset,
  generate: &PreviousGenerate,
  tctx: &TransformerContext,
) -> Result<(), TransformError> {
  if child.ast.is_some() {
    generate.materialize(child, tctx)?;
  }
  Ok(())
}

/// Look the child up in the cache entry by content hash and hand back the
/// first match that survives: its recorded connected files still hash the
/// same and its committed content reads back. Matches are screened one by
/// one, and a single child only ever reuses a single cached asset.
fn reuse_cached_assets(
  entry: &CacheEntry,
  child: &InternalAsset,
  ctx: &TransformCtx<'_>,
) -> Option<InternalAsset> {
  let pool = entry.initial_assets.as_ref().unwrap_or(&entry.assets);
  let matches = pool.iter().filter(|cached| cached.hash == child.asset.hash);
  for cached in matches {
    if !ctx.store.check_connected_files(&cached.connected_files) {
      continue;
    }
    match rehydrate(cached, ctx) {
      Ok(asset) => return Some(asset),
      Err(err) => {
        tracing::debug!("cached asset readback failed, re-running: {err}");
      }
    }
  }
  None
}

fn rehydrate(cached: &Asset, ctx: &TransformCtx<'_>) -> Result<InternalAsset, TransformError> {
  let content = ctx.store.read_blob(&cached.content_key)?;
  let map = match &cached.map_key {
    Some(key) => Some(SourceMap(ctx.store.read_blob(key)?)),
    None => None,
  };
  Ok(InternalAsset {
    asset: cached.clone(),
    content: Content::Blob(content),
    map,
    ast: None,
  })
}
