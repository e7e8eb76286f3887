use std::path::PathBuf;

use crate::fingerprint::fingerprint;
use crate::reporter::{BuildPhase, ReporterEvent};
use crate::request_tracker::{Request, RequestId, RequestOutput, RunRequestContext};
use crate::requests::config_request::ConfigRequest;
use crate::requests::plugin_config_request::PluginConfigRequest;
use crate::requests::version_request::VersionRequest;
use crate::transformation::{run_transform, TransformError, TransformRequest};
use crate::types::{Asset, Environment};
use crate::worker_farm::{WorkerRequest, WorkerResult};

/// The public entry of the transformation core: transform one source file
/// (or inline snippet) under an environment, registering every discovered
/// invalidation along the way.
#[derive(Clone, Debug, Hash)]
pub struct AssetRequest {
  pub file_path: PathBuf,

  /// Inline source. When set, the request is identified by content and the
  /// cache is bypassed.
  pub code: Option<Vec<u8>>,

  pub env: Environment,

  pub side_effects: bool,

  /// Named pipeline hint.
  pub pipeline: Option<String>,
}

impl AssetRequest {
  pub fn new(file_path: impl Into<PathBuf>, env: Environment) -> Self {
    AssetRequest {
      file_path: file_path.into(),
      code: None,
      env,
      side_effects: true,
      pipeline: None,
    }
  }
}

#[derive(Clone, Debug)]
pub struct AssetRequestResult {
  pub assets: Vec<Asset>,
}

impl Request for AssetRequest {
  fn id(&self) -> RequestId {
    // The shared process options are deliberately not part of the identity.
    format!("asset_request:{}", fingerprint(self))
  }

  fn run(&self, ctx: &mut RunRequestContext<'_>) -> anyhow::Result<RequestOutput> {
    let options = ctx.options();

    let real_path = options
      .input_fs
      .canonicalize(&self.file_path)
      .unwrap_or_else(|_| self.file_path.clone());
    ctx.invalidate_on_file_update(real_path);

    ctx.report(ReporterEvent::BuildProgress {
      phase: BuildPhase::Transforming,
      file_path: self.file_path.clone(),
    });

    let config = ctx.run_request(&PluginConfigRequest)?.into_plugin_config()?;

    let request = TransformRequest {
      file_path: self.file_path.clone(),
      code: self.code.clone(),
      env: self.env.clone(),
      side_effects: self.side_effects,
      pipeline: self.pipeline.clone(),
    };
    let result = match ctx.farm() {
      Some(farm) => {
        let WorkerResult::Transform(result) = farm
          .run(WorkerRequest::Transform {
            config_cache_path: config.cache_path,
            request,
          })
          .map_err(TransformError::Worker)?;
        result
      }
      None => {
        let plugins = ctx.plugins();
        let store = ctx.store();
        run_transform(&request, &plugins, &options, &store)?
      }
    };

    let assets = result.assets;
    for asset in &assets {
      for file in &asset.connected_files {
        ctx.invalidate_on_file_update(file.file_path.clone());
        ctx.invalidate_on_file_delete(file.file_path.clone());
      }
    }

    for config_request in result.config_requests {
      let dev_deps = config_request.dev_deps.clone();
      let resolve_from = config_request.resolved_path.clone();
      ctx.run_request(&ConfigRequest {
        config: config_request,
      })?;
      for specifier in dev_deps {
        ctx.run_request(&VersionRequest {
          module_specifier: specifier,
          resolve_from: resolve_from.clone(),
        })?;
      }
    }

    Ok(RequestOutput::Assets(AssetRequestResult { assets }))
  }
}
