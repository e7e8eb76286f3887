use std::path::PathBuf;

use crate::request_tracker::{Request, RequestId, RequestOutput, RunRequestContext};

/// Resolves the loaded plugin configuration for the build and hands back
/// the serializable cache path workers use to reload it out of process.
#[derive(Debug)]
pub struct PluginConfigRequest;

#[derive(Clone, Debug)]
pub struct PluginConfigResult {
  pub cache_path: PathBuf,
}

impl Request for PluginConfigRequest {
  fn id(&self) -> RequestId {
    "plugin_config_request".into()
  }

  fn run(&self, ctx: &mut RunRequestContext<'_>) -> anyhow::Result<RequestOutput> {
    let plugins = ctx.plugins();
    match &plugins.config_path {
      Some(path) => {
        ctx.invalidate_on_file_update(path.clone());
        ctx.invalidate_on_file_delete(path.clone());
      }
      // With no config file on disk there is nothing to watch, so the
      // configuration is re-checked once per process.
      None => ctx.invalidate_on_startup(),
    }
    Ok(RequestOutput::PluginConfig(PluginConfigResult {
      cache_path: plugins.cache_path.clone(),
    }))
  }
}
