use crate::fingerprint::fingerprint;
use crate::request_tracker::{Request, RequestId, RequestOutput, RunRequestContext};
use crate::transformation::PluginConfig;

/// Installs the invalidation edges behind a configuration a transformer
/// loaded: the resolved file, every included file, the watch glob, and the
/// startup flag.
#[derive(Debug)]
pub struct ConfigRequest {
  pub config: PluginConfig,
}

impl Request for ConfigRequest {
  fn id(&self) -> RequestId {
    format!("config_request:{}", fingerprint(&self.config))
  }

  fn run(&self, ctx: &mut RunRequestContext<'_>) -> anyhow::Result<RequestOutput> {
    let config = &self.config;
    if let Some(path) = &config.resolved_path {
      ctx.invalidate_on_file_update(path.clone());
    }
    for file in &config.included_files {
      ctx.invalidate_on_file_update(file.clone());
      ctx.invalidate_on_file_delete(file.clone());
    }
    if let Some(glob) = &config.watch_glob {
      ctx.invalidate_on_file_create(glob.clone());
    }
    if config.should_invalidate_on_startup {
      ctx.invalidate_on_startup();
    }
    Ok(RequestOutput::Config(config.clone()))
  }
}
