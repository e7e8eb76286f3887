mod request_tracker;

use std::path::PathBuf;

use thiserror::Error;

pub use request_tracker::{RequestTracker, RunRequestContext};

use crate::requests::asset_request::AssetRequestResult;
use crate::requests::plugin_config_request::PluginConfigResult;
use crate::transformation::PluginConfig;

/// Stable, content-derived identifier of a request, namespaced by kind
/// (`asset_request:…`, `config_request:…`, `version_request:…`).
pub type RequestId = String;

/// A fine-grained invalidation edge recorded by a request. Edges form a
/// set, so re-registering one is harmless.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Invalidation {
  FileUpdate(PathBuf),
  FileDelete(PathBuf),
  FileCreateGlob(String),
  Startup,
}

/// One entry of the filesystem-change journal consumed at the start of a
/// build.
#[derive(Clone, Debug)]
pub enum FileEvent {
  Updated(PathBuf),
  Deleted(PathBuf),
  Created(PathBuf),
}

/// The result of any request kind the graph can hold.
#[derive(Clone, Debug)]
pub enum RequestOutput {
  Assets(AssetRequestResult),
  PluginConfig(PluginConfigResult),
  Config(PluginConfig),
  Version(String),
}

impl RequestOutput {
  pub fn into_assets(self) -> anyhow::Result<AssetRequestResult> {
    match self {
      RequestOutput::Assets(result) => Ok(result),
      other => Err(anyhow::anyhow!("expected an asset result, got {other:?}")),
    }
  }

  pub fn into_plugin_config(self) -> anyhow::Result<PluginConfigResult> {
    match self {
      RequestOutput::PluginConfig(result) => Ok(result),
      other => Err(anyhow::anyhow!(
        "expected a plugin config result, got {other:?}"
      )),
    }
  }

  pub fn into_version(self) -> anyhow::Result<String> {
    match self {
      RequestOutput::Version(stamp) => Ok(stamp),
      other => Err(anyhow::anyhow!("expected a version stamp, got {other:?}")),
    }
  }
}

/// A keyed, memoized unit of work. `run` re-executes only when the node is
/// unknown or invalidated; otherwise the recorded result is returned.
pub trait Request {
  fn id(&self) -> RequestId;

  fn run(&self, ctx: &mut RunRequestContext<'_>) -> anyhow::Result<RequestOutput>;
}

/// `run_request` re-entered its own id: A ran B which ran A again.
#[derive(Clone, Debug, Error)]
#[error("request cycle detected at {0}")]
pub struct RequestCycle(pub RequestId);
