use std::path::PathBuf;

use crate::fingerprint::{fingerprint, fingerprint_bytes};
use crate::request_tracker::{Request, RequestId, RequestOutput, RunRequestContext};
use crate::transformation::TransformError;

/// Tracks the installed version of a dev dependency a configuration relies
/// on. The stamp is opaque; it only has to change when the dependency does.
#[derive(Debug)]
pub struct VersionRequest {
  pub module_specifier: String,

  /// The resolved config path stands in for the nearest package boundary.
  pub resolve_from: Option<PathBuf>,
}

impl Request for VersionRequest {
  fn id(&self) -> RequestId {
    format!(
      "version_request:{}",
      fingerprint(&(&self.module_specifier, &self.resolve_from))
    )
  }

  fn run(&self, ctx: &mut RunRequestContext<'_>) -> anyhow::Result<RequestOutput> {
    let options = ctx.options();
    if let Some(lock_file) = &options.lock_file {
      ctx.invalidate_on_file_update(lock_file.clone());
    }

    let plugins = ctx.plugins();
    let from = self
      .resolve_from
      .clone()
      .unwrap_or_else(|| options.project_root.clone());
    let manifest = format!("{}/package.json", self.module_specifier);
    let stamp = match plugins.resolver.resolve(&from, &manifest) {
      Ok(manifest_path) => {
        ctx.invalidate_on_file_update(manifest_path.clone());
        let bytes = options
          .input_fs
          .read(&manifest_path)
          .map_err(|source| TransformError::Io {
            path: manifest_path.clone(),
            source,
          })?;
        serde_json::from_slice::<serde_json::Value>(&bytes)
          .ok()
          .and_then(|manifest| {
            manifest
              .get("version")
              .and_then(|version| version.as_str())
              .map(str::to_owned)
          })
          .unwrap_or_else(|| fingerprint_bytes(&bytes))
      }
      Err(_) => {
        // An unresolvable dependency is re-checked every startup instead
        // of failing the build.
        ctx.invalidate_on_startup();
        "unresolved".to_owned()
      }
    };

    Ok(RequestOutput::Version(stamp))
  }
}
