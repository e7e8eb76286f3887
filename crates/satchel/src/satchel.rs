use std::sync::Arc;

use satchel_core::options::BuildOptions;
use satchel_core::plugins::Plugins;
use satchel_core::reporter::{ReporterEvent, ReporterPlugin};
use satchel_core::request_tracker::{FileEvent, RequestOutput, RequestTracker};
use satchel_core::requests::asset_request::AssetRequest;
use satchel_core::types::Asset;
use satchel_core::worker_farm::WorkerFarm;
use satchel_core::FsCache;
use satchel_filesystem::{FileSystemRef, OsFileSystem};

/// The build entry: owns the filesystem, options, plugin configuration, and
/// the request graph that memoizes work across builds.
pub struct Satchel {
  tracker: RequestTracker,
}

impl Satchel {
  /// Build against the OS filesystem with an on-disk cache.
  pub fn new(
    fs: Option<FileSystemRef>,
    plugins: Plugins,
    reporters: Vec<Box<dyn ReporterPlugin>>,
  ) -> Self {
    let fs = fs.unwrap_or_else(|| Arc::new(OsFileSystem::default()));
    let mut options = BuildOptions::new(fs);
    options.cache = Arc::new(FsCache::new(options.cache_dir.clone()));
    Self::with_options(options, plugins, reporters, None)
  }

  pub fn with_options(
    options: BuildOptions,
    plugins: Plugins,
    reporters: Vec<Box<dyn ReporterPlugin>>,
    farm: Option<WorkerFarm>,
  ) -> Self {
    let tracker = RequestTracker::new(
      Arc::new(options),
      Arc::new(plugins),
      reporters,
      farm.map(Arc::new),
    );
    Satchel { tracker }
  }

  /// Feed the filesystem-change journal collected since the last build.
  /// Returns whether any request was invalidated.
  pub fn respond_to_fs_events(&mut self, events: &[FileEvent]) -> bool {
    self.tracker.respond_to_fs_events(events)
  }

  /// Re-run requests that asked to be re-checked on process startup. Call
  /// once, before the first build of a process that restored state.
  pub fn invalidate_startup_requests(&mut self) {
    self.tracker.invalidate_startup_requests();
  }

  /// Transform one source file (or inline snippet) and return its assets.
  /// Unchanged requests are served from the request graph and the
  /// content-addressed cache without running any transformer.
  pub fn run_asset_request(&mut self, request: AssetRequest) -> anyhow::Result<Vec<Asset>> {
    self.tracker.report(ReporterEvent::BuildStart);
    let result = self
      .tracker
      .run_request(&request)
      .and_then(RequestOutput::into_assets);
    match result {
      Ok(result) => {
        self.tracker.report(ReporterEvent::BuildSuccess);
        Ok(result.assets)
      }
      Err(err) => {
        tracing::error!("asset request failed: {err:#}");
        self.tracker.report(ReporterEvent::BuildFailure);
        Err(err)
      }
    }
  }
}
