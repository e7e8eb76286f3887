use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Sender};
use thiserror::Error;

use crate::asset_store::AssetStore;
use crate::options::BuildOptions;
use crate::plugins::Plugins;
use crate::transformation::{run_transform, TransformRequest, TransformationResult};

/// A request dispatched to the farm. Inputs must be side-effect free and
/// structurally serializable: workers reload configuration from
/// `config_cache_path` rather than receiving live plugin objects.
#[derive(Clone, Debug)]
pub enum WorkerRequest {
  Transform {
    config_cache_path: PathBuf,
    request: TransformRequest,
  },
}

#[derive(Clone, Debug)]
pub enum WorkerResult {
  Transform(TransformationResult),
}

/// An exception raised inside the farm, propagated as the request's result.
#[derive(Clone, Debug, Error)]
#[error("worker failed: {0}")]
pub struct WorkerError(pub String);

pub trait Worker: Send + Sync {
  fn run(&self, request: WorkerRequest) -> Result<WorkerResult, WorkerError>;
}

/// Round-robin dispatch over registered workers.
#[derive(Default)]
pub struct WorkerFarm {
  workers: Vec<Arc<dyn Worker>>,
  next: AtomicUsize,
}

impl WorkerFarm {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, worker: Arc<dyn Worker>) {
    self.workers.push(worker);
  }

  pub fn run(&self, request: WorkerRequest) -> Result<WorkerResult, WorkerError> {
    if self.workers.is_empty() {
      return Err(WorkerError("no workers registered".into()));
    }
    let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
    self.workers[index].run(request)
  }
}

/// Runs transformations on the calling thread. The plugin configuration is
/// already loaded, so `config_cache_path` is not consulted.
pub struct InProcessWorker {
  plugins: Arc<Plugins>,
  options: Arc<BuildOptions>,
  store: Arc<AssetStore>,
}

impl InProcessWorker {
  pub fn new(plugins: Arc<Plugins>, options: Arc<BuildOptions>, store: Arc<AssetStore>) -> Self {
    InProcessWorker {
      plugins,
      options,
      store,
    }
  }
}

impl Worker for InProcessWorker {
  fn run(&self, request: WorkerRequest) -> Result<WorkerResult, WorkerError> {
    match request {
      WorkerRequest::Transform { request, .. } => {
        let result = run_transform(&request, &self.plugins, &self.options, &self.store)
          .map_err(|err| WorkerError(format!("{err:#}")))?;
        Ok(WorkerResult::Transform(result))
      }
    }
  }
}

type Job = (
  WorkerRequest,
  Sender<Result<WorkerResult, WorkerError>>,
);

/// Moves another worker onto a dedicated thread, preserving its results.
pub struct ThreadedWorker {
  sender: Sender<Job>,
}

impl ThreadedWorker {
  pub fn spawn(worker: Arc<dyn Worker>) -> Self {
    let (sender, receiver) = unbounded::<Job>();
    std::thread::spawn(move || {
      for (request, reply) in receiver {
        let _ = reply.send(worker.run(request));
      }
    });
    ThreadedWorker { sender }
  }
}

impl Worker for ThreadedWorker {
  fn run(&self, request: WorkerRequest) -> Result<WorkerResult, WorkerError> {
    let (reply, response) = unbounded();
    self
      .sender
      .send((request, reply))
      .map_err(|_| WorkerError("worker thread exited".into()))?;
    response
      .recv()
      .map_err(|_| WorkerError("worker thread dropped the reply".into()))?
  }
}
