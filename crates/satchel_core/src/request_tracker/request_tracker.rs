use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use glob_match::glob_match;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::Direction;

use super::{FileEvent, Invalidation, Request, RequestCycle, RequestId, RequestOutput};
use crate::asset_store::AssetStore;
use crate::options::BuildOptions;
use crate::plugins::Plugins;
use crate::reporter::{CompositeReporterPlugin, ReporterEvent, ReporterPlugin};
use crate::worker_farm::WorkerFarm;

enum RequestNode {
  Root,
  /// Currently executing. Re-entry before completion is a cycle.
  Incomplete,
  /// Known but dirty: must re-run before its result can be served.
  Invalidated,
  Error(String),
  Valid {
    result: RequestOutput,
    invalidations: HashSet<Invalidation>,
  },
}

#[derive(Clone, Copy, Debug)]
enum RequestEdgeType {
  SubRequest,
}

type RequestGraph = StableDiGraph<RequestNode, RequestEdgeType>;

/// The request-graph scheduler. Tracks request nodes by id, records the
/// invalidation edges each run emits, and serves unchanged nodes from
/// memory.
pub struct RequestTracker {
  graph: RequestGraph,
  request_index: HashMap<RequestId, NodeIndex>,
  reporter: CompositeReporterPlugin,
  options: Arc<BuildOptions>,
  store: Arc<AssetStore>,
  plugins: Arc<Plugins>,
  farm: Option<Arc<WorkerFarm>>,
}

impl RequestTracker {
  pub fn new(
    options: Arc<BuildOptions>,
    plugins: Arc<Plugins>,
    reporters: Vec<Box<dyn ReporterPlugin>>,
    farm: Option<Arc<WorkerFarm>>,
  ) -> Self {
    let mut graph = RequestGraph::new();
    graph.add_node(RequestNode::Root);
    let store = Arc::new(AssetStore::new(
      options.cache.clone(),
      options.input_fs.clone(),
    ));
    RequestTracker {
      graph,
      request_index: HashMap::new(),
      reporter: CompositeReporterPlugin::new(reporters),
      options,
      store,
      plugins,
      farm,
    }
  }

  pub fn report(&self, event: ReporterEvent) {
    if let Err(err) = self.reporter.report(&event) {
      tracing::error!("reporter failed: {err}");
    }
  }

  pub fn store(&self) -> &Arc<AssetStore> {
    &self.store
  }

  /// Run a request that has no parent and return its result.
  pub fn run_request(&mut self, request: &impl Request) -> anyhow::Result<RequestOutput> {
    self.run_child_request(request, None)
  }

  pub(crate) fn run_child_request(
    &mut self,
    request: &impl Request,
    parent: Option<&RequestId>,
  ) -> anyhow::Result<RequestOutput> {
    let request_id = request.id();

    if self.prepare_request(&request_id)? {
      let mut invalidations = HashSet::new();
      let result = {
        let mut ctx = RunRequestContext {
          request_id: request_id.clone(),
          tracker: self,
          invalidations: &mut invalidations,
        };
        request.run(&mut ctx)
      };
      match result {
        Ok(output) => self.store_request(&request_id, output, invalidations),
        Err(err) => {
          // The node stays unresolved and edges registered before the
          // failure are discarded; the next run retries.
          self.store_error(&request_id, format!("{err:#}"));
          self.link_request(parent, &request_id);
          return Err(err);
        }
      }
    }

    self.link_request(parent, &request_id);
    self.cached_result(&request_id)
  }

  /// Before a request runs, its node is marked in progress. Returns false
  /// when a valid result can be served instead.
  fn prepare_request(&mut self, request_id: &RequestId) -> anyhow::Result<bool> {
    let node_index = match self.request_index.get(request_id) {
      Some(index) => *index,
      None => {
        let index = self.graph.add_node(RequestNode::Incomplete);
        self.request_index.insert(request_id.clone(), index);
        return Ok(true);
      }
    };

    let node = self
      .graph
      .node_weight_mut(node_index)
      .ok_or_else(|| anyhow!("missing node for request {request_id}"))?;
    match node {
      RequestNode::Valid { .. } => Ok(false),
      RequestNode::Incomplete => Err(RequestCycle(request_id.clone()).into()),
      _ => {
        // A re-run clears the previous edges and result.
        *node = RequestNode::Incomplete;
        Ok(true)
      }
    }
  }

  fn store_request(
    &mut self,
    request_id: &RequestId,
    result: RequestOutput,
    invalidations: HashSet<Invalidation>,
  ) {
    if let Some(node) = self
      .request_index
      .get(request_id)
      .and_then(|index| self.graph.node_weight_mut(*index))
    {
      *node = RequestNode::Valid {
        result,
        invalidations,
      };
    }
  }

  fn store_error(&mut self, request_id: &RequestId, message: String) {
    if let Some(node) = self
      .request_index
      .get(request_id)
      .and_then(|index| self.graph.node_weight_mut(*index))
    {
      *node = RequestNode::Error(message);
    }
  }

  /// Record that `parent` (or the root) invoked `request_id`.
  fn link_request(&mut self, parent: Option<&RequestId>, request_id: &RequestId) {
    let Some(child) = self.request_index.get(request_id).copied() else {
      return;
    };
    let parent = parent
      .and_then(|id| self.request_index.get(id).copied())
      .unwrap_or_else(|| NodeIndex::new(0));
    self.graph.update_edge(parent, child, RequestEdgeType::SubRequest);
  }

  fn cached_result(&self, request_id: &RequestId) -> anyhow::Result<RequestOutput> {
    let node = self
      .request_index
      .get(request_id)
      .and_then(|index| self.graph.node_weight(*index))
      .ok_or_else(|| anyhow!("missing node for request {request_id}"))?;
    match node {
      RequestNode::Valid { result, .. } => Ok(result.clone()),
      RequestNode::Error(message) => Err(anyhow!("{message}")),
      _ => Err(anyhow!("request {request_id} has no result")),
    }
  }

  /// Consume the filesystem-change journal: nodes whose edges match an
  /// event become dirty, along with all their ancestors. Returns whether
  /// anything was invalidated.
  pub fn respond_to_fs_events(&mut self, events: &[FileEvent]) -> bool {
    let dirty: Vec<NodeIndex> = self
      .graph
      .node_indices()
      .filter(|index| match self.graph.node_weight(*index) {
        Some(RequestNode::Valid { invalidations, .. }) => events
          .iter()
          .any(|event| event_matches(invalidations, event)),
        _ => false,
      })
      .collect();

    let invalidated = !dirty.is_empty();
    for index in dirty {
      self.invalidate_node(index);
    }
    invalidated
  }

  /// Dirty every node that registered a startup invalidation. Called once
  /// per process, before the first build.
  pub fn invalidate_startup_requests(&mut self) {
    let dirty: Vec<NodeIndex> = self
      .graph
      .node_indices()
      .filter(|index| {
        matches!(
          self.graph.node_weight(*index),
          Some(RequestNode::Valid { invalidations, .. })
            if invalidations.contains(&Invalidation::Startup)
        )
      })
      .collect();
    for index in dirty {
      self.invalidate_node(index);
    }
  }

  fn invalidate_node(&mut self, index: NodeIndex) {
    let mut stack = vec![index];
    while let Some(index) = stack.pop() {
      let Some(node) = self.graph.node_weight_mut(index) else {
        continue;
      };
      match node {
        RequestNode::Valid { .. } => *node = RequestNode::Invalidated,
        _ => continue,
      }
      let parents: Vec<NodeIndex> = self
        .graph
        .neighbors_directed(index, Direction::Incoming)
        .collect();
      stack.extend(parents);
    }
  }
}

fn event_matches(invalidations: &HashSet<Invalidation>, event: &FileEvent) -> bool {
  match event {
    FileEvent::Updated(path) => {
      invalidations.contains(&Invalidation::FileUpdate(path.clone()))
    }
    FileEvent::Deleted(path) => {
      invalidations.contains(&Invalidation::FileDelete(path.clone()))
    }
    FileEvent::Created(path) => invalidations.iter().any(|invalidation| {
      matches!(
        invalidation,
        Invalidation::FileCreateGlob(glob) if glob_match(glob, &path.to_string_lossy())
      )
    }),
  }
}

/// The API surface a running request sees: invalidation registration and
/// child-request execution. Edges collect here and are stored atomically
/// with the request's success.
pub struct RunRequestContext<'a> {
  request_id: RequestId,
  tracker: &'a mut RequestTracker,
  invalidations: &'a mut HashSet<Invalidation>,
}

impl RunRequestContext<'_> {
  pub fn invalidate_on_file_update(&mut self, path: impl Into<PathBuf>) {
    self.invalidations.insert(Invalidation::FileUpdate(path.into()));
  }

  pub fn invalidate_on_file_delete(&mut self, path: impl Into<PathBuf>) {
    self.invalidations.insert(Invalidation::FileDelete(path.into()));
  }

  pub fn invalidate_on_file_create(&mut self, glob: impl Into<String>) {
    self
      .invalidations
      .insert(Invalidation::FileCreateGlob(glob.into()));
  }

  pub fn invalidate_on_startup(&mut self) {
    self.invalidations.insert(Invalidation::Startup);
  }

  /// Run a child request. Its result is recorded before this request's
  /// own, and the graph links the two for invalidation propagation.
  pub fn run_request(&mut self, request: &impl Request) -> anyhow::Result<RequestOutput> {
    let parent = self.request_id.clone();
    self.tracker.run_child_request(request, Some(&parent))
  }

  pub fn report(&self, event: ReporterEvent) {
    self.tracker.report(event);
  }

  pub fn options(&self) -> Arc<BuildOptions> {
    self.tracker.options.clone()
  }

  pub fn store(&self) -> Arc<AssetStore> {
    self.tracker.store.clone()
  }

  pub fn plugins(&self) -> Arc<Plugins> {
    self.tracker.plugins.clone()
  }

  pub fn farm(&self) -> Option<Arc<WorkerFarm>> {
    self.tracker.farm.clone()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  use super::*;

  fn tracker() -> RequestTracker {
    let options = Arc::new(BuildOptions::default());
    let plugins = Arc::new(Plugins::new(
      crate::plugins::PipelineMap::new(),
      Arc::new(crate::plugins::NoopResolver),
    ));
    RequestTracker::new(options, plugins, Vec::new(), None)
  }

  struct CountingRequest {
    id: RequestId,
    runs: Arc<AtomicUsize>,
    invalidations: Vec<Invalidation>,
    child: Option<Box<CountingRequest>>,
    fail: bool,
  }

  impl CountingRequest {
    fn new(id: &str, runs: Arc<AtomicUsize>) -> Self {
      CountingRequest {
        id: id.to_owned(),
        runs,
        invalidations: Vec::new(),
        child: None,
        fail: false,
      }
    }
  }

  impl Request for CountingRequest {
    fn id(&self) -> RequestId {
      self.id.clone()
    }

    fn run(&self, ctx: &mut RunRequestContext<'_>) -> anyhow::Result<RequestOutput> {
      self.runs.fetch_add(1, Ordering::SeqCst);
      for invalidation in &self.invalidations {
        match invalidation {
          Invalidation::FileUpdate(path) => ctx.invalidate_on_file_update(path.clone()),
          Invalidation::FileDelete(path) => ctx.invalidate_on_file_delete(path.clone()),
          Invalidation::FileCreateGlob(glob) => ctx.invalidate_on_file_create(glob.clone()),
          Invalidation::Startup => ctx.invalidate_on_startup(),
        }
      }
      if let Some(child) = &self.child {
        ctx.run_request(child.as_ref())?;
      }
      if self.fail {
        anyhow::bail!("boom");
      }
      Ok(RequestOutput::Version(format!(
        "run {}",
        self.runs.load(Ordering::SeqCst)
      )))
    }
  }

  struct SelfCycle;

  impl Request for SelfCycle {
    fn id(&self) -> RequestId {
      "cycle".into()
    }

    fn run(&self, ctx: &mut RunRequestContext<'_>) -> anyhow::Result<RequestOutput> {
      ctx.run_request(&SelfCycle)
    }
  }

  #[test]
  fn second_run_is_served_from_memory() {
    let mut tracker = tracker();
    let runs = Arc::new(AtomicUsize::new(0));
    let request = CountingRequest::new("a", runs.clone());

    let first = tracker.run_request(&request).unwrap().into_version().unwrap();
    let second = tracker.run_request(&request).unwrap().into_version().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
  }

  #[test]
  fn matching_fs_event_re_runs_the_request() {
    let mut tracker = tracker();
    let runs = Arc::new(AtomicUsize::new(0));
    let mut request = CountingRequest::new("a", runs.clone());
    request.invalidations = vec![Invalidation::FileUpdate("/src/a.js".into())];

    tracker.run_request(&request).unwrap();
    assert!(!tracker.respond_to_fs_events(&[FileEvent::Updated("/other.js".into())]));
    tracker.run_request(&request).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert!(tracker.respond_to_fs_events(&[FileEvent::Updated("/src/a.js".into())]));
    tracker.run_request(&request).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn delete_and_create_events_match_their_edges() {
    let mut tracker = tracker();
    let deletes = Arc::new(AtomicUsize::new(0));
    let mut delete_request = CountingRequest::new("del", deletes.clone());
    delete_request.invalidations = vec![Invalidation::FileDelete("/src/a.js".into())];

    let globs = Arc::new(AtomicUsize::new(0));
    let mut glob_request = CountingRequest::new("glob", globs.clone());
    glob_request.invalidations = vec![Invalidation::FileCreateGlob("/src/**/*.ts".into())];

    tracker.run_request(&delete_request).unwrap();
    tracker.run_request(&glob_request).unwrap();

    // An update matches neither edge.
    assert!(!tracker.respond_to_fs_events(&[FileEvent::Updated("/src/a.js".into())]));

    assert!(tracker.respond_to_fs_events(&[FileEvent::Deleted("/src/a.js".into())]));
    assert!(tracker.respond_to_fs_events(&[FileEvent::Created("/src/lib/b.ts".into())]));
    tracker.run_request(&delete_request).unwrap();
    tracker.run_request(&glob_request).unwrap();
    assert_eq!(deletes.load(Ordering::SeqCst), 2);
    assert_eq!(globs.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn invalidation_dirties_ancestors() {
    let mut tracker = tracker();
    let parent_runs = Arc::new(AtomicUsize::new(0));
    let child_runs = Arc::new(AtomicUsize::new(0));

    let mut child = CountingRequest::new("child", child_runs.clone());
    child.invalidations = vec![Invalidation::FileUpdate("/dep.js".into())];
    let mut parent = CountingRequest::new("parent", parent_runs.clone());
    parent.child = Some(Box::new(child));

    tracker.run_request(&parent).unwrap();
    assert!(tracker.respond_to_fs_events(&[FileEvent::Updated("/dep.js".into())]));
    tracker.run_request(&parent).unwrap();

    assert_eq!(parent_runs.load(Ordering::SeqCst), 2);
    assert_eq!(child_runs.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn startup_invalidation_re_runs_exactly_its_nodes() {
    let mut tracker = tracker();
    let startup_runs = Arc::new(AtomicUsize::new(0));
    let stable_runs = Arc::new(AtomicUsize::new(0));

    let mut startup = CountingRequest::new("startup", startup_runs.clone());
    startup.invalidations = vec![Invalidation::Startup];
    let stable = CountingRequest::new("stable", stable_runs.clone());

    tracker.run_request(&startup).unwrap();
    tracker.run_request(&stable).unwrap();
    tracker.invalidate_startup_requests();
    tracker.run_request(&startup).unwrap();
    tracker.run_request(&stable).unwrap();

    assert_eq!(startup_runs.load(Ordering::SeqCst), 2);
    assert_eq!(stable_runs.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn failed_requests_retry_and_discard_edges() {
    let mut tracker = tracker();
    let runs = Arc::new(AtomicUsize::new(0));
    let mut request = CountingRequest::new("flaky", runs.clone());
    request.invalidations = vec![Invalidation::FileUpdate("/src/a.js".into())];
    request.fail = true;

    assert!(tracker.run_request(&request).is_err());
    // No result was stored, so edges from the failed run must not fire.
    assert!(!tracker.respond_to_fs_events(&[FileEvent::Updated("/src/a.js".into())]));

    request.fail = false;
    tracker.run_request(&request).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn cycles_fail_with_a_typed_error() {
    let mut tracker = tracker();
    let err = tracker.run_request(&SelfCycle).unwrap_err();
    assert!(err.downcast_ref::<RequestCycle>().is_some());
  }
}
