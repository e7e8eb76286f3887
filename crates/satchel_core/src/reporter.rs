use std::path::PathBuf;

/// Fire-and-forget telemetry events emitted while a build runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReporterEvent {
  BuildStart,
  BuildProgress {
    phase: BuildPhase,
    file_path: PathBuf,
  },
  BuildSuccess,
  BuildFailure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildPhase {
  Transforming,
}

pub trait ReporterPlugin: Send + Sync {
  fn report(&self, event: &ReporterEvent) -> Result<(), anyhow::Error>;
}

/// Fans a single event out to every registered reporter. A failing reporter
/// does not stop delivery to the others; the first error is returned to the
/// caller, which logs it and continues the build.
pub struct CompositeReporterPlugin {
  reporters: Vec<Box<dyn ReporterPlugin>>,
}

impl CompositeReporterPlugin {
  pub fn new(reporters: Vec<Box<dyn ReporterPlugin>>) -> Self {
    CompositeReporterPlugin { reporters }
  }
}

impl ReporterPlugin for CompositeReporterPlugin {
  fn report(&self, event: &ReporterEvent) -> Result<(), anyhow::Error> {
    let mut first_error = None;
    for reporter in &self.reporters {
      if let Err(err) = reporter.report(event) {
        first_error.get_or_insert(err);
      }
    }
    match first_error {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}
