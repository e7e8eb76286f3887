pub mod asset_store;
pub mod cache;
pub mod fingerprint;
pub mod options;
pub mod plugins;
pub mod reporter;
pub mod request_tracker;
pub mod requests;
pub mod transformation;
pub mod types;
pub mod worker_farm;

pub use asset_store::{AssetStore, CacheEntry};
pub use cache::{Cache, CacheRef, FsCache, InMemoryCache};
pub use options::BuildOptions;
pub use plugins::{PipelineMap, PluginNode, Plugins, Resolver, ResolverRef};
pub use reporter::{BuildPhase, CompositeReporterPlugin, ReporterEvent, ReporterPlugin};
pub use request_tracker::RequestTracker;
pub use transformation::TransformError;
