mod satchel;

pub use satchel::Satchel;
pub use satchel_core::requests::asset_request::AssetRequest;
pub use satchel_core::{
  BuildOptions, BuildPhase, Cache, CacheRef, FsCache, InMemoryCache, PipelineMap, PluginNode,
  Plugins, ReporterEvent, ReporterPlugin, Resolver, ResolverRef,
};
pub use satchel_filesystem::{FileSystem, FileSystemRef, InMemoryFileSystem, OsFileSystem};
