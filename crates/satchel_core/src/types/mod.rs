mod asset;
mod content;
mod dependency;
mod environment;
mod json;

pub use asset::{Asset, AssetFlags, AssetStats, ConnectedFile, FileType, SourceMap};
pub use content::Content;
pub use dependency::{Dependency, DependencyFlags, Priority, SpecifierType};
pub use environment::{
  Engines, Environment, EnvironmentContext, EnvironmentFlags, OutputFormat, SourceType,
};
pub use json::JSONObject;

/// Serializes bitflags as their raw bits.
#[macro_export]
macro_rules! bitflags_serde {
  ($t: ty) => {
    impl serde::Serialize for $t {
      fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
      where
        S: serde::Serializer,
      {
        self.bits().serialize(serializer)
      }
    }

    impl<'de> serde::Deserialize<'de> for $t {
      fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
      where
        D: serde::Deserializer<'de>,
      {
        let bits = serde::Deserialize::deserialize(deserializer)?;
        <$t>::from_bits(bits).ok_or_else(|| serde::de::Error::custom("invalid flag bits"))
      }
    }
  };
}
