//! Config Loader: resolves the discovery configuration from environment
//! variables, config files and built-in defaults, merged field by field.

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::ConfigError;
pub use loader::{expand_path, load_config, load_config_with};
pub use types::{merge_configs, DiscoveryConfig, EnvSource, ManifestSearch, PartialDiscoveryConfig};
