//! Configuration for the weave dependency-injection engine.
//!
//! A `WeaveConfig` names the directories to scan, the marker types and
//! decorators the extractor recognizes, the active resolution profiles and the
//! runtime functions the transformer emits calls to.

pub mod config;
pub mod discovery;
pub mod error;
pub mod loading;
pub mod validation;

pub use config::*;
pub use error::*;

pub use discovery::{ConfigDiscovery, discover, discover_with_profile};
pub use loading::{ConfigSource, ENV_PREFIX};
pub use validation::{
    ConfigValidator, FsValidator, SchemaValidator, is_identifier, validate_fs, validate_schema,
};
