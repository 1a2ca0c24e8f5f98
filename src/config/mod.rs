//! Stage-aware configuration materialization
//!
//! This module builds a flat, typed key-value store per deployment stage from
//! layered templates.
//!
//! # Layer Priority (lowest to highest)
//! 1. `initial` - Stage-independent defaults
//! 2. `env` - Stage overlay (keyed by stage name or abbreviation when nested)
//! 3. `overwrites` - Final caller overrides
//!
//! Keys set by the `consts` layer are written first and win over every later
//! layer.

pub mod env_source;
pub mod error;
pub mod factory;
pub mod merge;
pub mod options;
pub mod registry;
pub mod stage;
pub mod store;
pub mod value;


// Re-export public types
pub use env_source::{EnvSource, ProcessEnv, STAGE_VARS};
pub use error::{ConfigError, ConfigErrorKind};
pub use factory::{ConfigContext, StageHint};
pub use merge::{Layers, MergeEngine, Merged};
pub use options::FactoryOptions;
pub use registry::{FALLBACK_STAGE, RESERVED_NAMES, StageRegistry};
pub use stage::{Stage, StageDescriptor, default_stages};
pub use store::{ConfigStore, Entry, Lookup, NAMESPACE_SEPARATOR, StageQuery};
pub use value::{PrimitiveValue, Values};
