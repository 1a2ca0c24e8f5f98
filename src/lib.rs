//! Stageconf Library
//!
//! Materializes a flat, typed configuration store for a deployment stage from
//! layered templates.
//!
//! ```
//! use serde_json::json;
//! use stageconf::{ConfigContext, FactoryOptions};
//!
//! let ctx = ConfigContext::with_env(std::collections::HashMap::<String, String>::new());
//! let options = FactoryOptions::new()
//!     .initial(json!({"db:host": "db.internal", "db:port": 5432}))
//!     .env(json!({"dev": {"db:host": "localhost"}}));
//!
//! let config = ctx.resolve_for_stage("dev", Some(options)).unwrap();
//! assert!(config.is_development());
//! assert_eq!(config.value("db:host").and_then(|v| v.as_str()), Some("localhost"));
//! assert!(config.get("db", false).is_some());
//! assert!(config.get("cache", false).is_none());
//! ```

pub mod config;
pub mod logger;

pub use config::{
    ConfigContext, ConfigError, ConfigErrorKind, ConfigStore, Entry, FactoryOptions, Lookup,
    PrimitiveValue, Stage, StageDescriptor, StageHint, StageQuery, Values,
};

pub fn pkg_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
