//! Factory options
//!
//! Options control how a [`ConfigContext`](crate::config::ConfigContext)
//! resolves a stage and which layers the resulting store is built from. They
//! can be assembled in code with the builder methods or read from a JSON/TOML
//! document, in which case unknown keys are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::error::ConfigError;
use crate::config::registry::parse_stage_list;
use crate::config::stage::StageDescriptor;
use crate::config::value::json_type_name;

/// Keys accepted in an options document
pub const OPTION_KEYS: &[&str] = &[
    "singleton",
    "fallback_global",
    "fallbackGlobal",
    "nested_env",
    "nestedEnv",
    "stages",
    "consts",
    "initial",
    "env",
    "overwrites",
];

/// Options for resolving a config store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryOptions {
    /// Cache and reuse one store per resolved stage
    pub singleton: bool,
    /// Detect the stage from the environment source when no hint is given
    #[serde(alias = "fallbackGlobal")]
    pub fallback_global: bool,
    /// Treat the env layer as a mapping from stage to template
    #[serde(alias = "nestedEnv")]
    pub nested_env: bool,
    /// Stage list used if the registry is not yet initialized
    pub stages: Option<Vec<StageDescriptor>>,
    pub consts: Option<Value>,
    pub initial: Option<Value>,
    pub env: Option<Value>,
    pub overwrites: Option<Value>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            singleton: true,
            fallback_global: true,
            nested_env: true,
            stages: None,
            consts: None,
            initial: None,
            env: None,
            overwrites: None,
        }
    }
}

impl FactoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from a dynamic document.
    ///
    /// # Errors
    ///
    /// - `InvalidOptionsType` if the document is not a mapping or a field has the wrong type
    /// - `InvalidOption` for any key outside [`OPTION_KEYS`]
    /// - `InvalidStageList` if `stages` is present but not a list of stage descriptors
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let Value::Object(map) = &value else {
            return Err(ConfigError::InvalidOptionsType(format!(
                "expected a mapping, got {}",
                json_type_name(&value)
            )));
        };

        if let Some(key) = map.keys().find(|k| !OPTION_KEYS.contains(&k.as_str())) {
            return Err(ConfigError::InvalidOption(key.clone()));
        }

        if let Some(stages) = map.get("stages").filter(|v| !v.is_null()) {
            parse_stage_list(stages)?;
        }

        serde_json::from_value(value).map_err(|e| ConfigError::InvalidOptionsType(e.to_string()))
    }

    /// Read options from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let value: Value = toml::from_str(source)?;
        Self::from_value(value)
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    pub fn fallback_global(mut self, fallback_global: bool) -> Self {
        self.fallback_global = fallback_global;
        self
    }

    pub fn nested_env(mut self, nested_env: bool) -> Self {
        self.nested_env = nested_env;
        self
    }

    pub fn stages<I, D>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<StageDescriptor>,
    {
        self.stages = Some(stages.into_iter().map(Into::into).collect());
        self
    }

    /// Constants: force-written first and never overwritten
    pub fn consts(mut self, layer: Value) -> Self {
        self.consts = Some(layer);
        self
    }

    /// Stage-independent defaults
    pub fn initial(mut self, layer: Value) -> Self {
        self.initial = Some(layer);
        self
    }

    /// Stage overlay
    pub fn env(mut self, layer: Value) -> Self {
        self.env = Some(layer);
        self
    }

    /// Final overrides
    pub fn overwrites(mut self, layer: Value) -> Self {
        self.overwrites = Some(layer);
        self
    }
}
