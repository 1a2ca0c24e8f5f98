//! Config resolution context
//!
//! A [`ConfigContext`] owns the stage registry, the per-stage singleton cache
//! and the external environment source. Applications usually keep one
//! context at their root (or use [`ConfigContext::global`]); tests create
//! fresh ones to stay isolated from each other.

use std::sync::{Arc, Mutex, OnceLock, RwLock};

use serde_json::Value;

use crate::config::env_source::{EnvSource, ProcessEnv};
use crate::config::error::ConfigError;
use crate::config::options::FactoryOptions;
use crate::config::registry::StageRegistry;
use crate::config::stage::{Stage, StageDescriptor, default_stages};
use crate::config::store::ConfigStore;

/// Process-wide context backed by the process environment
static GLOBAL: OnceLock<ConfigContext> = OnceLock::new();

/// Explicit stage for [`ConfigContext::resolve_for_stage`]
#[derive(Debug, Clone)]
pub enum StageHint {
    /// Use this stage as is
    Stage(Arc<Stage>),
    /// Resolve by name or abbreviation; empty means "not given"
    Name(String),
}

impl From<&str> for StageHint {
    fn from(name: &str) -> Self {
        StageHint::Name(name.to_string())
    }
}

impl From<String> for StageHint {
    fn from(name: String) -> Self {
        StageHint::Name(name)
    }
}

impl From<Arc<Stage>> for StageHint {
    fn from(stage: Arc<Stage>) -> Self {
        StageHint::Stage(stage)
    }
}

impl From<&Arc<Stage>> for StageHint {
    fn from(stage: &Arc<Stage>) -> Self {
        StageHint::Stage(Arc::clone(stage))
    }
}

impl From<Stage> for StageHint {
    fn from(stage: Stage) -> Self {
        StageHint::Stage(Arc::new(stage))
    }
}

/// Registry, singleton cache and environment source
pub struct ConfigContext {
    registry: RwLock<StageRegistry>,
    cache: Mutex<Vec<Arc<ConfigStore>>>,
    env: Box<dyn EnvSource>,
}

impl Default for ConfigContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigContext")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ConfigContext {
    /// Create a context reading the process environment
    pub fn new() -> Self {
        Self::with_env(ProcessEnv)
    }

    /// Create a context reading an injected environment mapping
    pub fn with_env(env: impl EnvSource + 'static) -> Self {
        Self {
            registry: RwLock::new(StageRegistry::new()),
            cache: Mutex::new(Vec::new()),
            env: Box::new(env),
        }
    }

    /// The process-wide context, created on first use
    pub fn global() -> &'static ConfigContext {
        GLOBAL.get_or_init(ConfigContext::new)
    }

    /// Initialize the stage registry explicitly.
    ///
    /// Fails with `StagesAlreadyInitialized` if stages were already set up,
    /// including implicitly by an earlier resolve.
    pub fn initialize_stages<I, D>(&self, stages: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = D>,
        D: Into<StageDescriptor>,
    {
        self.registry
            .write()
            .map_err(ConfigError::poisoned)?
            .initialize(stages)
    }

    /// Initialize the stage registry from a dynamic stage list
    pub fn initialize_stages_from_value(&self, stages: &Value) -> Result<(), ConfigError> {
        self.registry
            .write()
            .map_err(ConfigError::poisoned)?
            .initialize_from_value(stages)
    }

    /// Registered stages in registration order
    pub fn registry_stages(&self) -> Result<Vec<Arc<Stage>>, ConfigError> {
        let registry = self.registry.read().map_err(ConfigError::poisoned)?;
        Ok(registry.stages().to_vec())
    }

    /// Stores currently held by the singleton cache
    pub fn cached_stores(&self) -> Result<Vec<Arc<ConfigStore>>, ConfigError> {
        let cache = self.cache.lock().map_err(ConfigError::poisoned)?;
        Ok(cache.clone())
    }

    /// Resolve the store for an explicit stage.
    ///
    /// A name that does not resolve falls back to `production`; an empty name
    /// behaves like [`resolve_auto`](Self::resolve_auto).
    ///
    /// # Errors
    ///
    /// - `SingletonConflict` if `options` is given and a cached store exists for the stage
    /// - `MissingEnvironment` if nothing resolves and no `production` stage is registered
    /// - any error from registry initialization or layer merging
    pub fn resolve_for_stage(
        &self,
        hint: impl Into<StageHint>,
        options: Option<FactoryOptions>,
    ) -> Result<Arc<ConfigStore>, ConfigError> {
        self.resolve(Some(hint.into()), options)
    }

    /// Resolve the store for the stage detected from the environment source
    pub fn resolve_auto(
        &self,
        options: Option<FactoryOptions>,
    ) -> Result<Arc<ConfigStore>, ConfigError> {
        self.resolve(None, options)
    }

    fn resolve(
        &self,
        hint: Option<StageHint>,
        options: Option<FactoryOptions>,
    ) -> Result<Arc<ConfigStore>, ConfigError> {
        let supplied = options.is_some();
        let options = options.unwrap_or_default();

        self.ensure_stages(options.stages.as_deref())?;
        let stage = self.resolve_stage(hint, &options)?;

        if !options.singleton {
            return Ok(Arc::new(self.build_store(stage, &options)?));
        }

        // held across build so two callers never publish a store for one stage
        let mut cache = self.cache.lock().map_err(ConfigError::poisoned)?;

        if let Some(cached) = cache.iter().find(|s| Arc::ptr_eq(s.stage(), &stage)) {
            if supplied {
                return Err(ConfigError::SingletonConflict(stage.name().to_string()));
            }
            tracing::debug!(stage = %stage, "Reusing cached config");
            return Ok(Arc::clone(cached));
        }

        let store = Arc::new(self.build_store(stage, &options)?);
        cache.push(Arc::clone(&store));

        Ok(store)
    }

    /// Determine the stage a resolve call targets
    pub fn resolve_stage(
        &self,
        hint: Option<StageHint>,
        options: &FactoryOptions,
    ) -> Result<Arc<Stage>, ConfigError> {
        let name = match hint {
            Some(StageHint::Stage(stage)) => return Ok(stage),
            Some(StageHint::Name(name)) if !name.is_empty() => Some(name),
            _ if options.fallback_global => {
                self.env.detect_stage().map(|(var, value)| {
                    tracing::debug!(var, value = %value, "Detected stage from environment");
                    value
                })
            }
            _ => None,
        };

        let registry = self.registry.read().map_err(ConfigError::poisoned)?;

        name.as_deref()
            .and_then(|n| registry.resolve(n))
            .or_else(|| {
                tracing::debug!(hint = ?name, "Falling back to production stage");
                registry.fallback()
            })
            .ok_or(ConfigError::MissingEnvironment)
    }

    /// The environment value for `key`, or `default` when unset or empty
    pub fn env_or(&self, key: &str, default: &str) -> String {
        self.env.non_empty(key).unwrap_or_else(|| default.to_string())
    }

    /// The environment value for `key`, or `error` when unset or empty
    pub fn env_required(&self, key: &str, error: ConfigError) -> Result<String, ConfigError> {
        self.env.non_empty(key).ok_or(error)
    }

    fn build_store(
        &self,
        stage: Arc<Stage>,
        options: &FactoryOptions,
    ) -> Result<ConfigStore, ConfigError> {
        let table = self
            .registry
            .read()
            .map_err(ConfigError::poisoned)?
            .stage_table();
        Ok(ConfigStore::build(stage, options)?.with_stage_table(table))
    }

    fn ensure_stages(&self, stages: Option<&[StageDescriptor]>) -> Result<(), ConfigError> {
        {
            let registry = self.registry.read().map_err(ConfigError::poisoned)?;
            if registry.is_initialized() {
                if stages.is_some() {
                    tracing::warn!("Stage registry already initialized, ignoring stages option");
                }
                return Ok(());
            }
        }

        let mut registry = self.registry.write().map_err(ConfigError::poisoned)?;
        if registry.is_initialized() {
            return Ok(());
        }

        match stages {
            Some(stages) => registry.initialize(stages.iter().cloned()),
            None => registry.initialize(default_stages()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::error::ConfigErrorKind;
    use crate::config::value::PrimitiveValue;
    use serde_json::json;
    use std::collections::HashMap;

    fn context(pairs: &[(&str, &str)]) -> ConfigContext {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigContext::with_env(env)
    }

    #[test]
    fn test_resolve_auto_detects_stage() {
        let ctx = context(&[("NODE_ENV", "testing")]);
        let store = ctx.resolve_auto(None).unwrap();
        assert_eq!(store.stage().name(), "testing");
        assert!(store.is_testing());
    }

    #[test]
    fn test_resolve_auto_uses_abbreviation_from_env() {
        let ctx = context(&[("CLIENT_ENV", "dev")]);
        assert!(ctx.resolve_auto(None).unwrap().is_development());
    }

    #[test]
    fn test_resolve_auto_without_env_is_production() {
        let ctx = context(&[]);
        assert!(ctx.resolve_auto(None).unwrap().is_production());
    }

    #[test]
    fn test_fallback_global_disabled_ignores_env() {
        let ctx = context(&[("NODE_ENV", "testing")]);
        let options = FactoryOptions::new().fallback_global(false);
        let store = ctx.resolve_auto(Some(options)).unwrap();
        assert!(store.is("production"));
    }

    #[test]
    fn test_unresolvable_hint_falls_back_to_production() {
        let ctx = context(&[("NODE_ENV", "testing")]);
        let store = ctx.resolve_for_stage("bogus", None).unwrap();
        assert_eq!(store.stage().name(), "production");
    }

    #[test]
    fn test_singleton_returns_same_instance() {
        let ctx = context(&[]);
        let options = FactoryOptions::new().initial(json!({"port": 80}));
        let first = ctx.resolve_for_stage("staging", Some(options)).unwrap();
        let second = ctx.resolve_for_stage("stage", None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.cached_stores().unwrap().len(), 1);
    }

    #[test]
    fn test_singleton_conflict_when_options_passed_again() {
        let ctx = context(&[]);
        ctx.resolve_for_stage("staging", None).unwrap();
        let err = ctx
            .resolve_for_stage("staging", Some(FactoryOptions::new()))
            .unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::SingletonConflict);
    }

    #[test]
    fn test_non_singleton_builds_fresh_store() {
        let ctx = context(&[]);
        let first = ctx.resolve_for_stage("dev", None).unwrap();
        let options = FactoryOptions::new()
            .singleton(false)
            .initial(json!({"debug": true}));
        let second = ctx.resolve_for_stage("dev", Some(options)).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.value("debug"), Some(&PrimitiveValue::Bool(true)));
        assert_eq!(ctx.cached_stores().unwrap().len(), 1);
    }

    #[test]
    fn test_explicit_stage_identity() {
        let ctx = context(&[]);
        let registered = ctx.resolve_for_stage("production", None).unwrap();

        // a stage built by the caller is a different stage for the cache
        let custom = ctx
            .resolve_for_stage(Stage::new("production", "prod"), None)
            .unwrap();
        assert!(!Arc::ptr_eq(&registered, &custom));
        assert!(custom.is("production"));

        let same = ctx
            .resolve_for_stage(registered.stage(), None)
            .unwrap();
        assert!(Arc::ptr_eq(&registered, &same));
    }

    #[test]
    fn test_custom_stages_option() {
        let ctx = context(&[("ENV", "loc")]);
        let options = FactoryOptions::new().stages([("local", "loc"), ("production", "prod")]);
        let store = ctx.resolve_auto(Some(options)).unwrap();
        assert!(store.is_stage("loc"));
        assert_eq!(ctx.registry_stages().unwrap().len(), 2);
    }

    #[test]
    fn test_unregistered_stage_fails_predicates() {
        let ctx = context(&[]);
        ctx.initialize_stages([("local", "loc"), ("production", "prod")])
            .unwrap();

        let store = ctx
            .resolve_for_stage(Stage::new("feature", "dev"), None)
            .unwrap();
        assert!(!store.is_development());
        assert!(!store.is_stage("dev"));
        assert!(store.is("feature"));

        let local = ctx.resolve_for_stage("loc", None).unwrap();
        assert!(local.is_stage("loc"));

        // a caller-built twin of a registered stage is not that stage
        let twin = ctx
            .resolve_for_stage(Stage::new("local", "loc"), None)
            .unwrap();
        assert!(!twin.is_stage("loc"));
        assert!(twin.is("local"));
    }

    #[test]
    fn test_missing_production_stage() {
        let ctx = context(&[]);
        ctx.initialize_stages([("local", "loc")]).unwrap();
        let err = ctx.resolve_for_stage("bogus", None).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::MissingEnvironment);
    }

    #[test]
    fn test_initialize_after_implicit_init_fails() {
        let ctx = context(&[]);
        ctx.resolve_auto(None).unwrap();
        let err = ctx.initialize_stages(default_stages()).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::StagesAlreadyInitialized);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let ctx = context(&[]);
        let options = FactoryOptions::new().overwrites(json!({"bad": [1]}));
        let err = ctx.resolve_for_stage("prod", Some(options)).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::UnsupportedValueType);
        assert!(ctx.cached_stores().unwrap().is_empty());

        // options are allowed again since nothing was published
        let options = FactoryOptions::new().overwrites(json!({"good": 1}));
        assert!(ctx.resolve_for_stage("prod", Some(options)).is_ok());
    }

    #[test]
    fn test_env_accessors() {
        let ctx = context(&[("API_URL", "https://api"), ("EMPTY", "")]);
        assert_eq!(ctx.env_or("API_URL", "fallback"), "https://api");
        assert_eq!(ctx.env_or("MISSING", "fallback"), "fallback");
        assert_eq!(ctx.env_or("EMPTY", "fallback"), "fallback");

        let err = ctx
            .env_required("MISSING", ConfigError::missing_variable("MISSING"))
            .unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::MissingVariable);
        assert_eq!(
            ctx.env_required("API_URL", ConfigError::missing_variable("API_URL"))
                .unwrap(),
            "https://api"
        );
    }

    #[test]
    fn test_concurrent_resolves_share_one_store() {
        let ctx = Arc::new(context(&[("NODE_ENV", "staging")]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || ctx.resolve_auto(None).unwrap())
            })
            .collect();

        let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(stores.iter().all(|s| Arc::ptr_eq(s, &stores[0])));
        assert_eq!(ctx.cached_stores().unwrap().len(), 1);
    }
}
