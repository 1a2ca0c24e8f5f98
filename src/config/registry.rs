//! Stage registry
//!
//! Holds the stages a context knows about. The registry is initialized exactly
//! once, either explicitly or lazily by the first resolve, and keeps an
//! abbreviation table that stores built through a context consult for
//! [`ConfigStore::is_stage`](crate::config::ConfigStore::is_stage).

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::config::error::ConfigError;
use crate::config::stage::{Stage, StageDescriptor};

/// Name of the stage used when nothing else resolves
pub const FALLBACK_STAGE: &str = "production";

/// Store operation names an abbreviation may not shadow
pub const RESERVED_NAMES: &[&str] = &[
    "get",
    "is",
    "is_stage",
    "stage",
    "values",
    "constants",
    "is_constant",
];

static ABBREV_PATTERN: OnceLock<Regex> = OnceLock::new();

fn abbrev_pattern() -> &'static Regex {
    ABBREV_PATTERN.get_or_init(|| Regex::new(r"^[a-z](?-u:[\w\d])+$").unwrap())
}

/// Abbreviation to registered stage
pub type StageTable = HashMap<String, Arc<Stage>>;

/// Registry of known stages
#[derive(Debug, Default)]
pub struct StageRegistry {
    stages: Vec<Arc<Stage>>,
    by_abbrev: Arc<StageTable>,
    initialized: bool,
}

impl StageRegistry {
    /// Create an empty, uninitialized registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Register a list of stages.
    ///
    /// Fails if the registry is already initialized or if any abbreviation is
    /// reserved, duplicated, or does not match `^[a-z][\w\d]+$` (ASCII only).
    /// The registry is left untouched on failure.
    pub fn initialize<I, D>(&mut self, stages: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = D>,
        D: Into<StageDescriptor>,
    {
        if self.initialized {
            return Err(ConfigError::StagesAlreadyInitialized);
        }

        let mut ordered: Vec<Arc<Stage>> = Vec::new();
        let mut by_abbrev = StageTable::new();

        for descriptor in stages {
            let stage = Arc::new(descriptor.into().to_stage());
            let abbrev = stage.abbrev();

            if RESERVED_NAMES.contains(&abbrev) || by_abbrev.contains_key(abbrev) {
                return Err(ConfigError::invalid_abbreviation(abbrev, "Collision"));
            }
            if !abbrev_pattern().is_match(abbrev) {
                return Err(ConfigError::invalid_abbreviation(abbrev, "Bad characters"));
            }

            by_abbrev.insert(abbrev.to_string(), Arc::clone(&stage));

            // a repeated name replaces the earlier stage and its abbreviation
            if let Some(pos) = ordered.iter().position(|s| s.name() == stage.name()) {
                let replaced = ordered.remove(pos);
                by_abbrev.remove(replaced.abbrev());
            }
            ordered.push(stage);
        }

        self.stages = ordered;
        self.by_abbrev = Arc::new(by_abbrev);
        self.initialized = true;

        tracing::info!(
            stages = %self.stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(","),
            "Stage registry initialized"
        );

        Ok(())
    }

    /// Register stages from a dynamic document (a JSON/TOML array)
    pub fn initialize_from_value(&mut self, stages: &Value) -> Result<(), ConfigError> {
        let descriptors = parse_stage_list(stages)?;
        self.initialize(descriptors)
    }

    /// Find a stage by name, then by abbreviation
    pub fn resolve(&self, hint: &str) -> Option<Arc<Stage>> {
        self.stages
            .iter()
            .find(|s| s.name() == hint)
            .or_else(|| self.by_abbrev.get(hint))
            .cloned()
    }

    /// The stage registered under `abbrev`
    pub fn by_abbrev(&self, abbrev: &str) -> Option<Arc<Stage>> {
        self.by_abbrev.get(abbrev).cloned()
    }

    /// Snapshot of the abbreviation table, shared with the stores it backs
    pub fn stage_table(&self) -> Arc<StageTable> {
        Arc::clone(&self.by_abbrev)
    }

    /// The `production` stage, if registered
    pub fn fallback(&self) -> Option<Arc<Stage>> {
        self.stages.iter().find(|s| s.name() == FALLBACK_STAGE).cloned()
    }

    /// Registered stages in registration order
    pub fn stages(&self) -> &[Arc<Stage>] {
        &self.stages
    }
}

/// Parse a dynamic stage list into descriptors
pub fn parse_stage_list(stages: &Value) -> Result<Vec<StageDescriptor>, ConfigError> {
    let items = stages.as_array().ok_or_else(|| {
        ConfigError::InvalidStageList("Expecting array of stages".to_string())
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item.clone()).map_err(|e| {
                ConfigError::InvalidStageList(format!("Invalid stage at index {}: {}", index, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::error::ConfigErrorKind;
    use crate::config::stage::default_stages;
    use serde_json::json;

    fn default_registry() -> StageRegistry {
        let mut registry = StageRegistry::new();
        registry.initialize(default_stages()).unwrap();
        registry
    }

    #[test]
    fn test_initialize_defaults() {
        let registry = default_registry();
        assert!(registry.is_initialized());
        assert_eq!(registry.stages().len(), 4);
        assert_eq!(registry.by_abbrev("prod").unwrap().name(), "production");
    }

    #[test]
    fn test_initialize_twice_fails() {
        let mut registry = default_registry();
        let err = registry.initialize(default_stages()).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::StagesAlreadyInitialized);
    }

    #[test]
    fn test_bad_characters() {
        let mut registry = StageRegistry::new();
        let err = registry.initialize([("weird", "1x")]).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidAbbreviation);
        assert!(err.to_string().contains("Bad characters"));
        assert!(!registry.is_initialized());

        // single-character abbreviations do not match the pattern
        let err = registry.initialize(["q"]).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidAbbreviation);
    }

    #[test]
    fn test_non_ascii_abbreviation_rejected() {
        let mut registry = StageRegistry::new();
        let err = registry
            .initialize([("preview", "pré"), ("production", "prod")])
            .unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidAbbreviation);
        assert!(err.to_string().contains("Bad characters"));

        let err = registry.initialize([("numbers", "n١٢")]).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidAbbreviation);

        registry.initialize([("preview", "pre_2"), ("production", "prod")]).unwrap();
    }

    #[test]
    fn test_repeated_name_drops_earlier_abbreviation() {
        let mut registry = StageRegistry::new();
        registry
            .initialize([("production", "prod"), ("production", "live")])
            .unwrap();

        assert_eq!(registry.stages().len(), 1);
        assert!(registry.resolve("prod").is_none());
        assert!(registry.by_abbrev("prod").is_none());

        let live = registry.resolve("live").unwrap();
        assert!(Arc::ptr_eq(&live, &registry.resolve("production").unwrap()));
        assert_eq!(registry.stage_table().len(), 1);
    }

    #[test]
    fn test_collisions() {
        let mut registry = StageRegistry::new();
        let err = registry.initialize([("getter", "get")]).unwrap_err();
        assert!(err.to_string().contains("Collision"));

        let err = registry
            .initialize([("production", "prod"), ("preview", "prod")])
            .unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidAbbreviation);
        assert!(registry.stages().is_empty());

        // a failed attempt does not count as initialization
        registry.initialize(default_stages()).unwrap();
    }

    #[test]
    fn test_resolve_by_name_and_abbrev() {
        let registry = default_registry();
        assert_eq!(registry.resolve("testing").unwrap().abbrev(), "test");
        assert_eq!(registry.resolve("stage").unwrap().name(), "staging");
        assert!(registry.resolve("bogus").is_none());
        assert_eq!(registry.fallback().unwrap().name(), "production");
    }

    #[test]
    fn test_resolve_returns_shared_instance() {
        let registry = default_registry();
        let a = registry.resolve("dev").unwrap();
        let b = registry.resolve("development").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_initialize_from_value() {
        let mut registry = StageRegistry::new();
        registry
            .initialize_from_value(&json!([
                {"name": "local", "abbrev": "loc"},
                ["production", "prod"],
                "preview"
            ]))
            .unwrap();
        assert_eq!(registry.resolve("loc").unwrap().name(), "local");
        assert_eq!(registry.resolve("preview").unwrap().abbrev(), "preview");
    }

    #[test]
    fn test_initialize_from_value_rejects_non_sequences() {
        let mut registry = StageRegistry::new();
        let err = registry
            .initialize_from_value(&json!({"name": "production"}))
            .unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidStageList);

        let err = registry.initialize_from_value(&json!([42])).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidStageList);
    }
}
