//! Materialized per-stage configuration

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::config::error::ConfigError;
use crate::config::merge::{Layers, MergeEngine};
use crate::config::options::FactoryOptions;
use crate::config::registry::StageTable;
use crate::config::stage::Stage;
use crate::config::value::{PrimitiveValue, Values, json_type_name};

/// Separator between a namespace and the rest of a key
pub const NAMESPACE_SEPARATOR: char = ':';

/// What to look up in a store
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// The whole mapping
    All,
    /// An exact key, or a namespace prefix if no such key exists
    Key(&'a str),
    /// Every key the pattern matches anywhere
    Pattern(&'a Regex),
}

impl<'a> From<&'a str> for Lookup<'a> {
    fn from(key: &'a str) -> Self {
        Lookup::Key(key)
    }
}

impl<'a> From<&'a String> for Lookup<'a> {
    fn from(key: &'a String) -> Self {
        Lookup::Key(key)
    }
}

impl<'a> From<&'a Regex> for Lookup<'a> {
    fn from(pattern: &'a Regex) -> Self {
        Lookup::Pattern(pattern)
    }
}

/// Result of a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A single exact-key value
    Value(PrimitiveValue),
    /// A set of matching keys
    Map(Values),
}

impl Entry {
    pub fn as_value(&self) -> Option<&PrimitiveValue> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&Values> {
        match self {
            Entry::Map(m) => Some(m),
            Entry::Value(_) => None,
        }
    }
}

/// Stage membership query for [`ConfigStore::is`]
#[derive(Debug, Clone)]
pub enum StageQuery {
    Name(String),
    Stage(Stage),
    Any(Vec<StageQuery>),
}

impl From<&str> for StageQuery {
    fn from(name: &str) -> Self {
        StageQuery::Name(name.to_string())
    }
}

impl From<String> for StageQuery {
    fn from(name: String) -> Self {
        StageQuery::Name(name)
    }
}

impl From<&Stage> for StageQuery {
    fn from(stage: &Stage) -> Self {
        StageQuery::Stage(stage.clone())
    }
}

impl From<&Arc<Stage>> for StageQuery {
    fn from(stage: &Arc<Stage>) -> Self {
        StageQuery::Stage(Stage::clone(stage))
    }
}

impl<T: Into<StageQuery>> From<Vec<T>> for StageQuery {
    fn from(items: Vec<T>) -> Self {
        StageQuery::Any(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<StageQuery>, const N: usize> From<[T; N]> for StageQuery {
    fn from(items: [T; N]) -> Self {
        StageQuery::Any(items.into_iter().map(Into::into).collect())
    }
}

/// Flat, typed configuration for a single stage
#[derive(Debug, Clone)]
pub struct ConfigStore {
    stage: Arc<Stage>,
    values: Values,
    constants: Values,
    stage_table: Arc<StageTable>,
}

impl ConfigStore {
    /// Materialize a store for `stage` from the layers in `options`.
    ///
    /// The store starts without a stage table, so [`is_stage`](Self::is_stage)
    /// answers `false` until one is attached with
    /// [`with_stage_table`](Self::with_stage_table).
    pub fn build(stage: Arc<Stage>, options: &FactoryOptions) -> Result<Self, ConfigError> {
        let layers = Layers {
            consts: options.consts.as_ref(),
            initial: options.initial.as_ref(),
            env: options.env.as_ref(),
            overwrites: options.overwrites.as_ref(),
        };
        let merged = MergeEngine::build(layers, &stage, options.nested_env)?;

        tracing::info!(
            stage = %stage,
            keys = merged.values.len(),
            constants = merged.constants.len(),
            "Materialized config"
        );

        Ok(Self {
            stage,
            values: merged.values,
            constants: merged.constants,
            stage_table: Arc::default(),
        })
    }

    /// Attach the abbreviation table of the registry this store's stage came from
    pub fn with_stage_table(mut self, table: Arc<StageTable>) -> Self {
        self.stage_table = table;
        self
    }

    pub fn stage(&self) -> &Arc<Stage> {
        &self.stage
    }

    /// The full flat mapping
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Keys set by the constants layer, with their values
    pub fn constants(&self) -> &Values {
        &self.constants
    }

    pub fn is_constant(&self, key: &str) -> bool {
        self.constants.contains_key(key)
    }

    /// Look up a value or a namespace.
    ///
    /// An exact key returns its value. Any other string is a namespace prefix
    /// (`"db"` and `"db:"` are the same lookup); a pattern selects every key it
    /// matches. Unless `keep_prefix` is set, the matched prefix is stripped from
    /// the returned keys. `None` means nothing matched, which is different from
    /// a namespace that happens to be empty.
    pub fn get<'a>(&self, lookup: impl Into<Lookup<'a>>, keep_prefix: bool) -> Option<Entry> {
        match lookup.into() {
            Lookup::All => Some(Entry::Map(self.values.clone())),
            Lookup::Key(key) => match self.values.get(key) {
                Some(value) => Some(Entry::Value(value.clone())),
                None => self.namespace(key, keep_prefix).map(Entry::Map),
            },
            Lookup::Pattern(pattern) => self.matching(pattern, keep_prefix).map(Entry::Map),
        }
    }

    /// The value stored under exactly `key`
    pub fn value(&self, key: &str) -> Option<&PrimitiveValue> {
        self.values.get(key)
    }

    /// All keys under a namespace prefix
    pub fn namespace(&self, prefix: &str, keep_prefix: bool) -> Option<Values> {
        let prefix = if prefix.ends_with(NAMESPACE_SEPARATOR) {
            prefix.to_string()
        } else {
            format!("{}{}", prefix, NAMESPACE_SEPARATOR)
        };

        let found: Values = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                let rest = key.strip_prefix(prefix.as_str())?;
                let key = if keep_prefix { key.as_str() } else { rest };
                Some((key.to_string(), value.clone()))
            })
            .collect();

        non_empty(found)
    }

    /// All keys the pattern matches anywhere.
    ///
    /// Keys are visited in sorted order, so when stripping maps two keys onto
    /// the same name the one sorting last wins.
    pub fn matching(&self, pattern: &Regex, keep_prefix: bool) -> Option<Values> {
        let found: Values = self
            .values
            .iter()
            .filter(|(key, _)| pattern.is_match(key))
            .map(|(key, value)| {
                let key = if keep_prefix {
                    key.clone()
                } else {
                    pattern.replace(key, "").into_owned()
                };
                (key, value.clone())
            })
            .collect();

        non_empty(found)
    }

    /// Whether this store's stage is named by the query
    pub fn is(&self, query: impl Into<StageQuery>) -> bool {
        self.matches(&query.into())
    }

    fn matches(&self, query: &StageQuery) -> bool {
        match query {
            StageQuery::Name(name) => self.stage.name() == name,
            StageQuery::Stage(stage) => self.stage.name() == stage.name(),
            StageQuery::Any(items) => items.iter().any(|q| self.matches(q)),
        }
    }

    /// Stage membership against a dynamic document: a name or a list of names
    pub fn is_value(&self, query: &Value) -> Result<bool, ConfigError> {
        match query {
            Value::String(name) => Ok(self.stage.name() == name),
            Value::Array(items) => {
                for item in items {
                    if self.is_value(item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => Err(ConfigError::InvalidLookupInput(format!(
                "expected a stage name or a list, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Whether this store's stage is the very stage registered under `abbrev`
    pub fn is_stage(&self, abbrev: &str) -> bool {
        self.stage_table
            .get(abbrev)
            .is_some_and(|registered| Arc::ptr_eq(registered, &self.stage))
    }

    pub fn is_development(&self) -> bool {
        self.is_stage("dev")
    }

    pub fn is_testing(&self) -> bool {
        self.is_stage("test")
    }

    pub fn is_staging(&self) -> bool {
        self.is_stage("stage")
    }

    pub fn is_production(&self) -> bool {
        self.is_stage("prod")
    }
}

fn non_empty(found: Values) -> Option<Values> {
    if found.is_empty() { None } else { Some(found) }
}
