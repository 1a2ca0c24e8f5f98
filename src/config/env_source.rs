//! External environment mapping
//!
//! The host process supplies a flat string mapping, normally the OS
//! environment, that is consulted for stage detection and exposed through
//! [`ConfigContext::env_or`](crate::config::ConfigContext::env_or).

use std::collections::{BTreeMap, HashMap};

/// Variables consulted, in order, to detect the stage
pub const STAGE_VARS: &[&str] = &["NODE_ENV", "CLIENT_ENV", "ENV"];

/// A flat source of environment variables
pub trait EnvSource: Send + Sync {
    /// The value of `key`, if set
    fn var(&self, key: &str) -> Option<String>;

    /// The value of `key` if set and non-empty
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.is_empty())
    }

    /// The first non-empty stage variable, with the variable it came from
    fn detect_stage(&self) -> Option<(&'static str, String)> {
        STAGE_VARS
            .iter()
            .find_map(|var| self.non_empty(var).map(|value| (*var, value)))
    }
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
