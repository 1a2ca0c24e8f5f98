//! Deployment stages

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named deployment stage with a short abbreviation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stage {
    name: String,
    abbrev: String,
}

impl Stage {
    /// Create a stage with an explicit abbreviation
    pub fn new(name: impl Into<String>, abbrev: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbrev: abbrev.into(),
        }
    }

    /// Create a stage whose abbreviation is its name
    pub fn bare(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            abbrev: name.clone(),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abbrev(&self) -> &str {
        &self.abbrev
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Description of one stage in a stage list.
///
/// Deserializes from an object (`{ name = "production", abbrev = "prod" }`),
/// a two-element array (`["production", "prod"]`) or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageDescriptor {
    Named {
        name: String,
        #[serde(default)]
        abbrev: Option<String>,
    },
    Pair(String, String),
    Bare(String),
}

impl StageDescriptor {
    /// Build the stage described; a missing or empty abbreviation defaults to the name
    pub fn to_stage(&self) -> Stage {
        match self {
            StageDescriptor::Named { name, abbrev } => match abbrev.as_deref() {
                Some(abbrev) if !abbrev.is_empty() => Stage::new(name, abbrev),
                _ => Stage::bare(name),
            },
            StageDescriptor::Pair(name, abbrev) if !abbrev.is_empty() => Stage::new(name, abbrev),
            StageDescriptor::Pair(name, _) => Stage::bare(name),
            StageDescriptor::Bare(name) => Stage::bare(name),
        }
    }
}

impl From<&str> for StageDescriptor {
    fn from(name: &str) -> Self {
        StageDescriptor::Bare(name.to_string())
    }
}

impl From<String> for StageDescriptor {
    fn from(name: String) -> Self {
        StageDescriptor::Bare(name)
    }
}

impl From<(&str, &str)> for StageDescriptor {
    fn from((name, abbrev): (&str, &str)) -> Self {
        StageDescriptor::Pair(name.to_string(), abbrev.to_string())
    }
}

impl From<(String, String)> for StageDescriptor {
    fn from((name, abbrev): (String, String)) -> Self {
        StageDescriptor::Pair(name, abbrev)
    }
}

impl From<Stage> for StageDescriptor {
    fn from(stage: Stage) -> Self {
        StageDescriptor::Named {
            name: stage.name,
            abbrev: Some(stage.abbrev),
        }
    }
}

/// The stages used when no list is supplied
pub fn default_stages() -> Vec<StageDescriptor> {
    vec![
        ("development", "dev").into(),
        ("testing", "test").into(),
        ("staging", "stage").into(),
        ("production", "prod").into(),
    ]
}
