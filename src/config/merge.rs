//! Configuration merge logic
//!
//! Implements the 4-layer flat merge:
//! 1. Constants (force-written, protected from later layers)
//! 2. Stage-independent defaults
//! 3. Stage overlay
//! 4. Overwrites
//!
//! Layers are flat: object values are rejected rather than deep-merged.

use serde_json::Value;

use crate::config::error::ConfigError;
use crate::config::stage::Stage;
use crate::config::value::{PrimitiveValue, Values};

/// The four templates applied when materializing a store
#[derive(Debug, Clone, Copy, Default)]
pub struct Layers<'a> {
    pub consts: Option<&'a Value>,
    pub initial: Option<&'a Value>,
    pub env: Option<&'a Value>,
    pub overwrites: Option<&'a Value>,
}

/// Result of a successful merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Merged {
    pub values: Values,
    pub constants: Values,
}

/// Accumulates layers onto a flat store
#[derive(Debug, Default)]
pub struct MergeEngine {
    values: Values,
    constants: Values,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply all layers in precedence order for `stage`.
    ///
    /// With `nested` set, the env layer maps stage name or abbreviation to a
    /// template and only the matching one is applied.
    pub fn build(layers: Layers<'_>, stage: &Stage, nested: bool) -> Result<Merged, ConfigError> {
        let mut engine = Self::new();

        engine.apply_constants(layers.consts)?;
        engine.apply(layers.initial)?;
        engine.apply_stage_overlay(layers.env, stage, nested)?;
        engine.apply(layers.overwrites)?;

        Ok(engine.finish())
    }

    /// Force-write a layer and mark its keys as constant
    pub fn apply_constants(&mut self, layer: Option<&Value>) -> Result<usize, ConfigError> {
        self.extend(layer, true)
    }

    /// Write a layer; constant keys are left alone
    pub fn apply(&mut self, layer: Option<&Value>) -> Result<usize, ConfigError> {
        self.extend(layer, false)
    }

    /// Write the stage overlay
    pub fn apply_stage_overlay(
        &mut self,
        layer: Option<&Value>,
        stage: &Stage,
        nested: bool,
    ) -> Result<usize, ConfigError> {
        let Some(Value::Object(overlay)) = layer else {
            return Ok(0);
        };

        if !nested {
            return self.apply(layer);
        }

        let selected = overlay
            .get(stage.name())
            .filter(|v| !v.is_null())
            .or_else(|| overlay.get(stage.abbrev()));

        tracing::debug!(
            stage = %stage,
            found = selected.is_some(),
            "Selecting nested stage overlay"
        );

        self.apply(selected)
    }

    /// Consume the engine
    pub fn finish(self) -> Merged {
        Merged {
            values: self.values,
            constants: self.constants,
        }
    }

    fn extend(&mut self, layer: Option<&Value>, force: bool) -> Result<usize, ConfigError> {
        let Some(Value::Object(template)) = layer else {
            return Ok(0);
        };

        let mut written = 0;
        for (key, raw) in template {
            let value = PrimitiveValue::from_json(key, raw)?;

            if force {
                self.constants.insert(key.clone(), value.clone());
            } else if self.constants.contains_key(key) {
                tracing::trace!(key = %key, "Constant shields key from later layer");
                continue;
            }

            self.values.insert(key.clone(), value);
            written += 1;
        }

        Ok(written)
    }
}
