//! Scene files and run metadata.
//!
//! A scene file lists the effects to spawn and a schedule of triggers to fire
//! at given times. Every field has a default, so a minimal scene is just
//! `{"effects": [{"name": "fire", "effect": {"type": "fire"}}]}`.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::effects::EffectConfig;
use crate::host::TransitionRecord;
use crate::panel::ParamValue;

fn default_width() -> u32 {
    1000
}

fn default_height() -> u32 {
    750
}

fn default_pixel_ratio() -> f32 {
    1.0
}

/// A scene: output settings, effects and a trigger schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSpec {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f32,

    /// Base seed for every effect's random draws.
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub effects: Vec<EffectEntry>,

    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectEntry {
    /// Unique name triggers refer to.
    pub name: String,

    pub effect: EffectConfig,

    #[serde(default)]
    pub position: Option<[f32; 3]>,

    /// Activate right after spawning.
    #[serde(default)]
    pub autostart: bool,
}

/// An action scheduled at a time in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub at: f32,

    #[serde(flatten)]
    pub action: TriggerAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TriggerAction {
    Activate {
        effect: String,
        #[serde(default)]
        position: Option<[f32; 3]>,
    },
    Stop {
        effect: String,
    },
    Pop {
        effect: String,
    },
    Set {
        effect: String,
        param: String,
        value: ParamValue,
    },
    Resize {
        width: u32,
        height: u32,
    },
}

impl TriggerAction {
    /// Effect the action addresses, if any.
    pub fn effect(&self) -> Option<&str> {
        match self {
            TriggerAction::Activate { effect, .. }
            | TriggerAction::Stop { effect }
            | TriggerAction::Pop { effect }
            | TriggerAction::Set { effect, .. } => Some(effect),
            TriggerAction::Resize { .. } => None,
        }
    }
}

impl Default for SceneSpec {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            pixel_ratio: default_pixel_ratio(),
            seed: 0,
            effects: Vec::new(),
            triggers: Vec::new(),
        }
    }
}

impl SceneSpec {
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: SceneSpec = serde_json::from_str(json).context("Failed to parse scene")?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("Resolution must be non-zero, got {}x{}", self.width, self.height);
        }
        if self.pixel_ratio <= 0.0 {
            bail!("Pixel ratio must be positive, got {}", self.pixel_ratio);
        }

        let mut names = HashSet::new();
        for entry in &self.effects {
            if !names.insert(entry.name.as_str()) {
                bail!("Duplicate effect name '{}'", entry.name);
            }
        }

        for trigger in &self.triggers {
            if !trigger.at.is_finite() || trigger.at < 0.0 {
                bail!("Trigger time must be a non-negative number, got {}", trigger.at);
            }
            if let Some(effect) = trigger.action.effect() {
                if !names.contains(effect) {
                    bail!("Trigger at {}s refers to unknown effect '{}'", trigger.at, effect);
                }
            }
            if let TriggerAction::Resize { width, height } = trigger.action {
                if width == 0 || height == 0 {
                    bail!("Resize at {}s must be non-zero, got {}x{}", trigger.at, width, height);
                }
            }
        }
        Ok(())
    }

    /// Triggers in firing order. Ties keep file order.
    pub fn schedule(&self) -> Vec<Trigger> {
        let mut triggers = self.triggers.clone();
        triggers.sort_by(|a, b| a.at.total_cmp(&b.at));
        triggers
    }

    /// End of the last trigger, the natural length of a run.
    pub fn last_trigger_time(&self) -> f32 {
        self.triggers.iter().map(|t| t.at).fold(0.0, f32::max)
    }
}

/// SHA-256 of a byte slice, lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Metadata written after a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// SHA-256 of the scene file content.
    pub scene_hash: String,

    /// Backend the run used.
    pub backend: String,

    pub fps: f32,

    pub frame_count: u64,

    /// Simulated seconds covered.
    pub duration: f32,

    /// GPU resources still held after teardown. Non-zero means a leak.
    pub live_resources: usize,

    pub fxlab_version: String,

    /// Every lifecycle transition in the run, in order.
    pub transitions: Vec<TransitionRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RunMetadata {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize metadata")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write metadata to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "width": 800,
        "seed": 3,
        "effects": [
            { "name": "heart", "effect": { "type": "popping_heart", "count": 12 }, "autostart": true },
            { "name": "charas", "effect": { "type": "rounding_charas" }, "position": [0, 1, 0] }
        ],
        "triggers": [
            { "at": 2.0, "action": "set", "effect": "charas", "param": "texOffsetIndex", "value": [1, 2] },
            { "at": 0.5, "action": "activate", "effect": "charas" },
            { "at": 4.0, "action": "resize", "width": 640, "height": 480 }
        ]
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let spec = SceneSpec::from_json(SCENE).unwrap();

        assert_eq!(spec.width, 800);
        assert_eq!(spec.height, 750);
        assert_eq!(spec.pixel_ratio, 1.0);
        assert_eq!(spec.effects.len(), 2);
        assert!(spec.effects[0].autostart);
        assert_eq!(spec.effects[1].position, Some([0.0, 1.0, 0.0]));
        match &spec.effects[0].effect {
            EffectConfig::PoppingHeart(c) => {
                assert_eq!(c.count, 12);
                assert_eq!(c.height, 1.0);
            }
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn test_schedule_is_time_ordered() {
        let spec = SceneSpec::from_json(SCENE).unwrap();
        let times: Vec<_> = spec.schedule().iter().map(|t| t.at).collect();
        assert_eq!(times, vec![0.5, 2.0, 4.0]);
        assert_eq!(spec.last_trigger_time(), 4.0);
        assert_eq!(
            spec.schedule()[1].action,
            TriggerAction::Set {
                effect: "charas".into(),
                param: "texOffsetIndex".into(),
                value: ParamValue::Indices(vec![1, 2]),
            }
        );
    }

    #[test]
    fn test_validation_errors() {
        let unknown = r#"{ "triggers": [ { "at": 1.0, "action": "stop", "effect": "ghost" } ] }"#;
        assert!(SceneSpec::from_json(unknown).is_err());

        let dup = r#"{ "effects": [
            { "name": "a", "effect": { "type": "fire" } },
            { "name": "a", "effect": { "type": "flame" } }
        ] }"#;
        assert!(SceneSpec::from_json(dup).is_err());

        let unknown_type = r#"{ "effects": [ { "name": "a", "effect": { "type": "sparkles" } } ] }"#;
        assert!(SceneSpec::from_json(unknown_type).is_err());
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
