//! Control-panel parameter schema.
//!
//! Every effect publishes a list of [`ParamDef`]s. A panel (or a scene file)
//! sends back a [`ParamValue`] by name; [`ParamDef::coerce`] checks the type
//! and clamps to range before the effect sees it.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

/// Value sent from the panel.
///
/// Untagged so scene files can write plain JSON: `1.5`, `true`, `[0, 1, 0]`,
/// `"flame_02"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Float(f32),
    Vec3([f32; 3]),
    Indices(Vec<usize>),
    Text(String),
}

impl ParamValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            ParamValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_indices(&self) -> Option<&[usize]> {
        match self {
            ParamValue::Indices(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// What a parameter change does to the effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamApply {
    /// Plain field or uniform write, visible on the next frame.
    Immediate,
    /// Destroys and regenerates the representation.
    Rebuild,
    /// Stops and re-activates the effect.
    Restart,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    Float { min: f32, max: f32 },
    Int { min: i64, max: i64 },
    Bool,
    Vec3 { min: f32, max: f32 },
    Color,
    Choice { options: Vec<String> },
    Indices { max: usize },
}

/// A panel parameter definition.
#[derive(Clone, Debug, Serialize)]
pub struct ParamDef {
    pub name: String,
    pub kind: ParamKind,
    pub apply: ParamApply,
    pub current: ParamValue,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamDef {
    fn new(name: impl Into<String>, kind: ParamKind, current: ParamValue) -> Self {
        Self {
            name: name.into(),
            kind,
            apply: ParamApply::Immediate,
            current,
            description: String::new(),
        }
    }

    pub fn float(name: impl Into<String>, current: f32, min: f32, max: f32) -> Self {
        Self::new(name, ParamKind::Float { min, max }, ParamValue::Float(current))
    }

    pub fn int(name: impl Into<String>, current: usize, min: i64, max: i64) -> Self {
        Self::new(name, ParamKind::Int { min, max }, ParamValue::Float(current as f32))
    }

    pub fn bool(name: impl Into<String>, current: bool) -> Self {
        Self::new(name, ParamKind::Bool, ParamValue::Bool(current))
    }

    pub fn vec3(name: impl Into<String>, current: [f32; 3], min: f32, max: f32) -> Self {
        Self::new(name, ParamKind::Vec3 { min, max }, ParamValue::Vec3(current))
    }

    pub fn color(name: impl Into<String>, current: [f32; 3]) -> Self {
        Self::new(name, ParamKind::Color, ParamValue::Vec3(current))
    }

    pub fn choice(name: impl Into<String>, current: &str, options: &[&str]) -> Self {
        let options = options.iter().map(|s| s.to_string()).collect();
        Self::new(name, ParamKind::Choice { options }, ParamValue::Text(current.to_string()))
    }

    pub fn indices(name: impl Into<String>, current: &[usize], max: usize) -> Self {
        Self::new(name, ParamKind::Indices { max }, ParamValue::Indices(current.to_vec()))
    }

    /// Builder: set how the change is applied.
    pub fn with_apply(mut self, apply: ParamApply) -> Self {
        self.apply = apply;
        self
    }

    /// Builder: set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Type-check `value` against this definition and clamp it into range.
    pub fn coerce(&self, value: ParamValue) -> Result<ParamValue> {
        let name = &self.name;
        match (&self.kind, value) {
            (ParamKind::Float { min, max }, ParamValue::Float(v)) => {
                Ok(ParamValue::Float(v.clamp(*min, *max)))
            }
            (ParamKind::Int { min, max }, ParamValue::Float(v)) => {
                if v.fract() != 0.0 {
                    bail!("parameter '{}' expects a whole number, got {}", name, v);
                }
                Ok(ParamValue::Float((v as i64).clamp(*min, *max) as f32))
            }
            (ParamKind::Bool, ParamValue::Bool(v)) => Ok(ParamValue::Bool(v)),
            (ParamKind::Vec3 { min, max }, ParamValue::Vec3(v)) => {
                Ok(ParamValue::Vec3(v.map(|c| c.clamp(*min, *max))))
            }
            (ParamKind::Color, ParamValue::Vec3(v)) => {
                Ok(ParamValue::Vec3(v.map(|c| c.clamp(0.0, 1.0))))
            }
            (ParamKind::Choice { options }, ParamValue::Text(v)) => {
                if options.iter().any(|o| *o == v) {
                    Ok(ParamValue::Text(v))
                } else {
                    Err(anyhow!(
                        "parameter '{}' has no option '{}' (expected one of {})",
                        name,
                        v,
                        options.join(", ")
                    ))
                }
            }
            // A three-element index list deserializes as a vec3
            (ParamKind::Indices { .. }, ParamValue::Vec3(v)) => {
                let indices = v
                    .iter()
                    .map(|c| {
                        if c.fract() == 0.0 && *c >= 0.0 {
                            Ok(*c as usize)
                        } else {
                            Err(anyhow!("parameter '{}' expects indices, got {}", name, c))
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.coerce(ParamValue::Indices(indices))
            }
            (ParamKind::Indices { max }, ParamValue::Indices(v)) => {
                if v.is_empty() {
                    bail!("parameter '{}' needs at least one index", name);
                }
                if let Some(bad) = v.iter().find(|i| **i > *max) {
                    bail!("parameter '{}' index {} out of range 0..={}", name, bad, max);
                }
                Ok(ParamValue::Indices(v))
            }
            (kind, value) => Err(anyhow!(
                "parameter '{}' expects {:?}, got {:?}",
                name,
                kind,
                value
            )),
        }
    }
}

/// Find a definition by name.
pub fn find<'a>(defs: &'a [ParamDef], name: &str) -> Result<&'a ParamDef> {
    defs.iter().find(|d| d.name == name).ok_or_else(|| {
        let known: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        anyhow!("unknown parameter '{}' (known: {})", name, known.join(", "))
    })
}

/// Construction-time check of a deserialized config against the ranges the
/// panel enforces. Invalid fields revert to their defaults instead of being
/// clamped, and each revert is logged at warn.
pub struct ConfigCheck<'a> {
    effect: &'a str,
    reverted: Vec<&'static str>,
}

impl<'a> ConfigCheck<'a> {
    pub fn new(effect: &'a str) -> Self {
        Self {
            effect,
            reverted: Vec::new(),
        }
    }

    /// Names of the fields that were reverted, in check order.
    pub fn reverted(&self) -> &[&'static str] {
        &self.reverted
    }

    fn revert<T: std::fmt::Debug>(&mut self, name: &'static str, value: &mut T, default: T) {
        log::warn!(
            "{}: invalid {} {:?}, using default {:?}",
            self.effect,
            name,
            value,
            default
        );
        *value = default;
        self.reverted.push(name);
    }

    pub fn float(&mut self, name: &'static str, value: &mut f32, default: f32, min: f32, max: f32) -> &mut Self {
        if !(value.is_finite() && (min..=max).contains(&*value)) {
            self.revert(name, value, default);
        }
        self
    }

    pub fn count(&mut self, name: &'static str, value: &mut usize, default: usize, min: usize, max: usize) -> &mut Self {
        if !(min..=max).contains(&*value) {
            self.revert(name, value, default);
        }
        self
    }

    pub fn vec3(&mut self, name: &'static str, value: &mut [f32; 3], default: [f32; 3], min: f32, max: f32) -> &mut Self {
        if !value.iter().all(|c| c.is_finite() && (min..=max).contains(c)) {
            self.revert(name, value, default);
        }
        self
    }

    pub fn color(&mut self, name: &'static str, value: &mut [f32; 3], default: [f32; 3]) -> &mut Self {
        self.vec3(name, value, default, 0.0, 1.0)
    }

    pub fn choice(&mut self, name: &'static str, value: &mut String, default: &str, options: &[&str]) -> &mut Self {
        if !options.contains(&value.as_str()) {
            self.revert(name, value, default.to_string());
        }
        self
    }

    pub fn indices(&mut self, name: &'static str, value: &mut Vec<usize>, default: &[usize], max: usize) -> &mut Self {
        if value.is_empty() || value.iter().any(|i| *i > max) {
            self.revert(name, value, default.to_vec());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_is_clamped() {
        let def = ParamDef::float("speed", 1.0, 0.0, 3.0);
        assert_eq!(def.coerce(ParamValue::Float(5.0)).unwrap(), ParamValue::Float(3.0));
        assert_eq!(def.coerce(ParamValue::Float(-1.0)).unwrap(), ParamValue::Float(0.0));
    }

    #[test]
    fn test_int_rejects_fractions() {
        let def = ParamDef::int("count", 7, 0, 30);
        assert!(def.coerce(ParamValue::Float(2.5)).is_err());
        assert_eq!(def.coerce(ParamValue::Float(99.0)).unwrap(), ParamValue::Float(30.0));
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let def = ParamDef::float("size", 1.0, 0.0, 3.0);
        assert!(def.coerce(ParamValue::Bool(true)).is_err());
    }

    #[test]
    fn test_choice_must_be_listed() {
        let def = ParamDef::choice("texture", "flame_04", &["flame_01", "flame_04"]);
        assert!(def.coerce(ParamValue::Text("flame_01".into())).is_ok());
        assert!(def.coerce(ParamValue::Text("flame_09".into())).is_err());
    }

    #[test]
    fn test_indices_accept_vec3_shape() {
        let def = ParamDef::indices("texOffsetIndex", &[0, 1, 2], 8);
        assert_eq!(
            def.coerce(ParamValue::Vec3([4.0, 5.0, 6.0])).unwrap(),
            ParamValue::Indices(vec![4, 5, 6])
        );
        assert!(def.coerce(ParamValue::Indices(vec![9])).is_err());
        assert!(def.coerce(ParamValue::Indices(Vec::new())).is_err());
    }

    #[test]
    fn test_untagged_deserialization() {
        let v: ParamValue = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(v, ParamValue::Indices(vec![1, 2, 3, 4]));
        let v: ParamValue = serde_json::from_str("[0, 1, 0]").unwrap();
        assert_eq!(v, ParamValue::Vec3([0.0, 1.0, 0.0]));
        let v: ParamValue = serde_json::from_str("12").unwrap();
        assert_eq!(v, ParamValue::Float(12.0));
    }

    #[test]
    fn test_find_reports_unknown_names() {
        let defs = vec![ParamDef::float("speed", 1.0, 0.0, 3.0)];
        assert!(find(&defs, "speed").is_ok());
        let err = find(&defs, "sped").unwrap_err().to_string();
        assert!(err.contains("speed"));
    }

    #[test]
    fn test_config_check_reverts_invalid_fields() {
        let mut speed = -1.0;
        let mut size = f32::NAN;
        let mut height = 2.0;
        let mut count = 5000;
        let mut color = [0.5, 1.5, 0.0];
        let mut cells = vec![1, 9];

        let mut check = ConfigCheck::new("test");
        check
            .float("speed", &mut speed, 1.0, 0.0, 3.0)
            .float("size", &mut size, 1.0, 0.0, 3.0)
            .float("height", &mut height, 1.0, 0.0, 3.0)
            .count("count", &mut count, 7, 0, 30)
            .color("color", &mut color, [1.0, 1.0, 1.0])
            .indices("cells", &mut cells, &[0, 1], 8);

        assert_eq!(check.reverted(), &["speed", "size", "count", "color", "cells"]);
        assert_eq!(speed, 1.0);
        assert_eq!(size, 1.0);
        assert_eq!(height, 2.0);
        assert_eq!(count, 7);
        assert_eq!(color, [1.0, 1.0, 1.0]);
        assert_eq!(cells, vec![0, 1]);
    }

    #[test]
    fn test_config_check_choice() {
        let mut texture = "flame_09".to_string();
        let mut check = ConfigCheck::new("test");
        check.choice("texture", &mut texture, "flame_04", &["flame_01", "flame_04"]);
        assert_eq!(texture, "flame_04");
        assert_eq!(check.reverted(), &["texture"]);
    }
}
