//! Iridescent soap bubble that can be popped.

use anyhow::{bail, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::effect::{Effect, EffectContext, EffectCore};
use crate::effects::EffectKind;
use crate::geometry::{Geometry, MeshData};
use crate::gpu::mesh;
use crate::lifecycle::{EffectState, Lifecycle, LifecyclePolicy, Step};
use crate::material::{BlendMode, Material, Side, UniformValue};
use crate::panel::{ConfigCheck, ParamDef, ParamValue};
use crate::scene_graph::{NodeId, Transform};

const SEGMENTS: u32 = 32;
const POP_DURATION: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RainbowBubbleConfig {
    pub radius: f32,
    pub scale: f32,
    pub speed: f32,
}

impl Default for RainbowBubbleConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            scale: 1.0,
            speed: 1.0,
        }
    }
}

impl RainbowBubbleConfig {
    /// Revert fields outside their panel range to the defaults.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::RainbowBubble.name())
            .float("radius", &mut self.radius, d.radius, 0.01, 10.0)
            .float("scale", &mut self.scale, d.scale, 0.0, 5.0)
            .float("speed", &mut self.speed, d.speed, 0.0, 5.0);
        self
    }
}

pub struct RainbowBubble {
    core: EffectCore,
    config: RainbowBubbleConfig,
}

impl RainbowBubble {
    pub fn new(config: RainbowBubbleConfig, ctx: &mut EffectContext<'_>, parent: NodeId) -> Self {
        let config = config.validated();
        let policy = LifecyclePolicy::looping().with_pop(POP_DURATION);
        let lifecycle = Lifecycle::new(policy, config.speed);
        let core = EffectCore::new(EffectKind::RainbowBubble.name(), lifecycle, parent)
            .with_transform(Transform::default().with_uniform_scale(config.scale));

        let geometry = MeshData::new(mesh::create_sphere_geometry(config.radius, SEGMENTS, SEGMENTS));
        let material = Material::builder("RainbowBubble")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uPop", UniformValue::Float(0.0))
            .blend_mode(BlendMode::Additive)
            .transparent(true)
            .side(Side::Double)
            .build();

        let mut bubble = Self { core, config };
        bubble.core.mount(ctx, Geometry::Mesh(geometry), material);
        bubble
    }

    /// Pop progress in 0-1, 0 outside the pop phase.
    fn pop_progress(&self) -> f32 {
        match self.core.lifecycle.state() {
            EffectState::Pop => (self.core.lifecycle.elapsed() / POP_DURATION).min(1.0),
            _ => 0.0,
        }
    }

    fn write_pop(&self, ctx: &mut EffectContext<'_>) {
        let progress = self.pop_progress();
        self.core.set_uniform(ctx.scene, "uPop", UniformValue::Float(progress));
    }
}

impl Effect for RainbowBubble {
    fn kind(&self) -> EffectKind {
        EffectKind::RainbowBubble
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn activate(&mut self, ctx: &mut EffectContext<'_>, position: Option<Vec3>) {
        self.core.activate(ctx.scene, position);
        self.write_pop(ctx);
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, delta: f32) -> Option<Step> {
        let step = self.core.update(ctx.scene, delta)?;
        self.write_pop(ctx);
        Some(step)
    }

    fn pop(&mut self, ctx: &mut EffectContext<'_>) {
        self.core.pop(ctx.scene);
        self.write_pop(ctx);
    }

    fn params(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::float("scale", self.config.scale, 0.0, 5.0),
            ParamDef::float("speed", self.config.speed, 0.0, 5.0),
        ]
    }

    fn set_param(&mut self, ctx: &mut EffectContext<'_>, name: &str, value: &ParamValue) -> Result<()> {
        match (name, value) {
            ("scale", ParamValue::Float(v)) => {
                self.config.scale = *v;
                if let Some(t) = self.core.transform_mut(ctx.scene) {
                    t.scale = Vec3::splat(*v);
                }
            }
            ("speed", ParamValue::Float(v)) => {
                self.config.speed = *v;
                self.core.lifecycle.speed = *v;
            }
            _ => bail!("rainbow_bubble cannot apply {:?} to '{}'", value, name),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::Fixture;

    fn bubble(fx: &mut Fixture) -> RainbowBubble {
        let root = fx.root();
        RainbowBubble::new(RainbowBubbleConfig::default(), &mut fx.ctx(), root)
    }

    #[test]
    fn test_pop_progress_drives_uniform() {
        let mut fx = Fixture::new();
        let mut bubble = bubble(&mut fx);
        bubble.activate(&mut fx.ctx(), None);
        bubble.update(&mut fx.ctx(), 3.0);

        bubble.pop(&mut fx.ctx());
        assert_eq!(bubble.state(), EffectState::Pop);
        bubble.update(&mut fx.ctx(), 0.25);
        assert_eq!(
            bubble.core().uniform(&fx.scene, "uPop"),
            Some(UniformValue::Float(0.25))
        );
        assert!(bubble.is_visible());

        bubble.update(&mut fx.ctx(), 1.0);
        assert_eq!(bubble.state(), EffectState::Off);
        assert!(!bubble.is_visible());
    }

    #[test]
    fn test_stop_resets_elapsed() {
        let mut fx = Fixture::new();
        let mut bubble = bubble(&mut fx);
        bubble.activate(&mut fx.ctx(), None);
        bubble.update(&mut fx.ctx(), 2.0);

        bubble.stop(&mut fx.ctx());
        assert_eq!(bubble.elapsed(), 0.0);
        assert_eq!(bubble.state(), EffectState::Off);
    }

    #[test]
    fn test_pop_while_off_is_ignored() {
        let mut fx = Fixture::new();
        let mut bubble = bubble(&mut fx);
        bubble.pop(&mut fx.ctx());
        assert_eq!(bubble.state(), EffectState::Off);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let config = RainbowBubbleConfig {
            radius: -2.0,
            speed: f32::NAN,
            scale: 2.0,
        };
        let mut bubble = RainbowBubble::new(config, &mut fx.ctx(), root);

        let node = bubble.core().node().unwrap();
        let rep = fx.scene.get(node).unwrap().representation().unwrap();
        let Geometry::Mesh(mesh) = &rep.geometry else {
            panic!("bubble should be a mesh");
        };
        let radius = mesh
            .vertices
            .iter()
            .map(|v| Vec3::from_array(v.position).length())
            .fold(0.0, f32::max);
        assert!((radius - 1.0).abs() < 1e-5);
        assert_eq!(bubble.core().transform(&fx.scene).unwrap().scale, Vec3::splat(2.0));

        bubble.activate(&mut fx.ctx(), None);
        bubble.update(&mut fx.ctx(), 0.5);
        assert_eq!(bubble.elapsed(), 0.5);
    }
}
