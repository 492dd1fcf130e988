//! Continuous flame sheet rising from a flat base.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::effect::{Effect, EffectContext, EffectCore};
use crate::effects::EffectKind;
use crate::geometry::{Geometry, PointCloud};
use crate::lifecycle::{Lifecycle, LifecyclePolicy};
use crate::material::{color_from_hex, BlendMode, Material, UniformValue};
use crate::panel::{ConfigCheck, ParamApply, ParamDef, ParamValue};
use crate::scene_graph::NodeId;
use crate::seed::{self, Bounds, DelayLayout, PositionLayout, SeedLayout, SeedRng};

const SIZE_FACTOR: f32 = 0.86;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlameConfig {
    pub particle_count: usize,
    pub size: f32,
    pub speed: f32,
    pub color1: [f32; 3],
    pub color2: [f32; 3],
}

impl Default for FlameConfig {
    fn default() -> Self {
        Self {
            particle_count: 100,
            size: 1.0,
            speed: 0.5,
            color1: color_from_hex(0xffffff),
            color2: color_from_hex(0xd1d1d1),
        }
    }
}

impl FlameConfig {
    /// Revert fields outside their panel range to the defaults.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::Flame.name())
            .float("speed", &mut self.speed, d.speed, 0.0, 3.0)
            .float("size", &mut self.size, d.size, 0.0, 5.0)
            .color("color1", &mut self.color1, d.color1)
            .color("color2", &mut self.color2, d.color2)
            .count("particleCount", &mut self.particle_count, d.particle_count, 1, 500);
        self
    }
}

pub fn seed_layout() -> SeedLayout {
    SeedLayout::new(PositionLayout::Box {
        x: Bounds::symmetric(1.0),
        y: Bounds::new(-1.0, -0.8),
        z: Bounds::symmetric(0.2),
    })
    .with_scale(Bounds::new(1.0, 1.4))
    .with_delay(DelayLayout::Uniform(Bounds::new(0.0, 1.0)))
}

pub struct Flame {
    core: EffectCore,
    config: FlameConfig,
    rng: SeedRng,
}

impl Flame {
    pub fn new(config: FlameConfig, ctx: &mut EffectContext<'_>, parent: NodeId, seed: u64) -> Self {
        let config = config.validated();
        let lifecycle = Lifecycle::new(LifecyclePolicy::looping(), config.speed);
        let mut flame = Self {
            core: EffectCore::new(EffectKind::Flame.name(), lifecycle, parent),
            config,
            rng: seed::seeded_rng(seed),
        };
        let (geometry, material) = flame.representation(ctx);
        flame.core.mount(ctx, geometry, material);
        flame
    }

    fn representation(&mut self, ctx: &EffectContext<'_>) -> (Geometry, Material) {
        let seeds = seed::generate(self.config.particle_count, &seed_layout(), &mut self.rng);
        let geometry = PointCloud::new(seeds.positions_array())
            .with_scalar("aScale", seeds.scales)
            .with_scalar("aDelay", seeds.delays);

        let c = &self.config;
        let material = Material::builder("Flame")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uPixelRatio", UniformValue::Float(ctx.settings.pixel_ratio))
            .uniform("uSize", UniformValue::Float(SIZE_FACTOR * c.size))
            .uniform("uResolution", ctx.settings.resolution_uniform())
            .uniform("uColor1", UniformValue::Color(c.color1))
            .uniform("uColor2", UniformValue::Color(c.color2))
            .blend_mode(BlendMode::Additive)
            .transparent(true)
            .depth_test(false)
            .build();

        (Geometry::Points(geometry), material)
    }

    fn rebuild(&mut self, ctx: &mut EffectContext<'_>) {
        if self.core.lifecycle.is_disposed() {
            return;
        }
        let (geometry, material) = self.representation(ctx);
        self.core.rebuild(ctx, geometry, material);
    }
}

impl Effect for Flame {
    fn kind(&self) -> EffectKind {
        EffectKind::Flame
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn particle_count(&self) -> usize {
        self.core.vertex_count()
    }

    fn params(&self) -> Vec<ParamDef> {
        let c = &self.config;
        vec![
            ParamDef::float("speed", c.speed, 0.0, 3.0),
            ParamDef::float("size", c.size, 0.0, 5.0),
            ParamDef::color("color1", c.color1).with_description("Main color"),
            ParamDef::color("color2", c.color2).with_description("Rim color"),
            ParamDef::int("particleCount", c.particle_count, 1, 500).with_apply(ParamApply::Rebuild),
        ]
    }

    fn set_param(&mut self, ctx: &mut EffectContext<'_>, name: &str, value: &ParamValue) -> Result<()> {
        match (name, value) {
            ("speed", ParamValue::Float(v)) => {
                self.config.speed = *v;
                self.core.lifecycle.speed = *v;
            }
            ("size", ParamValue::Float(v)) => {
                self.config.size = *v;
                self.core
                    .set_uniform(ctx.scene, "uSize", UniformValue::Float(SIZE_FACTOR * *v));
            }
            ("color1", ParamValue::Vec3(v)) => {
                self.config.color1 = *v;
                self.core.set_uniform(ctx.scene, "uColor1", UniformValue::Color(*v));
            }
            ("color2", ParamValue::Vec3(v)) => {
                self.config.color2 = *v;
                self.core.set_uniform(ctx.scene, "uColor2", UniformValue::Color(*v));
            }
            ("particleCount", ParamValue::Float(v)) => {
                self.config.particle_count = *v as usize;
                self.rebuild(ctx);
            }
            _ => bail!("flame cannot apply {:?} to '{}'", value, name),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::Fixture;
    use crate::lifecycle::EffectState;

    #[test]
    fn test_loops_until_stopped() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let mut flame = Flame::new(FlameConfig::default(), &mut fx.ctx(), root, 8);

        flame.activate(&mut fx.ctx(), None);
        for _ in 0..100 {
            flame.update(&mut fx.ctx(), 1.0);
        }
        assert_eq!(flame.state(), EffectState::On);
        // half speed by default
        assert_eq!(flame.elapsed(), 50.0);

        flame.stop(&mut fx.ctx());
        assert!(!flame.is_visible());
    }

    #[test]
    fn test_disables_depth_test() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let flame = Flame::new(FlameConfig::default(), &mut fx.ctx(), root, 8);
        let material = flame.core().material(&fx.scene).unwrap();

        assert!(!material.depth_test);
        assert_eq!(material.float("uSize"), Some(0.86));
    }

    #[test]
    fn test_seeds_stay_in_layout() {
        let layout = seed_layout();
        let buffer = seed::generate(100, &layout, &mut seed::seeded_rng(2));
        assert!(seed::within_layout(&buffer, &layout));
        assert!(buffer.positions.iter().all(|p| p.y < -0.8 + f32::EPSILON));
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let config = FlameConfig {
            speed: -2.0,
            size: 9.0,
            particle_count: 0,
            ..FlameConfig::default()
        };
        let mut flame = Flame::new(config, &mut fx.ctx(), root, 8);

        assert_eq!(flame.particle_count(), 100);
        let material = flame.core().material(&fx.scene).unwrap();
        assert_eq!(material.float("uSize"), Some(0.86));

        flame.activate(&mut fx.ctx(), None);
        flame.update(&mut fx.ctx(), 1.0);
        assert_eq!(flame.elapsed(), 0.5);
    }
}
