//! Confetti burst that flies out along a direction and settles.

use std::f32::consts::TAU;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::effect::{restart_with, Effect, EffectContext, EffectCore};
use crate::effects::EffectKind;
use crate::geometry::{Geometry, PointCloud};
use crate::lifecycle::{Lifecycle, LifecyclePolicy};
use crate::material::{BlendMode, Material, UniformValue};
use crate::panel::{ConfigCheck, ParamApply, ParamDef, ParamValue};
use crate::scene_graph::NodeId;
use crate::seed::{self, Bounds, PositionLayout, SeedLayout, SeedRng};
use crate::texture;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfettiConfig {
    pub count: usize,
    pub size: f32,
    pub hue_offset: f32,
    pub hue_range: f32,
    pub saturation: f32,
    pub direction: [f32; 3],
    /// Seconds a burst lasts.
    pub duration: f32,
    pub speed: f32,
}

impl Default for ConfettiConfig {
    fn default() -> Self {
        Self {
            count: 30,
            size: 1.0,
            hue_offset: 0.0,
            hue_range: TAU,
            saturation: 0.5,
            direction: [0.0, 1.0, 0.0],
            duration: 10.0,
            speed: 1.0,
        }
    }
}

impl ConfettiConfig {
    /// Revert fields outside their panel range to the defaults.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::Confetti.name())
            .float("speed", &mut self.speed, d.speed, 0.0, 3.0)
            .count("count", &mut self.count, d.count, 30, 100)
            .float("size", &mut self.size, d.size, 0.0, 3.0)
            .float("hueOffset", &mut self.hue_offset, d.hue_offset, 0.0, 1.0)
            .float("hueRange", &mut self.hue_range, d.hue_range, 0.0, TAU)
            .float("saturation", &mut self.saturation, d.saturation, 0.0, 1.0)
            .vec3("direction", &mut self.direction, d.direction, -1.0, 1.0)
            .float("duration", &mut self.duration, d.duration, 5.0, 20.0);
        self
    }
}

pub fn seed_layout() -> SeedLayout {
    SeedLayout::new(PositionLayout::Box {
        x: Bounds::symmetric(0.02),
        y: Bounds::symmetric(0.01),
        z: Bounds::symmetric(0.01),
    })
    .with_scale(Bounds::new(0.4, 1.0))
    .with_extra("aRadius", Bounds::new(0.2, 1.0))
    .with_extra("aRandom", Bounds::symmetric(1.0))
}

pub struct Confetti {
    core: EffectCore,
    config: ConfettiConfig,
    rng: SeedRng,
}

impl Confetti {
    pub fn new(config: ConfettiConfig, ctx: &mut EffectContext<'_>, parent: NodeId, seed: u64) -> Self {
        let config = config.validated();
        let policy = LifecyclePolicy::one_shot(config.duration);
        let lifecycle = Lifecycle::new(policy, config.speed);
        let mut confetti = Self {
            core: EffectCore::new(EffectKind::Confetti.name(), lifecycle, parent),
            config,
            rng: seed::seeded_rng(seed),
        };
        let (geometry, material) = confetti.representation(ctx);
        confetti.core.mount(ctx, geometry, material);
        confetti
    }

    pub fn config(&self) -> &ConfettiConfig {
        &self.config
    }

    fn representation(&mut self, ctx: &EffectContext<'_>) -> (Geometry, Material) {
        let mut seeds = seed::generate(self.config.count, &seed_layout(), &mut self.rng);
        let radii = seeds.take_extra("aRadius");
        let randoms = seeds.take_extra("aRandom");

        let geometry = PointCloud::new(seeds.positions_array())
            .with_scalar("aRadius", radii)
            .with_scalar("aScale", seeds.scales)
            .with_scalar("aRandom", randoms);

        let c = &self.config;
        let material = Material::builder("Confetti")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uResolution", ctx.settings.resolution_uniform())
            .uniform("uSize", UniformValue::Float(c.size))
            .uniform("uTexture", UniformValue::Texture(ctx.textures.resolve(texture::CONFETTI)))
            .uniform("uDirection", UniformValue::Vec3(c.direction))
            .uniform("uHueOffset", UniformValue::Float(c.hue_offset))
            .uniform("uHueRange", UniformValue::Float(c.hue_range))
            .uniform("uSaturation", UniformValue::Float(c.saturation))
            .uniform("uDuration", UniformValue::Float(c.duration))
            .blend_mode(BlendMode::AlphaBlend)
            .transparent(true)
            .depth_write(false)
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

impl Effect for Confetti {
    fn kind(&self) -> EffectKind {
        EffectKind::Confetti
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
            ParamDef::int("count", c.count, 30, 100).with_apply(ParamApply::Rebuild),
            ParamDef::float("size", c.size, 0.0, 3.0),
            ParamDef::float("hueOffset", c.hue_offset, 0.0, 1.0),
            ParamDef::float("hueRange", c.hue_range, 0.0, TAU),
            ParamDef::float("saturation", c.saturation, 0.0, 1.0),
            ParamDef::vec3("direction", c.direction, -1.0, 1.0)
                .with_apply(ParamApply::Restart)
                .with_description("Launch direction of the burst"),
            ParamDef::float("duration", c.duration, 5.0, 20.0).with_apply(ParamApply::Restart),
        ]
    }

    fn set_param(&mut self, ctx: &mut EffectContext<'_>, name: &str, value: &ParamValue) -> Result<()> {
        match (name, value) {
            ("speed", ParamValue::Float(v)) => {
                self.config.speed = *v;
                self.core.lifecycle.speed = *v;
            }
            ("count", ParamValue::Float(v)) => {
                self.config.count = *v as usize;
                self.rebuild(ctx);
            }
            ("size", ParamValue::Float(v)) => {
                self.config.size = *v;
                self.core.set_uniform(ctx.scene, "uSize", UniformValue::Float(*v));
            }
            ("hueOffset", ParamValue::Float(v)) => {
                self.config.hue_offset = *v;
                self.core.set_uniform(ctx.scene, "uHueOffset", UniformValue::Float(*v));
            }
            ("hueRange", ParamValue::Float(v)) => {
                self.config.hue_range = *v;
                self.core.set_uniform(ctx.scene, "uHueRange", UniformValue::Float(*v));
            }
            ("saturation", ParamValue::Float(v)) => {
                self.config.saturation = *v;
                self.core.set_uniform(ctx.scene, "uSaturation", UniformValue::Float(*v));
            }
            ("direction", ParamValue::Vec3(v)) => {
                let direction = *v;
                restart_with(self, ctx, |confetti, ctx| {
                    confetti.config.direction = direction;
                    confetti
                        .core
                        .set_uniform(ctx.scene, "uDirection", UniformValue::Vec3(direction));
                });
            }
            ("duration", ParamValue::Float(v)) => {
                let duration = *v;
                restart_with(self, ctx, |confetti, ctx| {
                    confetti.config.duration = duration;
                    confetti.core.lifecycle.set_duration(Some(duration));
                    confetti
                        .core
                        .set_uniform(ctx.scene, "uDuration", UniformValue::Float(duration));
                });
            }
            _ => bail!("confetti cannot apply {:?} to '{}'", value, name),
        }
        Ok(())
    }
}
