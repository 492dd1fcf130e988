//! Single puff of smoke: three concentric shells of particles that expand
//! and dissolve, then wait in `Done` until triggered again.

use std::f32::consts::TAU;

use anyhow::{bail, Result};
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::effect::{Effect, EffectContext, EffectCore};
use crate::effects::EffectKind;
use crate::geometry::{Geometry, PointCloud};
use crate::lifecycle::{EffectState, Lifecycle, LifecyclePolicy};
use crate::material::{color_from_hex, Material, UniformValue};
use crate::panel::{ConfigCheck, ParamDef, ParamValue};
use crate::scene_graph::NodeId;
use crate::seed::{self, Bounds, DelayLayout, PositionLayout, SeedBuffer, SeedLayout, SeedRng};
use crate::texture;

/// (radius, particle count) per shell, inside out.
pub const SHELLS: [(f32, usize); 3] = [(0.05, 20), (0.15, 24), (0.18, 32)];
const DURATION: f32 = 1.0;
/// The puff plays at half the configured speed.
const RATE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmokePuffConfig {
    pub speed: f32,
    pub size: f32,
    /// Mesh scale the puff grows to.
    pub scale: f32,
    pub color1: [f32; 3],
    pub color2: [f32; 3],
    pub noise_texture: String,
}

impl Default for SmokePuffConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            size: 1.0,
            scale: 1.0,
            color1: color_from_hex(0xf7feff),
            color2: color_from_hex(0xf8f8f8),
            noise_texture: texture::PERLIN.to_string(),
        }
    }
}

impl SmokePuffConfig {
    /// Revert fields outside their panel range to the defaults.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::SmokePuff.name())
            .float("scale", &mut self.scale, d.scale, 0.0, 10.0)
            .float("speed", &mut self.speed, d.speed, 0.0, 5.0)
            .float("size", &mut self.size, d.size, 0.0, 10.0)
            .color("color1", &mut self.color1, d.color1)
            .color("color2", &mut self.color2, d.color2);
        self
    }
}

pub fn shell_layout(radius: f32) -> SeedLayout {
    SeedLayout::new(PositionLayout::Shell { radius })
        .with_scale(Bounds::new(0.4, 1.0))
        .with_delay(DelayLayout::Uniform(Bounds::new(0.0, 0.8)))
}

/// Every shell, concatenated inside out.
pub fn generate_shells(rng: &mut SeedRng) -> SeedBuffer {
    let mut buffer = SeedBuffer::default();
    for (radius, count) in SHELLS {
        buffer.extend(seed::generate(count, &shell_layout(radius), rng));
    }
    buffer
}

pub struct SmokePuff {
    core: EffectCore,
    config: SmokePuffConfig,
    rng: SeedRng,
}

impl SmokePuff {
    pub fn new(config: SmokePuffConfig, ctx: &mut EffectContext<'_>, parent: NodeId, seed: u64) -> Self {
        let config = config.validated();
        let policy = LifecyclePolicy::one_shot(DURATION)
            .with_rate(RATE)
            .finishing_in(EffectState::Done)
            .resetting_on_finish();
        let lifecycle = Lifecycle::new(policy, config.speed);
        let mut puff = Self {
            core: EffectCore::new(EffectKind::SmokePuff.name(), lifecycle, parent),
            config,
            rng: seed::seeded_rng(seed),
        };
        let (geometry, material) = puff.representation(ctx);
        puff.core.mount(ctx, geometry, material);
        puff
    }

    fn representation(&mut self, ctx: &EffectContext<'_>) -> (Geometry, Material) {
        let seeds = generate_shells(&mut self.rng);
        let geometry = PointCloud::new(seeds.positions_array())
            .with_scalar("aScale", seeds.scales)
            .with_scalar("aDelay", seeds.delays);

        let c = &self.config;
        let material = Material::builder("SmokePuff")
            .uniform("uSize", UniformValue::Float(c.size * ctx.settings.pixel_ratio))
            .uniform("uMeshScale", UniformValue::Float(1.0))
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uResolution", ctx.settings.resolution_uniform())
            .uniform("uTexture", UniformValue::Texture(ctx.textures.resolve(&c.noise_texture)))
            .uniform("uColor1", UniformValue::Color(c.color1))
            .uniform("uColor2", UniformValue::Color(c.color2))
            .transparent(true)
            .depth_test(false)
            .build();

        (Geometry::Points(geometry), material)
    }

    /// Start a puff that grows to `scale + add_scale`, with a random roll
    /// around the view axis. `speed` sticks for later puffs.
    pub fn activate_with(
        &mut self,
        ctx: &mut EffectContext<'_>,
        position: Option<Vec3>,
        add_scale: f32,
        speed: f32,
    ) {
        if !self.core.activate(ctx.scene, position) {
            return;
        }
        let mesh_scale = self.config.scale + add_scale;
        let roll = self.rng.gen_range(0.0..TAU);
        if let Some(t) = self.core.transform_mut(ctx.scene) {
            t.rotation.z = roll;
            t.scale = Vec3::splat(mesh_scale);
        }
        self.core
            .set_uniform(ctx.scene, "uMeshScale", UniformValue::Float(mesh_scale));
        self.config.speed = speed;
        self.core.lifecycle.speed = speed;
    }
}

impl Effect for SmokePuff {
    fn kind(&self) -> EffectKind {
        EffectKind::SmokePuff
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

    fn activate(&mut self, ctx: &mut EffectContext<'_>, position: Option<Vec3>) {
        let speed = self.config.speed;
        self.activate_with(ctx, position, 0.0, speed);
    }

    fn resize(&mut self, ctx: &mut EffectContext<'_>) {
        self.core.resize(ctx);
        let size = self.config.size * ctx.settings.pixel_ratio;
        self.core.set_uniform(ctx.scene, "uSize", UniformValue::Float(size));
    }

    fn params(&self) -> Vec<ParamDef> {
        let c = &self.config;
        vec![
            ParamDef::float("scale", c.scale, 0.0, 10.0).with_description("Destination mesh scale"),
            ParamDef::float("speed", c.speed, 0.0, 5.0),
            ParamDef::float("size", c.size, 0.0, 10.0),
            ParamDef::color("color1", c.color1).with_description("Main color"),
            ParamDef::color("color2", c.color2).with_description("Rim color"),
        ]
    }

    fn set_param(&mut self, ctx: &mut EffectContext<'_>, name: &str, value: &ParamValue) -> Result<()> {
        match (name, value) {
            // Takes effect on the next activation
            ("scale", ParamValue::Float(v)) => self.config.scale = *v,
            ("speed", ParamValue::Float(v)) => {
                self.config.speed = *v;
                self.core.lifecycle.speed = *v;
            }
            ("size", ParamValue::Float(v)) => {
                self.config.size = *v;
                let size = *v * ctx.settings.pixel_ratio;
                self.core.set_uniform(ctx.scene, "uSize", UniformValue::Float(size));
            }
            ("color1", ParamValue::Vec3(v)) => {
                self.config.color1 = *v;
                self.core.set_uniform(ctx.scene, "uColor1", UniformValue::Color(*v));
            }
            ("color2", ParamValue::Vec3(v)) => {
                self.config.color2 = *v;
                self.core.set_uniform(ctx.scene, "uColor2", UniformValue::Color(*v));
            }
            _ => bail!("smoke_puff cannot apply {:?} to '{}'", value, name),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::Fixture;

    fn puff(fx: &mut Fixture) -> SmokePuff {
        let root = fx.root();
        SmokePuff::new(SmokePuffConfig::default(), &mut fx.ctx(), root, 21)
    }

    #[test]
    fn test_shells_hold_76_particles() {
        let buffer = generate_shells(&mut seed::seeded_rng(0));
        assert_eq!(buffer.len(), 76);
        assert!((buffer.positions[0].length() - 0.05).abs() < 1e-5);
        assert!((buffer.positions[75].length() - 0.18).abs() < 1e-5);
        assert!(buffer.delays.iter().all(|d| (0.0..0.8).contains(d)));
    }

    #[test]
    fn test_runs_at_half_rate_into_done() {
        let mut fx = Fixture::new();
        let mut puff = puff(&mut fx);
        puff.activate(&mut fx.ctx(), None);

        puff.update(&mut fx.ctx(), 1.0);
        assert_eq!(puff.elapsed(), 0.5);
        assert!(puff.is_visible());

        puff.update(&mut fx.ctx(), 1.5);
        assert_eq!(puff.state(), EffectState::Done);
        assert_eq!(puff.elapsed(), 0.0);
        assert!(!puff.is_visible());
    }

    #[test]
    fn test_activate_with_extra_scale() {
        let mut fx = Fixture::new();
        let mut puff = puff(&mut fx);
        puff.activate_with(&mut fx.ctx(), Some(Vec3::X), 0.5, 2.0);

        let transform = puff.core().transform(&fx.scene).unwrap();
        assert_eq!(transform.scale, Vec3::splat(1.5));
        assert!((0.0..TAU).contains(&transform.rotation.z));
        assert_eq!(
            puff.core().uniform(&fx.scene, "uMeshScale"),
            Some(UniformValue::Float(1.5))
        );

        puff.update(&mut fx.ctx(), 0.5);
        assert_eq!(puff.elapsed(), 0.5);
    }

    #[test]
    fn test_done_is_reenterable() {
        let mut fx = Fixture::new();
        let mut puff = puff(&mut fx);
        puff.activate(&mut fx.ctx(), None);
        puff.update(&mut fx.ctx(), 3.0);
        assert_eq!(puff.state(), EffectState::Done);

        puff.activate(&mut fx.ctx(), None);
        assert_eq!(puff.state(), EffectState::On);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let config = SmokePuffConfig {
            speed: -3.0,
            size: 50.0,
            color1: [0.0, -1.0, 0.0],
            ..SmokePuffConfig::default()
        };
        let mut puff = SmokePuff::new(config, &mut fx.ctx(), root, 21);

        assert_eq!(
            puff.core().uniform(&fx.scene, "uSize"),
            Some(UniformValue::Float(1.0))
        );
        assert_eq!(
            puff.core().uniform(&fx.scene, "uColor1"),
            Some(UniformValue::Color(color_from_hex(0xf7feff)))
        );

        puff.activate(&mut fx.ctx(), None);
        puff.update(&mut fx.ctx(), 2.5);
        assert_eq!(puff.state(), EffectState::Done);
    }
}
