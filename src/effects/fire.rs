//! One-second burst of fire particles sampled from a flame sprite.

use anyhow::{bail, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::effect::{Effect, EffectContext, EffectCore};
use crate::effects::EffectKind;
use crate::geometry::{Geometry, PointCloud};
use crate::lifecycle::{Lifecycle, LifecyclePolicy};
use crate::material::{color_from_hex, BlendMode, Material, UniformValue};
use crate::panel::{ConfigCheck, ParamApply, ParamDef, ParamValue};
use crate::scene_graph::{NodeId, Transform};
use crate::seed::{self, Bounds, DelayLayout, PositionLayout, SeedLayout, SeedRng};
use crate::texture;

const DURATION: f32 = 1.0;
const SIZE_FACTOR: f32 = 3.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FireConfig {
    pub particle_count: usize,
    pub size: f32,
    /// Uniform scale of the whole burst.
    pub scale: f32,
    pub speed: f32,
    pub color1: [f32; 3],
    pub color2: [f32; 3],
    /// One of the `flame_0N` sprites.
    pub flame_texture: String,
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            particle_count: 100,
            size: 1.0,
            scale: 1.0,
            speed: 1.0,
            color1: color_from_hex(0xe38500),
            color2: color_from_hex(0xb08100),
            flame_texture: texture::FLAMES[3].to_string(),
        }
    }
}

impl FireConfig {
    /// Revert fields outside their panel range to the defaults.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::Fire.name())
            .choice("flameTexture", &mut self.flame_texture, &d.flame_texture, &texture::FLAMES)
            .color("color1", &mut self.color1, d.color1)
            .color("color2", &mut self.color2, d.color2)
            .float("speed", &mut self.speed, d.speed, 0.1, 2.0)
            .float("scale", &mut self.scale, d.scale, 0.1, 5.0)
            .float("size", &mut self.size, d.size, 0.1, 3.0)
            .count("particleCount", &mut self.particle_count, d.particle_count, 1, 500);
        self
    }
}

pub fn seed_layout() -> SeedLayout {
    SeedLayout::new(PositionLayout::Box {
        x: Bounds::symmetric(0.1),
        y: Bounds::symmetric(0.05),
        z: Bounds::symmetric(0.1),
    })
    .with_scale(Bounds::new(0.5, 1.5))
    .with_delay(DelayLayout::Uniform(Bounds::new(0.0, 1.0)))
    .with_extra("aMixColorRatio", Bounds::new(0.0, 0.8))
}

pub struct Fire {
    core: EffectCore,
    config: FireConfig,
    rng: SeedRng,
}

impl Fire {
    pub fn new(config: FireConfig, ctx: &mut EffectContext<'_>, parent: NodeId, seed: u64) -> Self {
        let config = config.validated();
        let lifecycle = Lifecycle::new(LifecyclePolicy::one_shot(DURATION), config.speed);
        let core = EffectCore::new(EffectKind::Fire.name(), lifecycle, parent)
            .with_transform(Transform::default().with_uniform_scale(config.scale));
        let mut fire = Self {
            core,
            config,
            rng: seed::seeded_rng(seed),
        };
        let (geometry, material) = fire.representation(ctx);
        fire.core.mount(ctx, geometry, material);
        fire
    }

    pub fn config(&self) -> &FireConfig {
        &self.config
    }

    fn representation(&mut self, ctx: &EffectContext<'_>) -> (Geometry, Material) {
        let mut seeds = seed::generate(self.config.particle_count, &seed_layout(), &mut self.rng);
        let mix = seeds.take_extra("aMixColorRatio");
        let geometry = PointCloud::new(seeds.positions_array())
            .with_scalar("aMixColorRatio", mix)
            .with_scalar("aScale", seeds.scales)
            .with_scalar("aDelay", seeds.delays);

        let c = &self.config;
        let material = Material::builder("Fire")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uPixelRatio", UniformValue::Float(ctx.settings.pixel_ratio))
            .uniform("uSize", UniformValue::Float(SIZE_FACTOR * c.size))
            .uniform("uResolution", ctx.settings.resolution_uniform())
            .uniform("uNoiseTex", UniformValue::Texture(ctx.textures.resolve(texture::PERLIN)))
            .uniform("uFlameTex", UniformValue::Texture(ctx.textures.resolve(&c.flame_texture)))
            .uniform("uColor1", UniformValue::Color(c.color1))
            .uniform("uColor2", UniformValue::Color(c.color2))
            .blend_mode(BlendMode::Additive)
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

impl Effect for Fire {
    fn kind(&self) -> EffectKind {
        EffectKind::Fire
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
            ParamDef::choice("flameTexture", &c.flame_texture, &texture::FLAMES),
            ParamDef::color("color1", c.color1).with_description("Light color"),
            ParamDef::color("color2", c.color2).with_description("Dark color"),
            ParamDef::float("speed", c.speed, 0.1, 2.0),
            ParamDef::float("scale", c.scale, 0.1, 5.0),
            ParamDef::float("size", c.size, 0.1, 3.0),
            ParamDef::int("particleCount", c.particle_count, 1, 500).with_apply(ParamApply::Rebuild),
        ]
    }

    fn set_param(&mut self, ctx: &mut EffectContext<'_>, name: &str, value: &ParamValue) -> Result<()> {
        match (name, value) {
            ("flameTexture", ParamValue::Text(v)) => {
                self.config.flame_texture = v.clone();
                let handle = ctx.textures.resolve(v);
                self.core.set_uniform(ctx.scene, "uFlameTex", UniformValue::Texture(handle));
            }
            ("color1", ParamValue::Vec3(v)) => {
                self.config.color1 = *v;
                self.core.set_uniform(ctx.scene, "uColor1", UniformValue::Color(*v));
            }
            ("color2", ParamValue::Vec3(v)) => {
                self.config.color2 = *v;
                self.core.set_uniform(ctx.scene, "uColor2", UniformValue::Color(*v));
            }
            ("speed", ParamValue::Float(v)) => {
                self.config.speed = *v;
                self.core.lifecycle.speed = *v;
            }
            ("scale", ParamValue::Float(v)) => {
                self.config.scale = *v;
                if let Some(t) = self.core.transform_mut(ctx.scene) {
                    t.scale = Vec3::splat(*v);
                }
            }
            ("size", ParamValue::Float(v)) => {
                self.config.size = *v;
                self.core
                    .set_uniform(ctx.scene, "uSize", UniformValue::Float(SIZE_FACTOR * *v));
            }
            ("particleCount", ParamValue::Float(v)) => {
                self.config.particle_count = *v as usize;
                self.rebuild(ctx);
            }
            _ => bail!("fire cannot apply {:?} to '{}'", value, name),
        }
        Ok(())
    }
}
