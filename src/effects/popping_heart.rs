//! Hearts that pop out of a point, rise and fade.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::effect::{Effect, EffectContext, EffectCore};
use crate::effects::EffectKind;
use crate::geometry::{Geometry, PointCloud};
use crate::lifecycle::{Lifecycle, LifecyclePolicy};
use crate::material::{BlendMode, Material, UniformValue};
use crate::panel::{ConfigCheck, ParamApply, ParamDef, ParamValue};
use crate::scene_graph::NodeId;
use crate::seed::{self, Bounds, DelayLayout, PositionLayout, SeedLayout, SeedRng};
use crate::texture;

const DURATION: f32 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoppingHeartConfig {
    pub count: usize,
    pub speed: f32,
    pub size: f32,
    pub height: f32,
}

impl Default for PoppingHeartConfig {
    fn default() -> Self {
        Self {
            count: 7,
            speed: 1.0,
            size: 1.0,
            height: 1.0,
        }
    }
}

impl PoppingHeartConfig {
    /// Revert fields outside their panel range to the defaults.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::PoppingHeart.name())
            .float("speed", &mut self.speed, d.speed, 0.0, 3.0)
            .count("count", &mut self.count, d.count, 0, 30)
            .float("size", &mut self.size, d.size, 0.0, 3.0)
            .float("height", &mut self.height, d.height, 0.0, 3.0);
        self
    }
}

pub fn seed_layout() -> SeedLayout {
    SeedLayout::new(PositionLayout::Box {
        x: Bounds::symmetric(0.02),
        y: Bounds::new(0.0, 0.01),
        z: Bounds::symmetric(0.01),
    })
    .with_scale(Bounds::new(0.5, 1.0))
    .with_delay(DelayLayout::Staggered {
        span: 2.0,
        jitter: Bounds::symmetric(0.1),
    })
}

pub struct PoppingHeart {
    core: EffectCore,
    config: PoppingHeartConfig,
    rng: SeedRng,
}

impl PoppingHeart {
    pub fn new(config: PoppingHeartConfig, ctx: &mut EffectContext<'_>, parent: NodeId, seed: u64) -> Self {
        let config = config.validated();
        let lifecycle = Lifecycle::new(LifecyclePolicy::one_shot(DURATION), config.speed);
        let mut heart = Self {
            core: EffectCore::new(EffectKind::PoppingHeart.name(), lifecycle, parent),
            config,
            rng: seed::seeded_rng(seed),
        };
        let (geometry, material) = heart.representation(ctx);
        heart.core.mount(ctx, geometry, material);
        heart
    }

    pub fn config(&self) -> &PoppingHeartConfig {
        &self.config
    }

    fn representation(&mut self, ctx: &EffectContext<'_>) -> (Geometry, Material) {
        let seeds = seed::generate(self.config.count, &seed_layout(), &mut self.rng);
        let geometry = PointCloud::new(seeds.positions_array())
            .with_scalar("aScale", seeds.scales)
            .with_scalar("aDelay", seeds.delays);

        let material = Material::builder("PoppingHeart")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uResolution", ctx.settings.resolution_uniform())
            .uniform("uSize", UniformValue::Float(self.config.size))
            .uniform("uTexture", UniformValue::Texture(ctx.textures.resolve(texture::HEART)))
            .uniform("uHeight", UniformValue::Float(self.config.height))
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

impl Effect for PoppingHeart {
    fn kind(&self) -> EffectKind {
        EffectKind::PoppingHeart
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
        vec![
            ParamDef::float("speed", self.config.speed, 0.0, 3.0),
            ParamDef::int("count", self.config.count, 0, 30).with_apply(ParamApply::Rebuild),
            ParamDef::float("size", self.config.size, 0.0, 3.0),
            ParamDef::float("height", self.config.height, 0.0, 3.0)
                .with_description("How far the hearts rise"),
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
            ("height", ParamValue::Float(v)) => {
                self.config.height = *v;
                self.core.set_uniform(ctx.scene, "uHeight", UniformValue::Float(*v));
            }
            _ => bail!("popping_heart cannot apply {:?} to '{}'", value, name),
        }
        Ok(())
    }
}
