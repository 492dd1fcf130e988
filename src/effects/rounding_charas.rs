//! Ring of character sprites orbiting a point. Each sprite samples one cell
//! of a 3x3 texture atlas.

use std::f32::consts::TAU;

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

pub const ATLAS_COLUMNS: usize = 3;
pub const ATLAS_CELLS: usize = ATLAS_COLUMNS * ATLAS_COLUMNS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoundingCharasConfig {
    pub count: usize,
    pub speed: f32,
    pub size: f32,
    pub radius: f32,
    /// Atlas cell per sprite, repeated when shorter than `count`.
    pub tex_offset_index: Vec<usize>,
}

impl Default for RoundingCharasConfig {
    fn default() -> Self {
        Self {
            count: 9,
            speed: 1.0,
            size: 1.0,
            radius: 1.0,
            tex_offset_index: (0..ATLAS_CELLS).collect(),
        }
    }
}

impl RoundingCharasConfig {
    /// Revert fields outside their panel range to the defaults. An empty
    /// `tex_offset_index` falls back to the full atlas.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::RoundingCharas.name())
            .float("speed", &mut self.speed, d.speed, 0.0, 3.0)
            .count("count", &mut self.count, d.count, 0, 30)
            .float("size", &mut self.size, d.size, 0.0, 10.0)
            .float("radius", &mut self.radius, d.radius, 0.0, 10.0)
            .indices("texOffsetIndex", &mut self.tex_offset_index, &d.tex_offset_index, ATLAS_CELLS - 1);
        self
    }
}

pub fn seed_layout() -> SeedLayout {
    SeedLayout::new(PositionLayout::Box {
        x: Bounds::fixed(0.0),
        y: Bounds::fixed(0.0),
        z: Bounds::new(0.0, 0.01),
    })
    .with_delay(DelayLayout::Staggered {
        span: 2.0,
        jitter: Bounds::symmetric(1.0),
    })
}

/// UV offset of atlas cell `index`, row-major from the top left.
pub fn atlas_offset(index: usize) -> [f32; 2] {
    let index = index.min(ATLAS_CELLS - 1);
    let step = 1.0 / ATLAS_COLUMNS as f32;
    [
        (index % ATLAS_COLUMNS) as f32 * step,
        (index / ATLAS_COLUMNS) as f32 * step,
    ]
}

/// Evenly spaced angles around the ring.
pub fn ring_angles(count: usize) -> Vec<f32> {
    (0..count).map(|i| TAU * i as f32 / count as f32).collect()
}

pub struct RoundingCharas {
    core: EffectCore,
    config: RoundingCharasConfig,
    rng: SeedRng,
}

impl RoundingCharas {
    pub fn new(
        config: RoundingCharasConfig,
        ctx: &mut EffectContext<'_>,
        parent: NodeId,
        seed: u64,
    ) -> Self {
        let config = config.validated();
        let lifecycle = Lifecycle::new(LifecyclePolicy::looping(), config.speed);
        let mut charas = Self {
            core: EffectCore::new(EffectKind::RoundingCharas.name(), lifecycle, parent),
            config,
            rng: seed::seeded_rng(seed),
        };
        let (geometry, material) = charas.representation(ctx);
        charas.core.mount(ctx, geometry, material);
        charas
    }

    pub fn config(&self) -> &RoundingCharasConfig {
        &self.config
    }

    fn particle_size(&self, ctx: &EffectContext<'_>) -> f32 {
        self.config.size * ctx.settings.pixel_ratio
    }

    fn representation(&mut self, ctx: &EffectContext<'_>) -> (Geometry, Material) {
        let count = self.config.count;
        let seeds = seed::generate(count, &seed_layout(), &mut self.rng);
        let indices = &self.config.tex_offset_index;
        let offsets = (0..count)
            .map(|i| atlas_offset(indices[i % indices.len()]))
            .collect();

        let geometry = PointCloud::new(seeds.positions_array())
            .with_scalar("aDelay", seeds.delays)
            .with_scalar("aTheta", ring_angles(count))
            .with_vec2("aTexOffset", offsets);

        let material = Material::builder("RoundingCharas")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uResolution", ctx.settings.resolution_uniform())
            .uniform("uSize", UniformValue::Float(self.particle_size(ctx)))
            .uniform("uTexture", UniformValue::Texture(ctx.textures.resolve(texture::ROUNDING_CHARAS)))
            .uniform("uRadius", UniformValue::Float(self.config.radius))
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

impl Effect for RoundingCharas {
    fn kind(&self) -> EffectKind {
        EffectKind::RoundingCharas
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
            ParamDef::int("count", c.count, 0, 30).with_apply(ParamApply::Rebuild),
            ParamDef::float("size", c.size, 0.0, 10.0),
            ParamDef::float("radius", c.radius, 0.0, 10.0),
            ParamDef::indices("texOffsetIndex", &c.tex_offset_index, ATLAS_CELLS - 1)
                .with_apply(ParamApply::Rebuild)
                .with_description("Atlas cell per sprite, cycled around the ring"),
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
                let size = self.particle_size(ctx);
                self.core.set_uniform(ctx.scene, "uSize", UniformValue::Float(size));
            }
            ("radius", ParamValue::Float(v)) => {
                self.config.radius = *v;
                self.core.set_uniform(ctx.scene, "uRadius", UniformValue::Float(*v));
            }
            ("texOffsetIndex", ParamValue::Indices(v)) => {
                self.config.tex_offset_index = v.clone();
                self.rebuild(ctx);
            }
            _ => bail!("rounding_charas cannot apply {:?} to '{}'", value, name),
        }
        Ok(())
    }
}
