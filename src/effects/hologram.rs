//! Scan-line hologram shell. Visibility is carried by `uOpacity` as well as
//! the node flag, so the pop phase can fade it out.

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
use crate::scene_graph::NodeId;

const POP_DURATION: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HologramConfig {
    /// Scan speed, fed to the shader.
    pub speed: f32,
    pub color: [f32; 3],
    pub radius: f32,
}

impl Default for HologramConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            color: [1.0, 1.0, 1.0],
            radius: 1.0,
        }
    }
}

impl HologramConfig {
    /// Revert fields outside their panel range to the defaults.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::Hologram.name())
            .float("speed", &mut self.speed, d.speed, 0.1, 5.0)
            .color("color", &mut self.color, d.color)
            .float("radius", &mut self.radius, d.radius, 0.01, 10.0);
        self
    }
}

pub struct Hologram {
    core: EffectCore,
    config: HologramConfig,
}

impl Hologram {
    /// Hologram shell over a sphere of `config.radius`.
    pub fn new(config: HologramConfig, ctx: &mut EffectContext<'_>, parent: NodeId) -> Self {
        let config = config.validated();
        let sphere = MeshData::new(mesh::create_sphere_geometry(config.radius, 32, 16));
        Self::with_mesh(config, sphere, ctx, parent)
    }

    /// Hologram shell over a caller-supplied mesh. `config.radius` is unused.
    pub fn with_mesh(
        config: HologramConfig,
        geometry: MeshData,
        ctx: &mut EffectContext<'_>,
        parent: NodeId,
    ) -> Self {
        let config = config.validated();
        let policy = LifecyclePolicy::looping().with_pop(POP_DURATION);
        let core = EffectCore::new(EffectKind::Hologram.name(), Lifecycle::new(policy, 1.0), parent);

        let material = Material::builder("Hologram")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uOpacity", UniformValue::Float(0.0))
            .uniform("uSpeed", UniformValue::Float(config.speed))
            .uniform("uColor", UniformValue::Color(config.color))
            .blend_mode(BlendMode::Additive)
            .transparent(true)
            .side(Side::Double)
            .depth_write(false)
            .build();

        let mut hologram = Self { core, config };
        hologram.core.mount(ctx, Geometry::Mesh(geometry), material);
        hologram
    }

    fn opacity(&self) -> f32 {
        let lifecycle = &self.core.lifecycle;
        match lifecycle.state() {
            EffectState::On => 1.0,
            EffectState::Pop => (1.0 - lifecycle.elapsed() / POP_DURATION).max(0.0),
            EffectState::Off | EffectState::Done => 0.0,
        }
    }

    fn write_opacity(&self, ctx: &mut EffectContext<'_>) {
        let opacity = self.opacity();
        self.core.set_uniform(ctx.scene, "uOpacity", UniformValue::Float(opacity));
    }
}

impl Effect for Hologram {
    fn kind(&self) -> EffectKind {
        EffectKind::Hologram
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn activate(&mut self, ctx: &mut EffectContext<'_>, position: Option<Vec3>) {
        self.core.activate(ctx.scene, position);
        self.write_opacity(ctx);
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, delta: f32) -> Option<Step> {
        let step = self.core.update(ctx.scene, delta)?;
        self.write_opacity(ctx);
        Some(step)
    }

    fn stop(&mut self, ctx: &mut EffectContext<'_>) {
        self.core.stop(ctx.scene);
        self.write_opacity(ctx);
    }

    fn pop(&mut self, ctx: &mut EffectContext<'_>) {
        self.core.pop(ctx.scene);
        self.write_opacity(ctx);
    }

    fn params(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::float("speed", self.config.speed, 0.1, 5.0),
            ParamDef::color("color", self.config.color),
        ]
    }

    fn set_param(&mut self, ctx: &mut EffectContext<'_>, name: &str, value: &ParamValue) -> Result<()> {
        match (name, value) {
            ("speed", ParamValue::Float(v)) => {
                self.config.speed = *v;
                self.core.set_uniform(ctx.scene, "uSpeed", UniformValue::Float(*v));
            }
            ("color", ParamValue::Vec3(v)) => {
                self.config.color = *v;
                self.core.set_uniform(ctx.scene, "uColor", UniformValue::Color(*v));
            }
            _ => bail!("hologram cannot apply {:?} to '{}'", value, name),
        }
        Ok(())
    }
}
