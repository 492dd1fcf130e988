//! Steam column rising off a cup: a tall subdivided plane whose vertices the
//! shader twists with a noise texture.

use anyhow::{bail, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::effect::{Effect, EffectContext, EffectCore};
use crate::effects::EffectKind;
use crate::geometry::{Geometry, MeshData};
use crate::gpu::mesh;
use crate::lifecycle::{Lifecycle, LifecyclePolicy};
use crate::material::{BlendMode, Material, Side, UniformValue};
use crate::panel::{ConfigCheck, ParamDef, ParamValue};
use crate::scene_graph::{NodeId, Transform};
use crate::texture;

const WIDTH_SEGMENTS: u32 = 16;
const HEIGHT_SEGMENTS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmokeCoffeeConfig {
    pub scale: f32,
    pub speed: f32,
    pub color: [f32; 3],
    pub noise_texture: String,
}

impl Default for SmokeCoffeeConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            speed: 1.0,
            color: [1.0, 1.0, 1.0],
            noise_texture: texture::PERLIN.to_string(),
        }
    }
}

impl SmokeCoffeeConfig {
    /// Revert fields outside their panel range to the defaults.
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        ConfigCheck::new(EffectKind::SmokeCoffee.name())
            .float("scale", &mut self.scale, d.scale, 0.0, 10.0)
            .float("speed", &mut self.speed, d.speed, 0.0, 20.0)
            .color("color", &mut self.color, d.color);
        self
    }
}

/// Unit plane standing on y = 0, stretched four times taller than wide.
pub fn column_mesh() -> MeshData {
    let (mut vertices, indices) = mesh::create_plane_geometry(1.0, 1.0, WIDTH_SEGMENTS, HEIGHT_SEGMENTS);
    mesh::translate(&mut vertices, Vec3::new(0.0, 0.5, 0.0));
    mesh::scale(&mut vertices, Vec3::new(1.0, 4.0, 1.0));
    MeshData::new((vertices, indices))
}

pub struct SmokeCoffee {
    core: EffectCore,
    config: SmokeCoffeeConfig,
}

impl SmokeCoffee {
    pub fn new(config: SmokeCoffeeConfig, ctx: &mut EffectContext<'_>, parent: NodeId) -> Self {
        let config = config.validated();
        let lifecycle = Lifecycle::new(LifecyclePolicy::looping(), config.speed);
        let core = EffectCore::new(EffectKind::SmokeCoffee.name(), lifecycle, parent)
            .with_transform(Transform::default().with_uniform_scale(config.scale));

        let material = Material::builder("SmokeCoffee")
            .uniform("uPerlinTexture", UniformValue::Texture(ctx.textures.resolve(&config.noise_texture)))
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uColor", UniformValue::Color(config.color))
            .blend_mode(BlendMode::AlphaBlend)
            .transparent(true)
            .side(Side::Double)
            .depth_write(false)
            .build();

        let mut coffee = Self { core, config };
        coffee.core.mount(ctx, Geometry::Mesh(column_mesh()), material);
        coffee
    }
}

impl Effect for SmokeCoffee {
    fn kind(&self) -> EffectKind {
        EffectKind::SmokeCoffee
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn params(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::float("scale", self.config.scale, 0.0, 10.0),
            ParamDef::float("speed", self.config.speed, 0.0, 20.0),
            ParamDef::color("color", self.config.color),
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
            ("color", ParamValue::Vec3(v)) => {
                self.config.color = *v;
                self.core.set_uniform(ctx.scene, "uColor", UniformValue::Color(*v));
            }
            _ => bail!("smoke_coffee cannot apply {:?} to '{}'", value, name),
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
    fn test_column_stands_on_origin() {
        let mesh = column_mesh();
        assert_eq!(mesh.vertices.len(), 17 * 65);
        let (min_y, max_y) = mesh
            .vertices
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.position[1]), hi.max(v.position[1])));
        assert!(min_y.abs() < 1e-5);
        assert!((max_y - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_activate_and_stop() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let mut coffee = SmokeCoffee::new(SmokeCoffeeConfig::default(), &mut fx.ctx(), root);
        assert_eq!(coffee.particle_count(), 0);

        coffee.activate(&mut fx.ctx(), Some(Vec3::new(0.0, 0.3, 0.0)));
        coffee.update(&mut fx.ctx(), 30.0);
        assert_eq!(coffee.state(), EffectState::On);

        coffee.stop(&mut fx.ctx());
        assert!(!fx.scene.get(coffee.core().node().unwrap()).unwrap().visible);
    }

    #[test]
    fn test_material_is_double_sided() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let coffee = SmokeCoffee::new(SmokeCoffeeConfig::default(), &mut fx.ctx(), root);
        let material = coffee.core().material(&fx.scene).unwrap();
        assert_eq!(material.side, Side::Double);
        assert!(!material.depth_write);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let mut fx = Fixture::new();
        let root = fx.root();
        let config = SmokeCoffeeConfig {
            scale: f32::INFINITY,
            speed: 40.0,
            ..SmokeCoffeeConfig::default()
        };
        let mut coffee = SmokeCoffee::new(config, &mut fx.ctx(), root);

        assert_eq!(coffee.core().transform(&fx.scene).unwrap().scale, Vec3::ONE);
        coffee.activate(&mut fx.ctx(), None);
        coffee.update(&mut fx.ctx(), 2.0);
        assert_eq!(coffee.elapsed(), 2.0);
    }
}
