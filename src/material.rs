//! Shader materials and their uniform tables.
//!
//! A material is the host-side description of a shader program: which
//! uniforms it declares, how it blends, and its depth/culling state. Effects
//! write uniforms by name; the uniform set is fixed when the material is
//! built, so writes to undeclared names are rejected.

use std::collections::BTreeMap;

use crate::texture::TextureHandle;

/// Runtime value for a shader uniform.
#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    /// Linear RGB, components in 0-1.
    Color([f32; 3]),
    /// Bound as a texture, not packed into the uniform buffer.
    Texture(TextureHandle),
}

impl UniformValue {
    /// Size in bytes when packed, before padding.
    pub fn byte_size(&self) -> usize {
        match self {
            UniformValue::Float(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec3(_) | UniformValue::Color(_) => 12,
            UniformValue::Texture(_) => 0,
        }
    }

    /// Pad to a 16-byte slot for GPU upload.
    pub fn as_vec4(&self) -> Option<[f32; 4]> {
        match self {
            UniformValue::Float(v) => Some([*v, 0.0, 0.0, 0.0]),
            UniformValue::Vec2(v) => Some([v[0], v[1], 0.0, 0.0]),
            UniformValue::Vec3(v) | UniformValue::Color(v) => Some([v[0], v[1], v[2], 0.0]),
            UniformValue::Texture(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            UniformValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<[f32; 2]> {
        match self {
            UniformValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            UniformValue::Vec3(v) | UniformValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<TextureHandle> {
        match self {
            UniformValue::Texture(t) => Some(*t),
            _ => None,
        }
    }

    /// True if both values are the same variant.
    fn same_kind(&self, other: &UniformValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Convert a 0xRRGGBB hex color to float RGB.
pub fn color_from_hex(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Blend modes for materials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// No blending, fully opaque.
    #[default]
    Opaque,
    /// Standard alpha blending.
    AlphaBlend,
    /// Additive blending (for glows, fire).
    Additive,
}

impl BlendMode {
    /// Convert to wgpu blend state.
    pub fn to_blend_state(&self) -> wgpu::BlendState {
        match self {
            BlendMode::Opaque => wgpu::BlendState::REPLACE,
            BlendMode::AlphaBlend => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            },
        }
    }
}

/// Which faces get rasterized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Front,
    Double,
}

impl Side {
    pub fn cull_mode(&self) -> Option<wgpu::Face> {
        match self {
            Side::Front => Some(wgpu::Face::Back),
            Side::Double => None,
        }
    }
}

/// A shader program description plus its current uniform values.
#[derive(Clone, Debug)]
pub struct Material {
    /// Human-readable name, used for GPU labels.
    pub name: String,
    pub blend_mode: BlendMode,
    pub transparent: bool,
    pub depth_write: bool,
    pub depth_test: bool,
    pub side: Side,
    uniforms: BTreeMap<String, UniformValue>,
}

impl Material {
    /// Create a new material builder.
    pub fn builder(name: impl Into<String>) -> MaterialBuilder {
        MaterialBuilder::new(name)
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(UniformValue::as_float)
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    /// Overwrite a declared uniform. Returns false, leaving the material
    /// untouched, if the name is undeclared or the value has a different type.
    pub fn set(&mut self, name: &str, value: UniformValue) -> bool {
        match self.uniforms.get_mut(name) {
            Some(slot) if slot.same_kind(&value) => {
                *slot = value;
                true
            }
            Some(_) => {
                log::warn!("uniform '{}' on '{}' type mismatch", name, self.name);
                false
            }
            None => false,
        }
    }

    /// Uniforms in stable (name) order.
    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bound textures in stable (name) order.
    pub fn textures(&self) -> impl Iterator<Item = (&str, TextureHandle)> {
        self.uniforms()
            .filter_map(|(k, v)| v.as_texture().map(|t| (k, t)))
    }

    /// Pack every non-texture uniform into consecutive 16-byte slots.
    /// Always at least one slot, so the result is a valid uniform buffer.
    pub fn uniform_bytes(&self) -> Vec<u8> {
        let slots: Vec<[f32; 4]> = self
            .uniforms
            .values()
            .filter_map(UniformValue::as_vec4)
            .collect();
        if slots.is_empty() {
            return vec![0u8; 16];
        }
        bytemuck::cast_slice(&slots).to_vec()
    }
}

/// Builder for creating materials.
pub struct MaterialBuilder {
    material: Material,
}

impl MaterialBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            material: Material {
                name: name.into(),
                blend_mode: BlendMode::Opaque,
                transparent: false,
                depth_write: true,
                depth_test: true,
                side: Side::Front,
                uniforms: BTreeMap::new(),
            },
        }
    }

    pub fn uniform(mut self, name: impl Into<String>, value: UniformValue) -> Self {
        self.material.uniforms.insert(name.into(), value);
        self
    }

    pub fn blend_mode(mut self, mode: BlendMode) -> Self {
        self.material.blend_mode = mode;
        self
    }

    pub fn transparent(mut self, transparent: bool) -> Self {
        self.material.transparent = transparent;
        self
    }

    pub fn depth_write(mut self, write: bool) -> Self {
        self.material.depth_write = write;
        self
    }

    pub fn depth_test(mut self, test: bool) -> Self {
        self.material.depth_test = test;
        self
    }

    pub fn side(mut self, side: Side) -> Self {
        self.material.side = side;
        self
    }

    pub fn build(self) -> Material {
        self.material
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Material {
        Material::builder("sample")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uResolution", UniformValue::Vec2([1000.0, 750.0]))
            .uniform("uTexture", UniformValue::Texture(TextureHandle(3)))
            .blend_mode(BlendMode::Additive)
            .transparent(true)
            .depth_write(false)
            .build()
    }

    #[test]
    fn test_set_only_declared_uniforms() {
        let mut material = sample();

        assert!(material.set("uTime", UniformValue::Float(1.5)));
        assert_eq!(material.float("uTime"), Some(1.5));

        assert!(!material.set("uMissing", UniformValue::Float(1.0)));
        assert!(!material.has_uniform("uMissing"));
    }

    #[test]
    fn test_set_rejects_type_change() {
        let mut material = sample();
        assert!(!material.set("uTime", UniformValue::Vec2([0.0, 0.0])));
        assert_eq!(material.float("uTime"), Some(0.0));
    }

    #[test]
    fn test_uniform_bytes_skip_textures() {
        let material = sample();
        // uResolution + uTime, one 16-byte slot each
        assert_eq!(material.uniform_bytes().len(), 32);
        assert_eq!(material.textures().count(), 1);
    }

    #[test]
    fn test_empty_material_packs_one_slot() {
        let material = Material::builder("empty").build();
        assert_eq!(material.uniform_bytes().len(), 16);
    }

    #[test]
    fn test_color_from_hex() {
        assert_eq!(color_from_hex(0xffffff), [1.0, 1.0, 1.0]);
        assert_eq!(color_from_hex(0xff0000), [1.0, 0.0, 0.0]);
        let c = color_from_hex(0xe38500);
        assert!((c[0] - 227.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_pipeline_state_mapping() {
        assert_eq!(BlendMode::Opaque.to_blend_state(), wgpu::BlendState::REPLACE);
        let additive = BlendMode::Additive.to_blend_state();
        assert_eq!(additive.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(Side::Front.cull_mode(), Some(wgpu::Face::Back));
        assert_eq!(Side::Double.cull_mode(), None);
    }
}
