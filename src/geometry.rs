//! CPU-side geometry for effect representations.
//!
//! Particle effects draw a [`PointCloud`]: one vertex per particle with a
//! position and any number of named per-particle attributes. Surface effects
//! draw an indexed [`MeshData`].

use crate::gpu::mesh::Vertex;

/// A named per-vertex attribute of a point cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct PointAttribute {
    pub name: String,
    /// 1 for scalars, 2 for vec2 and so on.
    pub components: usize,
    pub data: Vec<f32>,
}

/// One vertex per particle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    positions: Vec<[f32; 3]>,
    attributes: Vec<PointAttribute>,
}

impl PointCloud {
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            attributes: Vec::new(),
        }
    }

    /// Add a scalar attribute. Must hold exactly one value per point.
    pub fn with_scalar(self, name: impl Into<String>, data: Vec<f32>) -> Self {
        self.with_attribute(name.into(), 1, data)
    }

    /// Add a vec2 attribute. Must hold exactly one pair per point.
    pub fn with_vec2(self, name: impl Into<String>, data: Vec<[f32; 2]>) -> Self {
        let flat = data.into_iter().flatten().collect();
        self.with_attribute(name.into(), 2, flat)
    }

    fn with_attribute(mut self, name: String, components: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(
            data.len(),
            self.positions.len() * components,
            "attribute '{}' length does not match point count",
            name
        );
        self.attributes.push(PointAttribute {
            name,
            components,
            data,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn attribute(&self, name: &str) -> Option<&PointAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attributes(&self) -> &[PointAttribute] {
        &self.attributes
    }

    /// Floats per interleaved vertex: 3 for the position plus every attribute.
    pub fn stride(&self) -> usize {
        3 + self.attributes.iter().map(|a| a.components).sum::<usize>()
    }

    /// Interleave position and attributes per vertex for upload.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.stride());
        for (i, position) in self.positions.iter().enumerate() {
            out.extend_from_slice(position);
            for attr in &self.attributes {
                let start = i * attr.components;
                out.extend_from_slice(&attr.data[start..start + attr.components]);
            }
        }
        out
    }
}

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    pub fn new((vertices, indices): (Vec<Vertex>, Vec<u16>)) -> Self {
        Self { vertices, indices }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Points(PointCloud),
    Mesh(MeshData),
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Points(points) => points.len(),
            Geometry::Mesh(mesh) => mesh.vertices.len(),
        }
    }

    pub fn index_count(&self) -> usize {
        match self {
            Geometry::Points(_) => 0,
            Geometry::Mesh(mesh) => mesh.indices.len(),
        }
    }

    /// Vertex data ready for a vertex buffer.
    pub fn vertex_bytes(&self) -> Vec<u8> {
        match self {
            Geometry::Points(points) => bytemuck::cast_slice(&points.interleaved()).to_vec(),
            Geometry::Mesh(mesh) => bytemuck::cast_slice(&mesh.vertices).to_vec(),
        }
    }

    /// Index data ready for an index buffer, if the geometry is indexed.
    pub fn index_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Geometry::Points(_) => None,
            Geometry::Mesh(mesh) => Some(bytemuck::cast_slice(&mesh.indices).to_vec()),
        }
    }

    pub fn as_points(&self) -> Option<&PointCloud> {
        match self {
            Geometry::Points(points) => Some(points),
            Geometry::Mesh(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_layout() {
        let cloud = PointCloud::new(vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])
            .with_scalar("aScale", vec![0.5, 0.6])
            .with_vec2("aTexOffset", vec![[0.1, 0.2], [0.3, 0.4]]);

        assert_eq!(cloud.stride(), 6);
        assert_eq!(
            cloud.interleaved(),
            vec![1.0, 2.0, 3.0, 0.5, 0.1, 0.2, 4.0, 5.0, 6.0, 0.6, 0.3, 0.4]
        );
    }

    #[test]
    fn test_empty_cloud_has_no_bytes() {
        let geometry = Geometry::Points(PointCloud::new(Vec::new()).with_scalar("aDelay", Vec::new()));
        assert_eq!(geometry.vertex_count(), 0);
        assert!(geometry.vertex_bytes().is_empty());
        assert!(geometry.index_bytes().is_none());
    }
}
