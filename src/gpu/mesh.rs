use bytemuck::{Pod, Zeroable};
use glam::Vec3;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12, // [f32; 3] is 12 bytes
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Create a plane in the XY plane (facing +Z), centered at origin,
/// subdivided into `width_segments` x `height_segments` quads.
pub fn create_plane_geometry(
    width: f32,
    height: f32,
    width_segments: u32,
    height_segments: u32,
) -> (Vec<Vertex>, Vec<u16>) {
    let width_segments = width_segments.max(1);
    let height_segments = height_segments.max(1);
    let columns = width_segments + 1;

    let mut vertices = Vec::with_capacity((columns * (height_segments + 1)) as usize);
    let mut indices = Vec::with_capacity((width_segments * height_segments * 6) as usize);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let y = (0.5 - v) * height;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let x = (u - 0.5) * width;
            vertices.push(Vertex::new([x, y, 0.0], [0.0, 0.0, 1.0], [u, 1.0 - v]));
        }
    }

    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = (ix + columns * iy) as u16;
            let b = (ix + columns * (iy + 1)) as u16;
            let c = (ix + 1 + columns * (iy + 1)) as u16;
            let d = (ix + 1 + columns * iy) as u16;

            // Two triangles per quad
            indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    (vertices, indices)
}

/// Create a UV sphere centered at origin.
pub fn create_sphere_geometry(
    radius: f32,
    width_segments: u32,
    height_segments: u32,
) -> (Vec<Vertex>, Vec<u16>) {
    let lon_segments = width_segments.max(3);
    let lat_segments = height_segments.max(2);

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for lat in 0..=lat_segments {
        let v = lat as f32 / lat_segments as f32;
        let theta = std::f32::consts::PI * v;
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        for lon in 0..=lon_segments {
            let u = lon as f32 / lon_segments as f32;
            let phi = 2.0 * std::f32::consts::PI * u;

            let normal = [-phi.cos() * sin_theta, cos_theta, phi.sin() * sin_theta];
            let position = [normal[0] * radius, normal[1] * radius, normal[2] * radius];

            vertices.push(Vertex::new(position, normal, [u, 1.0 - v]));
        }
    }

    for lat in 0..lat_segments {
        for lon in 0..lon_segments {
            let first = (lat * (lon_segments + 1) + lon) as u16;
            let second = first + lon_segments as u16 + 1;

            // The pole rows collapse to a single triangle each
            if lat != 0 {
                indices.extend_from_slice(&[first, second, first + 1]);
            }
            if lat != lat_segments - 1 {
                indices.extend_from_slice(&[second, second + 1, first + 1]);
            }
        }
    }

    (vertices, indices)
}

pub fn translate(vertices: &mut [Vertex], offset: Vec3) {
    for v in vertices {
        v.position = (Vec3::from(v.position) + offset).to_array();
    }
}

/// Non-uniform scale. Normals are not renormalized.
pub fn scale(vertices: &mut [Vertex], factor: Vec3) {
    for v in vertices {
        v.position = (Vec3::from(v.position) * factor).to_array();
    }
}
