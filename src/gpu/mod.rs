pub mod backend;
pub mod mesh;
pub mod wgpu_backend;
