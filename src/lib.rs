pub mod effect;
pub mod effects;
pub mod geometry;
pub mod gpu;
pub mod host;
pub mod lifecycle;
pub mod material;
pub mod panel;
pub mod scene_config;
pub mod scene_graph;
pub mod seed;
pub mod texture;

pub mod cli;
