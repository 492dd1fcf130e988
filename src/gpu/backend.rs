//! GPU resource ownership.
//!
//! Effects acquire geometry and material handles through a [`GpuBackend`]
//! when they build a representation and hand them back exactly once when the
//! representation is torn down. Handles come from one monotonically increasing
//! counter, so a released handle is never issued again.

use std::collections::{HashMap, HashSet};

use crate::geometry::Geometry;
use crate::material::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

/// Where representations get uploaded.
pub trait GpuBackend {
    fn create_geometry(&mut self, geometry: &Geometry) -> GeometryHandle;

    fn create_material(&mut self, material: &Material) -> MaterialHandle;

    /// Push the material's current uniform values.
    fn write_uniforms(&mut self, handle: MaterialHandle, material: &Material);

    /// Returns false if the handle was not live.
    fn release_geometry(&mut self, handle: GeometryHandle) -> bool;

    /// Returns false if the handle was not live.
    fn release_material(&mut self, handle: MaterialHandle) -> bool;

    /// Geometry plus material handles currently held.
    fn live_resources(&self) -> usize;

    /// Short description for logs and run metadata.
    fn describe(&self) -> String;
}

/// Headless backend that only tracks handle ownership.
///
/// Used by tests and by the CLI when no GPU is requested.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    next_id: u64,
    geometries: HashMap<GeometryHandle, usize>,
    materials: HashSet<MaterialHandle>,
    created: usize,
    released: usize,
    invalid_releases: usize,
    uniform_writes: usize,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.created += 1;
        self.next_id
    }

    pub fn is_live_geometry(&self, handle: GeometryHandle) -> bool {
        self.geometries.contains_key(&handle)
    }

    pub fn is_live_material(&self, handle: MaterialHandle) -> bool {
        self.materials.contains(&handle)
    }

    /// Vertex count the geometry was created with.
    pub fn geometry_vertices(&self, handle: GeometryHandle) -> Option<usize> {
        self.geometries.get(&handle).copied()
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn released(&self) -> usize {
        self.released
    }

    /// Releases of handles that were not live: double releases or foreign handles.
    pub fn invalid_releases(&self) -> usize {
        self.invalid_releases
    }

    pub fn uniform_writes(&self) -> usize {
        self.uniform_writes
    }
}

impl GpuBackend for ResourceLedger {
    fn create_geometry(&mut self, geometry: &Geometry) -> GeometryHandle {
        let handle = GeometryHandle(self.next());
        self.geometries.insert(handle, geometry.vertex_count());
        handle
    }

    fn create_material(&mut self, _material: &Material) -> MaterialHandle {
        let handle = MaterialHandle(self.next());
        self.materials.insert(handle);
        handle
    }

    fn write_uniforms(&mut self, handle: MaterialHandle, _material: &Material) {
        if self.materials.contains(&handle) {
            self.uniform_writes += 1;
        } else {
            log::warn!("uniform write to released material {:?}", handle);
        }
    }

    fn release_geometry(&mut self, handle: GeometryHandle) -> bool {
        if self.geometries.remove(&handle).is_some() {
            self.released += 1;
            true
        } else {
            log::warn!("release of non-live geometry {:?}", handle);
            self.invalid_releases += 1;
            false
        }
    }

    fn release_material(&mut self, handle: MaterialHandle) -> bool {
        if self.materials.remove(&handle) {
            self.released += 1;
            true
        } else {
            log::warn!("release of non-live material {:?}", handle);
            self.invalid_releases += 1;
            false
        }
    }

    fn live_resources(&self) -> usize {
        self.geometries.len() + self.materials.len()
    }

    fn describe(&self) -> String {
        "headless ledger".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PointCloud;

    #[test]
    fn test_handles_are_never_reused() {
        let mut ledger = ResourceLedger::new();
        let geometry = Geometry::Points(PointCloud::new(vec![[0.0; 3]; 4]));

        let first = ledger.create_geometry(&geometry);
        assert!(ledger.release_geometry(first));
        let second = ledger.create_geometry(&geometry);

        assert_ne!(first, second);
        assert!(!ledger.is_live_geometry(first));
        assert_eq!(ledger.geometry_vertices(second), Some(4));
    }

    #[test]
    fn test_double_release_is_counted_not_applied() {
        let mut ledger = ResourceLedger::new();
        let material = Material::builder("m").build();
        let handle = ledger.create_material(&material);

        assert!(ledger.release_material(handle));
        assert!(!ledger.release_material(handle));
        assert_eq!(ledger.released(), 1);
        assert_eq!(ledger.invalid_releases(), 1);
        assert_eq!(ledger.live_resources(), 0);
    }
}
