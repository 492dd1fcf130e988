//! The effect abstraction shared by every module in [`crate::effects`].
//!
//! An effect owns one representation (a point cloud or a mesh) that lives in
//! the [`SceneGraph`] and one pair of GPU handles. [`EffectCore`] does the
//! bookkeeping every effect needs (mounting, lifecycle, uniform writes,
//! visibility); the [`Effect`] trait adds the per-type parts and provides the
//! lifecycle operations as default methods.

use anyhow::Result;
use glam::{Vec2, Vec3};

use crate::effects::EffectKind;
use crate::geometry::Geometry;
use crate::gpu::backend::{GeometryHandle, GpuBackend, MaterialHandle};
use crate::lifecycle::{EffectState, Lifecycle, Step};
use crate::material::{Material, UniformValue};
use crate::panel::{self, ParamApply, ParamDef, ParamValue};
use crate::scene_graph::{NodeId, NodeKind, Representation, SceneGraph, Transform};
use crate::texture::TextureLibrary;

pub const DEFAULT_RESOLUTION: Vec2 = Vec2::new(1000.0, 750.0);

/// Output surface properties effects read when they build or resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub resolution: Vec2,
    pub pixel_ratio: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            pixel_ratio: 1.0,
        }
    }
}

impl RenderSettings {
    pub fn resolution_uniform(&self) -> UniformValue {
        UniformValue::Vec2(self.resolution.to_array())
    }
}

/// Everything an effect may touch outside itself, passed explicitly per call.
pub struct EffectContext<'a> {
    pub scene: &'a mut SceneGraph,
    pub gpu: &'a mut dyn GpuBackend,
    pub textures: &'a TextureLibrary,
    pub settings: &'a RenderSettings,
}

#[derive(Debug, Clone, Copy)]
struct Mounted {
    node: NodeId,
    geometry: GeometryHandle,
    material: MaterialHandle,
    vertices: usize,
}

/// State common to every effect.
#[derive(Debug)]
pub struct EffectCore {
    label: String,
    pub lifecycle: Lifecycle,
    parent: NodeId,
    mounted: Option<Mounted>,
    /// Transform applied to the next representation when nothing is mounted.
    pending_transform: Transform,
}

impl EffectCore {
    pub fn new(label: impl Into<String>, lifecycle: Lifecycle, parent: NodeId) -> Self {
        Self {
            label: label.into(),
            lifecycle,
            parent,
            mounted: None,
            pending_transform: Transform::default(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn node(&self) -> Option<NodeId> {
        self.mounted.map(|m| m.node)
    }

    pub fn handles(&self) -> Option<(GeometryHandle, MaterialHandle)> {
        self.mounted.map(|m| (m.geometry, m.material))
    }

    /// Vertex count of the mounted geometry.
    pub fn vertex_count(&self) -> usize {
        self.mounted.map_or(0, |m| m.vertices)
    }

    /// Set the transform the next `mount` starts from.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.pending_transform = transform;
        self
    }

    /// Upload `geometry` and `material` and attach them under the parent,
    /// replacing (and releasing) any representation already mounted.
    pub fn mount(&mut self, ctx: &mut EffectContext<'_>, geometry: Geometry, mut material: Material) {
        let transform = self
            .unmount(ctx)
            .unwrap_or_else(|| self.pending_transform.clone());

        material.set("uTime", UniformValue::Float(self.lifecycle.elapsed()));
        material.set("uResolution", ctx.settings.resolution_uniform());
        material.set("uPixelRatio", UniformValue::Float(ctx.settings.pixel_ratio));

        let geometry_handle = ctx.gpu.create_geometry(&geometry);
        let material_handle = ctx.gpu.create_material(&material);
        let vertices = geometry.vertex_count();

        let rep = Representation {
            geometry,
            material,
            geometry_handle,
            material_handle,
        };
        let kind = if rep.geometry.as_points().is_some() {
            NodeKind::Points(rep)
        } else {
            NodeKind::Mesh(rep)
        };

        let node = ctx.scene.create_node(self.label.clone(), kind);
        if let Some(n) = ctx.scene.get_mut(node) {
            n.transform = transform;
            n.visible = self.lifecycle.is_visible();
        }
        if !ctx.scene.attach(self.parent, node) {
            log::warn!("{}: parent {:?} is not in the graph, node left detached", self.label, self.parent);
        }

        self.mounted = Some(Mounted {
            node,
            geometry: geometry_handle,
            material: material_handle,
            vertices,
        });
    }

    /// Swap in a freshly generated representation. The effect is stopped
    /// first; a disposed effect is left alone.
    pub fn rebuild(&mut self, ctx: &mut EffectContext<'_>, geometry: Geometry, material: Material) -> bool {
        if self.lifecycle.is_disposed() {
            log::debug!("{}: rebuild ignored, already disposed", self.label);
            return false;
        }
        self.stop(ctx.scene);
        self.mount(ctx, geometry, material);
        log::info!("{}: rebuilt with {} vertices", self.label, self.vertex_count());
        true
    }

    /// Destroy the node and release both handles. Returns the node's last
    /// transform so a rebuild can carry it over.
    pub fn unmount(&mut self, ctx: &mut EffectContext<'_>) -> Option<Transform> {
        let mounted = self.mounted.take()?;
        let transform = ctx.scene.destroy(mounted.node).map(|node| node.transform);
        ctx.gpu.release_geometry(mounted.geometry);
        ctx.gpu.release_material(mounted.material);
        if let Some(t) = &transform {
            self.pending_transform = t.clone();
        }
        transform
    }

    pub fn transform<'s>(&self, scene: &'s SceneGraph) -> Option<&'s Transform> {
        self.node()
            .and_then(|id| scene.get(id))
            .map(|n| &n.transform)
    }

    pub fn transform_mut<'s>(&self, scene: &'s mut SceneGraph) -> Option<&'s mut Transform> {
        self.node()
            .and_then(|id| scene.get_mut(id))
            .map(|n| &mut n.transform)
    }

    pub fn material<'s>(&self, scene: &'s SceneGraph) -> Option<&'s Material> {
        self.node().and_then(|id| scene.get(id)).and_then(|n| n.material())
    }

    /// Write a uniform on the mounted material. False if nothing is mounted
    /// or the material does not declare `name`.
    pub fn set_uniform(&self, scene: &mut SceneGraph, name: &str, value: UniformValue) -> bool {
        self.node()
            .and_then(|id| scene.get_mut(id))
            .and_then(|n| n.material_mut())
            .is_some_and(|m| m.set(name, value))
    }

    pub fn uniform(&self, scene: &SceneGraph, name: &str) -> Option<UniformValue> {
        self.material(scene).and_then(|m| m.get(name).cloned())
    }

    fn sync_visibility(&self, scene: &mut SceneGraph) {
        let visible = self.lifecycle.is_visible();
        if let Some(node) = self.node().and_then(|id| scene.get_mut(id)) {
            node.visible = visible;
        }
    }

    pub fn activate(&mut self, scene: &mut SceneGraph, position: Option<Vec3>) -> bool {
        if !self.lifecycle.activate() {
            log::debug!("{}: activate ignored, already disposed", self.label);
            return false;
        }
        if let Some(position) = position {
            match self.transform_mut(scene) {
                Some(t) => t.position = position,
                None => self.pending_transform.position = position,
            }
        }
        self.set_uniform(scene, "uTime", UniformValue::Float(0.0));
        self.sync_visibility(scene);
        log::debug!("{}: -> on", self.label);
        true
    }

    pub fn update(&mut self, scene: &mut SceneGraph, delta: f32) -> Option<Step> {
        let from = self.lifecycle.state();
        let step = self.lifecycle.advance(delta)?;
        self.set_uniform(scene, "uTime", UniformValue::Float(step.elapsed));
        if let Some(to) = step.transition {
            log::debug!("{}: {} -> {} at t={:.3}", self.label, from, to, step.elapsed);
            self.sync_visibility(scene);
        }
        Some(step)
    }

    pub fn stop(&mut self, scene: &mut SceneGraph) -> bool {
        let changed = self.lifecycle.stop();
        self.sync_visibility(scene);
        if changed {
            log::debug!("{}: -> off", self.label);
        }
        changed
    }

    pub fn pop(&mut self, scene: &mut SceneGraph) -> bool {
        let changed = self.lifecycle.pop();
        self.sync_visibility(scene);
        if changed {
            log::debug!("{}: -> {}", self.label, self.lifecycle.state());
        } else {
            log::debug!("{}: pop ignored in state {}", self.label, self.lifecycle.state());
        }
        changed
    }

    /// Push the current output size into the material.
    pub fn resize(&self, ctx: &mut EffectContext<'_>) {
        self.set_uniform(ctx.scene, "uResolution", ctx.settings.resolution_uniform());
        self.set_uniform(ctx.scene, "uPixelRatio", UniformValue::Float(ctx.settings.pixel_ratio));
    }

    /// Tear down the representation. Only the first call does anything.
    pub fn dispose(&mut self, ctx: &mut EffectContext<'_>) -> bool {
        if !self.lifecycle.dispose() {
            log::debug!("{}: already disposed", self.label);
            return false;
        }
        self.unmount(ctx);
        log::debug!("{}: disposed", self.label);
        true
    }
}

/// A visual effect module.
///
/// Implementors supply the representation and the parameter panel; the
/// lifecycle operations default to [`EffectCore`] and are overridden only
/// where an effect animates something extra (opacity, mesh scale).
pub trait Effect {
    fn kind(&self) -> EffectKind;

    fn core(&self) -> &EffectCore;

    fn core_mut(&mut self) -> &mut EffectCore;

    /// Current parameter values with their ranges.
    fn params(&self) -> Vec<ParamDef>;

    /// Apply a value that already passed [`ParamDef::coerce`].
    fn set_param(&mut self, ctx: &mut EffectContext<'_>, name: &str, value: &ParamValue) -> Result<()>;

    /// Number of particles in the mounted representation, 0 for mesh effects.
    fn particle_count(&self) -> usize {
        0
    }

    fn activate(&mut self, ctx: &mut EffectContext<'_>, position: Option<Vec3>) {
        self.core_mut().activate(ctx.scene, position);
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, delta: f32) -> Option<Step> {
        self.core_mut().update(ctx.scene, delta)
    }

    fn stop(&mut self, ctx: &mut EffectContext<'_>) {
        self.core_mut().stop(ctx.scene);
    }

    fn pop(&mut self, ctx: &mut EffectContext<'_>) {
        self.core_mut().pop(ctx.scene);
    }

    fn resize(&mut self, ctx: &mut EffectContext<'_>) {
        self.core().resize(ctx);
    }

    fn dispose(&mut self, ctx: &mut EffectContext<'_>) {
        self.core_mut().dispose(ctx);
    }

    fn state(&self) -> EffectState {
        self.core().lifecycle.state()
    }

    fn elapsed(&self) -> f32 {
        self.core().lifecycle.elapsed()
    }

    fn is_visible(&self) -> bool {
        self.core().lifecycle.is_visible()
    }

    /// Look up, validate and apply a panel change by name.
    fn apply_param(&mut self, ctx: &mut EffectContext<'_>, name: &str, value: ParamValue) -> Result<ParamApply> {
        let defs = self.params();
        let def = panel::find(&defs, name)?;
        let value = def.coerce(value)?;
        self.set_param(ctx, name, &value)?;
        Ok(def.apply)
    }
}

/// Stop a running effect, apply `change`, and start it again at the same
/// position. Idle effects only get the change.
pub fn restart_with<E: Effect + ?Sized>(
    effect: &mut E,
    ctx: &mut EffectContext<'_>,
    change: impl FnOnce(&mut E, &mut EffectContext<'_>),
) {
    let was_running = effect.state().is_running();
    if was_running {
        effect.stop(ctx);
    }
    change(effect, ctx);
    if was_running {
        effect.activate(ctx, None);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::gpu::backend::ResourceLedger;

    /// Owns everything an [`EffectContext`] borrows.
    pub struct Fixture {
        pub scene: SceneGraph,
        pub gpu: ResourceLedger,
        pub textures: TextureLibrary,
        pub settings: RenderSettings,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                scene: SceneGraph::new(),
                gpu: ResourceLedger::new(),
                textures: TextureLibrary::with_builtin(),
                settings: RenderSettings::default(),
            }
        }

        pub fn ctx(&mut self) -> EffectContext<'_> {
            EffectContext {
                scene: &mut self.scene,
                gpu: &mut self.gpu,
                textures: &self.textures,
                settings: &self.settings,
            }
        }

        pub fn root(&self) -> NodeId {
            self.scene.root()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PointCloud;
    use crate::effect::testing::Fixture;
    use crate::lifecycle::LifecyclePolicy;

    fn points(n: usize) -> Geometry {
        Geometry::Points(PointCloud::new(vec![[0.0; 3]; n]))
    }

    fn material() -> Material {
        Material::builder("test")
            .uniform("uTime", UniformValue::Float(0.0))
            .uniform("uResolution", UniformValue::Vec2([1.0, 1.0]))
            .build()
    }

    fn mounted_core(fx: &mut Fixture, policy: LifecyclePolicy) -> EffectCore {
        let root = fx.scene.root();
        let mut core = EffectCore::new("test", Lifecycle::new(policy, 1.0), root);
        core.mount(&mut fx.ctx(), points(4), material());
        core
    }

    #[test]
    fn test_mount_attaches_hidden_node() {
        let mut fx = Fixture::new();
        let core = mounted_core(&mut fx, LifecyclePolicy::looping());
        let node = core.node().unwrap();

        assert!(fx.scene.is_in_scene(node));
        assert!(!fx.scene.get(node).unwrap().visible);
        assert_eq!(core.vertex_count(), 4);
        assert_eq!(
            core.uniform(&fx.scene, "uResolution"),
            Some(UniformValue::Vec2([1000.0, 750.0]))
        );
    }

    #[test]
    fn test_remount_releases_old_handles_and_keeps_transform() {
        let mut fx = Fixture::new();
        let mut core = mounted_core(&mut fx, LifecyclePolicy::looping());
        core.activate(&mut fx.scene, Some(Vec3::new(1.0, 2.0, 3.0)));
        let (old_geometry, old_material) = core.handles().unwrap();

        core.mount(&mut fx.ctx(), points(9), material());

        assert!(!fx.gpu.is_live_geometry(old_geometry));
        assert!(!fx.gpu.is_live_material(old_material));
        assert_eq!(fx.gpu.live_resources(), 2);
        assert_eq!(core.vertex_count(), 9);
        assert_eq!(
            core.transform(&fx.scene).unwrap().position,
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn test_update_writes_time_only_when_running() {
        let mut fx = Fixture::new();
        let mut core = mounted_core(&mut fx, LifecyclePolicy::one_shot(3.0));

        assert!(core.update(&mut fx.scene, 1.0).is_none());
        assert_eq!(core.uniform(&fx.scene, "uTime"), Some(UniformValue::Float(0.0)));

        core.activate(&mut fx.scene, None);
        core.update(&mut fx.scene, 0.5);
        assert_eq!(core.uniform(&fx.scene, "uTime"), Some(UniformValue::Float(0.5)));
        assert!(fx.scene.get(core.node().unwrap()).unwrap().visible);
    }

    #[test]
    fn test_dispose_releases_once() {
        let mut fx = Fixture::new();
        let mut core = mounted_core(&mut fx, LifecyclePolicy::looping());
        let node = core.node().unwrap();

        assert!(core.dispose(&mut fx.ctx()));
        assert!(!core.dispose(&mut fx.ctx()));

        assert!(!fx.scene.exists(node));
        assert_eq!(fx.gpu.live_resources(), 0);
        assert_eq!(fx.gpu.invalid_releases(), 0);
        assert!(!core.activate(&mut fx.scene, None));
    }

    #[test]
    fn test_resize_updates_resolution_in_any_state() {
        let mut fx = Fixture::new();
        let core = mounted_core(&mut fx, LifecyclePolicy::looping());
        fx.settings.resolution = Vec2::new(640.0, 480.0);

        core.resize(&mut fx.ctx());
        assert_eq!(
            core.uniform(&fx.scene, "uResolution"),
            Some(UniformValue::Vec2([640.0, 480.0]))
        );
    }
}
