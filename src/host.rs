//! Frame loop that owns the scene, the backend and every live effect.

use anyhow::{anyhow, bail, Result};
use glam::{Vec2, Vec3};
use serde::Serialize;

use crate::effect::{Effect, EffectContext, RenderSettings};
use crate::effects::{build_effect, EffectConfig};
use crate::gpu::backend::GpuBackend;
use crate::lifecycle::EffectState;
use crate::panel::{ParamApply, ParamValue};
use crate::scene_config::TriggerAction;
use crate::scene_graph::SceneGraph;
use crate::texture::TextureLibrary;

/// One state change of one effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRecord {
    pub time: f32,
    pub frame: u64,
    pub effect: String,
    pub from: EffectState,
    pub to: EffectState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub time: f32,
    /// Effects whose clock advanced this frame.
    pub running: usize,
    /// Materials whose uniforms were written to the backend.
    pub flushed: usize,
}

struct HostedEffect {
    name: String,
    effect: Box<dyn Effect>,
}

pub struct EffectHost<B: GpuBackend> {
    scene: SceneGraph,
    gpu: B,
    textures: TextureLibrary,
    settings: RenderSettings,
    effects: Vec<HostedEffect>,
    transitions: Vec<TransitionRecord>,
    time: f32,
    frame: u64,
    seed: u64,
}

impl<B: GpuBackend> EffectHost<B> {
    pub fn new(gpu: B, textures: TextureLibrary, settings: RenderSettings, seed: u64) -> Self {
        Self {
            scene: SceneGraph::new(),
            gpu,
            textures,
            settings,
            effects: Vec::new(),
            transitions: Vec::new(),
            time: 0.0,
            frame: 0,
            seed,
        }
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn gpu(&self) -> &B {
        &self.gpu
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn effect_names(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().map(|h| h.name.as_str())
    }

    pub fn effect(&self, name: &str) -> Option<&dyn Effect> {
        self.effects
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.effect.as_ref())
    }

    /// Build an effect under the scene root. Names must be unique.
    pub fn spawn(&mut self, name: impl Into<String>, config: &EffectConfig, position: Option<Vec3>) -> Result<()> {
        let name = name.into();
        if self.effect(&name).is_some() {
            bail!("an effect named '{}' already exists", name);
        }
        let seed = self.seed.wrapping_add(self.effects.len() as u64);
        let root = self.scene.root();

        let Self { scene, gpu, textures, settings, .. } = self;
        let mut ctx = EffectContext {
            scene,
            gpu,
            textures,
            settings,
        };
        let effect = build_effect(config, &mut ctx, root, seed);
        if let Some(position) = position {
            if let Some(t) = effect.core().transform_mut(ctx.scene) {
                t.position = position;
            }
        }

        log::info!("spawned '{}' ({}, {} particles)", name, effect.kind(), effect.particle_count());
        self.effects.push(HostedEffect { name, effect });
        Ok(())
    }

    /// Run `op` on the named effect and record any state change it causes.
    fn drive<R>(
        &mut self,
        name: &str,
        op: impl FnOnce(&mut dyn Effect, &mut EffectContext<'_>) -> R,
    ) -> Result<R> {
        let Self {
            scene,
            gpu,
            textures,
            settings,
            effects,
            transitions,
            time,
            frame,
            ..
        } = self;
        let hosted = effects
            .iter_mut()
            .find(|h| h.name == name)
            .ok_or_else(|| anyhow!("no effect named '{}'", name))?;

        let mut ctx = EffectContext {
            scene,
            gpu,
            textures,
            settings,
        };
        let from = hosted.effect.state();
        let out = op(hosted.effect.as_mut(), &mut ctx);
        let to = hosted.effect.state();

        if from != to {
            transitions.push(TransitionRecord {
                time: *time,
                frame: *frame,
                effect: hosted.name.clone(),
                from,
                to,
            });
        }
        Ok(out)
    }

    pub fn activate(&mut self, name: &str, position: Option<Vec3>) -> Result<()> {
        self.drive(name, |effect, ctx| effect.activate(ctx, position))
    }

    pub fn stop(&mut self, name: &str) -> Result<()> {
        self.drive(name, |effect, ctx| effect.stop(ctx))
    }

    pub fn pop(&mut self, name: &str) -> Result<()> {
        self.drive(name, |effect, ctx| effect.pop(ctx))
    }

    pub fn set_param(&mut self, name: &str, param: &str, value: ParamValue) -> Result<ParamApply> {
        self.drive(name, |effect, ctx| effect.apply_param(ctx, param, value))?
            .map_err(|e| e.context(format!("while setting '{}' on '{}'", param, name)))
    }

    /// Change the output size and forward it to every effect.
    pub fn resize(&mut self, resolution: Vec2) {
        self.settings.resolution = resolution;
        let Self {
            scene,
            gpu,
            textures,
            settings,
            effects,
            ..
        } = self;
        let mut ctx = EffectContext {
            scene,
            gpu,
            textures,
            settings,
        };
        for hosted in effects.iter_mut() {
            hosted.effect.resize(&mut ctx);
        }
        log::debug!("resized to {}x{}", resolution.x, resolution.y);
    }

    /// Advance every effect by `delta` seconds and push the uniforms of
    /// everything visible to the backend.
    pub fn tick(&mut self, delta: f32) -> FrameStats {
        self.time += delta;
        self.frame += 1;

        let Self {
            scene,
            gpu,
            textures,
            settings,
            effects,
            transitions,
            time,
            frame,
            ..
        } = self;
        let mut ctx = EffectContext {
            scene,
            gpu,
            textures,
            settings,
        };

        let mut running = 0;
        for hosted in effects.iter_mut() {
            let from = hosted.effect.state();
            let Some(step) = hosted.effect.update(&mut ctx, delta) else {
                continue;
            };
            running += 1;
            if let Some(to) = step.transition {
                transitions.push(TransitionRecord {
                    time: *time,
                    frame: *frame,
                    effect: hosted.name.clone(),
                    from,
                    to,
                });
            }
        }

        let mut flushed = 0;
        for (_, rep) in scene.renderables() {
            gpu.write_uniforms(rep.material_handle, &rep.material);
            flushed += 1;
        }

        log::trace!("frame {} t={:.3}: {} running, {} flushed", frame, time, running, flushed);
        FrameStats {
            frame: *frame,
            time: *time,
            running,
            flushed,
        }
    }

    /// Run one scheduled scene action.
    pub fn perform(&mut self, action: &TriggerAction) -> Result<()> {
        match action {
            TriggerAction::Activate { effect, position } => {
                self.activate(effect, position.map(Vec3::from_array))
            }
            TriggerAction::Stop { effect } => self.stop(effect),
            TriggerAction::Pop { effect } => self.pop(effect),
            TriggerAction::Set { effect, param, value } => {
                let apply = self.set_param(effect, param, value.clone())?;
                log::debug!("set {}.{} ({:?})", effect, param, apply);
                Ok(())
            }
            TriggerAction::Resize { width, height } => {
                self.resize(Vec2::new(*width as f32, *height as f32));
                Ok(())
            }
        }
    }

    /// Dispose and drop the named effect.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.drive(name, |effect, ctx| effect.dispose(ctx))?;
        self.effects.retain(|h| h.name != name);
        Ok(())
    }

    /// Dispose every effect. Safe to call more than once.
    pub fn dispose_all(&mut self) {
        let Self {
            scene,
            gpu,
            textures,
            settings,
            effects,
            ..
        } = self;
        let mut ctx = EffectContext {
            scene,
            gpu,
            textures,
            settings,
        };
        for hosted in effects.iter_mut() {
            hosted.effect.dispose(&mut ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectKind, FireConfig};
    use crate::gpu::backend::ResourceLedger;

    fn host() -> EffectHost<ResourceLedger> {
        EffectHost::new(
            ResourceLedger::new(),
            TextureLibrary::with_builtin(),
            RenderSettings::default(),
            7,
        )
    }

    #[test]
    fn test_spawn_rejects_duplicates() {
        let mut host = host();
        let config = EffectKind::Fire.default_config();
        host.spawn("fire", &config, None).unwrap();
        assert!(host.spawn("fire", &config, None).is_err());
        assert_eq!(host.effect_names().collect::<Vec<_>>(), vec!["fire"]);
    }

    #[test]
    fn test_tick_records_transitions() {
        let mut host = host();
        host.spawn("fire", &EffectConfig::Fire(FireConfig::default()), None)
            .unwrap();
        host.activate("fire", Some(Vec3::Y)).unwrap();

        let stats = host.tick(0.5);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.flushed, 1);
        host.tick(0.75);

        let states: Vec<_> = host.transitions().iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            states,
            vec![
                (EffectState::Off, EffectState::On),
                (EffectState::On, EffectState::Off)
            ]
        );
        assert_eq!(host.transitions()[1].frame, 2);
    }

    #[test]
    fn test_idle_effects_are_not_flushed() {
        let mut host = host();
        host.spawn("flame", &EffectKind::Flame.default_config(), None)
            .unwrap();

        let stats = host.tick(1.0);
        assert_eq!(stats.running, 0);
        assert_eq!(stats.flushed, 0);
        assert_eq!(host.gpu().uniform_writes(), 0);
    }

    #[test]
    fn test_unknown_names_are_errors() {
        let mut host = host();
        host.spawn("heart", &EffectKind::PoppingHeart.default_config(), None)
            .unwrap();

        assert!(host.activate("hearts", None).is_err());
        assert!(host
            .set_param("heart", "colour", ParamValue::Float(1.0))
            .is_err());
        assert_eq!(
            host.set_param("heart", "count", ParamValue::Float(3.0)).unwrap(),
            ParamApply::Rebuild
        );
    }

    #[test]
    fn test_resize_reaches_every_effect() {
        let mut host = host();
        host.spawn("confetti", &EffectKind::Confetti.default_config(), None)
            .unwrap();
        host.resize(Vec2::new(1920.0, 1080.0));

        let effect = host.effect("confetti").unwrap();
        assert_eq!(
            effect.core().uniform(host.scene(), "uResolution"),
            Some(crate::material::UniformValue::Vec2([1920.0, 1080.0]))
        );
    }

    #[test]
    fn test_dispose_all_releases_everything_once() {
        let mut host = host();
        for kind in EffectKind::ALL {
            host.spawn(kind.name(), &kind.default_config(), None).unwrap();
        }
        host.dispose_all();
        host.dispose_all();

        assert_eq!(host.gpu().live_resources(), 0);
        assert_eq!(host.gpu().invalid_releases(), 0);
    }
}
