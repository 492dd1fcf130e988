//! Lifecycle behaviour every built-in effect shares, checked against the
//! in-memory resource ledger.

use fxlab::effect::{Effect, EffectContext, RenderSettings};
use fxlab::effects::{build_effect, confetti, EffectConfig, EffectKind, PoppingHeartConfig};
use fxlab::gpu::backend::{GpuBackend, ResourceLedger};
use fxlab::host::EffectHost;
use fxlab::lifecycle::EffectState;
use fxlab::material::UniformValue;
use fxlab::panel::ParamValue;
use fxlab::scene_config::SceneSpec;
use fxlab::scene_graph::SceneGraph;
use fxlab::seed;
use fxlab::texture::TextureLibrary;

struct World {
    scene: SceneGraph,
    gpu: ResourceLedger,
    textures: TextureLibrary,
    settings: RenderSettings,
}

impl World {
    fn new() -> Self {
        Self {
            scene: SceneGraph::new(),
            gpu: ResourceLedger::new(),
            textures: TextureLibrary::with_builtin(),
            settings: RenderSettings::default(),
        }
    }

    fn ctx(&mut self) -> EffectContext<'_> {
        EffectContext {
            scene: &mut self.scene,
            gpu: &mut self.gpu,
            textures: &self.textures,
            settings: &self.settings,
        }
    }

    fn build(&mut self, config: &EffectConfig) -> Box<dyn Effect> {
        let root = self.scene.root();
        build_effect(config, &mut self.ctx(), root, 42)
    }

    fn uniforms(&self, effect: &dyn Effect) -> Vec<(String, UniformValue)> {
        effect
            .core()
            .material(&self.scene)
            .map(|m| m.uniforms().map(|(k, v)| (k.to_string(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn param_values(&self, effect: &dyn Effect) -> Vec<(String, ParamValue)> {
        effect.params().into_iter().map(|p| (p.name, p.current)).collect()
    }

    fn node_visible(&self, effect: &dyn Effect) -> bool {
        effect
            .core()
            .node()
            .map(|node| self.scene.is_world_visible(node))
            .unwrap_or(false)
    }
}

/// (kind, On-phase length in seconds of `update` time at default speed)
fn fixed_duration_kinds() -> Vec<(EffectKind, f32)> {
    vec![
        (EffectKind::PoppingHeart, 3.0),
        (EffectKind::Confetti, 10.0),
        (EffectKind::Fire, 1.0),
        // Advances at half rate
        (EffectKind::SmokePuff, 2.0),
    ]
}

#[test]
fn activate_starts_every_effect_visible_at_zero() {
    let mut world = World::new();
    for kind in EffectKind::ALL {
        let mut effect = world.build(&kind.default_config());
        assert_eq!(effect.state(), EffectState::Off, "{}", kind);
        assert!(!world.node_visible(effect.as_ref()), "{}", kind);

        effect.activate(&mut world.ctx(), None);

        assert_eq!(effect.state(), EffectState::On, "{}", kind);
        assert_eq!(effect.elapsed(), 0.0, "{}", kind);
        assert!(effect.is_visible(), "{}", kind);
        assert!(world.node_visible(effect.as_ref()), "{}", kind);
    }
}

#[test]
fn reactivating_resets_the_clock() {
    let mut world = World::new();
    for kind in EffectKind::ALL {
        let mut effect = world.build(&kind.default_config());
        effect.activate(&mut world.ctx(), None);
        effect.update(&mut world.ctx(), 0.4);
        effect.stop(&mut world.ctx());
        effect.activate(&mut world.ctx(), None);
        assert_eq!(effect.elapsed(), 0.0, "{}", kind);
    }
}

#[test]
fn fixed_duration_effects_turn_themselves_off() {
    let mut world = World::new();
    for (kind, duration) in fixed_duration_kinds() {
        let mut effect = world.build(&kind.default_config());
        effect.activate(&mut world.ctx(), None);

        effect.update(&mut world.ctx(), duration * 0.5);
        assert!(effect.is_visible(), "{}", kind);
        effect.update(&mut world.ctx(), duration * 0.6);

        assert!(
            matches!(effect.state(), EffectState::Off | EffectState::Done),
            "{} ended in {}",
            kind,
            effect.state()
        );
        assert!(!effect.is_visible(), "{}", kind);
        assert!(!world.node_visible(effect.as_ref()), "{}", kind);
    }
}

#[test]
fn three_second_heart_scenario() {
    let mut world = World::new();
    let config = EffectConfig::PoppingHeart(PoppingHeartConfig {
        speed: 1.0,
        ..PoppingHeartConfig::default()
    });
    let mut heart = world.build(&config);
    heart.activate(&mut world.ctx(), None);

    heart.update(&mut world.ctx(), 1.0);
    heart.update(&mut world.ctx(), 1.0);
    assert_eq!(heart.state(), EffectState::On);
    let step = heart.update(&mut world.ctx(), 1.5).unwrap();

    assert_eq!(step.elapsed, 3.5);
    assert_eq!(step.transition, Some(EffectState::Off));
    assert_eq!(heart.state(), EffectState::Off);
    assert!(!heart.is_visible());
}

#[test]
fn update_while_off_changes_nothing() {
    let mut world = World::new();
    for kind in EffectKind::ALL {
        let mut effect = world.build(&kind.default_config());
        let before = world.uniforms(effect.as_ref());

        assert!(effect.update(&mut world.ctx(), 0.75).is_none(), "{}", kind);

        assert_eq!(effect.elapsed(), 0.0, "{}", kind);
        assert_eq!(world.uniforms(effect.as_ref()), before, "{}", kind);
    }
}

#[test]
fn count_rebuild_releases_old_resources() {
    let cases = [
        (EffectKind::PoppingHeart, "count", 12),
        (EffectKind::Confetti, "count", 64),
        (EffectKind::Fire, "particleCount", 250),
        (EffectKind::Flame, "particleCount", 20),
        (EffectKind::RoundingCharas, "count", 5),
    ];

    let mut world = World::new();
    for (kind, param, count) in cases {
        let mut effect = world.build(&kind.default_config());
        let (old_geometry, old_material) = effect.core().handles().unwrap();
        let live_before = world.gpu.live_resources();

        effect
            .apply_param(&mut world.ctx(), param, ParamValue::Float(count as f32))
            .unwrap();

        let (new_geometry, new_material) = effect.core().handles().unwrap();
        assert_eq!(effect.particle_count(), count, "{}", kind);
        assert_eq!(world.gpu.geometry_vertices(new_geometry), Some(count), "{}", kind);
        assert!(!world.gpu.is_live_geometry(old_geometry), "{}", kind);
        assert!(!world.gpu.is_live_material(old_material), "{}", kind);
        assert_ne!(old_geometry, new_geometry, "{}", kind);
        assert_ne!(old_material, new_material, "{}", kind);
        assert_eq!(world.gpu.live_resources(), live_before, "{}", kind);
    }
    assert_eq!(world.gpu.invalid_releases(), 0);
}

#[test]
fn double_dispose_releases_once() {
    let mut world = World::new();
    for kind in EffectKind::ALL {
        let mut effect = world.build(&kind.default_config());
        effect.activate(&mut world.ctx(), None);
        effect.update(&mut world.ctx(), 0.1);

        effect.dispose(&mut world.ctx());
        effect.dispose(&mut world.ctx());

        // Disposed effects ignore everything
        effect.activate(&mut world.ctx(), None);
        assert!(effect.update(&mut world.ctx(), 0.1).is_none(), "{}", kind);
        assert!(!effect.is_visible(), "{}", kind);
        assert!(effect.core().node().is_none(), "{}", kind);
    }
    assert_eq!(world.gpu.live_resources(), 0);
    assert_eq!(world.gpu.invalid_releases(), 0);
    assert_eq!(world.gpu.created(), world.gpu.released());
}

#[test]
fn confetti_seeds_stay_in_bounds() {
    let layout = confetti::seed_layout();
    let mut rng = seed::seeded_rng(30);
    let buffer = seed::generate(30, &layout, &mut rng);

    assert_eq!(buffer.len(), 30);
    assert_eq!(buffer.scales.len(), 30);
    assert!(seed::within_layout(&buffer, &layout));

    let radii = buffer.extra("aRadius").unwrap();
    assert_eq!(radii.len(), 30);
    assert!(radii.iter().all(|r| (0.2..=1.0).contains(r)));
    // Independent draws, not one value repeated
    assert!(radii.windows(2).any(|w| w[0] != w[1]));
}

/// One config per kind with every listed field out of range.
fn out_of_range_configs() -> Vec<&'static str> {
    vec![
        r#"{ "type": "popping_heart", "speed": -1, "count": 5000, "size": -3 }"#,
        r#"{ "type": "confetti", "count": 5000, "duration": -4, "saturation": 7 }"#,
        r#"{ "type": "fire", "speed": -1, "particleCount": 5000, "flameTexture": "flame_99" }"#,
        r#"{ "type": "flame", "speed": -1, "particleCount": 0, "color1": [3, 0, 0] }"#,
        r#"{ "type": "smoke_puff", "speed": -1, "size": 99 }"#,
        r#"{ "type": "smoke_coffee", "speed": -1, "scale": -2 }"#,
        r#"{ "type": "rainbow_bubble", "speed": -1, "radius": 0 }"#,
        r#"{ "type": "hologram", "speed": -1, "color": [2, 0, 0] }"#,
        r#"{ "type": "rounding_charas", "speed": -1, "count": 5000, "texOffsetIndex": [42] }"#,
    ]
}

#[test]
fn out_of_range_configs_build_with_defaults() {
    let configs = out_of_range_configs();
    assert_eq!(configs.len(), EffectKind::ALL.len());

    let mut world = World::new();
    for json in configs {
        let config: EffectConfig = serde_json::from_str(json).unwrap();
        let kind = config.kind();
        assert_eq!(config.clone().validated(), kind.default_config(), "{}", kind);

        let effect = world.build(&config);
        let reference = world.build(&kind.default_config());
        assert_eq!(
            world.param_values(effect.as_ref()),
            world.param_values(reference.as_ref()),
            "{}",
            kind
        );
        assert_eq!(effect.particle_count(), reference.particle_count(), "{}", kind);
    }
}

#[test]
fn scene_with_bad_values_still_finishes() {
    let spec = SceneSpec::from_json(
        r#"{
            "effects": [
                { "name": "heart", "effect": { "type": "popping_heart", "speed": -1 }, "autostart": true },
                { "name": "confetti", "effect": { "type": "confetti", "count": 5000, "duration": -4 }, "autostart": true }
            ]
        }"#,
    )
    .unwrap();

    let mut host = EffectHost::new(
        ResourceLedger::new(),
        TextureLibrary::with_builtin(),
        RenderSettings::default(),
        spec.seed,
    );
    for entry in &spec.effects {
        host.spawn(&entry.name, &entry.effect, None).unwrap();
        host.activate(&entry.name, None).unwrap();
    }
    assert_eq!(host.effect("confetti").unwrap().particle_count(), 30);

    for _ in 0..660 {
        host.tick(1.0 / 60.0);
    }

    for name in ["heart", "confetti"] {
        let effect = host.effect(name).unwrap();
        assert_eq!(effect.state(), EffectState::Off, "{}", name);
        assert!(!effect.is_visible(), "{}", name);
    }

    host.dispose_all();
    assert_eq!(host.gpu().live_resources(), 0);
}
