use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use glam::{Vec2, Vec3};

use crate::effect::RenderSettings;
use crate::effects::EffectKind;
use crate::gpu::backend::{GpuBackend, ResourceLedger};
use crate::gpu::wgpu_backend::WgpuBackend;
use crate::host::EffectHost;
use crate::scene_config::{hash_bytes, RunMetadata, SceneSpec};
use crate::texture::TextureLibrary;

/// Seconds simulated after the last trigger when no duration is given.
const TAIL_SECONDS: f32 = 3.0;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in effects
    List,

    /// Print the control-panel parameters of an effect as JSON
    Params {
        /// Effect name, e.g. `confetti`
        effect: String,
    },

    /// Play a scene file frame by frame and write run metadata
    Run {
        /// Scene JSON file
        #[arg(long)]
        scene: PathBuf,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Seconds to simulate (defaults to the last trigger plus a short tail)
        #[arg(long)]
        duration: Option<f32>,

        /// Where to write the run metadata JSON
        #[arg(long)]
        out: Option<PathBuf>,

        /// Upload to a real GPU device instead of the in-memory ledger
        #[arg(long)]
        gpu: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            for kind in EffectKind::ALL {
                println!("{:<16} {}", kind.name(), kind.description());
            }
        }
        Commands::Params { effect } => {
            let kind: EffectKind = effect.parse()?;
            let mut host = EffectHost::new(
                ResourceLedger::new(),
                TextureLibrary::with_builtin(),
                RenderSettings::default(),
                0,
            );
            host.spawn(kind.name(), &kind.default_config(), None)?;
            let params = host
                .effect(kind.name())
                .map(|e| e.params())
                .unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
        Commands::Run { scene, fps, duration, out, gpu } => {
            let options = RunOptions { fps, duration, out };
            if gpu {
                let backend = pollster::block_on(WgpuBackend::headless())?;
                run_scene(&scene, backend, &options)?;
            } else {
                run_scene(&scene, ResourceLedger::new(), &options)?;
            }
        }
    }
    Ok(())
}

struct RunOptions {
    fps: f32,
    duration: Option<f32>,
    out: Option<PathBuf>,
}

fn run_scene<B: GpuBackend>(path: &Path, backend: B, options: &RunOptions) -> Result<RunMetadata> {
    let started_at = Utc::now();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read scene file {}", path.display()))?;
    let json = String::from_utf8(bytes.clone()).context("Scene file is not UTF-8")?;
    let spec = SceneSpec::from_json(&json)
        .with_context(|| format!("Invalid scene file {}", path.display()))?;

    if options.fps <= 0.0 {
        anyhow::bail!("fps must be positive, got {}", options.fps);
    }

    let settings = RenderSettings {
        resolution: Vec2::new(spec.width as f32, spec.height as f32),
        pixel_ratio: spec.pixel_ratio,
    };
    let backend_name = backend.describe();
    let mut host = EffectHost::new(backend, TextureLibrary::with_builtin(), settings, spec.seed);
    let mut warnings = Vec::new();

    for entry in &spec.effects {
        let position = entry.position.map(Vec3::from_array);
        host.spawn(&entry.name, &entry.effect, position)?;
        if entry.autostart {
            host.activate(&entry.name, position)?;
        }
    }

    let duration = options
        .duration
        .unwrap_or_else(|| spec.last_trigger_time() + TAIL_SECONDS);
    let total_frames = (duration * options.fps).ceil() as u64;
    let dt = 1.0 / options.fps;
    let schedule = spec.schedule();
    let mut next_trigger = 0;

    println!(
        "Running {} effects for {} frames on {}...",
        spec.effects.len(),
        total_frames,
        backend_name
    );

    for _ in 0..total_frames {
        while let Some(trigger) = schedule.get(next_trigger) {
            if trigger.at > host.time() {
                break;
            }
            if let Err(e) = host.perform(&trigger.action) {
                log::warn!("trigger at {}s failed: {:#}", trigger.at, e);
                warnings.push(format!("{}s: {:#}", trigger.at, e));
            }
            next_trigger += 1;
        }
        host.tick(dt);
    }

    for trigger in &schedule[next_trigger..] {
        warnings.push(format!("{}s: trigger after the end of the run was skipped", trigger.at));
    }

    host.dispose_all();
    let live_resources = host.gpu().live_resources();
    if live_resources > 0 {
        log::warn!("{} GPU resources still live after teardown", live_resources);
        warnings.push(format!("{} GPU resources leaked", live_resources));
    }

    let metadata = RunMetadata {
        started_at,
        completed_at: Utc::now(),
        scene_hash: hash_bytes(&bytes),
        backend: backend_name,
        fps: options.fps,
        frame_count: host.frame(),
        duration: host.time(),
        live_resources,
        fxlab_version: env!("CARGO_PKG_VERSION").to_string(),
        transitions: host.transitions().to_vec(),
        warnings,
    };

    println!(
        "Done: {} frames, {} transitions, {} warnings.",
        metadata.frame_count,
        metadata.transitions.len(),
        metadata.warnings.len()
    );
    if let Some(out) = &options.out {
        metadata.save(out)?;
        println!("Metadata written to {}", out.display());
    }
    Ok(metadata)
}
