//! The built-in effect modules.

pub mod confetti;
pub mod fire;
pub mod flame;
pub mod hologram;
pub mod popping_heart;
pub mod rainbow_bubble;
pub mod rounding_charas;
pub mod smoke_coffee;
pub mod smoke_puff;

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::effect::{Effect, EffectContext};
use crate::scene_graph::NodeId;

pub use confetti::{Confetti, ConfettiConfig};
pub use fire::{Fire, FireConfig};
pub use flame::{Flame, FlameConfig};
pub use hologram::{Hologram, HologramConfig};
pub use popping_heart::{PoppingHeart, PoppingHeartConfig};
pub use rainbow_bubble::{RainbowBubble, RainbowBubbleConfig};
pub use rounding_charas::{RoundingCharas, RoundingCharasConfig};
pub use smoke_coffee::{SmokeCoffee, SmokeCoffeeConfig};
pub use smoke_puff::{SmokePuff, SmokePuffConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    PoppingHeart,
    Confetti,
    Fire,
    Flame,
    SmokePuff,
    SmokeCoffee,
    RainbowBubble,
    Hologram,
    RoundingCharas,
}

impl EffectKind {
    pub const ALL: [EffectKind; 9] = [
        EffectKind::PoppingHeart,
        EffectKind::Confetti,
        EffectKind::Fire,
        EffectKind::Flame,
        EffectKind::SmokePuff,
        EffectKind::SmokeCoffee,
        EffectKind::RainbowBubble,
        EffectKind::Hologram,
        EffectKind::RoundingCharas,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::PoppingHeart => "popping_heart",
            EffectKind::Confetti => "confetti",
            EffectKind::Fire => "fire",
            EffectKind::Flame => "flame",
            EffectKind::SmokePuff => "smoke_puff",
            EffectKind::SmokeCoffee => "smoke_coffee",
            EffectKind::RainbowBubble => "rainbow_bubble",
            EffectKind::Hologram => "hologram",
            EffectKind::RoundingCharas => "rounding_charas",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EffectKind::PoppingHeart => "hearts rising from a point, 3 s",
            EffectKind::Confetti => "directional confetti burst, 5-20 s",
            EffectKind::Fire => "fire burst from a flame sprite, 1 s",
            EffectKind::Flame => "continuous flame sheet",
            EffectKind::SmokePuff => "expanding puff of smoke shells, 1 s at half rate",
            EffectKind::SmokeCoffee => "steam column over a cup",
            EffectKind::RainbowBubble => "iridescent bubble with a pop phase",
            EffectKind::Hologram => "scan-line hologram shell that fades on pop",
            EffectKind::RoundingCharas => "ring of atlas sprites orbiting a point",
        }
    }

    pub fn default_config(self) -> EffectConfig {
        match self {
            EffectKind::PoppingHeart => EffectConfig::PoppingHeart(Default::default()),
            EffectKind::Confetti => EffectConfig::Confetti(Default::default()),
            EffectKind::Fire => EffectConfig::Fire(Default::default()),
            EffectKind::Flame => EffectConfig::Flame(Default::default()),
            EffectKind::SmokePuff => EffectConfig::SmokePuff(Default::default()),
            EffectKind::SmokeCoffee => EffectConfig::SmokeCoffee(Default::default()),
            EffectKind::RainbowBubble => EffectConfig::RainbowBubble(Default::default()),
            EffectKind::Hologram => EffectConfig::Hologram(Default::default()),
            EffectKind::RoundingCharas => EffectConfig::RoundingCharas(Default::default()),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = EffectKind::ALL.iter().map(|k| k.name()).collect();
                anyhow!("unknown effect '{}' (expected one of {})", s, known.join(", "))
            })
    }
}

/// Construction parameters of any effect, tagged by `type` in scene files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectConfig {
    PoppingHeart(PoppingHeartConfig),
    Confetti(ConfettiConfig),
    Fire(FireConfig),
    Flame(FlameConfig),
    SmokePuff(SmokePuffConfig),
    SmokeCoffee(SmokeCoffeeConfig),
    RainbowBubble(RainbowBubbleConfig),
    Hologram(HologramConfig),
    RoundingCharas(RoundingCharasConfig),
}

impl EffectConfig {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectConfig::PoppingHeart(_) => EffectKind::PoppingHeart,
            EffectConfig::Confetti(_) => EffectKind::Confetti,
            EffectConfig::Fire(_) => EffectKind::Fire,
            EffectConfig::Flame(_) => EffectKind::Flame,
            EffectConfig::SmokePuff(_) => EffectKind::SmokePuff,
            EffectConfig::SmokeCoffee(_) => EffectKind::SmokeCoffee,
            EffectConfig::RainbowBubble(_) => EffectKind::RainbowBubble,
            EffectConfig::Hologram(_) => EffectKind::Hologram,
            EffectConfig::RoundingCharas(_) => EffectKind::RoundingCharas,
        }
    }

    /// The config an effect is actually built from: fields outside their
    /// panel range reverted to the defaults.
    pub fn validated(self) -> Self {
        match self {
            EffectConfig::PoppingHeart(c) => EffectConfig::PoppingHeart(c.validated()),
            EffectConfig::Confetti(c) => EffectConfig::Confetti(c.validated()),
            EffectConfig::Fire(c) => EffectConfig::Fire(c.validated()),
            EffectConfig::Flame(c) => EffectConfig::Flame(c.validated()),
            EffectConfig::SmokePuff(c) => EffectConfig::SmokePuff(c.validated()),
            EffectConfig::SmokeCoffee(c) => EffectConfig::SmokeCoffee(c.validated()),
            EffectConfig::RainbowBubble(c) => EffectConfig::RainbowBubble(c.validated()),
            EffectConfig::Hologram(c) => EffectConfig::Hologram(c.validated()),
            EffectConfig::RoundingCharas(c) => EffectConfig::RoundingCharas(c.validated()),
        }
    }
}

/// Construct an effect and mount its representation under `parent`.
/// `seed` drives every random draw the effect makes.
pub fn build_effect(
    config: &EffectConfig,
    ctx: &mut EffectContext<'_>,
    parent: NodeId,
    seed: u64,
) -> Box<dyn Effect> {
    let effect: Box<dyn Effect> = match config.clone() {
        EffectConfig::PoppingHeart(c) => Box::new(PoppingHeart::new(c, ctx, parent, seed)),
        EffectConfig::Confetti(c) => Box::new(Confetti::new(c, ctx, parent, seed)),
        EffectConfig::Fire(c) => Box::new(Fire::new(c, ctx, parent, seed)),
        EffectConfig::Flame(c) => Box::new(Flame::new(c, ctx, parent, seed)),
        EffectConfig::SmokePuff(c) => Box::new(SmokePuff::new(c, ctx, parent, seed)),
        EffectConfig::SmokeCoffee(c) => Box::new(SmokeCoffee::new(c, ctx, parent)),
        EffectConfig::RainbowBubble(c) => Box::new(RainbowBubble::new(c, ctx, parent)),
        EffectConfig::Hologram(c) => Box::new(Hologram::new(c, ctx, parent)),
        EffectConfig::RoundingCharas(c) => Box::new(RoundingCharas::new(c, ctx, parent, seed)),
    };
    log::debug!(
        "built {} ({} particles)",
        effect.kind(),
        effect.particle_count()
    );
    effect
}
