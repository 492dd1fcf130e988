//! Per-particle seed attributes.
//!
//! Seeds are generated once, when an effect builds its representation, by a
//! pure function of `(count, layout, rng)`. A rebuild regenerates the whole
//! buffer instead of patching it. Every attribute is an independent uniform
//! draw over a bounded interval.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// RNG used for seed generation. Deterministic for a given seed.
pub type SeedRng = ChaCha8Rng;

pub fn seeded_rng(seed: u64) -> SeedRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Closed-open interval `[min, max)`. `min == max` yields the constant `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f32,
    pub max: f32,
}

impl Bounds {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// `[-extent, extent)`.
    pub const fn symmetric(extent: f32) -> Self {
        Self::new(-extent, extent)
    }

    pub const fn fixed(value: f32) -> Self {
        Self::new(value, value)
    }

    pub fn sample(&self, rng: &mut impl Rng) -> f32 {
        if self.min >= self.max {
            self.min
        } else {
            rng.gen_range(self.min..self.max)
        }
    }

    /// Inclusive containment check, tolerant of `symmetric` bounds on either side.
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min.min(self.max) && value <= self.max.max(self.min)
    }

    /// Shift both ends by `offset`.
    pub fn offset(&self, offset: f32) -> Bounds {
        Bounds::new(self.min + offset, self.max + offset)
    }
}

/// How particle positions are distributed.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionLayout {
    /// Independent draw per axis.
    Box { x: Bounds, y: Bounds, z: Bounds },
    /// Random direction, fixed distance from the origin.
    Shell { radius: f32 },
}

/// How the per-particle phase delay is distributed.
#[derive(Debug, Clone, PartialEq)]
pub enum DelayLayout {
    /// Independent draw.
    Uniform(Bounds),
    /// `i * span / count + jitter`: spreads particles over `span` so a burst
    /// does not fire in lockstep.
    Staggered { span: f32, jitter: Bounds },
}

impl DelayLayout {
    /// Bounds particle `index` of `count` must fall in.
    pub fn bounds_for(&self, index: usize, count: usize) -> Bounds {
        match self {
            DelayLayout::Uniform(bounds) => *bounds,
            DelayLayout::Staggered { span, jitter } => {
                jitter.offset(index as f32 * span / count.max(1) as f32)
            }
        }
    }
}

/// Distribution of every seed attribute of an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedLayout {
    pub position: PositionLayout,
    pub scale: Option<Bounds>,
    pub delay: Option<DelayLayout>,
    /// Extra scalar attributes, keyed by attribute name.
    pub extras: Vec<(&'static str, Bounds)>,
}

impl SeedLayout {
    pub fn new(position: PositionLayout) -> Self {
        Self {
            position,
            scale: None,
            delay: None,
            extras: Vec::new(),
        }
    }

    pub fn with_scale(mut self, scale: Bounds) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_delay(mut self, delay: DelayLayout) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_extra(mut self, name: &'static str, bounds: Bounds) -> Self {
        self.extras.push((name, bounds));
        self
    }
}

/// Generated seed attributes. Attributes absent from the layout are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedBuffer {
    pub positions: Vec<Vec3>,
    pub scales: Vec<f32>,
    pub delays: Vec<f32>,
    pub extras: Vec<(&'static str, Vec<f32>)>,
}

impl SeedBuffer {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn extra(&self, name: &str) -> Option<&[f32]> {
        self.extras
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Move an extra attribute out of the buffer, empty if absent.
    pub fn take_extra(&mut self, name: &str) -> Vec<f32> {
        self.extras
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map(|(_, values)| std::mem::take(values))
            .unwrap_or_default()
    }

    pub fn positions_array(&self) -> Vec<[f32; 3]> {
        self.positions.iter().map(|p| p.to_array()).collect()
    }

    /// Append another buffer generated from a layout with the same attributes.
    pub fn extend(&mut self, other: SeedBuffer) {
        self.positions.extend(other.positions);
        self.scales.extend(other.scales);
        self.delays.extend(other.delays);
        for (name, values) in other.extras {
            match self.extras.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => existing.extend(values),
                None => self.extras.push((name, values)),
            }
        }
    }
}

fn sample_position(layout: &PositionLayout, rng: &mut impl Rng) -> Vec3 {
    match layout {
        PositionLayout::Box { x, y, z } => Vec3::new(x.sample(rng), y.sample(rng), z.sample(rng)),
        PositionLayout::Shell { radius } => {
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            direction.try_normalize().unwrap_or(Vec3::Y) * *radius
        }
    }
}

/// Generate `count` particles. Each attribute is drawn independently.
pub fn generate(count: usize, layout: &SeedLayout, rng: &mut impl Rng) -> SeedBuffer {
    let mut buffer = SeedBuffer {
        positions: Vec::with_capacity(count),
        scales: Vec::with_capacity(if layout.scale.is_some() { count } else { 0 }),
        delays: Vec::with_capacity(if layout.delay.is_some() { count } else { 0 }),
        extras: layout
            .extras
            .iter()
            .map(|(name, _)| (*name, Vec::with_capacity(count)))
            .collect(),
    };

    for i in 0..count {
        buffer.positions.push(sample_position(&layout.position, rng));
        if let Some(scale) = &layout.scale {
            buffer.scales.push(scale.sample(rng));
        }
        if let Some(delay) = &layout.delay {
            buffer.delays.push(delay.bounds_for(i, count).sample(rng));
        }
        for (slot, (_, bounds)) in buffer.extras.iter_mut().zip(&layout.extras) {
            slot.1.push(bounds.sample(rng));
        }
    }

    buffer
}

/// Check every generated value against the layout it came from.
pub fn within_layout(buffer: &SeedBuffer, layout: &SeedLayout) -> bool {
    let count = buffer.len();
    let positions_ok = buffer.positions.iter().all(|p| match &layout.position {
        PositionLayout::Box { x, y, z } => x.contains(p.x) && y.contains(p.y) && z.contains(p.z),
        PositionLayout::Shell { radius } => (p.length() - radius).abs() <= 1e-4,
    });
    let scales_ok = match &layout.scale {
        Some(bounds) => buffer.scales.len() == count && buffer.scales.iter().all(|s| bounds.contains(*s)),
        None => buffer.scales.is_empty(),
    };
    let delays_ok = match &layout.delay {
        Some(delay) => {
            buffer.delays.len() == count
                && buffer
                    .delays
                    .iter()
                    .enumerate()
                    .all(|(i, d)| delay.bounds_for(i, count).contains(*d))
        }
        None => buffer.delays.is_empty(),
    };
    let extras_ok = layout.extras.iter().all(|(name, bounds)| {
        buffer
            .extra(name)
            .is_some_and(|values| values.len() == count && values.iter().all(|v| bounds.contains(*v)))
    });

    positions_ok && scales_ok && delays_ok && extras_ok
}
