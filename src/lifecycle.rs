//! Elapsed-time state machine shared by every effect.
//!
//! ```text
//! Off --activate--> On --[elapsed > duration]--> Off | Done
//!                   On --pop--> Pop --[elapsed > pop_duration]--> Off
//! ```
//!
//! `Off` and `Done` are both re-enterable. Time advances by
//! `delta * speed * rate` in every running state; there are no
//! phase-specific multipliers.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectState {
    #[default]
    Off,
    On,
    /// Decay animation after `pop()`.
    Pop,
    /// Finished a one-shot run.
    Done,
}

impl EffectState {
    /// States in which time advances and the representation is shown.
    pub fn is_running(self) -> bool {
        matches!(self, EffectState::On | EffectState::Pop)
    }
}

impl std::fmt::Display for EffectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectState::Off => write!(f, "off"),
            EffectState::On => write!(f, "on"),
            EffectState::Pop => write!(f, "pop"),
            EffectState::Done => write!(f, "done"),
        }
    }
}

/// Per-effect timing rules.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecyclePolicy {
    /// Length of the `On` phase. `None` loops until stopped.
    pub duration: Option<f32>,
    /// Length of the `Pop` phase. `None` makes `pop()` behave like `stop()`.
    pub pop_duration: Option<f32>,
    /// State entered when `duration` runs out.
    pub finish: EffectState,
    /// Constant factor applied on top of `speed`.
    pub rate: f32,
    /// Zero `elapsed` when a run finishes.
    pub reset_on_finish: bool,
}

impl LifecyclePolicy {
    /// Runs until stopped.
    pub fn looping() -> Self {
        Self {
            duration: None,
            pop_duration: None,
            finish: EffectState::Off,
            rate: 1.0,
            reset_on_finish: false,
        }
    }

    /// Turns itself off after `duration`.
    pub fn one_shot(duration: f32) -> Self {
        Self {
            duration: Some(duration),
            ..Self::looping()
        }
    }

    pub fn with_pop(mut self, pop_duration: f32) -> Self {
        self.pop_duration = Some(pop_duration);
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn finishing_in(mut self, state: EffectState) -> Self {
        self.finish = state;
        self
    }

    pub fn resetting_on_finish(mut self) -> Self {
        self.reset_on_finish = true;
        self
    }
}

/// Result of one `advance` call that actually ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub elapsed: f32,
    /// New state, if the step crossed a threshold.
    pub transition: Option<EffectState>,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: EffectState,
    elapsed: f32,
    /// Playback speed multiplier, bound to the control panel.
    pub speed: f32,
    policy: LifecyclePolicy,
    disposed: bool,
}

impl Lifecycle {
    pub fn new(policy: LifecyclePolicy, speed: f32) -> Self {
        Self {
            state: EffectState::Off,
            elapsed: 0.0,
            speed,
            policy,
            disposed: false,
        }
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Representation should be shown.
    pub fn is_visible(&self) -> bool {
        !self.disposed && self.state.is_running()
    }

    pub fn set_duration(&mut self, duration: Option<f32>) {
        self.policy.duration = duration;
    }

    /// Enter `On` with a fresh clock. Returns false once disposed.
    pub fn activate(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.state = EffectState::On;
        self.elapsed = 0.0;
        true
    }

    /// Advance the clock. `None` when nothing ran (not running, or disposed).
    pub fn advance(&mut self, delta: f32) -> Option<Step> {
        if self.disposed || !self.state.is_running() {
            return None;
        }

        self.elapsed += delta * self.speed * self.policy.rate;

        let limit = match self.state {
            EffectState::On => self.policy.duration,
            EffectState::Pop => self.policy.pop_duration,
            _ => None,
        };

        let mut transition = None;
        if let Some(limit) = limit {
            if self.elapsed > limit {
                let next = match self.state {
                    EffectState::Pop => EffectState::Off,
                    _ => self.policy.finish,
                };
                self.state = next;
                if self.policy.reset_on_finish {
                    self.elapsed = 0.0;
                }
                transition = Some(next);
            }
        }

        Some(Step {
            elapsed: self.elapsed,
            transition,
        })
    }

    /// Start the decay phase. Falls back to `stop()` without a pop phase.
    /// Returns true if the state changed.
    pub fn pop(&mut self) -> bool {
        if self.disposed || self.state != EffectState::On {
            return false;
        }
        if self.policy.pop_duration.is_none() {
            return self.stop();
        }
        self.state = EffectState::Pop;
        self.elapsed = 0.0;
        true
    }

    /// Enter `Off` and zero the clock. Returns true if the state changed.
    pub fn stop(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        let was_running = self.state.is_running();
        self.state = EffectState::Off;
        self.elapsed = 0.0;
        was_running
    }

    /// Mark disposed. Returns true only on the first call.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.state = EffectState::Off;
        true
    }
}
