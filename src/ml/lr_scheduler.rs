// ============================================================
// Layer 5 — Learning-Rate Schedules
// ============================================================
// The training loop asks for `rate(step)` before every step and
// never cares which policy answers. Two policies exist:
//
//   ConstantRate      lr(step) = rate
//   ExponentialDecay  lr(step) = min + (max - min) · e^(-step / decay_speed)
//
// decay_speed ties the curve to the data: with
//   decay_speed = decay_coefficient × N_train / batch_size
// the rate falls by a factor e every `decay_coefficient` epochs.

use serde::{Deserialize, Serialize};

pub trait LearningRateSchedule {
    /// Learning rate to use for the step numbered `step` (0-based).
    fn rate(&self, step: usize) -> f64;

    fn name(&self) -> &str;
}

/// Same rate for every step.
#[derive(Debug, Clone, Copy)]
pub struct ConstantRate {
    rate: f64,
}

impl ConstantRate {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl LearningRateSchedule for ConstantRate {
    fn rate(&self, _step: usize) -> f64 {
        self.rate
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Starts at `max_rate` and decays towards `min_rate`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialDecay {
    max_rate:    f64,
    min_rate:    f64,
    decay_speed: f64,
}

impl ExponentialDecay {
    pub fn new(max_rate: f64, min_rate: f64, decay_speed: f64) -> Self {
        Self { max_rate, min_rate, decay_speed }
    }
}

impl LearningRateSchedule for ExponentialDecay {
    fn rate(&self, step: usize) -> f64 {
        if self.decay_speed <= 0.0 {
            return self.min_rate;
        }
        self.min_rate + (self.max_rate - self.min_rate) * (-(step as f64) / self.decay_speed).exp()
    }

    fn name(&self) -> &str {
        "exponential_decay"
    }
}

/// `decay_coefficient × train_rows / batch_size`
pub fn decay_speed(decay_coefficient: f64, train_rows: usize, batch_size: usize) -> f64 {
    decay_coefficient * train_rows as f64 / batch_size as f64
}

/// Serialisable choice of schedule, stored with the run config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum LearningRatePolicy {
    Constant { rate: f64 },
    ExponentialDecay { max_rate: f64, min_rate: f64 },
}

impl LearningRatePolicy {
    /// Build the schedule; `decay_speed` is only used by decaying policies.
    pub fn build(&self, decay_speed: f64) -> Box<dyn LearningRateSchedule> {
        match *self {
            Self::Constant { rate } => Box::new(ConstantRate::new(rate)),
            Self::ExponentialDecay { max_rate, min_rate } => {
                Box::new(ExponentialDecay::new(max_rate, min_rate, decay_speed))
            }
        }
    }
}
