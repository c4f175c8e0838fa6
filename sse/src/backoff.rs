use std::time::Duration;

/// Reconnect delay that grows geometrically from `floor` up to `ceiling`.
///
/// The delay after `n` growth steps is `min(floor * factor^n, ceiling)`,
/// computed from the step count so repeated growth never accumulates rounding.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    factor: f64,
    steps: u32,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration, factor: f64) -> Self {
        Self {
            floor,
            ceiling: ceiling.max(floor),
            factor: if factor.is_finite() && factor >= 1.0 {
                factor
            } else {
                1.0
            },
            steps: 0,
        }
    }

    /// Delay to wait before the next reconnect attempt.
    pub fn current(&self) -> Duration {
        let floor_ms = self.floor.as_millis() as f64;
        let ceiling_ms = self.ceiling.as_millis() as f64;
        let delay_ms = (floor_ms * self.factor.powi(self.steps as i32)).min(ceiling_ms);
        Duration::from_millis(delay_ms.floor() as u64)
    }

    pub fn grow(&mut self) {
        if self.current() < self.ceiling {
            self.steps = self.steps.saturating_add(1);
        }
    }

    pub fn reset(&mut self) {
        self.steps = 0;
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }
}
