// ==============================================================================
// spring.rs — DAMPED SUSPENSION SPRING (VISUAL PITCH / ROLL ONLY)
// ------------------------------------------------------------------------------
// A plain damped harmonic oscillator. The chassis feeds it displacement kicks
// (change_position) and advances it once per tick with the move-factor
// (simulate). Its position only tilts the rendered chassis; it never feeds
// back into the dynamics.
//
//     a = -k * (x - target) - c * v
//     v += a * h
//     x += v * h
//
// Integration is semi-implicit Euler, sub-stepped so a clamped move-factor of
// 0.5 stays stable.
// ==============================================================================

use serde::{Deserialize, Serialize};

const MAX_SUBSTEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub stiffness: f32,
    pub damping: f32,
    pub target: f32,
    pub position: f32,
    pub velocity: f32,
    pub limit: f32, // max |position - target|
}

impl Spring {
    pub fn new(stiffness: f32, damping: f32, target: f32, limit: f32) -> Self {
        Self {
            stiffness,
            damping,
            target,
            position: target,
            velocity: 0.0,
            limit: limit.abs(),
        }
    }

    pub fn change_position(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }
        self.position = self.clamp(self.position + delta);
    }

    pub fn simulate(&mut self, move_factor: f32) {
        let mut remaining = move_factor.max(0.0);
        while remaining > 0.0 {
            let h = remaining.min(MAX_SUBSTEP);
            let accel = -self.stiffness * (self.position - self.target) - self.damping * self.velocity;
            self.velocity += accel * h;
            self.position = self.clamp(self.position + self.velocity * h);
            remaining -= h;
        }
    }

    fn clamp(&self, x: f32) -> f32 {
        x.clamp(self.target - self.limit, self.target + self.limit)
    }
}
