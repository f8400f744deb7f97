//! Damped harmonic oscillator with unit mass, integrated in closed form.
//!
//! The spring always pulls its displacement towards zero. Callers express an animation as the
//! residual displacement from the value they want to reach, so re-targeting is a matter of
//! nudging the displacement rather than restarting.

use serde::{Deserialize, Serialize};

/// Stiffness at and above which a spring is treated as settling instantly.
const SNAP_STIFFNESS: f32 = 100_000.;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringParameters {
    pub stiffness: f32,
    pub damping_ratio: f32,
}

/// Displacement and velocity of a spring relative to its rest position.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct SpringState {
    pub displacement: f32,
    pub velocity: f32,
}

impl SpringParameters {
    /// Resolves any displacement on the next integration step.
    pub const SNAP: Self = Self {
        stiffness: SNAP_STIFFNESS,
        damping_ratio: 1.,
    };

    pub fn new(stiffness: f32, damping_ratio: f32) -> Self {
        Self {
            stiffness: stiffness.max(0.),
            damping_ratio: damping_ratio.max(0.),
        }
    }

    pub fn is_snap(&self) -> bool {
        self.stiffness >= SNAP_STIFFNESS
    }

    pub fn natural_frequency(&self) -> f64 {
        f64::from(self.stiffness).sqrt()
    }

    /// Interpolates towards `stop`.
    ///
    /// Stiffness moves geometrically (it spans orders of magnitude between a soft spring and
    /// [`SpringParameters::SNAP`]) and the damping ratio moves linearly. The result is monotonic
    /// in `fraction` and equals `stop` from `fraction >= 1`.
    pub fn lerp(self, stop: Self, fraction: f32) -> Self {
        if !(fraction > 0.) {
            return self;
        }
        if fraction >= 1. {
            return stop;
        }

        let stiffness = if self.stiffness > 0. && stop.stiffness > 0. {
            let (from, to) = (self.stiffness.ln(), stop.stiffness.ln());
            (from + (to - from) * fraction).exp()
        } else {
            self.stiffness + (stop.stiffness - self.stiffness) * fraction
        };
        let damping_ratio = self.damping_ratio + (stop.damping_ratio - self.damping_ratio) * fraction;

        Self {
            stiffness,
            damping_ratio,
        }
    }
}

impl Default for SpringParameters {
    fn default() -> Self {
        Self {
            stiffness: 700.,
            damping_ratio: 0.9,
        }
    }
}

impl SpringState {
    pub const AT_REST: Self = Self {
        displacement: 0.,
        velocity: 0.,
    };

    pub fn new(displacement: f32, velocity: f32) -> Self {
        Self {
            displacement,
            velocity,
        }
    }

    pub fn is_at_rest(&self) -> bool {
        *self == Self::AT_REST
    }

    pub fn nudge(self, displacement_delta: f32, velocity_delta: f32) -> Self {
        Self {
            displacement: self.displacement + displacement_delta,
            velocity: self.velocity + velocity_delta,
        }
    }

    /// Whether the remaining motion is below `threshold`.
    ///
    /// Compares the oscillator energy `k·d² + v²` against a spring held at `threshold`, so both
    /// the displacement and the velocity scaled by the natural frequency must be below it.
    pub fn is_stable(&self, params: SpringParameters, threshold: f32) -> bool {
        if self.is_at_rest() {
            return true;
        }

        let d = f64::from(self.displacement);
        let v = f64::from(self.velocity);
        let t = f64::from(threshold);
        let k = f64::from(params.stiffness);

        if k <= 0. {
            return d.abs() <= t && v.abs() <= t;
        }

        k * d * d + v * v <= k * t * t
    }

    /// Advances the spring by `elapsed_nanos`.
    pub fn calculate_updated_state(self, elapsed_nanos: u64, params: SpringParameters) -> Self {
        if self.is_at_rest() || params.is_snap() {
            return Self::AT_REST;
        }
        if elapsed_nanos == 0 {
            return self;
        }

        let t = elapsed_nanos as f64 / 1_000_000_000.;
        let x0 = f64::from(self.displacement);
        let v0 = f64::from(self.velocity);
        let zeta = f64::from(params.damping_ratio);
        let omega0 = params.natural_frequency();

        if omega0 <= 0. {
            // No restoring force and therefore no damping either.
            return Self::new((x0 + v0 * t) as f32, v0 as f32);
        }

        let (x, v) = if (zeta - 1.).abs() <= f64::from(f32::EPSILON) {
            // Critically damped.
            let a = x0;
            let b = v0 + omega0 * x0;
            let envelope = (-omega0 * t).exp();
            let x = (a + b * t) * envelope;
            let v = b * envelope - omega0 * x;
            (x, v)
        } else if zeta < 1. {
            // Underdamped.
            let r = -zeta * omega0;
            let omega_d = omega0 * (1. - zeta * zeta).sqrt();
            let a = x0;
            let b = (v0 - r * x0) / omega_d;
            let envelope = (r * t).exp();
            let (sin, cos) = (omega_d * t).sin_cos();
            let x = envelope * (a * cos + b * sin);
            let v = r * x + envelope * omega_d * (b * cos - a * sin);
            (x, v)
        } else {
            // Overdamped.
            let r = -zeta * omega0;
            let s = omega0 * (zeta * zeta - 1.).sqrt();
            let gamma_plus = r + s;
            let gamma_minus = r - s;
            let c2 = (gamma_minus * x0 - v0) / (gamma_minus - gamma_plus);
            let c1 = x0 - c2;
            let e_minus = (gamma_minus * t).exp();
            let e_plus = (gamma_plus * t).exp();
            let x = c1 * e_minus + c2 * e_plus;
            let v = c1 * gamma_minus * e_minus + c2 * gamma_plus * e_plus;
            (x, v)
        };

        Self::new(x as f32, v as f32)
    }
}
