// smoothing.rs

/// Visual floor/ceiling of the gauge scale. Levels below the floor pin the
/// needle left and the readout shows the below-floor symbol.
pub const GAUGE_FLOOR_DB: f32 = -60.0;
pub const GAUGE_CEIL_DB: f32 = 3.0;

/// Full sweep of the dial in degrees, centered on straight-up.
pub const DEFAULT_SWEEP_DEG: f32 = 92.0;

/// Default spring constants, tuned for ~60 Hz ticks.
pub const K_SPRING: f32 = 0.15;
pub const DAMPING: f32 = 0.75;

/// Motion below this (degrees and degrees/tick) counts as at rest.
pub const REST_EPS: f32 = 0.01;

/// Map a level in dB onto the dial: linear in the clamped dB domain,
/// `GAUGE_FLOOR_DB` at the left stop, `GAUGE_CEIL_DB` at the right stop.
#[inline]
pub fn db_to_angle(db: f32, sweep_deg: f32) -> f32 {
    let span = GAUGE_CEIL_DB - GAUGE_FLOOR_DB;
    let norm = (db.clamp(GAUGE_FLOOR_DB, GAUGE_CEIL_DB) - GAUGE_FLOOR_DB) / span;
    norm * sweep_deg - sweep_deg / 2.0
}

/// Spring-damped needle: a step-function target angle in, continuous motion
/// out. One instance per channel, stepped once per render frame.
///
///   v = (v + (target - angle) * k) * damping
///   angle += v
///
/// Geometric decay (|pole| < 1 for the default constants) means it converges
/// for any target and never winds up.
#[derive(Debug, Clone)]
pub struct Needle {
    // state
    pub angle_deg: f32,
    pub velocity_deg: f32,
    // params
    pub k_spring: f32,
    pub damping: f32,
    half_sweep: f32,
}

impl Needle {
    /// Needle parked at the left stop with the default spring feel.
    pub fn classic(sweep_deg: f32) -> Self {
        Self::with_params(sweep_deg, K_SPRING, DAMPING)
    }

    pub fn with_params(sweep_deg: f32, k_spring: f32, damping: f32) -> Self {
        let half_sweep = sweep_deg / 2.0;
        Self {
            angle_deg: -half_sweep,
            velocity_deg: 0.0,
            k_spring,
            damping,
            half_sweep,
        }
    }

    /// Advance one frame toward `target_deg`. Returns the new angle.
    /// The angle never escapes the sweep, even for wild targets.
    pub fn step(&mut self, target_deg: f32) -> f32 {
        let error = target_deg - self.angle_deg;
        let spring_force = error * self.k_spring;
        self.velocity_deg = (self.velocity_deg + spring_force) * self.damping;
        self.angle_deg += self.velocity_deg;

        // stops
        if self.angle_deg < -self.half_sweep {
            self.angle_deg = -self.half_sweep;
            self.velocity_deg = 0.0;
        }
        if self.angle_deg > self.half_sweep {
            self.angle_deg = self.half_sweep;
            self.velocity_deg = 0.0;
        }

        self.angle_deg
    }

    /// True once the needle has settled on `target_deg`; callers that only
    /// animate while in motion can stop scheduling frames.
    pub fn at_rest(&self, target_deg: f32) -> bool {
        (target_deg - self.angle_deg).abs() < REST_EPS && self.velocity_deg.abs() < REST_EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_map_endpoints() {
        let sweep = DEFAULT_SWEEP_DEG;
        assert!((db_to_angle(GAUGE_FLOOR_DB, sweep) + sweep / 2.0).abs() < 1e-4);
        assert!((db_to_angle(GAUGE_CEIL_DB, sweep) - sweep / 2.0).abs() < 1e-4);
        // clamped outside the domain
        assert_eq!(db_to_angle(-100.0, sweep), db_to_angle(GAUGE_FLOOR_DB, sweep));
        assert_eq!(db_to_angle(20.0, sweep), db_to_angle(GAUGE_CEIL_DB, sweep));
        // 0 dB sits right of center on a -60..+3 scale
        assert!(db_to_angle(0.0, sweep) > 0.0);
    }

    #[test]
    fn converges_from_the_stop() {
        let mut n = Needle::classic(DEFAULT_SWEEP_DEG);
        let target = db_to_angle(-6.0, DEFAULT_SWEEP_DEG);
        for _ in 0..500 {
            n.step(target);
        }
        assert!((n.angle_deg - target).abs() < 0.01);
        assert!(n.at_rest(target));
    }

    #[test]
    fn converges_from_any_state() {
        // hot initial velocity, target at the far end
        let mut n = Needle::classic(DEFAULT_SWEEP_DEG);
        n.angle_deg = 30.0;
        n.velocity_deg = -25.0;
        let target = db_to_angle(GAUGE_CEIL_DB, DEFAULT_SWEEP_DEG);
        for _ in 0..500 {
            n.step(target);
        }
        assert!((n.angle_deg - target).abs() < 0.01);
    }

    #[test]
    fn overshoot_is_bounded_and_decays() {
        let mut n = Needle::classic(DEFAULT_SWEEP_DEG);
        n.angle_deg = 0.0;
        let target = 10.0_f32;
        let mut max_angle = n.angle_deg;
        for _ in 0..500 {
            max_angle = max_angle.max(n.step(target));
        }
        // first bounce tops out around a quarter of the step for these
        // constants; anything past that means the spring went wrong
        assert!(max_angle - target < 3.0, "overshoot {}", max_angle - target);
        assert!((n.angle_deg - target).abs() < 0.01);
    }

    #[test]
    fn never_escapes_the_sweep() {
        let mut n = Needle::classic(DEFAULT_SWEEP_DEG);
        for _ in 0..200 {
            let a = n.step(500.0);
            assert!(a <= DEFAULT_SWEEP_DEG / 2.0 + 1e-4);
        }
        for _ in 0..200 {
            let a = n.step(-500.0);
            assert!(a >= -DEFAULT_SWEEP_DEG / 2.0 - 1e-4);
        }
    }
}
