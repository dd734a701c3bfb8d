//! Scalar smoothing filter for the pointing offsets.
//!
//! One instance per axis. The engine constructs its pair with tighter
//! noise terms than the generic defaults (see `fusion`), trading a little
//! smoothness for responsiveness on a human-scale target.

/// 1-D recursive estimator.
#[derive(Debug, Clone, Copy)]
pub struct ScalarKalman {
    q: f64,
    r: f64,
    x: f64,
    p: f64,
    initialized: bool,
}

impl Default for ScalarKalman {
    fn default() -> Self {
        Self::new(0.1, 0.5)
    }
}

impl ScalarKalman {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            q: process_noise,
            r: measurement_noise,
            x: 0.0,
            p: 1.0,
            initialized: false,
        }
    }

    /// Fold a measurement into the estimate and return it.
    ///
    /// The first call after construction or [`reset`](Self::reset) snaps
    /// straight to the measurement so a cold start does not drag the
    /// output through zero.
    pub fn update(&mut self, measurement: f64) -> f64 {
        if !self.initialized {
            self.x = measurement;
            self.initialized = true;
            return self.x;
        }

        // Prediction
        self.p += self.q;

        // Update
        let k = self.p / (self.p + self.r);
        self.x += k * (measurement - self.x);
        self.p *= 1.0 - k;

        self.x
    }

    /// Clear to the uninitialized state (estimate 0, uncertainty 1).
    pub fn reset(&mut self) {
        self.x = 0.0;
        self.p = 1.0;
        self.initialized = false;
    }

    pub fn estimate(&self) -> f64 {
        self.x
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_snaps_to_measurement() {
        let mut f = ScalarKalman::new(0.05, 0.2);
        assert_eq!(f.update(0.37), 0.37);
    }

    #[test]
    fn reset_restores_cold_start() {
        let mut f = ScalarKalman::new(0.05, 0.2);
        f.update(0.8);
        f.update(0.6);
        f.reset();
        assert!(!f.is_initialized());
        assert_eq!(f.estimate(), 0.0);
        assert_eq!(f.update(5.0), 5.0);
    }

    #[test]
    fn converges_to_constant_measurement() {
        let mut f = ScalarKalman::new(0.05, 0.2);
        f.update(0.0);
        let mut estimate = 0.0;
        for _ in 0..20 {
            estimate = f.update(1.0);
        }
        assert!(
            (estimate - 1.0).abs() < 1e-3,
            "estimate {estimate} did not converge"
        );
    }

    #[test]
    fn uncertainty_shrinks_the_correction() {
        // Later gains should be smaller than the first post-init gain.
        let mut f = ScalarKalman::new(0.05, 0.2);
        f.update(0.0);
        let e1 = f.update(1.0);
        let step1 = e1;
        let e2 = f.update(1.0);
        let step2 = e2 - e1;
        assert!(step2 < step1, "correction grew: {step1} -> {step2}");
    }

    #[test]
    fn default_tuning_is_looser() {
        let f = ScalarKalman::default();
        // Defaults q=0.1, r=0.5 behave the same structurally; just make
        // sure construction wires the state correctly.
        assert!(!f.is_initialized());
        assert_eq!(f.estimate(), 0.0);
    }
}
