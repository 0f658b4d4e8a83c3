//! CPU burn workload.

use std::hint::black_box;

use super::rng::Rng;

/// Inner iterations per outer iteration at intensity 1.
const BASE_ITERATIONS: u64 = 100_000;
/// A random nudge is added every this many inner iterations.
const PERTURB_EVERY: u64 = 10_000;

/// Floating point busy loop scaled by an intensity factor.
pub struct CpuBurn {
    intensity: u32,
    rng: Rng,
}

impl CpuBurn {
    pub fn new(intensity: u32) -> Self {
        CpuBurn {
            intensity: intensity.max(1),
            rng: Rng::from_entropy(),
        }
    }

    /// One outer iteration: `100_000 * intensity` multiply/divide pairs.
    pub fn burst(&mut self) -> f64 {
        let mut x = 1.0f64;
        let iterations = BASE_ITERATIONS * u64::from(self.intensity);
        for i in 0..iterations {
            x *= black_box(1.000001);
            x /= black_box(1.000001);
            if i % PERTURB_EVERY == 0 {
                x += self.rng.next_f64() * 0.001;
            }
        }
        x
    }

    /// Burns until the process is terminated from outside.
    pub fn run(mut self) -> ! {
        loop {
            black_box(self.burst());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_stays_near_one() {
        let mut burn = CpuBurn::new(1);
        let x = burn.burst();
        assert!(x.is_finite());
        // Ten perturbations of at most 0.001 each.
        assert!((0.999..1.011).contains(&x), "unexpected value {x}");
    }

    #[test]
    fn zero_intensity_is_clamped() {
        let burn = CpuBurn::new(0);
        assert_eq!(burn.intensity, 1);
    }
}
