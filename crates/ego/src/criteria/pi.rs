use crate::criteria::InfillCriterion;
use crate::utils::{log_norm_cdf, norm_cdf};

/// Probability of improvement over the current best value of a minimized output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProbabilityOfImprovement;

/// PI infill criterion
pub const PI: ProbabilityOfImprovement = ProbabilityOfImprovement;

impl InfillCriterion for ProbabilityOfImprovement {
    fn name(&self) -> &'static str {
        "PI"
    }

    /// `Phi((fmin - mean) / sigma)`, 0 when sigma vanishes
    fn value(&self, mean: f64, variance: f64, fmin: f64) -> f64 {
        match improvement_z(mean, variance, fmin) {
            Some(z) => norm_cdf(z),
            None => 0.0,
        }
    }

    fn log_value(&self, mean: f64, variance: f64, fmin: f64) -> f64 {
        match improvement_z(mean, variance, fmin) {
            Some(z) => log_norm_cdf(z),
            None => f64::NEG_INFINITY,
        }
    }
}

/// Reduced improvement `(fmin - mean) / sigma`, None when it is undefined
fn improvement_z(mean: f64, variance: f64, fmin: f64) -> Option<f64> {
    let sigma = variance.max(0.).sqrt();
    if sigma < f64::EPSILON || !mean.is_finite() || fmin.is_nan() {
        None
    } else {
        Some((fmin - mean) / sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pi_values() {
        assert_abs_diff_eq!(PI.value(1., 4., 1.), 0.5, epsilon = 1e-12);
        assert!(PI.value(0., 1., 1.) > 0.5);
        assert!(PI.value(2., 1., 1.) < 0.5);
        assert_eq!(PI.value(0., 0., 1.), 0.);
        assert_eq!(PI.value(0., 1e-40, 1.), 0.);
    }

    #[test]
    fn test_log_pi_in_far_tail() {
        assert_eq!(PI.value(50., 1., 0.), 0.);
        let log_pi = PI.log_value(50., 1., 0.);
        assert!(log_pi.is_finite());
        assert!(PI.log_value(60., 1., 0.) < log_pi);
        assert_abs_diff_eq!(PI.log_value(1., 4., 1.), 0.5f64.ln(), epsilon = 1e-12);
        assert_eq!(PI.log_value(0., 0., 1.), f64::NEG_INFINITY);
    }

    #[test]
    fn test_pi_in_unit_interval() {
        for mean in [-1e3, -1., 0., 1., 1e3] {
            for var in [1e-8, 1e-2, 1., 1e4] {
                let v = PI.value(mean, var, 0.);
                assert!((0. ..=1.).contains(&v));
            }
        }
    }
}
