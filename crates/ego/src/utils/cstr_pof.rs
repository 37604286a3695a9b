use crate::problem::Constraint;
use crate::types::ComparisonOp;
use crate::utils::{log1mexp, log_norm_cdf};

/// Probability that a constraint predicted with `mean` and `variance` holds
///
/// With a vanishing standard deviation the prediction is taken as certain.
pub fn pof(op: ComparisonOp, threshold: f64, tol: f64, mean: f64, variance: f64) -> f64 {
    log_pof(op, threshold, tol, mean, variance).exp()
}

/// Logarithm of [pof], finite as long as the probability is not exactly 0
pub fn log_pof(op: ComparisonOp, threshold: f64, tol: f64, mean: f64, variance: f64) -> f64 {
    let sigma = variance.max(0.).sqrt();
    if sigma < f64::EPSILON {
        return if op.holds(mean, threshold, tol) {
            0.
        } else {
            f64::NEG_INFINITY
        };
    }
    let log_p = match op {
        ComparisonOp::Le | ComparisonOp::Lt => log_norm_cdf((threshold - mean) / sigma),
        ComparisonOp::Ge | ComparisonOp::Gt => log_norm_cdf((mean - threshold) / sigma),
        ComparisonOp::Eq => {
            let upper = log_norm_cdf((threshold + tol - mean) / sigma);
            let lower = log_norm_cdf((threshold - tol - mean) / sigma);
            if lower >= upper {
                f64::NEG_INFINITY
            } else {
                upper + log1mexp(lower - upper)
            }
        }
    };
    log_p.min(0.)
}

/// Product of the probabilities of feasibility of `constraints`
///
/// Constraints without prediction (NaN mean) are ignored.
pub fn pofs(constraints: &[Constraint], tol: f64, means: &[f64], variances: &[f64]) -> f64 {
    log_pofs(constraints, tol, means, variances).exp()
}

/// Logarithm of [pofs]
pub fn log_pofs(constraints: &[Constraint], tol: f64, means: &[f64], variances: &[f64]) -> f64 {
    constraints
        .iter()
        .zip(means.iter().zip(variances.iter()))
        .filter(|(_, (mean, _))| !mean.is_nan())
        .map(|(c, (mean, var))| log_pof(c.op, c.threshold, tol, *mean, *var))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Extraction;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pof() {
        assert_abs_diff_eq!(pof(ComparisonOp::Le, 0., 0., 0., 1.), 0.5, epsilon = 1e-12);
        assert!(pof(ComparisonOp::Le, 0., 0., -3., 1.) > 0.99);
        assert!(pof(ComparisonOp::Ge, 0., 0., -3., 1.) < 0.01);
        assert_eq!(pof(ComparisonOp::Gt, 1., 0., 2., 0.), 1.);
        assert_eq!(pof(ComparisonOp::Lt, 1., 0., 2., 0.), 0.);
        let p_eq = pof(ComparisonOp::Eq, 0., 0.1, 0., 1.);
        assert!(p_eq > 0. && p_eq < 0.1);
    }

    #[test]
    fn test_log_pof_far_from_feasible() {
        assert_eq!(pof(ComparisonOp::Le, 0., 0., 50., 1.), 0.);
        let far = log_pof(ComparisonOp::Le, 0., 0., 50., 1.);
        let farther = log_pof(ComparisonOp::Le, 0., 0., 60., 1.);
        assert!(far.is_finite() && farther.is_finite());
        assert!(farther < far);
        assert_eq!(log_pof(ComparisonOp::Le, 0., 0., 1., 0.), f64::NEG_INFINITY);
        assert_eq!(log_pof(ComparisonOp::Eq, 0., 0., 0., 1.), f64::NEG_INFINITY);
    }

    #[test]
    fn test_pofs_ignores_unpredicted() {
        let cstrs = vec![
            Constraint::new("a", ComparisonOp::Le, 0., Extraction::output("a")),
            Constraint::new("b", ComparisonOp::Le, 0., Extraction::output("b")),
        ];
        let p = pofs(&cstrs, 0., &[0., f64::NAN], &[1., f64::NAN]);
        assert_abs_diff_eq!(p, 0.5, epsilon = 1e-12);
    }
}
