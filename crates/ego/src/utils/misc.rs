use libm::{erfc, exp, expm1, log, log1p};
use ndarray::{ArrayBase, Data, Ix1, Ix2};
use ndarray_stats::DeviationExt;

const SQRT_2PI: f64 = 2.5066282746310007;
const LOG_2PI_OVER_2: f64 = 0.9189385332046727; // log(2π)/2
/// Below this value erfc loses its relative accuracy and the asymptotic expansion is used
const LOG_CDF_TAIL: f64 = -30.;

/// Distance under which two design points are considered identical
pub const DUPLICATE_TOL: f64 = 100. * f64::EPSILON;

/// Cumulative distribution function of Standard Normal at x
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Probability density function of Standard Normal at x
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

/// Logarithm of the cumulative distribution function of Standard Normal at x
///
/// Stays finite far in the lower tail where `norm_cdf` underflows to 0.
pub fn log_norm_cdf(x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else if x > 0. {
        log1p(-0.5 * erfc(x / std::f64::consts::SQRT_2))
    } else if x > LOG_CDF_TAIL {
        log(0.5 * erfc(-x / std::f64::consts::SQRT_2))
    } else if x == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        let x2 = x * x;
        let series = -1. / x2 + 3. / (x2 * x2) - 15. / (x2 * x2 * x2);
        -0.5 * x2 - log(-x) - LOG_2PI_OVER_2 + log1p(series)
    }
}

/// `log(1 - exp(x))` for `x <= 0`
pub fn log1mexp(x: f64) -> f64 {
    if x > -std::f64::consts::LN_2 {
        log(-expm1(x))
    } else {
        log1p(-exp(x))
    }
}

/// Check whether `x_new` is far enough from every row of `x_data` to be added
pub fn is_update_ok(
    x_data: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    x_new: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> bool {
    for row in x_data.rows() {
        match row.l1_dist(x_new) {
            Ok(d) if d < DUPLICATE_TOL => return false,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_norm_cdf_pdf() {
        assert_abs_diff_eq!(norm_cdf(0.), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_cdf(1.96), 0.9750021048517795, epsilon = 1e-9);
        assert_abs_diff_eq!(norm_cdf(-1.96), 1. - 0.9750021048517795, epsilon = 1e-9);
        assert_abs_diff_eq!(norm_pdf(0.), 1. / SQRT_2PI, epsilon = 1e-12);
    }

    #[test]
    fn test_log_norm_cdf() {
        for x in [-25., -5., -1., 0., 1., 5.] {
            assert_abs_diff_eq!(log_norm_cdf(x), norm_cdf(x).ln(), epsilon = 1e-10);
        }
        // both sides of the asymptotic switch agree
        assert_abs_diff_eq!(
            log_norm_cdf(LOG_CDF_TAIL + 1e-9),
            log_norm_cdf(LOG_CDF_TAIL - 1e-9),
            epsilon = 1e-6
        );
        assert_eq!(norm_cdf(-40.), 0.);
        let tail = log_norm_cdf(-40.);
        assert!(tail.is_finite());
        assert!(tail < log_norm_cdf(-39.));
        assert_abs_diff_eq!(tail, -804.6084420137538, epsilon = 1e-6);
        assert_eq!(log_norm_cdf(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn test_log1mexp() {
        assert_abs_diff_eq!(log1mexp(-0.1), (1. - (-0.1f64).exp()).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(log1mexp(-3.), (1. - (-3f64).exp()).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_is_update_ok() {
        let data = array![[0., 0.], [1., 1.]];
        assert!(!is_update_ok(&data, &array![1., 1.]));
        assert!(!is_update_ok(&data, &array![1., 1. + f64::EPSILON]));
        assert!(is_update_ok(&data, &array![0.5, 1.]));
    }
}
