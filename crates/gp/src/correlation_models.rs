//! Correlation models of the error term of the GP model.
//!
//! The following correlation models are implemented:
//! * squared exponential,
//! * absolute exponential,
//! * matern 5/2.
//!
//! Each model is stationary: it depends on componentwise differences `d = x - x'` and on
//! `theta`, the inverse length scales of each component.

use linfa::Float;
use ndarray::{Array2, ArrayBase, Axis, Data, Ix1, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for using a correlation model in GP regression
pub trait CorrelationModel<F: Float>: Clone + Copy + Default + fmt::Display + Sync {
    /// Correlation values r(x, x') as a (n, 1) matrix given `d` (n, nx) componentwise
    /// differences between x and x' and `theta` (nx,) hyperparameters.
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F>;
}

/// Squared exponential correlation model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct SquaredExponentialCorr();

impl<F: Float> CorrelationModel<F> for SquaredExponentialCorr {
    ///  nx
    /// prod exp( - (theta_j * d_j)^2 / 2 )
    ///  j=1
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F> {
        let theta2 = theta.mapv(|v| v * v);
        let r = d.mapv(|v| v * v).dot(&theta2);
        r.mapv(|v| F::exp(F::cast(-0.5) * v)).insert_axis(Axis(1))
    }
}

impl fmt::Display for SquaredExponentialCorr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SquaredExponential")
    }
}

/// Absolute exponential correlation model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct AbsoluteExponentialCorr();

impl<F: Float> CorrelationModel<F> for AbsoluteExponentialCorr {
    ///  nx
    /// prod exp( - theta_j * |d_j| )
    ///  j=1
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F> {
        let r = d.mapv(|v| v.abs()).dot(theta);
        r.mapv(|v| F::exp(-v)).insert_axis(Axis(1))
    }
}

impl fmt::Display for AbsoluteExponentialCorr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AbsoluteExponential")
    }
}

/// Matern 5/2 correlation model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Matern52Corr();

impl<F: Float> CorrelationModel<F> for Matern52Corr {
    ///  nx
    /// prod (1 + sqrt(5) * theta_j * |d_j| + 5/3 * theta_j^2 * d_j^2) * exp( - sqrt(5) * theta_j * |d_j| )
    ///  j=1
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F> {
        let sqrt5 = F::cast(5f64.sqrt());
        let five_thirds = F::cast(5. / 3.);
        let mut r = Array2::ones((d.nrows(), 1));
        Zip::from(r.rows_mut())
            .and(d.rows())
            .for_each(|mut ri, di| {
                let mut poly = F::one();
                let mut expo = F::zero();
                Zip::from(&di).and(theta).for_each(|&dj, &tj| {
                    let a = tj * dj.abs();
                    poly *= F::one() + sqrt5 * a + five_thirds * a * a;
                    expo += sqrt5 * a;
                });
                ri[0] = poly * F::exp(-expo);
            });
        r
    }
}

impl fmt::Display for Matern52Corr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Matern52")
    }
}
