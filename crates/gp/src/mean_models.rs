//! Regression models of the mean term of the GP model.
//!
//! The following models are implemented:
//! * constant,
//! * linear

use linfa::Float;
use ndarray::{Array2, ArrayBase, Axis, Data, Ix2, concatenate};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for mean models used in GP regression
pub trait RegressionModel<F: Float>: Clone + Copy + Default + fmt::Display + Sync {
    /// Regression basis values at `x` (n, nx) as a (n, p) matrix,
    /// p being the number of basis functions
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F>;
}

/// A constant function as mean of the GP
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ConstantMean();

impl<F: Float> RegressionModel<F> for ConstantMean {
    /// regr(x) = [1, ..., 1].T
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        Array2::<F>::ones((x.nrows(), 1))
    }
}

impl fmt::Display for ConstantMean {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Constant")
    }
}

/// An affine function as mean of the GP
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct LinearMean();

impl<F: Float> RegressionModel<F> for LinearMean {
    /// regr(x) = [ 1, x_1, ..., x_n ].T
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        concatenate![Axis(1), Array2::ones((x.nrows(), 1)), x.to_owned()]
    }
}

impl fmt::Display for LinearMean {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Linear")
    }
}
