use std::sync::{Arc, RwLock};

use crate::SamplingMethod;
use linfa::Float;
use ndarray::{Array, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{RandomExt, rand::Rng, rand::SeedableRng, rand_distr::Uniform};
use rand_xoshiro::Xoshiro256Plus;

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

type SharedRng<R> = Arc<RwLock<R>>;

/// Uniform random design: every component of every sample is drawn independently
/// and uniformly within its bounds.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Random<F: Float, R: Rng> {
    /// Sampling space as a (nx, 2) matrix of \[lower, upper\] rows
    xlimits: Array2<F>,
    /// Generator shared by clones of this design
    rng: SharedRng<R>,
}

impl<F: Float> Random<F, Xoshiro256Plus> {
    /// Random design over `xlimits` seeded from system entropy
    ///
    /// ```
    /// use moego_doe::Random;
    /// use ndarray::arr2;
    ///
    /// let doe = Random::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]));
    /// ```
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> Random<F, R> {
    /// Random design over `xlimits` drawing from `rng`
    ///
    /// **Panics** if `xlimits` does not have exactly 2 columns.
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        assert_eq!(
            xlimits.ncols(),
            2,
            "xlimits must have 2 columns (lower, upper)"
        );
        Random {
            xlimits: xlimits.to_owned(),
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Replace the random generator, typically by a seeded one for reproducibility
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Random<F, R2> {
        Random {
            xlimits: self.xlimits,
            rng: Arc::new(RwLock::new(rng)),
        }
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Random<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let nx = self.xlimits.nrows();
        let mut rng = self.rng.write().unwrap();
        Array::random_using((ns, nx), Uniform::new(0., 1.), &mut *rng).mapv(F::cast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_abs_diff_ne};
    use ndarray::arr2;

    #[test]
    fn test_random_within_bounds() {
        let xlimits = arr2(&[[5., 10.], [0., 1.], [-3., -2.]]);
        let doe = Random::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(50);
        assert_eq!(doe.dim(), (50, 3));
        for row in doe.rows() {
            for (v, lim) in row.iter().zip(xlimits.rows()) {
                assert!(lim[0] <= *v && *v <= lim[1], "{v} out of {lim}");
            }
        }
    }

    #[test]
    fn test_random_reproducible() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let s1 = Random::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(9);
        let s2 = Random::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(9);
        assert_abs_diff_eq!(s1, s2, epsilon = 0.);
    }

    #[test]
    fn test_random_successive_draws_differ() {
        let xlimits = arr2(&[[0., 1.]]);
        let doe = Random::new(&xlimits).with_rng(Xoshiro256Plus::seed_from_u64(0));
        let s1 = doe.sample(4);
        let s2 = doe.sample(4);
        assert_abs_diff_ne!(s1, s2);
    }
}
