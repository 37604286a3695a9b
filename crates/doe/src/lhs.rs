use crate::SamplingMethod;
use crate::utils::pdist;
use linfa::Float;
use ndarray::{Array, Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{
    RandomExt, rand::Rng, rand::SeedableRng, rand::seq::SliceRandom, rand_distr::Uniform,
};
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;
use std::sync::{Arc, RwLock};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Number of candidate designs drawn by maximin variants
const MAXIMIN_TRIALS: usize = 5;

/// Kinds of Latin Hypercube Design
#[derive(Clone, Debug, Default, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum LhsKind {
    /// sample is drawn uniformly within its stratum
    Classic,
    /// sample is the middle of its stratum
    Centered,
    /// best of several classic designs regarding the minimal distance between points
    #[default]
    Maximin,
    /// best of several centered designs regarding the minimal distance between points
    CenteredMaximin,
}

type SharedRng<R> = Arc<RwLock<R>>;

/// Latin hypercube design: each axis is cut into `ns` strata of equal width and every
/// stratum of every axis holds exactly one of the `ns` points.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Lhs<F: Float, R: Rng> {
    /// Sampling space as a (nx, 2) matrix of \[lower, upper\] rows
    xlimits: Array2<F>,
    /// Requested kind of LHS
    kind: LhsKind,
    /// Generator shared by clones of this design
    rng: SharedRng<R>,
}

impl<F: Float> Lhs<F, Xoshiro256Plus> {
    /// LHS over `xlimits` seeded from system entropy
    ///
    /// ```
    /// use moego_doe::Lhs;
    /// use ndarray::arr2;
    ///
    /// let doe = Lhs::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]));
    /// ```
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Lhs<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let unit = match self.kind {
            LhsKind::Classic => self.stratified(ns, false),
            LhsKind::Centered => self.stratified(ns, true),
            LhsKind::Maximin => self.maximin(ns, false),
            LhsKind::CenteredMaximin => self.maximin(ns, true),
        };
        unit.mapv(F::cast)
    }
}

impl<F: Float, R: Rng> Lhs<F, R> {
    /// LHS over `xlimits` drawing from `rng`
    ///
    /// **Panics** if `xlimits` does not have exactly 2 columns.
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        assert_eq!(
            xlimits.ncols(),
            2,
            "xlimits must have 2 columns (lower, upper)"
        );
        Lhs {
            xlimits: xlimits.to_owned(),
            kind: LhsKind::default(),
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Sets the kind of LHS
    pub fn kind(mut self, kind: LhsKind) -> Self {
        self.kind = kind;
        self
    }

    /// Replace the random generator, typically by a seeded one for reproducibility
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Lhs<F, R2> {
        Lhs {
            xlimits: self.xlimits,
            kind: self.kind,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// One point per stratum and axis, strata permuted independently per axis
    fn stratified(&self, ns: usize, centered: bool) -> Array2<f64> {
        let nx = self.xlimits.nrows();
        let width = 1. / ns as f64;
        let mut rng = self.rng.write().unwrap();
        let offsets = if centered {
            Array2::from_elem((ns, nx), 0.5)
        } else {
            Array::random_using((ns, nx), Uniform::new(0., 1.), &mut *rng)
        };
        let mut doe = Array2::zeros((ns, nx));
        let mut strata: Vec<usize> = (0..ns).collect();
        for j in 0..nx {
            strata.shuffle(&mut *rng);
            for (i, &k) in strata.iter().enumerate() {
                doe[[i, j]] = (k as f64 + offsets[[i, j]]) * width;
            }
        }
        doe
    }

    /// Keeps the design maximizing the minimal pairwise distance among a few trials
    fn maximin(&self, ns: usize, centered: bool) -> Array2<f64> {
        let min_dist = |doe: &Array2<f64>| -> f64 {
            let d: Array1<f64> = pdist(doe);
            d.min().map(|v| *v).unwrap_or(f64::INFINITY)
        };
        let mut best = self.stratified(ns, centered);
        let mut best_dist = min_dist(&best);
        for _ in 1..MAXIMIN_TRIALS {
            let trial = self.stratified(ns, centered);
            let dist = min_dist(&trial);
            if dist > best_dist {
                best = trial;
                best_dist = dist;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_abs_diff_ne};
    use ndarray::{arr2, array};

    fn check_strata(doe: &Array2<f64>, xlimits: &Array2<f64>) {
        let ns = doe.nrows();
        for (j, lim) in xlimits.rows().into_iter().enumerate() {
            let width = (lim[1] - lim[0]) / ns as f64;
            let mut seen = vec![false; ns];
            for v in doe.column(j) {
                let k = (((v - lim[0]) / width) as usize).min(ns - 1);
                assert!(!seen[k], "stratum {k} of axis {j} hit twice");
                seen[k] = true;
            }
        }
    }

    #[test]
    fn test_classic_lhs_one_point_per_stratum() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let doe = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .kind(LhsKind::Classic)
            .sample(7);
        assert_eq!(doe.dim(), (7, 2));
        check_strata(&doe, &xlimits);
    }

    #[test]
    fn test_maximin_lhs_one_point_per_stratum() {
        let xlimits = arr2(&[[0., 1.], [0., 1.], [-1., 1.]]);
        let doe = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(20);
        check_strata(&doe, &xlimits);
    }

    #[test]
    fn test_centered_lhs() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let mut doe = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(0))
            .kind(LhsKind::Centered)
            .sample(5);
        // sorting each column gives the strata centers
        for mut col in doe.columns_mut() {
            let mut v = col.to_vec();
            v.sort_by(|a: &f64, b: &f64| a.total_cmp(b));
            col.assign(&Array1::from_vec(v));
        }
        let expected = array![[5.5, 0.1], [6.5, 0.3], [7.5, 0.5], [8.5, 0.7], [9.5, 0.9]];
        assert_abs_diff_eq!(expected, doe, epsilon = 1e-9);
    }

    #[test]
    fn test_lhs_reproducible() {
        let xlimits = arr2(&[[-1., 1.], [0., 3.]]);
        let s1 = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(10);
        let s2 = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(10);
        assert_abs_diff_eq!(s1, s2, epsilon = 0.);
    }

    #[test]
    fn test_no_duplicate() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let lhs = Lhs::new(&xlimits).with_rng(Xoshiro256Plus::seed_from_u64(42));
        let sample1 = lhs.sample(5);
        let sample2 = lhs.sample(5);
        assert_abs_diff_ne!(sample1, sample2);
    }
}
