use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2, s};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A (n, nx) matrix stored centered and scaled along with the column statistics used
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub(crate) struct NormalizedData<F: Float> {
    /// normalized data
    pub data: Array2<F>,
    /// column means of the raw data
    pub mean: Array1<F>,
    /// column standard deviations of the raw data, 1 for constant columns
    pub std: Array1<F>,
}

impl<F: Float> NormalizedData<F> {
    /// Normalize `x` columnwise
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> NormalizedData<F> {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = if x.nrows() > 1 {
            x.std_axis(Axis(0), F::one())
                .mapv(|v| if v == F::zero() { F::one() } else { v })
        } else {
            Array1::ones(x.ncols())
        };
        let data = (x - &mean) / &std;
        NormalizedData { data, mean, std }
    }

    /// Apply the stored transformation to other raw points
    pub fn normalize(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        (x - &self.mean) / &self.std
    }
}

/// Componentwise absolute differences between every pair of distinct rows of a (n_obs, nx) matrix,
/// used to assemble the correlation matrix of the training points
#[derive(Debug)]
pub(crate) struct DiffMatrix<F: Float> {
    /// Differences as (n_obs * (n_obs - 1) / 2, nx) array
    pub d: Array2<F>,
    /// Row indices (i, j), i < j, of each difference
    pub d_indices: Array2<usize>,
    /// Number of observations
    pub n_obs: usize,
}

impl<F: Float> DiffMatrix<F> {
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> DiffMatrix<F> {
        let n_obs = x.nrows();
        let n_pairs = n_obs * n_obs.saturating_sub(1) / 2;
        let mut d = Array2::zeros((n_pairs, x.ncols()));
        let mut d_indices = Array2::<usize>::zeros((n_pairs, 2));
        let mut start = 0;
        for i in 0..n_obs.saturating_sub(1) {
            let end = start + n_obs - i - 1;
            let diff = (&x.row(i) - &x.slice(s![i + 1.., ..])).mapv(|v| v.abs());
            d.slice_mut(s![start..end, ..]).assign(&diff);
            for (k, j) in ((i + 1)..n_obs).enumerate() {
                d_indices[[start + k, 0]] = i;
                d_indices[[start + k, 1]] = j;
            }
            start = end;
        }
        DiffMatrix {
            d,
            d_indices,
            n_obs,
        }
    }
}

/// Differences between each row of `x` and each row of `y`,
/// as a (nrows(x) * nrows(y), ncols) array where row `i * nrows(y) + j` holds `x_i - y_j`
///
/// **Panics** if x and y have not the same number of columns
pub(crate) fn pairwise_differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert_eq!(x.ncols(), y.ncols());
    let ny = y.nrows();
    let mut result = Array2::zeros((x.nrows() * ny, x.ncols()));
    for (i, xi) in x.rows().into_iter().enumerate() {
        result
            .slice_mut(s![i * ny..(i + 1) * ny, ..])
            .assign(&(&xi - y));
    }
    result
}
