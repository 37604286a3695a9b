use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2, Zip};
use ndarray_stats::DeviationExt;
use rayon::prelude::*;

/// Euclidean distances between every pair of rows `(i, j)` with `i < j`,
/// listed in row-major pair order
pub fn pdist<F: Float>(x: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>) -> Array1<F> {
    let n = x.nrows();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    pairs
        .par_iter()
        .map(|&(i, j)| F::cast(x.row(i).l2_dist(&x.row(j)).unwrap_or(f64::NAN)))
        .collect::<Vec<_>>()
        .into()
}

/// Euclidean distances between rows of `xa` (ma, nx) and rows of `xb` (mb, nx)
/// as a (ma, mb) matrix
///
/// **Panics** if operands do not have the same number of columns
pub fn cdist<F: Float>(
    xa: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>,
    xb: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>,
) -> Array2<F> {
    assert_eq!(
        xa.ncols(),
        xb.ncols(),
        "cdist: operands should have same nb of columns"
    );
    let mut res = Array2::zeros((xa.nrows(), xb.nrows()));
    Zip::from(res.rows_mut())
        .and(xa.rows())
        .par_for_each(|mut dists, a| {
            Zip::from(&mut dists)
                .and(xb.rows())
                .for_each(|d, b| *d = F::cast(a.l2_dist(&b).unwrap_or(f64::NAN)));
        });
    res
}
