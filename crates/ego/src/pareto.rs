//! Pareto dominance utilities shared by the population search and the result aggregation.
//!
//! Every objective is minimized.
use ndarray::{Array2, ArrayBase, ArrayView1, Axis, Data, Ix1, Ix2};

/// Whether `a` Pareto dominates `b`: no worse on every objective, better on at least one
pub fn dominates(
    a: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    b: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> bool {
    let mut better = false;
    for (fa, fb) in a.iter().zip(b.iter()) {
        if fa > fb {
            return false;
        }
        if fa < fb {
            better = true;
        }
    }
    better
}

/// Constrained dominance: a feasible point dominates an infeasible one, two infeasible
/// points compare by violation, two feasible points by Pareto dominance
pub fn constrained_dominates(
    a: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    violation_a: f64,
    b: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    violation_b: f64,
) -> bool {
    match (violation_a > 0., violation_b > 0.) {
        (false, true) => true,
        (true, false) => false,
        (true, true) => violation_a < violation_b,
        (false, false) => dominates(a, b),
    }
}

/// Fast non-dominated sorting of the rows of `objectives` under constrained dominance
///
/// Returns the fronts, best first, each listing row indices in increasing order.
pub fn fast_non_dominated_sort(
    objectives: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    violations: &[f64],
) -> Vec<Vec<usize>> {
    let n = objectives.nrows();
    let mut domination_count = vec![0usize; n];
    let mut dominated: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            let (fi, fj) = (objectives.row(i), objectives.row(j));
            if constrained_dominates(&fi, violations[i], &fj, violations[j]) {
                dominated[i].push(j);
                domination_count[j] += 1;
            } else if constrained_dominates(&fj, violations[j], &fi, violations[i]) {
                dominated[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in current.iter() {
            for &j in dominated[i].iter() {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Crowding distance of the members of `front` (row indices of `objectives`)
///
/// Boundary members of each objective get an infinite distance.
pub fn crowding_distance(
    objectives: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    front: &[usize],
) -> Vec<f64> {
    let size = front.len();
    let mut distance = vec![0.; size];
    if size <= 2 {
        return vec![f64::INFINITY; size];
    }
    let mut order: Vec<usize> = (0..size).collect();
    for m in 0..objectives.ncols() {
        order.sort_by(|&a, &b| objectives[[front[a], m]].total_cmp(&objectives[[front[b], m]]));
        let first = order[0];
        let last = order[size - 1];
        distance[first] = f64::INFINITY;
        distance[last] = f64::INFINITY;
        let range = objectives[[front[last], m]] - objectives[[front[first], m]];
        if range <= f64::EPSILON {
            continue;
        }
        for w in order.windows(3) {
            let (prev, curr, next) = (w[0], w[1], w[2]);
            distance[curr] +=
                (objectives[[front[next], m]] - objectives[[front[prev], m]]) / range;
        }
    }
    distance
}

/// Indices of the rows of `objectives` not dominated by any other row, in increasing order
pub fn non_dominated_indices(objectives: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Vec<usize> {
    (0..objectives.nrows())
        .filter(|&i| {
            let fi = objectives.row(i);
            !objectives
                .rows()
                .into_iter()
                .enumerate()
                .any(|(j, fj)| j != i && dominates(&fj, &fi))
        })
        .collect()
}

/// Hypervolume dominated by the rows of `points` and bounded by `reference`
///
/// Points not strictly better than the reference on every objective do not contribute.
pub fn hypervolume(
    points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    reference: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> f64 {
    let kept: Vec<ArrayView1<f64>> = points
        .rows()
        .into_iter()
        .filter(|p| p.iter().zip(reference.iter()).all(|(v, r)| v < r))
        .collect();
    if kept.is_empty() || reference.is_empty() {
        return 0.;
    }
    let mut pts = Array2::zeros((kept.len(), reference.len()));
    for (mut row, p) in pts.rows_mut().into_iter().zip(kept) {
        row.assign(&p);
    }
    let reference: Vec<f64> = reference.to_vec();
    slice_volume(pts, &reference)
}

/// Hypervolume by slicing along the last objective, points all dominating `reference`
fn slice_volume(mut points: Array2<f64>, reference: &[f64]) -> f64 {
    let m = reference.len();
    if points.nrows() == 0 {
        return 0.;
    }
    if m == 1 {
        let best = points.column(0).fold(f64::INFINITY, |acc, v| acc.min(*v));
        return reference[0] - best;
    }
    let last = m - 1;
    let mut order: Vec<usize> = (0..points.nrows()).collect();
    order.sort_by(|&a, &b| points[[a, last]].total_cmp(&points[[b, last]]));
    points = points.select(Axis(0), &order);

    let mut volume = 0.;
    for i in 0..points.nrows() {
        let lower = points[[i, last]];
        let upper = if i + 1 < points.nrows() {
            points[[i + 1, last]]
        } else {
            reference[last]
        };
        let depth = upper - lower;
        if depth <= 0. {
            continue;
        }
        let projected = points
            .slice(ndarray::s![..=i, ..last])
            .to_owned();
        volume += depth * slice_volume(projected, &reference[..last]);
    }
    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_dominates() {
        assert!(dominates(&array![1., 2.], &array![1., 3.]));
        assert!(!dominates(&array![1., 3.], &array![1., 3.]));
        assert!(!dominates(&array![0., 4.], &array![1., 3.]));
    }

    #[test]
    fn test_constrained_dominance() {
        let (a, b) = (array![5., 5.], array![0., 0.]);
        assert!(constrained_dominates(&a, 0., &b, 0.1));
        assert!(!constrained_dominates(&b, 0.1, &a, 0.));
        assert!(constrained_dominates(&a, 0.1, &b, 0.2));
        assert!(constrained_dominates(&b, 0., &a, 0.));
    }

    #[test]
    fn test_sort_ranks_feasible_first() {
        let objs = array![[0., 0.], [1., 2.], [2., 1.], [3., 3.], [-1., -1.]];
        let violations = [0., 0., 0., 0., 0.5];
        let fronts = fast_non_dominated_sort(&objs, &violations);
        assert_eq!(fronts, vec![vec![0], vec![1, 2], vec![3], vec![4]]);
    }

    #[test]
    fn test_crowding_distance() {
        let objs = array![[0., 4.], [1., 2.], [2., 1.5], [4., 0.]];
        let d = crowding_distance(&objs, &[0, 1, 2, 3]);
        assert!(d[0].is_infinite() && d[3].is_infinite());
        assert_abs_diff_eq!(d[1], 2. / 4. + 2.5 / 4., epsilon = 1e-12);
        assert_abs_diff_eq!(d[2], 3. / 4. + 2. / 4., epsilon = 1e-12);
        assert!(crowding_distance(&objs, &[1, 2]).iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn test_non_dominated_indices() {
        let objs = array![[1., 3.], [2., 2.], [2., 3.], [3., 1.], [1., 3.]];
        assert_eq!(non_dominated_indices(&objs), vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_hypervolume() {
        let front = array![[1., 3.], [2., 2.], [3., 1.]];
        assert_abs_diff_eq!(hypervolume(&front, &array![4., 4.]), 6., epsilon = 1e-12);
        let with_outlier = array![[1., 3.], [2., 2.], [3., 1.], [5., 0.], [2.5, 2.5]];
        assert_abs_diff_eq!(hypervolume(&with_outlier, &array![4., 4.]), 6., epsilon = 1e-12);
        assert_abs_diff_eq!(
            hypervolume(&array![[0., 0., 0.]], &array![1., 2., 3.]),
            6.,
            epsilon = 1e-12
        );
        let cubes = array![[0., 0., 1.], [1., 1., 0.]];
        assert_abs_diff_eq!(hypervolume(&cubes, &array![2., 2., 2.]), 4. + 1., epsilon = 1e-12);
        assert_eq!(hypervolume(&Array2::<f64>::zeros((0, 2)), &array![1., 1.]), 0.);
    }
}
