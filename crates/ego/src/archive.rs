//! Append-only record of every evaluation of a run.
use std::sync::{Arc, PoisonError, RwLock};

use ndarray::{Array1, Array2};
use serde::Serialize;

/// Outcome of the evaluation of one design point
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationRecord {
    /// Evaluated design point
    pub x: Array1<f64>,
    /// Objective values, NaN when the evaluation failed
    pub objectives: Array1<f64>,
    /// Constraint values, NaN when the evaluation failed
    pub constraints: Array1<f64>,
    /// Whether every constraint holds, false when the evaluation failed
    pub feasible: bool,
    /// Failure reason if the evaluation failed
    pub failure: Option<String>,
}

impl EvaluationRecord {
    /// Record of a successful evaluation
    pub fn evaluated(
        x: Array1<f64>,
        objectives: Array1<f64>,
        constraints: Array1<f64>,
        feasible: bool,
    ) -> Self {
        EvaluationRecord {
            x,
            objectives,
            constraints,
            feasible,
            failure: None,
        }
    }

    /// Record of a failed evaluation
    pub fn failed(x: Array1<f64>, n_obj: usize, n_cstr: usize, reason: impl Into<String>) -> Self {
        EvaluationRecord {
            x,
            objectives: Array1::from_elem(n_obj, f64::NAN),
            constraints: Array1::from_elem(n_cstr, f64::NAN),
            feasible: false,
            failure: Some(reason.into()),
        }
    }

    /// Whether the evaluation failed
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Whether the record can train objective surrogates
    pub fn is_usable(&self) -> bool {
        self.feasible && !self.is_failure()
    }
}

/// Ordered evaluation records with failure and infeasibility counters
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SampleArchive {
    nx: usize,
    records: Vec<EvaluationRecord>,
    n_failures: usize,
    n_infeasible: usize,
}

impl SampleArchive {
    /// Empty archive of `nx`-dimensional design points
    pub fn new(nx: usize) -> Self {
        SampleArchive {
            nx,
            ..Default::default()
        }
    }

    /// Append `record`, returns its index
    pub fn record(&mut self, record: EvaluationRecord) -> usize {
        if record.is_failure() {
            self.n_failures += 1;
        } else if !record.feasible {
            self.n_infeasible += 1;
        }
        self.records.push(record);
        self.records.len() - 1
    }

    /// Records in insertion order
    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was recorded yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of failed evaluations
    pub fn n_failures(&self) -> usize {
        self.n_failures
    }

    /// Number of successful but infeasible evaluations
    pub fn n_infeasible(&self) -> usize {
        self.n_infeasible
    }

    /// Number of feasible, non failed records
    pub fn n_usable(&self) -> usize {
        self.records.iter().filter(|r| r.is_usable()).count()
    }

    /// Every recorded design point, failed ones included, as a (n, nx) array
    pub fn points(&self) -> Array2<f64> {
        self.stack_points(self.records.iter())
    }

    /// Training set of the `obj`-th objective surrogate: feasible, non failed records in order
    pub fn feasible_training_set(&self, obj: usize) -> (Array2<f64>, Array1<f64>) {
        self.training_set(|r| r.is_usable(), |r| r.objectives[obj])
    }

    /// Training set of the `cstr`-th constraint surrogate: non failed records in order
    pub fn constraint_training_set(&self, cstr: usize) -> (Array2<f64>, Array1<f64>) {
        self.training_set(|r| !r.is_failure(), |r| r.constraints[cstr])
    }

    /// Per objective minimum over feasible records, infinity when there is none
    pub fn best_objectives(&self, n_obj: usize) -> Array1<f64> {
        let mut best = Array1::from_elem(n_obj, f64::INFINITY);
        for r in self.records.iter().filter(|r| r.is_usable()) {
            for (b, v) in best.iter_mut().zip(r.objectives.iter()) {
                *b = b.min(*v);
            }
        }
        best
    }

    fn training_set(
        &self,
        keep: impl Fn(&EvaluationRecord) -> bool,
        value: impl Fn(&EvaluationRecord) -> f64,
    ) -> (Array2<f64>, Array1<f64>) {
        let kept: Vec<&EvaluationRecord> = self.records.iter().filter(|r| keep(r)).collect();
        let x = self.stack_points(kept.iter().copied());
        let y = kept.iter().map(|r| value(r)).collect();
        (x, y)
    }

    fn stack_points<'a>(
        &self,
        records: impl Iterator<Item = &'a EvaluationRecord>,
    ) -> Array2<f64> {
        let rows: Vec<&EvaluationRecord> = records.collect();
        let mut out = Array2::zeros((rows.len(), self.nx));
        for (mut row, r) in out.rows_mut().into_iter().zip(rows) {
            row.assign(&r.x);
        }
        out
    }
}

/// Archive shared between the refinement loop and concurrent readers
///
/// Appends take the write lock, readers work on a cloned snapshot.
#[derive(Clone, Debug, Default)]
pub struct SharedArchive(Arc<RwLock<SampleArchive>>);

impl SharedArchive {
    /// Empty shared archive of `nx`-dimensional design points
    pub fn new(nx: usize) -> Self {
        SharedArchive(Arc::new(RwLock::new(SampleArchive::new(nx))))
    }

    /// Append `record`, returns its index
    pub fn record(&self, record: EvaluationRecord) -> usize {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(record)
    }

    /// Copy of the current archive
    pub fn snapshot(&self) -> SampleArchive {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn archive() -> SampleArchive {
        let mut archive = SampleArchive::new(2);
        archive.record(EvaluationRecord::evaluated(
            array![0., 0.],
            array![1., 4.],
            array![-1.],
            true,
        ));
        archive.record(EvaluationRecord::failed(array![0.5, 0.5], 2, 1, "diverged"));
        archive.record(EvaluationRecord::evaluated(
            array![1., 0.],
            array![0.5, 5.],
            array![2.],
            false,
        ));
        archive.record(EvaluationRecord::evaluated(
            array![1., 1.],
            array![2., 3.],
            array![-2.],
            true,
        ));
        archive
    }

    #[test]
    fn test_counters() {
        let archive = archive();
        assert_eq!(archive.len(), 4);
        assert_eq!(archive.n_failures(), 1);
        assert_eq!(archive.n_infeasible(), 1);
        assert_eq!(archive.n_usable(), 2);
        assert!(archive.records()[1].objectives.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_training_sets() {
        let archive = archive();
        let (x, y) = archive.feasible_training_set(1);
        assert_eq!(x, array![[0., 0.], [1., 1.]]);
        assert_eq!(y, array![4., 3.]);
        let (x, y) = archive.constraint_training_set(0);
        assert_eq!(x, array![[0., 0.], [1., 0.], [1., 1.]]);
        assert_eq!(y, array![-1., 2., -2.]);
        assert_eq!(archive.points().nrows(), 4);
        assert_eq!(archive.best_objectives(2), array![1., 3.]);
    }

    #[test]
    fn test_training_set_monotonic() {
        let mut archive = SampleArchive::new(1);
        let mut previous = archive.feasible_training_set(0).0;
        for i in 0..6 {
            let rec = if i % 3 == 2 {
                EvaluationRecord::failed(array![i as f64], 1, 0, "fail")
            } else {
                EvaluationRecord::evaluated(array![i as f64], array![i as f64], array![], true)
            };
            archive.record(rec);
            let (x, _) = archive.feasible_training_set(0);
            assert!(x.nrows() >= previous.nrows());
            assert_eq!(x.slice(ndarray::s![..previous.nrows(), ..]), previous);
            previous = x;
        }
        assert_eq!(previous.nrows(), 4);
    }

    #[test]
    fn test_empty_training_set_shape() {
        let archive = SampleArchive::new(3);
        let (x, y) = archive.feasible_training_set(0);
        assert_eq!(x.dim(), (0, 3));
        assert!(y.is_empty());
        assert!(archive.best_objectives(2).iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn test_shared_snapshot_is_detached() {
        let shared = SharedArchive::new(1);
        shared.record(EvaluationRecord::evaluated(array![0.], array![0.], array![], true));
        let snapshot = shared.snapshot();
        shared.record(EvaluationRecord::evaluated(array![1.], array![1.], array![], true));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(shared.len(), 2);
    }
}
