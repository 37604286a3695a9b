//! Gaussian process surrogates of the objectives and constraints.
//!
//! A [SurrogateState] is rebuilt from an archive snapshot at every iteration: one Kriging
//! model per objective trained on feasible records and one per constraint trained on every
//! non failed record. A model that cannot be fitted is kept as its error so the caller can
//! fall back to exploration.
use linfa::prelude::{Dataset, Fit};
use log::{debug, warn};
use moego_gp::correlation_models::SquaredExponentialCorr;
use moego_gp::mean_models::ConstantMean;
use moego_gp::{GaussianProcess, GpError, Kriging, GP_OPTIM_N_START, GP_OPTIM_SEED};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use rayon::prelude::*;

use crate::archive::SampleArchive;
use crate::errors::{EgoError, Result};

/// Rows predicted by one parallel task
const PREDICTION_CHUNK: usize = 64;

/// Surrogate model of one scalar output
pub type Surrogate = GaussianProcess<f64, ConstantMean, SquaredExponentialCorr>;

/// Fitting parameters shared by every surrogate of a run
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurrogateBuilder {
    n_start: usize,
    seed: u64,
}

impl Default for SurrogateBuilder {
    fn default() -> Self {
        SurrogateBuilder {
            n_start: GP_OPTIM_N_START,
            seed: GP_OPTIM_SEED,
        }
    }
}

impl SurrogateBuilder {
    /// Builder with `n_start` additional likelihood optimization starts seeded by `seed`
    pub fn new(n_start: usize, seed: u64) -> Self {
        SurrogateBuilder { n_start, seed }
    }

    /// Fit a surrogate to `(xt, yt)`
    ///
    /// Fails with [EgoError::InsufficientData] with fewer than 2 training points.
    pub fn fit(
        &self,
        xt: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        yt: &Array1<f64>,
    ) -> Result<Surrogate> {
        if xt.nrows() < 2 {
            return Err(EgoError::InsufficientData(format!(
                "{} training point(s), at least 2 required",
                xt.nrows()
            )));
        }
        Kriging::<f64>::params()
            .n_start(self.n_start)
            .seed(self.seed)
            .fit(&Dataset::new(xt.to_owned(), yt.to_owned()))
            .map_err(|err| match err {
                GpError::InsufficientData { n_samples } => EgoError::InsufficientData(format!(
                    "{n_samples} training point(s), at least 2 required"
                )),
                other => EgoError::GpError(other),
            })
    }
}

/// Predicted means and variances of every output at a batch of points
#[derive(Clone, Debug)]
pub struct Predictions {
    /// (n, n_obj) objective means, NaN for objectives without surrogate
    pub obj_means: Array2<f64>,
    /// (n, n_obj) objective variances, NaN for objectives without surrogate
    pub obj_vars: Array2<f64>,
    /// (n, n_cstr) constraint means, NaN for constraints without surrogate
    pub cstr_means: Array2<f64>,
    /// (n, n_cstr) constraint variances, NaN for constraints without surrogate
    pub cstr_vars: Array2<f64>,
}

/// Surrogates of every objective and constraint fitted on one archive snapshot
#[derive(Debug)]
pub struct SurrogateState {
    objectives: Vec<Result<Surrogate>>,
    constraints: Vec<Result<Surrogate>>,
}

impl SurrogateState {
    /// Fit every surrogate on `archive`
    pub fn fit(
        archive: &SampleArchive,
        n_obj: usize,
        n_cstr: usize,
        builder: &SurrogateBuilder,
    ) -> Self {
        let objectives = (0..n_obj)
            .into_par_iter()
            .map(|j| {
                let (xt, yt) = archive.feasible_training_set(j);
                let fitted = builder.fit(&xt, &yt);
                match &fitted {
                    Ok(gp) => debug!("Objective {j} surrogate: {gp}"),
                    Err(err) => warn!("Objective {j} surrogate not fitted: {err}"),
                }
                fitted
            })
            .collect();
        let constraints = (0..n_cstr)
            .into_par_iter()
            .map(|k| {
                let (xt, yt) = archive.constraint_training_set(k);
                let fitted = builder.fit(&xt, &yt);
                if let Err(err) = &fitted {
                    warn!("Constraint {k} surrogate not fitted: {err}");
                }
                fitted
            })
            .collect();
        SurrogateState {
            objectives,
            constraints,
        }
    }

    /// Number of objectives
    pub fn n_obj(&self) -> usize {
        self.objectives.len()
    }

    /// Number of constraints
    pub fn n_cstr(&self) -> usize {
        self.constraints.len()
    }

    /// Surrogate of the `j`-th objective if fitted
    pub fn objective(&self, j: usize) -> Option<&Surrogate> {
        self.objectives.get(j).and_then(|m| m.as_ref().ok())
    }

    /// Surrogate of the `k`-th constraint if fitted
    pub fn constraint(&self, k: usize) -> Option<&Surrogate> {
        self.constraints.get(k).and_then(|m| m.as_ref().ok())
    }

    /// Fit error of the `j`-th objective surrogate if any
    pub fn objective_error(&self, j: usize) -> Option<&EgoError> {
        self.objectives.get(j).and_then(|m| m.as_ref().err())
    }

    /// Whether every objective surrogate is fitted
    pub fn all_objectives_fitted(&self) -> bool {
        self.objectives.iter().all(|m| m.is_ok())
    }

    /// Whether at least one objective surrogate is fitted
    pub fn any_objective_fitted(&self) -> bool {
        self.objectives.iter().any(|m| m.is_ok())
    }

    /// Predicted means and variances of every fitted surrogate at the rows of `x`
    ///
    /// Rows are predicted concurrently by chunks, results are in row order.
    pub fn predict(
        &self,
        x: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    ) -> Result<Predictions> {
        let (obj_means, obj_vars) = predict_all(&self.objectives, x)?;
        let (cstr_means, cstr_vars) = predict_all(&self.constraints, x)?;
        Ok(Predictions {
            obj_means,
            obj_vars,
            cstr_means,
            cstr_vars,
        })
    }
}

fn predict_all(
    models: &[Result<Surrogate>],
    x: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
) -> Result<(Array2<f64>, Array2<f64>)> {
    let mut means = Array2::from_elem((x.nrows(), models.len()), f64::NAN);
    let mut vars = Array2::from_elem((x.nrows(), models.len()), f64::NAN);
    for (j, model) in models.iter().enumerate() {
        if let Ok(gp) = model {
            let (mu, s2) = predict_valvar(gp, x)?;
            means.column_mut(j).assign(&mu);
            vars.column_mut(j).assign(&s2);
        }
    }
    Ok((means, vars))
}

/// Predicted means and variances of `gp` at the rows of `x`, computed by parallel chunks
pub fn predict_valvar(
    gp: &Surrogate,
    x: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let chunks = x
        .axis_chunks_iter(Axis(0), PREDICTION_CHUNK)
        .into_par_iter()
        .map(|chunk| gp.predict_valvar(&chunk))
        .collect::<std::result::Result<Vec<_>, GpError>>()?;
    let means = chunks.iter().flat_map(|(m, _)| m.iter().copied()).collect();
    let vars = chunks.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    Ok((means, vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::EvaluationRecord;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};

    fn archive(n: usize) -> SampleArchive {
        let mut archive = SampleArchive::new(1);
        for i in 0..n {
            let x = i as f64 / (n.max(2) - 1) as f64;
            archive.record(EvaluationRecord::evaluated(
                array![x],
                array![(6. * x).sin(), x * x],
                array![x - 0.5],
                x <= 0.5,
            ));
        }
        archive
    }

    #[test]
    fn test_insufficient_data() {
        let res = SurrogateBuilder::default().fit(&array![[0.]], &array![1.]);
        assert!(matches!(res, Err(EgoError::InsufficientData(_))));
    }

    #[test]
    fn test_state_interpolates_training_points() {
        let archive = archive(9);
        let state = SurrogateState::fit(&archive, 2, 1, &SurrogateBuilder::default());
        assert!(state.all_objectives_fitted());
        assert!(state.constraint(0).is_some());
        let (xt, yt) = archive.feasible_training_set(0);
        let preds = state.predict(&xt).unwrap();
        assert_abs_diff_eq!(preds.obj_means.column(0), yt, epsilon = 1e-3);
        for v in preds.obj_vars.iter() {
            assert!(*v >= 0. && *v < 1e-3);
        }
        assert_eq!(preds.cstr_means.dim(), (xt.nrows(), 1));
    }

    #[test]
    fn test_state_with_too_few_feasible_points() {
        let mut archive = SampleArchive::new(1);
        archive.record(EvaluationRecord::evaluated(array![0.], array![1.], array![1.], false));
        archive.record(EvaluationRecord::evaluated(array![1.], array![2.], array![-1.], true));
        archive.record(EvaluationRecord::failed(array![0.5], 1, 1, "fail"));
        let state = SurrogateState::fit(&archive, 1, 1, &SurrogateBuilder::default());
        assert!(!state.any_objective_fitted());
        assert!(matches!(
            state.objective_error(0),
            Some(EgoError::InsufficientData(_))
        ));
        assert!(state.constraint(0).is_some());
        let preds = state.predict(&array![[0.25]]).unwrap();
        assert!(preds.obj_means[[0, 0]].is_nan());
        assert!(preds.cstr_means[[0, 0]].is_finite());
    }

    #[test]
    fn test_chunked_prediction_matches_batch() {
        let archive = archive(7);
        let (xt, yt) = archive.feasible_training_set(1);
        let gp = SurrogateBuilder::default().fit(&xt, &yt).unwrap();
        let x = Array::linspace(0., 1., 150).insert_axis(Axis(1));
        let (mu, s2) = predict_valvar(&gp, &x).unwrap();
        let (mu_ref, s2_ref) = gp.predict_valvar(&x).unwrap();
        assert_abs_diff_eq!(mu, mu_ref, epsilon = 1e-10);
        assert_abs_diff_eq!(s2, s2_ref, epsilon = 1e-10);
    }
}
