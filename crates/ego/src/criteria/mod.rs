//! Acquisition of the next points to evaluate.
//!
//! Candidates of a random pool are scored with an [InfillCriterion] applied to each
//! objective surrogate. The multi-objective score is the product of the per objective
//! criteria, further multiplied by the probability of feasibility of each predicted
//! constraint. Candidates coincident with an archived point score 0 and are never selected.
//!
//! The product is computed as a sum of logarithms: on a conflicting front it easily
//! falls below the smallest positive `f64`, so candidates are ranked on their log score.
mod pi;

pub use pi::{ProbabilityOfImprovement, PI};

use std::fmt;

use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};

use crate::errors::Result;
use crate::problem::Constraint;
use crate::surrogate::SurrogateState;
use crate::utils::{is_update_ok, log_pofs};

/// A criterion whose maximum locates the most promising point to evaluate
/// given the prediction of a surrogate of a minimized output
pub trait InfillCriterion: Send + Sync {
    /// Name of the infill criterion
    fn name(&self) -> &'static str;

    /// Criterion value given the predicted `mean` and `variance` at a point
    /// and the current best value `fmin`
    fn value(&self, mean: f64, variance: f64, fmin: f64) -> f64;

    /// Logarithm of the criterion value, `-inf` when the value is 0
    fn log_value(&self, mean: f64, variance: f64, fmin: f64) -> f64 {
        self.value(mean, variance, fmin).ln()
    }
}

impl fmt::Debug for dyn InfillCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A scored point of the candidate pool
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Candidate design point
    pub x: Array1<f64>,
    /// Predicted objective means, NaN for objectives without surrogate
    pub means: Array1<f64>,
    /// Predicted objective variances, NaN for objectives without surrogate
    pub variances: Array1<f64>,
    /// Acquisition score in \[0, 1\]
    pub score: f64,
    /// Natural logarithm of the acquisition score, `-inf` for a null score
    pub log_score: f64,
    /// Whether the point coincides with an already evaluated one
    pub coincident: bool,
}

impl Candidate {
    /// Sum of the predicted objective variances
    pub fn total_variance(&self) -> f64 {
        self.variances.iter().filter(|v| !v.is_nan()).sum()
    }
}

/// Scoring of candidate pools for a given problem
pub struct Acquisition<'a> {
    criterion: &'a dyn InfillCriterion,
    constraints: &'a [Constraint],
    cstr_tol: f64,
}

impl<'a> Acquisition<'a> {
    /// Acquisition with `criterion` per objective and probability of feasibility of `constraints`
    pub fn new(criterion: &'a dyn InfillCriterion, constraints: &'a [Constraint], cstr_tol: f64) -> Self {
        Acquisition {
            criterion,
            constraints,
            cstr_tol,
        }
    }

    /// Score every row of `pool`
    ///
    /// `fmin` holds the per objective best feasible values and `archive_x` every evaluated
    /// point, failed ones included.
    pub fn score(
        &self,
        pool: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
        surrogates: &SurrogateState,
        fmin: &Array1<f64>,
        archive_x: &Array2<f64>,
    ) -> Result<Vec<Candidate>> {
        let preds = surrogates.predict(pool)?;
        let candidates = pool
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, x)| {
                let means = preds.obj_means.row(i).to_owned();
                let variances = preds.obj_vars.row(i).to_owned();
                let coincident = !is_update_ok(archive_x, &x);
                let log_score = if coincident {
                    f64::NEG_INFINITY
                } else {
                    self.log_score(
                        &means,
                        &variances,
                        fmin,
                        preds.cstr_means.row(i).as_slice(),
                        preds.cstr_vars.row(i).as_slice(),
                    )
                };
                Candidate {
                    x: x.to_owned(),
                    means,
                    variances,
                    score: log_score.exp(),
                    log_score,
                    coincident,
                }
            })
            .collect();
        Ok(candidates)
    }

    /// Log of the product of the objective criteria and of the constraint feasibility
    /// probabilities, always in \[-inf, 0\]
    fn log_score(
        &self,
        means: &Array1<f64>,
        variances: &Array1<f64>,
        fmin: &Array1<f64>,
        cstr_means: Option<&[f64]>,
        cstr_vars: Option<&[f64]>,
    ) -> f64 {
        let mut n_models = 0;
        let mut log_score = 0.;
        for ((mean, var), best) in means.iter().zip(variances.iter()).zip(fmin.iter()) {
            if mean.is_nan() {
                continue;
            }
            n_models += 1;
            log_score += self.criterion.log_value(*mean, *var, *best);
        }
        if n_models == 0 {
            return f64::NEG_INFINITY;
        }
        if let (Some(cm), Some(cv)) = (cstr_means, cstr_vars) {
            log_score += log_pofs(self.constraints, self.cstr_tol, cm, cv);
        }
        if log_score.is_nan() {
            f64::NEG_INFINITY
        } else {
            log_score.min(0.)
        }
    }
}

/// Sort candidates by decreasing log score, ties broken by decreasing total predicted
/// variance then by pool order
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.log_score
            .total_cmp(&a.log_score)
            .then_with(|| b.total_variance().total_cmp(&a.total_variance()))
    });
}

/// Up to `q` best ranked candidates that neither coincide with an evaluated point
/// nor with an already selected candidate
pub fn select_candidates(ranked: &[Candidate], q: usize) -> Vec<Candidate> {
    let mut selected: Vec<Candidate> = Vec::with_capacity(q);
    for c in ranked.iter().filter(|c| !c.coincident) {
        if selected.len() >= q {
            break;
        }
        let taken = Array2::from_shape_fn((selected.len(), c.x.len()), |(i, j)| selected[i].x[j]);
        if is_update_ok(&taken, &c.x) {
            selected.push(c.clone());
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{EvaluationRecord, SampleArchive};
    use crate::surrogate::SurrogateBuilder;
    use crate::problem::Extraction;
    use crate::types::ComparisonOp;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, concatenate, Axis};

    fn archive() -> SampleArchive {
        let mut archive = SampleArchive::new(1);
        for x in [0., 0.2, 0.4, 0.6, 0.8, 1.] {
            archive.record(EvaluationRecord::evaluated(
                array![x],
                array![(x - 0.3) * (x - 0.3), (x - 0.7) * (x - 0.7)],
                array![x],
                true,
            ));
        }
        archive
    }

    fn candidate(score: f64, var: f64) -> Candidate {
        Candidate {
            x: array![score + var],
            means: array![0.],
            variances: array![var],
            score,
            log_score: score.ln(),
            coincident: false,
        }
    }

    #[test]
    fn test_score_zero_at_archive_points() {
        let archive = archive();
        let state = SurrogateState::fit(&archive, 2, 0, &SurrogateBuilder::default());
        let acq = Acquisition::new(&PI, &[], 0.);
        let fmin = archive.best_objectives(2);
        let pool = concatenate![Axis(0), archive.points(), array![[0.1], [0.5], [0.9]]];
        let cands = acq.score(&pool, &state, &fmin, &archive.points()).unwrap();
        for c in cands.iter().take(archive.len()) {
            assert!(c.coincident);
            assert_eq!(c.score, 0.);
        }
        for c in cands.iter().skip(archive.len()) {
            assert!(!c.coincident);
            assert!((0. ..=1.).contains(&c.score), "score {}", c.score);
        }
    }

    #[test]
    fn test_constraint_lowers_score() {
        let archive = archive();
        let cstrs = vec![Constraint::new("c", ComparisonOp::Le, 0.45, Extraction::output("c"))];
        let state = SurrogateState::fit(&archive, 2, 1, &SurrogateBuilder::default());
        let fmin = archive.best_objectives(2);
        let pool = array![[0.5], [0.9]];
        let free = Acquisition::new(&PI, &[], 0.)
            .score(&pool, &state, &fmin, &archive.points())
            .unwrap();
        let constrained = Acquisition::new(&PI, &cstrs, 0.)
            .score(&pool, &state, &fmin, &archive.points())
            .unwrap();
        for (f, c) in free.iter().zip(constrained.iter()) {
            assert!(c.score <= f.score);
        }
    }

    #[test]
    fn test_score_strictly_between_zero_and_one() {
        let acq = Acquisition::new(&PI, &[], 0.);
        let fmin = array![0., 0.];
        let log_score = acq.log_score(&array![0.5, 1.], &array![1., 4.], &fmin, None, None);
        let score = log_score.exp();
        assert!(score > 0. && score < 1., "score {score}");
        assert_abs_diff_eq!(
            score,
            PI.value(0.5, 1., 0.) * PI.value(1., 4., 0.),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_underflowing_scores_still_ranked() {
        let acq = Acquisition::new(&PI, &[], 0.);
        let fmin = array![0., 0.];
        let log_near = acq.log_score(&array![30., 30.], &array![1., 1.], &fmin, None, None);
        let log_far = acq.log_score(&array![40., 40.], &array![1., 1.], &fmin, None, None);
        assert_eq!(log_near.exp(), 0.);
        assert_eq!(log_far.exp(), 0.);
        assert!(log_near.is_finite() && log_far.is_finite());

        let mut cands = vec![candidate(0., 5.), candidate(0., 1.)];
        cands[0].log_score = log_far;
        cands[1].log_score = log_near;
        cands[1].x = array![-1.];
        rank_candidates(&mut cands);
        // the larger variance does not win against a better log score
        assert_eq!(cands[0].x, array![-1.]);
        assert_eq!(cands[0].log_score, log_near);
    }

    #[test]
    fn test_ranking_ties() {
        let mut cands = vec![
            candidate(0.2, 1.),
            candidate(0.5, 0.1),
            candidate(0.5, 0.3),
            candidate(0., 2.),
            candidate(0.5, 0.3),
        ];
        cands[4].x = array![10.];
        rank_candidates(&mut cands);
        let order: Vec<(f64, f64)> = cands
            .iter()
            .map(|c| (c.score, c.total_variance()))
            .collect();
        assert_eq!(
            order,
            vec![(0.5, 0.3), (0.5, 0.3), (0.5, 0.1), (0.2, 1.), (0., 2.)]
        );
        // equal score and variance keep pool order
        assert_eq!(cands[1].x, array![10.]);
    }

    #[test]
    fn test_select_skips_coincident() {
        let mut cands = vec![candidate(0.9, 0.), candidate(0.8, 0.), candidate(0.7, 0.)];
        cands[0].coincident = true;
        cands[2].x = cands[1].x.clone();
        let selected = select_candidates(&cands, 2);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].score, 0.8);
    }
}
