//! Evaluation of design points through the problem evaluation procedure.
//!
//! Every evaluation works on its own clone of the problem context, so concurrent
//! evaluations never share mutable state. Errors, non finite values and panics of the
//! procedure are reported as [EgoError::EvaluationFailure], exceeding the optional time
//! bound as [EgoError::Timeout].
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use log::{debug, warn};
use ndarray::{Array1, ArrayBase, Data, Ix1, Ix2};
use rayon::prelude::*;

use crate::errors::{EgoError, Result};
use crate::problem::Problem;

/// Objective values and constraint values of one evaluation
pub type EvalOutcome = (Array1<f64>, Array1<f64>);

/// Evaluator of design points of a shared problem
pub struct Evaluator<C> {
    problem: Arc<Problem<C>>,
    timeout: Option<Duration>,
}

impl<C> Clone for Evaluator<C> {
    fn clone(&self) -> Self {
        Evaluator {
            problem: self.problem.clone(),
            timeout: self.timeout,
        }
    }
}

impl<C: Clone + Send + Sync + 'static> Evaluator<C> {
    /// Evaluator without time bound
    pub fn new(problem: Arc<Problem<C>>) -> Self {
        Evaluator {
            problem,
            timeout: None,
        }
    }

    /// Sets the time bound of one evaluation
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The evaluated problem
    pub fn problem(&self) -> &Problem<C> {
        &self.problem
    }

    /// Evaluate `x` returning its objective and constraint values
    pub fn evaluate(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> Result<EvalOutcome> {
        let point = x.to_vec();
        let outcome = match self.timeout {
            None => guarded_run(&self.problem, &point),
            Some(bound) => {
                let (tx, rx) = mpsc::channel();
                let problem = self.problem.clone();
                let worker_point = point.clone();
                // a late worker is left detached, its result is dropped
                thread::spawn(move || {
                    let _ = tx.send(guarded_run(&problem, &worker_point));
                });
                match rx.recv_timeout(bound) {
                    Ok(res) => res,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        warn!("Evaluation at {point:?} exceeded {bound:?}");
                        return Err(EgoError::Timeout(bound));
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        Err(EgoError::EvaluationFailure("evaluation worker died".to_string()))
                    }
                }
            }
        };
        if let Err(err) = &outcome {
            warn!("Evaluation at {point:?} failed: {err}");
        }
        outcome
    }

    /// Evaluate the rows of `xs` concurrently, outcomes are returned in row order
    pub fn evaluate_batch(
        &self,
        xs: &ArrayBase<impl Data<Elem = f64> + Sync, Ix2>,
    ) -> Vec<Result<EvalOutcome>> {
        debug!("Evaluate {} point(s)", xs.nrows());
        let rows: Vec<_> = xs.rows().into_iter().collect();
        rows.par_iter().map(|row| self.evaluate(row)).collect()
    }
}

/// Runs the procedure catching panics of user code
fn guarded_run<C: Clone>(problem: &Problem<C>, point: &[f64]) -> Result<EvalOutcome> {
    match panic::catch_unwind(AssertUnwindSafe(|| run(problem, point))) {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(err)) => Err(EgoError::EvaluationFailure(format!("{err:#}"))),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(EgoError::EvaluationFailure(format!(
                "evaluation procedure panicked: {msg}"
            )))
        }
    }
}

fn run<C: Clone>(problem: &Problem<C>, point: &[f64]) -> anyhow::Result<EvalOutcome> {
    let mut context = problem.context().clone();
    problem.space().bind(point, &mut context);
    let outputs = problem.procedure().run(point, &mut context)?;

    let mut objectives = Array1::zeros(problem.n_obj());
    for (v, (name, extraction)) in objectives.iter_mut().zip(problem.objectives()) {
        *v = extraction
            .extract(&outputs)
            .with_context(|| format!("objective '{name}'"))?;
        if !v.is_finite() {
            bail!("objective '{name}' is not finite ({v})");
        }
    }
    let mut constraints = Array1::zeros(problem.n_cstr());
    for (v, cstr) in constraints.iter_mut().zip(problem.constraints()) {
        *v = cstr
            .extraction
            .extract(&outputs)
            .with_context(|| format!("constraint '{}'", cstr.name))?;
        if !v.is_finite() {
            bail!("constraint '{}' is not finite ({v})", cstr.name);
        }
    }
    Ok((objectives, constraints))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Extraction, Outputs, ProblemBuilder};
    use crate::space::{VariableDescriptor, VariableSpace};
    use crate::types::ComparisonOp;
    use ndarray::array;

    fn square_problem() -> Arc<Problem<()>> {
        let space = VariableSpace::new(vec![VariableDescriptor::interval("x", -2., 2.)]).unwrap();
        Arc::new(
            Problem::from_fn(space, 1, vec![(ComparisonOp::Ge, 0.)], |x| {
                Ok(vec![x[0] * x[0], x[0]])
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_evaluate() {
        let evaluator = Evaluator::new(square_problem());
        let (objs, cstrs) = evaluator.evaluate(&array![1.5]).unwrap();
        assert_eq!(objs, array![2.25]);
        assert_eq!(cstrs, array![1.5]);
    }

    #[test]
    fn test_evaluate_batch_in_order() {
        let evaluator = Evaluator::new(square_problem());
        let xs = array![[-1.], [0.5], [2.], [0.]];
        let res = evaluator.evaluate_batch(&xs);
        let objs: Vec<f64> = res.into_iter().map(|r| r.unwrap().0[0]).collect();
        assert_eq!(objs, vec![1., 0.25, 4., 0.]);
    }

    #[test]
    fn test_context_cloned_per_evaluation() {
        #[derive(Clone, Default)]
        struct Counter {
            x: f64,
            calls: usize,
        }
        let space = VariableSpace::new(vec![
            VariableDescriptor::interval("x", 0., 1.).binder(|c: &mut Counter, v| c.x = v)
        ])
        .unwrap();
        let problem = ProblemBuilder::new(space, Counter::default())
            .simulation(|c: &mut Counter| {
                c.calls += 1;
                Ok(Outputs::new()
                    .with("x", c.x)
                    .with("calls", c.calls as f64))
            })
            .objective("x", Extraction::output("x"))
            .objective("calls", Extraction::output("calls"))
            .build()
            .unwrap();
        let evaluator = Evaluator::new(Arc::new(problem));
        for x in [0.1, 0.2, 0.3] {
            let (objs, _) = evaluator.evaluate(&array![x]).unwrap();
            assert_eq!(objs, array![x, 1.]);
        }
        assert_eq!(evaluator.problem().context().calls, 0);
    }

    #[test]
    fn test_failures_are_typed() {
        let space = VariableSpace::new(vec![VariableDescriptor::interval("x", 0., 1.)]).unwrap();
        let problem = Problem::from_fn(space, 1, vec![], |x| {
            if x[0] < 0.3 {
                anyhow::bail!("solver diverged")
            } else if x[0] < 0.6 {
                Ok(vec![f64::NAN])
            } else {
                panic!("boom")
            }
        })
        .unwrap();
        let evaluator = Evaluator::new(Arc::new(problem));
        for x in [0.1, 0.5, 0.9] {
            assert!(matches!(
                evaluator.evaluate(&array![x]),
                Err(EgoError::EvaluationFailure(_))
            ));
        }
    }

    #[test]
    fn test_unknown_output_is_failure() {
        let space = VariableSpace::new(vec![VariableDescriptor::interval("x", 0., 1.)]).unwrap();
        let problem = ProblemBuilder::new(space, ())
            .custom(|x: &[f64], _: &()| Ok(Outputs::new().with("y", x[0])))
            .objective("z", Extraction::output("z"))
            .build()
            .unwrap();
        let res = Evaluator::new(Arc::new(problem)).evaluate(&array![0.5]);
        match res {
            Err(EgoError::EvaluationFailure(msg)) => assert!(msg.contains("'z'")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_timeout() {
        let space = VariableSpace::new(vec![VariableDescriptor::interval("x", 0., 1.)]).unwrap();
        let problem = Problem::from_fn(space, 1, vec![], |x| {
            if x[0] > 0.5 {
                thread::sleep(Duration::from_millis(500));
            }
            Ok(vec![x[0]])
        })
        .unwrap();
        let evaluator =
            Evaluator::new(Arc::new(problem)).timeout(Some(Duration::from_millis(100)));
        assert!(evaluator.evaluate(&array![0.1]).is_ok());
        match evaluator.evaluate(&array![0.9]) {
            Err(err) => {
                assert!(matches!(err, EgoError::Timeout(_)));
                assert!(err.is_evaluation_failure());
            }
            Ok(outcome) => panic!("unexpected outcome {outcome:?}"),
        }
    }
}
