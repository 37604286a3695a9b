//! Moego optimizer entry point.
//!
//! ```no_run
//! use moego_ego::{
//!     ComparisonOp, Extraction, Moego, Outputs, ProblemBuilder, VariableDescriptor,
//!     VariableSpace, Constraint,
//! };
//!
//! #[derive(Clone, Default)]
//! struct Beam {
//!     width: f64,
//!     height: f64,
//! }
//!
//! let space = VariableSpace::new(vec![
//!     VariableDescriptor::interval("b", 0.05, 0.5).binder(|c: &mut Beam, v| c.width = v),
//!     VariableDescriptor::interval("h", 0.1, 1.).binder(|c: &mut Beam, v| c.height = v),
//! ])
//! .expect("valid space");
//!
//! let problem = ProblemBuilder::new(space, Beam::default())
//!     .simulation(|c: &mut Beam| {
//!         let area = c.width * c.height;
//!         let inertia = c.width * c.height.powi(3) / 12.;
//!         Ok(Outputs::new().with("area", area).with("deflection", 1e-3 / inertia))
//!     })
//!     .objective("mass", Extraction::output("area"))
//!     .objective("deflection", Extraction::output("deflection"))
//!     .constraint(Constraint::new("ratio", ComparisonOp::Le, 4., Extraction::callable(|o| {
//!         Ok(o.require("deflection")? / o.require("area")?)
//!     })))
//!     .build()
//!     .expect("valid problem");
//!
//! let res = Moego::new(problem)
//!     .configure(|cfg| cfg.n_doe(10).max_iters(10).seed(42))
//!     .run()
//!     .expect("beam optimized");
//! for member in res.front.iter() {
//!     println!("{} -> {} ({:?})", member.x, member.objectives, member.origin);
//! }
//! ```
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::aggregator::FrontMember;
use crate::archive::SampleArchive;
use crate::errors::Result;
use crate::population::Individual;
use crate::problem::Problem;
use crate::solver::{MoegoConfig, MoegoSolver};
use crate::types::{CancelToken, RefinementState};

/// Result of an optimization run
#[derive(Clone, Debug, Serialize)]
pub struct OptimResult {
    /// Non-dominated feasible members, evaluated or predicted
    pub front: Vec<FrontMember>,
    /// Every evaluation of the run in evaluation order
    pub archive: SampleArchive,
    /// Number of failed evaluations
    pub n_failures: usize,
    /// Number of successful but infeasible evaluations
    pub n_infeasible: usize,
    /// Natural log of the best acquisition score per iteration, None for random
    /// exploration iterations
    pub acquisition_trace: Vec<Option<f64>>,
    /// Final state of the refinement loop
    pub termination: RefinementState,
    /// Number of completed refinement iterations
    pub n_iterations: usize,
    /// Final population of the population search, empty when skipped
    pub population: Vec<Individual>,
}

/// Moego optimizer of a problem
pub struct Moego<C> {
    problem: Arc<Problem<C>>,
    config: MoegoConfig,
}

impl<C: Clone + Send + Sync + 'static> Moego<C> {
    /// Optimizer of `problem` with the default configuration
    pub fn new(problem: Problem<C>) -> Self {
        Moego {
            problem: Arc::new(problem),
            config: MoegoConfig::default(),
        }
    }

    /// Set configuration of the optimizer
    pub fn configure<F: FnOnce(MoegoConfig) -> MoegoConfig>(mut self, init: F) -> Self {
        self.config = init(self.config);
        self
    }

    /// The optimized problem
    pub fn problem(&self) -> &Problem<C> {
        &self.problem
    }

    /// Runs the optimization
    pub fn run(&self) -> Result<OptimResult> {
        self.run_with_cancel(&CancelToken::new())
    }

    /// Runs the optimization, stopping at the first iteration after `cancel` is triggered
    ///
    /// A cancelled run returns [crate::EgoError::Cancelled] holding the partial result.
    pub fn run_with_cancel(&self, cancel: &CancelToken) -> Result<OptimResult> {
        let config = self.config.clone().check(self.problem.space().dim())?;
        debug!("{:?}", *config);
        MoegoSolver::new(config, self.problem.clone()).run(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EgoError;
    use crate::pareto::dominates;
    use crate::space::{SamplingRule, VariableDescriptor, VariableSpace};
    use crate::types::{ComparisonOp, Origin};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn space() -> VariableSpace<()> {
        VariableSpace::new(vec![
            VariableDescriptor::interval("x0", 0., 1.),
            VariableDescriptor::interval("x1", 0., 1.),
        ])
        .unwrap()
    }

    fn small(cfg: MoegoConfig) -> MoegoConfig {
        cfg.n_candidates(100)
            .population_size(20)
            .generations(5)
            .n_start(2)
            .seed(42)
    }

    fn two_objectives() -> Problem<()> {
        Problem::from_fn(space(), 2, vec![], |x| Ok(vec![x[0], 1. - x[0] * x[0]])).unwrap()
    }

    fn assert_mutually_non_dominated(front: &[FrontMember]) {
        for (i, a) in front.iter().enumerate() {
            for b in front.iter().skip(i + 1) {
                assert!(!dominates(&a.objectives, &b.objectives));
                assert!(!dominates(&b.objectives, &a.objectives));
            }
        }
    }

    #[test]
    fn test_two_objectives_front() {
        let res = Moego::new(two_objectives())
            .configure(|cfg| cfg.n_doe(20).max_iters(5).seed(42))
            .run()
            .unwrap();
        assert!(matches!(
            res.termination,
            RefinementState::Converged | RefinementState::Exhausted
        ));
        assert!(res.n_iterations <= 5);
        assert_eq!(res.acquisition_trace.len(), res.n_iterations);
        assert_eq!(res.n_failures, 0);
        assert!(res.archive.len() >= 20 + res.n_iterations);
        assert!(!res.front.is_empty());
        assert!(res.front.iter().any(|m| m.origin == Origin::Evaluated));
        assert!(res.front.iter().any(|m| m.objectives[0] < 0.1));
        assert!(res.front.iter().any(|m| m.objectives[0] > 0.9));
        assert_mutually_non_dominated(&res.front);
        for member in res.front.iter() {
            for r in res.archive.records().iter().filter(|r| r.feasible) {
                assert!(
                    !dominates(&r.objectives, &member.objectives),
                    "{} dominated by evaluated {}",
                    member.objectives,
                    r.objectives
                );
            }
        }
    }

    #[test]
    fn test_failures_are_absorbed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let problem = Problem::from_fn(space(), 2, vec![], move |x| {
            if counter.fetch_add(1, Ordering::SeqCst) % 3 == 2 {
                anyhow::bail!("simulation crashed")
            }
            Ok(vec![x[0], 1. - x[0] * x[0]])
        })
        .unwrap();
        let res = Moego::new(problem)
            .configure(|cfg| small(cfg).n_doe(9).max_iters(3))
            .run()
            .unwrap();
        let n_calls = calls.load(Ordering::SeqCst);
        let failed = res.archive.records().iter().filter(|r| r.is_failure()).count();
        assert_eq!(res.archive.len(), n_calls);
        assert_eq!(res.n_failures, failed);
        assert_eq!(res.n_failures, n_calls / 3);
        assert!(!res.front.is_empty());
        for member in res.front.iter() {
            assert!(member.objectives.iter().all(|v| v.is_finite()));
        }
        assert_mutually_non_dominated(&res.front);
    }

    #[test]
    fn test_fixed_variable_kept_by_candidates() {
        let space = VariableSpace::new(vec![
            VariableDescriptor::interval("x0", 0., 1.),
            VariableDescriptor::interval("x1", 0., 1.).rule(SamplingRule::Fixed(0.5)),
        ])
        .unwrap();
        let problem =
            Problem::from_fn(space, 2, vec![], |x| Ok(vec![x[0], 1. - x[0] * x[0] + x[1]]))
                .unwrap();
        let res = Moego::new(problem)
            .configure(|cfg| small(cfg).n_doe(10).max_iters(3))
            .run()
            .unwrap();
        assert!(res.archive.len() > 10);
        for r in res.archive.records() {
            assert_eq!(r.x[1], 0.5);
        }
    }

    #[test]
    fn test_constrained_front_is_feasible() {
        let problem = Problem::from_fn(space(), 2, vec![(ComparisonOp::Ge, 0.3)], |x| {
            Ok(vec![x[0], 1. - x[0] + x[1], x[0] + x[1]])
        })
        .unwrap();
        let res = Moego::new(problem)
            .configure(|cfg| small(cfg).n_doe(12).max_iters(2))
            .run()
            .unwrap();
        for member in res.front.iter() {
            match member.origin {
                Origin::Evaluated => assert!(member.constraints[0] >= 0.3),
                Origin::Predicted => assert!(member.constraints[0] >= 0.3 - 1e-12),
            }
        }
        let n_infeasible = res
            .archive
            .records()
            .iter()
            .filter(|r| !r.is_failure() && !r.feasible)
            .count();
        assert_eq!(res.n_infeasible, n_infeasible);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            Moego::new(two_objectives())
                .configure(|cfg| small(cfg).n_doe(8).max_iters(2))
                .run()
                .unwrap()
        };
        let (first, second) = (run(), run());
        assert_eq!(first.archive, second.archive);
        assert_eq!(first.front, second.front);
        assert_eq!(first.acquisition_trace, second.acquisition_trace);
    }

    #[test]
    fn test_cancelled_run_returns_partial_result() {
        let token = CancelToken::new();
        token.cancel();
        let res = Moego::new(two_objectives())
            .configure(|cfg| small(cfg).n_doe(6).max_iters(5))
            .run_with_cancel(&token);
        match res {
            Err(EgoError::Cancelled(partial)) => {
                assert_eq!(partial.termination, RefinementState::Cancelled);
                assert_eq!(partial.archive.len(), 6);
                assert_eq!(partial.n_iterations, 0);
                assert!(partial.population.is_empty());
                assert!(partial.front.iter().all(|m| m.origin == Origin::Evaluated));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_timeouts_are_failures() {
        let problem = Problem::from_fn(space(), 2, vec![], |x| {
            if x[0] > 0.75 {
                std::thread::sleep(Duration::from_millis(400));
            }
            Ok(vec![x[0], 1. - x[0]])
        })
        .unwrap();
        let res = Moego::new(problem)
            .configure(|cfg| {
                small(cfg)
                    .n_doe(8)
                    .max_iters(0)
                    .doe_kind(crate::types::DoeKind::Lhs)
                    .eval_timeout(Duration::from_millis(50))
            })
            .run()
            .unwrap();
        assert_eq!(res.termination, RefinementState::Exhausted);
        assert!(res.n_failures >= 1);
        for r in res.archive.records().iter().filter(|r| r.is_failure()) {
            assert!(r.x[0] > 0.75);
        }
    }

    #[test]
    fn test_invalid_config_evaluates_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let problem = Problem::from_fn(space(), 1, vec![], move |x| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![x[0]])
        })
        .unwrap();
        let res = Moego::new(problem).configure(|cfg| cfg.q_points(0)).run();
        assert!(matches!(res, Err(EgoError::InvalidConfigError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
