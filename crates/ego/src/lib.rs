//! This library implements a surrogate-assisted optimizer of expensive, constrained,
//! multi-objective black-box problems.
//!
//! The optimizer minimizes the number of true evaluations needed to approximate the
//! Pareto front of a problem:
//! * an initial design is drawn (LHS or random) and evaluated,
//! * one Gaussian process surrogate is fitted per objective (and per constraint),
//! * at each iteration the candidates maximizing the product of the per objective
//!   probabilities of improvement (weighted by the probability of feasibility) are evaluated,
//! * once the refinement converges or its budget is spent, a NSGA-II population search runs
//!   on the surrogates,
//! * the final front merges the feasible evaluated points with the predicted feasible
//!   individuals, each member being tagged with its [Origin].
//!
//! Evaluation failures (errors, non finite outputs, panics, timeouts) are recorded and
//! counted but never abort a run.
//!
//! # Example
//!
//! ```no_run
//! use moego_ego::{Moego, Problem, VariableDescriptor, VariableSpace};
//!
//! // Two conflicting objectives on [0, 1]^2
//! let space = VariableSpace::new(vec![
//!     VariableDescriptor::interval("x0", 0., 1.),
//!     VariableDescriptor::interval("x1", 0., 1.),
//! ])
//! .expect("valid space");
//! let problem = Problem::from_fn(space, 2, vec![], |x| {
//!     Ok(vec![x[0], 1. - x[0].sqrt() + x[1]])
//! })
//! .expect("valid problem");
//!
//! let res = Moego::new(problem)
//!     .configure(|cfg| cfg.n_doe(10).max_iters(15).seed(42))
//!     .run()
//!     .expect("front approximated");
//! println!(
//!     "{} front member(s) after {} evaluation(s)",
//!     res.front.len(),
//!     res.archive.len()
//! );
//! ```
//!
//! Logging goes through the `log` facade; the solver installs an `env_logger`
//! filtered by the `MOEGO_LOG` environment variable (default `info`).
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod criteria;
pub mod pareto;

mod aggregator;
mod archive;
mod errors;
mod evaluator;
mod moego;
mod population;
mod problem;
mod solver;
mod space;
mod surrogate;
mod types;
mod utils;

pub use crate::aggregator::*;
pub use crate::archive::*;
pub use crate::errors::*;
pub use crate::evaluator::*;
pub use crate::moego::*;
pub use crate::population::*;
pub use crate::problem::{
    Constraint, CustomFn, EvalProcedure, ExtractFn, Extraction, Outputs, Problem, ProblemBuilder,
    SimulationFn,
};
pub use crate::solver::*;
pub use crate::space::*;
pub use crate::surrogate::*;
pub use crate::types::*;
pub use crate::utils::{log_norm_cdf, log_pof, log_pofs, norm_cdf, norm_pdf, pof, pofs, MOEGO_LOG};
