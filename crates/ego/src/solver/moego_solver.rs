//! Refinement loop of the Moego optimizer followed by the population search.
//!
//! The loop goes `Seeding -> Iterating -> Converged | Exhausted`:
//! * Seeding: the initial design is evaluated concurrently and recorded in order,
//! * Iterating: surrogates are fitted on an archive snapshot, a candidate pool drawn by the
//!   variable sampling rules is scored by the probability of improvement and the best
//!   candidates are evaluated,
//! * Converged or Exhausted: surrogates are refitted on the final archive and a NSGA-II
//!   population search runs on them before the Pareto front is aggregated.
//!
//! The cancellation token is checked at the top of every iteration.
use std::sync::Arc;

use env_logger::{Builder, Env};
use log::{debug, info, warn};
use ndarray::{Array2, Axis};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use crate::aggregator::aggregate;
use crate::archive::{EvaluationRecord, SampleArchive, SharedArchive};
use crate::criteria::{rank_candidates, select_candidates, Acquisition, InfillCriterion, PI};
use crate::errors::{EgoError, Result};
use crate::evaluator::Evaluator;
use crate::moego::OptimResult;
use crate::population::{Individual, Nsga2Params, PopulationSearch};
use crate::problem::Problem;
use crate::solver::moego_config::ValidMoegoConfig;
use crate::solver::moego_state::MoegoState;
use crate::space::Domain;
use crate::surrogate::{SurrogateBuilder, SurrogateState};
use crate::types::{CancelToken, DoeKind, RefinementState};
use crate::utils::{is_update_ok, MOEGO_LOG};
use moego_gp::GP_OPTIM_SEED;

/// Solver running the refinement loop of a problem
pub struct MoegoSolver<C> {
    config: ValidMoegoConfig,
    problem: Arc<Problem<C>>,
}

impl<C: Clone + Send + Sync + 'static> MoegoSolver<C> {
    /// Constructor of the optimization of `problem` with the checked `config`
    pub fn new(config: ValidMoegoConfig, problem: Arc<Problem<C>>) -> Self {
        let env = Env::new().filter_or(MOEGO_LOG, "info");
        let mut builder = Builder::from_env(env);
        let builder = builder.target(env_logger::Target::Stdout);
        builder.try_init().ok();
        MoegoSolver { config, problem }
    }

    /// Run the optimization until convergence, budget exhaustion or cancellation
    pub fn run(&self, cancel: &CancelToken) -> Result<OptimResult> {
        let cfg = &self.config;
        let problem = &self.problem;
        let space = problem.space();
        let domains = space.domains();
        let (n_obj, n_cstr) = (problem.n_obj(), problem.n_cstr());

        let mut rng = match cfg.seed {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        };
        let evaluator = Evaluator::new(problem.clone()).timeout(cfg.eval_timeout);
        let archive = SharedArchive::new(space.dim());
        let builder = SurrogateBuilder::new(cfg.n_start, cfg.seed.unwrap_or(GP_OPTIM_SEED));

        let mut state = MoegoState::new();
        let x_doe = match &cfg.doe {
            Some(doe) => {
                let mut x = doe.to_owned();
                for mut row in x.rows_mut() {
                    if !space.contains(&row) {
                        warn!("Initial doe point {row} projected into the design space");
                        space.project(&mut row);
                    }
                }
                x
            }
            None => space.sample_initial(cfg.n_doe, cfg.doe_kind, &mut rng),
        };
        info!("{}: {} initial point(s)", state.state, x_doe.nrows());
        self.evaluate_and_record(&evaluator, &archive, &x_doe);
        state = state.seeded();

        while state.state == RefinementState::Iterating {
            if state.iteration >= cfg.max_iters {
                state = state.exhausted();
                break;
            }
            if cancel.is_cancelled() {
                state = state.cancelled();
                info!("Optimization cancelled at iteration {}", state.iteration + 1);
                return Err(EgoError::Cancelled(Box::new(self.result(
                    archive.snapshot(),
                    Vec::new(),
                    state,
                ))));
            }
            let snapshot = archive.snapshot();
            let surrogates = SurrogateState::fit(&snapshot, n_obj, n_cstr, &builder);
            let pool = space.sample_initial(cfg.n_candidates, DoeKind::Random, &mut rng);
            let (x_new, best_score) = self.select(&snapshot, &surrogates, &pool);
            match best_score {
                Some(log_score) => info!(
                    "Iteration {}/{}: {} point(s) selected, best {} log score = {log_score:.4}",
                    state.iteration + 1,
                    cfg.max_iters,
                    x_new.nrows(),
                    PI.name()
                ),
                None => info!(
                    "Iteration {}/{}: {} point(s) selected by random exploration",
                    state.iteration + 1,
                    cfg.max_iters,
                    x_new.nrows()
                ),
            }
            self.evaluate_and_record(&evaluator, &archive, &x_new);
            state = state.next(
                best_score,
                cfg.convergence_threshold.ln(),
                cfg.convergence_patience,
                cfg.max_iters,
            );
        }
        info!(
            "Refinement {} after {} iteration(s)",
            state.state, state.iteration
        );

        let final_archive = archive.snapshot();
        let params = Nsga2Params {
            population_size: cfg.population_size,
            generations: cfg.generations,
            seed: rng.gen::<u64>(),
            ..Default::default()
        };
        let population = self.population_search(&final_archive, &builder, domains, params);
        Ok(self.result(final_archive, population, state))
    }

    /// Candidates to evaluate with the best acquisition log score, None when falling back
    /// to random exploration
    fn select(
        &self,
        snapshot: &SampleArchive,
        surrogates: &SurrogateState,
        pool: &Array2<f64>,
    ) -> (Array2<f64>, Option<f64>) {
        let cfg = &self.config;
        let archive_x = snapshot.points();
        if surrogates.any_objective_fitted() {
            let acquisition =
                Acquisition::new(&PI, self.problem.constraints(), cfg.cstr_tol);
            let fmin = snapshot.best_objectives(self.problem.n_obj());
            match acquisition.score(pool, surrogates, &fmin, &archive_x) {
                Ok(mut candidates) => {
                    rank_candidates(&mut candidates);
                    let selected = select_candidates(&candidates, cfg.q_points);
                    if let Some(best) = selected.first().map(|c| c.log_score) {
                        let mut x = Array2::zeros((selected.len(), pool.ncols()));
                        for (mut row, c) in x.rows_mut().into_iter().zip(selected.iter()) {
                            row.assign(&c.x);
                        }
                        return (x, Some(best));
                    }
                    warn!("Every candidate coincides with an evaluated point");
                }
                Err(err) => warn!("Acquisition scoring failed: {err}"),
            }
        } else {
            warn!("No objective surrogate available, fall back to random exploration");
        }
        (explore(pool, &archive_x, cfg.q_points), None)
    }

    fn evaluate_and_record(
        &self,
        evaluator: &Evaluator<C>,
        archive: &SharedArchive,
        xs: &Array2<f64>,
    ) {
        let (n_obj, n_cstr) = (self.problem.n_obj(), self.problem.n_cstr());
        for (x, outcome) in xs.rows().into_iter().zip(evaluator.evaluate_batch(xs)) {
            let record = match outcome {
                Ok((objectives, constraints)) => {
                    let feasible = self.problem.is_feasible(&constraints, self.config.cstr_tol);
                    debug!("Evaluated {x}: objectives {objectives}, feasible {feasible}");
                    EvaluationRecord::evaluated(x.to_owned(), objectives, constraints, feasible)
                }
                Err(err) => EvaluationRecord::failed(x.to_owned(), n_obj, n_cstr, err.to_string()),
            };
            archive.record(record);
        }
    }

    fn population_search(
        &self,
        archive: &SampleArchive,
        builder: &SurrogateBuilder,
        domains: Vec<Domain>,
        params: Nsga2Params,
    ) -> Vec<Individual> {
        let surrogates =
            SurrogateState::fit(archive, self.problem.n_obj(), self.problem.n_cstr(), builder);
        let search = PopulationSearch::new(
            &surrogates,
            domains,
            self.problem.constraints(),
            self.config.cstr_tol,
            params,
        );
        match search.and_then(|search| search.run(archive)) {
            Ok(population) => population.individuals,
            Err(err) => {
                warn!("Population search skipped: {err}");
                Vec::new()
            }
        }
    }

    fn result(
        &self,
        archive: SampleArchive,
        population: Vec<Individual>,
        state: MoegoState,
    ) -> OptimResult {
        let front = aggregate(&archive, &population);
        info!(
            "Pareto front: {} member(s) from {} evaluation(s) ({} failure(s), {} infeasible)",
            front.len(),
            archive.len(),
            archive.n_failures(),
            archive.n_infeasible()
        );
        OptimResult {
            front,
            n_failures: archive.n_failures(),
            n_infeasible: archive.n_infeasible(),
            archive,
            acquisition_trace: state.acquisition_trace,
            termination: state.state,
            n_iterations: state.iteration,
            population,
        }
    }
}

/// First `q` pool points distinct from evaluated points and from each other
fn explore(pool: &Array2<f64>, archive_x: &Array2<f64>, q: usize) -> Array2<f64> {
    let mut taken = archive_x.to_owned();
    let mut picked = Vec::with_capacity(q);
    for (i, x) in pool.rows().into_iter().enumerate() {
        if picked.len() >= q {
            break;
        }
        if is_update_ok(&taken, &x) {
            picked.push(i);
            // push_row only fails on shape mismatch
            if taken.push_row(x).is_err() {
                break;
            }
        }
    }
    pool.select(Axis(0), &picked)
}
