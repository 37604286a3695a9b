//! Moego optimizer configuration.
use std::ops::Deref;
use std::time::Duration;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::errors::{EgoError, Result};
use crate::types::DoeKind;

/// Moego optimizer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoegoConfig {
    /// Number of points of the initial design
    /// Note: when 0, n_doe = max(nx + 1, 5)
    pub(crate) n_doe: usize,
    /// Max number of refinement iterations (aka iteration budget)
    /// Note: the number of evaluations is at most n_doe + max_iters * q_points
    pub(crate) max_iters: usize,
    /// Number of random candidates scored by the acquisition at each iteration
    pub(crate) n_candidates: usize,
    /// Number of points selected and evaluated concurrently at each iteration
    pub(crate) q_points: usize,
    /// Number of individuals of the population search
    pub(crate) population_size: usize,
    /// Number of generations of the population search
    pub(crate) generations: usize,
    /// Best acquisition score under which an iteration counts as stalled
    pub(crate) convergence_threshold: f64,
    /// Number of consecutive stalled iterations declaring convergence
    pub(crate) convergence_patience: usize,
    /// A random generator seed used to get reproducible runs
    pub(crate) seed: Option<u64>,
    /// Sampling used to draw the initial design
    pub(crate) doe_kind: DoeKind,
    /// Optional user provided initial design (n, nx)
    pub(crate) doe: Option<Array2<f64>>,
    /// Optional time bound of one evaluation
    pub(crate) eval_timeout: Option<Duration>,
    /// Number of likelihood optimization starts when fitting surrogates
    pub(crate) n_start: usize,
    /// Tolerance of equality constraints `|value - threshold| <= cstr_tol`
    pub(crate) cstr_tol: f64,
}

impl Default for MoegoConfig {
    fn default() -> Self {
        MoegoConfig {
            n_doe: 0,
            max_iters: 20,
            n_candidates: 500,
            q_points: 1,
            population_size: 100,
            generations: 50,
            convergence_threshold: 1e-3,
            convergence_patience: 2,
            seed: None,
            doe_kind: DoeKind::default(),
            doe: None,
            eval_timeout: None,
            n_start: 10,
            cstr_tol: 1e-4,
        }
    }
}

impl MoegoConfig {
    /// Number of samples of the initial design (used when no design is provided)
    ///
    /// When 0 a number of points is computed from the number of design variables.
    pub fn n_doe(mut self, n_doe: usize) -> Self {
        self.n_doe = n_doe;
        self
    }

    /// Sets max number of refinement iterations
    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Sets the size of the candidate pool scored at each iteration
    pub fn n_candidates(mut self, n_candidates: usize) -> Self {
        self.n_candidates = n_candidates;
        self
    }

    /// Sets the number of points evaluated per iteration
    pub fn q_points(mut self, q_points: usize) -> Self {
        self.q_points = q_points;
        self
    }

    /// Sets the population size of the final population search
    pub fn population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    /// Sets the number of generations of the final population search
    pub fn generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Sets the acquisition score threshold of the convergence test
    ///
    /// Scores are compared in log space, so a score underflowing to 0 still counts as
    /// below any positive threshold while keeping its ranking information.
    pub fn convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Sets the number of consecutive stalled iterations declaring convergence
    pub fn convergence_patience(mut self, patience: usize) -> Self {
        self.convergence_patience = patience;
        self
    }

    /// Allow to specify a seed for random number generator to allow
    /// reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the sampling used to draw the initial design
    pub fn doe_kind(mut self, doe_kind: DoeKind) -> Self {
        self.doe_kind = doe_kind;
        self
    }

    /// Sets an initial design (n, nx) evaluated instead of a drawn one
    pub fn doe(mut self, doe: &Array2<f64>) -> Self {
        self.doe = Some(doe.to_owned());
        self
    }

    /// Removes any previously specified initial design
    pub fn default_doe(mut self) -> Self {
        self.doe = None;
        self
    }

    /// Sets the time bound of one evaluation, exceeding it counts as a failure
    pub fn eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = Some(timeout);
        self
    }

    /// Sets the number of starts of surrogate hyperparameters optimization
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.n_start = n_start;
        self
    }

    /// Sets the tolerance of equality constraints
    pub fn cstr_tol(mut self, tol: f64) -> Self {
        self.cstr_tol = tol;
        self
    }

    /// Checks the configuration against a design space of dimension `nx`
    pub fn check(self, nx: usize) -> Result<ValidMoegoConfig> {
        if self.n_candidates == 0 || self.q_points == 0 {
            return Err(EgoError::InvalidConfigError(
                "n_candidates and q_points should be positive".to_string(),
            ));
        }
        if self.q_points > self.n_candidates {
            return Err(EgoError::InvalidConfigError(format!(
                "q_points ({}) should not exceed n_candidates ({})",
                self.q_points, self.n_candidates
            )));
        }
        if self.population_size < 2 {
            return Err(EgoError::InvalidConfigError(
                "population_size should be at least 2".to_string(),
            ));
        }
        if self.convergence_patience == 0 {
            return Err(EgoError::InvalidConfigError(
                "convergence_patience should be positive".to_string(),
            ));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0. {
            return Err(EgoError::InvalidConfigError(format!(
                "convergence_threshold should be a non negative number, got {}",
                self.convergence_threshold
            )));
        }
        if !self.cstr_tol.is_finite() || self.cstr_tol < 0. {
            return Err(EgoError::InvalidConfigError(format!(
                "cstr_tol should be a non negative number, got {}",
                self.cstr_tol
            )));
        }
        if self.eval_timeout.is_some_and(|t| t.is_zero()) {
            return Err(EgoError::InvalidConfigError(
                "eval_timeout should be positive".to_string(),
            ));
        }
        if let Some(doe) = &self.doe {
            if doe.ncols() != nx || doe.nrows() == 0 {
                return Err(EgoError::InvalidConfigError(format!(
                    "initial doe should be a non empty (n, {nx}) array, got {:?}",
                    doe.dim()
                )));
            }
            if doe.iter().any(|v| !v.is_finite()) {
                return Err(EgoError::InvalidConfigError(
                    "initial doe contains non finite values".to_string(),
                ));
            }
        }
        let mut config = self;
        if config.n_doe == 0 {
            config.n_doe = (nx + 1).max(5);
        }
        Ok(ValidMoegoConfig(config))
    }
}

/// A checked [MoegoConfig]
#[derive(Clone, Debug, PartialEq)]
pub struct ValidMoegoConfig(MoegoConfig);

impl Deref for ValidMoegoConfig {
    type Target = MoegoConfig;

    fn deref(&self) -> &MoegoConfig {
        &self.0
    }
}
