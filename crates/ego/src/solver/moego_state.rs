//! Refinement loop state maintained from iteration to iteration.
use serde::{Deserialize, Serialize};

use crate::types::RefinementState;

/// Progress of the refinement loop
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoegoState {
    /// Number of completed refinement iterations
    pub iteration: usize,
    /// Current state of the loop
    pub state: RefinementState,
    /// Best acquisition log score of each iteration, None when the iteration fell back to
    /// random exploration
    pub acquisition_trace: Vec<Option<f64>>,
    /// Number of consecutive iterations whose best log score stayed under the threshold
    pub stall: usize,
}

impl Default for MoegoState {
    fn default() -> Self {
        MoegoState {
            iteration: 0,
            state: RefinementState::Seeding,
            acquisition_trace: Vec::new(),
            stall: 0,
        }
    }
}

impl MoegoState {
    /// Loop about to evaluate its initial design
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition once the initial design is recorded, whatever the evaluation outcomes
    #[must_use]
    pub fn seeded(mut self) -> Self {
        self.state = RefinementState::Iterating;
        self
    }

    /// Transition when no iteration budget is left before a pass starts
    #[must_use]
    pub fn exhausted(mut self) -> Self {
        self.state = RefinementState::Exhausted;
        self
    }

    /// Transition after an iteration whose best acquisition log score is `best_score`,
    /// `threshold` being the log of the convergence threshold
    ///
    /// Converged takes precedence over Exhausted when both hold.
    #[must_use]
    pub fn next(
        mut self,
        best_score: Option<f64>,
        threshold: f64,
        patience: usize,
        max_iters: usize,
    ) -> Self {
        self.iteration += 1;
        self.acquisition_trace.push(best_score);
        match best_score {
            Some(score) if score < threshold => self.stall += 1,
            Some(_) => self.stall = 0,
            None => {}
        }
        self.state = if self.stall >= patience {
            RefinementState::Converged
        } else if self.iteration >= max_iters {
            RefinementState::Exhausted
        } else {
            RefinementState::Iterating
        };
        self
    }

    /// Transition when cancellation is observed
    #[must_use]
    pub fn cancelled(mut self) -> Self {
        self.state = RefinementState::Cancelled;
        self
    }
}
