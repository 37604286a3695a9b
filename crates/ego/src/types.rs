use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Comparison operator of a constraint `value <op> threshold`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// `value == threshold` within the equality tolerance
    Eq,
    /// `value <= threshold`
    Le,
    /// `value < threshold`
    Lt,
    /// `value >= threshold`
    Ge,
    /// `value > threshold`
    Gt,
}

impl ComparisonOp {
    /// Whether `value <op> threshold` holds, `tol` being only used by [ComparisonOp::Eq]
    pub fn holds(&self, value: f64, threshold: f64, tol: f64) -> bool {
        match self {
            ComparisonOp::Eq => (value - threshold).abs() <= tol,
            ComparisonOp::Le => value <= threshold,
            ComparisonOp::Lt => value < threshold,
            ComparisonOp::Ge => value >= threshold,
            ComparisonOp::Gt => value > threshold,
        }
    }

    /// Amount by which `value` misses the constraint, 0 when satisfied
    pub fn violation(&self, value: f64, threshold: f64, tol: f64) -> f64 {
        let v = match self {
            ComparisonOp::Eq => (value - threshold).abs() - tol,
            ComparisonOp::Le | ComparisonOp::Lt => value - threshold,
            ComparisonOp::Ge | ComparisonOp::Gt => threshold - value,
        };
        if self.holds(value, threshold, tol) {
            0.
        } else {
            v.max(f64::EPSILON)
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Le => "<=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Gt => ">",
        };
        write!(f, "{s}")
    }
}

/// Design of experiments used to draw the initial sample
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoeKind {
    /// Independent uniform draws
    Random,
    /// Latin hypercube sampling
    #[default]
    Lhs,
}

/// Provenance of a Pareto front member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Truly evaluated point taken from the sample archive
    Evaluated,
    /// Point whose objectives are surrogate predictions
    Predicted,
}

/// State of the refinement loop
///
/// `Seeding -> Iterating -> Converged | Exhausted`, `Cancelled` being reachable from `Iterating`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefinementState {
    /// Initial design is evaluated
    Seeding,
    /// Surrogates are refined by acquisition of new points
    Iterating,
    /// Best acquisition score stayed below the threshold long enough
    Converged,
    /// Iteration budget is spent
    Exhausted,
    /// Run was stopped by its cancellation token
    Cancelled,
}

impl RefinementState {
    /// Whether no further transition may happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefinementState::Converged | RefinementState::Exhausted | RefinementState::Cancelled
        )
    }
}

impl fmt::Display for RefinementState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Cooperative cancellation flag shared between a run and its controller
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token not yet cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the cancellation of the runs watching this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
