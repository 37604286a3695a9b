//! Problem definition consumed by the optimizer.
//!
//! A [Problem] gathers the [VariableSpace], an evaluation context `C` cloned for every
//! evaluation, an [EvalProcedure] producing named [Outputs], and the [Extraction]s turning
//! those outputs into objective and constraint values. Objectives are minimized.
//!
//! ```
//! use moego_ego::{
//!     ComparisonOp, Constraint, Extraction, Outputs, ProblemBuilder, VariableDescriptor,
//!     VariableSpace,
//! };
//!
//! #[derive(Clone, Default)]
//! struct Beam {
//!     width: f64,
//!     height: f64,
//! }
//!
//! let space = VariableSpace::new(vec![
//!     VariableDescriptor::interval("w", 0.1, 1.).binder(|b: &mut Beam, v| b.width = v),
//!     VariableDescriptor::interval("h", 0.1, 2.).binder(|b: &mut Beam, v| b.height = v),
//! ])
//! .unwrap();
//!
//! let problem = ProblemBuilder::new(space, Beam::default())
//!     .simulation(|beam: &mut Beam| {
//!         let area = beam.width * beam.height;
//!         let inertia = beam.width * beam.height.powi(3) / 12.;
//!         Ok(Outputs::new().with("area", area).with("inertia", inertia))
//!     })
//!     .objective("mass", Extraction::output("area"))
//!     .objective("stiffness", Extraction::negated("inertia"))
//!     .constraint(Constraint::new(
//!         "slenderness",
//!         ComparisonOp::Le,
//!         4.,
//!         Extraction::callable(|out: &Outputs| {
//!             Ok(out.require("inertia")? / out.require("area")?)
//!         }),
//!     ))
//!     .build()
//!     .unwrap();
//! assert_eq!(problem.n_obj(), 2);
//! assert_eq!(problem.n_cstr(), 1);
//! ```
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use ndarray::{ArrayBase, Data, Ix1};

use crate::errors::{EgoError, Result};
use crate::space::VariableSpace;
use crate::types::ComparisonOp;

/// Named scalar results of one evaluation procedure run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outputs(BTreeMap<String, f64>);

impl Outputs {
    /// Empty outputs
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the output `name`
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Adds or replaces the output `name`
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    /// Value of the output `name` if any
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Value of the output `name`, an error if missing
    pub fn require(&self, name: &str) -> anyhow::Result<f64> {
        self.get(name).ok_or_else(|| {
            anyhow!(
                "unknown output '{name}', available: {:?}",
                self.0.keys().collect::<Vec<_>>()
            )
        })
    }

    /// Number of outputs
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there is no output
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Outputs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Outputs {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Outputs(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Function computing a value from evaluation outputs
pub type ExtractFn = Arc<dyn Fn(&Outputs) -> anyhow::Result<f64> + Send + Sync>;

/// How an objective or constraint value is read from evaluation outputs
#[derive(Clone)]
pub enum Extraction {
    /// The named output as is
    Output(String),
    /// The opposite of the named output, to maximize it
    Negated(String),
    /// A user function of the outputs
    Callable(ExtractFn),
}

impl Extraction {
    /// The named output as is
    pub fn output(name: impl Into<String>) -> Self {
        Extraction::Output(name.into())
    }

    /// The opposite of the named output
    pub fn negated(name: impl Into<String>) -> Self {
        Extraction::Negated(name.into())
    }

    /// A user function of the outputs
    pub fn callable(f: impl Fn(&Outputs) -> anyhow::Result<f64> + Send + Sync + 'static) -> Self {
        Extraction::Callable(Arc::new(f))
    }

    /// Extracted value from `outputs`
    pub fn extract(&self, outputs: &Outputs) -> anyhow::Result<f64> {
        match self {
            Extraction::Output(name) => outputs.require(name),
            Extraction::Negated(name) => outputs.require(name).map(|v| -v),
            Extraction::Callable(f) => f(outputs),
        }
    }
}

impl fmt::Debug for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Extraction::Output(name) => write!(f, "Output({name})"),
            Extraction::Negated(name) => write!(f, "Negated({name})"),
            Extraction::Callable(_) => write!(f, "Callable"),
        }
    }
}

/// Constraint `extraction(outputs) <op> threshold`
#[derive(Clone, Debug)]
pub struct Constraint {
    /// Name used in logs
    pub name: String,
    /// Comparison operator
    pub op: ComparisonOp,
    /// Right hand side of the comparison
    pub threshold: f64,
    /// How the constrained value is read from outputs
    pub extraction: Extraction,
}

impl Constraint {
    /// Constraint `extraction <op> threshold`
    pub fn new(
        name: impl Into<String>,
        op: ComparisonOp,
        threshold: f64,
        extraction: Extraction,
    ) -> Self {
        Constraint {
            name: name.into(),
            op,
            threshold,
            extraction,
        }
    }
}

/// Procedure run on the bound context
pub type SimulationFn<C> = Arc<dyn Fn(&mut C) -> anyhow::Result<Outputs> + Send + Sync>;
/// Procedure run on the design point along with the bound context
pub type CustomFn<C> = Arc<dyn Fn(&[f64], &C) -> anyhow::Result<Outputs> + Send + Sync>;

/// Evaluation procedure producing outputs from a bound context
pub enum EvalProcedure<C> {
    /// Runs a simulation mutating its own copy of the context
    Simulation(SimulationFn<C>),
    /// Runs a user function of the design point and the context
    Custom(CustomFn<C>),
}

impl<C> Clone for EvalProcedure<C> {
    fn clone(&self) -> Self {
        match self {
            EvalProcedure::Simulation(f) => EvalProcedure::Simulation(f.clone()),
            EvalProcedure::Custom(f) => EvalProcedure::Custom(f.clone()),
        }
    }
}

impl<C> fmt::Debug for EvalProcedure<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalProcedure::Simulation(_) => write!(f, "Simulation"),
            EvalProcedure::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl<C> EvalProcedure<C> {
    /// Run the procedure on the bound `context`
    pub fn run(&self, point: &[f64], context: &mut C) -> anyhow::Result<Outputs> {
        match self {
            EvalProcedure::Simulation(f) => f(context),
            EvalProcedure::Custom(f) => f(point, context),
        }
    }
}

/// A constrained multi-objective minimization problem
pub struct Problem<C> {
    space: VariableSpace<C>,
    context: C,
    procedure: EvalProcedure<C>,
    objectives: Vec<(String, Extraction)>,
    constraints: Vec<Constraint>,
}

impl<C: fmt::Debug> fmt::Debug for Problem<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Problem")
            .field("space", &self.space)
            .field("context", &self.context)
            .field("procedure", &self.procedure)
            .field("objectives", &self.objectives)
            .field("constraints", &self.constraints)
            .finish()
    }
}

impl<C> Problem<C> {
    /// Design variables
    pub fn space(&self) -> &VariableSpace<C> {
        &self.space
    }

    /// Prototype of the evaluation context
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Evaluation procedure
    pub fn procedure(&self) -> &EvalProcedure<C> {
        &self.procedure
    }

    /// Named objectives
    pub fn objectives(&self) -> &[(String, Extraction)] {
        &self.objectives
    }

    /// Constraints
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Number of objectives
    pub fn n_obj(&self) -> usize {
        self.objectives.len()
    }

    /// Number of constraints
    pub fn n_cstr(&self) -> usize {
        self.constraints.len()
    }

    /// Whether every constraint holds for the given constraint values
    pub fn is_feasible(&self, values: &ArrayBase<impl Data<Elem = f64>, Ix1>, tol: f64) -> bool {
        self.constraints
            .iter()
            .zip(values.iter())
            .all(|(c, v)| c.op.holds(*v, c.threshold, tol))
    }

    /// Total amount of constraint violation for the given constraint values
    pub fn violation(&self, values: &ArrayBase<impl Data<Elem = f64>, Ix1>, tol: f64) -> f64 {
        total_violation(&self.constraints, values, tol)
    }
}

/// Sum of the violations of `constraints` by `values`, NaN values being ignored
pub(crate) fn total_violation(
    constraints: &[Constraint],
    values: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    tol: f64,
) -> f64 {
    constraints
        .iter()
        .zip(values.iter())
        .filter(|(_, v)| !v.is_nan())
        .map(|(c, v)| c.op.violation(*v, c.threshold, tol))
        .sum()
}

impl Problem<()> {
    /// Problem defined by a plain function of the design point
    ///
    /// `f` returns `n_obj` objective values followed by one value per entry of `constraints`,
    /// each given as `(op, threshold)`. Outputs are named `f0, f1, ...` and `g0, g1, ...`.
    pub fn from_fn(
        space: VariableSpace<()>,
        n_obj: usize,
        constraints: Vec<(ComparisonOp, f64)>,
        f: impl Fn(&[f64]) -> anyhow::Result<Vec<f64>> + Send + Sync + 'static,
    ) -> Result<Self> {
        let n_cstr = constraints.len();
        let mut builder = ProblemBuilder::new(space, ()).custom(move |x: &[f64], _: &()| {
            let values = f(x)?;
            if values.len() != n_obj + n_cstr {
                bail!(
                    "expected {} values ({n_obj} objectives, {n_cstr} constraints), got {}",
                    n_obj + n_cstr,
                    values.len()
                );
            }
            let (objs, cstrs) = values.split_at(n_obj);
            Ok(objs
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("f{i}"), *v))
                .chain(cstrs.iter().enumerate().map(|(k, v)| (format!("g{k}"), *v)))
                .collect())
        });
        for i in 0..n_obj {
            builder = builder.objective(format!("f{i}"), Extraction::output(format!("f{i}")));
        }
        for (k, (op, threshold)) in constraints.into_iter().enumerate() {
            builder = builder.constraint(Constraint::new(
                format!("g{k}"),
                op,
                threshold,
                Extraction::output(format!("g{k}")),
            ));
        }
        builder.build()
    }
}

/// Builder of a [Problem]
pub struct ProblemBuilder<C> {
    space: VariableSpace<C>,
    context: C,
    procedure: Option<EvalProcedure<C>>,
    objectives: Vec<(String, Extraction)>,
    constraints: Vec<Constraint>,
}

impl<C> ProblemBuilder<C> {
    /// Start a problem over `space` with the evaluation context prototype `context`
    pub fn new(space: VariableSpace<C>, context: C) -> Self {
        ProblemBuilder {
            space,
            context,
            procedure: None,
            objectives: vec![],
            constraints: vec![],
        }
    }

    /// Evaluate by running `f` on the bound context
    pub fn simulation(
        mut self,
        f: impl Fn(&mut C) -> anyhow::Result<Outputs> + Send + Sync + 'static,
    ) -> Self {
        self.procedure = Some(EvalProcedure::Simulation(Arc::new(f)));
        self
    }

    /// Evaluate by running `f` on the design point and the bound context
    pub fn custom(
        mut self,
        f: impl Fn(&[f64], &C) -> anyhow::Result<Outputs> + Send + Sync + 'static,
    ) -> Self {
        self.procedure = Some(EvalProcedure::Custom(Arc::new(f)));
        self
    }

    /// Adds an objective to minimize
    pub fn objective(mut self, name: impl Into<String>, extraction: Extraction) -> Self {
        self.objectives.push((name.into(), extraction));
        self
    }

    /// Adds a constraint
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Validate and build the problem
    pub fn build(self) -> Result<Problem<C>> {
        let procedure = self.procedure.ok_or_else(|| {
            EgoError::InvalidConfigError("an evaluation procedure is required".to_string())
        })?;
        if self.objectives.is_empty() {
            return Err(EgoError::InvalidConfigError(
                "at least one objective is required".to_string(),
            ));
        }
        if let Some(c) = self.constraints.iter().find(|c| !c.threshold.is_finite()) {
            return Err(EgoError::InvalidValue(format!(
                "constraint '{}' threshold should be finite, got {}",
                c.name, c.threshold
            )));
        }
        Ok(Problem {
            space: self.space,
            context: self.context,
            procedure,
            objectives: self.objectives,
            constraints: self.constraints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::VariableDescriptor;
    use ndarray::array;

    fn unit_space() -> VariableSpace<()> {
        VariableSpace::new(vec![VariableDescriptor::interval("x", 0., 1.)]).unwrap()
    }

    #[test]
    fn test_extractions() {
        let out = Outputs::new().with("a", 2.).with("b", 3.);
        assert_eq!(Extraction::output("a").extract(&out).unwrap(), 2.);
        assert_eq!(Extraction::negated("b").extract(&out).unwrap(), -3.);
        let ratio = Extraction::callable(|o: &Outputs| Ok(o.require("a")? / o.require("b")?));
        assert_eq!(ratio.extract(&out).unwrap(), 2. / 3.);
        assert!(Extraction::output("c").extract(&out).is_err());
    }

    #[test]
    fn test_from_fn_outputs() {
        let problem = Problem::from_fn(unit_space(), 2, vec![(ComparisonOp::Le, 0.)], |x| {
            Ok(vec![x[0], 1. - x[0], x[0] - 0.5])
        })
        .unwrap();
        assert_eq!(problem.n_obj(), 2);
        assert_eq!(problem.n_cstr(), 1);
        let out = problem.procedure().run(&[0.25], &mut ()).unwrap();
        assert_eq!(
            out,
            Outputs::new().with("f0", 0.25).with("f1", 0.75).with("g0", -0.25)
        );
        assert!(problem.is_feasible(&array![-0.25], 0.));
        assert!(!problem.is_feasible(&array![0.25], 0.));
        assert_eq!(problem.violation(&array![0.25], 0.), 0.25);
    }

    #[test]
    fn test_from_fn_wrong_arity() {
        let problem = Problem::from_fn(unit_space(), 2, vec![], |x| Ok(vec![x[0]])).unwrap();
        assert!(problem.procedure().run(&[0.5], &mut ()).is_err());
    }

    #[test]
    fn test_builder_requirements() {
        let no_proc = ProblemBuilder::new(unit_space(), ())
            .objective("f", Extraction::output("f"))
            .build();
        assert!(matches!(no_proc, Err(EgoError::InvalidConfigError(_))));
        let no_obj = ProblemBuilder::new(unit_space(), ())
            .custom(|_, _| Ok(Outputs::new()))
            .build();
        assert!(matches!(no_obj, Err(EgoError::InvalidConfigError(_))));
    }
}
