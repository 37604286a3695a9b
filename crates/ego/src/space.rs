//! Design variables of an optimization problem.
//!
//! A [VariableSpace] is an ordered list of [VariableDescriptor]s. Each descriptor owns a
//! [Domain], a [SamplingRule] used to draw initial values, and an optional binder writing
//! a value into the evaluation context `C` of the problem.
//!
//! ```
//! use moego_ego::{SamplingRule, VariableDescriptor, VariableSpace};
//!
//! #[derive(Clone, Default)]
//! struct Wing {
//!     span: f64,
//!     n_ribs: f64,
//! }
//!
//! let space = VariableSpace::new(vec![
//!     VariableDescriptor::interval("b", 10., 20.)
//!         .name("span")
//!         .binder(|w: &mut Wing, v| w.span = v),
//!     VariableDescriptor::set("n", vec![8., 10., 12.])
//!         .name("ribs")
//!         .rule(SamplingRule::Fixed(10.))
//!         .binder(|w: &mut Wing, v| w.n_ribs = v),
//! ])
//! .expect("valid space");
//!
//! let mut wing = Wing::default();
//! space.bind(&[15., 12.], &mut wing);
//! assert_eq!(wing.span, 15.);
//! assert_eq!(wing.n_ribs, 12.);
//! ```
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use moego_doe::{Lhs, LhsKind, Random, SamplingMethod};
use ndarray::{Array2, ArrayBase, Data, DataMut, Ix1};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use crate::errors::{EgoError, Result};
use crate::types::DoeKind;

/// Set of admissible values of a design variable
#[derive(Clone, Debug, PartialEq)]
pub enum Domain {
    /// Continuous closed interval `[lower, upper]`
    Interval(f64, f64),
    /// Finite set of admissible values
    Set(Vec<f64>),
}

impl Domain {
    /// Check the domain is well formed
    pub fn check(&self) -> Result<()> {
        match self {
            Domain::Interval(lo, up) => {
                if !lo.is_finite() || !up.is_finite() {
                    Err(EgoError::InvalidDomain(format!(
                        "interval bounds should be finite, got [{lo}, {up}]"
                    )))
                } else if lo > up {
                    Err(EgoError::InvalidDomain(format!(
                        "interval lower bound {lo} is greater than upper bound {up}"
                    )))
                } else {
                    Ok(())
                }
            }
            Domain::Set(values) => {
                if values.is_empty() {
                    Err(EgoError::InvalidDomain("value set is empty".to_string()))
                } else if values.iter().any(|v| !v.is_finite()) {
                    Err(EgoError::InvalidDomain(format!(
                        "value set should only hold finite values, got {values:?}"
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Bounds of the continuous relaxation of the domain
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Domain::Interval(lo, up) => (*lo, *up),
            Domain::Set(values) => values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, up), v| {
                    (lo.min(*v), up.max(*v))
                }),
        }
    }

    /// Whether `value` belongs to the domain
    pub fn contains(&self, value: f64) -> bool {
        match self {
            Domain::Interval(lo, up) => *lo <= value && value <= *up,
            Domain::Set(values) => values.iter().any(|v| *v == value),
        }
    }

    /// Closest admissible value: clamped within an interval, nearest element of a set
    pub fn project(&self, value: f64) -> f64 {
        match self {
            Domain::Interval(lo, up) => {
                if value.is_nan() {
                    *lo
                } else {
                    value.clamp(*lo, *up)
                }
            }
            Domain::Set(values) => {
                let mut best = values[0];
                for v in values.iter().skip(1) {
                    if (v - value).abs() < (best - value).abs() {
                        best = *v;
                    }
                }
                best
            }
        }
    }

    /// Uniform mapping of a unit draw `u` in `[0, 1]` onto the domain
    pub fn from_unit(&self, u: f64) -> f64 {
        let u = u.clamp(0., 1.);
        match self {
            Domain::Interval(lo, up) => lo + u * (up - lo),
            Domain::Set(values) => {
                let idx = ((u * values.len() as f64).floor() as usize).min(values.len() - 1);
                values[idx]
            }
        }
    }
}

/// A user map from a unit draw in `[0, 1]` to a variable value
pub type UnitMap = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Rule used to draw the values of a variable in the initial sample
#[derive(Clone, Default)]
pub enum SamplingRule {
    /// Uniform over the interval, uniform choice over the set
    #[default]
    Uniform,
    /// Constant value, snapped into the domain
    Fixed(f64),
    /// Custom map of a unit draw, projected into the domain
    Custom(UnitMap),
}

impl SamplingRule {
    /// Custom rule from a closure
    pub fn custom(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        SamplingRule::Custom(Arc::new(f))
    }

    /// Value drawn for the unit draw `u` within `domain`
    pub fn draw(&self, domain: &Domain, u: f64) -> f64 {
        match self {
            SamplingRule::Uniform => domain.from_unit(u),
            SamplingRule::Fixed(v) => domain.project(*v),
            SamplingRule::Custom(f) => domain.project(f(u)),
        }
    }
}

impl fmt::Debug for SamplingRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SamplingRule::Uniform => write!(f, "Uniform"),
            SamplingRule::Fixed(v) => write!(f, "Fixed({v})"),
            SamplingRule::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Function writing a variable value into the evaluation context
pub type Binder<C> = Arc<dyn Fn(&mut C, f64) + Send + Sync>;

/// Descriptor of one design variable
pub struct VariableDescriptor<C> {
    name: String,
    symbol: String,
    domain: Domain,
    rule: SamplingRule,
    binder: Option<Binder<C>>,
}

impl<C> Clone for VariableDescriptor<C> {
    fn clone(&self) -> Self {
        VariableDescriptor {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            domain: self.domain.clone(),
            rule: self.rule.clone(),
            binder: self.binder.clone(),
        }
    }
}

impl<C> fmt::Debug for VariableDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VariableDescriptor")
            .field("name", &self.name)
            .field("symbol", &self.symbol)
            .field("domain", &self.domain)
            .field("rule", &self.rule)
            .field("bound", &self.binder.is_some())
            .finish()
    }
}

impl<C> VariableDescriptor<C> {
    /// A variable of given `symbol` and `domain`, named after its symbol
    pub fn new(symbol: impl Into<String>, domain: Domain) -> Self {
        let symbol = symbol.into();
        VariableDescriptor {
            name: symbol.clone(),
            symbol,
            domain,
            rule: SamplingRule::default(),
            binder: None,
        }
    }

    /// A continuous variable within `[lower, upper]`
    pub fn interval(symbol: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self::new(symbol, Domain::Interval(lower, upper))
    }

    /// A discrete variable taking one of `values`
    pub fn set(symbol: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(symbol, Domain::Set(values))
    }

    /// Sets the human readable name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the rule used to draw initial values
    pub fn rule(mut self, rule: SamplingRule) -> Self {
        self.rule = rule;
        self
    }

    /// Sets the function writing the variable value into the evaluation context
    pub fn binder(mut self, binder: impl Fn(&mut C, f64) + Send + Sync + 'static) -> Self {
        self.binder = Some(Arc::new(binder));
        self
    }

    /// Human readable name
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Unique symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Admissible values
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Rule of the initial sampling
    pub fn sampling_rule(&self) -> &SamplingRule {
        &self.rule
    }
}

/// Ordered list of design variables
pub struct VariableSpace<C> {
    variables: Vec<VariableDescriptor<C>>,
}

impl<C> Clone for VariableSpace<C> {
    fn clone(&self) -> Self {
        VariableSpace {
            variables: self.variables.clone(),
        }
    }
}

impl<C> fmt::Debug for VariableSpace<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.variables.iter()).finish()
    }
}

impl<C> VariableSpace<C> {
    /// Build a space from its descriptors
    ///
    /// Fails with [EgoError::InvalidDomain] when the list is empty, a domain is malformed
    /// or two descriptors share the same symbol.
    pub fn new(variables: Vec<VariableDescriptor<C>>) -> Result<Self> {
        if variables.is_empty() {
            return Err(EgoError::InvalidDomain(
                "at least one design variable is required".to_string(),
            ));
        }
        let mut symbols = HashSet::new();
        for var in variables.iter() {
            var.domain.check().map_err(|e| match e {
                EgoError::InvalidDomain(msg) => {
                    EgoError::InvalidDomain(format!("variable '{}': {msg}", var.symbol))
                }
                other => other,
            })?;
            if !symbols.insert(var.symbol.as_str()) {
                return Err(EgoError::InvalidDomain(format!(
                    "duplicate variable symbol '{}'",
                    var.symbol
                )));
            }
        }
        Ok(VariableSpace { variables })
    }

    /// Number of design variables
    pub fn dim(&self) -> usize {
        self.variables.len()
    }

    /// Descriptors in order
    pub fn variables(&self) -> &[VariableDescriptor<C>] {
        &self.variables
    }

    /// Domains in order
    pub fn domains(&self) -> Vec<Domain> {
        self.variables.iter().map(|v| v.domain.clone()).collect()
    }

    /// Continuous relaxation of the space as a (nx, 2) array of \[lower, upper\] rows
    pub fn xlimits(&self) -> Array2<f64> {
        let mut xlimits = Array2::zeros((self.dim(), 2));
        for (mut row, var) in xlimits.rows_mut().into_iter().zip(self.variables.iter()) {
            let (lo, up) = var.domain.bounds();
            row[0] = lo;
            row[1] = up;
        }
        xlimits
    }

    /// Draw `n` design points, each component drawn by its variable sampling rule
    ///
    /// Unit draws come either from independent uniform draws or from a maximin LHS,
    /// both seeded from `rng` so that a seeded generator gives reproducible samples.
    pub fn sample_initial(&self, n: usize, kind: DoeKind, rng: &mut Xoshiro256Plus) -> Array2<f64> {
        let unit = Array2::from_shape_fn((self.dim(), 2), |(_, j)| j as f64);
        let seeded = Xoshiro256Plus::seed_from_u64(rng.gen::<u64>());
        let draws = match kind {
            DoeKind::Random => Random::new_with_rng(&unit, seeded).normalized_sample(n),
            DoeKind::Lhs => Lhs::new_with_rng(&unit, seeded)
                .kind(LhsKind::Maximin)
                .normalized_sample(n),
        };
        let mut x = draws;
        for (mut col, var) in x.columns_mut().into_iter().zip(self.variables.iter()) {
            col.mapv_inplace(|u| var.rule.draw(&var.domain, u));
        }
        x
    }

    /// Write every component of `point` into `target` through the variable binders
    ///
    /// Variables without binder are skipped.
    pub fn bind(&self, point: &[f64], target: &mut C) {
        for (var, v) in self.variables.iter().zip(point.iter()) {
            if let Some(binder) = &var.binder {
                binder(target, *v);
            }
        }
    }

    /// Snap every component of `x` into its domain
    pub fn project<S: DataMut<Elem = f64>>(&self, x: &mut ArrayBase<S, Ix1>) {
        for (v, var) in x.iter_mut().zip(self.variables.iter()) {
            *v = var.domain.project(*v);
        }
    }

    /// Whether every component of `x` belongs to its domain
    pub fn contains(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> bool {
        x.len() == self.dim()
            && self
                .variables
                .iter()
                .zip(x.iter())
                .all(|(var, v)| var.domain.contains(*v))
    }
}

/// Snap every component of `x` into the matching domain
pub(crate) fn project_point<S: DataMut<Elem = f64>>(domains: &[Domain], x: &mut ArrayBase<S, Ix1>) {
    for (v, domain) in x.iter_mut().zip(domains.iter()) {
        *v = domain.project(*v);
    }
}
