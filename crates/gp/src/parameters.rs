use crate::correlation_models::CorrelationModel;
use crate::errors::{GpError, Result};
use crate::mean_models::RegressionModel;
use crate::{GP_COBYLA_MAX_EVAL, GP_COBYLA_MIN_EVAL, GP_OPTIM_N_START, GP_OPTIM_SEED};
use linfa::{Float, ParamGuard};

use ndarray::{Array1, array};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Tuning of the `theta` hyperparameters of the correlation model
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum ThetaTuning<F: Float> {
    /// Given constant values, no likelihood optimization
    Fixed(Array1<F>),
    /// Optimized within bounds (lower, upper) starting from the initial guess
    Full {
        /// Initial guess, either one value used for every component or one value per component
        init: Array1<F>,
        /// Bounds, either one pair used for every component or one pair per component
        bounds: Array1<(F, F)>,
    },
}

impl<F: Float> Default for ThetaTuning<F> {
    fn default() -> Self {
        ThetaTuning::Full {
            init: array![F::cast(ThetaTuning::<F>::DEFAULT_INIT)],
            bounds: array![(
                F::cast(ThetaTuning::<F>::DEFAULT_BOUNDS.0),
                F::cast(ThetaTuning::<F>::DEFAULT_BOUNDS.1),
            )],
        }
    }
}

impl<F: Float> ThetaTuning<F> {
    /// Default initial theta value
    pub const DEFAULT_INIT: f64 = 1e-1;
    /// Default bounds for theta values
    pub const DEFAULT_BOUNDS: (f64, f64) = (1e-2, 1e1);

    /// Initial (or fixed) theta values
    pub fn init(&self) -> &Array1<F> {
        match self {
            ThetaTuning::Full { init, .. } => init,
            ThetaTuning::Fixed(init) => init,
        }
    }

    /// Bounds of theta values, `None` when theta is fixed
    pub fn bounds(&self) -> Option<&Array1<(F, F)>> {
        match self {
            ThetaTuning::Full { bounds, .. } => Some(bounds),
            ThetaTuning::Fixed(_) => None,
        }
    }
}

/// A set of validated GP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, Mean: Serialize, Corr: Serialize",
        deserialize = "F: Deserialize<'de>, Mean: Deserialize<'de>, Corr: Deserialize<'de>"
    ))
)]
pub struct GpValidParams<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>> {
    /// Tuning of the correlation hyperparameters
    pub(crate) theta_tuning: ThetaTuning<F>,
    /// Regression model representing the mean(x)
    pub(crate) mean: Mean,
    /// Correlation model representing the spatial correlation between errors at e(x) and e(x')
    pub(crate) corr: Corr,
    /// Number of additional starting points of the likelihood optimization
    pub(crate) n_start: usize,
    /// Max number of likelihood evaluations of one local optimization
    pub(crate) max_eval: usize,
    /// Diagonal regularization of the correlation matrix
    pub(crate) nugget: F,
    /// Seed of the generator spreading the multistart points
    pub(crate) seed: u64,
}

impl<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>> Default
    for GpValidParams<F, Mean, Corr>
{
    fn default() -> GpValidParams<F, Mean, Corr> {
        GpValidParams {
            theta_tuning: ThetaTuning::default(),
            mean: Mean::default(),
            corr: Corr::default(),
            n_start: GP_OPTIM_N_START,
            max_eval: GP_COBYLA_MAX_EVAL,
            nugget: F::cast(100.0) * F::epsilon(),
            seed: GP_OPTIM_SEED,
        }
    }
}

impl<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>> GpValidParams<F, Mean, Corr> {
    /// Get mean model
    pub fn mean(&self) -> &Mean {
        &self.mean
    }

    /// Get correlation model
    pub fn corr(&self) -> &Corr {
        &self.corr
    }

    /// Get theta tuning
    pub fn theta_tuning(&self) -> &ThetaTuning<F> {
        &self.theta_tuning
    }

    /// Get the number of additional multistart points
    pub fn n_start(&self) -> usize {
        self.n_start
    }

    /// Get the max number of likelihood evaluations of one local optimization
    pub fn max_eval(&self) -> usize {
        self.max_eval
    }

    /// Get nugget
    pub fn nugget(&self) -> F {
        self.nugget
    }

    /// Get multistart seed
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [GP algorithm](struct.GaussianProcess.html).
pub struct GpParams<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>>(
    GpValidParams<F, Mean, Corr>,
);

impl<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>> GpParams<F, Mean, Corr> {
    /// A constructor for GP parameters given mean and correlation models
    pub fn new(mean: Mean, corr: Corr) -> GpParams<F, Mean, Corr> {
        Self(GpValidParams {
            mean,
            corr,
            ..Default::default()
        })
    }

    /// Set mean model.
    pub fn mean(mut self, mean: Mean) -> Self {
        self.0.mean = mean;
        self
    }

    /// Set correlation model.
    pub fn corr(mut self, corr: Corr) -> Self {
        self.0.corr = corr;
        self
    }

    /// Set initial value of theta.
    ///
    /// When theta is optimized the likelihood optimization starts from `theta_init`,
    /// otherwise theta is set to this constant value.
    pub fn theta_init(mut self, theta_init: Array1<F>) -> Self {
        self.0.theta_tuning = match self.0.theta_tuning {
            ThetaTuning::Full { bounds, .. } => ThetaTuning::Full {
                init: theta_init,
                bounds,
            },
            ThetaTuning::Fixed(_) => ThetaTuning::Fixed(theta_init),
        };
        self
    }

    /// Set theta search space. No-op when theta is fixed.
    pub fn theta_bounds(mut self, theta_bounds: Array1<(F, F)>) -> Self {
        if let ThetaTuning::Full { init, .. } = self.0.theta_tuning {
            self.0.theta_tuning = ThetaTuning::Full {
                init,
                bounds: theta_bounds,
            };
        }
        self
    }

    /// Set theta tuning
    pub fn theta_tuning(mut self, theta_tuning: ThetaTuning<F>) -> Self {
        self.0.theta_tuning = theta_tuning;
        self
    }

    /// Set the number of additional starting points of the likelihood optimization
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.0.n_start = n_start;
        self
    }

    /// Set the max number of likelihood evaluations of one local optimization,
    /// at least [crate::GP_COBYLA_MIN_EVAL].
    pub fn max_eval(mut self, max_eval: usize) -> Self {
        self.0.max_eval = GP_COBYLA_MIN_EVAL.max(max_eval);
        self
    }

    /// Set nugget.
    ///
    /// Nugget is used to improve numerical stability
    pub fn nugget(mut self, nugget: F) -> Self {
        self.0.nugget = nugget;
        self
    }

    /// Set the seed of the multistart points generator
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }
}

impl<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>>
    From<GpValidParams<F, Mean, Corr>> for GpParams<F, Mean, Corr>
{
    fn from(valid: GpValidParams<F, Mean, Corr>) -> Self {
        GpParams(valid)
    }
}

impl<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>> ParamGuard
    for GpParams<F, Mean, Corr>
{
    type Checked = GpValidParams<F, Mean, Corr>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let tuning = &self.0.theta_tuning;
        if tuning.init().is_empty() || tuning.init().iter().any(|v| *v <= F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "theta initial values should be non empty and positive, got {}",
                tuning.init()
            )));
        }
        if let Some(bounds) = tuning.bounds() {
            if bounds.is_empty()
                || bounds
                    .iter()
                    .any(|(lo, up)| *lo <= F::zero() || *lo > *up)
            {
                return Err(GpError::InvalidValueError(
                    "theta bounds should be non empty with 0 < lower <= upper".to_string(),
                ));
            }
        }
        if self.0.nugget < F::zero() {
            return Err(GpError::InvalidValueError(
                "nugget should be non negative".to_string(),
            ));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
