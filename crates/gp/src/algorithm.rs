use crate::correlation_models::*;
use crate::errors::{GpError, Result};
use crate::mean_models::*;
use crate::optimization::{CobylaParams, into_f64, optimize_params, prepare_multistart};
use crate::parameters::{GpParams, GpValidParams, ThetaTuning};
use crate::utils::{DiffMatrix, NormalizedData, pairwise_differences};

use linfa::prelude::{DatasetBase, Fit, Float};
use linfa_linalg::{cholesky::*, qr::*, svd::*, triangular::*};
use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};

use log::{debug, warn};
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Default number of multistart for hyperparameters optimization
pub const GP_OPTIM_N_START: usize = 10;
/// Minimum of function evaluations for COBYLA optimizer
pub const GP_COBYLA_MIN_EVAL: usize = 25;
/// Maximum of function evaluations for COBYLA optimizer
pub const GP_COBYLA_MAX_EVAL: usize = 1000;
/// Default seed of the multistart points generator
pub const GP_OPTIM_SEED: u64 = 42;

/// Internal parameters computed during training
/// used later on in prediction computations
#[derive(Default, Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub(crate) struct GpInnerParams<F: Float> {
    /// Gaussian process variance
    sigma2: F,
    /// Generalized least-squares regression weights
    beta: Array2<F>,
    /// Gaussian Process weights
    gamma: Array2<F>,
    /// Cholesky decomposition of the correlation matrix \[R\]
    r_chol: Array2<F>,
    /// Solution of the linear equation system : \[R\] x Ft = y
    ft: Array2<F>,
    /// R upper triangle matrix of QR decomposition of the matrix Ft
    ft_qr_r: Array2<F>,
}

/// A GP regression is an interpolation method where the
/// interpolated values are modeled by a Gaussian process with a mean and
/// governed by a prior covariance kernel, which depends on some
/// parameters to be determined.
///
/// The interpolated output is modeled as stochastic process as follows:
///
/// `Y(x) = mu(x) + Z(x)`
///
/// where:
/// * `mu(x)` is the trend i.e. the mean of the gaussian process
/// * `Z(x)` the realization of stochastic gaussian process ~ `Normal(0, sigma^2)`
///
/// which in turn is written as:
///
/// `Y(x) = betas.regr(x) + sigma^2*corr(x, x')`
///
/// where:
/// * `betas` is a vector of linear regression parameters to be determined
/// * `regr(x)` a vector of polynomial basis functions
/// * `sigma^2` is the process variance
/// * `corr(x, x')` is a correlation function which depends on `distance(x, x')`
///   and a set of unknown parameters `thetas` to be determined.
///
/// # Example
///
/// ```no_run
/// use moego_gp::{correlation_models::*, mean_models::*, GaussianProcess};
/// use linfa::prelude::*;
/// use ndarray::{arr1, arr2};
///
/// let xt = arr2(&[[0.0], [1.0], [2.0], [3.0], [4.0]]);
/// let yt = arr1(&[0.0, 1.0, 1.5, 0.9, 1.0]);
///
/// let gp = GaussianProcess::<f64, ConstantMean, SquaredExponentialCorr>::params(
///     ConstantMean::default(),
///     SquaredExponentialCorr::default(),
/// )
/// .seed(42)
/// .fit(&Dataset::new(xt, yt))
/// .expect("GP fitted");
///
/// let (mean, variance) = gp.predict_valvar(&arr2(&[[1.5], [3.5]])).expect("prediction");
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, Mean: Serialize, Corr: Serialize",
        deserialize = "F: Deserialize<'de>, Mean: Deserialize<'de>, Corr: Deserialize<'de>"
    ))
)]
pub struct GaussianProcess<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>> {
    /// Parameter of the autocorrelation model equal to the inverse of length scale
    theta: Array1<F>,
    /// Reduced likelihood value (result from internal optimization)
    likelihood: F,
    /// Gaussian process internal fitted params
    inner_params: GpInnerParams<F>,
    /// Training inputs
    xt_norm: NormalizedData<F>,
    /// Training outputs
    yt_norm: NormalizedData<F>,
    /// Training dataset (input, output)
    pub(crate) training_data: (Array2<F>, Array1<F>),
    /// Parameters used to fit this model
    pub(crate) params: GpValidParams<F, Mean, Corr>,
}

/// Kriging as GP special case when using constant mean and squared exponential correlation
pub type Kriging<F> = GpParams<F, ConstantMean, SquaredExponentialCorr>;

impl<F: Float> Kriging<F> {
    /// Kriging parameters constructor
    pub fn params() -> GpParams<F, ConstantMean, SquaredExponentialCorr> {
        GpParams::new(ConstantMean(), SquaredExponentialCorr())
    }
}

impl<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>> fmt::Display
    for GaussianProcess<F, Mean, Corr>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GP(mean={}, corr={}, theta={}, variance={}, likelihood={})",
            self.params.mean,
            self.params.corr,
            self.theta,
            self.inner_params.sigma2,
            self.likelihood,
        )
    }
}

impl<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>> GaussianProcess<F, Mean, Corr> {
    /// Gp parameters contructor
    pub fn params<NewMean: RegressionModel<F>, NewCorr: CorrelationModel<F>>(
        mean: NewMean,
        corr: NewCorr,
    ) -> GpParams<F, NewMean, NewCorr> {
        GpParams::new(mean, corr)
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n scalar output values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let xnorm = self.xt_norm.normalize(x);
        let corr = self.compute_correlation(&xnorm)?;
        Ok(self.mean_from_correlation(&xnorm, &corr))
    }

    /// Predict variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n variance values as (n,) column vector, all non negative.
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let xnorm = self.xt_norm.normalize(x);
        let corr = self.compute_correlation(&xnorm)?;
        self.variance_from_correlation(&xnorm, &corr)
    }

    /// Predict both output values and variances at n given `x` points of nx components
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        let xnorm = self.xt_norm.normalize(x);
        let corr = self.compute_correlation(&xnorm)?;
        let mean = self.mean_from_correlation(&xnorm, &corr);
        let var = self.variance_from_correlation(&xnorm, &corr)?;
        Ok((mean, var))
    }

    fn mean_from_correlation(&self, xnorm: &Array2<F>, corr: &Array2<F>) -> Array1<F> {
        let f = self.params.mean.value(xnorm);
        let y_ = &f.dot(&self.inner_params.beta) + &corr.dot(&self.inner_params.gamma);
        (&y_ * &self.yt_norm.std + &self.yt_norm.mean).remove_axis(Axis(1))
    }

    fn variance_from_correlation(&self, xnorm: &Array2<F>, corr: &Array2<F>) -> Result<Array1<F>> {
        let inners = &self.inner_params;
        let rt = inners.r_chol.solve_triangular(&corr.t(), UPLO::Lower)?;
        let rhs = inners.ft.t().dot(&rt) - self.params.mean.value(xnorm).t();
        let u = inners.ft_qr_r.t().solve_triangular(&rhs, UPLO::Lower)?;

        let mse = Array::ones(rt.ncols()) - rt.mapv(|v| v * v).sum_axis(Axis(0))
            + u.mapv(|v| v * v).sum_axis(Axis(0));
        // Machine precision may give slightly negative values
        Ok(mse.mapv(|v| (inners.sigma2 * v).max(F::zero())))
    }

    /// Correlations between normalized `xnorm` points and training points as (n, nt) matrix
    fn compute_correlation(&self, xnorm: &Array2<F>) -> Result<Array2<F>> {
        let dx = pairwise_differences(xnorm, &self.xt_norm.data);
        let r = self.params.corr.value(&dx, &self.theta);
        let nt = self.xt_norm.data.nrows();
        r.to_shape(((xnorm.nrows(), nt), ndarray::Order::RowMajor))
            .map(|a| a.into_owned())
            .map_err(|e| GpError::InvalidValueError(format!("correlation shape: {e}")))
    }

    /// Optimal theta
    pub fn theta(&self) -> &Array1<F> {
        &self.theta
    }

    /// Estimated process variance
    pub fn variance(&self) -> F {
        self.inner_params.sigma2
    }

    /// Reduced likelihood of the fitted model
    pub fn likelihood(&self) -> F {
        self.likelihood
    }

    /// Input and output dimensions
    pub fn dims(&self) -> (usize, usize) {
        (self.training_data.0.ncols(), 1)
    }

    /// Training inputs and outputs
    pub fn training_data(&self) -> &(Array2<F>, Array1<F>) {
        &self.training_data
    }

    /// Parameters used to fit this model
    pub fn params_used(&self) -> &GpValidParams<F, Mean, Corr> {
        &self.params
    }
}

impl<F: Float, Mean: RegressionModel<F>, Corr: CorrelationModel<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError> for GpValidParams<F, Mean, Corr>
{
    type Object = GaussianProcess<F, Mean, Corr>;

    /// Fit GP parameters using maximum likelihood
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = dataset.records();
        let y = dataset.targets().to_owned().insert_axis(Axis(1));
        if x.nrows() < 2 {
            return Err(GpError::InsufficientData {
                n_samples: x.nrows(),
            });
        }
        let dim = x.ncols();

        let init = self.theta_tuning().init();
        let theta0 = match init.len() {
            1 => Array1::from_elem(dim, init[0]),
            n if n == dim => init.to_owned(),
            n => {
                return Err(GpError::InvalidValueError(format!(
                    "Initial theta should be either 1-dim or {dim}-dim (training input dim), got {n}"
                )));
            }
        };

        let xtrain = NormalizedData::new(x);
        let ytrain = NormalizedData::new(&y);

        let x_distances = DiffMatrix::new(&xtrain.data);
        let sums = x_distances.d.sum_axis(Axis(1));
        if sums.iter().any(|v| *v == F::zero()) {
            warn!("Duplicated training points, GP fit will likely fail");
        }
        let fx = self.mean().value(&xtrain.data);

        let opt_theta = match self.theta_tuning() {
            ThetaTuning::Fixed(_) => theta0,
            ThetaTuning::Full { bounds, .. } => {
                let bounds = match bounds.len() {
                    1 => vec![bounds[0]; dim],
                    n if n == dim => bounds.to_vec(),
                    n => {
                        return Err(GpError::InvalidValueError(format!(
                            "Theta bounds should be either 1-dim or {dim}-dim (training input dim), got {n}"
                        )));
                    }
                };
                // theta0 is kept within the search space
                let theta0 = Array1::from_iter(
                    theta0
                        .iter()
                        .zip(bounds.iter())
                        .map(|(t, (lo, up))| t.max(*lo).min(*up)),
                );

                let objfn = |x: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
                    let theta: Array1<F> = x.iter().map(|v| F::cast(10f64.powf(*v))).collect();
                    if theta.iter().any(|v| v.is_nan()) {
                        return f64::INFINITY;
                    }
                    let rxx = self.corr().value(&x_distances.d, &theta);
                    match reduced_likelihood(&fx, rxx, &x_distances, &ytrain, self.nugget()) {
                        Ok((lkh, _)) => -into_f64(&lkh),
                        Err(_) => f64::INFINITY,
                    }
                };

                let (theta_inits, log_bounds) =
                    prepare_multistart(self.n_start(), &theta0, &bounds, self.seed());
                debug!("Optimize with multistart theta = {theta_inits:?} and bounds = {log_bounds:?}");
                let now = Instant::now();
                let maxeval = (10 * theta_inits.ncols()).clamp(GP_COBYLA_MIN_EVAL, self.max_eval());
                let best = (0..theta_inits.nrows())
                    .into_par_iter()
                    .map(|i| {
                        optimize_params(
                            objfn,
                            &theta_inits.row(i).to_owned(),
                            &log_bounds,
                            CobylaParams {
                                maxeval,
                                ..CobylaParams::default()
                            },
                        )
                    })
                    .reduce(
                        || (f64::INFINITY, Array1::ones(theta_inits.ncols())),
                        |a, b| if b.0 < a.0 { b } else { a },
                    );
                debug!("elapsed optim = {:?}", now.elapsed().as_millis());
                if best.0 == f64::INFINITY {
                    return Err(GpError::LikelihoodComputationError(
                        "no valid hyperparameters found".to_string(),
                    ));
                }
                best.1.mapv(|v| F::cast(10f64.powf(v)))
            }
        };

        let rxx = self.corr().value(&x_distances.d, &opt_theta);
        let (lkh, inner_params) =
            reduced_likelihood(&fx, rxx, &x_distances, &ytrain, self.nugget())?;
        Ok(GaussianProcess {
            theta: opt_theta,
            likelihood: lkh,
            inner_params,
            xt_norm: xtrain,
            yt_norm: ytrain,
            training_data: (x.to_owned(), dataset.targets().to_owned()),
            params: self.clone(),
        })
    }
}

/// Compute reduced likelihood function
/// fx: mean factors term at x samples,
/// rxx: correlation factors at x samples,
/// x_distances: pairwise distances between x samples
/// ytrain: normalized output training values
/// nugget: factor to improve numerical stability
fn reduced_likelihood<F: Float>(
    fx: &ArrayBase<impl Data<Elem = F>, Ix2>,
    rxx: ArrayBase<impl Data<Elem = F>, Ix2>,
    x_distances: &DiffMatrix<F>,
    ytrain: &NormalizedData<F>,
    nugget: F,
) -> Result<(F, GpInnerParams<F>)> {
    // Set up R
    let mut r_mx: Array2<F> = Array2::<F>::eye(x_distances.n_obs).mapv(|v| v + v * nugget);
    for (i, ij) in x_distances.d_indices.outer_iter().enumerate() {
        r_mx[[ij[0], ij[1]]] = rxx[[i, 0]];
        r_mx[[ij[1], ij[0]]] = rxx[[i, 0]];
    }
    // R cholesky decomposition
    let r_chol = r_mx.cholesky()?;
    // Solve generalized least squared problem
    let ft = r_chol.solve_triangular(fx, UPLO::Lower)?;
    let (ft_qr_q, ft_qr_r) = ft.qr()?.into_decomp();

    // Check whether we have an ill-conditionned problem
    let (_, sv_qr_r, _) = ft_qr_r.svd(false, false)?;
    let sv_max = sv_qr_r.iter().fold(F::zero(), |acc, v| acc.max(v.abs()));
    let sv_min = sv_qr_r.iter().fold(F::infinity(), |acc, v| acc.min(v.abs()));
    if sv_max == F::zero() || sv_min / sv_max < F::cast(1e-10) {
        return Err(GpError::LikelihoodComputationError(
            "ft is too ill conditioned, try another theta again".to_string(),
        ));
    }
    let yt = r_chol.solve_triangular(&ytrain.data, UPLO::Lower)?;

    let beta = ft_qr_r.solve_triangular_into(ft_qr_q.t().dot(&yt), UPLO::Upper)?;
    let rho = yt - ft.dot(&beta);
    let rho_sqr = rho.mapv(|v| v * v).sum_axis(Axis(0));

    let gamma = r_chol.t().solve_triangular_into(rho, UPLO::Upper)?;
    // The determinant of R is equal to the squared product of
    // the diagonal elements of its Cholesky decomposition r_chol
    let n_obs: F = F::cast(x_distances.n_obs);

    let logdet = r_chol.diag().mapv(|v: F| v.log10()).sum() * F::cast(2.) / n_obs;

    // Reduced likelihood
    let sigma2 = rho_sqr / n_obs;
    let reduced_likelihood = -n_obs * (sigma2.sum().log10() + logdet);
    if reduced_likelihood.is_nan() {
        return Err(GpError::LikelihoodComputationError(
            "likelihood is NaN".to_string(),
        ));
    }

    Ok((
        reduced_likelihood,
        GpInnerParams {
            sigma2: sigma2[0] * ytrain.std[0] * ytrain.std[0],
            beta,
            gamma,
            r_chol,
            ft,
            ft_qr_r,
        },
    ))
}
