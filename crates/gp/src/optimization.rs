use moego_doe::{Lhs, LhsKind, SamplingMethod};
use ndarray::{Array1, Array2, s};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use linfa::prelude::Float;

pub(crate) struct CobylaParams {
    pub rhobeg: f64,
    pub ftol_rel: f64,
    pub maxeval: usize,
}

impl Default for CobylaParams {
    fn default() -> Self {
        CobylaParams {
            rhobeg: 0.5,
            ftol_rel: 1e-4,
            maxeval: 200,
        }
    }
}

/// Starting points of the likelihood optimization in log10 space: the initial guess
/// followed by `n_start` points spread over the bounds by a seeded LHS.
/// Returns the starting points and the log10 bounds.
pub(crate) fn prepare_multistart<F: Float>(
    n_start: usize,
    theta0: &Array1<F>,
    bounds: &[(F, F)],
    seed: u64,
) -> (Array2<f64>, Vec<(f64, f64)>) {
    let bounds: Vec<(f64, f64)> = bounds
        .iter()
        .map(|(lo, up)| (into_f64(lo).log10(), into_f64(up).log10()))
        .collect();

    let mut theta0s = Array2::zeros((n_start + 1, theta0.len()));
    theta0s
        .row_mut(0)
        .assign(&theta0.mapv(|v| into_f64(&v).log10()));

    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    if n_start == 1 {
        let vals: Array1<f64> = bounds
            .iter()
            .map(|(lo, up)| if lo < up { rng.gen_range(*lo..*up) } else { *lo })
            .collect();
        theta0s.row_mut(1).assign(&vals);
    } else if n_start > 1 {
        let mut xlimits = Array2::zeros((bounds.len(), 2));
        for (mut row, (lo, up)) in xlimits.rows_mut().into_iter().zip(bounds.iter()) {
            row[0] = *lo;
            row[1] = *up;
        }
        let starts = Lhs::new(&xlimits)
            .kind(LhsKind::Maximin)
            .with_rng(rng)
            .sample(n_start);
        theta0s.slice_mut(s![1.., ..]).assign(&starts);
    }
    (theta0s, bounds)
}

/// Minimize `objfn` with COBYLA from `param0` within `bounds`.
/// Returns the best value found (infinity on failure) and its location.
pub(crate) fn optimize_params<ObjF>(
    objfn: ObjF,
    param0: &Array1<f64>,
    bounds: &[(f64, f64)],
    cobyla: CobylaParams,
) -> (f64, Array1<f64>)
where
    ObjF: Fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64,
{
    use cobyla::{Func, StopTols, minimize};

    let cons: Vec<&dyn Func<()>> = vec![];
    let x0 = param0.to_vec();

    match minimize(
        |x, u| objfn(x, None, u),
        &x0,
        bounds,
        &cons,
        (),
        cobyla.maxeval,
        cobyla::RhoBeg::All(cobyla.rhobeg),
        Some(StopTols {
            ftol_rel: cobyla.ftol_rel,
            ..StopTols::default()
        }),
    ) {
        Ok((_, x_opt, fval)) => {
            let fval = if fval.is_nan() { f64::INFINITY } else { fval };
            (fval, Array1::from_vec(x_opt))
        }
        Err((status, x_opt, _)) => {
            log::warn!("Cobyla optimizer failed in GP hyperparameters optimization, status={status:?}");
            (f64::INFINITY, Array1::from_vec(x_opt))
        }
    }
}

#[inline(always)]
pub(crate) fn into_f64<F: Float>(v: &F) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}
