//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! also known as [Kriging](https://en.wikipedia.org/wiki/Kriging), used as a cheap surrogate of
//! expensive black-box functions.
//!
//! A fitted model gives at any point a predicted mean and a predicted variance, the latter
//! quantifying the uncertainty of the prediction: it vanishes at training points and grows
//! as the query point moves away from them.
//!
//! GP methods are implemented by [GaussianProcess] parameterized by [GpParams].
//! Hyperparameters are fitted by maximizing the reduced likelihood with a multistart COBYLA
//! optimization which is deterministic given a training set and a [GpParams::seed].
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod correlation_models;
mod errors;
pub mod mean_models;

mod parameters;
mod utils;

mod optimization;

pub use algorithm::*;
pub use errors::*;
pub use parameters::*;
