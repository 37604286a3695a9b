use linfa::Float;
use ndarray::{Array2, Axis};

/// Sampling method allowing to generate a DoE in a given sampling space
pub trait SamplingMethod<F: Float> {
    /// Returns the bounds of the sample space
    ///
    /// # Returns
    ///
    /// * A (nx, 2) matrix where nx is the dimension of the space considered.
    ///   The ith row is the \[lower bound, upper bound\] of the ith component.
    fn sampling_space(&self) -> &Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples belonging to the unit hypercube \[0., 1.\]^nx
    fn normalized_sample(&self, ns: usize) -> Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples belonging to the sampling space
    fn sample(&self, ns: usize) -> Array2<F> {
        let xlimits = self.sampling_space();
        let lower = xlimits.column(0);
        let scale = &xlimits.column(1) - &lower;
        self.normalized_sample(ns) * scale.insert_axis(Axis(0)) + &lower
    }
}
