/*!
Design of experiments used to seed and feed surrogate-based optimization.

A design of experiments (DoE) is a set of points drawn within a sampling space `xlimits`
given as a 2D ndarray `(nx, 2)`: the ith row holds the lower and upper bounds of the ith
component of the samples.

Every sampler first draws points in the unit hypercube ([SamplingMethod::normalized_sample])
which are then scaled to `xlimits` ([SamplingMethod::sample]). Callers mapping unit draws onto
non-continuous domains (discrete sets, fixed values) work from the normalized sample directly.

Example:
```
use moego_doe::{Lhs, LhsKind, Random, SamplingMethod};
use ndarray::arr2;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

// Sampling space is [5., 10.] x [0., 1.]
let xlimits = arr2(&[[5., 10.], [0., 1.]]);
// Five points from a centered latin hypercube
let samples = Lhs::new(&xlimits).kind(LhsKind::Centered).sample(5);
// Five uniform random points, reproducible thanks to the seeded generator
let samples = Random::new(&xlimits).with_rng(Xoshiro256Plus::seed_from_u64(42)).sample(5);
```

Two kinds of sampling methods are available:
* [Latin Hypercube Sampling](crate::lhs::Lhs),
* [Random Sampling](crate::random::Random)
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod lhs;
mod random;
mod traits;
mod utils;

pub use lhs::*;
pub use random::*;
pub use traits::*;
pub use utils::{cdist, pdist};
