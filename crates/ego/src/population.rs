//! NSGA-II population search run on the refined surrogates.
//!
//! Individuals are never truly evaluated: their objectives are the predicted means of the
//! objective surrogates and their constraint violation is computed from the predicted means
//! of the constraint surrogates. Infeasible individuals are penalized through constrained
//! dominance, not discarded.
//!
//! The initial [PopulationState] is a pure function of the surrogates and the archive:
//! feasible archived points come first, the remainder is drawn uniformly from a generator
//! seeded by [Nsga2Params::seed].
use log::{debug, info};
use ndarray::{Array1, Array2};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

use crate::archive::SampleArchive;
use crate::errors::{EgoError, Result};
use crate::pareto::{crowding_distance, fast_non_dominated_sort};
use crate::problem::{total_violation, Constraint};
use crate::space::{project_point, Domain};
use crate::surrogate::SurrogateState;

/// NSGA-II parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Nsga2Params {
    /// Number of individuals
    pub population_size: usize,
    /// Number of generations
    pub generations: usize,
    /// Probability to cross a pair of parents
    pub crossover_prob: f64,
    /// Distribution index of the simulated binary crossover
    pub crossover_eta: f64,
    /// Distribution index of the polynomial mutation
    pub mutation_eta: f64,
    /// Per variable mutation probability, `1 / nx` when not set
    pub mutation_prob: Option<f64>,
    /// Seed of the initial fill and of the variation operators
    pub seed: u64,
}

impl Default for Nsga2Params {
    fn default() -> Self {
        Nsga2Params {
            population_size: 100,
            generations: 50,
            crossover_prob: 0.9,
            crossover_eta: 20.,
            mutation_eta: 20.,
            mutation_prob: None,
            seed: 42,
        }
    }
}

/// A member of the population with its surrogate predictions
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Individual {
    /// Design point
    pub x: Array1<f64>,
    /// Predicted objective values
    pub objectives: Array1<f64>,
    /// Predicted constraint values, NaN for constraints without surrogate
    pub constraints: Array1<f64>,
    /// Predicted total constraint violation, 0 when predicted feasible
    pub violation: f64,
}

impl Individual {
    /// Whether every predicted constraint holds
    pub fn is_feasible(&self) -> bool {
        self.violation == 0.
    }
}

/// Population at a given generation
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationState {
    /// Individuals, ordered by rank then decreasing crowding distance once sorted
    pub individuals: Vec<Individual>,
    /// Number of generations already run
    pub generation: usize,
}

impl PopulationState {
    /// Initial population of `search` built from its surrogates and `archive`
    ///
    /// Feasible non failed archived points (in archive order, snapped into the domains) come
    /// first, the population is then filled with uniform random points.
    pub fn from_surrogates(search: &PopulationSearch, archive: &SampleArchive) -> Result<Self> {
        let n = search.params.population_size;
        let nx = search.domains.len();
        let mut x = Array2::zeros((n, nx));
        let seeds: Vec<&Array1<f64>> = archive
            .records()
            .iter()
            .filter(|r| r.is_usable())
            .map(|r| &r.x)
            .take(n)
            .collect();
        let n_seeds = seeds.len();
        for (mut row, seed) in x.rows_mut().into_iter().zip(seeds) {
            row.assign(seed);
            project_point(&search.domains, &mut row);
        }
        let mut rng = Xoshiro256Plus::seed_from_u64(search.params.seed);
        for mut row in x.rows_mut().into_iter().skip(n_seeds) {
            for (v, domain) in row.iter_mut().zip(search.domains.iter()) {
                *v = domain.from_unit(rng.gen::<f64>());
            }
        }
        debug!(
            "Initial population: {n_seeds} archived point(s), {} random point(s)",
            n - n_seeds
        );
        Ok(PopulationState {
            individuals: search.evaluate(&x)?,
            generation: 0,
        })
    }

    /// Predicted objectives as a (n, n_obj) array
    pub fn objectives(&self) -> Array2<f64> {
        let n_obj = self.individuals.first().map_or(0, |ind| ind.objectives.len());
        Array2::from_shape_fn((self.individuals.len(), n_obj), |(i, j)| {
            self.individuals[i].objectives[j]
        })
    }

    /// Predicted violations
    pub fn violations(&self) -> Vec<f64> {
        self.individuals.iter().map(|ind| ind.violation).collect()
    }

    /// Rank and crowding distance of every individual
    fn rank_and_crowding(&self) -> (Vec<usize>, Vec<f64>) {
        let n = self.individuals.len();
        let objectives = self.objectives();
        let mut rank = vec![0; n];
        let mut crowding = vec![0.; n];
        for (r, front) in fast_non_dominated_sort(&objectives, &self.violations())
            .into_iter()
            .enumerate()
        {
            let dist = crowding_distance(&objectives, &front);
            for (i, d) in front.into_iter().zip(dist) {
                rank[i] = r;
                crowding[i] = d;
            }
        }
        (rank, crowding)
    }
}

/// NSGA-II search over the design space using surrogate predictions as fitness
pub struct PopulationSearch<'a> {
    surrogates: &'a SurrogateState,
    constraints: &'a [Constraint],
    cstr_tol: f64,
    domains: Vec<Domain>,
    params: Nsga2Params,
}

impl<'a> PopulationSearch<'a> {
    /// Search over `domains` with the fitted `surrogates`
    ///
    /// Fails with [EgoError::InsufficientData] when an objective surrogate is missing.
    pub fn new(
        surrogates: &'a SurrogateState,
        domains: Vec<Domain>,
        constraints: &'a [Constraint],
        cstr_tol: f64,
        params: Nsga2Params,
    ) -> Result<Self> {
        if let Some(j) = (0..surrogates.n_obj()).find(|&j| surrogates.objective(j).is_none()) {
            return Err(EgoError::InsufficientData(format!(
                "no surrogate for objective {j}"
            )));
        }
        if params.population_size < 2 {
            return Err(EgoError::InvalidConfigError(
                "population size should be at least 2".to_string(),
            ));
        }
        Ok(PopulationSearch {
            surrogates,
            constraints,
            cstr_tol,
            domains,
            params,
        })
    }

    /// Run the configured number of generations from the initial population
    ///
    /// The final individuals are sorted by rank then by decreasing crowding distance.
    pub fn run(&self, archive: &SampleArchive) -> Result<PopulationState> {
        let mut state = PopulationState::from_surrogates(self, archive)?;
        let mut rng = Xoshiro256Plus::seed_from_u64(self.params.seed);
        rng.jump();
        for _ in 0..self.params.generations {
            let offspring = self.offspring(&state, &mut rng);
            let mut merged = state.individuals;
            merged.extend(self.evaluate(&offspring)?);
            state = PopulationState {
                individuals: self.survivors(merged),
                generation: state.generation + 1,
            };
        }
        let state = PopulationState {
            individuals: self.survivors(state.individuals),
            generation: state.generation,
        };
        info!(
            "Population search: {} generation(s), {} predicted feasible individual(s)",
            state.generation,
            state.individuals.iter().filter(|ind| ind.is_feasible()).count()
        );
        Ok(state)
    }

    /// Individuals at the rows of `x` predicted by the surrogates
    pub fn evaluate(&self, x: &Array2<f64>) -> Result<Vec<Individual>> {
        let preds = self.surrogates.predict(x)?;
        Ok(x.rows()
            .into_iter()
            .enumerate()
            .map(|(i, xi)| {
                let constraints = preds.cstr_means.row(i).to_owned();
                let violation = total_violation(self.constraints, &constraints, self.cstr_tol);
                Individual {
                    x: xi.to_owned(),
                    objectives: preds.obj_means.row(i).to_owned(),
                    constraints,
                    violation,
                }
            })
            .collect())
    }

    /// Best `population_size` individuals by front then crowding distance
    fn survivors(&self, individuals: Vec<Individual>) -> Vec<Individual> {
        let pool = PopulationState {
            individuals,
            generation: 0,
        };
        let objectives = pool.objectives();
        let fronts = fast_non_dominated_sort(&objectives, &pool.violations());
        let mut selected = Vec::with_capacity(self.params.population_size);
        for front in fronts {
            if selected.len() >= self.params.population_size {
                break;
            }
            let dist = crowding_distance(&objectives, &front);
            let mut order: Vec<usize> = (0..front.len()).collect();
            order.sort_by(|&a, &b| dist[b].total_cmp(&dist[a]));
            let room = self.params.population_size - selected.len();
            selected.extend(order.into_iter().take(room).map(|k| front[k]));
        }
        selected
            .into_iter()
            .map(|i| pool.individuals[i].clone())
            .collect()
    }

    /// Offspring design points by tournament selection, crossover and mutation
    fn offspring(&self, state: &PopulationState, rng: &mut Xoshiro256Plus) -> Array2<f64> {
        let n = self.params.population_size;
        let nx = self.domains.len();
        let (rank, crowding) = state.rank_and_crowding();
        let mut children = Array2::zeros((n, nx));
        let mut count = 0;
        while count < n {
            let p1 = &state.individuals[tournament(&rank, &crowding, rng)].x;
            let p2 = &state.individuals[tournament(&rank, &crowding, rng)].x;
            let (mut c1, mut c2) = self.crossover(p1, p2, rng);
            for child in [&mut c1, &mut c2] {
                self.mutate(child, rng);
                project_point(&self.domains, child);
            }
            for child in [c1, c2] {
                if count < n {
                    children.row_mut(count).assign(&child);
                    count += 1;
                }
            }
        }
        children
    }

    /// Simulated binary crossover
    fn crossover(
        &self,
        p1: &Array1<f64>,
        p2: &Array1<f64>,
        rng: &mut Xoshiro256Plus,
    ) -> (Array1<f64>, Array1<f64>) {
        let mut c1 = p1.clone();
        let mut c2 = p2.clone();
        if rng.gen::<f64>() > self.params.crossover_prob {
            return (c1, c2);
        }
        let eta = self.params.crossover_eta;
        for (i, domain) in self.domains.iter().enumerate() {
            if rng.gen::<f64>() > 0.5 {
                continue;
            }
            let (lo, hi) = domain.bounds();
            let (y1, y2) = (p1[i].min(p2[i]), p1[i].max(p2[i]));
            if y2 - y1 < 1e-14 || hi - lo <= 0. {
                continue;
            }
            let u = rng.gen::<f64>();
            let spread = |beta: f64| {
                let alpha = 2. - beta.powf(-(eta + 1.));
                if u <= 1. / alpha {
                    (u * alpha).powf(1. / (eta + 1.))
                } else {
                    (1. / (2. - u * alpha)).powf(1. / (eta + 1.))
                }
            };
            let betaq1 = spread(1. + 2. * (y1 - lo) / (y2 - y1));
            let betaq2 = spread(1. + 2. * (hi - y2) / (y2 - y1));
            let v1 = (0.5 * ((y1 + y2) - betaq1 * (y2 - y1))).clamp(lo, hi);
            let v2 = (0.5 * ((y1 + y2) + betaq2 * (y2 - y1))).clamp(lo, hi);
            if rng.gen::<bool>() {
                c1[i] = v2;
                c2[i] = v1;
            } else {
                c1[i] = v1;
                c2[i] = v2;
            }
        }
        (c1, c2)
    }

    /// Polynomial mutation
    fn mutate(&self, x: &mut Array1<f64>, rng: &mut Xoshiro256Plus) {
        let prob = self
            .params
            .mutation_prob
            .unwrap_or(1. / self.domains.len().max(1) as f64);
        let eta = self.params.mutation_eta;
        for (v, domain) in x.iter_mut().zip(self.domains.iter()) {
            if rng.gen::<f64>() > prob {
                continue;
            }
            let (lo, hi) = domain.bounds();
            if hi - lo <= 0. {
                continue;
            }
            let delta1 = (*v - lo) / (hi - lo);
            let delta2 = (hi - *v) / (hi - lo);
            let u = rng.gen::<f64>();
            let deltaq = if u < 0.5 {
                let val = 2. * u + (1. - 2. * u) * (1. - delta1).powf(eta + 1.);
                val.powf(1. / (eta + 1.)) - 1.
            } else {
                let val = 2. * (1. - u) + 2. * (u - 0.5) * (1. - delta2).powf(eta + 1.);
                1. - val.powf(1. / (eta + 1.))
            };
            *v = (*v + deltaq * (hi - lo)).clamp(lo, hi);
        }
    }
}

/// Binary tournament: lower rank wins, then larger crowding distance, then the first drawn
fn tournament(rank: &[usize], crowding: &[f64], rng: &mut Xoshiro256Plus) -> usize {
    let a = rng.gen_range(0..rank.len());
    let b = rng.gen_range(0..rank.len());
    if rank[b] < rank[a] || (rank[b] == rank[a] && crowding[b] > crowding[a]) {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::EvaluationRecord;
    use crate::problem::Extraction;
    use crate::surrogate::SurrogateBuilder;
    use crate::types::ComparisonOp;
    use ndarray::array;

    fn archive() -> SampleArchive {
        let mut archive = SampleArchive::new(2);
        for i in 0..8 {
            for j in [0., 1.] {
                let x0 = i as f64 / 7.;
                archive.record(EvaluationRecord::evaluated(
                    array![x0, j],
                    array![x0 + 0.1 * j, 1. - x0 * x0 + 0.1 * j],
                    array![x0],
                    true,
                ));
            }
        }
        archive
    }

    fn constraints() -> Vec<Constraint> {
        vec![Constraint::new("c", ComparisonOp::Le, 0.6, Extraction::output("c"))]
    }

    fn params() -> Nsga2Params {
        Nsga2Params {
            population_size: 20,
            generations: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_population_starts_with_archive() {
        let archive = archive();
        let state = SurrogateState::fit(&archive, 2, 0, &SurrogateBuilder::default());
        let domains = vec![Domain::Interval(0., 1.), Domain::Set(vec![0., 1.])];
        let search = PopulationSearch::new(&state, domains, &[], 0., params()).unwrap();
        let pop = PopulationState::from_surrogates(&search, &archive).unwrap();
        assert_eq!(pop.individuals.len(), 20);
        for (ind, rec) in pop.individuals.iter().zip(archive.records()) {
            assert_eq!(ind.x, rec.x);
        }
        for ind in pop.individuals.iter().skip(archive.len()) {
            assert!((0. ..=1.).contains(&ind.x[0]));
            assert!(ind.x[1] == 0. || ind.x[1] == 1.);
        }
        let again = PopulationState::from_surrogates(&search, &archive).unwrap();
        assert_eq!(pop, again);
    }

    #[test]
    fn test_feasible_ranked_before_infeasible() {
        let archive = archive();
        let cstrs = constraints();
        let state = SurrogateState::fit(&archive, 2, 1, &SurrogateBuilder::default());
        let domains = vec![Domain::Interval(0., 1.), Domain::Set(vec![0., 1.])];
        let search = PopulationSearch::new(&state, domains, &cstrs, 0., params()).unwrap();
        let pop = search.run(&archive).unwrap();
        assert_eq!(pop.generation, 10);
        assert_eq!(pop.individuals.len(), 20);
        let first_infeasible = pop
            .individuals
            .iter()
            .position(|ind| !ind.is_feasible())
            .unwrap_or(pop.individuals.len());
        assert!(first_infeasible > 0);
        assert!(pop.individuals[first_infeasible..]
            .iter()
            .all(|ind| !ind.is_feasible()));
        for ind in pop.individuals.iter() {
            assert!((0. ..=1.).contains(&ind.x[0]));
            assert!(ind.x[1] == 0. || ind.x[1] == 1.);
        }
    }

    #[test]
    fn test_search_is_reproducible() {
        let archive = archive();
        let state = SurrogateState::fit(&archive, 2, 0, &SurrogateBuilder::default());
        let domains = vec![Domain::Interval(0., 1.), Domain::Set(vec![0., 1.])];
        let search = PopulationSearch::new(&state, domains, &[], 0., params()).unwrap();
        assert_eq!(search.run(&archive).unwrap(), search.run(&archive).unwrap());
    }

    #[test]
    fn test_missing_objective_surrogate() {
        let mut archive = SampleArchive::new(1);
        archive.record(EvaluationRecord::evaluated(array![0.], array![0.], array![], true));
        let state = SurrogateState::fit(&archive, 1, 0, &SurrogateBuilder::default());
        let res = PopulationSearch::new(
            &state,
            vec![Domain::Interval(0., 1.)],
            &[],
            0.,
            Nsga2Params::default(),
        );
        assert!(matches!(res, Err(EgoError::InsufficientData(_))));
    }
}
