//! Final Pareto front built from evaluated and predicted points.
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1};
use serde::Serialize;

use crate::archive::SampleArchive;
use crate::pareto::{self, non_dominated_indices};
use crate::population::Individual;
use crate::types::Origin;

/// A member of the Pareto front
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrontMember {
    /// Design point
    pub x: Array1<f64>,
    /// Objective values, true or predicted depending on `origin`
    pub objectives: Array1<f64>,
    /// Constraint values, true or predicted depending on `origin`
    pub constraints: Array1<f64>,
    /// Whether values were evaluated or predicted
    pub origin: Origin,
}

/// Non-dominated subset of the feasible evaluated records and predicted feasible individuals
///
/// Members sharing identical objective values are deduplicated, evaluated members win
/// over predicted ones.
pub fn aggregate(archive: &SampleArchive, population: &[Individual]) -> Vec<FrontMember> {
    let evaluated = archive
        .records()
        .iter()
        .filter(|r| r.is_usable())
        .map(|r| FrontMember {
            x: r.x.clone(),
            objectives: r.objectives.clone(),
            constraints: r.constraints.clone(),
            origin: Origin::Evaluated,
        });
    let predicted = population
        .iter()
        .filter(|ind| ind.is_feasible() && ind.objectives.iter().all(|v| v.is_finite()))
        .map(|ind| FrontMember {
            x: ind.x.clone(),
            objectives: ind.objectives.clone(),
            constraints: ind.constraints.clone(),
            origin: Origin::Predicted,
        });

    let mut merged: Vec<FrontMember> = Vec::new();
    for member in evaluated.chain(predicted) {
        let duplicate = merged
            .iter()
            .any(|m| same_bits(&m.objectives, &member.objectives));
        if !duplicate {
            merged.push(member);
        }
    }
    let objectives = stack_objectives(&merged);
    let keep = non_dominated_indices(&objectives);
    let mut front = Vec::with_capacity(keep.len());
    let mut kept = keep.into_iter().peekable();
    for (i, member) in merged.into_iter().enumerate() {
        if kept.peek() == Some(&i) {
            kept.next();
            front.push(member);
        }
    }
    front
}

/// Hypervolume of `front` bounded by `reference`, every objective being minimized
pub fn hypervolume(front: &[FrontMember], reference: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> f64 {
    pareto::hypervolume(&stack_objectives(front), reference)
}

fn stack_objectives(members: &[FrontMember]) -> Array2<f64> {
    let n_obj = members.first().map_or(0, |m| m.objectives.len());
    Array2::from_shape_fn((members.len(), n_obj), |(i, j)| members[i].objectives[j])
}

fn same_bits(a: &Array1<f64>, b: &Array1<f64>) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(u, v)| u.to_bits() == v.to_bits())
}
