use moego_ego::{Moego, Origin, Problem, VariableDescriptor, VariableSpace};

// ZDT1: convex Pareto front f2 = 1 - sqrt(f1) reached for x1 = ... = xn = 0
fn zdt1(x: &[f64]) -> Vec<f64> {
    let g = 1. + 9. * x[1..].iter().sum::<f64>() / (x.len() - 1) as f64;
    let f1 = x[0];
    vec![f1, g * (1. - (f1 / g).sqrt())]
}

fn main() {
    let vars = (0..4)
        .map(|i| VariableDescriptor::interval(format!("x{i}"), 0., 1.))
        .collect();
    let space = VariableSpace::new(vars).expect("valid space");
    let problem = Problem::from_fn(space, 2, vec![], |x| Ok(zdt1(x))).expect("valid problem");

    let res = Moego::new(problem)
        .configure(|config| config.n_doe(15).max_iters(20).q_points(2).seed(42))
        .run()
        .expect("ZDT1 front approximated");

    println!(
        "{:?} after {} iteration(s), {} evaluation(s)",
        res.termination,
        res.n_iterations,
        res.archive.len()
    );
    for member in res.front.iter() {
        let tag = match member.origin {
            Origin::Evaluated => "evaluated",
            Origin::Predicted => "predicted",
        };
        println!("{:.4} {:.4} ({tag})", member.objectives[0], member.objectives[1]);
    }
}
