use moego_ego::{
    hypervolume, ComparisonOp, Constraint, Extraction, Moego, Outputs, ProblemBuilder,
    SamplingRule, VariableDescriptor, VariableSpace,
};
use ndarray::array;

/// Cantilever beam of rectangular section loaded at its tip
#[derive(Clone, Debug)]
struct Beam {
    length: f64,
    load: f64,
    young: f64,
    width: f64,
    height: f64,
}

impl Default for Beam {
    fn default() -> Self {
        Beam {
            length: 2.,
            load: 1e3,
            young: 2e11,
            width: 0.1,
            height: 0.1,
        }
    }
}

fn simulate(beam: &mut Beam) -> anyhow::Result<Outputs> {
    if beam.width <= 0. || beam.height <= 0. {
        anyhow::bail!("degenerate section {} x {}", beam.width, beam.height);
    }
    let inertia = beam.width * beam.height.powi(3) / 12.;
    let deflection = beam.load * beam.length.powi(3) / (3. * beam.young * inertia);
    let stress = beam.load * beam.length * beam.height / (2. * inertia);
    Ok(Outputs::new()
        .with("area", beam.width * beam.height)
        .with("deflection", deflection * 1e3)
        .with("stress", stress / 1e6))
}

fn main() {
    let space = VariableSpace::new(vec![
        VariableDescriptor::interval("b", 0.01, 0.2)
            .name("width")
            .binder(|beam: &mut Beam, v| beam.width = v),
        VariableDescriptor::set("h", vec![0.05, 0.1, 0.15, 0.2, 0.25, 0.3])
            .name("height")
            .rule(SamplingRule::Uniform)
            .binder(|beam: &mut Beam, v| beam.height = v),
    ])
    .expect("valid space");

    let problem = ProblemBuilder::new(space, Beam::default())
        .simulation(simulate)
        .objective("area", Extraction::output("area"))
        .objective("deflection", Extraction::output("deflection"))
        .constraint(Constraint::new(
            "stress",
            ComparisonOp::Le,
            200.,
            Extraction::output("stress"),
        ))
        .build()
        .expect("valid problem");

    let res = Moego::new(problem)
        .configure(|config| config.n_doe(12).max_iters(15).seed(7))
        .run()
        .expect("beam front approximated");

    println!(
        "{} failure(s), {} infeasible evaluation(s)",
        res.n_failures, res.n_infeasible
    );
    println!("Acquisition log score trace: {:?}", res.acquisition_trace);
    println!(
        "Hypervolume wrt (0.06, 100) = {:.6}",
        hypervolume(&res.front, &array![0.06, 100.])
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&res.front).expect("front serialized")
    );
}
