use criterion::{criterion_group, criterion_main, Criterion};
use env_logger::{Builder, Env};
use moego_ego::{ComparisonOp, Moego, Problem, VariableDescriptor, VariableSpace, MOEGO_LOG};

/// ZDT1 test problem with an additional linear constraint
fn zdt1(nx: usize) -> Problem<()> {
    let vars = (0..nx)
        .map(|i| VariableDescriptor::interval(format!("x{i}"), 0., 1.))
        .collect();
    let space = VariableSpace::new(vars).expect("valid space");
    Problem::from_fn(space, 2, vec![(ComparisonOp::Le, 1.5)], |x| {
        let g = 1. + 9. * x[1..].iter().sum::<f64>() / (x.len() - 1) as f64;
        let f1 = x[0];
        let f2 = g * (1. - (f1 / g).sqrt());
        Ok(vec![f1, f2, x.iter().sum()])
    })
    .expect("valid problem")
}

fn criterion_moego(c: &mut Criterion) {
    let mut group = c.benchmark_group("moego");
    group.sample_size(10);
    group.bench_function("moego zdt1", |b| {
        let env = Env::new().filter_or(MOEGO_LOG, "error");
        let mut builder = Builder::from_env(env);
        let builder = builder.target(env_logger::Target::Stdout);
        builder.try_init().ok();

        b.iter(|| {
            std::hint::black_box(
                Moego::new(zdt1(3))
                    .configure(|config| {
                        config
                            .n_doe(10)
                            .max_iters(10)
                            .population_size(40)
                            .generations(20)
                            .seed(42)
                    })
                    .run()
                    .expect("Front approximation"),
            )
        });
    });

    group.finish();
}

criterion_group!(benches, criterion_moego);
criterion_main!(benches);
