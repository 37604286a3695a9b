use criterion::{Criterion, criterion_group, criterion_main};
use linfa::prelude::{Dataset, Fit};
use moego_doe::{Lhs, SamplingMethod};
use moego_gp::Kriging;
use ndarray::{Array1, Zip, array};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn criterion_gp(c: &mut Criterion) {
    let mut group = c.benchmark_group("gp");
    group.sample_size(10);
    for (dim, nt) in [(2, 20), (5, 50)] {
        let lim = array![[-5., 5.]];
        let xlimits = lim.broadcast((dim, 2)).unwrap();
        let xt = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(nt);
        let mut yt: Array1<f64> = Array1::zeros(nt);
        Zip::from(&mut yt)
            .and(xt.rows())
            .for_each(|y, x| *y = x.mapv(|v| v * v).sum());

        group.bench_function(format!("kriging-{dim}-dim-{nt}-points"), |b| {
            b.iter(|| {
                std::hint::black_box(
                    Kriging::params()
                        .fit(&Dataset::new(xt.to_owned(), yt.to_owned()))
                        .expect("GP fit error"),
                );
            });
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_gp);
criterion_main!(benches);
