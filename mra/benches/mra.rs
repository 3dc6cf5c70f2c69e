use criterion::{black_box, criterion_group, criterion_main, Criterion};
use linfa::prelude::{Dataset, Fit};
use mrabox_layout::{LocationLayout, RandomLayout};
use mrabox_mra::{ExponentialCov, MraTree};
use ndarray::{arr2, Array1};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn criterion_mra(c: &mut Criterion) {
    let configs = [(1000, 2, 4, 10), (4000, 3, 4, 10), (4000, 5, 2, 20)];

    let mut group = c.benchmark_group("mra");
    group.sample_size(10);
    for (n, m, j, r0) in configs {
        let rng = Xoshiro256Plus::seed_from_u64(42);
        let x = RandomLayout::new_with_rng(&arr2(&[[0., 1.], [0., 1.]]), n, rng).locations();
        let z: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| (5. * r[0]).sin() + (3. * r[1]).cos())
            .collect();

        group.bench_function(format!("mra n={} M={} J={} r0={}", n, m, j, r0), |b| {
            b.iter(|| {
                black_box(
                    MraTree::params(ExponentialCov::new(1., 0.3))
                        .n_levels(m)
                        .n_children(j)
                        .n_knots(r0)
                        .fit(&Dataset::new(x.clone(), z.clone()))
                        .expect("MRA tree built"),
                );
            });
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_mra);
criterion_main!(benches);
