use linfa::prelude::*;
use mrabox_layout::{center_observations, grid_shape, normalize_locations, LocationLayout, RegularGrid};
use mrabox_mra::{ExponentialCov, MraTree};
use ndarray::{arr2, Array1, Array2, Zip};
use ndarray_npy::write_npy;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;
use std::time::Instant;

/// Synthetic field observed on a regular grid with a band of missing values
fn synthetic_data(nx: usize, ny: usize) -> (Array2<f64>, Array1<f64>) {
    let grid = RegularGrid::new(&arr2(&[[0., 100.], [0., 100.]]), &[nx, ny]);
    let locations = grid.locations();
    let mut rng = Xoshiro256Plus::seed_from_u64(11);
    let noise = Array1::random_using(locations.nrows(), Normal::new(0., 0.05).unwrap(), &mut rng);
    let mut z = Array1::zeros(locations.nrows());
    Zip::from(&mut z)
        .and(locations.rows())
        .and(&noise)
        .for_each(|z: &mut f64, x: ndarray::ArrayView1<f64>, e| {
            *z = 5. + (x[0] / 15.).sin() * (x[1] / 20.).cos() + e;
            if x[0] > 40. && x[0] < 55. {
                *z = f64::NAN;
            }
        });
    (locations, z)
}

fn main() {
    env_logger::init();

    let (locations, z) = synthetic_data(40, 40);

    // caller side preprocessing
    let (locs, _) = normalize_locations(&locations);
    let shape = grid_shape(&locs);
    let (z, obs_mean) = center_observations(&z);
    println!(
        "{} locations on a {:?} grid, mean of observations = {:.3}",
        locs.nrows(),
        shape,
        obs_mean
    );

    let start = Instant::now();
    let tree = MraTree::params(ExponentialCov::new(1., 0.3))
        .n_levels(2)
        .n_children(4)
        .n_knots(2)
        .noise_variance(1e-4)
        .fit(&Dataset::new(locs, z))
        .expect("MRA tree built");
    println!("{} built in {:?}", tree, start.elapsed());

    let (mean, sd) = tree.predict().expect("MRA prediction");
    let mean = (mean + obs_mean)
        .into_shape((shape[0], shape[1]))
        .expect("grid shaped prediction");
    let sd = sd
        .into_shape((shape[0], shape[1]))
        .expect("grid shaped standard deviation");
    println!(
        "std in [{:.3}, {:.3}]",
        sd.fold(f64::INFINITY, |a, &b| a.min(b)),
        sd.fold(0., |a: f64, &b| a.max(b))
    );

    std::fs::create_dir_all("target/mra").expect("output directory");
    write_npy("target/mra/y-pred.npy", &mean).expect("cannot save prediction");
    write_npy("target/mra/sd-pred.npy", &sd).expect("cannot save standard deviation");
    println!("Predictions saved in target/mra");
}
