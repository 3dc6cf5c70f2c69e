use crate::parameters::KnotSelection;
use ndarray_rand::rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

/// Selects up to `n_knots` knots among the point indices `assigned` to the node `node_id`.
///
/// Returns the knots and the remaining indices, both in the relative order of `assigned`.
/// When the node holds at most `n_knots` points, all of them become knots.
pub fn select_knots(
    assigned: &[usize],
    n_knots: usize,
    selection: KnotSelection,
    node_id: usize,
) -> (Vec<usize>, Vec<usize>) {
    let n = assigned.len();
    if n <= n_knots {
        return (assigned.to_vec(), vec![]);
    }

    let mut chosen = vec![false; n];
    match selection {
        KnotSelection::Evenly => {
            (0..n_knots).for_each(|i| chosen[i * n / n_knots] = true);
        }
        KnotSelection::Randomized { seed } => {
            let mut rng = Xoshiro256Plus::seed_from_u64(seed.wrapping_add(node_id as u64));
            let mut positions: Vec<usize> = (0..n).collect();
            positions.shuffle(&mut rng);
            positions[..n_knots].iter().for_each(|&p| chosen[p] = true);
        }
    }

    let (knots, rest): (Vec<_>, Vec<_>) = assigned
        .iter()
        .zip(chosen)
        .partition(|(_, is_knot)| *is_knot);
    (
        knots.into_iter().map(|(&i, _)| i).collect(),
        rest.into_iter().map(|(&i, _)| i).collect(),
    )
}
