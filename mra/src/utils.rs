use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2, Zip};

/// Computes euclidean distances between each row of x and each row of y
/// resulting in a 2d array of shape (nrows(x), nrows(y)).
///
/// *Panics* if x and y have not the same column numbers
pub fn pairwise_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.ncols() == y.ncols());

    let mut d = Array2::zeros((x.nrows(), y.nrows()));
    Zip::from(d.rows_mut())
        .and(x.rows())
        .for_each(|mut drow, xi| {
            Zip::from(&mut drow).and(y.rows()).for_each(|dij, yj| {
                *dij = Zip::from(&xi)
                    .and(&yj)
                    .fold(F::zero(), |acc, &a, &b| acc + (a - b) * (a - b))
                    .sqrt();
            });
        });
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_pairwise_distances() {
        let x = array![[0., 0.], [1., 1.]];
        let y = array![[0., 1.], [3., 4.], [1., 1.]];
        let expected = array![
            [1., 5., f64::sqrt(2.)],
            [1., f64::sqrt(13.), 0.]
        ];
        assert_abs_diff_eq!(expected, pairwise_distances(&x, &y), epsilon = 1e-12);
    }

    #[test]
    fn test_pairwise_distances_empty() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = array![[0., 1.]];
        assert_eq!(pairwise_distances(&x, &y).dim(), (0, 1));
        assert_eq!(pairwise_distances(&y, &x).dim(), (1, 0));
    }
}
