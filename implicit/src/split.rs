use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{ImplicitError, Result};
use crate::interactions::InteractionMatrix;

/// The outcome of hiding part of the observed interactions for offline evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    /// The original interactions with the sampled positions erased.
    pub training: InteractionMatrix,
    /// The full original interactions, binarized.
    pub test: InteractionMatrix,
    /// Users with at least one erased interaction, ascending and without repetitions.
    pub altered_users: Vec<usize>,
    /// The erased `(user, item)` positions, in sampling order.
    pub masked_positions: Vec<(usize, usize)>,
}

/// Hides `ceil(pct_test * nnz)` randomly chosen observed interactions of `ratings` from the
/// training set. The test set keeps every interaction as a binary preference, so the erased
/// ones can later be used to check whether the model ranks them high.
///
/// The sample is drawn without replacement from a generator seeded with `seed`: the same
/// arguments always produce the same split.
///
/// # Errors
///
/// Fails if `pct_test` is not in the open interval `(0, 1)`.
pub fn split(ratings: &InteractionMatrix, pct_test: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(pct_test > 0.0 && pct_test < 1.0) {
        return Err(ImplicitError::invalid_parameter(
            "pct_test",
            format!("must lie strictly between 0 and 1, got {pct_test}"),
        ));
    }

    let nonzero_positions = ratings.nonzero_positions();
    let num_samples =
        ((pct_test * nonzero_positions.len() as f64).ceil() as usize).min(nonzero_positions.len());

    let mut rng = StdRng::seed_from_u64(seed);
    let masked_positions = rand::seq::index::sample(&mut rng, nonzero_positions.len(), num_samples)
        .into_iter()
        .map(|position| nonzero_positions[position])
        .collect::<Vec<_>>();

    let mut altered_users = masked_positions
        .iter()
        .map(|&(user, _)| user)
        .collect::<Vec<_>>();
    altered_users.sort_unstable();
    altered_users.dedup();

    tracing::debug!(
        interactions = nonzero_positions.len(),
        masked = masked_positions.len(),
        altered_users = altered_users.len(),
        "split interactions"
    );

    Ok(TrainTestSplit {
        training: ratings.without_positions(&masked_positions),
        test: ratings.binarized(),
        altered_users,
        masked_positions,
    })
}

#[cfg(test)]
mod test {
    use nalgebra::dmatrix;

    use super::*;

    fn toy_ratings() -> InteractionMatrix {
        InteractionMatrix::from_dense(&dmatrix![
            2.0, 0.0, 0.0, 1.0;
            0.0, 3.0, 0.0, 0.0;
            1.0, 0.0, 4.0, 0.0;
        ])
        .unwrap()
    }

    fn larger_ratings() -> InteractionMatrix {
        InteractionMatrix::from_triplets(
            20,
            15,
            (0..20).flat_map(|user| {
                (0..15)
                    .filter(move |item| (user * 7 + item * 3) % 5 < 2)
                    .map(move |item| (user, item, 1.0 + ((user + item) % 4) as f64))
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_toy_scenario() {
        let ratings = toy_ratings();
        let split = split(&ratings, 0.25, 0).unwrap();

        // 5 observed interactions, ceil(0.25 * 5) = 2 of them are hidden.
        assert_eq!(split.masked_positions.len(), 2);
        assert_eq!(split.training.nnz(), 3);
        assert_eq!(split.test.nnz(), 5);
        assert_eq!(split.test, ratings.binarized());

        let mut users = split
            .masked_positions
            .iter()
            .map(|&(user, _)| user)
            .collect::<Vec<_>>();
        users.sort_unstable();
        users.dedup();
        assert_eq!(split.altered_users, users);
        assert!(!split.altered_users.is_empty() && split.altered_users.len() <= 2);
    }

    #[test]
    fn test_split_is_deterministic() {
        let ratings = larger_ratings();
        let first = split(&ratings, 0.2, 0).unwrap();
        let second = split(&ratings, 0.2, 0).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_masked_subset_law() {
        let ratings = larger_ratings();

        for seed in 0..5 {
            let split = split(&ratings, 0.2, seed).unwrap();
            let expected_masked = (0.2 * ratings.nnz() as f64).ceil() as usize;

            assert_eq!(ratings.nnz() - split.training.nnz(), expected_masked);
            for (user, item) in split.training.nonzero_positions() {
                assert_eq!(split.training.get(user, item), ratings.get(user, item));
            }
            for &(user, item) in &split.masked_positions {
                assert_ne!(ratings.get(user, item), 0.0);
                assert_eq!(split.training.get(user, item), 0.0);
            }

            let mut distinct = split.masked_positions.clone();
            distinct.sort_unstable();
            distinct.dedup();
            assert_eq!(distinct.len(), split.masked_positions.len());
        }
    }

    #[test]
    fn test_test_matrix_is_binary() {
        let ratings = larger_ratings();
        let split = split(&ratings, 0.3, 11).unwrap();

        for user in 0..ratings.n_rows() {
            for item in 0..ratings.n_cols() {
                let value = split.test.get(user, item);
                assert!(value == 0.0 || value == 1.0);
                assert_eq!(value == 1.0, ratings.get(user, item) != 0.0);
            }
        }
    }

    #[test]
    fn test_empty_ratings() {
        let split = split(&InteractionMatrix::empty(3, 4), 0.2, 0).unwrap();

        assert!(split.training.is_empty());
        assert!(split.test.is_empty());
        assert_eq!(split.training.shape(), (3, 4));
        assert!(split.altered_users.is_empty());
    }

    #[test]
    fn test_invalid_fraction() {
        let ratings = toy_ratings();
        assert!(split(&ratings, 0.0, 0).is_err());
        assert!(split(&ratings, 1.0, 0).is_err());
        assert!(split(&ratings, f64::NAN, 0).is_err());
    }
}
