use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::als::ImplicitModel;
use crate::error::{ImplicitError, Result};
use crate::interactions::InteractionMatrix;
use crate::utils::round3;

/// Area under the ROC curve of `scores` against binary `labels`: the probability that a random
/// positive is scored above a random negative, with ties counting one half.
///
/// Returns `None` when all labels belong to the same class, since the curve is then undefined.
///
/// # Panics
///
/// This function panics if `scores` and `labels` have different lengths.
pub fn auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    assert_eq!(scores.len(), labels.len(), "one label per score");

    let n_positives = labels.iter().filter(|&&label| label).count();
    let n_negatives = labels.len() - n_positives;
    if n_positives == 0 || n_negatives == 0 {
        return None;
    }

    let mut ranked = scores
        .iter()
        .copied()
        .map(OrderedFloat)
        .zip(labels.iter().copied())
        .collect::<Vec<_>>();
    ranked.sort_by_key(|&(score, _)| score);

    // Mann-Whitney: sum of the (tie-averaged, 1-based) ranks of the positives.
    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < ranked.len() {
        let end = start
            + ranked[start..]
                .iter()
                .take_while(|(score, _)| *score == ranked[start].0)
                .count();
        let average_rank = (start + end + 1) as f64 / 2.0;
        let positives_in_tie = ranked[start..end].iter().filter(|(_, label)| *label).count();
        positive_rank_sum += average_rank * positives_in_tie as f64;
        start = end;
    }

    let n_positives = n_positives as f64;
    let n_negatives = n_negatives as f64;
    let u_statistic = positive_rank_sum - n_positives * (n_positives + 1.0) / 2.0;

    Some(u_statistic / (n_positives * n_negatives))
}

/// Mean AUC of a model and of the popularity baseline over the users touched by a split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AucReport {
    /// Mean AUC of the model scores, rounded to three decimals.
    pub model_auc: f64,
    /// Mean AUC of ranking by item popularity, rounded to three decimals.
    pub popularity_auc: f64,
    pub evaluated_users: usize,
    /// Users whose candidate items were all positive or all negative.
    pub skipped_users: usize,
}

/// Computes the mean AUC by user, for every user that had interactions hidden from the
/// training set.
///
/// For each such user, only the items without a training interaction are ranked (those hidden
/// by the split plus those never interacted with), and the ranking is compared with the test
/// set. The baseline ranks the same items by their number of users in the test set, which is a
/// sanity floor the model should beat.
///
/// # Errors
///
/// Fails if the matrices or the model disagree on the shape, if an altered user is out of
/// bounds, or if no altered user has both hidden and never-seen candidates.
pub fn mean_auc(
    training: &InteractionMatrix,
    altered_users: &[usize],
    model: &ImplicitModel,
    test: &InteractionMatrix,
) -> Result<AucReport> {
    if test.shape() != training.shape() {
        return Err(ImplicitError::ShapeMismatch {
            what: "test matrix",
            expected: training.shape(),
            actual: test.shape(),
        });
    }
    if (model.n_users(), model.n_items()) != training.shape() {
        return Err(ImplicitError::ShapeMismatch {
            what: "model factors",
            expected: training.shape(),
            actual: (model.n_users(), model.n_items()),
        });
    }
    if let Some(&user) = altered_users.iter().find(|&&user| user >= training.n_rows()) {
        return Err(ImplicitError::OutOfBounds {
            row: user,
            col: 0,
            n_rows: training.n_rows(),
            n_cols: training.n_cols(),
        });
    }

    let popularity = test.column_sums();

    let per_user = altered_users
        .par_iter()
        .map(|&user| {
            let candidates = training.unobserved_in_row(user);
            let mut is_positive = vec![false; test.n_cols()];
            for &item in test.row_indices(user) {
                is_positive[item] = true;
            }

            let labels = candidates
                .filter(is_positive.iter().copied())
                .collect::<Vec<_>>();
            let model_scores = candidates.mask(&model.user_scores(user));
            let popularity_scores = candidates.mask(&popularity);

            auc(&model_scores, &labels).zip(auc(&popularity_scores, &labels))
        })
        .collect::<Vec<_>>();

    let evaluated = per_user.iter().flatten().copied().collect::<Vec<_>>();
    let skipped_users = per_user.len() - evaluated.len();

    if evaluated.is_empty() {
        return Err(ImplicitError::EvaluationDegenerate {
            skipped: skipped_users,
        });
    }
    if skipped_users > 0 {
        tracing::info!(skipped_users, "users with a single label class left out of the AUC");
    }

    let n_evaluated = evaluated.len() as f64;
    let model_auc = evaluated.iter().map(|(model, _)| model).sum::<f64>() / n_evaluated;
    let popularity_auc = evaluated.iter().map(|(_, popular)| popular).sum::<f64>() / n_evaluated;

    Ok(AucReport {
        model_auc: round3(model_auc),
        popularity_auc: round3(popularity_auc),
        evaluated_users: evaluated.len(),
        skipped_users,
    })
}
