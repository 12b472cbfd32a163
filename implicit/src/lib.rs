//! This crate implements a recommender for _implicit feedback_ in pure Rust: purchase counts,
//! clicks or plays, where a zero means "we don't know" rather than "disliked".
//!
//! The model is the weighted Alternating Least Squares of Hu, Koren and Volinsky, which treats
//! every interaction as a binary preference held with a confidence that grows with the count.
//! Around it, this crate gives you what an offline experiment needs: a reproducible train/test
//! split that hides a fraction of the interactions, the mean AUC of the model against a
//! popularity baseline and top-N recommendations for a user.
//!
//! To get to know more about the algorithm, please check the references below:
//! * <http://yifanhu.net/PUB/cf.pdf>: the original paper.
//! * <https://jessesw.com/Rec-System/>: a walk through the same pipeline on retail data.

mod als;
mod error;
mod evaluation;
mod hyperparameters;
mod index;
mod interactions;
mod recommend;
mod split;
mod utils;

pub use als::{fit, ConfidenceMatrix, FitReport, ImplicitModel};
pub use error::{ErrorKind, ImplicitError, Pass, Result};
pub use evaluation::{auc, mean_auc, AucReport};
pub use hyperparameters::{Hyperparameters, SingularPolicy};
pub use index::{IdIndex, ItemLookup};
pub use interactions::InteractionMatrix;
pub use recommend::{items_purchased, recommend, PurchasedItem, Recommendation};
pub use split::{split, TrainTestSplit};
pub use utils::Mask;

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    use nalgebra::dmatrix;

    fn toy_ratings() -> InteractionMatrix {
        InteractionMatrix::from_dense(&dmatrix![
            2.0, 0.0, 0.0, 1.0;
            0.0, 3.0, 0.0, 0.0;
            1.0, 0.0, 4.0, 0.0;
        ])
        .unwrap()
    }

    #[test]
    fn test_toy_pipeline() {
        let ratings = toy_ratings();
        let split = split(&ratings, 0.25, 0).unwrap();
        assert_eq!(split.training.nnz(), 3);

        let hyperparameters = Hyperparameters::default()
            .with_alpha(15.0)
            .with_iterations(10)
            .with_rank_size(2);
        let model = fit(&split.training, &hyperparameters).unwrap();
        assert_eq!(model.user_factors().shape(), (3, 2));
        assert_eq!(model.item_factors().shape(), (2, 4));
        assert_eq!(model.report().iterations, 10);

        // Every altered user keeps at least one hidden positive and one never-seen negative.
        let report = mean_auc(&split.training, &split.altered_users, &model, &split.test).unwrap();
        assert_eq!(report.evaluated_users, split.altered_users.len());
        assert_eq!(report.skipped_users, 0);
        assert!((0.0..=1.0).contains(&report.model_auc));
        assert!((0.0..=1.0).contains(&report.popularity_auc));

        let users = ["u0", "u1", "u2"]
            .into_iter()
            .map(str::to_owned)
            .collect::<IdIndex<_>>();
        let items = ["i0", "i1", "i2", "i3"]
            .into_iter()
            .map(str::to_owned)
            .collect::<IdIndex<_>>();
        let descriptions = items
            .iter()
            .map(|id| (id.clone(), id.to_uppercase()))
            .collect::<HashMap<_, _>>();

        for user_id in users.iter() {
            let user = users.position(user_id).unwrap();
            let recommendations = recommend(
                user_id,
                &split.training,
                &model,
                &users,
                &items,
                &descriptions,
                3,
            )
            .unwrap();
            let eligible = split.training.unobserved_in_row(user).count();

            assert_eq!(recommendations.len(), eligible.min(3));
            for recommendation in &recommendations {
                let item = items.position(&recommendation.item_id).unwrap();
                assert_eq!(split.training.get(user, item), 0.0);
                assert!((0.0..=1.0).contains(&recommendation.score));
            }
        }
    }

    #[test]
    fn test_block_structure_is_recovered() {
        // Two groups of users, each buying from its own group of items; one purchase per group
        // is hidden and should be ranked above the items of the other group.
        let ratings = InteractionMatrix::from_triplets(
            8,
            8,
            (0..8).flat_map(|user| {
                let group = user / 4;
                (0..8)
                    .filter(move |item| item / 4 == group && (user + item) % 4 != 0)
                    .map(move |item| (user, item, 1.0 + (user % 3) as f64))
            }),
        )
        .unwrap();
        let training = ratings.without_positions(&[(1, 0), (6, 5)]);

        let hyperparameters = Hyperparameters::default()
            .with_alpha(15.0)
            .with_iterations(15)
            .with_rank_size(2)
            .with_seed(7);
        let model = fit(&training, &hyperparameters).unwrap();
        let report = mean_auc(&training, &[1, 6], &model, &ratings.binarized()).unwrap();

        assert_eq!(report.evaluated_users, 2);
        assert!(report.model_auc > 0.5, "{report:?}");
    }
}
