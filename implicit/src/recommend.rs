use std::cmp::Reverse;
use std::fmt::Display;
use std::hash::Hash;

use ordered_float::OrderedFloat;
use serde_derive::{Deserialize, Serialize};

use crate::als::ImplicitModel;
use crate::error::{ImplicitError, Result};
use crate::index::{IdIndex, ItemLookup};
use crate::interactions::InteractionMatrix;
use crate::utils::min_max_scale;

/// An item suggested to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation<T> {
    pub item_id: T,
    pub description: String,
    /// The predicted preference, rescaled onto `[0, 1]` over all items.
    pub score: f64,
}

/// An item a user interacted with in the training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedItem<T> {
    pub item_id: T,
    pub description: String,
    pub quantity: f64,
}

/// Checks that the matrix, the model and both indices describe the same users and items.
fn check_dimensions<U, T>(
    training: &InteractionMatrix,
    model: Option<&ImplicitModel>,
    user_index: &IdIndex<U>,
    item_index: &IdIndex<T>,
) -> Result<()> {
    let indexed = (user_index.len(), item_index.len());
    if training.shape() != indexed {
        return Err(ImplicitError::ShapeMismatch {
            what: "training matrix",
            expected: indexed,
            actual: training.shape(),
        });
    }

    if let Some(model) = model {
        if (model.n_users(), model.n_items()) != indexed {
            return Err(ImplicitError::ShapeMismatch {
                what: "model factors",
                expected: indexed,
                actual: (model.n_users(), model.n_items()),
            });
        }
    }

    Ok(())
}

fn resolve_user<U>(user_id: &U, user_index: &IdIndex<U>) -> Result<usize>
where
    U: Clone + Eq + Hash + Display,
{
    user_index
        .position(user_id)
        .ok_or_else(|| ImplicitError::UnknownUser(user_id.to_string()))
}

fn describe<T, L>(item: usize, item_index: &IdIndex<T>, lookup: &L) -> Result<(T, String)>
where
    T: Clone + Display,
    L: ItemLookup<T> + ?Sized,
{
    let item_id = item_index
        .id(item)
        .ok_or_else(|| ImplicitError::UnknownItem(format!("#{item}")))?;
    let description = lookup
        .description(item_id)
        .ok_or_else(|| ImplicitError::UnknownItem(item_id.to_string()))?;

    Ok((item_id.clone(), description.to_owned()))
}

/// Suggests up to `num_items` items `user_id` never interacted with, best first.
///
/// Scores are the model predictions rescaled onto `[0, 1]`; items with a training interaction
/// are never returned. Equal scores keep the item order of `item_index`.
///
/// # Errors
///
/// Fails if the user is not indexed, if a suggested item has no description, or if the
/// training matrix, the model and the indices disagree on the number of users or items.
pub fn recommend<U, T, L>(
    user_id: &U,
    training: &InteractionMatrix,
    model: &ImplicitModel,
    user_index: &IdIndex<U>,
    item_index: &IdIndex<T>,
    lookup: &L,
    num_items: usize,
) -> Result<Vec<Recommendation<T>>>
where
    U: Clone + Eq + Hash + Display,
    T: Clone + Display,
    L: ItemLookup<T> + ?Sized,
{
    check_dimensions(training, Some(model), user_index, item_index)?;
    let user = resolve_user(user_id, user_index)?;

    let eligible = training.unobserved_in_row(user);
    let scores = eligible.fillna(&min_max_scale(&model.user_scores(user)));

    let mut ranked = eligible.selected().collect::<Vec<_>>();
    ranked.sort_by_key(|&item| Reverse(OrderedFloat(scores[item])));
    ranked.truncate(num_items);

    ranked
        .into_iter()
        .map(|item| {
            let (item_id, description) = describe(item, item_index, lookup)?;
            Ok(Recommendation {
                item_id,
                description,
                score: scores[item],
            })
        })
        .collect()
}

/// Lists what `user_id` interacted with in `training`, by item position.
///
/// # Errors
///
/// Fails if the user is not indexed, if an item has no description, or if the training matrix
/// and the indices disagree on the number of users or items.
pub fn items_purchased<U, T, L>(
    user_id: &U,
    training: &InteractionMatrix,
    user_index: &IdIndex<U>,
    item_index: &IdIndex<T>,
    lookup: &L,
) -> Result<Vec<PurchasedItem<T>>>
where
    U: Clone + Eq + Hash + Display,
    T: Clone + Display,
    L: ItemLookup<T> + ?Sized,
{
    check_dimensions(training, None, user_index, item_index)?;
    let user = resolve_user(user_id, user_index)?;

    training
        .row(user)
        .map(|(item, quantity)| {
            let (item_id, description) = describe(item, item_index, lookup)?;
            Ok(PurchasedItem {
                item_id,
                description,
                quantity,
            })
        })
        .collect()
}
