use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ImplicitError, Pass, Result};
use crate::hyperparameters::{Hyperparameters, SingularPolicy};
use crate::interactions::InteractionMatrix;
use crate::utils::standard_noise_matrix;

/// The confidence `C - I = alpha * R` of a training matrix, kept sparse and available both
/// by user (rows) and by item (columns). The `+ 1` of `C = 1 + alpha * R` is added back
/// inside every least squares solve.
#[derive(Debug, Clone)]
pub struct ConfidenceMatrix<'a> {
    by_user: &'a InteractionMatrix,
    by_item: InteractionMatrix,
    alpha: f64,
}

impl<'a> ConfidenceMatrix<'a> {
    pub fn new(training: &'a InteractionMatrix, alpha: f64) -> ConfidenceMatrix<'a> {
        ConfidenceMatrix {
            by_user: training,
            by_item: training.transpose(),
            alpha,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn n_users(&self) -> usize {
        self.by_user.n_rows()
    }

    pub fn n_items(&self) -> usize {
        self.by_user.n_cols()
    }

    /// The interactions walked by one side of the factorization: users x items for the user
    /// pass, items x users for the item pass.
    fn observations(&self, pass: Pass) -> &InteractionMatrix {
        match pass {
            Pass::Users => self.by_user,
            Pass::Items => &self.by_item,
        }
    }
}

/// Bookkeeping of a fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Completed alternations (one user pass plus one item pass each).
    pub iterations: usize,
    /// Rows whose system was singular and were replaced by a zero vector.
    pub fallback_rows: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
struct ImplicitModelInner {
    /// `n_users x rank_size`.
    user_factors: DMatrix<f64>,
    /// `rank_size x n_items`, so that a score is a row of the first times a column of this one.
    item_factors: DMatrix<f64>,
    report: FitReport,
}

/// A factorization of an implicit-feedback matrix into user and item latent vectors, following
/// Hu, Koren and Volinsky, _Collaborative Filtering for Implicit Feedback Datasets_ (2008).
///
/// The model minimizes
/// ```text
/// sum_ui C_ui * (P_ui - x_u . y_i)^2 + lambda * (|X|^2 + |Y|^2)
/// C = 1 + alpha * R
/// P = (R != 0)
/// ```
/// by alternating closed-form ridge regressions, one per user given the items and one per item
/// given the users.
///
/// A model is immutable and cheap to clone.
#[derive(Debug, Clone)]
pub struct ImplicitModel(Arc<ImplicitModelInner>);

impl ImplicitModel {
    /// Creates a model from user factors (`n_users x rank_size`) and item factors
    /// (`rank_size x n_items`).
    ///
    /// # Panics
    ///
    /// This function panics if both matrices disagree on the rank size.
    pub fn new(user_factors: DMatrix<f64>, item_factors: DMatrix<f64>) -> ImplicitModel {
        assert_eq!(
            user_factors.ncols(),
            item_factors.nrows(),
            "user and item factors must share the rank size"
        );

        ImplicitModel(Arc::new(ImplicitModelInner {
            user_factors,
            item_factors,
            report: FitReport::default(),
        }))
    }

    /// Creates a random __untrained__ model for a training matrix. User factors are drawn first
    /// and item factors next, both from a standard normal stream seeded with `seed`.
    pub fn init(rank_size: usize, training: &InteractionMatrix, seed: u64) -> ImplicitModel {
        let mut rng = StdRng::seed_from_u64(seed);
        let user_factors = standard_noise_matrix(training.n_rows(), rank_size, &mut rng);
        let item_factors = standard_noise_matrix(training.n_cols(), rank_size, &mut rng);

        ImplicitModel::new(user_factors, item_factors.transpose())
    }

    /// Trains a model on `training` with a fixed number of alternations.
    ///
    /// # Errors
    ///
    /// Fails on invalid hyperparameters and, under [`SingularPolicy::Fail`], on the first
    /// singular least squares system.
    pub fn fit(
        training: &InteractionMatrix,
        hyperparameters: &Hyperparameters,
    ) -> Result<ImplicitModel> {
        hyperparameters.validate()?;
        let start = Instant::now();

        tracing::info!(
            users = training.n_rows(),
            items = training.n_cols(),
            interactions = training.nnz(),
            rank_size = hyperparameters.rank_size(),
            iterations = hyperparameters.iterations(),
            "fitting implicit ALS"
        );

        let confidence = ConfidenceMatrix::new(training, hyperparameters.alpha());
        let mut model = ImplicitModel::init(
            hyperparameters.rank_size(),
            training,
            hyperparameters.seed(),
        );

        for iteration in 0..hyperparameters.iterations() {
            let iteration_start = Instant::now();
            model = model.iterate(&confidence, hyperparameters)?;
            tracing::debug!(
                iteration = iteration + 1,
                elapsed_ms = iteration_start.elapsed().as_millis() as u64,
                "ALS iteration done"
            );
        }

        Arc::make_mut(&mut model.0).report.elapsed = start.elapsed();
        tracing::info!(
            elapsed_ms = model.report().elapsed.as_millis() as u64,
            fallback_rows = model.report().fallback_rows,
            "implicit ALS fitted"
        );

        Ok(model)
    }

    /// Makes one alternation: solves every user against the current items, then every item
    /// against the just-solved users. Each pass reads a frozen copy of the other side and the
    /// new factors only replace the old ones once the whole pass is done.
    #[must_use = "iterate returns a new model"]
    pub fn iterate(
        &self,
        confidence: &ConfidenceMatrix,
        hyperparameters: &Hyperparameters,
    ) -> Result<ImplicitModel> {
        if (confidence.n_users(), confidence.n_items()) != (self.n_users(), self.n_items()) {
            return Err(ImplicitError::ShapeMismatch {
                what: "confidence matrix",
                expected: (self.n_users(), self.n_items()),
                actual: (confidence.n_users(), confidence.n_items()),
            });
        }

        let solve = |pass, fixed: &DMatrix<f64>| {
            solve_pass(
                pass,
                fixed,
                confidence.observations(pass),
                confidence.alpha(),
                hyperparameters.lambda(),
                hyperparameters.singular_policy(),
            )
        };

        let users = solve(Pass::Users, &self.0.item_factors)?;
        let items = solve(Pass::Items, &users.factors)?;

        Ok(ImplicitModel(Arc::new(ImplicitModelInner {
            user_factors: users.factors.transpose(),
            item_factors: items.factors,
            report: FitReport {
                iterations: self.0.report.iterations + 1,
                fallback_rows: self.0.report.fallback_rows
                    + users.fallback_rows
                    + items.fallback_rows,
                elapsed: self.0.report.elapsed,
            },
        })))
    }

    /// The user factors `X`, one row per user.
    pub fn user_factors(&self) -> &DMatrix<f64> {
        &self.0.user_factors
    }

    /// The item factors `Y^T`, one column per item.
    pub fn item_factors(&self) -> &DMatrix<f64> {
        &self.0.item_factors
    }

    pub fn rank_size(&self) -> usize {
        self.0.user_factors.ncols()
    }

    pub fn n_users(&self) -> usize {
        self.0.user_factors.nrows()
    }

    pub fn n_items(&self) -> usize {
        self.0.item_factors.ncols()
    }

    pub fn report(&self) -> &FitReport {
        &self.0.report
    }

    /// The predicted preference of `user` for `item`.
    ///
    /// # Panics
    ///
    /// This function panics if `user` or `item` is out of bounds.
    pub fn predict(&self, user: usize, item: usize) -> f64 {
        self.0
            .user_factors
            .row(user)
            .tr_dot(&self.0.item_factors.column(item))
    }

    /// The predicted preference of `user` for every item.
    ///
    /// # Panics
    ///
    /// This function panics if `user` is out of bounds.
    pub fn user_scores(&self, user: usize) -> DVector<f64> {
        self.0
            .item_factors
            .tr_mul(&self.0.user_factors.row(user).transpose())
    }

    /// The value of the training objective for this model. Cells without interactions are
    /// accounted for through `trace(X^T X Y Y^T)`, so this never materializes the dense
    /// prediction matrix.
    pub fn confidence_weighted_loss(
        &self,
        training: &InteractionMatrix,
        hyperparameters: &Hyperparameters,
    ) -> f64 {
        let user_factors = &self.0.user_factors;
        let item_factors = &self.0.item_factors;

        let all_cells = (user_factors.transpose() * user_factors)
            .component_mul(&(item_factors * item_factors.transpose()))
            .sum();
        let observed_cells = (0..training.n_rows())
            .map(|user| {
                training
                    .row(user)
                    .map(|(item, value)| {
                        let prediction = self.predict(user, item);
                        let confidence = 1.0 + hyperparameters.alpha() * value;
                        confidence * (1.0 - prediction).powi(2) - prediction.powi(2)
                    })
                    .sum::<f64>()
            })
            .sum::<f64>();
        let regularization = hyperparameters.lambda()
            * (user_factors.norm_squared() + item_factors.norm_squared());

        all_cells + observed_cells + regularization
    }
}

/// Fits an implicit ALS model. See [`ImplicitModel::fit`].
pub fn fit(
    training: &InteractionMatrix,
    hyperparameters: &Hyperparameters,
) -> Result<ImplicitModel> {
    ImplicitModel::fit(training, hyperparameters)
}

struct PassOutcome {
    /// `rank_size x n_rows` of the solved side.
    factors: DMatrix<f64>,
    fallback_rows: usize,
}

/// Solves the ridge regression of every row of `observations` against the `fixed` factors
/// (`rank_size x n_cols`, one column per counterpart).
fn solve_pass(
    pass: Pass,
    fixed: &DMatrix<f64>,
    observations: &InteractionMatrix,
    alpha: f64,
    lambda: f64,
    policy: SingularPolicy,
) -> Result<PassOutcome> {
    let rank_size = fixed.nrows();
    let gram = fixed * fixed.transpose();

    let solutions = (0..observations.n_rows())
        .into_par_iter()
        .map_init(
            || Scratch::new(rank_size),
            |scratch, index| scratch.solve(&gram, fixed, observations.row(index), alpha, lambda),
        )
        .collect::<Vec<_>>();

    let mut factors = DMatrix::zeros(rank_size, observations.n_rows());
    let mut fallback_rows = 0;

    for (index, solution) in solutions.into_iter().enumerate() {
        match (solution, policy) {
            (Some(solution), _) => factors.set_column(index, &solution),
            (None, SingularPolicy::Fail) => {
                return Err(ImplicitError::SingularSystem { pass, index });
            }
            (None, SingularPolicy::ZeroRow) => {
                tracing::debug!(%pass, index, "singular system, using a zero factor vector");
                fallback_rows += 1;
            }
        }
    }

    if fallback_rows > 0 {
        tracing::warn!(%pass, fallback_rows, "zeroed factors of singular systems");
    }

    Ok(PassOutcome {
        factors,
        fallback_rows,
    })
}

/// Per-thread buffers for the `rank_size x rank_size` system and its right-hand side, reused
/// from one row to the next.
struct Scratch {
    system: DMatrix<f64>,
    rhs: DVector<f64>,
}

impl Scratch {
    fn new(rank_size: usize) -> Scratch {
        Scratch {
            system: DMatrix::zeros(rank_size, rank_size),
            rhs: DVector::zeros(rank_size),
        }
    }

    /// Solves `(F F^T + F (C - I) F^T + lambda I) x = F C p` for one row, where `F` is `fixed`.
    /// Only the observed entries contribute to the data terms, since `C - I` and `p` are zero
    /// everywhere else. Returns `None` if the system is singular.
    fn solve<I>(
        &mut self,
        gram: &DMatrix<f64>,
        fixed: &DMatrix<f64>,
        row: I,
        alpha: f64,
        lambda: f64,
    ) -> Option<DVector<f64>>
    where
        I: Iterator<Item = (usize, f64)>,
    {
        self.system.copy_from(gram);
        for diagonal in 0..self.system.nrows() {
            self.system[(diagonal, diagonal)] += lambda;
        }
        self.rhs.fill(0.0);

        for (counterpart, value) in row {
            let confidence = alpha * value;
            let factor = fixed.column(counterpart);
            self.system.ger(confidence, &factor, &factor, 1.0);
            self.rhs.axpy(confidence + 1.0, &factor, 1.0);
        }

        // The decomposition takes the buffer over and hands it back once solved.
        let rank_size = self.system.nrows();
        let system = std::mem::replace(&mut self.system, DMatrix::zeros(0, 0));
        let Some(cholesky) = system.cholesky() else {
            self.system = DMatrix::zeros(rank_size, rank_size);
            return None;
        };
        cholesky.solve_mut(&mut self.rhs);
        self.system = cholesky.unpack_dirty();

        self.rhs
            .iter()
            .all(|xi| xi.is_finite())
            .then(|| self.rhs.clone())
    }
}
