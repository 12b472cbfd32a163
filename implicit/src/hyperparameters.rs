use serde_derive::{Deserialize, Serialize};

use crate::error::{ImplicitError, Result};

/// What to do when the least squares system of a single user or item cannot be solved (e.g.,
/// `lambda = 0` and a row without enough signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingularPolicy {
    /// Set the offending factor vector to zero and keep going. The number of affected rows is
    /// reported in [`crate::FitReport`].
    #[default]
    ZeroRow,
    /// Abort the whole fit with [`ImplicitError::SingularSystem`].
    Fail,
}

/// The knobs of the implicit weighted ALS. Defaults follow Hu, Koren and Volinsky (2008):
/// `lambda = 0.1`, `alpha = 40`, 10 iterations and 20 latent features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    lambda: f64,
    alpha: f64,
    iterations: usize,
    rank_size: usize,
    seed: u64,
    singular_policy: SingularPolicy,
}

impl Default for Hyperparameters {
    fn default() -> Hyperparameters {
        Hyperparameters {
            lambda: 0.1,
            alpha: 40.0,
            iterations: 10,
            rank_size: 20,
            seed: 0,
            singular_policy: SingularPolicy::ZeroRow,
        }
    }
}

impl Hyperparameters {
    /// Regularization strength. Increasing this value may increase bias but decrease variance.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Confidence scale, where `C = 1 + alpha * R`. Lower values flatten the difference
    /// between small and large interaction counts.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Number of alternations between the user and the item side.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Number of latent features per user and item.
    pub fn with_rank_size(mut self, rank_size: usize) -> Self {
        self.rank_size = rank_size;
        self
    }

    /// Seed for the initial factors.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_singular_policy(mut self, singular_policy: SingularPolicy) -> Self {
        self.singular_policy = singular_policy;
        self
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn rank_size(&self) -> usize {
        self.rank_size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn singular_policy(&self) -> SingularPolicy {
        self.singular_policy
    }

    /// Checks that the parameters describe a well-posed problem.
    pub fn validate(&self) -> Result<()> {
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            return Err(ImplicitError::invalid_parameter(
                "lambda",
                format!("must be finite and non-negative, got {}", self.lambda),
            ));
        }

        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ImplicitError::invalid_parameter(
                "alpha",
                format!("must be finite and non-negative, got {}", self.alpha),
            ));
        }

        if self.rank_size == 0 {
            return Err(ImplicitError::invalid_parameter(
                "rank_size",
                "needs at least one latent feature",
            ));
        }

        Ok(())
    }
}
