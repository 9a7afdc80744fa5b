pub mod initializer;
pub mod solver;

use crate::error::{RecError, Result};
use crate::models::{FactorModel, Hyperparameters, InteractionMatrix};
use chrono::Utc;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::info;

/// Implicit-feedback alternating least squares.
///
/// Interactions are treated as confidence signals (c = 1 + weight) over a
/// binary preference (p = 1 for every observed pair), and the engine
/// alternates closed-form regularized solves for the user and item factor
/// matrices. Runs exactly `iterations` rounds; there is no convergence
/// based early exit, so a fixed seed gives reproducible output.
#[derive(Debug, Clone)]
pub struct AlternatingLeastSquares {
    params: Hyperparameters,
}

impl AlternatingLeastSquares {
    pub fn new(params: Hyperparameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn fit(&self, matrix: &InteractionMatrix) -> Result<FactorModel> {
        if matrix.nnz() == 0 {
            return Err(RecError::EmptyInteractionMatrix);
        }

        let seed = self
            .params
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen());
        info!(
            "training {}x{} matrix ({} entries), factors={}, lambda={}, iterations={}, seed={}",
            matrix.n_users(),
            matrix.n_items(),
            matrix.nnz(),
            self.params.factors,
            self.params.regularization,
            self.params.iterations,
            seed
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let mut user_factors =
            initializer::xavier_uniform_matrix(&mut rng, matrix.n_users(), self.params.factors);
        let mut item_factors =
            initializer::xavier_uniform_matrix(&mut rng, matrix.n_items(), self.params.factors);

        let transposed = matrix.transposed();
        for iteration in 0..self.params.iterations {
            user_factors = self.solve_side(matrix, &item_factors);
            item_factors = self.solve_side(&transposed, &user_factors);

            let loss = observed_loss(
                matrix,
                &user_factors,
                &item_factors,
                self.params.regularization,
            );
            info!(
                "iteration {}/{}: observed loss {:.6}",
                iteration + 1,
                self.params.iterations,
                loss
            );
        }

        Ok(FactorModel {
            params: Hyperparameters {
                seed: Some(seed),
                ..self.params
            },
            user_factors,
            item_factors,
            user_items: matrix.user_item_lists(),
            trained_at: Utc::now(),
        })
    }

    /// One half-step: fixing `fixed`, solve every row of the other side.
    ///
    /// For row u with observed columns I_u this solves
    ///   (YtY + lambda*I + sum_{i in I_u} (c_ui - 1) y_i y_i^T) x_u
    ///     = sum_{i in I_u} c_ui y_i
    /// which is the implicit-feedback normal equation with p_ui = 1.
    /// Rows are independent, so they solve in parallel; each row's result
    /// does not depend on scheduling.
    fn solve_side(&self, interactions: &InteractionMatrix, fixed: &DMatrix<f32>) -> DMatrix<f32> {
        let f = self.params.factors;
        let gram = fixed.transpose() * fixed;
        let base = &gram + DMatrix::identity(f, f) * self.params.regularization;

        let rows: Vec<DVector<f32>> = (0..interactions.n_users())
            .into_par_iter()
            .map(|r| {
                let (cols, weights) = interactions.row(r);
                if cols.is_empty() {
                    // No observations: the normal equation is homogeneous.
                    return DVector::zeros(f);
                }

                let mut a = base.clone();
                let mut b = DVector::zeros(f);
                for (&j, &w) in cols.iter().zip(weights) {
                    let confidence = 1.0 + w;
                    let y = fixed.row(j as usize).transpose();
                    a += (&y * y.transpose()) * (confidence - 1.0);
                    b += &y * confidence;
                }
                solver::solve_spd(a, b)
            })
            .collect();

        DMatrix::from_fn(interactions.n_users(), f, |r, c| rows[r][c])
    }
}

/// Confidence-weighted squared error over the observed entries plus the
/// regularization term. A proxy for the full implicit objective (which
/// also sums every unobserved cell); cheap enough to log per iteration.
pub fn observed_loss(
    matrix: &InteractionMatrix,
    user_factors: &DMatrix<f32>,
    item_factors: &DMatrix<f32>,
    regularization: f32,
) -> f64 {
    let mut loss = 0.0f64;
    for user in 0..matrix.n_users() {
        let (items, weights) = matrix.row(user);
        let u = user_factors.row(user);
        for (&item, &w) in items.iter().zip(weights) {
            let prediction = u.dot(&item_factors.row(item as usize));
            let err = 1.0 - prediction;
            loss += (1.0 + w) as f64 * (err * err) as f64;
        }
    }

    let reg: f64 = user_factors.iter().map(|v| (v * v) as f64).sum::<f64>()
        + item_factors.iter().map(|v| (v * v) as f64).sum::<f64>();
    loss + regularization as f64 * reg
}
