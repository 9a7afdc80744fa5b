use crate::error::{RecError, Result};
use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw interaction record as it arrives from the outside world. Ids are
/// signed and the weight unconstrained so invalid input is representable
/// and can be rejected instead of panicking at parse time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawInteraction {
    pub user_id: i64,
    pub item_id: i64,
    pub weight: f64,
}

/// Validated interaction: non-negative ids, finite positive weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: u32,
    pub item_id: u32,
    pub weight: f32,
}

impl RawInteraction {
    pub fn new(user_id: i64, item_id: i64, weight: f64) -> Self {
        Self {
            user_id,
            item_id,
            weight,
        }
    }

    pub fn validate(&self) -> Result<Interaction> {
        if self.user_id < 0 || self.user_id > u32::MAX as i64 {
            return Err(RecError::InvalidRecord(format!(
                "user id {} out of range",
                self.user_id
            )));
        }
        if self.item_id < 0 || self.item_id > u32::MAX as i64 {
            return Err(RecError::InvalidRecord(format!(
                "item id {} out of range",
                self.item_id
            )));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(RecError::InvalidRecord(format!(
                "weight {} must be a finite positive number",
                self.weight
            )));
        }
        Ok(Interaction {
            user_id: self.user_id as u32,
            item_id: self.item_id as u32,
            weight: self.weight as f32,
        })
    }
}

/// Sparse user-by-item interaction matrix in CSR form. Immutable once
/// built; duplicate (user, item) pairs are summed at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionMatrix {
    n_users: usize,
    n_items: usize,
    indptr: Vec<usize>,
    indices: Vec<u32>,
    data: Vec<f32>,
}

impl InteractionMatrix {
    /// Builds the matrix from accumulated (user, item) -> weight entries.
    /// Shapes are max observed id + 1.
    pub fn from_accumulated(entries: BTreeMap<(u32, u32), f32>) -> Self {
        let n_users = entries
            .keys()
            .map(|&(u, _)| u as usize + 1)
            .max()
            .unwrap_or(0);
        let n_items = entries
            .keys()
            .map(|&(_, i)| i as usize + 1)
            .max()
            .unwrap_or(0);

        let mut indptr = Vec::with_capacity(n_users + 1);
        let mut indices = Vec::with_capacity(entries.len());
        let mut data = Vec::with_capacity(entries.len());

        indptr.push(0);
        let mut row = 0usize;
        // BTreeMap iteration is ordered by (user, item), so rows come out
        // in order with ascending item indices inside each row.
        for (&(u, i), &w) in &entries {
            while row < u as usize {
                indptr.push(indices.len());
                row += 1;
            }
            indices.push(i);
            data.push(w);
        }
        while row < n_users {
            indptr.push(indices.len());
            row += 1;
        }

        Self {
            n_users,
            n_items,
            indptr,
            indices,
            data,
        }
    }

    pub fn n_users(&self) -> usize {
        self.n_users
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Item ids and weights observed for one user row.
    pub fn row(&self, row: usize) -> (&[u32], &[f32]) {
        let start = self.indptr[row];
        let end = self.indptr[row + 1];
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Item-major copy of the matrix, used for the item half-step of ALS.
    pub fn transposed(&self) -> InteractionMatrix {
        let mut counts = vec![0usize; self.n_items];
        for &i in &self.indices {
            counts[i as usize] += 1;
        }

        let mut indptr = Vec::with_capacity(self.n_items + 1);
        let mut offset = 0usize;
        indptr.push(0);
        for c in &counts {
            offset += c;
            indptr.push(offset);
        }

        let mut cursor = indptr[..self.n_items].to_vec();
        let mut indices = vec![0u32; self.nnz()];
        let mut data = vec![0f32; self.nnz()];
        for user in 0..self.n_users {
            let (items, weights) = self.row(user);
            for (&item, &w) in items.iter().zip(weights) {
                let pos = cursor[item as usize];
                indices[pos] = user as u32;
                data[pos] = w;
                cursor[item as usize] += 1;
            }
        }

        InteractionMatrix {
            n_users: self.n_items,
            n_items: self.n_users,
            indptr,
            indices,
            data,
        }
    }

    /// Sorted seen-item lists per user, carried into the trained model so
    /// the serving side can honor exclude_seen without the raw events.
    pub fn user_item_lists(&self) -> Vec<Vec<u32>> {
        (0..self.n_users).map(|u| self.row(u).0.to_vec()).collect()
    }
}

/// Training hyperparameters. Defaults follow the common implicit-ALS
/// setup: 64 factors, lambda 0.01, 20 iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub factors: usize,
    pub regularization: f32,
    pub iterations: usize,
    pub seed: Option<u64>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            factors: 64,
            regularization: 0.01,
            iterations: 20,
            seed: None,
        }
    }
}

impl Hyperparameters {
    pub fn validate(&self) -> Result<()> {
        if self.factors == 0 {
            return Err(RecError::InvalidHyperparameter(
                "factors must be positive".to_string(),
            ));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(RecError::InvalidHyperparameter(format!(
                "regularization {} must be a non-negative finite number",
                self.regularization
            )));
        }
        if self.iterations == 0 {
            return Err(RecError::InvalidHyperparameter(
                "iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trained factor model: dense user and item factors plus the per-user
/// seen-item lists. Read-only once built; a retrain replaces it wholesale.
#[derive(Debug, Clone)]
pub struct FactorModel {
    pub params: Hyperparameters,
    pub user_factors: DMatrix<f32>,
    pub item_factors: DMatrix<f32>,
    pub user_items: Vec<Vec<u32>>,
    pub trained_at: DateTime<Utc>,
}

impl FactorModel {
    pub fn n_users(&self) -> usize {
        self.user_factors.nrows()
    }

    pub fn n_items(&self) -> usize {
        self.item_factors.nrows()
    }

    pub fn factors(&self) -> usize {
        self.user_factors.ncols()
    }

    /// Affinity score: dot product of the user and item factor rows.
    pub fn score(&self, user_id: u32, item_id: u32) -> f32 {
        self.user_factors
            .row(user_id as usize)
            .dot(&self.item_factors.row(item_id as usize))
    }

    pub fn seen(&self, user_id: u32, item_id: u32) -> bool {
        self.user_items[user_id as usize]
            .binary_search(&item_id)
            .is_ok()
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: u32,
    pub score: f32,
}

/// Ingestion outcome: how many records were accepted, how many were
/// skipped as invalid, and the observed matrix shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub skipped: usize,
    pub n_users: usize,
    pub n_items: usize,
}
