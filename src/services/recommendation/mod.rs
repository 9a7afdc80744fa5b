use crate::error::{RecError, Result};
use crate::models::{FactorModel, Recommendation};
use crate::utils;
use std::sync::Arc;

/// Read-only query layer over a loaded factor model. Holds the model via
/// `Arc` and never mutates it, so any number of callers may query
/// concurrently; a retrain is published by swapping the whole service.
#[derive(Debug, Clone)]
pub struct RecommendationService {
    model: Arc<FactorModel>,
}

impl RecommendationService {
    pub fn new(model: Arc<FactorModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &FactorModel {
        &self.model
    }

    /// Top-k items for a user by factor dot product, descending score with
    /// ties broken by ascending item id. Items the user already interacted
    /// with are dropped when `exclude_seen` is set. k is clamped to
    /// [1, n_items].
    pub fn recommend_for_user(
        &self,
        user_id: u32,
        k: usize,
        exclude_seen: bool,
    ) -> Result<Vec<Recommendation>> {
        let model = &self.model;
        if user_id as usize >= model.n_users() {
            return Err(RecError::UnknownUser(user_id));
        }

        let k = k.clamp(1, model.n_items().max(1));
        let user = model.user_factors.row(user_id as usize);
        let scored = (0..model.n_items() as u32)
            .filter(|&item| !(exclude_seen && model.seen(user_id, item)))
            .map(|item| Recommendation {
                item_id: item,
                score: user.dot(&model.item_factors.row(item as usize)),
            })
            .collect();

        Ok(utils::top_k(scored, k))
    }

    /// Top-k most similar items by cosine similarity between item factor
    /// rows. The query item itself is excluded.
    pub fn similar_items(&self, item_id: u32, k: usize) -> Result<Vec<Recommendation>> {
        let model = &self.model;
        if item_id as usize >= model.n_items() {
            return Err(RecError::UnknownItem(item_id));
        }

        let k = k.clamp(1, model.n_items().max(1));
        let query = model.item_factors.row(item_id as usize);
        let query_norm = query.norm();
        let scored = (0..model.n_items() as u32)
            .filter(|&item| item != item_id)
            .map(|item| {
                let row = model.item_factors.row(item as usize);
                let norm = row.norm();
                let score = if query_norm == 0.0 || norm == 0.0 {
                    0.0
                } else {
                    query.dot(&row) / (query_norm * norm)
                };
                Recommendation {
                    item_id: item,
                    score,
                }
            })
            .collect();

        Ok(utils::top_k(scored, k))
    }
}
