use std::collections::{HashMap, HashSet};

/// Offline ranking metrics over recommended item ids, used by the trainer
/// to report holdout quality.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    k: usize,
}

impl MetricsCalculator {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn precision_at_k(&self, recommended: &[u32], relevant: &[u32]) -> f64 {
        if recommended.is_empty() {
            return 0.0;
        }

        let relevant_set: HashSet<_> = relevant.iter().collect();
        let hits = recommended
            .iter()
            .take(self.k)
            .filter(|item| relevant_set.contains(item))
            .count();

        hits as f64 / self.k.min(recommended.len()) as f64
    }

    pub fn recall_at_k(&self, recommended: &[u32], relevant: &[u32]) -> f64 {
        if relevant.is_empty() {
            return 0.0;
        }

        let relevant_set: HashSet<_> = relevant.iter().collect();
        let hits = recommended
            .iter()
            .take(self.k)
            .filter(|item| relevant_set.contains(item))
            .count();

        hits as f64 / relevant.len() as f64
    }

    pub fn ndcg_at_k(&self, recommended: &[u32], relevant_scores: &HashMap<u32, f64>) -> f64 {
        let dcg = self.dcg(recommended, relevant_scores);
        let idcg = self.ideal_dcg(relevant_scores);

        if idcg == 0.0 {
            0.0
        } else {
            dcg / idcg
        }
    }

    fn dcg(&self, recommended: &[u32], relevant_scores: &HashMap<u32, f64>) -> f64 {
        recommended
            .iter()
            .take(self.k)
            .enumerate()
            .map(|(i, item_id)| {
                let relevance = relevant_scores.get(item_id).unwrap_or(&0.0);
                relevance / ((i + 2) as f64).log2()
            })
            .sum()
    }

    fn ideal_dcg(&self, relevant_scores: &HashMap<u32, f64>) -> f64 {
        let mut scores: Vec<f64> = relevant_scores.values().copied().collect();
        scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        scores
            .iter()
            .take(self.k)
            .enumerate()
            .map(|(i, &score)| score / ((i + 2) as f64).log2())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_counts_hits_in_the_top_k() {
        let calc = MetricsCalculator::new(3);
        let recommended = vec![1, 2, 3];
        let relevant = vec![1, 3];
        assert!((calc.precision_at_k(&recommended, &relevant) - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn recall_is_hits_over_relevant() {
        let calc = MetricsCalculator::new(3);
        let recommended = vec![1, 2, 3];
        let relevant = vec![1, 3];
        assert!((calc.recall_at_k(&recommended, &relevant) - 1.0).abs() < 1e-9);

        let relevant = vec![1, 3, 7, 9];
        assert!((calc.recall_at_k(&recommended, &relevant) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ndcg_is_one_for_a_perfect_ranking() {
        let calc = MetricsCalculator::new(3);
        let mut scores = HashMap::new();
        scores.insert(1, 1.0);
        scores.insert(2, 0.5);
        scores.insert(3, 0.2);

        let ndcg = calc.ndcg_at_k(&[1, 2, 3], &scores);
        assert!((ndcg - 1.0).abs() < 1e-9);

        let worse = calc.ndcg_at_k(&[3, 2, 1], &scores);
        assert!(worse < ndcg);
        assert!(worse > 0.0);
    }

    #[test]
    fn empty_inputs_produce_zero() {
        let calc = MetricsCalculator::new(5);
        assert_eq!(calc.precision_at_k(&[], &[1]), 0.0);
        assert_eq!(calc.recall_at_k(&[1], &[]), 0.0);
        assert_eq!(calc.ndcg_at_k(&[1], &HashMap::new()), 0.0);
    }
}
