use super::labels::LabelSet;
use crate::pipeline::types::{LabelScore, RankedPrediction};

/// Pair every score with its label and sort highest first.
///
/// Non-finite scores count as `0.0`. The sort is stable, so equal scores
/// keep label order.
pub fn rank(labels: &LabelSet, scores: &[f32]) -> RankedPrediction {
    let mut ranked: RankedPrediction = labels
        .iter()
        .zip(scores)
        .map(|(label, &score)| LabelScore {
            label: label.clone(),
            score: if score.is_finite() { score } else { 0.0 },
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
