//! Heuristic sentence scoring used when the primary algorithm cannot rank

/// Score sentences by length preference times position preference
///
/// Length peaks between 10 and 30 words; position decays by at most 30%
/// from the first sentence to the last.
pub fn heuristic_scores(sentences: &[String]) -> Vec<f64> {
    let n = sentences.len() as f64;
    sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let words = sentence.split_whitespace().count() as f64;
            let length_score = if words < 30.0 {
                (words / 30.0).min(1.0)
            } else {
                (1.0 - (words - 30.0) / 50.0).max(0.5)
            };
            let position_score = 1.0 - (i as f64 / n) * 0.3;
            length_score * position_score
        })
        .collect()
}

/// Indices of the `count` best-scored entries, best first
///
/// Ties keep document order.
pub fn top_indices(scores: &[f64], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(count);
    order
}
