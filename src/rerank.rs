//! Maximal Marginal Relevance reranking.
//!
//! Reorders a similarity-ranked candidate list to trade relevance against
//! diversity: `λ = 1` keeps the input order, `λ = 0` maximizes diversity
//! subject to greedy selection.

use crate::embed::cosine_similarity;
use crate::types::{Result, ScoredChunk, SeekError};

/// Rerank `candidates` (ordered by cosine distance to the query, smallest
/// first) with MMR. Output is a permutation of the input with the same
/// length. `lambda` outside `[0, 1]` is an input error.
pub fn mmr_rerank(candidates: Vec<ScoredChunk>, lambda: f32) -> Result<Vec<ScoredChunk>> {
    if !(0.0..=1.0).contains(&lambda) || lambda.is_nan() {
        return Err(SeekError::input(format!(
            "diversity must be within [0, 1], got {lambda}"
        )));
    }
    if candidates.len() <= 1 {
        return Ok(candidates);
    }

    let mut remaining: Vec<ScoredChunk> = candidates;
    let mut selected: Vec<ScoredChunk> = Vec::with_capacity(remaining.len());

    // The top candidate is always kept first.
    selected.push(remaining.remove(0));

    while !remaining.is_empty() {
        let mut best_idx = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (i, candidate) in remaining.iter().enumerate() {
            let relevance = 1.0 - candidate.distance;
            let redundancy = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.chunk.embedding, &s.chunk.embedding))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if redundancy.is_finite() { redundancy } else { 0.0 };
            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            // strict > keeps selection stable, so λ = 1 reproduces the input
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }
        selected.push(remaining.remove(best_idx));
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn candidate(id: &str, distance: f32, embedding: Vec<f32>) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: id.to_string(),
                path: format!("/r/{id}.txt"),
                rel_path: format!("{id}.txt"),
                content_hash: "h".to_string(),
                chunk_index: 0,
                content: id.to_string(),
                embedding,
                start_line: 1,
                end_line: 1,
                ext: "txt".to_string(),
                created_at: String::new(),
            },
            distance,
        }
    }

    #[test]
    fn test_lambda_one_preserves_input_order() {
        let input = vec![
            candidate("a", 0.10, vec![1.0, 0.0]),
            candidate("b", 0.20, vec![1.0, 0.0]),
            candidate("c", 0.30, vec![1.0, 0.0]),
            candidate("d", 0.40, vec![1.0, 0.0]),
            candidate("e", 0.50, vec![1.0, 0.0]),
        ];
        let out = mmr_rerank(input, 1.0).unwrap();
        let ids: Vec<&str> = out.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_output_is_permutation_of_input() {
        let input = vec![
            candidate("a", 0.1, vec![1.0, 0.0]),
            candidate("b", 0.2, vec![0.99, 0.01]),
            candidate("c", 0.3, vec![0.0, 1.0]),
        ];
        let out = mmr_rerank(input, 0.5).unwrap();
        assert_eq!(out.len(), 3);
        let mut ids: Vec<&str> = out.iter().map(|c| c.chunk.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diversity_promotes_dissimilar_candidate() {
        // b is nearly identical to a; c is orthogonal but slightly less
        // relevant. With low lambda, c should jump ahead of b.
        let input = vec![
            candidate("a", 0.10, vec![1.0, 0.0]),
            candidate("b", 0.11, vec![1.0, 0.0]),
            candidate("c", 0.30, vec![0.0, 1.0]),
        ];
        let out = mmr_rerank(input, 0.2).unwrap();
        let ids: Vec<&str> = out.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_lambda_out_of_range_is_input_error() {
        assert!(matches!(
            mmr_rerank(vec![candidate("a", 0.1, vec![1.0])], 1.5).unwrap_err(),
            SeekError::Input(_)
        ));
        assert!(matches!(
            mmr_rerank(vec![candidate("a", 0.1, vec![1.0])], -0.1).unwrap_err(),
            SeekError::Input(_)
        ));
    }

    #[test]
    fn test_empty_and_singleton() {
        assert!(mmr_rerank(Vec::new(), 0.7).unwrap().is_empty());
        let out = mmr_rerank(vec![candidate("only", 0.2, vec![1.0])], 0.0).unwrap();
        assert_eq!(out.len(), 1);
    }
}
