//! Scoring helpers: cosine similarity, weighted reciprocal rank fusion and
//! FTS5 query construction.

use super::VectorStoreError;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

pub fn encode_embedding(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_embedding(doc_id: &str, blob: &[u8]) -> Result<Vec<f32>, VectorStoreError> {
    if blob.is_empty() || blob.len() % 4 != 0 {
        return Err(VectorStoreError::InvalidEmbedding {
            doc_id: doc_id.to_string(),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

pub fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Zero vectors score 0 against everything.
pub fn cosine_similarity(a: &[f32], a_norm: f32, b: &[f32]) -> f64 {
    let b_norm = l2_norm(b);
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    f64::from(dot / (a_norm * b_norm))
}

/// `alpha / (k + rank_v) + (1 - alpha) / (k + rank_k)`. Ranks are 1-based; an
/// absent rank is substituted by `missing_rank`.
pub fn rrf_score(
    alpha: f64,
    vector_rank: Option<usize>,
    keyword_rank: Option<usize>,
    rrf_k: usize,
    missing_rank: usize,
) -> f64 {
    let k = rrf_k as f64;
    let vector_rank = vector_rank.unwrap_or(missing_rank) as f64;
    let keyword_rank = keyword_rank.unwrap_or(missing_rank) as f64;
    alpha / (k + vector_rank) + (1.0 - alpha) / (k + keyword_rank)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    pub alpha: f64,
    pub rrf_k: usize,
    pub missing_rank: usize,
}

/// Fuses two ranked id lists (best first) into `(id, score)` sorted by
/// descending score, ties broken by id.
pub fn fuse_rankings(
    vector_ranked: &[String],
    keyword_ranked: &[String],
    params: FusionParams,
) -> Vec<(String, f64)> {
    let vector_ranks = rank_map(vector_ranked);
    let keyword_ranks = rank_map(keyword_ranked);
    let ids = vector_ranked
        .iter()
        .chain(keyword_ranked)
        .map(String::as_str)
        .collect::<BTreeSet<_>>();

    let mut fused = ids
        .into_iter()
        .map(|id| {
            let score = rrf_score(
                params.alpha,
                vector_ranks.get(id).copied(),
                keyword_ranks.get(id).copied(),
                params.rrf_k,
                params.missing_rank,
            );
            (id.to_string(), score)
        })
        .collect::<Vec<_>>();
    sort_scored(&mut fused);
    fused
}

pub fn sort_scored(scored: &mut [(String, f64)]) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

fn rank_map(ranked: &[String]) -> HashMap<&str, usize> {
    let mut ranks = HashMap::with_capacity(ranked.len());
    for (index, id) in ranked.iter().enumerate() {
        ranks.entry(id.as_str()).or_insert(index + 1);
    }
    ranks
}

/// Quotes every word so user keywords cannot inject FTS5 syntax. Words are
/// OR-ed; `None` when nothing searchable remains.
pub fn fts_query(keyword: &str) -> Option<String> {
    let terms = keyword
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{term}\""))
        .collect::<Vec<_>>();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}
