use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    embedding::Embedder,
    error::Result,
    text_util::{self, PREVIEW_MAX_CHARS},
    vector_store::{RecordMetadata, SearchHit, VectorIndex},
};

/// Chunk hits fetched per requested result.
pub const OVERFETCH_FACTOR: usize = 10;

/// Upper bound on chunk hits fetched for one query.
pub const MAX_CANDIDATES: usize = 100;

/// Similarity above which a chunk counts towards coverage.
pub const COVERAGE_THRESHOLD: f64 = 0.6;

const TOP_K: usize = 3;
const SEMANTIC_WEIGHTS: [f64; TOP_K] = [0.5, 0.3, 0.2];
const SEMANTIC_FACTOR: f64 = 0.6;
const KEYWORD_FACTOR: f64 = 0.25;
const COVERAGE_CAP: usize = 5;
const COVERAGE_FACTOR: f64 = 0.15;
const RECENCY_WINDOW_DAYS: f64 = 365.0;
const RECENCY_FACTOR: f64 = 0.1;
const EXACT_MATCH_BONUS: f64 = 0.15;

/// A chunk that contributed to a file's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMatch {
    pub chunk_index: usize,
    pub similarity: f64,
}

/// One ranked file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub file_path: String,
    pub file_name: String,
    /// Preview of the most similar chunk.
    pub chunk_text: String,
    /// Cosine distance of the most similar chunk.
    pub distance: f64,
    pub score: f64,
    pub semantic_score: f64,
    pub keyword_score: f64,
    pub coverage_score: f64,
    pub recency_score: f64,
    pub has_exact_match: bool,
    pub matching_chunks: usize,
    pub chunks: Vec<ChunkMatch>,
    /// Metadata of the most similar chunk.
    pub metadata: RecordMetadata,
}

/// Embeds queries, retrieves chunk hits and ranks the files they belong to.
pub struct SearchEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorIndex>,
}

impl SearchEngine {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, store }
    }

    /// Top `limit` files for `query`, best first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<AggregatedResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_one(query)?;
        let candidates = (limit * OVERFETCH_FACTOR).min(MAX_CANDIDATES);
        let hits = self.store.query(&embedding, candidates)?;
        debug!(query, hits = hits.len(), "retrieved chunk hits");

        Ok(aggregate(query, &hits, limit, Utc::now()))
    }
}

struct FileGroup<'a> {
    best: &'a SearchHit,
    best_similarity: f64,
    similarities: Vec<f64>,
    keyword_scores: Vec<f64>,
    exact: bool,
    chunks: Vec<ChunkMatch>,
}

/// Group chunk hits by file and rank the files.
///
/// The score of a file blends:
///
/// - semantic: weighted mean of its top 3 similarities (0.5/0.3/0.2),
///   scaled by 0.6
/// - keyword: mean fraction of query terms found in its top 3 chunks,
///   scaled by 0.25
/// - coverage: up to 0.15 for chunks above 0.6 similarity, saturating at 5
/// - recency: up to 0.1, decaying linearly to zero over a year
/// - exact match: 0.15 if any chunk contains the whole query
///
/// Files with equal scores keep the order in which they first appear in
/// `hits`.
pub fn aggregate(
    query: &str,
    hits: &[SearchHit],
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<AggregatedResult> {
    if limit == 0 {
        return Vec::new();
    }

    let query_lower = query.to_lowercase();
    let terms = text_util::query_terms(query);

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, FileGroup> = HashMap::new();

    for hit in hits {
        let similarity = 1.0 - f64::from(hit.distance);
        let chunk_lower = hit.document.to_lowercase();
        let keyword = text_util::keyword_score(&terms, &chunk_lower);
        let exact = text_util::is_exact_match(&query_lower, &chunk_lower);
        let chunk = ChunkMatch {
            chunk_index: hit.metadata.chunk_index,
            similarity,
        };

        let path = hit.metadata.file_path.as_str();
        match groups.get_mut(path) {
            Some(group) => {
                if similarity > group.best_similarity {
                    group.best = hit;
                    group.best_similarity = similarity;
                }
                group.similarities.push(similarity);
                group.keyword_scores.push(keyword);
                group.exact |= exact;
                group.chunks.push(chunk);
            }
            None => {
                order.push(path);
                groups.insert(
                    path,
                    FileGroup {
                        best: hit,
                        best_similarity: similarity,
                        similarities: vec![similarity],
                        keyword_scores: vec![keyword],
                        exact,
                        chunks: vec![chunk],
                    },
                );
            }
        }
    }

    let mut results: Vec<AggregatedResult> = order
        .into_iter()
        .filter_map(|path| groups.remove(path))
        .map(|group| score_file(group, now))
        .collect();

    // stable: ties keep first-appearance order
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}

fn score_file(group: FileGroup, now: DateTime<Utc>) -> AggregatedResult {
    let semantic = semantic_score(&group.similarities);
    let keyword = top_k_mean(&group.keyword_scores);
    let coverage = coverage_score(&group.similarities);
    let recency = recency_score(&group.best.metadata.modified_time, now);
    let exact_bonus = if group.exact { EXACT_MATCH_BONUS } else { 0.0 };

    let score = semantic * SEMANTIC_FACTOR
        + keyword * KEYWORD_FACTOR
        + coverage
        + recency
        + exact_bonus;

    let best = group.best;
    AggregatedResult {
        file_path: best.metadata.file_path.clone(),
        file_name: best.metadata.file_name.clone(),
        chunk_text: text_util::preview(&best.document, PREVIEW_MAX_CHARS),
        distance: f64::from(best.distance),
        score,
        semantic_score: semantic,
        keyword_score: keyword,
        coverage_score: coverage,
        recency_score: recency,
        has_exact_match: group.exact,
        matching_chunks: group.chunks.len(),
        chunks: group.chunks,
        metadata: best.metadata.clone(),
    }
}

fn sorted_desc(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
}

/// Weighted mean of the top similarities, weights renormalised to the
/// number of values available.
pub fn semantic_score(similarities: &[f64]) -> f64 {
    let top = sorted_desc(similarities);
    let k = top.len().min(TOP_K);
    if k == 0 {
        return 0.0;
    }
    let weights = &SEMANTIC_WEIGHTS[..k];
    let weighted: f64 = top.iter().zip(weights).map(|(s, w)| s * w).sum();
    weighted / weights.iter().sum::<f64>()
}

fn top_k_mean(values: &[f64]) -> f64 {
    let top = sorted_desc(values);
    let k = top.len().min(TOP_K);
    if k == 0 {
        return 0.0;
    }
    top[..k].iter().sum::<f64>() / k as f64
}

pub fn coverage_score(similarities: &[f64]) -> f64 {
    let above = similarities
        .iter()
        .filter(|s| **s > COVERAGE_THRESHOLD)
        .count()
        .min(COVERAGE_CAP);
    above as f64 / COVERAGE_CAP as f64 * COVERAGE_FACTOR
}

/// Linear decay from 0.1 for a file modified now to 0 after a year.
///
/// Unparsable timestamps score 0; timestamps in the future count as now.
pub fn recency_score(modified_time: &str, now: DateTime<Utc>) -> f64 {
    let Ok(modified) = DateTime::parse_from_rfc3339(modified_time) else {
        return 0.0;
    };
    let days = (now - modified.with_timezone(&Utc)).num_days().max(0) as f64;
    ((RECENCY_WINDOW_DAYS - days) / RECENCY_WINDOW_DAYS).max(0.0) * RECENCY_FACTOR
}
