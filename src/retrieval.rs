//! Multi-mode retrieval engine.
//!
//! Given a query and retrieval parameters, selects chunks from the store
//! under one of three strategies and assembles the context string, the
//! ordered de-duplicated source list, and the per-chunk debug records.
//!
//! - **similarity** — top-k by relevance score.
//! - **threshold** — similarity, then drop candidates scoring strictly
//!   below the configured threshold; may return fewer than k results.
//! - **mmr** — maximal marginal relevance over a larger candidate pool,
//!   trading top relevance for reduced redundancy among the selected
//!   chunks. Produces no per-chunk scores.
//!
//! The engine never mutates the store.

use tracing::warn;

use crate::config::RetrievalConfig;
use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::store::{Candidate, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Similarity,
    Mmr,
    Threshold,
}

impl RetrievalMode {
    /// Parse a mode name. Unrecognized values fall back to similarity
    /// with a logged warning rather than failing the query.
    pub fn parse(s: &str) -> Self {
        match s {
            "similarity" => RetrievalMode::Similarity,
            "mmr" => RetrievalMode::Mmr,
            "threshold" => RetrievalMode::Threshold,
            other => {
                warn!(mode = other, "unrecognized retrieval mode, using similarity");
                RetrievalMode::Similarity
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Similarity => "similarity",
            RetrievalMode::Mmr => "mmr",
            RetrievalMode::Threshold => "threshold",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub mode: RetrievalMode,
    pub k: usize,
    /// Candidate pool size for mmr; clamped up to at least `k`.
    pub fetch_k: usize,
    /// Minimum relevance kept in threshold mode.
    pub score_threshold: f32,
    /// Relevance/diversity trade-off for mmr (1.0 = pure relevance).
    pub mmr_lambda: f32,
}

impl RetrievalParams {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            mode: RetrievalMode::parse(&config.mode),
            k: config.default_k,
            fetch_k: config.fetch_k,
            score_threshold: config.score_threshold,
            mmr_lambda: config.mmr_lambda,
        }
    }
}

/// One selected chunk, as surfaced to callers for debugging.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    /// Present in similarity/threshold modes; mmr selection does not
    /// yield a single relevance number.
    pub score: Option<f32>,
}

/// The assembled result of one retrieval.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Selected chunk texts joined by blank lines, in selection order.
    pub context: String,
    /// De-duplicated source labels, first-occurrence order.
    pub sources: Vec<String>,
    pub chunks: Vec<RetrievedChunk>,
}

pub struct Retriever<'a> {
    store: &'a VectorStore,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a VectorStore) -> Self {
        Self { store }
    }

    /// Retrieve context for a query. Returns an empty result when no
    /// collection exists; callers surface that as "not indexed".
    pub async fn retrieve(&self, query: &str, params: &RetrievalParams) -> Result<Retrieval> {
        if !self.store.exists() {
            return Ok(Retrieval::default());
        }

        let k = params.k.max(1);

        let selected: Vec<(Candidate, Option<f32>)> = match params.mode {
            RetrievalMode::Similarity => self
                .store
                .query(query, k)
                .await?
                .into_iter()
                .map(|c| {
                    let score = c.score;
                    (c, Some(score))
                })
                .collect(),
            RetrievalMode::Threshold => self
                .store
                .query(query, k)
                .await?
                .into_iter()
                .filter(|c| c.score >= params.score_threshold)
                .map(|c| {
                    let score = c.score;
                    (c, Some(score))
                })
                .collect(),
            RetrievalMode::Mmr => {
                let pool = self.store.query(query, params.fetch_k.max(k)).await?;
                let picks = mmr_select(&pool, k, params.mmr_lambda);
                let mut pool: Vec<Option<Candidate>> = pool.into_iter().map(Some).collect();
                picks
                    .into_iter()
                    .filter_map(|i| pool[i].take())
                    .map(|c| (c, None))
                    .collect()
            }
        };

        Ok(assemble(selected))
    }
}

/// Greedy maximal-marginal-relevance selection over a candidate pool.
///
/// Each round picks the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`.
/// Ties resolve to the earlier pool index, so selection is deterministic
/// for a fixed pool.
fn mmr_select(candidates: &[Candidate], k: usize, lambda: f32) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::new();
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0usize;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &i) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&j| cosine_similarity(&candidates[i].embedding, &candidates[j].embedding))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let mmr = lambda * candidates[i].score - (1.0 - lambda) * redundancy;
            if mmr > best_score {
                best_score = mmr;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

fn assemble(selected: Vec<(Candidate, Option<f32>)>) -> Retrieval {
    let chunks: Vec<RetrievedChunk> = selected
        .into_iter()
        .map(|(c, score)| RetrievedChunk {
            source: source_label(&c.file_name, c.page),
            text: c.text,
            score,
        })
        .collect();

    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let sources = dedup_sources(chunks.iter().map(|c| c.source.clone()));

    Retrieval {
        context,
        sources,
        chunks,
    }
}

/// Human-readable origin of a chunk: file name plus page suffix when
/// the chunk came from a paginated document.
fn source_label(file_name: &str, page: Option<u32>) -> String {
    match page {
        Some(p) => format!("{} (page {})", file_name, p),
        None => file_name.to_string(),
    }
}

/// De-duplicate labels preserving first-occurrence order.
fn dedup_sources(labels: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for label in labels {
        if seen.insert(label.clone()) {
            out.push(label);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candidate(text: &str, score: f32, embedding: Vec<f32>) -> Candidate {
        Candidate {
            text: text.to_string(),
            file_name: "doc.txt".to_string(),
            page: None,
            score,
            embedding,
        }
    }

    #[test]
    fn mode_parse_known_values() {
        assert_eq!(RetrievalMode::parse("similarity"), RetrievalMode::Similarity);
        assert_eq!(RetrievalMode::parse("mmr"), RetrievalMode::Mmr);
        assert_eq!(RetrievalMode::parse("threshold"), RetrievalMode::Threshold);
    }

    #[test]
    fn mode_parse_falls_back_to_similarity() {
        assert_eq!(RetrievalMode::parse("hybrid"), RetrievalMode::Similarity);
        assert_eq!(RetrievalMode::parse(""), RetrievalMode::Similarity);
    }

    #[test]
    fn mmr_returns_k_distinct_indices() {
        let pool: Vec<Candidate> = (0..20)
            .map(|i| {
                make_candidate(
                    &format!("chunk {}", i),
                    1.0 - i as f32 * 0.01,
                    vec![i as f32, 1.0, 0.0],
                )
            })
            .collect();

        let picks = mmr_select(&pool, 5, 0.5);
        assert_eq!(picks.len(), 5);
        let unique: std::collections::HashSet<_> = picks.iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn mmr_first_pick_is_most_relevant() {
        let pool = vec![
            make_candidate("b", 0.7, vec![0.0, 1.0]),
            make_candidate("a", 0.9, vec![1.0, 0.0]),
        ];
        // Pool order is not score order here; the first pick must still
        // be the highest-scoring candidate.
        let picks = mmr_select(&pool, 1, 0.5);
        assert_eq!(picks, vec![1]);
    }

    #[test]
    fn mmr_prefers_diverse_over_near_duplicate() {
        // Two near-identical high scorers and one orthogonal lower
        // scorer: with two picks, diversity should beat the duplicate.
        let pool = vec![
            make_candidate("top", 0.95, vec![1.0, 0.0]),
            make_candidate("dup", 0.94, vec![1.0, 0.001]),
            make_candidate("other", 0.6, vec![0.0, 1.0]),
        ];
        let picks = mmr_select(&pool, 2, 0.5);
        assert_eq!(picks[0], 0);
        assert_eq!(picks[1], 2, "expected the orthogonal candidate, not the duplicate");
    }

    #[test]
    fn mmr_handles_pool_smaller_than_k() {
        let pool = vec![make_candidate("only", 0.5, vec![1.0])];
        let picks = mmr_select(&pool, 5, 0.5);
        assert_eq!(picks, vec![0]);
    }

    #[test]
    fn mmr_deterministic() {
        let pool: Vec<Candidate> = (0..10)
            .map(|i| make_candidate(&format!("c{}", i), 0.5, vec![(i % 3) as f32, 1.0]))
            .collect();
        assert_eq!(mmr_select(&pool, 4, 0.5), mmr_select(&pool, 4, 0.5));
    }

    #[test]
    fn source_label_includes_page_when_present() {
        assert_eq!(source_label("notes.txt", None), "notes.txt");
        assert_eq!(source_label("paper.pdf", Some(3)), "paper.pdf (page 3)");
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let labels = vec![
            "b.pdf (page 2)".to_string(),
            "a.txt".to_string(),
            "b.pdf (page 2)".to_string(),
            "c.md".to_string(),
        ];
        let unique = dedup_sources(labels.into_iter());
        assert_eq!(unique, vec!["b.pdf (page 2)", "a.txt", "c.md"]);
    }

    #[test]
    fn assemble_joins_context_with_blank_lines() {
        let selected = vec![
            (make_candidate("first", 0.9, vec![1.0]), Some(0.9)),
            (make_candidate("second", 0.8, vec![1.0]), Some(0.8)),
        ];
        let retrieval = assemble(selected);
        assert_eq!(retrieval.context, "first\n\nsecond");
        assert_eq!(retrieval.sources, vec!["doc.txt"]);
        assert_eq!(retrieval.chunks.len(), 2);
        assert_eq!(retrieval.chunks[0].score, Some(0.9));
    }

    #[test]
    fn assemble_empty_selection_is_empty_result() {
        let retrieval = assemble(Vec::new());
        assert!(retrieval.context.is_empty());
        assert!(retrieval.sources.is_empty());
        assert!(retrieval.chunks.is_empty());
    }
}
