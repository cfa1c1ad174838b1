//! Retrieval engine behavior over an indexed fixture store.

mod common;

use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

use common::{store_for, test_config};
use docdex::config::Config;
use docdex::index::{CancelFlag, IndexManager};
use docdex::retrieval::{RetrievalMode, RetrievalParams, Retriever};
use docdex::store::VectorStore;

fn params(mode: RetrievalMode, k: usize) -> RetrievalParams {
    RetrievalParams {
        mode,
        k,
        fetch_k: 20,
        score_threshold: 0.5,
        mmr_lambda: 0.5,
    }
}

/// Index a fixture corpus: two short single-chunk documents with distinct
/// vocabulary plus one long document that splits into several chunks.
async fn indexed_fixture(tmp: &TempDir) -> (Config, VectorStore) {
    let cfg = test_config(tmp.path());
    let docs = &cfg.paths.docs_dir;
    fs::create_dir_all(docs).unwrap();

    fs::write(
        docs.join("rust.md"),
        "Rust programs use cargo to build crates and manage dependencies.",
    )
    .unwrap();
    fs::write(
        docs.join("cooking.txt"),
        "Simmer the onions slowly and season the broth with thyme.",
    )
    .unwrap();

    let long: String = (0..8)
        .map(|i| {
            format!(
                "Deployment section {} explains rollout strategy, rollback handling, \
                 and cluster health checks for release wave number {}.",
                i, i
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    fs::write(docs.join("deploy.txt"), long).unwrap();

    let store = store_for(&cfg);
    let manager = IndexManager::new(&cfg, &store);
    let (_, report) = manager.build_or_update(&CancelFlag::new()).await.unwrap();
    assert_eq!(report.new, 3);
    assert!(report.chunks >= 6, "fixture should yield several chunks");

    (cfg, store)
}

#[tokio::test]
async fn missing_index_yields_an_empty_result() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let store = store_for(&cfg);
    let retriever = Retriever::new(&store);

    let retrieval = retriever
        .retrieve("anything", &params(RetrievalMode::Similarity, 4))
        .await
        .unwrap();

    assert!(retrieval.context.is_empty());
    assert!(retrieval.sources.is_empty());
    assert!(retrieval.chunks.is_empty());
}

#[tokio::test]
async fn similarity_returns_k_scored_chunks_ranked_descending() {
    let tmp = TempDir::new().unwrap();
    let (_cfg, store) = indexed_fixture(&tmp).await;
    let retriever = Retriever::new(&store);

    let retrieval = retriever
        .retrieve(
            "cargo crates dependencies",
            &params(RetrievalMode::Similarity, 3),
        )
        .await
        .unwrap();

    assert_eq!(retrieval.chunks.len(), 3);
    let scores: Vec<f32> = retrieval
        .chunks
        .iter()
        .map(|c| c.score.expect("similarity supplies scores"))
        .collect();
    for s in &scores {
        assert!((0.0..=1.0).contains(s));
    }
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1], "scores must be descending");
    }
    assert!(
        retrieval.chunks[0].text.contains("cargo"),
        "the overlapping-vocabulary chunk should rank first"
    );
    assert_eq!(retrieval.chunks[0].source, "rust.md");
}

#[tokio::test]
async fn context_joins_chunks_with_blank_lines_in_selection_order() {
    let tmp = TempDir::new().unwrap();
    let (_cfg, store) = indexed_fixture(&tmp).await;
    let retriever = Retriever::new(&store);

    let retrieval = retriever
        .retrieve("rollout strategy", &params(RetrievalMode::Similarity, 2))
        .await
        .unwrap();

    let expected = retrieval
        .chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    assert_eq!(retrieval.context, expected);
}

#[tokio::test]
async fn threshold_results_shrink_as_the_threshold_rises() {
    let tmp = TempDir::new().unwrap();
    let (_cfg, store) = indexed_fixture(&tmp).await;
    let retriever = Retriever::new(&store);

    let query = "rollout strategy and rollback handling";
    let mut previous: Option<HashSet<String>> = None;

    for threshold in [0.0f32, 0.55, 0.75, 0.95] {
        let mut p = params(RetrievalMode::Threshold, 6);
        p.score_threshold = threshold;
        let retrieval = retriever.retrieve(query, &p).await.unwrap();

        for chunk in &retrieval.chunks {
            assert!(chunk.score.unwrap() >= threshold);
        }

        let texts: HashSet<String> =
            retrieval.chunks.iter().map(|c| c.text.clone()).collect();
        if let Some(prev) = &previous {
            assert!(
                texts.is_subset(prev),
                "raising the threshold must only remove results"
            );
        }
        previous = Some(texts);
    }
}

#[tokio::test]
async fn threshold_can_return_zero_results() {
    let tmp = TempDir::new().unwrap();
    let (_cfg, store) = indexed_fixture(&tmp).await;
    let retriever = Retriever::new(&store);

    let mut p = params(RetrievalMode::Threshold, 4);
    p.score_threshold = 1.0;
    let retrieval = retriever
        .retrieve("completely unrelated zebra xylophone", &p)
        .await
        .unwrap();

    assert!(retrieval.chunks.is_empty());
    assert!(retrieval.context.is_empty());
}

#[tokio::test]
async fn mmr_returns_exactly_k_distinct_unscored_chunks() {
    let tmp = TempDir::new().unwrap();
    let (_cfg, store) = indexed_fixture(&tmp).await;
    let retriever = Retriever::new(&store);

    let retrieval = retriever
        .retrieve(
            "deployment rollout health",
            &params(RetrievalMode::Mmr, 5),
        )
        .await
        .unwrap();

    assert_eq!(retrieval.chunks.len(), 5);
    let distinct: HashSet<&str> = retrieval.chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(distinct.len(), 5, "mmr must not select duplicate chunks");
    for chunk in &retrieval.chunks {
        assert!(chunk.score.is_none(), "mmr yields no per-chunk score");
    }
}

#[tokio::test]
async fn chunks_from_the_same_document_share_one_source_entry() {
    let tmp = TempDir::new().unwrap();
    let (_cfg, store) = indexed_fixture(&tmp).await;
    let retriever = Retriever::new(&store);

    let retrieval = retriever
        .retrieve(
            "rollout strategy rollback cluster",
            &params(RetrievalMode::Similarity, 4),
        )
        .await
        .unwrap();

    assert!(retrieval.chunks.len() > 1);
    let from_deploy = retrieval
        .chunks
        .iter()
        .filter(|c| c.source == "deploy.txt")
        .count();
    assert!(from_deploy > 1, "several selected chunks share a source");
    assert_eq!(
        retrieval
            .sources
            .iter()
            .filter(|s| s.as_str() == "deploy.txt")
            .count(),
        1
    );
    assert_eq!(retrieval.sources[0], retrieval.chunks[0].source);
}
