//! Shared fixtures: a deterministic in-memory embedder and config/store
//! builders over temporary directories, so the indexing and retrieval
//! paths run end to end without a network.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use docdex::config::Config;
use docdex::embedding::Embedder;
use docdex::error::Result;
use docdex::store::VectorStore;

/// Bag-of-words hash embedder. Texts sharing words map to nearby
/// vectors, so similarity ordering behaves like a real model's, and the
/// output depends only on the input text.
pub struct MockEmbedder;

const DIMS: usize = 16;

fn fnv1a(token: &str) -> u64 {
    let mut acc: u64 = 0xcbf29ce484222325;
    for b in token.bytes() {
        acc ^= b as u64;
        acc = acc.wrapping_mul(0x100000001b3);
    }
    acc
}

fn embed_one(text: &str) -> Vec<f32> {
    let mut v = vec![0f32; DIMS];
    let mut any = false;
    for token in text.split_whitespace() {
        let token: String = token
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if token.is_empty() {
            continue;
        }
        v[(fnv1a(&token) % DIMS as u64) as usize] += 1.0;
        any = true;
    }
    if !any {
        v[0] = 1.0;
    }
    v
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_one(t)).collect())
    }
}

/// Config rooted in a temp directory, with chunking small enough that
/// multi-paragraph fixtures split into several chunks.
pub fn test_config(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.paths.docs_dir = root.join("documents");
    cfg.paths.index_dir = root.join("index");
    cfg.chunking.chunk_size = 200;
    cfg.chunking.chunk_overlap = 40;
    cfg
}

pub fn store_for(cfg: &Config) -> VectorStore {
    VectorStore::new(cfg.paths.index_dir.clone(), Arc::new(MockEmbedder))
}
