// ============================================================
// Layer 4 — Token Embedders
// ============================================================
// Adapters for the external contextual embedding service.
//
// The tracker never trains these vectors: they enter the model
// as plain (non-gradient) tensors built by the batcher.
//
//   HashEmbedder        — deterministic pseudo-random vector per
//                         lower-cased token. Lets the whole
//                         pipeline run offline and in tests.
//
//   PrecomputedEmbedder — vectors produced ahead of time by the
//                         pretrained service and dumped to JSON:
//                           { "<para_id>": [[f32; dim]; tokens] }
//
// Reference: rand crate documentation (SeedableRng)
//            xxHash (XXH3), stable across platforms and releases

use anyhow::{ensure, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use xxhash_rust::xxh3::xxh3_64_with_seed;
use std::{
    collections::HashMap,
    fs,
    path::Path,
};

use crate::domain::traits::TokenEmbedder;

// ─── HashEmbedder ─────────────────────────────────────────────────────────────
/// Frozen embedding derived from a hash of the token text.
/// Same token → same vector, across runs and machines.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim:  usize,
    seed: u64,
}

impl HashEmbedder {
    pub fn new(dim: usize, seed: u64) -> Self {
        assert!(dim > 0, "embedding dimension must be positive");
        Self { dim, seed }
    }

    fn token_vector(&self, token: &str) -> Vec<f32> {
        let key = xxh3_64_with_seed(token.to_lowercase().as_bytes(), self.seed);
        let mut rng = StdRng::seed_from_u64(key);

        let mut v: Vec<f32> = (0..self.dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl TokenEmbedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, _para_id: u32, tokens: &[String]) -> Vec<Vec<f32>> {
        tokens.iter().map(|t| self.token_vector(t)).collect()
    }
}

// ─── PrecomputedEmbedder ──────────────────────────────────────────────────────
/// Vectors computed by the external service, looked up by paragraph id.
#[derive(Debug, Clone)]
pub struct PrecomputedEmbedder {
    dim:        usize,
    paragraphs: HashMap<u32, Vec<Vec<f32>>>,
}

impl PrecomputedEmbedder {
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read embeddings '{}'", path.display()))?;
        let raw: HashMap<String, Vec<Vec<f32>>> = serde_json::from_str(&json)
            .with_context(|| format!("Malformed embeddings file '{}'", path.display()))?;

        let mut dim = None;
        let mut paragraphs = HashMap::with_capacity(raw.len());
        for (key, vectors) in raw {
            let para_id: u32 = key
                .parse()
                .with_context(|| format!("Embedding key '{key}' is not a paragraph id"))?;
            for v in &vectors {
                let expected = *dim.get_or_insert(v.len());
                ensure!(
                    v.len() == expected,
                    "paragraph {para_id}: vector of width {} (expected {expected})",
                    v.len()
                );
            }
            paragraphs.insert(para_id, vectors);
        }

        let dim = dim.context("Embeddings file contains no vectors")?;
        ensure!(dim > 0, "Embedding vectors are empty");
        tracing::info!(
            "Loaded precomputed embeddings for {} paragraphs (dim={})",
            paragraphs.len(),
            dim
        );
        Ok(Self { dim, paragraphs })
    }
}

impl TokenEmbedder for PrecomputedEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, para_id: u32, tokens: &[String]) -> Vec<Vec<f32>> {
        let Some(stored) = self.paragraphs.get(&para_id) else {
            tracing::warn!("No embeddings for paragraph {para_id}, using zero vectors");
            return vec![vec![0.0; self.dim]; tokens.len()];
        };
        if stored.len() != tokens.len() {
            tracing::warn!(
                "Paragraph {}: {} stored vectors for {} tokens",
                para_id,
                stored.len(),
                tokens.len()
            );
        }
        (0..tokens.len())
            .map(|i| stored.get(i).cloned().unwrap_or_else(|| vec![0.0; self.dim]))
            .collect()
    }
}
