// ============================================================
// Layer 4 — Propara Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<EntityInstance>
// into padded tensors for one forward pass.
//
// Shapes (B = batch, T = max tokens, S = max sentences,
//         C = max candidates, D = external embedding width):
//
//   embeddings   [B, T, D]   from the TokenEmbedder, no gradient
//   entity_mask  [B, S, T]   1 where token t mentions the entity in sentence s
//   verb_mask    [B, S, T]   1 where token t is the predicate of sentence s
//   loc_mask     [B, C, T]   1 where token t mentions candidate c
//   cand_mask    [B, C]      1 for real candidates, 0 for padding
//   sent_mask    [B, S]      true for real sentences (prefix-contiguous)
//   gold_states  [B, S]      tag index, PAD_STATE beyond the paragraph
//   gold_locs    [B, S]      candidate after sentence s, PAD_LOC when
//                            unsupervised ("-" or padding)
//
// Collation happens on plain Vecs first (Collated) so the padding
// logic is testable without a backend; to_batch() only uploads.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use std::sync::Arc;

use crate::domain::{
    instance::{EntityInstance, GoldLocation, InstanceMeta},
    state::{PAD_LOC, PAD_STATE},
    traits::TokenEmbedder,
};

// ─── ProparaBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ProparaBatch<B: Backend> {
    pub embeddings:  Tensor<B, 3>,
    pub entity_mask: Tensor<B, 3>,
    pub verb_mask:   Tensor<B, 3>,
    pub loc_mask:    Tensor<B, 3>,
    pub cand_mask:   Tensor<B, 2, Int>,
    pub sent_mask:   Tensor<B, 2, Bool>,
    pub gold_states: Tensor<B, 2, Int>,
    pub gold_locs:   Tensor<B, 2, Int>,
    pub metadata:    Vec<InstanceMeta>,
}

// ─── Collated ─────────────────────────────────────────────────────────────────
/// Host-side, padded, row-major batch contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Collated {
    pub batch_size:  usize,
    pub max_tokens:  usize,
    pub max_sents:   usize,
    pub max_cands:   usize,
    pub embed_dim:   usize,
    pub embeddings:  Vec<f32>,
    pub entity_mask: Vec<f32>,
    pub verb_mask:   Vec<f32>,
    pub loc_mask:    Vec<f32>,
    pub cand_mask:   Vec<i32>,
    pub sent_mask:   Vec<i32>,
    pub gold_states: Vec<i32>,
    pub gold_locs:   Vec<i32>,
    pub metadata:    Vec<InstanceMeta>,
}

/// Pad every instance of `items` to the batch maxima.
pub fn collate(items: &[EntityInstance], embedder: &dyn TokenEmbedder) -> Collated {
    assert!(!items.is_empty(), "cannot collate an empty batch");

    let batch_size = items.len();
    let max_tokens = items.iter().map(EntityInstance::total_tokens).max().unwrap_or(0);
    let max_sents  = items.iter().map(EntityInstance::total_sents).max().unwrap_or(0);
    let max_cands  = items.iter().map(EntityInstance::total_loc_cands).max().unwrap_or(0);
    let embed_dim  = embedder.dim();

    let mut c = Collated {
        batch_size,
        max_tokens,
        max_sents,
        max_cands,
        embed_dim,
        embeddings:  vec![0.0; batch_size * max_tokens * embed_dim],
        entity_mask: vec![0.0; batch_size * max_sents * max_tokens],
        verb_mask:   vec![0.0; batch_size * max_sents * max_tokens],
        loc_mask:    vec![0.0; batch_size * max_cands * max_tokens],
        cand_mask:   vec![0; batch_size * max_cands],
        sent_mask:   vec![0; batch_size * max_sents],
        gold_states: vec![PAD_STATE; batch_size * max_sents],
        gold_locs:   vec![PAD_LOC; batch_size * max_sents],
        metadata:    items.iter().map(EntityInstance::meta).collect(),
    };

    for (b, inst) in items.iter().enumerate() {
        // ── Token embeddings (one service call per paragraph) ────────────────
        let vectors = embedder.embed(inst.para_id, &inst.tokens());
        assert_eq!(vectors.len(), inst.total_tokens(), "embedder returned wrong token count");
        for (t, v) in vectors.iter().enumerate() {
            assert_eq!(v.len(), embed_dim, "embedder returned wrong vector width");
            let at = (b * max_tokens + t) * embed_dim;
            c.embeddings[at..at + embed_dim].copy_from_slice(v);
        }

        // ── Sentence masks ───────────────────────────────────────────────────
        for s in 0..inst.total_sents() {
            let row = (b * max_sents + s) * max_tokens;
            for &t in &inst.entity_mentions[s] {
                c.entity_mask[row + t] = 1.0;
            }
            for &t in &inst.verb_mentions[s] {
                c.verb_mask[row + t] = 1.0;
            }
            c.sent_mask[b * max_sents + s] = 1;
        }

        // ── Candidate masks ──────────────────────────────────────────────────
        for (cand, mentions) in inst.loc_mentions.iter().enumerate() {
            let row = (b * max_cands + cand) * max_tokens;
            for &t in mentions {
                c.loc_mask[row + t] = 1.0;
            }
            c.cand_mask[b * max_cands + cand] = 1;
        }

        // ── Gold sequences ───────────────────────────────────────────────────
        if let Some(states) = &inst.gold_states {
            for (s, tag) in states.iter().enumerate() {
                c.gold_states[b * max_sents + s] = tag.index() as i32;
            }
        }
        if let Some(locations) = &inst.gold_locations {
            // Boundary 0 is derived at decode time, the head learns 1..=n
            for (s, loc) in locations.iter().skip(1).enumerate() {
                if let GoldLocation::Candidate(idx) = loc {
                    c.gold_locs[b * max_sents + s] = *idx as i32;
                }
            }
        }
    }

    c
}

impl Collated {
    /// Upload the padded buffers to `device`.
    pub fn to_batch<B: Backend>(self, device: &B::Device) -> ProparaBatch<B> {
        let (b, t, s, c, d) = (
            self.batch_size, self.max_tokens, self.max_sents, self.max_cands, self.embed_dim,
        );

        let floats3 = |data: &[f32], shape: [usize; 3]| {
            Tensor::<B, 1>::from_floats(data, device).reshape(shape)
        };
        let ints2 = |data: &[i32], shape: [usize; 2]| {
            Tensor::<B, 1, Int>::from_ints(data, device).reshape(shape)
        };

        ProparaBatch {
            embeddings:  floats3(&self.embeddings, [b, t, d]),
            entity_mask: floats3(&self.entity_mask, [b, s, t]),
            verb_mask:   floats3(&self.verb_mask, [b, s, t]),
            loc_mask:    floats3(&self.loc_mask, [b, c, t]),
            cand_mask:   ints2(&self.cand_mask, [b, c]),
            sent_mask:   ints2(&self.sent_mask, [b, s]).equal_elem(1),
            gold_states: ints2(&self.gold_states, [b, s]),
            gold_locs:   ints2(&self.gold_locs, [b, s]),
            metadata:    self.metadata,
        }
    }
}

// ─── ProparaBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ProparaBatcher<B: Backend> {
    embedder: Arc<dyn TokenEmbedder>,
    device:   B::Device,
}

impl<B: Backend> ProparaBatcher<B> {
    pub fn new(embedder: Arc<dyn TokenEmbedder>, device: B::Device) -> Self {
        Self { embedder, device }
    }
}

impl<B: Backend> Batcher<EntityInstance, ProparaBatch<B>> for ProparaBatcher<B> {
    fn batch(&self, items: Vec<EntityInstance>) -> ProparaBatch<B> {
        collate(&items, self.embedder.as_ref()).to_batch(&self.device)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{embedder::HashEmbedder, fixtures};
    use burn::backend::NdArray;

    #[test]
    fn test_collate_pads_to_batch_maxima() {
        let items = vec![fixtures::ironore(), fixtures::short_seed()];
        let c = collate(&items, &HashEmbedder::new(4, 0));

        assert_eq!((c.batch_size, c.max_tokens, c.max_sents, c.max_cands), (2, 8, 2, 2));
        assert_eq!(c.embeddings.len(), 2 * 8 * 4);
        // second instance has a single sentence of three tokens
        assert_eq!(c.sent_mask, vec![1, 1, 1, 0]);
        assert_eq!(&c.gold_states[2..], &[4, PAD_STATE]);
        assert!(c.embeddings[(8 + 3) * 4..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_collate_masks_and_gold_locations() {
        let c = collate(&[fixtures::ironore()], &HashEmbedder::new(4, 0));
        // entity mentioned by tokens 0,1 in sentence 0, absent from sentence 1
        assert_eq!(&c.entity_mask[0..8], &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(c.entity_mask[8..16].iter().all(|&x| x == 0.0));
        assert_eq!(c.verb_mask[8 + 5], 1.0);
        // gold boundaries ["-", "?", "water"] → after s0 = "?" (1), after s1 = "water" (0)
        assert_eq!(c.gold_locs, vec![1, 0]);
        assert_eq!(c.cand_mask, vec![1, 1]);
        assert_eq!(c.loc_mask[7], 1.0);
    }

    #[test]
    fn test_batcher_produces_expected_shapes() {
        let embedder: Arc<dyn TokenEmbedder> = Arc::new(HashEmbedder::new(4, 0));
        let batcher = ProparaBatcher::<NdArray>::new(embedder, Default::default());
        let batch = batcher.batch(vec![fixtures::ironore(), fixtures::short_seed()]);

        assert_eq!(batch.embeddings.dims(), [2, 8, 4]);
        assert_eq!(batch.entity_mask.dims(), [2, 2, 8]);
        assert_eq!(batch.loc_mask.dims(), [2, 2, 8]);
        assert_eq!(batch.sent_mask.dims(), [2, 2]);
        assert_eq!(batch.metadata[1].entity, "seed");
    }
}
