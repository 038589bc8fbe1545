// ============================================================
// Layer 5 — Masked Span Aggregation
// ============================================================
// Turns token representations into one vector per sentence.
//
//   masked_mean:  mean of the token vectors selected by a 0/1
//                 span mask, computed as a batched matmul:
//                   [B,S,T] x [B,T,E] → [B,S,E], divided by the
//                   number of selected tokens per sentence.
//
//   sentence_representations:
//                 entity mean ‖ verb mean  → [B,S,4H], then the
//                 whole row is zeroed wherever the entity is not
//                 mentioned, even if the verb is. A predicate
//                 alone carries no signal about this entity.
//
// Empty spans are expected (entity or verb absent from a
// sentence). Their token count is clamped to 1 before dividing,
// so the already-zero sum stays an exact zero vector. Dividing
// by the raw zero count would produce NaN, and NaN cannot be
// masked away afterwards without poisoning the gradient.

use burn::prelude::*;

/// Mean of `source` tokens selected by `mask`.
///
/// source: [B, T, E], mask: [B, S, T] (0/1) → [B, S, E]
pub fn masked_mean<B: Backend>(source: Tensor<B, 3>, mask: Tensor<B, 3>) -> Tensor<B, 3> {
    let [batch, tokens, _] = source.dims();
    let [mask_batch, _, mask_tokens] = mask.dims();
    assert_eq!(
        (batch, tokens),
        (mask_batch, mask_tokens),
        "span mask does not match token representations"
    );

    let summed = mask.clone().matmul(source);  // [B, S, E]
    let counts = mask.sum_dim(2);              // [B, S, 1]
    summed / counts.clamp_min(1.0)
}

/// Per-sentence decoder input: entity mean ‖ verb mean, gated by entity presence.
///
/// token_rep: [B, T, 2H], masks: [B, S, T] → [B, S, 4H]
pub fn sentence_representations<B: Backend>(
    token_rep:   Tensor<B, 3>,
    entity_mask: Tensor<B, 3>,
    verb_mask:   Tensor<B, 3>,
) -> Tensor<B, 3> {
    assert_eq!(entity_mask.dims(), verb_mask.dims(), "entity and verb masks differ in shape");

    let entity = masked_mean(token_rep.clone(), entity_mask.clone());
    let verb   = masked_mean(token_rep, verb_mask);
    let concat = Tensor::cat(vec![entity, verb], 2);

    // 1 where the entity is mentioned in the sentence, 0 otherwise
    let present = entity_mask.sum_dim(2).clamp_max(1.0);  // [B, S, 1]
    concat * present
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TB = NdArray;

    fn tokens(device: &<TB as Backend>::Device) -> Tensor<TB, 3> {
        // one paragraph, three tokens, E = 2
        Tensor::<TB, 1>::from_floats([1.0, 2.0, 3.0, 4.0, 5.0, 6.0].as_slice(), device)
            .reshape([1, 3, 2])
    }

    fn mask(values: &[f32], sents: usize, device: &<TB as Backend>::Device) -> Tensor<TB, 3> {
        Tensor::<TB, 1>::from_floats(values, device).reshape([1, sents, 3])
    }

    fn host(t: Tensor<TB, 3>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_masked_mean_averages_selected_tokens() {
        let device = Default::default();
        let out = masked_mean(tokens(&device), mask(&[1.0, 0.0, 1.0], 1, &device));
        assert_eq!(out.dims(), [1, 1, 2]);
        assert_eq!(host(out), vec![3.0, 4.0]);
    }

    #[test]
    fn test_all_zero_span_gives_exact_zero_vector() {
        let device = Default::default();
        let out = masked_mean(
            tokens(&device),
            mask(&[0.0, 1.0, 0.0, 0.0, 0.0, 0.0], 2, &device),
        );
        let values = host(out);
        assert!(values.iter().all(|v| !v.is_nan()));
        assert_eq!(&values[0..2], &[3.0, 4.0]);
        assert_eq!(&values[2..4], &[0.0, 0.0]);
    }

    #[test]
    fn test_entity_absent_zeroes_whole_row_even_with_verb() {
        let device = Default::default();
        // sentence 0: entity on token 0, verb on token 1
        // sentence 1: no entity, verb on token 2
        let entity = mask(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 2, &device);
        let verb   = mask(&[0.0, 1.0, 0.0, 0.0, 0.0, 1.0], 2, &device);
        let out = sentence_representations(tokens(&device), entity, verb);
        assert_eq!(out.dims(), [1, 2, 4]);
        let values = host(out);
        assert_eq!(&values[0..4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(&values[4..8], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_span_has_finite_gradient() {
        type AB = Autodiff<NdArray>;
        let device = Default::default();
        let source = Tensor::<AB, 1>::from_floats([1.0, 2.0, 3.0, 4.0, 5.0, 6.0].as_slice(), &device)
            .reshape([1, 3, 2])
            .require_grad();
        let empty = Tensor::<AB, 3>::zeros([1, 1, 3], &device);

        let loss = masked_mean(source.clone(), empty).sum();
        let grads = loss.backward();
        let grad = source.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
        assert!(grad.iter().all(|g| *g == 0.0));
    }
}
