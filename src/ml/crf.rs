// ============================================================
// Layer 5 — Linear-Chain CRF
// ============================================================
// Scores a tag sequence y_1..y_n for one entity:
//
//   score(y) = start[y_1]
//            + Σ_i emit[i, y_i]
//            + Σ_i trans[y_{i-1}, y_i]
//            + end[y_n]
//
// Training minimises  -log p(y|x) = log Z(x) - score(y),
// where log Z is computed with the forward algorithm in log
// space. Padded positions (mask = false) contribute nothing:
// their emissions are zeroed in the gold score and the forward
// recursion simply carries alpha through them.
//
// Decoding runs Viterbi on the host over each row's real
// length. Ties go to the lowest tag index.
//
// Masks must be prefix-contiguous and every row must hold at
// least one real position.
//
// Reference: Lafferty et al. (2001) Conditional Random Fields
//            Lample et al. (2016) Neural Architectures for NER

use anyhow::{bail, Result};
use burn::{
    module::Param,
    nn::Initializer,
    prelude::*,
};

use crate::ml::host;

#[derive(Config, Debug)]
pub struct CrfConfig {
    pub num_tags: usize,
}

impl CrfConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Crf<B> {
        let init = Initializer::Uniform { min: -0.1, max: 0.1 };
        let n = self.num_tags;
        Crf {
            start_transitions: init.init([n], device),
            end_transitions:   init.init([n], device),
            transitions:       init.init([n, n], device),
            num_tags:          n,
        }
    }
}

#[derive(Module, Debug)]
pub struct Crf<B: Backend> {
    pub start_transitions: Param<Tensor<B, 1>>,
    pub end_transitions:   Param<Tensor<B, 1>>,
    /// transitions[prev, cur]
    pub transitions:       Param<Tensor<B, 2>>,
    pub num_tags:          usize,
}

impl<B: Backend> Crf<B> {
    /// Mean negative log-likelihood over the batch.
    ///
    /// emissions: [B, S, N], tags: [B, S] (padding may hold any value),
    /// mask: [B, S] → scalar [1]
    pub fn negative_log_likelihood(
        &self,
        emissions: Tensor<B, 3>,
        tags:      Tensor<B, 2, Int>,
        mask:      Tensor<B, 2, Bool>,
    ) -> Tensor<B, 1> {
        let [batch, seq, n] = emissions.dims();
        assert_eq!(n, self.num_tags, "emission width differs from tag count");
        assert_eq!(tags.dims(), [batch, seq], "tags do not match emissions");
        assert_eq!(mask.dims(), [batch, seq], "mask does not match emissions");

        let gold  = self.gold_score(emissions.clone(), tags, mask.clone());
        let log_z = self.log_partition(emissions, mask);
        (log_z - gold).mean()
    }

    /// Score of the given tag path per row → [B]
    fn gold_score(
        &self,
        emissions: Tensor<B, 3>,
        tags:      Tensor<B, 2, Int>,
        mask:      Tensor<B, 2, Bool>,
    ) -> Tensor<B, 1> {
        let [batch, seq, n] = emissions.dims();
        let maskf = mask.clone().float();
        // padding tags are negative; any in-range index works once masked
        let tags = tags.clamp_min(0);

        let emit = emissions
            .gather(2, tags.clone().unsqueeze_dim(2))
            .reshape([batch, seq])
            * maskf.clone();
        let mut score = emit.sum_dim(1).reshape([batch]);

        let first = tags.clone().slice([0..batch, 0..1]).reshape([batch]);
        score = score + self.start_transitions.val().select(0, first);

        if seq > 1 {
            let prev = tags.clone().slice([0..batch, 0..seq - 1]);
            let cur  = tags.clone().slice([0..batch, 1..seq]);
            let flat = (prev.mul_scalar(n as i32) + cur).reshape([batch * (seq - 1)]);
            let trans = self
                .transitions
                .val()
                .reshape([n * n])
                .select(0, flat)
                .reshape([batch, seq - 1]);
            let valid = maskf.slice([0..batch, 1..seq]);
            score = score + (trans * valid).sum_dim(1).reshape([batch]);
        }

        let last_index = mask.int().sum_dim(1).sub_scalar(1);           // [B, 1]
        let last = tags.gather(1, last_index).reshape([batch]);
        score + self.end_transitions.val().select(0, last)
    }

    /// log Z per row via the forward algorithm → [B]
    fn log_partition(&self, emissions: Tensor<B, 3>, mask: Tensor<B, 2, Bool>) -> Tensor<B, 1> {
        let [batch, seq, n] = emissions.dims();

        let start = self.start_transitions.val().reshape([1, n]).expand([batch, n]);
        let trans = self.transitions.val().reshape([1, n, n]).expand([batch, n, n]);

        // alpha[b, j] = log-sum of all prefixes ending in tag j
        let mut alpha = start + emissions.clone().slice([0..batch, 0..1, 0..n]).reshape([batch, n]);

        for i in 1..seq {
            let emit = emissions
                .clone()
                .slice([0..batch, i..i + 1, 0..n])
                .expand([batch, n, n]);
            let prev = alpha.clone().reshape([batch, n, 1]).expand([batch, n, n]);
            // [b, prev, cur]
            let next = log_sum_exp(prev + trans.clone() + emit, 1).reshape([batch, n]);

            let valid = mask.clone().slice([0..batch, i..i + 1]).expand([batch, n]);
            alpha = alpha.mask_where(valid, next);
        }

        let end = self.end_transitions.val().reshape([1, n]).expand([batch, n]);
        log_sum_exp(alpha + end, 1).reshape([batch])
    }

    /// Best tag path per row, truncated to the row's real length.
    pub fn decode(
        &self,
        emissions: Tensor<B, 3>,
        mask:      Tensor<B, 2, Bool>,
    ) -> Result<Vec<Vec<usize>>> {
        let [batch, seq, n] = emissions.dims();
        assert_eq!(mask.dims(), [batch, seq], "mask does not match emissions");

        let emissions   = host::floats(emissions)?;
        let mask        = host::flags(mask)?;
        let transitions = host::floats(self.transitions.val())?;
        let start       = host::floats(self.start_transitions.val())?;
        let end         = host::floats(self.end_transitions.val())?;

        let mut paths = Vec::with_capacity(batch);
        for b in 0..batch {
            let row = &mask[b * seq..(b + 1) * seq];
            let len = prefix_length(row)?;
            let at  = b * seq * n;
            paths.push(viterbi(&emissions[at..at + len * n], n, &transitions, &start, &end));
        }
        Ok(paths)
    }
}

/// Number of leading true entries; rejects empty rows and holes.
fn prefix_length(row: &[bool]) -> Result<usize> {
    let len = row.iter().take_while(|&&m| m).count();
    if len == 0 {
        bail!("sequence mask has no real positions");
    }
    if row[len..].iter().any(|&m| m) {
        bail!("sequence mask is not prefix-contiguous");
    }
    Ok(len)
}

/// Numerically stable log(Σ exp(x)) along `dim`, keeping the dim.
fn log_sum_exp<B: Backend, const D: usize>(x: Tensor<B, D>, dim: usize) -> Tensor<B, D> {
    let shape = x.dims();
    let max = x.clone().max_dim(dim).detach();
    let shifted = x - max.clone().expand(shape);
    max + shifted.exp().sum_dim(dim).log()
}

/// Viterbi over one sequence.
///
/// emissions: row-major [len, num_tags] with len >= 1,
/// transitions: row-major [num_tags, num_tags] indexed [prev, cur].
pub fn viterbi(
    emissions:   &[f32],
    num_tags:    usize,
    transitions: &[f32],
    start:       &[f32],
    end:         &[f32],
) -> Vec<usize> {
    let len = emissions.len() / num_tags;
    assert!(len >= 1 && emissions.len() == len * num_tags, "bad emission buffer");

    let mut score: Vec<f32> = (0..num_tags).map(|t| start[t] + emissions[t]).collect();
    let mut backptr: Vec<Vec<usize>> = Vec::with_capacity(len - 1);

    for i in 1..len {
        let mut next = vec![f32::NEG_INFINITY; num_tags];
        let mut back = vec![0usize; num_tags];
        for cur in 0..num_tags {
            for prev in 0..num_tags {
                let s = score[prev] + transitions[prev * num_tags + cur];
                // strict > keeps the lowest index on ties
                if s > next[cur] {
                    next[cur] = s;
                    back[cur] = prev;
                }
            }
            next[cur] += emissions[i * num_tags + cur];
        }
        score = next;
        backptr.push(back);
    }

    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for t in 0..num_tags {
        let s = score[t] + end[t];
        if s > best_score {
            best_score = s;
            best = t;
        }
    }

    let mut path = vec![best];
    for back in backptr.iter().rev() {
        best = back[best];
        path.push(best);
    }
    path.reverse();
    path
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    type TB = NdArray;

    const N: usize = 3;

    fn random(len: usize, rng: &mut StdRng) -> Vec<f32> {
        (0..len).map(|_| rng.gen_range(-2.0..2.0)).collect()
    }

    struct HostCrf {
        start: Vec<f32>,
        end:   Vec<f32>,
        trans: Vec<f32>,
    }

    impl HostCrf {
        fn of(crf: &Crf<TB>) -> Self {
            Self {
                start: host::floats(crf.start_transitions.val()).unwrap(),
                end:   host::floats(crf.end_transitions.val()).unwrap(),
                trans: host::floats(crf.transitions.val()).unwrap(),
            }
        }

        fn path_score(&self, emissions: &[f32], path: &[usize]) -> f32 {
            let mut s = self.start[path[0]] + self.end[path[path.len() - 1]];
            for (i, &t) in path.iter().enumerate() {
                s += emissions[i * N + t];
                if i > 0 {
                    s += self.trans[path[i - 1] * N + t];
                }
            }
            s
        }
    }

    fn all_paths(len: usize) -> Vec<Vec<usize>> {
        let mut paths = vec![vec![]];
        for _ in 0..len {
            paths = paths
                .into_iter()
                .flat_map(|p| {
                    (0..N).map(move |t| {
                        let mut q = p.clone();
                        q.push(t);
                        q
                    })
                })
                .collect();
        }
        paths
    }

    fn emissions_tensor(values: &[f32], len: usize) -> Tensor<TB, 3> {
        Tensor::<TB, 1>::from_floats(values, &Default::default()).reshape([1, len, N])
    }

    fn tags_tensor(tags: &[i32]) -> Tensor<TB, 2, Int> {
        Tensor::<TB, 1, Int>::from_ints(tags, &Default::default()).reshape([1, tags.len()])
    }

    fn mask_tensor(len: usize, total: usize) -> Tensor<TB, 2, Bool> {
        let v: Vec<i32> = (0..total).map(|i| i32::from(i < len)).collect();
        Tensor::<TB, 1, Int>::from_ints(v.as_slice(), &Default::default())
            .reshape([1, total])
            .equal_elem(1)
    }

    #[test]
    fn test_nll_matches_brute_force() {
        let crf = CrfConfig::new(N).init::<TB>(&Default::default());
        let host_crf = HostCrf::of(&crf);
        let mut rng = StdRng::seed_from_u64(7);
        let emissions = random(4 * N, &mut rng);
        let gold = [2usize, 0, 1, 1];

        let log_z = all_paths(4)
            .iter()
            .map(|p| host_crf.path_score(&emissions, p) as f64)
            .map(f64::exp)
            .sum::<f64>()
            .ln();
        let expected = log_z - host_crf.path_score(&emissions, &gold) as f64;

        let nll = crf.negative_log_likelihood(
            emissions_tensor(&emissions, 4),
            tags_tensor(&[2, 0, 1, 1]),
            mask_tensor(4, 4),
        );
        let got = host::scalar(nll);
        assert!((got - expected).abs() < 1e-4, "got {got}, expected {expected}");
        assert!(got >= 0.0);
    }

    #[test]
    fn test_viterbi_matches_brute_force_argmax() {
        let mut rng = StdRng::seed_from_u64(11);
        for len in 1..=4 {
            let emissions = random(len * N, &mut rng);
            let host_crf = HostCrf {
                start: random(N, &mut rng),
                end:   random(N, &mut rng),
                trans: random(N * N, &mut rng),
            };
            let best = all_paths(len)
                .into_iter()
                .max_by(|a, b| {
                    host_crf
                        .path_score(&emissions, a)
                        .total_cmp(&host_crf.path_score(&emissions, b))
                })
                .unwrap();
            let path = viterbi(&emissions, N, &host_crf.trans, &host_crf.start, &host_crf.end);
            assert_eq!(path, best, "length {len}");
        }
    }

    #[test]
    fn test_viterbi_ties_pick_lowest_index() {
        let zeros = vec![0.0; N];
        let path = viterbi(&vec![0.0; 3 * N], N, &vec![0.0; N * N], &zeros, &zeros);
        assert_eq!(path, vec![0, 0, 0]);
    }

    #[test]
    fn test_padding_does_not_change_loss() {
        let crf = CrfConfig::new(N).init::<TB>(&Default::default());
        let mut rng = StdRng::seed_from_u64(3);
        let real = random(2 * N, &mut rng);

        let short = host::scalar(crf.negative_log_likelihood(
            emissions_tensor(&real, 2),
            tags_tensor(&[1, 2]),
            mask_tensor(2, 2),
        ));

        // same two positions followed by one padded slot with junk scores
        let mut padded = real.clone();
        padded.extend([50.0, -50.0, 9.0]);
        let long = host::scalar(crf.negative_log_likelihood(
            emissions_tensor(&padded, 3),
            tags_tensor(&[1, 2, -1]),
            mask_tensor(2, 3),
        ));

        assert!((short - long).abs() < 1e-5, "{short} vs {long}");
    }

    #[test]
    fn test_padded_positions_get_zero_gradient() {
        type AB = Autodiff<NdArray>;
        let device = Default::default();
        let crf = CrfConfig::new(N).init::<AB>(&device);
        let mut rng = StdRng::seed_from_u64(5);

        let emissions = Tensor::<AB, 1>::from_floats(random(3 * N, &mut rng).as_slice(), &device)
            .reshape([1, 3, N])
            .require_grad();
        let tags = Tensor::<AB, 1, Int>::from_ints([0, 1, -1].as_slice(), &device).reshape([1, 3]);
        let mask = Tensor::<AB, 1, Int>::from_ints([1, 1, 0].as_slice(), &device)
            .reshape([1, 3])
            .equal_elem(1);

        let grads = crf.negative_log_likelihood(emissions.clone(), tags, mask).backward();
        let grad = emissions.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();

        assert!(grad[..2 * N].iter().any(|g| *g != 0.0));
        assert!(grad[2 * N..].iter().all(|g| *g == 0.0));
    }

    #[test]
    fn test_decode_is_deterministic_and_truncated() {
        let crf = CrfConfig::new(N).init::<TB>(&Default::default());
        let mut rng = StdRng::seed_from_u64(9);
        let emissions = random(3 * N, &mut rng);

        let first  = crf.decode(emissions_tensor(&emissions, 3), mask_tensor(2, 3)).unwrap();
        let second = crf.decode(emissions_tensor(&emissions, 3), mask_tensor(2, 3)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].len(), 2);
    }

    #[test]
    fn test_prefix_length_rejects_bad_masks() {
        assert_eq!(prefix_length(&[true, true, false]).unwrap(), 2);
        assert!(prefix_length(&[false, false]).is_err());
        assert!(prefix_length(&[true, false, true]).is_err());
    }
}
