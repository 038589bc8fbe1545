// ============================================================
// Layer 3 — Consistency Post-Processor
// ============================================================
// The location head predicts a location after every sentence
// independently of the state tags. Before writing predictions
// we rewrite those raw locations so they agree with the tags:
//
//   O_C, O_D, D  → location after the sentence is "-"
//   E            → location after = resolved location before
//   C, M         → trust the raw prediction
//
// Boundary 0 (before the first sentence) is never predicted by
// the model. It is derived from the first tag only:
//
//   first tag E, M, D     → "?"  (existed, location unknown)
//   first tag O_C, O_D, C → "-"  (did not exist yet)
//
// The pass runs left to right because E copies the previously
// *resolved* boundary, not the raw model output.
//
// Pure functions, no learned parameters.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{
    instance::InstanceMeta,
    state::{StateTag, NIL_LOC, UNK_LOC},
};

/// What to do when a MOVE lands on the location the entity is
/// already at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MovePolicy {
    /// Keep the predicted location as is
    #[default]
    Trust,
    /// Replace it with the unknown sentinel "?"
    Unknown,
}

/// One sentence of the final prediction: (state, location before, location after)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePrediction {
    pub state:      String,
    pub loc_before: String,
    pub loc_after:  String,
}

/// Location of boundary 0, derived from the first sentence's tag.
pub fn initial_location(first: StateTag) -> &'static str {
    if first.existed_before() { UNK_LOC } else { NIL_LOC }
}

/// Rewrite raw per-sentence locations into a consistent boundary sequence.
///
/// `raw_locations[i]` is the model's location after sentence `i`, so both
/// slices have one entry per sentence. The result has one entry per
/// boundary, i.e. `tags.len() + 1`.
pub fn resolve_locations<S: AsRef<str>>(
    tags:          &[StateTag],
    raw_locations: &[S],
    policy:        MovePolicy,
) -> Vec<String> {
    assert_eq!(
        tags.len(),
        raw_locations.len(),
        "one raw location per sentence expected"
    );

    let Some(&first) = tags.first() else {
        return Vec::new();
    };

    let mut resolved = Vec::with_capacity(tags.len() + 1);
    resolved.push(initial_location(first).to_string());

    for (tag, raw) in tags.iter().zip(raw_locations) {
        let before = resolved[resolved.len() - 1].clone();
        let after = match tag {
            t if t.is_absent_after() => NIL_LOC.to_string(),
            StateTag::Exist => before,
            StateTag::Move if policy == MovePolicy::Unknown && raw.as_ref() == before => {
                UNK_LOC.to_string()
            }
            // create, move: trust the location head
            _ => raw.as_ref().to_string(),
        };
        resolved.push(after);
    }

    resolved
}

/// Zip tags with the resolved boundary sequence into per-sentence triples.
pub fn format_prediction(tags: &[StateTag], boundaries: &[String]) -> Vec<SentencePrediction> {
    assert_eq!(tags.len() + 1, boundaries.len());
    tags.iter()
        .enumerate()
        .map(|(i, tag)| SentencePrediction {
            state:      tag.output_state().to_string(),
            loc_before: boundaries[i].clone(),
            loc_after:  boundaries[i + 1].clone(),
        })
        .collect()
}

/// Final prediction for one (paragraph, entity) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePrediction {
    pub para_id:     u32,
    pub entity:      String,
    pub total_sents: usize,
    pub sentences:   Vec<SentencePrediction>,
}

/// Turn decoded tag indices and raw candidate indices into the final,
/// consistent prediction for one instance.
///
/// Both sequences must already be cut to the instance's sentence count.
pub fn build_prediction(
    meta:       &InstanceMeta,
    tags:       &[StateTag],
    raw_cands:  &[usize],
    policy:     MovePolicy,
) -> InstancePrediction {
    assert_eq!(tags.len(), meta.total_sents, "decoded tags must cover every sentence");
    let raw_locations: Vec<&str> = raw_cands
        .iter()
        .map(|&c| meta.loc_candidates[c].as_str())
        .collect();
    let boundaries = resolve_locations(tags, &raw_locations, policy);
    InstancePrediction {
        para_id:     meta.para_id,
        entity:      meta.entity.clone(),
        total_sents: meta.total_sents,
        sentences:   format_prediction(tags, &boundaries),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use StateTag::*;

    #[test]
    fn test_create_exist_destroy_carries_resolved_location() {
        // Candidate list is ["x", "y"]; raw "z" stands for whatever the
        // head predicted after the destroy, which must be ignored.
        let tags = [Create, Exist, Destroy];
        let raw  = ["x", "y", "z"];
        let out  = resolve_locations(&tags, &raw, MovePolicy::Trust);
        assert_eq!(out, vec!["-", "x", "x", "-"]);
    }

    #[test]
    fn test_initial_location_follows_first_tag() {
        assert_eq!(initial_location(Exist), "?");
        assert_eq!(initial_location(Move), "?");
        assert_eq!(initial_location(Destroy), "?");
        assert_eq!(initial_location(NoneBeforeCreate), "-");
        assert_eq!(initial_location(NoneAfterDestroy), "-");
        assert_eq!(initial_location(Create), "-");
    }

    #[test]
    fn test_exist_at_start_carries_unknown() {
        let out = resolve_locations(&[Exist, Move, Exist], &["a", "b", "c"], MovePolicy::Trust);
        assert_eq!(out, vec!["?", "?", "b", "b"]);
    }

    #[test]
    fn test_move_to_same_location_policy() {
        let tags = [Create, Move];
        let raw  = ["soil", "soil"];
        assert_eq!(
            resolve_locations(&tags, &raw, MovePolicy::Trust),
            vec!["-", "soil", "soil"]
        );
        assert_eq!(
            resolve_locations(&tags, &raw, MovePolicy::Unknown),
            vec!["-", "soil", "?"]
        );
    }

    #[test]
    fn test_absent_tags_clear_location_whatever_the_head_says() {
        let tags = [Create, Destroy, NoneAfterDestroy, NoneAfterDestroy];
        let raw  = ["mine", "mine", "mine", "mine"];
        let out  = resolve_locations(&tags, &raw, MovePolicy::Trust);
        assert_eq!(out, vec!["-", "mine", "-", "-", "-"]);
    }

    #[test]
    fn test_empty_sequence() {
        let raw: [&str; 0] = [];
        assert!(resolve_locations(&[], &raw, MovePolicy::Trust).is_empty());
    }

    #[test]
    fn test_format_prediction_uses_output_states() {
        let tags = [Create, Move, Destroy];
        let boundaries: Vec<String> = ["-", "rock", "water", "-"]
            .iter().map(|s| s.to_string()).collect();
        let pred = format_prediction(&tags, &boundaries);
        assert_eq!(pred.len(), 3);
        assert_eq!(pred[1], SentencePrediction {
            state:      "MOVE".into(),
            loc_before: "rock".into(),
            loc_after:  "water".into(),
        });
        assert_eq!(pred[2].state, "DESTROY");
        assert_eq!(pred[2].loc_after, "-");
    }

    #[test]
    fn test_build_prediction_maps_candidate_indices() {
        let meta = InstanceMeta {
            para_id:        249,
            entity:         "rocks".into(),
            total_sents:    3,
            loc_candidates: vec!["river".into(), "air".into(), "?".into()],
        };
        let pred = build_prediction(&meta, &[Create, Exist, Move], &[0, 1, 1], MovePolicy::Trust);
        assert_eq!(pred.total_sents, 3);
        let triples: Vec<(&str, &str, &str)> = pred.sentences.iter()
            .map(|s| (s.state.as_str(), s.loc_before.as_str(), s.loc_after.as_str()))
            .collect();
        assert_eq!(triples, vec![
            ("CREATE", "-", "river"),
            ("NONE", "river", "river"),
            ("MOVE", "river", "air"),
        ]);
    }
}
