// ============================================================
// Layer 3 — Entity Instance Domain Type
// ============================================================
// One trackable (paragraph, entity) pair.
//
// A paragraph is an ordered list of sentences, each an ordered
// list of tokens. All mention indices are paragraph-global, i.e.
// they index into the concatenation of every sentence's tokens.
//
// Example (paragraph 12, entity "ironore"):
//   sentences:        [["iron","ore","is","mined"], ["it","moves","to","water"]]
//   entity_mentions:  [[0, 1], [4]]
//   verb_mentions:    [[3], [5]]
//   loc_candidates:   ["water", "?"]
//   gold_states:      [C, M]
//   gold_locations:   ["-", "?", "water"]   (one per boundary)
//
// Reference: Rust Book §5 (Structs)

use serde::{Deserialize, Serialize};

use crate::domain::state::StateTag;

/// Gold location at one boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoldLocation {
    /// "-" — the entity does not exist, no location supervision
    NotApplicable,
    /// Index into the instance's candidate list (the "?" sentinel included)
    Candidate(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInstance {
    pub para_id:          u32,
    pub entity:           String,
    pub sentences:        Vec<Vec<String>>,
    /// Per sentence, the tokens mentioning the entity (may be empty)
    pub entity_mentions:  Vec<Vec<usize>>,
    /// Per sentence, the tokens of the predicate (may be empty)
    pub verb_mentions:    Vec<Vec<usize>>,
    /// Candidate location strings, always ending with the "?" sentinel
    pub loc_candidates:   Vec<String>,
    /// Per candidate, the tokens that mention it
    pub loc_mentions:     Vec<Vec<usize>>,
    /// One tag per sentence; absent for unlabelled data
    pub gold_states:      Option<Vec<StateTag>>,
    /// One location per boundary (sentence count + 1); absent for unlabelled data
    pub gold_locations:   Option<Vec<GoldLocation>>,
}

impl EntityInstance {
    pub fn total_sents(&self) -> usize {
        self.sentences.len()
    }

    pub fn total_tokens(&self) -> usize {
        self.sentences.iter().map(Vec::len).sum()
    }

    pub fn total_loc_cands(&self) -> usize {
        self.loc_candidates.len()
    }

    /// Flattened paragraph tokens in reading order
    pub fn tokens(&self) -> Vec<String> {
        self.sentences.iter().flatten().cloned().collect()
    }

    pub fn meta(&self) -> InstanceMeta {
        InstanceMeta {
            para_id:        self.para_id,
            entity:         self.entity.clone(),
            total_sents:    self.total_sents(),
            loc_candidates: self.loc_candidates.clone(),
        }
    }
}

/// The parts of an instance that travel with a batch to decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMeta {
    pub para_id:        u32,
    pub entity:         String,
    pub total_sents:    usize,
    pub loc_candidates: Vec<String>,
}

pub fn instance_key(para_id: u32, entity: &str) -> String {
    format!("{para_id}-{entity}")
}
