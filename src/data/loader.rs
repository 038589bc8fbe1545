// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Reads a JSON dataset file into validated EntityInstances.
//
// File layout: a JSON array, one object per (paragraph, entity):
//
//   {
//     "id": 12,
//     "entity": "ironore",
//     "sentence_list":  [["iron","ore","is","mined","."], [...]],
//     "entity_mention": [[0,1], []],        per sentence
//     "verb_mention":   [[3], [7]],         per sentence
//     "loc_cand_list":  ["water","soil"],
//     "loc_mention":    [[12], [15,16]],    per candidate
//     "gold_state_seq": ["O_C","C"],        optional
//     "gold_loc_seq":   ["-","-","water"]   optional, sentences + 1
//   }
//
// Token indices are paragraph-global. The unknown sentinel "?" is
// appended to the candidate list when a file does not carry it.
//
// Everything that can be wrong with a file is caught here, so the
// batcher and the model can rely on consistent shapes.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};

use crate::domain::{
    instance::{EntityInstance, GoldLocation},
    state::{StateTag, NIL_LOC, UNK_LOC},
    traits::InstanceSource,
};

/// On-disk shape of one instance, before validation
#[derive(Debug, Deserialize)]
struct RawInstance {
    id:             u32,
    entity:         String,
    sentence_list:  Vec<Vec<String>>,
    entity_mention: Vec<Vec<usize>>,
    verb_mention:   Vec<Vec<usize>>,
    loc_cand_list:  Vec<String>,
    #[serde(default)]
    loc_mention:    Vec<Vec<usize>>,
    #[serde(default)]
    gold_state_seq: Option<Vec<String>>,
    #[serde(default)]
    gold_loc_seq:   Option<Vec<String>>,
}

/// Loads instances from one JSON file.
pub struct JsonInstanceLoader {
    path: PathBuf,
}

impl JsonInstanceLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InstanceSource for JsonInstanceLoader {
    fn load_all(&self) -> Result<Vec<EntityInstance>> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read dataset '{}'", self.path.display()))?;
        let instances = parse_instances(&json)
            .with_context(|| format!("Invalid dataset '{}'", self.path.display()))?;
        tracing::info!(
            "Loaded {} instances from '{}'",
            instances.len(),
            self.path.display()
        );
        Ok(instances)
    }
}

/// Parse and validate a JSON array of instances.
pub fn parse_instances(json: &str) -> Result<Vec<EntityInstance>> {
    let raw: Vec<RawInstance> = serde_json::from_str(json)?;
    raw.into_iter()
        .enumerate()
        .map(|(i, r)| {
            let (id, entity) = (r.id, r.entity.clone());
            validate(r).with_context(|| format!("instance #{i} (paragraph {id}, entity '{entity}')"))
        })
        .collect()
}

fn validate(raw: RawInstance) -> Result<EntityInstance> {
    let total_sents  = raw.sentence_list.len();
    let total_tokens: usize = raw.sentence_list.iter().map(Vec::len).sum();

    ensure!(total_sents > 0, "paragraph has no sentences");
    ensure!(
        raw.entity_mention.len() == total_sents,
        "entity_mention has {} rows, expected {total_sents}",
        raw.entity_mention.len()
    );
    ensure!(
        raw.verb_mention.len() == total_sents,
        "verb_mention has {} rows, expected {total_sents}",
        raw.verb_mention.len()
    );
    check_indices("entity_mention", &raw.entity_mention, total_tokens)?;
    check_indices("verb_mention", &raw.verb_mention, total_tokens)?;

    // Candidate mentions default to empty when the file omits them
    let mut loc_candidates = raw.loc_cand_list;
    let mut loc_mentions   = raw.loc_mention;
    if loc_mentions.is_empty() {
        loc_mentions = vec![Vec::new(); loc_candidates.len()];
    }
    ensure!(
        loc_mentions.len() == loc_candidates.len(),
        "loc_mention has {} rows for {} candidates",
        loc_mentions.len(),
        loc_candidates.len()
    );
    check_indices("loc_mention", &loc_mentions, total_tokens)?;
    if !loc_candidates.iter().any(|c| c == UNK_LOC) {
        loc_candidates.push(UNK_LOC.to_string());
        loc_mentions.push(Vec::new());
    }

    let gold_states = raw
        .gold_state_seq
        .map(|seq| -> Result<Vec<StateTag>> {
            ensure!(
                seq.len() == total_sents,
                "gold_state_seq has {} tags for {total_sents} sentences",
                seq.len()
            );
            seq.iter().map(|s| s.parse::<StateTag>()).collect()
        })
        .transpose()?;

    let gold_locations = raw
        .gold_loc_seq
        .map(|seq| -> Result<Vec<GoldLocation>> {
            ensure!(
                seq.len() == total_sents + 1,
                "gold_loc_seq has {} boundaries for {total_sents} sentences",
                seq.len()
            );
            seq.iter().map(|loc| gold_location(loc, &loc_candidates)).collect()
        })
        .transpose()?;

    Ok(EntityInstance {
        para_id:         raw.id,
        entity:          raw.entity,
        sentences:       raw.sentence_list,
        entity_mentions: raw.entity_mention,
        verb_mentions:   raw.verb_mention,
        loc_candidates,
        loc_mentions,
        gold_states,
        gold_locations,
    })
}

fn gold_location(loc: &str, candidates: &[String]) -> Result<GoldLocation> {
    if loc == NIL_LOC {
        return Ok(GoldLocation::NotApplicable);
    }
    match candidates.iter().position(|c| c == loc) {
        Some(idx) => Ok(GoldLocation::Candidate(idx)),
        None      => bail!("gold location '{loc}' is not a candidate"),
    }
}

fn check_indices(field: &str, rows: &[Vec<usize>], total_tokens: usize) -> Result<()> {
    for (row, indices) in rows.iter().enumerate() {
        if let Some(bad) = indices.iter().find(|&&t| t >= total_tokens) {
            bail!("{field}[{row}] refers to token {bad}, paragraph has {total_tokens} tokens");
        }
    }
    Ok(())
}
