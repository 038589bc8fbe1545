// Small hand-written instances shared by unit tests across layers.

use crate::data::loader::parse_instances;
use crate::domain::instance::EntityInstance;

const IRONORE: &str = r#"[{
    "id": 12,
    "entity": "ironore",
    "sentence_list": [["iron", "ore", "is", "mined"], ["it", "moves", "to", "water"]],
    "entity_mention": [[0, 1], []],
    "verb_mention": [[3], [5]],
    "loc_cand_list": ["water"],
    "loc_mention": [[7]],
    "gold_state_seq": ["C", "M"],
    "gold_loc_seq": ["-", "?", "water"]
}]"#;

const SEED: &str = r#"[{
    "id": 3,
    "entity": "seed",
    "sentence_list": [["plant", "the", "seed"]],
    "entity_mention": [[2]],
    "verb_mention": [[0]],
    "loc_cand_list": ["soil"],
    "gold_state_seq": ["C"],
    "gold_loc_seq": ["-", "soil"]
}]"#;

pub fn ironore() -> EntityInstance {
    parse_instances(IRONORE).unwrap().remove(0)
}

pub fn short_seed() -> EntityInstance {
    parse_instances(SEED).unwrap().remove(0)
}
