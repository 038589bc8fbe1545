// ============================================================
// Layer 3 — State Tags and Location Sentinels
// ============================================================
// The closed vocabulary of the tracker.
//
// Every sentence of a paragraph receives exactly one tag that
// describes what happened to the entity in that sentence:
//
//   O_C  entity does not exist yet (before creation)
//   O_D  entity no longer exists (after destruction)
//   E    entity exists, nothing changes
//   M    entity moves to a new location
//   C    entity is created
//   D    entity is destroyed
//
// The numeric indices are the rows/columns of the CRF
// transition matrix and the columns of the emission scores,
// so they must never be reordered.
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Number of state tags (emission width of the sentence decoder)
pub const NUM_STATES: usize = 6;

/// Padding value for tag positions beyond a paragraph's sentence count
pub const PAD_STATE: i32 = -1;

/// Padding value for location positions that carry no supervision
pub const PAD_LOC: i32 = -1;

/// Location sentinel: entity does not exist here, location is not applicable
pub const NIL_LOC: &str = "-";

/// Location sentinel: entity exists but its location is unknown
pub const UNK_LOC: &str = "?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateTag {
    /// O_C — not created yet
    NoneBeforeCreate,
    /// O_D — already destroyed
    NoneAfterDestroy,
    /// E — exists, no change
    Exist,
    /// M — moves
    Move,
    /// C — created
    Create,
    /// D — destroyed
    Destroy,
}

impl StateTag {
    pub const ALL: [StateTag; NUM_STATES] = [
        StateTag::NoneBeforeCreate,
        StateTag::NoneAfterDestroy,
        StateTag::Exist,
        StateTag::Move,
        StateTag::Create,
        StateTag::Destroy,
    ];

    pub fn index(self) -> usize {
        match self {
            StateTag::NoneBeforeCreate => 0,
            StateTag::NoneAfterDestroy => 1,
            StateTag::Exist            => 2,
            StateTag::Move             => 3,
            StateTag::Create           => 4,
            StateTag::Destroy          => 5,
        }
    }

    /// Inverse of [`StateTag::index`]. Anything outside the closed set
    /// is a fatal error for the caller.
    pub fn from_index(idx: usize) -> Result<Self> {
        match Self::ALL.get(idx) {
            Some(tag) => Ok(*tag),
            None      => bail!("Unknown state tag index {idx} (expected 0..{NUM_STATES})"),
        }
    }

    /// Short label used in dataset files ("O_C", "E", ...)
    pub fn label(self) -> &'static str {
        match self {
            StateTag::NoneBeforeCreate => "O_C",
            StateTag::NoneAfterDestroy => "O_D",
            StateTag::Exist            => "E",
            StateTag::Move             => "M",
            StateTag::Create           => "C",
            StateTag::Destroy          => "D",
        }
    }

    /// State name written to the prediction file.
    /// The three "nothing happens" tags collapse to NONE.
    pub fn output_state(self) -> &'static str {
        match self {
            StateTag::NoneBeforeCreate
            | StateTag::NoneAfterDestroy
            | StateTag::Exist   => "NONE",
            StateTag::Create    => "CREATE",
            StateTag::Move      => "MOVE",
            StateTag::Destroy   => "DESTROY",
        }
    }

    /// True when the entity does not exist after this sentence
    pub fn is_absent_after(self) -> bool {
        matches!(
            self,
            StateTag::NoneBeforeCreate | StateTag::NoneAfterDestroy | StateTag::Destroy
        )
    }

    /// True when the entity already existed before this sentence
    pub fn existed_before(self) -> bool {
        matches!(self, StateTag::Exist | StateTag::Move | StateTag::Destroy)
    }
}

impl FromStr for StateTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "O_C" => Ok(StateTag::NoneBeforeCreate),
            "O_D" => Ok(StateTag::NoneAfterDestroy),
            "E"   => Ok(StateTag::Exist),
            "M"   => Ok(StateTag::Move),
            "C"   => Ok(StateTag::Create),
            "D"   => Ok(StateTag::Destroy),
            other => bail!("Unknown state tag '{other}'"),
        }
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
