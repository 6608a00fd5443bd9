//! Training example types shared by self-play and the replay buffer.

use serde::{Deserialize, Serialize};

use quoridor_engine::PlayerIdx;

use crate::{GameId, Observation};

/// One training example: a canonical-perspective observation, the search's
/// visit-count policy over canonical action ids, and the final game value
/// from the acting player's perspective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplaySample {
    pub observation: Observation,
    pub policy: Vec<f32>,
    pub value: f32,

    /// Game that produced this sample; lets whole games be traced or evicted
    /// together.
    pub game_id: GameId,
}

/// A move awaiting its value label. Self-play holds these until the game
/// ends, then back-fills `value` from the outcome.
#[derive(Clone, Debug)]
pub struct PendingMove {
    pub player: PlayerIdx,
    pub observation: Observation,
    pub policy: Vec<f32>,
}
