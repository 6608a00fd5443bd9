//! Feature extraction: GameState → Observation
//!
//! Converts full game state into a fixed-length array observation from the
//! perspective of a given player.

use quoridor_engine::{canonical, Cell, GameConfig, GameState, PlayerIdx, WallGrid};

use super::Observation;

/// Converts a full GameState into a fixed-length array observation
/// from the perspective of a given player.
pub trait FeatureExtractor: Clone + Send + Sync {
    /// Returns the length of the flattened observation vector.
    ///
    /// For all states and players, encode(...) must return an Observation
    /// with shape [obs_size].
    fn obs_size(&self) -> usize;

    /// Encode state from the perspective of `player` into a 1D array.
    ///
    /// Requirements:
    /// - Deterministic given (state, player).
    /// - Shape is [obs_size()], rank-1, dtype f32.
    /// - No side effects or internal randomness.
    fn encode(&self, state: &GameState, player: PlayerIdx) -> Observation;

    /// Left-right mirror of an encoded observation, equal to encoding the
    /// mirrored state. Used for symmetry augmentation.
    fn mirror_observation(&self, obs: &Observation) -> Observation;
}

pub const OBS_PLANES: usize = 6;

/// Plane-based board encoder.
///
/// Encodes the canonical-perspective board into 6 stacked n x n planes,
/// flattened row-major:
/// 0. own pawn (one-hot)
/// 1. opponent pawn (one-hot)
/// 2. horizontal walls (slot lattice in the upper-left (n-1) x (n-1) region)
/// 3. vertical walls (same layout)
/// 4. own walls remaining, as a constant fill normalized by the allotment
/// 5. opponent walls remaining, same normalization
#[derive(Clone, Debug)]
pub struct BoardEncoder {
    board_size: u8,
    walls_per_player: u8,
}

impl BoardEncoder {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            board_size: config.board_size,
            walls_per_player: config.walls_per_player.max(1),
        }
    }

    fn plane_size(&self) -> usize {
        self.board_size as usize * self.board_size as usize
    }

    /// Reconstruct the canonical-perspective board from an observation.
    ///
    /// Inverse of `encode` up to the fields the planes carry: `to_move` and
    /// `ply` are not encoded and come back as 0. Used by heuristic
    /// evaluators, which see positions only through the observation.
    pub fn decode(&self, obs: &Observation) -> GameState {
        let n = self.board_size;
        let plane = self.plane_size();
        debug_assert_eq!(obs.len(), OBS_PLANES * plane);

        let find_pawn = |offset: usize| {
            let mut best = 0usize;
            let mut best_v = f32::NEG_INFINITY;
            for i in 0..plane {
                if obs[offset + i] > best_v {
                    best_v = obs[offset + i];
                    best = i;
                }
            }
            Cell::new((best / n as usize) as u8, (best % n as usize) as u8)
        };

        let mut h_walls = WallGrid::new(n);
        let mut v_walls = WallGrid::new(n);
        for r in 0..n as usize - 1 {
            for c in 0..n as usize - 1 {
                let i = r * n as usize + c;
                if obs[2 * plane + i] > 0.5 {
                    h_walls.set(r as u8, c as u8);
                }
                if obs[3 * plane + i] > 0.5 {
                    v_walls.set(r as u8, c as u8);
                }
            }
        }

        let stock = |offset: usize| {
            (obs[offset] * self.walls_per_player as f32)
                .round()
                .clamp(0.0, 255.0) as u8
        };

        GameState {
            board_size: n,
            positions: [find_pawn(0), find_pawn(plane)],
            walls_remaining: [stock(4 * plane), stock(5 * plane)],
            h_walls,
            v_walls,
            to_move: 0,
            ply: 0,
        }
    }
}

impl FeatureExtractor for BoardEncoder {
    fn obs_size(&self) -> usize {
        OBS_PLANES * self.plane_size()
    }

    fn encode(&self, state: &GameState, player: PlayerIdx) -> Observation {
        let canon = canonical(state, player);
        let n = self.board_size as usize;
        let plane = self.plane_size();
        let mut features = vec![0.0f32; OBS_PLANES * plane];

        let cell_idx = |cell: Cell| cell.row as usize * n + cell.col as usize;
        features[cell_idx(canon.positions[0])] = 1.0;
        features[plane + cell_idx(canon.positions[1])] = 1.0;

        for (r, c) in canon.h_walls.iter() {
            features[2 * plane + r as usize * n + c as usize] = 1.0;
        }
        for (r, c) in canon.v_walls.iter() {
            features[3 * plane + r as usize * n + c as usize] = 1.0;
        }

        let own_stock = canon.walls_remaining[0] as f32 / self.walls_per_player as f32;
        let opp_stock = canon.walls_remaining[1] as f32 / self.walls_per_player as f32;
        features[4 * plane..5 * plane].fill(own_stock);
        features[5 * plane..6 * plane].fill(opp_stock);

        Observation::from_vec(features)
    }

    fn mirror_observation(&self, obs: &Observation) -> Observation {
        let n = self.board_size as usize;
        let plane = self.plane_size();
        debug_assert_eq!(obs.len(), OBS_PLANES * plane);

        let mut mirrored = obs.clone();
        // Pawn planes flip cell columns; wall planes flip slot columns (the
        // lattice is one narrower). The stock planes are constant fills.
        for p in 0..4 {
            let width = if p < 2 { n } else { n - 1 };
            let rows = if p < 2 { n } else { n - 1 };
            for r in 0..rows {
                for c in 0..width {
                    mirrored[p * plane + r * n + (width - 1 - c)] = obs[p * plane + r * n + c];
                }
            }
        }
        mirrored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quoridor_engine::{apply_action, mirror, new_game, Action, WallOrientation};

    #[test]
    fn test_obs_size() {
        let encoder = BoardEncoder::new(&GameConfig::standard());
        assert_eq!(encoder.obs_size(), 6 * 81);
    }

    #[test]
    fn test_encode_initial_position() {
        let config = GameConfig::standard();
        let encoder = BoardEncoder::new(&config);
        let state = new_game(&config);
        let obs = encoder.encode(&state, 0);

        assert_eq!(obs.len(), encoder.obs_size());
        // Own pawn at (0, 4), opponent at (8, 4).
        assert_eq!(obs[4], 1.0);
        assert_eq!(obs[81 + 8 * 9 + 4], 1.0);
        // Full stocks.
        assert_eq!(obs[4 * 81], 1.0);
        assert_eq!(obs[5 * 81], 1.0);
    }

    #[test]
    fn test_encode_determinism() {
        let config = GameConfig::standard();
        let encoder = BoardEncoder::new(&config);
        let state = new_game(&config);
        assert_eq!(encoder.encode(&state, 0), encoder.encode(&state, 0));
    }

    #[test]
    fn test_perspectives_agree_at_start() {
        // The opening position is symmetric under the canonical transform,
        // so both players see the same observation.
        let config = GameConfig::standard();
        let encoder = BoardEncoder::new(&config);
        let state = new_game(&config);
        assert_eq!(encoder.encode(&state, 0), encoder.encode(&state, 1));
    }

    #[test]
    fn test_perspectives_differ_after_move() {
        let config = GameConfig::standard();
        let encoder = BoardEncoder::new(&config);
        let state = new_game(&config);
        let state = apply_action(&state, Action::Move { row: 1, col: 4 }).unwrap();
        assert_ne!(encoder.encode(&state, 0), encoder.encode(&state, 1));
    }

    #[test]
    fn test_decode_round_trip() {
        let config = GameConfig::standard();
        let encoder = BoardEncoder::new(&config);
        let mut state = new_game(&config);
        state = apply_action(
            &state,
            Action::Wall {
                row: 3,
                col: 3,
                orientation: WallOrientation::Horizontal,
            },
        )
        .unwrap();
        state = apply_action(&state, Action::Move { row: 7, col: 4 }).unwrap();

        let decoded = encoder.decode(&encoder.encode(&state, 0));
        assert_eq!(decoded.positions, state.positions);
        assert_eq!(decoded.walls_remaining, state.walls_remaining);
        assert_eq!(decoded.h_walls, state.h_walls);
        assert_eq!(decoded.v_walls, state.v_walls);
    }

    #[test]
    fn test_decode_sees_canonical_perspective() {
        let config = GameConfig::standard();
        let encoder = BoardEncoder::new(&config);
        let state = new_game(&config);
        let state = apply_action(&state, Action::Move { row: 1, col: 4 }).unwrap();

        // From player 1's perspective, player 1's own pawn sits at the
        // bottom and the opponent's advanced pawn appears at the flipped row.
        let decoded = encoder.decode(&encoder.encode(&state, 1));
        assert_eq!(decoded.positions[0], Cell::new(0, 4));
        assert_eq!(decoded.positions[1], Cell::new(7, 4));
    }

    #[test]
    fn test_mirror_observation_matches_mirrored_state() {
        let config = GameConfig::standard();
        let encoder = BoardEncoder::new(&config);
        let mut state = new_game(&config);
        state = apply_action(
            &state,
            Action::Wall {
                row: 2,
                col: 1,
                orientation: WallOrientation::Vertical,
            },
        )
        .unwrap();
        state = apply_action(&state, Action::Move { row: 7, col: 4 }).unwrap();
        state = apply_action(&state, Action::Move { row: 0, col: 3 }).unwrap();

        for player in [0u8, 1] {
            let direct = encoder.encode(&mirror(&state), player);
            let via_obs = encoder.mirror_observation(&encoder.encode(&state, player));
            assert_eq!(direct, via_obs, "player {player}");
        }
    }
}
