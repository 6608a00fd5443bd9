//! Action encoding: Action ↔ ActionId
//!
//! Fixed action space of size n*n + 2*(n-1)^2, covering all syntactically
//! possible Quoridor moves regardless of current legality: every pawn
//! destination cell, then every horizontal wall slot, then every vertical
//! wall slot, each block in row-major order.

use quoridor_engine::{Action, PlayerIdx, WallOrientation};

use super::ActionId;

/// Encodes/decodes between engine Actions and discrete ActionIds, and maps
/// actions and policies across the board symmetries used in training.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActionEncoder {
    board_size: u8,
}

impl ActionEncoder {
    pub fn new(board_size: u8) -> Self {
        Self { board_size }
    }

    /// Size of the discrete action space: n*n pawn destinations plus
    /// (n-1)^2 slots per wall orientation. 293 on the standard board.
    pub fn action_space_size(&self) -> usize {
        let n = self.board_size as usize;
        n * n + 2 * (n - 1) * (n - 1)
    }

    /// Encode a concrete Action into a discrete ActionId.
    ///
    /// Packing scheme:
    /// - Move (r, c)          -> r*n + c
    /// - Wall H at slot (r,c) -> n*n + r*(n-1) + c
    /// - Wall V at slot (r,c) -> n*n + (n-1)^2 + r*(n-1) + c
    ///
    /// Panics in debug builds if the Action has indices out of range.
    pub fn encode(&self, action: &Action) -> ActionId {
        let n = self.board_size as u16;
        let side = n - 1;
        let id = match *action {
            Action::Move { row, col } => row as u16 * n + col as u16,
            Action::Wall {
                row,
                col,
                orientation,
            } => {
                let block = match orientation {
                    WallOrientation::Horizontal => 0,
                    WallOrientation::Vertical => 1,
                };
                n * n + block * side * side + row as u16 * side + col as u16
            }
        };
        debug_assert!(
            (id as usize) < self.action_space_size(),
            "ActionId {id} out of range"
        );
        id
    }

    /// Decode an ActionId back into an Action.
    ///
    /// This may produce syntactically valid but *illegal* Actions for the
    /// current state; the search masks illegal ids against the legal set.
    ///
    /// Panics if id >= action_space_size.
    pub fn decode(&self, id: ActionId) -> Action {
        let n = self.board_size as u16;
        let side = n - 1;
        assert!(
            (id as usize) < self.action_space_size(),
            "ActionId {id} out of range for board size {n}"
        );

        if id < n * n {
            return Action::Move {
                row: (id / n) as u8,
                col: (id % n) as u8,
            };
        }

        let rem = id - n * n;
        let orientation = if rem < side * side {
            WallOrientation::Horizontal
        } else {
            WallOrientation::Vertical
        };
        let slot = rem % (side * side);
        Action::Wall {
            row: (slot / side) as u8,
            col: (slot % side) as u8,
            orientation,
        }
    }

    /// Map an absolute action into the canonical perspective of `player`
    /// (and back: the transform is an involution). Identity for player 0;
    /// a vertical flip of move rows and wall slot rows for player 1.
    pub fn to_canonical(&self, action: Action, player: PlayerIdx) -> Action {
        if player == 0 {
            return action;
        }
        let n = self.board_size;
        match action {
            Action::Move { row, col } => Action::Move {
                row: n - 1 - row,
                col,
            },
            Action::Wall {
                row,
                col,
                orientation,
            } => Action::Wall {
                row: n - 2 - row,
                col,
                orientation,
            },
        }
    }

    /// Left-right mirror of an action, matching `quoridor_engine::mirror`.
    pub fn mirror_action(&self, action: Action) -> Action {
        let n = self.board_size;
        match action {
            Action::Move { row, col } => Action::Move {
                row,
                col: n - 1 - col,
            },
            Action::Wall {
                row,
                col,
                orientation,
            } => Action::Wall {
                row,
                col: n - 2 - col,
                orientation,
            },
        }
    }

    /// Left-right mirror of a policy vector over the full action space.
    /// An involution; pairs with `mirror` on states for data augmentation.
    pub fn mirror_policy(&self, policy: &[f32]) -> Vec<f32> {
        debug_assert_eq!(policy.len(), self.action_space_size());
        let mut mirrored = vec![0.0f32; policy.len()];
        for (id, &p) in policy.iter().enumerate() {
            if p == 0.0 {
                continue;
            }
            let action = self.decode(id as ActionId);
            let target = self.encode(&self.mirror_action(action));
            mirrored[target as usize] = p;
        }
        mirrored
    }
}
