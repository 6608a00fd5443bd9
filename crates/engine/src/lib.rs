//! Quoridor Game Engine
//!
//! A Markov game state engine for the board game Quoridor, designed for RL
//! training. Core object is a single `GameState` (plain data). No logic baked
//! into methods; pure functions operate on it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

// =============================================================================
// Section 1: Basic types and configuration
// =============================================================================

/// Index into players array: 0 or 1
pub type PlayerIdx = u8;

pub const NUM_PLAYERS: usize = 2;

/// Standard tournament board: 9x9 cells, 10 walls per player
pub const STANDARD_BOARD_SIZE: u8 = 9;

/// The four orthogonal step directions as (row, col) deltas.
const DIRS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// A pawn location on the n x n cell grid.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

impl Cell {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

/// Wall orientation. A horizontal wall at slot (r, c) blocks vertical movement
/// between rows r and r+1 for columns c and c+1; a vertical wall at (r, c)
/// blocks horizontal movement between columns c and c+1 for rows r and r+1.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WallOrientation {
    Horizontal,
    Vertical,
}

/// An action taken on the player's turn.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Move the pawn to the given destination cell (step, jump, or diagonal).
    Move { row: u8, col: u8 },
    /// Place a wall anchored at the given slot on the (n-1) x (n-1) lattice.
    Wall {
        row: u8,
        col: u8,
        orientation: WallOrientation,
    },
}

/// Game parameters fixed for the duration of a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Side length of the cell grid.
    pub board_size: u8,

    /// Wall allotment per player at game start.
    pub walls_per_player: u8,

    /// Hard ply cap; reaching it without a winner is a draw.
    pub max_plies: u16,
}

impl GameConfig {
    /// Standard 9x9 rules: 10 walls each, 162-ply cap.
    pub fn standard() -> Self {
        Self::with_board_size(STANDARD_BOARD_SIZE)
    }

    /// Scaled rules for an n x n board: n*n/8 walls each, 2*n*n ply cap.
    pub fn with_board_size(n: u8) -> Self {
        let cells = n as u16 * n as u16;
        Self {
            board_size: n,
            walls_per_player: (cells / 8) as u8,
            max_plies: 2 * cells,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_size < 3 {
            return Err(ConfigError::BoardTooSmall(self.board_size));
        }
        if self.max_plies == 0 {
            return Err(ConfigError::ZeroPlyCap);
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Invalid game parameters, fatal at startup.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("board size must be at least 3, got {0}")]
    BoardTooSmall(u8),

    #[error("ply cap must be positive")]
    ZeroPlyCap,
}

// =============================================================================
// Section 2: Wall lattice
// =============================================================================

/// Occupancy grid over the (n-1) x (n-1) wall slot lattice for a single
/// orientation. Out-of-range queries answer false so neighbor checks at the
/// board edge need no special casing.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WallGrid {
    side: u8,
    slots: Vec<bool>,
}

impl WallGrid {
    /// Empty lattice for an n x n board.
    pub fn new(board_size: u8) -> Self {
        let side = board_size - 1;
        Self {
            side,
            slots: vec![false; side as usize * side as usize],
        }
    }

    pub fn contains(&self, row: i32, col: i32) -> bool {
        if row < 0 || col < 0 || row >= self.side as i32 || col >= self.side as i32 {
            return false;
        }
        self.slots[row as usize * self.side as usize + col as usize]
    }

    pub fn set(&mut self, row: u8, col: u8) {
        self.slots[row as usize * self.side as usize + col as usize] = true;
    }

    pub fn count(&self) -> usize {
        self.slots.iter().filter(|&&s| s).count()
    }

    /// Vertical board flip: slot row r maps to side-1-r.
    fn flip_rows(&self) -> Self {
        let mut flipped = Self {
            side: self.side,
            slots: vec![false; self.slots.len()],
        };
        let side = self.side as usize;
        for r in 0..side {
            for c in 0..side {
                flipped.slots[(side - 1 - r) * side + c] = self.slots[r * side + c];
            }
        }
        flipped
    }

    /// Left-right board flip: slot col c maps to side-1-c.
    fn flip_cols(&self) -> Self {
        let mut flipped = Self {
            side: self.side,
            slots: vec![false; self.slots.len()],
        };
        let side = self.side as usize;
        for r in 0..side {
            for c in 0..side {
                flipped.slots[r * side + (side - 1 - c)] = self.slots[r * side + c];
            }
        }
        flipped
    }

    /// Iterate occupied slots in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        let side = self.side as usize;
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, &s)| s)
            .map(move |(i, _)| ((i / side) as u8, (i % side) as u8))
    }
}

// =============================================================================
// Section 3: Game state
// =============================================================================

/// Complete game state. Plain data; all rules live in free functions below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub board_size: u8,

    /// Pawn locations, indexed by player.
    pub positions: [Cell; NUM_PLAYERS],

    /// Walls still in each player's stock.
    pub walls_remaining: [u8; NUM_PLAYERS],

    pub h_walls: WallGrid,
    pub v_walls: WallGrid,

    /// Player to act.
    pub to_move: PlayerIdx,

    /// Half-moves played so far.
    pub ply: u16,
}

/// Terminal result of a game.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// None on a ply-cap draw.
    pub winner: Option<PlayerIdx>,
    /// Ply count at termination.
    pub plies: u16,
}

impl Outcome {
    /// Game value from `player`'s perspective: +1 win, -1 loss, 0 draw.
    pub fn value_for(&self, player: PlayerIdx) -> f32 {
        match self.winner {
            None => 0.0,
            Some(w) if w == player => 1.0,
            Some(_) => -1.0,
        }
    }
}

/// A finished game: enough to replay it from the opening position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub board_size: u8,
    pub actions: Vec<Action>,
    pub outcome: Outcome,
}

/// Rule violations reported by `apply_action`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum RulesError {
    #[error("action is not legal in the current position")]
    InvalidAction,

    #[error("wall placement would seal a player's last path to goal")]
    PathBlockedViolation,
}

/// Initial position: pawns centered on opposite home rows, full wall stocks.
pub fn new_game(config: &GameConfig) -> GameState {
    let n = config.board_size;
    GameState {
        board_size: n,
        positions: [Cell::new(0, n / 2), Cell::new(n - 1, n / 2)],
        walls_remaining: [config.walls_per_player; NUM_PLAYERS],
        h_walls: WallGrid::new(n),
        v_walls: WallGrid::new(n),
        to_move: 0,
        ply: 0,
    }
}

/// The row a player must reach to win: the opponent's home row.
pub fn goal_row(board_size: u8, player: PlayerIdx) -> u8 {
    if player == 0 {
        board_size - 1
    } else {
        0
    }
}

// =============================================================================
// Section 4: Pawn movement
// =============================================================================

/// Whether a wall separates two orthogonally adjacent cells.
fn wall_blocks(h_walls: &WallGrid, v_walls: &WallGrid, from: Cell, to: Cell) -> bool {
    if from.row == to.row {
        // Horizontal step: a vertical wall in either adjacent slot row blocks it.
        let col = from.col.min(to.col) as i32;
        let row = from.row as i32;
        v_walls.contains(row - 1, col) || v_walls.contains(row, col)
    } else {
        // Vertical step: a horizontal wall in either adjacent slot column blocks it.
        let row = from.row.min(to.row) as i32;
        let col = from.col as i32;
        h_walls.contains(row, col - 1) || h_walls.contains(row, col)
    }
}

/// Legal pawn destinations for the player to move.
///
/// Orthogonal steps to empty cells; a straight jump over an adjacent opponent;
/// the two diagonal sidesteps when the straight jump is blocked by a wall or
/// the board edge.
pub fn legal_pawn_moves(state: &GameState) -> Vec<Cell> {
    let n = state.board_size as i32;
    let me = state.positions[state.to_move as usize];
    let opp = state.positions[1 - state.to_move as usize];
    let in_bounds = |r: i32, c: i32| r >= 0 && r < n && c >= 0 && c < n;

    let mut moves = Vec::with_capacity(5);
    for (dr, dc) in DIRS {
        let (tr, tc) = (me.row as i32 + dr, me.col as i32 + dc);
        if !in_bounds(tr, tc) {
            continue;
        }
        let target = Cell::new(tr as u8, tc as u8);
        if wall_blocks(&state.h_walls, &state.v_walls, me, target) {
            continue;
        }
        if target != opp {
            moves.push(target);
            continue;
        }

        // Opponent occupies the adjacent cell: try the straight jump.
        let (jr, jc) = (tr + dr, tc + dc);
        let jump_open = in_bounds(jr, jc)
            && !wall_blocks(
                &state.h_walls,
                &state.v_walls,
                target,
                Cell::new(jr as u8, jc as u8),
            );
        if jump_open {
            moves.push(Cell::new(jr as u8, jc as u8));
            continue;
        }

        // Jump blocked: diagonal sidesteps perpendicular to the approach.
        let sides: [(i32, i32); 2] = if dr == 0 {
            [(-1, 0), (1, 0)]
        } else {
            [(0, -1), (0, 1)]
        };
        for (sr, sc) in sides {
            let (ar, ac) = (tr + sr, tc + sc);
            if !in_bounds(ar, ac) {
                continue;
            }
            let side = Cell::new(ar as u8, ac as u8);
            if !wall_blocks(&state.h_walls, &state.v_walls, target, side) {
                moves.push(side);
            }
        }
    }
    moves
}

// =============================================================================
// Section 5: Wall placement
// =============================================================================

/// Geometric admissibility of a wall slot: in bounds, no overlap with a
/// parallel wall sharing a cell edge, no crossing a perpendicular wall at the
/// same slot. Does not check wall stock or path preservation.
fn wall_slot_open(state: &GameState, row: u8, col: u8, orientation: WallOrientation) -> bool {
    let side = state.board_size - 1;
    if row >= side || col >= side {
        return false;
    }
    let (r, c) = (row as i32, col as i32);
    match orientation {
        WallOrientation::Horizontal => {
            !(state.h_walls.contains(r, c)
                || state.h_walls.contains(r, c - 1)
                || state.h_walls.contains(r, c + 1)
                || state.v_walls.contains(r, c))
        }
        WallOrientation::Vertical => {
            !(state.v_walls.contains(r, c)
                || state.v_walls.contains(r - 1, c)
                || state.v_walls.contains(r + 1, c)
                || state.h_walls.contains(r, c))
        }
    }
}

/// BFS shortest path length from `start` to any cell on row `goal`, under the
/// given wall grids. None if the goal row is unreachable.
fn bfs_distance(
    board_size: u8,
    h_walls: &WallGrid,
    v_walls: &WallGrid,
    start: Cell,
    goal: u8,
) -> Option<u32> {
    let n = board_size as i32;
    let idx = |r: i32, c: i32| (r * n + c) as usize;

    let mut visited = vec![false; (n * n) as usize];
    let mut queue = VecDeque::new();
    visited[idx(start.row as i32, start.col as i32)] = true;
    queue.push_back((start, 0u32));

    while let Some((cell, dist)) = queue.pop_front() {
        if cell.row == goal {
            return Some(dist);
        }
        for (dr, dc) in DIRS {
            let (r, c) = (cell.row as i32 + dr, cell.col as i32 + dc);
            if r < 0 || r >= n || c < 0 || c >= n || visited[idx(r, c)] {
                continue;
            }
            let next = Cell::new(r as u8, c as u8);
            if wall_blocks(h_walls, v_walls, cell, next) {
                continue;
            }
            visited[idx(r, c)] = true;
            queue.push_back((next, dist + 1));
        }
    }
    None
}

/// Shortest path length from `player`'s pawn to its goal row, ignoring the
/// opponent's pawn. None only if the player is sealed in, which no sequence
/// of accepted placements can produce.
pub fn distance_to_goal(state: &GameState, player: PlayerIdx) -> Option<u32> {
    bfs_distance(
        state.board_size,
        &state.h_walls,
        &state.v_walls,
        state.positions[player as usize],
        goal_row(state.board_size, player),
    )
}

/// Whether placing the wall leaves both players a path to their goal rows.
fn preserves_paths(state: &GameState, row: u8, col: u8, orientation: WallOrientation) -> bool {
    let mut h_walls = state.h_walls.clone();
    let mut v_walls = state.v_walls.clone();
    match orientation {
        WallOrientation::Horizontal => h_walls.set(row, col),
        WallOrientation::Vertical => v_walls.set(row, col),
    }
    (0..NUM_PLAYERS as PlayerIdx).all(|p| {
        bfs_distance(
            state.board_size,
            &h_walls,
            &v_walls,
            state.positions[p as usize],
            goal_row(state.board_size, p),
        )
        .is_some()
    })
}

/// Legal wall placements for the player to move.
pub fn legal_wall_placements(state: &GameState) -> Vec<Action> {
    let mut walls = Vec::new();
    if state.walls_remaining[state.to_move as usize] == 0 {
        return walls;
    }
    let side = state.board_size - 1;
    for row in 0..side {
        for col in 0..side {
            for orientation in [WallOrientation::Horizontal, WallOrientation::Vertical] {
                if wall_slot_open(state, row, col, orientation)
                    && preserves_paths(state, row, col, orientation)
                {
                    walls.push(Action::Wall {
                        row,
                        col,
                        orientation,
                    });
                }
            }
        }
    }
    walls
}

// =============================================================================
// Section 6: Action application and termination
// =============================================================================

/// All legal actions for the player to move: pawn destinations first, then
/// wall placements in row-major slot order.
pub fn legal_actions(state: &GameState) -> Vec<Action> {
    let mut actions: Vec<Action> = legal_pawn_moves(state)
        .into_iter()
        .map(|cell| Action::Move {
            row: cell.row,
            col: cell.col,
        })
        .collect();
    actions.extend(legal_wall_placements(state));
    actions
}

/// Apply an action for the player to move, yielding the successor state.
/// The input state is untouched on rejection.
pub fn apply_action(state: &GameState, action: Action) -> Result<GameState, RulesError> {
    match action {
        Action::Move { row, col } => {
            let target = Cell::new(row, col);
            if !legal_pawn_moves(state).contains(&target) {
                return Err(RulesError::InvalidAction);
            }
            let mut next = state.clone();
            next.positions[state.to_move as usize] = target;
            next.to_move = 1 - state.to_move;
            next.ply += 1;
            Ok(next)
        }
        Action::Wall {
            row,
            col,
            orientation,
        } => {
            if state.walls_remaining[state.to_move as usize] == 0
                || !wall_slot_open(state, row, col, orientation)
            {
                return Err(RulesError::InvalidAction);
            }
            if !preserves_paths(state, row, col, orientation) {
                return Err(RulesError::PathBlockedViolation);
            }
            let mut next = state.clone();
            match orientation {
                WallOrientation::Horizontal => next.h_walls.set(row, col),
                WallOrientation::Vertical => next.v_walls.set(row, col),
            }
            next.walls_remaining[state.to_move as usize] -= 1;
            next.to_move = 1 - state.to_move;
            next.ply += 1;
            Ok(next)
        }
    }
}

/// Terminal check: a pawn on its goal row wins; the ply cap without a winner
/// is a draw. Non-terminal states return None.
pub fn is_terminal(state: &GameState, config: &GameConfig) -> Option<Outcome> {
    for p in 0..NUM_PLAYERS as PlayerIdx {
        if state.positions[p as usize].row == goal_row(state.board_size, p) {
            return Some(Outcome {
                winner: Some(p),
                plies: state.ply,
            });
        }
    }
    if state.ply >= config.max_plies {
        return Some(Outcome {
            winner: None,
            plies: state.ply,
        });
    }
    None
}

// =============================================================================
// Section 7: Symmetry transforms
// =============================================================================

/// Perspective transform: returns the board as `player` sees it, occupying
/// player slot 0 at the bottom and aiming at row n-1. Identity for player 0;
/// for player 1 flips the board vertically and swaps the player slots.
/// Applying it twice for player 1 round-trips.
pub fn canonical(state: &GameState, player: PlayerIdx) -> GameState {
    if player == 0 {
        return state.clone();
    }
    let n = state.board_size;
    let flip = |cell: Cell| Cell::new(n - 1 - cell.row, cell.col);
    GameState {
        board_size: n,
        positions: [flip(state.positions[1]), flip(state.positions[0])],
        walls_remaining: [state.walls_remaining[1], state.walls_remaining[0]],
        h_walls: state.h_walls.flip_rows(),
        v_walls: state.v_walls.flip_rows(),
        to_move: 1 - state.to_move,
        ply: state.ply,
    }
}

/// Left-right mirror of the board, an exact game symmetry used for data
/// augmentation. An involution.
pub fn mirror(state: &GameState) -> GameState {
    let n = state.board_size;
    let flip = |cell: Cell| Cell::new(cell.row, n - 1 - cell.col);
    GameState {
        board_size: n,
        positions: [flip(state.positions[0]), flip(state.positions[1])],
        walls_remaining: state.walls_remaining,
        h_walls: state.h_walls.flip_cols(),
        v_walls: state.v_walls.flip_cols(),
        to_move: state.to_move,
        ply: state.ply,
    }
}

// =============================================================================
// Tests
// =============================================================================
