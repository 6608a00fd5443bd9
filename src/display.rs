//! ASCII rendering of board states for the CLI.

use quoridor_engine::{Action, GameState, WallOrientation};

const PAWN_GLYPHS: [char; 2] = ['A', 'B'];

/// Render the board with row n-1 at the top, so player A (rows increasing)
/// climbs up the screen. Wall segments drawn with ━ and ┃.
pub fn render(state: &GameState) -> String {
    let n = state.board_size as i32;
    let mut out = String::new();

    // Column header.
    out.push_str("    ");
    for c in 0..n {
        out.push_str(&format!(" {c}  "));
    }
    out.push('\n');

    for r in (0..n).rev() {
        out.push_str(&format!("{r:>3} "));
        for c in 0..n {
            let glyph = if state.positions[0].row as i32 == r
                && state.positions[0].col as i32 == c
            {
                PAWN_GLYPHS[0]
            } else if state.positions[1].row as i32 == r && state.positions[1].col as i32 == c {
                PAWN_GLYPHS[1]
            } else {
                '·'
            };
            out.push(' ');
            out.push(glyph);
            out.push(' ');

            if c < n - 1 {
                // Vertical wall between (r, c) and (r, c+1)?
                let blocked =
                    state.v_walls.contains(r, c) || state.v_walls.contains(r - 1, c);
                out.push(if blocked { '┃' } else { ' ' });
            }
        }
        out.push('\n');

        if r > 0 {
            out.push_str("    ");
            for c in 0..n {
                // Horizontal wall between rows r-1 and r at column c?
                let blocked =
                    state.h_walls.contains(r - 1, c) || state.h_walls.contains(r - 1, c - 1);
                out.push_str(if blocked { "━━━" } else { "   " });
                if c < n - 1 {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
    }

    out.push_str(&format!(
        "walls: A {}  B {}   to move: {}  ply {}\n",
        state.walls_remaining[0],
        state.walls_remaining[1],
        PAWN_GLYPHS[state.to_move as usize],
        state.ply
    ));
    out
}

/// Short human-readable form of an action, e.g. `move 1,4` or `wall h 3,3`.
pub fn format_action(action: &Action) -> String {
    match *action {
        Action::Move { row, col } => format!("move {row},{col}"),
        Action::Wall {
            row,
            col,
            orientation,
        } => {
            let o = match orientation {
                WallOrientation::Horizontal => 'h',
                WallOrientation::Vertical => 'v',
            };
            format!("wall {o} {row},{col}")
        }
    }
}
