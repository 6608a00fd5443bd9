use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quoridor_engine::{
    apply_action, legal_actions, new_game, Action, Cell, GameConfig, GameState, WallOrientation,
};

/// A midgame position with several walls down, where path checks dominate.
fn midgame_state() -> GameState {
    let config = GameConfig::standard();
    let mut state = new_game(&config);
    let walls = [
        (2, 3, WallOrientation::Horizontal),
        (2, 5, WallOrientation::Horizontal),
        (4, 4, WallOrientation::Vertical),
        (5, 1, WallOrientation::Horizontal),
        (6, 6, WallOrientation::Vertical),
    ];
    for (row, col, orientation) in walls {
        state = apply_action(
            &state,
            Action::Wall {
                row,
                col,
                orientation,
            },
        )
        .unwrap();
    }
    state.positions[0] = Cell::new(3, 4);
    state.positions[1] = Cell::new(5, 4);
    state
}

fn bench_legal_actions(c: &mut Criterion) {
    let opening = new_game(&GameConfig::standard());
    let midgame = midgame_state();

    c.bench_function("legal_actions_opening", |b| {
        b.iter(|| legal_actions(black_box(&opening)))
    });
    c.bench_function("legal_actions_midgame", |b| {
        b.iter(|| legal_actions(black_box(&midgame)))
    });
}

fn bench_apply_action(c: &mut Criterion) {
    let midgame = midgame_state();
    let wall = Action::Wall {
        row: 0,
        col: 0,
        orientation: WallOrientation::Horizontal,
    };

    c.bench_function("apply_wall_midgame", |b| {
        b.iter(|| apply_action(black_box(&midgame), black_box(wall)).unwrap())
    });
}

criterion_group!(benches, bench_legal_actions, bench_apply_action);
criterion_main!(benches);
