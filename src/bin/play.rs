//! Interactive CLI: play Quoridor against the search, the random baseline,
//! or another human.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use quoridor::display::{format_action, render};
use quoridor_engine::{
    apply_action, is_terminal, legal_actions, new_game, Action, GameConfig, GameRecord,
    GameState, WallOrientation,
};
use quoridor_rl_env::{
    Agent, BoardEncoder, Mcts, MctsAgent, MctsConfig, RandomAgent, ShortestPathEvaluator,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlayerKind {
    Human,
    Random,
    Mcts,
}

#[derive(Parser, Debug)]
#[command(name = "play", about = "Play a game of Quoridor")]
struct Cli {
    #[arg(long, value_enum, default_value_t = PlayerKind::Human)]
    p1: PlayerKind,

    #[arg(long, value_enum, default_value_t = PlayerKind::Mcts)]
    p2: PlayerKind,

    #[arg(long, default_value_t = 9)]
    board_size: u8,

    /// MCTS simulations per move for mcts players
    #[arg(long, default_value_t = 256)]
    mcts_sims: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

enum Seat {
    Human,
    Agent(Box<dyn Agent>),
}

fn make_seat(kind: PlayerKind, game: &GameConfig, sims: u32) -> Seat {
    match kind {
        PlayerKind::Human => Seat::Human,
        PlayerKind::Random => Seat::Agent(Box::new(RandomAgent)),
        PlayerKind::Mcts => {
            let mcts = Mcts::new(
                MctsConfig {
                    num_simulations: sims,
                    root_dirichlet_alpha: 0.0,
                    ..MctsConfig::default()
                },
                game.clone(),
                BoardEncoder::new(game),
                Arc::new(ShortestPathEvaluator::new(game)),
            );
            Seat::Agent(Box::new(MctsAgent::new(mcts, 0.0)))
        }
    }
}

/// Accepts `move r,c` and `wall h|v r,c`, the same shapes `format_action`
/// prints.
fn parse_action(input: &str) -> Option<Action> {
    let mut parts = input.split_whitespace();
    match parts.next()? {
        "move" => {
            let (row, col) = parse_coords(parts.next()?)?;
            parts.next().is_none().then_some(Action::Move { row, col })
        }
        "wall" => {
            let orientation = match parts.next()? {
                "h" => WallOrientation::Horizontal,
                "v" => WallOrientation::Vertical,
                _ => return None,
            };
            let (row, col) = parse_coords(parts.next()?)?;
            parts.next().is_none().then_some(Action::Wall {
                row,
                col,
                orientation,
            })
        }
        _ => None,
    }
}

fn parse_coords(s: &str) -> Option<(u8, u8)> {
    let (r, c) = s.split_once(',')?;
    Some((r.trim().parse().ok()?, c.trim().parse().ok()?))
}

fn prompt_human(state: &GameState) -> anyhow::Result<Action> {
    let legal = legal_actions(state);
    let stdin = std::io::stdin();
    loop {
        eprint!("your move (`move r,c`, `wall h|v r,c`, or `list`): ");
        std::io::stderr().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            bail!("stdin closed mid-game");
        }
        let input = line.trim();

        if input == "list" {
            let listing: Vec<String> = legal.iter().map(format_action).collect();
            eprintln!("{}", listing.join("  "));
            continue;
        }
        match parse_action(input) {
            Some(action) if legal.contains(&action) => return Ok(action),
            Some(_) => eprintln!("that action is not legal here"),
            None => eprintln!("could not parse {input:?}"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let game = GameConfig::with_board_size(cli.board_size);
    game.validate()
        .with_context(|| format!("bad board size {}", cli.board_size))?;

    let mut seats = [
        make_seat(cli.p1, &game, cli.mcts_sims),
        make_seat(cli.p2, &game, cli.mcts_sims),
    ];
    let mut rng = StdRng::seed_from_u64(cli.seed);

    let mut state = new_game(&game);
    let mut actions: Vec<Action> = Vec::new();

    let outcome = loop {
        if let Some(outcome) = is_terminal(&state, &game) {
            break outcome;
        }
        eprintln!("\n{}", render(&state));

        let mover = state.to_move;
        let action = match &mut seats[mover as usize] {
            Seat::Human => prompt_human(&state)?,
            Seat::Agent(agent) => {
                let action = agent
                    .choose_action(&state, &mut rng)
                    .context("evaluator failed")?;
                eprintln!(
                    "{} plays {}",
                    if mover == 0 { "A" } else { "B" },
                    format_action(&action)
                );
                action
            }
        };
        actions.push(action);
        state = apply_action(&state, action).context("agent chose an illegal action")?;
    };

    eprintln!("\n{}", render(&state));
    match outcome.winner {
        Some(p) => eprintln!("{} wins in {} plies", if p == 0 { "A" } else { "B" }, outcome.plies),
        None => eprintln!("draw after {} plies", outcome.plies),
    }

    let record = GameRecord {
        board_size: game.board_size,
        actions,
        outcome,
    };
    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}
