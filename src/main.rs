//! Training CLI: runs the AlphaZero loop with the built-in heuristic model.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use quoridor_engine::GameConfig;
use quoridor_rl_env::{
    ArenaConfig, BoardEncoder, HeuristicModel, MctsConfig, SelfPlayConfig, TrainerConfig,
    TrainingLoop,
};

#[derive(Parser, Debug)]
#[command(name = "quoridor", about = "Train a Quoridor agent via self-play")]
struct Cli {
    /// Board side length (odd, >= 5)
    #[arg(long, default_value_t = 9)]
    board_size: u8,

    #[arg(long, default_value_t = 10)]
    num_iters: usize,

    /// Self-play games generated per iteration
    #[arg(long, default_value_t = 16)]
    games_per_iter: usize,

    /// Optimization steps per iteration
    #[arg(long, default_value_t = 100)]
    training_steps: usize,

    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    #[arg(long, default_value_t = 50_000)]
    replay_capacity: usize,

    /// MCTS simulations per self-play move
    #[arg(long, default_value_t = 128)]
    mcts_sims: u32,

    /// Run the arena every N iterations
    #[arg(long, default_value_t = 1)]
    eval_interval: usize,

    #[arg(long, default_value_t = 12)]
    arena_games: usize,

    /// Plies played at temperature 1 before greedy selection
    #[arg(long, default_value_t = 15)]
    temperature_cutoff: u32,

    /// Skip left-right mirror augmentation
    #[arg(long)]
    no_augment: bool,

    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Append every sample to this JSONL file
    #[arg(long)]
    replay_log: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let game = GameConfig::with_board_size(cli.board_size);
    let config = TrainerConfig {
        game: game.clone(),
        num_iters: cli.num_iters,
        training_steps_per_iter: cli.training_steps,
        batch_size: cli.batch_size,
        replay_capacity: cli.replay_capacity,
        eval_interval: cli.eval_interval,
        checkpoint_dir: cli.checkpoint_dir,
        replay_log: cli.replay_log,
        self_play: SelfPlayConfig {
            games: cli.games_per_iter,
            mcts: MctsConfig {
                num_simulations: cli.mcts_sims,
                ..MctsConfig::default()
            },
            temperature_cutoff_ply: cli.temperature_cutoff,
            augment_symmetries: !cli.no_augment,
        },
        arena: ArenaConfig {
            games: cli.arena_games,
            mcts: MctsConfig {
                num_simulations: cli.mcts_sims,
                root_dirichlet_alpha: 0.0,
                ..MctsConfig::default()
            },
            ..ArenaConfig::default()
        },
    };

    eprintln!(
        "training on {}x{} board, {} iterations",
        game.board_size, game.board_size, cli.num_iters
    );
    let mut training = TrainingLoop::new(
        config,
        BoardEncoder::new(&game),
        HeuristicModel::new(&game),
        cli.seed,
    )
    .context("invalid training configuration")?;

    let version = training.run().context("training failed")?;
    eprintln!(
        "done: model v{}, arena history {}",
        version.id,
        version
            .win_rate_history
            .iter()
            .map(|w| format!("{w:.2}"))
            .collect::<Vec<_>>()
            .join(" ")
    );
    Ok(())
}
