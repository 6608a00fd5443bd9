//! Self-play game generation.
//!
//! Each game runs a full MCTS per move with the current evaluator, records
//! (observation, visit policy) pairs, and back-fills values once the outcome
//! is known. Games fan out over a rayon pool and append to a shared buffer
//! as they finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

use quoridor_engine::{apply_action, is_terminal, new_game, Action, GameConfig, GameRecord};

use super::{PendingMove, ReplayBuffer, ReplayLog, ReplaySample};
use crate::{
    ActionEncoder, Evaluator, EvaluatorError, FeatureExtractor, GameId, Mcts, MctsConfig,
};

/// Configuration for a round of self-play.
#[derive(Clone, Debug)]
pub struct SelfPlayConfig {
    /// Number of games to generate per round.
    pub games: usize,

    pub mcts: MctsConfig,

    /// Plies played at temperature 1 before switching to greedy selection.
    pub temperature_cutoff_ply: u32,

    /// Also store the left-right mirror of every sample.
    pub augment_symmetries: bool,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            games: 64,
            mcts: MctsConfig::default(),
            temperature_cutoff_ply: 15,
            augment_symmetries: true,
        }
    }
}

/// Cooperative shutdown flag shared across game workers. Checked between
/// moves; a cancelled game is discarded rather than recorded half-labelled.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SelfPlayError {
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    #[error("self-play cancelled")]
    Cancelled,
}

/// Output of one completed self-play game.
#[derive(Clone, Debug)]
pub struct SelfPlayResult {
    pub samples: Vec<ReplaySample>,
    pub record: GameRecord,
}

/// Aggregate statistics for a self-play round.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfPlayStats {
    pub games_completed: usize,
    pub games_failed: usize,
    pub games_cancelled: usize,
    pub samples: usize,
    pub total_plies: usize,
    pub wins: [usize; 2],
    pub draws: usize,
}

/// Play one game of self-play to completion.
///
/// Both sides share the evaluator. Moves before `temperature_cutoff_ply` are
/// sampled at temperature 1; later moves are greedy. Evaluator failures and
/// cancellation abort the game with no samples.
pub fn self_play_game<F: FeatureExtractor>(
    game: &GameConfig,
    config: &SelfPlayConfig,
    features: &F,
    evaluator: Arc<dyn Evaluator>,
    game_id: GameId,
    stop: &CancelToken,
    rng: &mut StdRng,
) -> Result<SelfPlayResult, SelfPlayError> {
    let mcts = Mcts::new(config.mcts.clone(), game.clone(), features.clone(), evaluator);
    let encoder = ActionEncoder::new(game.board_size);

    let mut state = new_game(game);
    let mut pending: Vec<PendingMove> = Vec::new();
    let mut actions: Vec<Action> = Vec::new();

    let outcome = loop {
        if let Some(outcome) = is_terminal(&state, game) {
            break outcome;
        }
        if stop.is_cancelled() {
            return Err(SelfPlayError::Cancelled);
        }

        let temperature = if (state.ply as u32) < config.temperature_cutoff_ply {
            1.0
        } else {
            0.0
        };
        let result = mcts.search(&state, temperature, rng)?;

        pending.push(PendingMove {
            player: state.to_move,
            observation: features.encode(&state, state.to_move),
            policy: result.policy,
        });
        actions.push(result.action);
        state = apply_action(&state, result.action)
            .expect("search returns only legal actions");
    };

    let mut samples = Vec::with_capacity(pending.len() * if config.augment_symmetries { 2 } else { 1 });
    for m in pending {
        let value = outcome.value_for(m.player);
        if config.augment_symmetries {
            samples.push(ReplaySample {
                observation: features.mirror_observation(&m.observation),
                policy: encoder.mirror_policy(&m.policy),
                value,
                game_id,
            });
        }
        samples.push(ReplaySample {
            observation: m.observation,
            policy: m.policy,
            value,
            game_id,
        });
    }

    Ok(SelfPlayResult {
        samples,
        record: GameRecord {
            board_size: game.board_size,
            actions,
            outcome,
        },
    })
}

/// Run a round of self-play games in parallel, appending finished games to
/// the shared replay buffer (and log, when given) as they complete.
///
/// Game ids are assigned from `first_game_id`; per-game RNG seeds are drawn
/// up front so the round is reproducible regardless of worker scheduling.
#[allow(clippy::too_many_arguments)]
pub fn run_self_play<F: FeatureExtractor>(
    game: &GameConfig,
    config: &SelfPlayConfig,
    features: &F,
    evaluator: Arc<dyn Evaluator>,
    buffer: &Mutex<ReplayBuffer>,
    log: Option<&Mutex<ReplayLog>>,
    stop: &CancelToken,
    first_game_id: GameId,
    rng: &mut StdRng,
) -> (SelfPlayStats, Vec<GameRecord>) {
    let jobs: Vec<(GameId, u64)> = (0..config.games)
        .map(|i| (first_game_id + i as GameId, rng.random()))
        .collect();

    let stats = Mutex::new(SelfPlayStats::default());
    let records = Mutex::new(Vec::with_capacity(config.games));

    jobs.into_par_iter().for_each(|(game_id, seed)| {
        let mut game_rng = StdRng::seed_from_u64(seed);
        let result = self_play_game(
            game,
            config,
            features,
            Arc::clone(&evaluator),
            game_id,
            stop,
            &mut game_rng,
        );
        match result {
            Ok(result) => {
                if let Some(log) = log {
                    let mut log = log.lock().unwrap();
                    if let Err(err) = log.append(&result.samples) {
                        eprintln!("replay log write failed for game {game_id}: {err}");
                    }
                }
                let mut stats = stats.lock().unwrap();
                stats.games_completed += 1;
                stats.samples += result.samples.len();
                stats.total_plies += result.record.actions.len();
                match result.record.outcome.winner {
                    Some(p) => stats.wins[p as usize] += 1,
                    None => stats.draws += 1,
                }
                drop(stats);
                buffer.lock().unwrap().push_game(result.samples);
                records.lock().unwrap().push(result.record);
            }
            Err(SelfPlayError::Cancelled) => {
                stats.lock().unwrap().games_cancelled += 1;
            }
            Err(err) => {
                eprintln!("self-play game {game_id} failed: {err}");
                stats.lock().unwrap().games_failed += 1;
            }
        }
    });

    (stats.into_inner().unwrap(), records.into_inner().unwrap())
}
