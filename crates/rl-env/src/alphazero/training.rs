//! The phase-driven training loop.
//!
//! Each iteration cycles through self-play, optimization, head-to-head
//! evaluation, and checkpointing. The network itself lives behind the
//! `TrainableModel` trait; the loop owns everything else — the replay
//! buffer, the incumbent evaluator used to generate data, promotion
//! bookkeeping, and checkpoint files.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quoridor_engine::GameConfig;

use super::{
    play_match, run_self_play, ArenaConfig, BufferUnderflow, CancelToken, ReplayBuffer,
    ReplayLog, ReplaySample, SelfPlayConfig,
};
use crate::{Evaluator, FeatureExtractor, GameId, ShortestPathEvaluator};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("trainer backend error: {0}")]
    Trainer(String),
}

/// A model that can be optimized on replay samples and exposes an
/// `Evaluator` view of its current weights for the search.
pub trait TrainableModel {
    /// Evaluator over the model's current weights. The returned handle must
    /// keep working (at its snapshot of the weights) even if the model
    /// trains on.
    fn evaluator(&self) -> Arc<dyn Evaluator>;

    /// One optimization step on a sampled batch; returns the batch loss.
    fn train_step(&mut self, batch: &[&ReplaySample]) -> Result<f32, TrainingError>;

    fn save(&self, path: &Path) -> io::Result<()>;
    fn load(&mut self, path: &Path) -> io::Result<()>;
}

/// Promotion lineage of the incumbent model.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ModelVersion {
    /// Incremented on every promotion.
    pub id: u32,

    /// Candidate score of every arena match played, promoted or not.
    pub win_rate_history: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct TrainerConfig {
    pub game: GameConfig,
    pub num_iters: usize,
    pub training_steps_per_iter: usize,
    pub batch_size: usize,
    pub replay_capacity: usize,

    /// Run the arena every this many iterations.
    pub eval_interval: usize,

    pub checkpoint_dir: Option<PathBuf>,
    pub replay_log: Option<PathBuf>,

    pub self_play: SelfPlayConfig,
    pub arena: ArenaConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::standard(),
            num_iters: 100,
            training_steps_per_iter: 200,
            batch_size: 256,
            replay_capacity: 100_000,
            eval_interval: 1,
            checkpoint_dir: None,
            replay_log: None,
            self_play: SelfPlayConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<(), TrainingError> {
        self.game
            .validate()
            .map_err(|e| TrainingError::Config(e.to_string()))?;
        if self.batch_size == 0 {
            return Err(TrainingError::Config("batch_size must be positive".into()));
        }
        if self.replay_capacity < self.batch_size {
            return Err(TrainingError::Config(format!(
                "replay_capacity {} is smaller than batch_size {}",
                self.replay_capacity, self.batch_size
            )));
        }
        // The buffer must hold at least one full game or whole-game eviction
        // would truncate everything that goes in.
        let per_game = self.game.max_plies as usize
            * if self.self_play.augment_symmetries { 2 } else { 1 };
        if self.replay_capacity < per_game {
            return Err(TrainingError::Config(format!(
                "replay_capacity {} cannot hold one full game ({per_game} samples)",
                self.replay_capacity
            )));
        }
        if self.self_play.mcts.num_simulations < 2 {
            return Err(TrainingError::Config(
                "self-play needs at least 2 simulations per move".into(),
            ));
        }
        if self.eval_interval == 0 {
            return Err(TrainingError::Config("eval_interval must be positive".into()));
        }
        Ok(())
    }
}

/// The four phases of one training iteration, in order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    SelfPlay,
    Train,
    Evaluate,
    Checkpoint,
}

pub const PHASES: [Phase; 4] = [
    Phase::SelfPlay,
    Phase::Train,
    Phase::Evaluate,
    Phase::Checkpoint,
];

/// Orchestrates the full AlphaZero loop over a `TrainableModel`.
pub struct TrainingLoop<F: FeatureExtractor, M: TrainableModel> {
    config: TrainerConfig,
    features: F,
    model: M,

    /// Evaluator generating self-play data; replaced only on promotion.
    incumbent: Arc<dyn Evaluator>,

    replay: Mutex<ReplayBuffer>,
    replay_log: Option<Mutex<ReplayLog>>,
    version: ModelVersion,
    next_game_id: GameId,
    stop: CancelToken,
    rng: StdRng,
}

impl<F: FeatureExtractor, M: TrainableModel> TrainingLoop<F, M> {
    pub fn new(config: TrainerConfig, features: F, model: M, seed: u64) -> Result<Self, TrainingError> {
        config.validate()?;
        if let Some(dir) = &config.checkpoint_dir {
            std::fs::create_dir_all(dir)?;
        }
        let replay_log = match &config.replay_log {
            Some(path) => Some(Mutex::new(ReplayLog::open(path)?)),
            None => None,
        };
        let incumbent = model.evaluator();
        Ok(Self {
            replay: Mutex::new(ReplayBuffer::new(config.replay_capacity)),
            replay_log,
            config,
            features,
            incumbent,
            model,
            version: ModelVersion::default(),
            next_game_id: 0,
            stop: CancelToken::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Handle for cancelling the loop from another thread. The loop drains
    /// the current iteration and stops before the next one.
    pub fn cancel_token(&self) -> CancelToken {
        self.stop.clone()
    }

    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    /// Run all configured iterations; returns the final promotion lineage.
    pub fn run(&mut self) -> Result<ModelVersion, TrainingError> {
        let snapshot = self.snapshot_path();

        for iter in 0..self.config.num_iters {
            if self.stop.is_cancelled() {
                break;
            }

            let mut games_completed = 0;
            let mut buffer_len = 0;
            let mut mean_loss = f32::NAN;
            let mut arena_note = String::from("-");

            for phase in PHASES {
                match phase {
                    Phase::SelfPlay => {
                        let (stats, _records) = run_self_play(
                            &self.config.game,
                            &self.config.self_play,
                            &self.features,
                            Arc::clone(&self.incumbent),
                            &self.replay,
                            self.replay_log.as_ref(),
                            &self.stop,
                            self.next_game_id,
                            &mut self.rng,
                        );
                        self.next_game_id += self.config.self_play.games as GameId;
                        games_completed = stats.games_completed;
                        buffer_len = self.replay.lock().unwrap().len();
                    }
                    Phase::Train => {
                        self.model.save(&snapshot)?;
                        mean_loss = self.train_phase()?;
                    }
                    Phase::Evaluate => {
                        if (iter + 1) % self.config.eval_interval != 0 {
                            continue;
                        }
                        let candidate = self.model.evaluator();
                        let result = play_match(
                            &self.config.game,
                            &self.config.arena,
                            &self.features,
                            candidate.clone(),
                            Arc::clone(&self.incumbent),
                            &mut self.rng,
                        );
                        let score = result.candidate_score();
                        self.version.win_rate_history.push(score);
                        if result.promoted(self.config.arena.promotion_threshold) {
                            self.incumbent = candidate;
                            self.version.id += 1;
                            arena_note = format!("promoted v{} ({score:.2})", self.version.id);
                            self.save_checkpoint("model_best.bin")?;
                        } else {
                            // Rejected candidates roll back so the next
                            // iteration trains from the incumbent's weights.
                            self.model.load(&snapshot)?;
                            arena_note = format!("rejected ({score:.2})");
                        }
                    }
                    Phase::Checkpoint => {
                        if self.config.checkpoint_dir.is_some() {
                            self.save_checkpoint(&format!("model_iter_{iter:04}.bin"))?;
                        }
                    }
                }
            }

            eprintln!(
                "iter {iter}: {games_completed} games, buffer {buffer_len}, \
                 loss {mean_loss:.4}, arena {arena_note}"
            );
        }

        Ok(self.version.clone())
    }

    /// Optimization phase. An underfull buffer defers training to a later
    /// iteration instead of failing the run.
    fn train_phase(&mut self) -> Result<f32, TrainingError> {
        let mut losses = Vec::with_capacity(self.config.training_steps_per_iter);
        for _ in 0..self.config.training_steps_per_iter {
            let replay = self.replay.lock().unwrap();
            let batch: Result<Vec<&ReplaySample>, BufferUnderflow> =
                replay.sample(&mut self.rng, self.config.batch_size);
            match batch {
                Ok(batch) => {
                    let loss = self.model.train_step(&batch)?;
                    losses.push(loss);
                }
                Err(underflow) => {
                    eprintln!("training deferred: {underflow}");
                    break;
                }
            }
        }
        if losses.is_empty() {
            return Ok(f32::NAN);
        }
        Ok(losses.iter().sum::<f32>() / losses.len() as f32)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.config
            .checkpoint_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join("model_snapshot.bin")
    }

    fn save_checkpoint(&self, name: &str) -> Result<(), TrainingError> {
        let Some(dir) = &self.config.checkpoint_dir else {
            return Ok(());
        };
        let path = dir.join(name);
        self.model.save(&path)?;
        let meta = path.with_extension("meta.json");
        let file = std::fs::File::create(meta)?;
        serde_json::to_writer_pretty(file, &self.version).map_err(io::Error::from)?;
        Ok(())
    }
}

// =============================================================================
// Heuristic model
// =============================================================================

/// A `TrainableModel` with nothing to train: the shortest-path heuristic.
///
/// Lets the full loop (self-play, arena, checkpoints) run end to end with no
/// network attached, and serves as the iteration-zero baseline.
pub struct HeuristicModel {
    evaluator: Arc<ShortestPathEvaluator>,
}

#[derive(Deserialize, Serialize)]
struct HeuristicCheckpoint {
    kind: String,
}

impl HeuristicModel {
    pub fn new(game: &GameConfig) -> Self {
        Self {
            evaluator: Arc::new(ShortestPathEvaluator::new(game)),
        }
    }
}

impl TrainableModel for HeuristicModel {
    fn evaluator(&self) -> Arc<dyn Evaluator> {
        self.evaluator.clone()
    }

    fn train_step(&mut self, _batch: &[&ReplaySample]) -> Result<f32, TrainingError> {
        Ok(0.0)
    }

    fn save(&self, path: &Path) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(
            file,
            &HeuristicCheckpoint {
                kind: "shortest-path".into(),
            },
        )
        .map_err(io::Error::from)
    }

    fn load(&mut self, path: &Path) -> io::Result<()> {
        let file = std::fs::File::open(path)?;
        let checkpoint: HeuristicCheckpoint =
            serde_json::from_reader(file).map_err(io::Error::from)?;
        if checkpoint.kind != "shortest-path" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected checkpoint kind {:?}", checkpoint.kind),
            ));
        }
        Ok(())
    }
}
