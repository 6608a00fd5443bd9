//! AlphaZero training pipeline: replay storage, self-play generation,
//! head-to-head evaluation, and the phase-driven training loop.

pub mod arena;
pub mod examples;
pub mod replay_buffer;
pub mod selfplay;
pub mod training;

pub use arena::{play_match, ArenaConfig, ArenaResult};
pub use examples::{PendingMove, ReplaySample};
pub use replay_buffer::{BufferUnderflow, ReplayBuffer, ReplayLog};
pub use selfplay::{
    run_self_play, self_play_game, CancelToken, SelfPlayConfig, SelfPlayError, SelfPlayResult,
    SelfPlayStats,
};
pub use training::{
    HeuristicModel, ModelVersion, Phase, TrainableModel, TrainerConfig, TrainingError,
    TrainingLoop, PHASES,
};
