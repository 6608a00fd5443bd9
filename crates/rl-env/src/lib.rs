//! Reinforcement-learning environment for Quoridor.
//!
//! Wraps the rules engine with everything an AlphaZero-style pipeline needs:
//! a fixed discrete action space, canonical-perspective observations, PUCT
//! search, evaluator plumbing, and the self-play/arena/training loop. The
//! network itself stays outside this crate behind the `Evaluator` and
//! `TrainableModel` traits.

pub mod action_encoder;
pub mod agent;
pub mod alphazero;
pub mod evaluator;
pub mod feature_extractor;
pub mod mcts;
pub mod types;

pub use action_encoder::ActionEncoder;
pub use agent::{Agent, MctsAgent, RandomAgent};
pub use alphazero::{
    play_match, run_self_play, self_play_game, ArenaConfig, ArenaResult, BufferUnderflow,
    CancelToken, HeuristicModel, ModelVersion, PendingMove, Phase, ReplayBuffer, ReplayLog,
    ReplaySample, SelfPlayConfig, SelfPlayError, SelfPlayResult, SelfPlayStats, TrainableModel,
    TrainerConfig, TrainingError, TrainingLoop, PHASES,
};
pub use evaluator::{
    BatchedEvaluator, Evaluation, Evaluator, EvaluatorError, ShortestPathEvaluator,
    UniformEvaluator,
};
pub use feature_extractor::{BoardEncoder, FeatureExtractor, OBS_PLANES};
pub use mcts::{ChildEdge, Mcts, MctsConfig, MctsTree, Node, NodeIdx, SearchResult};
pub use types::{ActionId, GameId, Observation};
