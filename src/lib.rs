//! Quoridor: rules engine, AlphaZero-style training pipeline, and CLI.

pub mod display;

pub use quoridor_engine as engine;
pub use quoridor_rl_env as rl_env;
