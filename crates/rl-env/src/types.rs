//! Core RL types for the Quoridor environment

/// Discrete action identifier (0..action_space_size-1)
pub type ActionId = u16;

/// Observation as a flat f32 array of shape [obs_size]
pub type Observation = ndarray::Array1<f32>;

/// Identifier tying replay samples back to the game that produced them
pub type GameId = u64;
