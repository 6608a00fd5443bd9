//! Players for self-play, arena matches, and the interactive CLI.

use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;

use quoridor_engine::{legal_actions, Action, GameState};

use crate::{EvaluatorError, FeatureExtractor, Mcts};

/// A move-selection policy over game states.
pub trait Agent {
    fn choose_action(
        &mut self,
        state: &GameState,
        rng: &mut StdRng,
    ) -> Result<Action, EvaluatorError>;
}

/// Picks a legal action uniformly at random. Baseline opponent.
pub struct RandomAgent;

impl Agent for RandomAgent {
    fn choose_action(
        &mut self,
        state: &GameState,
        rng: &mut StdRng,
    ) -> Result<Action, EvaluatorError> {
        let actions = legal_actions(state);
        Ok(*actions
            .choose(rng)
            .expect("non-terminal states always have a legal action"))
    }
}

/// Runs a full MCTS search per move at a fixed temperature.
pub struct MctsAgent<F: FeatureExtractor> {
    pub mcts: Mcts<F>,
    pub temperature: f32,
}

impl<F: FeatureExtractor> MctsAgent<F> {
    pub fn new(mcts: Mcts<F>, temperature: f32) -> Self {
        Self { mcts, temperature }
    }
}

impl<F: FeatureExtractor> Agent for MctsAgent<F> {
    fn choose_action(
        &mut self,
        state: &GameState,
        rng: &mut StdRng,
    ) -> Result<Action, EvaluatorError> {
        Ok(self.mcts.search(state, self.temperature, rng)?.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionEncoder, BoardEncoder, MctsConfig, UniformEvaluator};
    use quoridor_engine::{apply_action, is_terminal, new_game, GameConfig};
    use rand::SeedableRng;
    use std::sync::Arc;

    #[test]
    fn test_random_agent_plays_legal_moves() {
        let config = GameConfig::standard();
        let mut state = new_game(&config);
        let mut agent = RandomAgent;
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..20 {
            let action = agent.choose_action(&state, &mut rng).unwrap();
            assert!(legal_actions(&state).contains(&action));
            state = apply_action(&state, action).unwrap();
        }
    }

    #[test]
    fn test_mcts_agent_finishes_small_game() {
        let config = GameConfig::with_board_size(5);
        let encoder = ActionEncoder::new(config.board_size);
        let mcts = Mcts::new(
            MctsConfig {
                num_simulations: 8,
                root_dirichlet_alpha: 0.0,
                ..MctsConfig::default()
            },
            config.clone(),
            BoardEncoder::new(&config),
            Arc::new(UniformEvaluator::new(encoder.action_space_size())),
        );
        let mut agent = MctsAgent::new(mcts, 1.0);
        let mut rng = StdRng::seed_from_u64(21);

        let mut state = new_game(&config);
        while is_terminal(&state, &config).is_none() {
            let action = agent.choose_action(&state, &mut rng).unwrap();
            state = apply_action(&state, action).unwrap();
        }
    }
}
