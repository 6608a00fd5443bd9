//! Head-to-head evaluation between a candidate and the incumbent.
//!
//! Both sides search greedily (temperature 0, no root noise) so the match
//! measures playing strength rather than exploration luck. Seats alternate
//! between games to cancel the first-move advantage.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use quoridor_engine::{apply_action, is_terminal, new_game, GameConfig};

use crate::{Evaluator, EvaluatorError, FeatureExtractor, Mcts, MctsConfig};

#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Number of evaluation games per match.
    pub games: usize,

    /// Minimum candidate score (wins plus half of draws, over completed
    /// games) required for promotion.
    pub promotion_threshold: f32,

    pub mcts: MctsConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            games: 20,
            promotion_threshold: 0.55,
            mcts: MctsConfig {
                root_dirichlet_alpha: 0.0,
                ..MctsConfig::default()
            },
        }
    }
}

/// Tally of one arena match, from the candidate's perspective.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ArenaResult {
    pub candidate_wins: usize,
    pub incumbent_wins: usize,
    pub draws: usize,

    /// Games aborted by evaluator failure. Excluded from the score.
    pub failed: usize,
}

impl ArenaResult {
    pub fn completed(&self) -> usize {
        self.candidate_wins + self.incumbent_wins + self.draws
    }

    /// Candidate score in [0, 1]; 0 when no game completed.
    pub fn candidate_score(&self) -> f32 {
        let completed = self.completed();
        if completed == 0 {
            return 0.0;
        }
        (self.candidate_wins as f32 + 0.5 * self.draws as f32) / completed as f32
    }

    pub fn promoted(&self, threshold: f32) -> bool {
        self.completed() > 0 && self.candidate_score() > threshold
    }
}

/// Play one greedy game; returns the winner's seat, or None on a draw.
fn play_game<F: FeatureExtractor>(
    game: &GameConfig,
    seats: &[&Mcts<F>; 2],
    rng: &mut StdRng,
) -> Result<Option<u8>, EvaluatorError> {
    let mut state = new_game(game);
    loop {
        if let Some(outcome) = is_terminal(&state, game) {
            return Ok(outcome.winner);
        }
        let result = seats[state.to_move as usize].search(&state, 0.0, rng)?;
        state = apply_action(&state, result.action)
            .expect("search returns only legal actions");
    }
}

/// Run a full arena match between candidate and incumbent evaluators.
/// Games run in parallel; the candidate takes the first move in
/// even-numbered games.
pub fn play_match<F: FeatureExtractor>(
    game: &GameConfig,
    config: &ArenaConfig,
    features: &F,
    candidate: Arc<dyn Evaluator>,
    incumbent: Arc<dyn Evaluator>,
    rng: &mut StdRng,
) -> ArenaResult {
    let candidate_mcts = Mcts::new(
        config.mcts.clone(),
        game.clone(),
        features.clone(),
        candidate,
    );
    let incumbent_mcts = Mcts::new(
        config.mcts.clone(),
        game.clone(),
        features.clone(),
        incumbent,
    );

    let jobs: Vec<(usize, u64)> = (0..config.games).map(|i| (i, rng.random())).collect();
    let result = Mutex::new(ArenaResult::default());

    jobs.into_par_iter().for_each(|(i, seed)| {
        let mut game_rng = StdRng::seed_from_u64(seed);
        let candidate_seat = (i % 2) as u8;
        let seats = if candidate_seat == 0 {
            [&candidate_mcts, &incumbent_mcts]
        } else {
            [&incumbent_mcts, &candidate_mcts]
        };

        match play_game(game, &seats, &mut game_rng) {
            Ok(winner) => {
                let mut result = result.lock().unwrap();
                match winner {
                    Some(seat) if seat == candidate_seat => result.candidate_wins += 1,
                    Some(_) => result.incumbent_wins += 1,
                    None => result.draws += 1,
                }
            }
            Err(err) => {
                eprintln!("arena game {i} failed: {err}");
                result.lock().unwrap().failed += 1;
            }
        }
    });

    result.into_inner().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionEncoder, BoardEncoder, ShortestPathEvaluator, UniformEvaluator};

    fn arena_config(games: usize) -> ArenaConfig {
        ArenaConfig {
            games,
            mcts: MctsConfig {
                num_simulations: 16,
                root_dirichlet_alpha: 0.0,
                ..MctsConfig::default()
            },
            ..ArenaConfig::default()
        }
    }

    fn evaluators(game: &GameConfig) -> (Arc<dyn Evaluator>, Arc<dyn Evaluator>) {
        let strong = Arc::new(ShortestPathEvaluator::new(game));
        let weak = Arc::new(UniformEvaluator::new(
            ActionEncoder::new(game.board_size).action_space_size(),
        ));
        (strong, weak)
    }

    #[test]
    fn test_score_arithmetic() {
        let result = ArenaResult {
            candidate_wins: 11,
            incumbent_wins: 7,
            draws: 2,
            failed: 1,
        };
        assert_eq!(result.completed(), 20);
        assert!((result.candidate_score() - 0.6).abs() < 1e-6);
        assert!(result.promoted(0.55));
        assert!(!result.promoted(0.60));
    }

    #[test]
    fn test_empty_match_never_promotes() {
        let result = ArenaResult {
            failed: 4,
            ..ArenaResult::default()
        };
        assert_eq!(result.candidate_score(), 0.0);
        assert!(!result.promoted(0.0));
    }

    #[test]
    fn test_stronger_candidate_promotes() {
        let game = GameConfig::with_board_size(5);
        let features = BoardEncoder::new(&game);
        let (strong, weak) = evaluators(&game);
        let mut rng = StdRng::seed_from_u64(8);

        let result = play_match(&game, &arena_config(6), &features, strong, weak, &mut rng);
        assert_eq!(result.failed, 0);
        assert!(
            result.promoted(0.55),
            "expected promotion, got {result:?}"
        );
    }

    #[test]
    fn test_weaker_candidate_rejected() {
        let game = GameConfig::with_board_size(5);
        let features = BoardEncoder::new(&game);
        let (strong, weak) = evaluators(&game);
        let mut rng = StdRng::seed_from_u64(8);

        let result = play_match(&game, &arena_config(6), &features, weak, strong, &mut rng);
        assert!(
            !result.promoted(0.55),
            "expected rejection, got {result:?}"
        );
    }
}
