//! Policy/value evaluation interface used by the search.
//!
//! The network itself lives outside this crate; everything here talks to it
//! through the `Evaluator` trait. Two model-free implementations are provided
//! for testing and bootstrapping, plus a batching front that coalesces
//! concurrent requests from parallel game workers.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use thiserror::Error;

use quoridor_engine::{apply_action, distance_to_goal, legal_pawn_moves, Action, GameConfig};

use crate::{ActionEncoder, BoardEncoder, Observation};

/// Output of one evaluation: a policy over the full action space (not yet
/// masked to legal actions) and a value in [-1, 1] for the player to move.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub policy: Vec<f32>,
    pub value: f32,
}

/// Evaluation failures. Never silently replaced with a default value; the
/// caller decides whether to abort the affected game.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvaluatorError {
    #[error("evaluator unavailable: {0}")]
    Unavailable(String),

    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),
}

/// Policy + value function over canonical-perspective observations.
pub trait Evaluator: Send + Sync {
    /// Evaluate a single observation.
    fn infer(&self, obs: &Observation) -> Result<Evaluation, EvaluatorError>;

    /// Evaluate a batch. The default loops over `infer`; backends with a
    /// real batch path override this.
    fn infer_batch(&self, batch: &[Observation]) -> Result<Vec<Evaluation>, EvaluatorError> {
        batch.iter().map(|obs| self.infer(obs)).collect()
    }
}

// =============================================================================
// Uniform evaluator
// =============================================================================

/// Uniform priors, zero value. The weakest possible model; useful as a test
/// stub and as the incumbent at iteration zero.
#[derive(Clone, Debug)]
pub struct UniformEvaluator {
    action_space_size: usize,
}

impl UniformEvaluator {
    pub fn new(action_space_size: usize) -> Self {
        Self { action_space_size }
    }
}

impl Evaluator for UniformEvaluator {
    fn infer(&self, _obs: &Observation) -> Result<Evaluation, EvaluatorError> {
        Ok(Evaluation {
            policy: vec![1.0 / self.action_space_size as f32; self.action_space_size],
            value: 0.0,
        })
    }
}

// =============================================================================
// Shortest-path evaluator
// =============================================================================

/// Model-free heuristic evaluator.
///
/// Reconstructs the canonical board from the observation, values it by the
/// BFS distance differential, and concentrates prior mass on the pawn moves
/// that shorten the own shortest path. Wall actions share a small residual
/// mass so the search can still discover them.
#[derive(Clone, Debug)]
pub struct ShortestPathEvaluator {
    board_encoder: BoardEncoder,
    action_encoder: ActionEncoder,
    board_size: u8,
}

/// Fraction of prior mass placed on the distance-minimizing pawn moves.
const GREEDY_MASS: f32 = 0.8;

impl ShortestPathEvaluator {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            board_encoder: BoardEncoder::new(config),
            action_encoder: ActionEncoder::new(config.board_size),
            board_size: config.board_size,
        }
    }
}

impl Evaluator for ShortestPathEvaluator {
    fn infer(&self, obs: &Observation) -> Result<Evaluation, EvaluatorError> {
        let state = self.board_encoder.decode(obs);
        let n = self.board_size as f32;

        let my_dist = distance_to_goal(&state, 0).unwrap_or(u32::MAX) as f32;
        let opp_dist = distance_to_goal(&state, 1).unwrap_or(u32::MAX) as f32;
        let value = ((opp_dist - my_dist) / n).clamp(-1.0, 1.0);

        // Score each pawn move by the successor's distance to goal.
        let moves = legal_pawn_moves(&state);
        let mut scored: Vec<(Action, u32)> = Vec::with_capacity(moves.len());
        for cell in moves {
            let action = Action::Move {
                row: cell.row,
                col: cell.col,
            };
            if let Ok(next) = apply_action(&state, action) {
                let dist = distance_to_goal(&next, 0).unwrap_or(u32::MAX);
                scored.push((action, dist));
            }
        }

        let size = self.action_encoder.action_space_size();
        let mut policy = vec![(1.0 - GREEDY_MASS) / size as f32; size];
        if let Some(best) = scored.iter().map(|(_, d)| *d).min() {
            let winners: Vec<&(Action, u32)> =
                scored.iter().filter(|(_, d)| *d == best).collect();
            let share = GREEDY_MASS / winners.len() as f32;
            for (action, _) in winners {
                policy[self.action_encoder.encode(action) as usize] += share;
            }
        }

        Ok(Evaluation { policy, value })
    }
}

// =============================================================================
// Batched evaluator
// =============================================================================

struct InferenceRequest {
    obs: Observation,
    reply: Sender<Result<Evaluation, EvaluatorError>>,
}

/// Coalesces concurrent `infer` calls into `infer_batch` calls on the inner
/// evaluator, amortizing per-call overhead when many game workers run at
/// once. A background thread collects requests until the batch is full or
/// the flush interval elapses, evaluates, and sends each result back.
///
/// Dropping the front shuts the worker thread down.
pub struct BatchedEvaluator {
    request_tx: Option<Sender<InferenceRequest>>,
    worker: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl BatchedEvaluator {
    pub fn new(
        inner: Arc<dyn Evaluator>,
        max_batch: usize,
        flush_interval: Duration,
        timeout: Duration,
    ) -> Self {
        assert!(max_batch > 0);
        let (request_tx, request_rx) = channel::unbounded::<InferenceRequest>();

        let worker = std::thread::spawn(move || loop {
            // Block for the first request, then fill the batch until the
            // deadline or the cap.
            let first = match request_rx.recv() {
                Ok(req) => req,
                Err(_) => break,
            };
            let mut pending = vec![first];
            let deadline = Instant::now() + flush_interval;
            while pending.len() < max_batch {
                match request_rx.recv_deadline(deadline) {
                    Ok(req) => pending.push(req),
                    Err(_) => break,
                }
            }

            let batch: Vec<Observation> = pending.iter().map(|req| req.obs.clone()).collect();
            match inner.infer_batch(&batch) {
                Ok(evals) => {
                    for (req, eval) in pending.into_iter().zip(evals) {
                        let _ = req.reply.send(Ok(eval));
                    }
                }
                Err(err) => {
                    for req in pending {
                        let _ = req.reply.send(Err(err.clone()));
                    }
                }
            }
        });

        Self {
            request_tx: Some(request_tx),
            worker: Some(worker),
            timeout,
        }
    }
}

impl Evaluator for BatchedEvaluator {
    fn infer(&self, obs: &Observation) -> Result<Evaluation, EvaluatorError> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        let request = InferenceRequest {
            obs: obs.clone(),
            reply: reply_tx,
        };
        self.request_tx
            .as_ref()
            .and_then(|tx| tx.send(request).ok())
            .ok_or_else(|| EvaluatorError::Unavailable("inference worker stopped".into()))?;

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EvaluatorError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(EvaluatorError::Unavailable("inference worker stopped".into()))
            }
        }
    }
}

impl Drop for BatchedEvaluator {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        drop(self.request_tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeatureExtractor;
    use quoridor_engine::new_game;

    fn opening_obs(config: &GameConfig) -> Observation {
        BoardEncoder::new(config).encode(&new_game(config), 0)
    }

    #[test]
    fn test_uniform_evaluator() {
        let eval = UniformEvaluator::new(293)
            .infer(&opening_obs(&GameConfig::standard()))
            .unwrap();
        assert_eq!(eval.policy.len(), 293);
        assert_eq!(eval.value, 0.0);
        let sum: f32 = eval.policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_shortest_path_evaluator_opening() {
        let config = GameConfig::standard();
        let evaluator = ShortestPathEvaluator::new(&config);
        let eval = evaluator.infer(&opening_obs(&config)).unwrap();

        // Symmetric opening: distances are equal.
        assert_eq!(eval.value, 0.0);
        let sum: f32 = eval.policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);

        // The forward step (1, 4) is the unique distance-minimizing move.
        let encoder = ActionEncoder::new(config.board_size);
        let forward = encoder.encode(&Action::Move { row: 1, col: 4 }) as usize;
        let max = eval
            .policy
            .iter()
            .cloned()
            .fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(eval.policy[forward], max);
        assert!(eval.policy[forward] > 0.5);
    }

    #[test]
    fn test_shortest_path_value_favors_the_leader() {
        let config = GameConfig::standard();
        let board_encoder = BoardEncoder::new(&config);
        let evaluator = ShortestPathEvaluator::new(&config);

        let mut state = new_game(&config);
        state.positions[0] = quoridor_engine::Cell::new(5, 4); // 3 from goal
        let eval = evaluator.infer(&board_encoder.encode(&state, 0)).unwrap();
        assert!(eval.value > 0.0);

        // Mirror of fortunes from the other side.
        let eval_opp = evaluator.infer(&board_encoder.encode(&state, 1)).unwrap();
        assert!(eval_opp.value < 0.0);
    }

    #[test]
    fn test_batched_evaluator_matches_direct() {
        let config = GameConfig::standard();
        let inner = Arc::new(ShortestPathEvaluator::new(&config));
        let batched = BatchedEvaluator::new(
            inner.clone(),
            8,
            Duration::from_millis(1),
            Duration::from_secs(5),
        );

        let obs = opening_obs(&config);
        let direct = inner.infer(&obs).unwrap();
        let via_batch = batched.infer(&obs).unwrap();
        assert_eq!(via_batch.policy, direct.policy);
        assert_eq!(via_batch.value, direct.value);
    }

    #[test]
    fn test_batched_evaluator_concurrent_requests() {
        let config = GameConfig::standard();
        let inner = Arc::new(ShortestPathEvaluator::new(&config));
        let batched = Arc::new(BatchedEvaluator::new(
            inner,
            4,
            Duration::from_millis(2),
            Duration::from_secs(5),
        ));

        let obs = opening_obs(&config);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let batched = Arc::clone(&batched);
                let obs = obs.clone();
                std::thread::spawn(move || batched.infer(&obs).unwrap().value)
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 0.0);
        }
    }
}
