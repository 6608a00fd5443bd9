//! AlphaZero-style MCTS over the Quoridor engine
//!
//! This module provides:
//! - `MctsConfig` for search configuration
//! - `Mcts` implementing PUCT search guided by an `Evaluator`
//! - Supporting types: `Node`, `ChildEdge`, `MctsTree`, `SearchResult`

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_distr::{Distribution, Gamma};

use quoridor_engine::{apply_action, is_terminal, legal_actions, Action, GameConfig, GameState,
    Outcome, PlayerIdx};

use crate::{ActionEncoder, ActionId, Evaluator, EvaluatorError, FeatureExtractor};

const EPS: f32 = 1e-8;

/// Configuration for AlphaZero-style MCTS.
#[derive(Clone, Debug)]
pub struct MctsConfig {
    /// Number of simulations per root move.
    pub num_simulations: u32,

    /// PUCT exploration constant.
    pub cpuct: f32,

    /// Dirichlet concentration parameter alpha for root noise.
    /// Only used if > 0.0.
    pub root_dirichlet_alpha: f32,

    /// Root Dirichlet noise epsilon (fraction of noise vs prior).
    pub root_dirichlet_eps: f32,

    /// Maximum search depth in playouts (safety bound).
    pub max_depth: u32,

    /// Optional wall-clock budget per search; whichever of this and the
    /// simulation count runs out first ends the search.
    pub time_budget: Option<Duration>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 256,
            cpuct: 1.5,
            root_dirichlet_alpha: 0.3,
            root_dirichlet_eps: 0.25,
            max_depth: 200,
            time_budget: None,
        }
    }
}

/// Index into MCTS node arena.
pub type NodeIdx = u32;

/// Edge statistics for an action from a given node.
#[derive(Clone, Debug)]
pub struct ChildEdge {
    /// Absolute (not canonical-perspective) action.
    pub action: Action,
    pub prior: f32,             // P(s, a)
    pub visit_count: u32,       // N(s, a)
    pub value_sum: f32,         // W(s, a), sum of backed-up values
    pub child: Option<NodeIdx>, // None until first descent along this edge
}

/// Node in the MCTS tree.
///
/// Created unexpanded; the first simulation that reaches it runs the
/// evaluator and fills in `children`. Terminal nodes never expand.
#[derive(Clone, Debug)]
pub struct Node {
    pub state: GameState,
    pub to_move: PlayerIdx,
    pub outcome: Option<Outcome>,

    /// Edges for all legal actions; empty until expanded.
    pub children: Vec<ChildEdge>,
    pub expanded: bool,

    /// Visit count at this node. Includes the visit that expanded (or, for
    /// terminal nodes, first evaluated) it, so the children's edge visits
    /// always sum to `visit_count - 1`. A fresh root therefore reaches
    /// exactly S after S simulations.
    pub visit_count: u32,
}

/// The MCTS tree structure: a flat arena indexed by `NodeIdx`.
#[derive(Clone, Debug, Default)]
pub struct MctsTree {
    pub nodes: Vec<Node>,
}

impl MctsTree {
    fn push(&mut self, node: Node) -> NodeIdx {
        let idx = self.nodes.len() as NodeIdx;
        self.nodes.push(node);
        idx
    }
}

/// Path step during tree traversal for backup.
#[derive(Clone, Debug)]
struct PathStep {
    node_idx: NodeIdx,
    child_idx: usize,
}

/// Output of a search at the root.
#[derive(Clone, Debug)]
pub struct SearchResult {
    /// The selected action (absolute perspective, directly applicable).
    pub action: Action,

    /// Visit-count policy over the full action space, indexed by
    /// canonical-perspective action id and normalized.
    pub policy: Vec<f32>,
}

/// PUCT tree search driven by an `Evaluator`.
pub struct Mcts<F: FeatureExtractor> {
    pub config: MctsConfig,
    game: GameConfig,
    encoder: ActionEncoder,
    features: F,
    evaluator: Arc<dyn Evaluator>,
}

impl<F: FeatureExtractor> Mcts<F> {
    pub fn new(
        config: MctsConfig,
        game: GameConfig,
        features: F,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        let encoder = ActionEncoder::new(game.board_size);
        Self {
            config,
            game,
            encoder,
            features,
            evaluator,
        }
    }

    /// Run a full search from `root_state` and pick a move at the given
    /// temperature. Evaluator failures abort the search and propagate.
    pub fn search(
        &self,
        root_state: &GameState,
        temperature: f32,
        rng: &mut impl Rng,
    ) -> Result<SearchResult, EvaluatorError> {
        let (tree, root_idx) = self.run_search(root_state, rng)?;
        let root = &tree.nodes[root_idx as usize];

        // Visit-count policy in the canonical frame, which is the frame the
        // recorded observations and the evaluator's policies live in.
        let to_move = root.to_move;
        let size = self.encoder.action_space_size();
        let mut counts = vec![0.0f32; size];
        for edge in &root.children {
            let id = self.canonical_id(edge.action, to_move);
            counts[id as usize] = edge.visit_count as f32;
        }

        // A one-simulation search leaves no edge visits; fall back to the
        // root priors so move selection still has a distribution.
        if counts.iter().sum::<f32>() == 0.0 {
            for edge in &root.children {
                let id = self.canonical_id(edge.action, to_move);
                counts[id as usize] = edge.prior;
            }
        }

        let pi = apply_temperature(&counts, temperature);
        let chosen = sample_from_policy(&pi, temperature, rng);
        let action = self
            .encoder
            .to_canonical(self.encoder.decode(chosen as ActionId), to_move);

        Ok(SearchResult { action, policy: pi })
    }

    fn canonical_id(&self, action: Action, player: PlayerIdx) -> ActionId {
        self.encoder.encode(&self.encoder.to_canonical(action, player))
    }

    /// Build the search tree: `num_simulations` simulations, bounded by the
    /// optional wall-clock budget. Root noise is mixed in right after the
    /// first simulation expands the root.
    fn run_search(
        &self,
        root_state: &GameState,
        rng: &mut impl Rng,
    ) -> Result<(MctsTree, NodeIdx), EvaluatorError> {
        debug_assert!(
            is_terminal(root_state, &self.game).is_none(),
            "search called on a terminal state"
        );

        let mut tree = MctsTree::default();
        let root_idx = tree.push(self.make_node(root_state.clone()));

        let started = Instant::now();
        for i in 0..self.config.num_simulations {
            if i > 0 {
                if let Some(budget) = self.config.time_budget {
                    if started.elapsed() >= budget {
                        break;
                    }
                }
            }

            self.simulate(&mut tree, root_idx)?;

            if i == 0 && self.config.root_dirichlet_alpha > 0.0 {
                add_dirichlet_noise(
                    &mut tree.nodes[root_idx as usize].children,
                    self.config.root_dirichlet_alpha,
                    self.config.root_dirichlet_eps,
                    rng,
                );
            }
        }

        Ok((tree, root_idx))
    }

    fn make_node(&self, state: GameState) -> Node {
        Node {
            to_move: state.to_move,
            outcome: is_terminal(&state, &self.game),
            state,
            children: Vec::new(),
            expanded: false,
            visit_count: 0,
        }
    }

    /// Run one simulation: select down to a leaf, evaluate or expand it,
    /// back the value up the path with a sign flip per ply.
    fn simulate(&self, tree: &mut MctsTree, root_idx: NodeIdx) -> Result<(), EvaluatorError> {
        let mut path: Vec<PathStep> = Vec::new();
        let mut current_idx = root_idx;

        // Selection: traverse using PUCT until a terminal, unexpanded, or
        // depth-capped node.
        loop {
            let node = &tree.nodes[current_idx as usize];
            if node.outcome.is_some() || !node.expanded {
                break;
            }
            if path.len() >= self.config.max_depth as usize {
                break;
            }

            let child_idx = select_child(node, self.config.cpuct);
            path.push(PathStep {
                node_idx: current_idx,
                child_idx,
            });

            let edge = &tree.nodes[current_idx as usize].children[child_idx];
            if let Some(next_idx) = edge.child {
                current_idx = next_idx;
            } else {
                // First descent along this edge: create the child node.
                let parent_state = tree.nodes[current_idx as usize].state.clone();
                let action = edge.action;
                let next_state = apply_action(&parent_state, action)
                    .expect("MCTS should only descend legal actions");
                let new_idx = tree.push(self.make_node(next_state));
                tree.nodes[current_idx as usize].children[child_idx].child = Some(new_idx);
                current_idx = new_idx;
                break;
            }
        }

        // Evaluation: terminal outcome, expansion, or value-only at the
        // depth cap.
        let leaf = &tree.nodes[current_idx as usize];
        let leaf_value = if let Some(outcome) = leaf.outcome {
            outcome.value_for(leaf.to_move)
        } else if !leaf.expanded {
            self.expand(tree, current_idx)?
        } else {
            let obs = self.features.encode(&leaf.state, leaf.to_move);
            self.evaluator.infer(&obs)?.value
        };

        // Backup. The leaf's own visit counts its evaluation; each parent
        // edge stores the value from that parent's perspective.
        tree.nodes[current_idx as usize].visit_count += 1;
        let mut value = leaf_value;
        for step in path.iter().rev() {
            value = -value;
            let node = &mut tree.nodes[step.node_idx as usize];
            let edge = &mut node.children[step.child_idx];
            edge.visit_count += 1;
            edge.value_sum += value;
            node.visit_count += 1;
        }
        Ok(())
    }

    /// Expand a node: evaluate it, restrict the policy to legal actions and
    /// renormalize (uniform fallback when the legal mass is zero), create
    /// the child edges. Returns the evaluator's value for the node.
    fn expand(&self, tree: &mut MctsTree, idx: NodeIdx) -> Result<f32, EvaluatorError> {
        let (state, to_move) = {
            let node = &tree.nodes[idx as usize];
            (node.state.clone(), node.to_move)
        };

        let obs = self.features.encode(&state, to_move);
        let eval = self.evaluator.infer(&obs)?;

        let actions = legal_actions(&state);
        let mut children: Vec<ChildEdge> = Vec::with_capacity(actions.len());
        let mut legal_mass = 0.0f32;
        for action in actions {
            // The evaluator's policy is indexed in the canonical frame.
            let id = self.canonical_id(action, to_move) as usize;
            let prior = eval.policy.get(id).copied().unwrap_or(0.0).max(0.0);
            legal_mass += prior;
            children.push(ChildEdge {
                action,
                prior,
                visit_count: 0,
                value_sum: 0.0,
                child: None,
            });
        }

        if legal_mass > 0.0 {
            for edge in &mut children {
                edge.prior /= legal_mass;
            }
        } else {
            // All prior mass landed on illegal actions.
            let uniform = 1.0 / children.len().max(1) as f32;
            for edge in &mut children {
                edge.prior = uniform;
            }
        }

        let node = &mut tree.nodes[idx as usize];
        node.children = children;
        node.expanded = true;
        Ok(eval.value)
    }
}

/// PUCT selection: choose the child with the highest Q + U score. Unvisited
/// edges score on prior alone, with Q = 0 and an epsilon so the term is
/// nonzero even before the parent has edge visits.
fn select_child(node: &Node, cpuct: f32) -> usize {
    let mut best_idx = 0;
    let mut best_score = f32::NEG_INFINITY;

    let parent_n = node.visit_count as f32;
    for (i, edge) in node.children.iter().enumerate() {
        let score = if edge.visit_count > 0 {
            let q = edge.value_sum / edge.visit_count as f32;
            q + cpuct * edge.prior * (parent_n.sqrt() / (1.0 + edge.visit_count as f32))
        } else {
            cpuct * edge.prior * (parent_n + EPS).sqrt()
        };
        if score > best_score {
            best_score = score;
            best_idx = i;
        }
    }
    best_idx
}

/// Apply temperature to visit counts to get a policy.
fn apply_temperature(counts: &[f32], tau: f32) -> Vec<f32> {
    let mut pi = vec![0.0f32; counts.len()];

    if tau <= 1e-6 {
        // Argmax: set pi[a*] = 1, others 0
        let mut best_idx = 0;
        let mut best_count = f32::NEG_INFINITY;
        for (i, &c) in counts.iter().enumerate() {
            if c > best_count {
                best_count = c;
                best_idx = i;
            }
        }
        if best_count > 0.0 {
            pi[best_idx] = 1.0;
        }
    } else {
        // pi(a) proportional to N(a)^(1/tau)
        let inv_tau = 1.0 / tau;
        let mut sum = 0.0;
        for (i, &c) in counts.iter().enumerate() {
            if c > 0.0 {
                let p = c.powf(inv_tau);
                pi[i] = p;
                sum += p;
            }
        }
        if sum > 0.0 {
            for p in &mut pi {
                *p /= sum;
            }
        }
    }

    pi
}

/// Sample an action id from the policy distribution.
fn sample_from_policy(pi: &[f32], tau: f32, rng: &mut impl Rng) -> usize {
    if tau <= 1e-6 {
        // Argmax
        pi.iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0)
    } else {
        // Sample according to distribution
        let r: f32 = rng.random();
        let mut cumsum = 0.0;
        for (i, &p) in pi.iter().enumerate() {
            cumsum += p;
            if r < cumsum {
                return i;
            }
        }
        // Fallback to last non-zero
        pi.iter()
            .enumerate()
            .rev()
            .find(|(_, &p)| p > 0.0)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Add Dirichlet noise to root priors for exploration.
/// Uses gamma sampling method: sample x_i ~ Gamma(alpha, 1), normalize to get Dir(alpha).
fn add_dirichlet_noise(edges: &mut [ChildEdge], alpha: f32, eps: f32, rng: &mut impl Rng) {
    if edges.is_empty() || alpha <= 0.0 {
        return;
    }

    let gamma = match Gamma::new(alpha as f64, 1.0) {
        Ok(g) => g,
        Err(_) => return, // Skip noise if Gamma creation fails
    };

    let mut noise: Vec<f64> = Vec::with_capacity(edges.len());
    let mut sum = 0.0;
    for _ in 0..edges.len() {
        let sample = gamma.sample(rng);
        noise.push(sample);
        sum += sample;
    }

    if sum > 0.0 {
        for x in &mut noise {
            *x /= sum;
        }
    }

    // Mix noise with priors: P'(s,a) = (1-eps)*P(s,a) + eps*eta_a
    for (edge, &eta) in edges.iter_mut().zip(noise.iter()) {
        edge.prior = (1.0 - eps) * edge.prior + eps * (eta as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoardEncoder, Evaluation, Observation, ShortestPathEvaluator, UniformEvaluator};
    use quoridor_engine::new_game;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct FailingEvaluator;

    impl Evaluator for FailingEvaluator {
        fn infer(&self, _obs: &Observation) -> Result<Evaluation, EvaluatorError> {
            Err(EvaluatorError::Unavailable("offline".into()))
        }
    }

    fn quiet_config(num_simulations: u32) -> MctsConfig {
        MctsConfig {
            num_simulations,
            root_dirichlet_alpha: 0.0, // Disable noise for determinism
            ..MctsConfig::default()
        }
    }

    fn mcts(game: &GameConfig, config: MctsConfig) -> Mcts<BoardEncoder> {
        let encoder = ActionEncoder::new(game.board_size);
        let evaluator = Arc::new(UniformEvaluator::new(encoder.action_space_size()));
        Mcts::new(config, game.clone(), BoardEncoder::new(game), evaluator)
    }

    #[test]
    fn test_mcts_config_default() {
        let config = MctsConfig::default();
        assert_eq!(config.num_simulations, 256);
        assert_eq!(config.cpuct, 1.5);
        assert!(config.time_budget.is_none());
    }

    #[test]
    fn test_apply_temperature_argmax() {
        let mut counts = vec![0.0f32; 293];
        counts[10] = 100.0;
        counts[20] = 50.0;

        let pi = apply_temperature(&counts, 0.0);
        assert_eq!(pi[10], 1.0);
        assert_eq!(pi[20], 0.0);
    }

    #[test]
    fn test_apply_temperature_uniform() {
        let mut counts = vec![0.0f32; 293];
        counts[10] = 100.0;
        counts[20] = 100.0;

        let pi = apply_temperature(&counts, 1.0);
        assert!((pi[10] - 0.5).abs() < 1e-5);
        assert!((pi[20] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_sample_from_policy_argmax() {
        let mut pi = vec![0.0f32; 293];
        pi[42] = 1.0;

        let mut rng = StdRng::seed_from_u64(12345);
        assert_eq!(sample_from_policy(&pi, 0.0, &mut rng), 42);
    }

    #[test]
    fn test_visit_count_convention() {
        // A fresh root's total equals the simulation count, and edge visits
        // sum to one less (the expansion visit is the node's own).
        let game = GameConfig::with_board_size(5);
        let search = mcts(&game, quiet_config(25));
        let mut rng = StdRng::seed_from_u64(7);

        let (tree, root_idx) = search.run_search(&new_game(&game), &mut rng).unwrap();
        let root = &tree.nodes[root_idx as usize];
        assert_eq!(root.visit_count, 25);
        let edge_sum: u32 = root.children.iter().map(|e| e.visit_count).sum();
        assert_eq!(edge_sum, 24);

        // Holds below the root too.
        for node in &tree.nodes {
            if node.expanded {
                let children: u32 = node.children.iter().map(|e| e.visit_count).sum();
                assert_eq!(children + 1, node.visit_count);
            }
        }
    }

    #[test]
    fn test_search_returns_legal_action() {
        let game = GameConfig::standard();
        let search = mcts(&game, quiet_config(16));
        let state = new_game(&game);
        let legal = legal_actions(&state);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..10 {
            let result = search.search(&state, 1.0, &mut rng).unwrap();
            assert!(legal.contains(&result.action), "illegal {:?}", result.action);
        }
    }

    #[test]
    fn test_search_policy_normalized() {
        let game = GameConfig::standard();
        let search = mcts(&game, quiet_config(32));
        let mut rng = StdRng::seed_from_u64(3);

        let result = search.search(&new_game(&game), 1.0, &mut rng).unwrap();
        let sum: f32 = result.policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_search_determinism() {
        let game = GameConfig::with_board_size(5);
        let state = new_game(&game);

        let run = |seed: u64| {
            let search = mcts(&game, quiet_config(32));
            let mut rng = StdRng::seed_from_u64(seed);
            let mut actions = Vec::new();
            let mut s = state.clone();
            for _ in 0..6 {
                let result = search.search(&s, 1.0, &mut rng).unwrap();
                actions.push(result.action);
                s = apply_action(&s, result.action).unwrap();
            }
            actions
        };

        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_search_prefers_winning_move() {
        // Player 0 one step from goal: with a value-aware evaluator the
        // search piles visits onto the winning step.
        let game = GameConfig::standard();
        let encoder = BoardEncoder::new(&game);
        let evaluator = Arc::new(ShortestPathEvaluator::new(&game));
        let search = Mcts::new(quiet_config(64), game.clone(), encoder, evaluator);

        let mut state = new_game(&game);
        state.positions[0] = quoridor_engine::Cell::new(7, 4);
        state.positions[1] = quoridor_engine::Cell::new(4, 0);

        let mut rng = StdRng::seed_from_u64(11);
        let result = search.search(&state, 0.0, &mut rng).unwrap();
        assert_eq!(result.action, Action::Move { row: 8, col: 4 });
    }

    #[test]
    fn test_single_simulation_falls_back_to_priors() {
        let game = GameConfig::with_board_size(5);
        let search = mcts(&game, quiet_config(1));
        let state = new_game(&game);
        let legal = legal_actions(&state);
        let mut rng = StdRng::seed_from_u64(5);

        let result = search.search(&state, 1.0, &mut rng).unwrap();
        assert!(legal.contains(&result.action));
        let sum: f32 = result.policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_mirror_symmetric_policies() {
        // With uniform priors and a single simulation the policy is the
        // masked prior, so mirroring the state mirrors the policy exactly.
        let game = GameConfig::standard();
        let search = mcts(&game, quiet_config(1));
        let action_encoder = ActionEncoder::new(game.board_size);

        let mut state = new_game(&game);
        state.positions[0] = quoridor_engine::Cell::new(3, 2);
        state.h_walls.set(5, 1);

        let mut rng = StdRng::seed_from_u64(1);
        let pi = search.search(&state, 1.0, &mut rng).unwrap().policy;
        let pi_mirrored = search
            .search(&quoridor_engine::mirror(&state), 1.0, &mut rng)
            .unwrap()
            .policy;

        let unmirrored = action_encoder.mirror_policy(&pi_mirrored);
        for (a, b) in pi.iter().zip(unmirrored.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_evaluator_error_propagates() {
        let game = GameConfig::standard();
        let search = Mcts::new(
            quiet_config(8),
            game.clone(),
            BoardEncoder::new(&game),
            Arc::new(FailingEvaluator),
        );
        let mut rng = StdRng::seed_from_u64(42);
        let result = search.search(&new_game(&game), 1.0, &mut rng);
        assert_eq!(
            result.unwrap_err(),
            EvaluatorError::Unavailable("offline".into())
        );
    }

    #[test]
    fn test_time_budget_cuts_search_short() {
        let game = GameConfig::standard();
        let config = MctsConfig {
            num_simulations: u32::MAX,
            time_budget: Some(Duration::from_millis(20)),
            ..quiet_config(0)
        };
        let search = mcts(&game, config);
        let mut rng = StdRng::seed_from_u64(42);

        let started = Instant::now();
        let result = search.search(&new_game(&game), 1.0, &mut rng).unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(legal_actions(&new_game(&game)).contains(&result.action));
    }
}
