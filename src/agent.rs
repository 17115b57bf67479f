pub mod replaymemory;
pub mod state;

use replaymemory::{ReplayMemory, Transition};
use state::{Action, StateVector, ACTION_COUNT, STATE_SIZE};
use crate::config::AgentConfig;
use crate::error::ConfigurationError;
use crate::network::{tensor::Tensor, NetworkModel};
use log::debug;
use rand::prelude::*;
use rand::rngs::StdRng;

/// Epsilon-greedy Q-learning agent over a `NetworkModel`.
pub struct Agent {
    model: NetworkModel,
    memory: ReplayMemory,

    batch_size: usize,
    discount_factor: f32,
    exploration_episodes: u32,
    exploration_scale: u32,

    games_played: u32,
    rng: StdRng,
}

impl Agent {
    pub fn new(config: &AgentConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let model = NetworkModel::with_rng(STATE_SIZE, &config.hidden_layers, ACTION_COUNT, config.learning_rate, &mut rng)?;

        Ok(Self::assemble(model, config, rng))
    }

    /// Wraps an existing model, which must map `STATE_SIZE` features to `ACTION_COUNT` values.
    pub fn with_model(model: NetworkModel, config: &AgentConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        if model.input_size() != STATE_SIZE {
            return Err(ConfigurationError::Interface { what: "input", expected: STATE_SIZE, found: model.input_size() });
        }
        if model.output_size() != ACTION_COUNT {
            return Err(ConfigurationError::Interface { what: "output", expected: ACTION_COUNT, found: model.output_size() });
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self::assemble(model, config, rng))
    }

    fn assemble(model: NetworkModel, config: &AgentConfig, rng: StdRng) -> Self {
        Self {
            model,
            memory: ReplayMemory::new(config.memory_capacity),
            batch_size: config.batch_size,
            discount_factor: config.gamma,
            exploration_episodes: config.exploration_episodes,
            exploration_scale: config.exploration_scale,
            games_played: 0,
            rng,
        }
    }

    pub fn model(&self) -> &NetworkModel {&self.model}
    pub fn model_mut(&mut self) -> &mut NetworkModel {&mut self.model}
    pub fn memory(&self) -> &ReplayMemory {&self.memory}
    pub fn games_played(&self) -> u32 {self.games_played}

    /// The counter is not stored in checkpoints; restoring it is up to the caller.
    pub fn set_games_played(&mut self, games_played: u32) {
        self.games_played = games_played;
    }

    /// Exploration chance, out of `exploration_scale`. Reaches zero after `exploration_episodes` games.
    pub fn epsilon(&self) -> u32 {
        self.exploration_episodes.saturating_sub(self.games_played)
    }

    pub fn q_values(&mut self, state: &StateVector) -> Tensor {
        self.model.forward(&state.to_tensor())
    }

    pub fn greedy_action(&mut self, state: &StateVector) -> Action {
        let best = self.q_values(state).argmax();
        Action::ALL[best]
    }

    pub fn choose_action(&mut self, state: &StateVector) -> Action {
        if self.rng.random_range(0..self.exploration_scale) < self.epsilon() {
            Action::ALL[self.rng.random_range(0..ACTION_COUNT)]
        } else {
            self.greedy_action(state)
        }
    }

    pub fn remember(&mut self, transition: Transition) {
        self.memory.add(transition);
    }

    /// Current predictions for `transition.state`, with only the taken action's slot
    /// replaced by the Bellman target (just the reward when terminal).
    pub fn bellman_target(&mut self, transition: &Transition) -> Tensor {
        let mut target = self.q_values(&transition.state);

        let q_new = if transition.terminal {
            transition.reward
        } else {
            transition.reward + self.discount_factor * self.q_values(&transition.next_state).max()
        };
        target.write()[transition.action.index()] = q_new;

        target
    }

    /// One gradient step on a single transition. Returns the loss before the step.
    pub fn train_online(&mut self, transition: &Transition) -> f32 {
        let target = self.bellman_target(transition);
        self.model.train_step(&transition.state.to_tensor(), &target)
    }

    /// Replays up to `batch_size` remembered transitions.
    ///
    /// Transitions are trained one after another, each against the network as
    /// already updated by the ones before it. This is deliberate: a single
    /// summed-gradient update over the batch learns differently.
    pub fn train_batch(&mut self) -> f32 {
        let batch = self.memory.sample(self.batch_size, &mut self.rng);
        if batch.is_empty() {
            return 0.0;
        }

        let total_loss: f32 = batch.iter().map(|transition| self.train_online(transition)).sum();
        let mean_loss = total_loss / batch.len() as f32;
        debug!("replayed {} transitions, mean loss {:.5}", batch.len(), mean_loss);
        mean_loss
    }

    /// Ends an episode: bumps the game counter, then replays one batch.
    pub fn finish_episode(&mut self) -> f32 {
        self.games_played += 1;
        self.train_batch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::layer::Dense;

    fn config() -> AgentConfig {
        AgentConfig { hidden_layers: vec![16], seed: Some(17), ..Default::default() }
    }

    fn state(index: usize) -> StateVector {
        let mut features = [0.0; STATE_SIZE];
        features[index] = 1.0;
        StateVector::new(features)
    }

    fn transition(action: Action, reward: f32, terminal: bool) -> Transition {
        Transition { state: state(0), action, reward, next_state: state(1), terminal }
    }

    // single linear layer with known outputs: state(i) -> row i of the weights
    fn linear_agent(gamma: f32) -> Agent {
        let mut layer = Dense::zeros(STATE_SIZE, ACTION_COUNT);
        let mut weights = vec![0.0; STATE_SIZE * ACTION_COUNT];
        weights[..6].copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 6.0, 5.0]);
        layer.weights = Tensor::from_vec(weights, vec![STATE_SIZE, ACTION_COUNT]);
        let model = NetworkModel::from_layers(vec![layer], 0.01).unwrap();
        Agent::with_model(model, &AgentConfig { gamma, ..config() }).unwrap()
    }

    #[test]
    fn test_with_model_checks_interface() {
        let wrong_input = NetworkModel::new(7, &[4], ACTION_COUNT, 0.01).unwrap();
        assert!(matches!(
            Agent::with_model(wrong_input, &config()),
            Err(ConfigurationError::Interface { what: "input", .. })
        ));

        let wrong_output = NetworkModel::new(STATE_SIZE, &[4], 4, 0.01).unwrap();
        assert!(matches!(
            Agent::with_model(wrong_output, &config()),
            Err(ConfigurationError::Interface { what: "output", .. })
        ));
    }

    #[test]
    fn test_epsilon_decays_linearly() {
        let mut agent = Agent::new(&config()).unwrap();
        assert_eq!(agent.epsilon(), 80);
        agent.set_games_played(30);
        assert_eq!(agent.epsilon(), 50);
        agent.set_games_played(80);
        assert_eq!(agent.epsilon(), 0);
        agent.set_games_played(500);
        assert_eq!(agent.epsilon(), 0);
    }

    #[test]
    fn test_no_exploration_after_decay() {
        let mut agent = Agent::new(&config()).unwrap();
        agent.set_games_played(80);
        let s = state(3);
        let greedy = agent.greedy_action(&s);

        for _ in 0..1000 {
            assert_eq!(agent.choose_action(&s), greedy);
        }
    }

    #[test]
    fn test_early_games_explore() {
        let mut agent = linear_agent(0.9);
        let s = state(0);
        assert_eq!(agent.greedy_action(&s), Action::Left);

        let chosen: Vec<Action> = (0..2000).map(|_| agent.choose_action(&s)).collect();
        assert!(chosen.contains(&Action::Straight));
        assert!(chosen.contains(&Action::Right));
    }

    #[test]
    fn test_greedy_picks_argmax() {
        let mut agent = linear_agent(0.9);
        // state(0) -> [1, 2, 3], state(1) -> [4, 6, 5]
        assert_eq!(agent.greedy_action(&state(0)), Action::Left);
        assert_eq!(agent.greedy_action(&state(1)), Action::Right);
        // all-zero input gives [0, 0, 0]; ties go to the lowest index
        assert_eq!(agent.greedy_action(&StateVector::new([0.0; STATE_SIZE])), Action::Straight);
    }

    #[test]
    fn test_terminal_target_is_raw_reward() {
        let mut agent = linear_agent(0.9);
        let target = agent.bellman_target(&transition(Action::Right, -10.0, true));
        assert_eq!(target.read(), &[1.0, -10.0, 3.0]);
    }

    #[test]
    fn test_nonterminal_target_adds_discounted_max() {
        let mut agent = linear_agent(0.5);
        // next state's best value is 6
        let target = agent.bellman_target(&transition(Action::Straight, 1.0, false));
        assert_eq!(target.read(), &[4.0, 2.0, 3.0]);
    }

    #[test]
    fn test_train_online_only_moves_chosen_action() {
        let mut agent = linear_agent(0.9);
        let t = transition(Action::Straight, 10.0, true);
        let before = agent.q_values(&t.state);

        let loss = agent.train_online(&t);
        let after = agent.q_values(&t.state);

        // error is (1 - 10) on one of three outputs
        assert!((loss - 81.0 / 3.0).abs() < 1e-4);
        assert!(after.read()[0] > before.read()[0]);
        assert_eq!(&after.read()[1..], &before.read()[1..]);
    }

    #[test]
    fn test_remember_and_finish_episode() {
        let mut agent = Agent::new(&config()).unwrap();
        assert_eq!(agent.train_batch(), 0.0);

        for i in 0..5 {
            agent.remember(transition(Action::ALL[i % 3], 1.0, i == 4));
        }
        assert_eq!(agent.memory().len(), 5);

        let loss = agent.finish_episode();
        assert_eq!(agent.games_played(), 1);
        assert!(loss.is_finite());
        assert_eq!(agent.memory().len(), 5);
    }

    #[test]
    fn test_train_batch_is_sequential() {
        // replaying the same transition twice must match two online updates in a row
        let t = transition(Action::Right, 2.0, false);
        let mut batched = linear_agent(0.9);
        batched.remember(t);
        batched.remember(t);
        batched.train_batch();

        let mut online = linear_agent(0.9);
        online.train_online(&t);
        online.train_online(&t);

        assert_eq!(batched.model().layers(), online.model().layers());
    }
}
