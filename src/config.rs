//! Explicit configuration for the agent, the simulator and the training driver.
//!
//! Every struct deserializes from TOML with per-field defaults, so a config
//! file only needs the values it changes:
//!
//! ```toml
//! resume = false
//! max_episodes = 500
//!
//! [agent]
//! hidden_layers = [128, 64]
//! seed = 7
//! ```

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Learning hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hidden layer widths, input side first
    pub hidden_layers: Vec<usize>,

    pub learning_rate: f32,

    /// Discount factor (gamma) applied to the next state's best Q-value
    pub gamma: f32,

    /// Replay memory capacity
    pub memory_capacity: usize,

    /// Maximum transitions replayed at the end of each episode
    pub batch_size: usize,

    /// Episodes over which exploration decays linearly to zero
    pub exploration_episodes: u32,

    /// Exploration is `exploration_episodes - games_played` out of this many
    pub exploration_scale: u32,

    /// Seeds weight initialization, exploration and replay sampling
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![256],
            learning_rate: 0.001,
            gamma: 0.9,
            memory_capacity: 100_000,
            batch_size: 1000,
            exploration_episodes: 80,
            exploration_scale: 200,
            seed: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ConfigurationError::LearningRate(self.learning_rate));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ConfigurationError::Discount(self.gamma));
        }
        if let Some(i) = self.hidden_layers.iter().position(|&w| w == 0) {
            return Err(ConfigurationError::ZeroWidth { layer: i + 1 });
        }
        if self.memory_capacity == 0 {
            return Err(ConfigurationError::Zero("memory_capacity"));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::Zero("batch_size"));
        }
        if self.exploration_scale == 0 {
            return Err(ConfigurationError::Zero("exploration_scale"));
        }
        Ok(())
    }
}

/// Grid-world rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Grid width in cells
    pub width: i32,

    /// Grid height in cells
    pub height: i32,

    /// Body length (head included) after a reset
    pub initial_length: usize,

    /// An episode times out after `timeout_factor * body length` steps
    pub timeout_factor: u32,

    pub food_reward: f32,
    pub death_penalty: f32,
    pub step_penalty: f32,

    /// Seeds food placement
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 24,
            initial_length: 3,
            timeout_factor: 100,
            food_reward: 10.0,
            death_penalty: -10.0,
            step_penalty: -0.01,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let too_small = ConfigurationError::GridTooSmall {
            width: self.width,
            height: self.height,
            length: self.initial_length,
        };

        if self.width <= 0 || self.height <= 0 || self.initial_length == 0 {
            return Err(too_small);
        }
        // the body is laid out leftward from the center and needs one free cell for food
        let room_left = (self.width / 2) as usize + 1;
        let cells = self.width as usize * self.height as usize;
        if room_left < self.initial_length || cells <= self.initial_length {
            return Err(too_small);
        }
        if self.timeout_factor == 0 {
            return Err(ConfigurationError::Zero("timeout_factor"));
        }
        Ok(())
    }
}

/// Everything the training driver needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Where the best network is saved, and loaded from on resume
    pub checkpoint_path: PathBuf,

    /// Directory for `training_log.csv` and `positions_log.csv`
    pub log_dir: PathBuf,

    /// Load the checkpoint and append to existing logs; otherwise start fresh and truncate logs
    pub resume: bool,

    /// Stop after this many episodes; run until interrupted when unset
    pub max_episodes: Option<u32>,

    /// Log the head position every step
    pub log_positions: bool,

    pub agent: AgentConfig,
    pub game: GameConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("model/model.bin"),
            log_dir: PathBuf::from("data"),
            resume: true,
            max_episodes: None,
            log_positions: true,
            agent: AgentConfig::default(),
            game: GameConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TrainConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.agent.validate()?;
        self.game.validate()
    }
}
