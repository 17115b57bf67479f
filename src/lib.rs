pub mod network;

pub use network::tensor::Tensor;
pub use network::layer::{
    Dense,
    ReLU,
};
pub use network::loss::MeanSquaredError;
pub use network::optimizer::SGD;
pub use network::checkpoint::Checkpoint;
pub use network::NetworkModel;

pub mod agent;

pub use agent::Agent;
pub use agent::replaymemory::{ReplayMemory, Transition};
pub use agent::state::{Action, StateVector};

pub mod environment;
pub mod game;

pub use environment::{Environment, Heading, StepOutcome, TerminalCause};
pub use game::SnakeGame;

pub mod config;
pub mod error;
pub mod report;
pub mod trainer;

pub use config::{AgentConfig, GameConfig, TrainConfig};
pub use error::{ConfigurationError, Error, PersistenceError, ReportError};
pub use report::TrainingLog;
pub use trainer::{CheckpointStatus, EpisodeSummary, Trainer};
