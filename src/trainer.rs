use crate::agent::replaymemory::Transition;
use crate::agent::state::StateVector;
use crate::agent::Agent;
use crate::config::TrainConfig;
use crate::environment::{Environment, TerminalCause};
use crate::error::ReportError;
use crate::report::{self, TrainingLog};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// What happened to the checkpoint at the end of an episode.
#[derive(Clone, Debug, PartialEq)]
pub enum CheckpointStatus {
    /// No new record, nothing to save.
    NotAttempted,
    Saved,
    /// Saving failed; training carries on.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeSummary {
    /// 1-based episode number
    pub game: u32,
    pub score: u32,
    pub record: u32,
    pub steps: u32,
    pub avg_steps: f32,
    pub cause: Option<TerminalCause>,
    /// Mean score over every episode this trainer has finished
    pub mean_score: f32,
    /// Mean loss of the end-of-episode replay
    pub batch_loss: f32,
    pub checkpoint: CheckpointStatus,
}

/// Drives an `Agent` against an `Environment`, one step at a time.
pub struct Trainer<E: Environment> {
    agent: Agent,
    env: E,
    checkpoint_path: PathBuf,
    max_episodes: Option<u32>,
    log: Option<TrainingLog>,

    record: u32,
    total_score: u64,
    episodes: u32,
    episode_steps: u32,
}

impl<E: Environment> Trainer<E> {
    pub fn new(agent: Agent, env: E, config: &TrainConfig) -> Self {
        Self {
            agent,
            env,
            checkpoint_path: config.checkpoint_path.clone(),
            max_episodes: config.max_episodes,
            log: None,
            record: 0,
            total_score: 0,
            episodes: 0,
            episode_steps: 0,
        }
    }

    pub fn with_log(mut self, log: TrainingLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Warm-starts the network from the checkpoint. A failure is logged and the
    /// current weights are kept.
    pub fn resume(&mut self) -> bool {
        match self.agent.model_mut().load(&self.checkpoint_path) {
            Ok(()) => {
                info!("resumed from checkpoint {:?}", self.checkpoint_path);
                true
            }
            Err(e) => {
                warn!("could not resume, starting from fresh weights: {}", e);
                false
            }
        }
    }

    pub fn agent(&self) -> &Agent {&self.agent}
    pub fn env(&self) -> &E {&self.env}
    pub fn record(&self) -> u32 {self.record}
    pub fn episodes(&self) -> u32 {self.episodes}
    pub fn checkpoint_path(&self) -> &Path {&self.checkpoint_path}

    /// One environment step and its online update. Returns a summary when the step ended an episode.
    pub fn step(&mut self) -> Result<Option<EpisodeSummary>, ReportError> {
        let state = StateVector::observe(&self.env);
        let action = self.agent.choose_action(&state);
        let outcome = self.env.step(action);
        let next_state = StateVector::observe(&self.env);

        let transition = Transition {
            state,
            action,
            reward: outcome.reward,
            next_state,
            terminal: outcome.terminal,
        };
        self.agent.train_online(&transition);
        self.agent.remember(transition);

        let game = self.episodes + 1;
        let head = self.env.head();
        self.episode_steps += 1;

        // the episode is closed out before any log write can fail
        let summary = outcome.terminal.then(|| self.finish_episode(outcome.score, outcome.cause));

        if let Some(log) = self.log.as_mut() {
            log.record_position(game, head)?;
            if let Some(summary) = &summary {
                log.record_episode(summary.game, summary.score, summary.record, summary.avg_steps, summary.cause)?;
            }
        }

        Ok(summary)
    }

    fn finish_episode(&mut self, score: u32, cause: Option<TerminalCause>) -> EpisodeSummary {
        self.env.reset();
        let batch_loss = self.agent.finish_episode();

        self.episodes += 1;
        self.total_score += score as u64;

        let checkpoint = if score > self.record {
            self.record = score;
            match self.agent.model().save(&self.checkpoint_path) {
                Ok(()) => {
                    info!("new record {}, saved {:?}", score, self.checkpoint_path);
                    CheckpointStatus::Saved
                }
                Err(e) => {
                    warn!("new record {} but checkpoint save failed: {}", score, e);
                    CheckpointStatus::Failed(e.to_string())
                }
            }
        } else {
            CheckpointStatus::NotAttempted
        };

        let steps = std::mem::take(&mut self.episode_steps);
        let summary = EpisodeSummary {
            game: self.episodes,
            score,
            record: self.record,
            steps,
            avg_steps: report::average_steps(steps, score),
            cause,
            mean_score: self.total_score as f32 / self.episodes as f32,
            batch_loss,
            checkpoint,
        };

        let reason = cause.map(|c| c.to_string()).unwrap_or_default();
        info!("Game: {}, Score: {}, Record: {}, Reason: {}", summary.game, score, self.record, reason);

        summary
    }

    pub fn run_episode(&mut self) -> Result<EpisodeSummary, ReportError> {
        loop {
            if let Some(summary) = self.step()? {
                return Ok(summary);
            }
        }
    }

    /// Trains until `max_episodes` have finished, or forever when unset.
    pub fn run(&mut self) -> Result<(), ReportError> {
        while self.max_episodes.is_none_or(|max| self.episodes < max) {
            self.run_episode()?;
        }
        Ok(())
    }
}
