use clap::Parser;
use snakeq::{Agent, SnakeGame, TrainConfig, Trainer, TrainingLog};
use std::error::Error;
use std::path::PathBuf;

/// Train a Q-learning agent on the snake grid world
#[derive(Parser, Debug)]
#[command(name = "train")]
#[command(version)]
#[command(about = "Train a Q-learning snake agent", long_about = None)]
struct Args {
    /// TOML config file; defaults are used for anything it leaves out
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many episodes
    #[arg(short, long)]
    episodes: Option<u32>,

    /// Ignore any checkpoint and truncate existing logs
    #[arg(long)]
    fresh: bool,

    /// Checkpoint file to resume from and save records to
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Directory for the CSV logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Seed the agent and the game for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Don't log the head position every step
    #[arg(long)]
    no_positions: bool,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn into_config(self) -> Result<TrainConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_file(path)?,
            None => TrainConfig::default(),
        };

        if self.episodes.is_some() {
            config.max_episodes = self.episodes;
        }
        if self.fresh {
            config.resume = false;
        }
        if let Some(path) = self.checkpoint {
            config.checkpoint_path = path;
        }
        if let Some(dir) = self.log_dir {
            config.log_dir = dir;
        }
        if let Some(seed) = self.seed {
            config.agent.seed = Some(seed);
            config.game.seed = Some(seed.wrapping_add(1));
        }
        if self.no_positions {
            config.log_positions = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let print_config = args.print_config;
    let config = args.into_config()?;
    if print_config {
        print!("{}", toml::to_string(&config)?);
        return Ok(());
    }

    let agent = Agent::new(&config.agent)?;
    let game = SnakeGame::new(config.game.clone())?;
    let log = TrainingLog::open(&config.log_dir, !config.resume, config.log_positions)?;

    let mut trainer = Trainer::new(agent, game, &config).with_log(log);
    if config.resume {
        trainer.resume();
    }

    match config.max_episodes {
        Some(n) => log::info!("training for {} episodes", n),
        None => log::info!("training until interrupted"),
    }
    trainer.run()?;

    log::info!("finished {} episodes, record {}", trainer.episodes(), trainer.record());
    Ok(())
}
