use clap::Parser;
use snakeq::agent::state::{FEATURE_NAMES, STATE_SIZE};
use snakeq::network::checkpoint::{weight_key, Checkpoint};
use snakeq::Tensor;
use std::error::Error;
use std::path::PathBuf;

/// Print the contents of a saved checkpoint
#[derive(Parser, Debug)]
#[command(name = "inspect")]
struct Args {
    /// Checkpoint file
    #[arg(default_value = "model/model.bin")]
    path: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let checkpoint = Checkpoint::read(&args.path)?;
    println!("checkpoint: {}", args.path.display());
    println!("format version: {}", checkpoint.version);
    println!("layers: {}", checkpoint.layer_count);
    for (key, array) in &checkpoint.arrays {
        println!("  {:<4} {:?}", key, array.shape);
    }

    let Some(weights) = checkpoint.weights(0) else {
        return Err(format!("checkpoint has no {}", weight_key(0)).into());
    };
    let Some(stats) = feature_stats(weights) else {
        println!("first layer does not take {} state features, skipping feature summary", STATE_SIZE);
        return Ok(());
    };

    println!();
    println!("{:<16} {:>10} {:>10} {:>10}", "feature", "mean", "mean |w|", "max |w|");
    for (name, row) in FEATURE_NAMES.iter().zip(stats) {
        println!("{:<16} {:>10.4} {:>10.4} {:>10.4}", name, row.mean, row.mean_abs, row.max_abs);
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
struct RowStats {
    mean: f32,
    mean_abs: f32,
    max_abs: f32,
}

// one row of W1 per input feature; None unless W1 is a non-empty STATE_SIZE x n matrix
fn feature_stats(weights: &Tensor) -> Option<Vec<RowStats>> {
    if weights.shape.len() != 2 || weights.shape[0] != STATE_SIZE || weights.shape[1] == 0 {
        return None;
    }

    let data = weights.row_major();
    let stats = data
        .chunks(weights.shape[1])
        .map(|row| {
            let n = row.len() as f32;
            RowStats {
                mean: row.iter().sum::<f32>() / n,
                mean_abs: row.iter().map(|w| w.abs()).sum::<f32>() / n,
                max_abs: row.iter().fold(0.0f32, |m, w| m.max(w.abs())),
            }
        })
        .collect();
    Some(stats)
}
