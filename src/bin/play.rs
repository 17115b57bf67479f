use clap::Parser;
use macroquad::prelude::*;
use snakeq::{Agent, Environment, GameConfig, SnakeGame, StateVector, TrainConfig};
use std::error::Error;
use std::path::PathBuf;

const SCORE_AREA_HEIGHT: f32 = 60.0;
const SCORE_TEXT_SIZE: f32 = 40.0;
const CELL_SIZE: i32 = 25;
const AGENT_TICK_SPEED: f32 = 0.05; // seconds

/// Watch a trained agent play greedily
#[derive(Parser, Debug)]
#[command(name = "play")]
struct Args {
    /// TOML config the agent was trained with
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Checkpoint to load; defaults to the config's checkpoint path
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Seconds between moves
    #[arg(short, long, default_value_t = AGENT_TICK_SPEED)]
    tick: f32,
}

fn window_conf() -> Conf {
    // the grid is scaled to the window, so the default grid only sets the aspect
    let grid = GameConfig::default();
    Conf {
        window_title: "snakeq".to_owned(),
        window_width: grid.width * CELL_SIZE,
        window_height: (SCORE_AREA_HEIGHT as i32) + grid.height * CELL_SIZE,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => TrainConfig::from_file(path)?,
        None => TrainConfig::default(),
    };
    let checkpoint = args.checkpoint.unwrap_or(config.checkpoint_path);

    let mut agent = Agent::new(&config.agent)?;
    agent.model_mut().load(&checkpoint)?;
    log::info!("loaded {:?}", checkpoint);

    let mut game = SnakeGame::new(config.game)?;
    let mut best = 0;
    let mut time_accumulator: f32 = 0.0; // seconds

    loop {
        if is_key_pressed(KeyCode::Escape) {
            return Ok(());
        }

        time_accumulator += get_frame_time();
        while time_accumulator >= args.tick {
            time_accumulator -= args.tick;

            let state = StateVector::observe(&game);
            let action = agent.greedy_action(&state);
            let outcome = game.step(action);

            if outcome.terminal {
                best = best.max(outcome.score);
                log::info!("Score: {}, Best: {}, Reason: {}", outcome.score, best, outcome.cause.map(|c| c.to_string()).unwrap_or_default());
                game.reset();
            }
        }

        draw(&game, best);
        next_frame().await
    }
}

fn draw(game: &SnakeGame, best: u32) {
    let screen_w = screen_width();
    let screen_h = screen_height();
    let (grid_w, grid_h) = game.bounds();

    clear_background(Color::new(0.9, 0.9, 0.9, 1.0));


    // score area

    let score_area = Rect::new(0.0, 0.0, screen_w, SCORE_AREA_HEIGHT);

    draw_rectangle(
        score_area.x,
        score_area.y,
        score_area.w,
        score_area.h,
        Color::new(0.1, 0.1, 0.2, 1.0),
    );
    draw_line(score_area.x, score_area.h, screen_w, score_area.h, 2.0, BLACK);

    let score_text = format!("Score: {}   Best: {}", game.score(), best);
    let text_dims = measure_text(&score_text, None, SCORE_TEXT_SIZE as u16, 1.0);
    draw_text(
        &score_text,
        score_area.w / 2.0 - text_dims.width / 2.0,
        score_area.y + score_area.h / 2.0 + text_dims.height / 2.0,
        SCORE_TEXT_SIZE,
        WHITE,
    );


    // game area

    let game_area = Rect::new(0.0, score_area.h, screen_w, screen_h - score_area.h);

    let cell_width = game_area.w / grid_w as f32;
    let cell_height = game_area.h / grid_h as f32;
    let grid_line_color = Color::new(0.4, 0.4, 0.4, 0.3);

    for i in 1..grid_w {
        let x = game_area.x + i as f32 * cell_width;
        draw_line(x, game_area.y, x, game_area.y + game_area.h, 1.0, grid_line_color);
    }
    for i in 1..grid_h {
        let y = game_area.y + i as f32 * cell_height;
        draw_line(game_area.x, y, game_area.x + game_area.w, y, 1.0, grid_line_color);
    }

    let draw_cell = |cell: (i32, i32), border: Color, fill: Color| {
        let cell_fill_border: f32 = 2.0;
        let x = game_area.x + cell.0 as f32 * cell_width;
        let y = game_area.y + cell.1 as f32 * cell_height;
        draw_rectangle(x, y, cell_width - 1.0, cell_height - 1.0, border);
        draw_rectangle(
            x + cell_fill_border,
            y + cell_fill_border,
            (cell_width - 1.0) - cell_fill_border * 2.0,
            (cell_height - 1.0) - cell_fill_border * 2.0,
            fill,
        );
    };

    if let Some(target) = game.target() {
        draw_cell(target, Color::new(0.5, 0.0, 0.0, 1.0), RED);
    }
    for &segment in game.snake() {
        draw_cell(segment, DARKGREEN, GREEN);
    }
}
