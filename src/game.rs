use crate::agent::state::Action;
use crate::config::GameConfig;
use crate::environment::{Environment, Heading, Point, StepOutcome, TerminalCause};
use crate::error::ConfigurationError;
use rand::prelude::*;
use rand::rngs::StdRng;

/// Headless grid world: steer a growing body toward food without hitting walls or itself.
pub struct SnakeGame {
    config: GameConfig,
    snake: Vec<Point>, // head first
    heading: Heading,
    target: Option<Point>, // food location
    score: u32,
    frame_iteration: u32,
    steps_since_target: u32,
    rng: StdRng,
}

impl SnakeGame {
    pub fn new(config: GameConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut instance = Self {
            config,
            snake: Vec::new(),
            heading: Heading::Right,
            target: None,
            score: 0,
            frame_iteration: 0,
            steps_since_target: 0,
            rng,
        };
        instance.reset();

        Ok(instance)
    }

    pub fn config(&self) -> &GameConfig {&self.config}
    pub fn snake(&self) -> &[Point] {&self.snake}
    pub fn score(&self) -> u32 {self.score}

    fn out_of_bounds(&self, cell: Point) -> bool {
        cell.0 < 0 || cell.0 >= self.config.width || cell.1 < 0 || cell.1 >= self.config.height
    }

    // uniform over free cells; None once the grid is full
    fn place_target(&mut self) {
        let free: Vec<Point> = (0..self.config.height)
            .flat_map(|y| (0..self.config.width).map(move |x| (x, y)))
            .filter(|cell| !self.snake.contains(cell))
            .collect();
        self.target = free.choose(&mut self.rng).copied();
    }
}

impl Environment for SnakeGame {
    fn step(&mut self, action: Action) -> StepOutcome {
        self.frame_iteration += 1;
        self.steps_since_target += 1;

        self.heading = self.heading.turn(action);
        let (dx, dy) = self.heading.vector();
        let new_head = (self.snake[0].0 + dx, self.snake[0].1 + dy);
        self.snake.insert(0, new_head);

        // the tail has not moved yet, so entering its cell counts as a collision
        let cause = if self.out_of_bounds(new_head) {
            Some(TerminalCause::Boundary)
        } else if self.snake[1..].contains(&new_head) {
            Some(TerminalCause::SelfCollision)
        } else if self.frame_iteration as usize > self.config.timeout_factor as usize * self.snake.len() {
            Some(TerminalCause::Timeout)
        } else {
            None
        };

        if cause.is_some() {
            return StepOutcome {
                reward: self.config.death_penalty,
                terminal: true,
                score: self.score,
                steps_since_target: self.steps_since_target,
                cause,
            };
        }

        let reward = if Some(new_head) == self.target {
            self.score += 1;
            self.steps_since_target = 0;
            self.place_target();
            self.config.food_reward
        } else {
            self.snake.pop();
            self.config.step_penalty
        };

        StepOutcome {
            reward,
            terminal: false,
            score: self.score,
            steps_since_target: self.steps_since_target,
            cause: None,
        }
    }

    fn reset(&mut self) {
        let head = (self.config.width / 2, self.config.height / 2);

        self.snake = (0..self.config.initial_length as i32).map(|i| (head.0 - i, head.1)).collect();
        self.heading = Heading::Right;
        self.score = 0;
        self.frame_iteration = 0;
        self.steps_since_target = 0;
        self.place_target();
    }

    fn head(&self) -> Point {
        self.snake[0]
    }

    fn body(&self) -> &[Point] {
        &self.snake[1..]
    }

    fn target(&self) -> Option<Point> {
        self.target
    }

    fn heading(&self) -> Heading {
        self.heading
    }

    fn bounds(&self) -> (i32, i32) {
        (self.config.width, self.config.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(width: i32, height: i32) -> SnakeGame {
        SnakeGame::new(GameConfig { width, height, seed: Some(1), ..Default::default() }).unwrap()
    }

    #[test]
    fn test_reset_layout() {
        let game = game(10, 10);
        assert_eq!(game.snake(), &[(5, 5), (4, 5), (3, 5)]);
        assert_eq!(game.heading(), Heading::Right);
        let target = game.target().unwrap();
        assert!(!game.snake().contains(&target));
        assert!(!game.out_of_bounds(target));
    }

    #[test]
    fn test_step_moves_and_turns() {
        let mut game = game(10, 10);
        game.target = Some((0, 0));

        let outcome = game.step(Action::Right);
        assert_eq!(game.heading(), Heading::Down);
        assert_eq!(game.snake(), &[(5, 6), (5, 5), (4, 5)]);
        assert!(!outcome.terminal);
        assert_eq!(outcome.reward, -0.01);
        assert_eq!(outcome.cause, None);
    }

    #[test]
    fn test_step_ate_food_reward() {
        let mut game = game(10, 10);
        game.target = Some((6, 5));

        let outcome = game.step(Action::Straight);

        assert_eq!(outcome.reward, 10.0);
        assert!(!outcome.terminal);
        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.steps_since_target, 0);
        assert_eq!(game.snake().len(), 4);
        assert_ne!(game.target(), Some((6, 5)));
    }

    #[test]
    fn test_step_boundary_death() {
        let mut game = game(4, 3);
        game.target = Some((0, 0));

        // head starts at (2, 1) heading right
        assert!(!game.step(Action::Straight).terminal);
        let outcome = game.step(Action::Straight);

        assert_eq!(outcome.reward, -10.0);
        assert!(outcome.terminal);
        assert_eq!(outcome.cause, Some(TerminalCause::Boundary));
    }

    #[test]
    fn test_step_self_collision() {
        let mut game = game(10, 10);
        game.snake = vec![(5, 5), (5, 6), (4, 6), (4, 5), (4, 4)];
        game.heading = Heading::Up;
        game.target = Some((0, 0));

        // turning left from up moves west into (4, 5)
        let outcome = game.step(Action::Left);
        assert_eq!(outcome.cause, Some(TerminalCause::SelfCollision));
    }

    #[test]
    fn test_step_timeout() {
        let mut game = SnakeGame::new(GameConfig { width: 10, height: 10, timeout_factor: 1, seed: Some(2), ..Default::default() }).unwrap();
        game.target = Some((0, 0));

        // circling in place; the limit counts the freshly inserted head, so step 5 exceeds 1 * 4
        for _ in 0..4 {
            assert!(!game.step(Action::Right).terminal);
        }
        let outcome = game.step(Action::Right);
        assert_eq!(outcome.cause, Some(TerminalCause::Timeout));
    }

    #[test]
    fn test_reset_after_death() {
        let mut game = game(4, 3);
        game.step(Action::Straight);
        game.step(Action::Straight);
        game.reset();

        assert_eq!(game.score(), 0);
        assert_eq!(game.head(), (2, 1));
        assert_eq!(game.body(), &[(1, 1), (0, 1)]);
    }
}
