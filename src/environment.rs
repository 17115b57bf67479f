//! Interface between the learning engine and a grid-world simulator.

use crate::agent::state::Action;
use std::fmt;

/// Grid cell `(x, y)`; `y` grows downward.
pub type Point = (i32, i32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Heading {
    Right,
    Down,
    Left,
    Up,
}

impl Heading {
    pub const CLOCKWISE: [Heading; 4] = [Heading::Right, Heading::Down, Heading::Left, Heading::Up];

    pub fn vector(self) -> Point {
        match self {
            Heading::Right => (1, 0),
            Heading::Down => (0, 1),
            Heading::Left => (-1, 0),
            Heading::Up => (0, -1),
        }
    }

    pub fn clockwise(self) -> Heading {
        Self::CLOCKWISE[(self.position() + 1) % 4]
    }

    pub fn counter_clockwise(self) -> Heading {
        Self::CLOCKWISE[(self.position() + 3) % 4]
    }

    /// Heading after applying a heading-relative action.
    pub fn turn(self, action: Action) -> Heading {
        match action {
            Action::Straight => self,
            Action::Right => self.clockwise(),
            Action::Left => self.counter_clockwise(),
        }
    }

    fn position(self) -> usize {
        match self {
            Heading::Right => 0,
            Heading::Down => 1,
            Heading::Left => 2,
            Heading::Up => 3,
        }
    }
}

/// Why an episode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TerminalCause {
    Boundary,
    SelfCollision,
    Timeout,
}

impl fmt::Display for TerminalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminalCause::Boundary => "boundary",
            TerminalCause::SelfCollision => "self_collision",
            TerminalCause::Timeout => "timeout",
        })
    }
}

/// Result of a single environment step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub reward: f32,
    pub terminal: bool,
    pub score: u32,
    pub steps_since_target: u32,
    /// Set exactly when `terminal` is.
    pub cause: Option<TerminalCause>,
}

/// A simulator the agent can be trained against.
///
/// Besides stepping and resetting, it exposes enough of its state (entity
/// position, trailing body, target, heading and grid bounds) to build a
/// `StateVector`.
pub trait Environment {
    fn step(&mut self, action: Action) -> StepOutcome;

    fn reset(&mut self);

    fn head(&self) -> Point;

    /// Trailing body segments, nearest to the head first. Excludes the head.
    fn body(&self) -> &[Point];

    fn target(&self) -> Option<Point>;

    fn heading(&self) -> Heading;

    /// Grid `(width, height)` in cells.
    fn bounds(&self) -> (i32, i32);

    fn is_collision(&self, point: Point) -> bool {
        let (width, height) = self.bounds();
        point.0 < 0 || point.0 >= width || point.1 < 0 || point.1 >= height || self.body().contains(&point)
    }
}
