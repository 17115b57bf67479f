use crate::environment::{Environment, Heading};
use crate::network::tensor::Tensor;

pub const STATE_SIZE: usize = 11;
pub const ACTION_COUNT: usize = 3;

pub const FEATURE_NAMES: [&str; STATE_SIZE] = [
    "danger straight",
    "danger right",
    "danger left",
    "heading left",
    "heading right",
    "heading up",
    "heading down",
    "food left",
    "food right",
    "food up",
    "food down",
];

/// Move relative to the current heading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Straight,
    Right,
    Left,
}

impl Action {
    pub const ALL: [Action; ACTION_COUNT] = [Action::Straight, Action::Right, Action::Left];

    pub fn index(self) -> usize {
        match self {
            Action::Straight => 0,
            Action::Right => 1,
            Action::Left => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Action> {
        Self::ALL.get(index).copied()
    }

    pub fn one_hot(self) -> [f32; ACTION_COUNT] {
        let mut encoded = [0.0; ACTION_COUNT];
        encoded[self.index()] = 1.0;
        encoded
    }
}

/// The 11 binary features the network sees. No history is encoded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateVector([f32; STATE_SIZE]);

impl StateVector {
    pub fn new(features: [f32; STATE_SIZE]) -> Self {
        Self(features)
    }

    // [danger straight, right, left; heading l, r, u, d; food l, r, u, d]
    pub fn observe<E: Environment + ?Sized>(env: &E) -> Self {
        let head = env.head();
        let heading = env.heading();
        let danger = |h: Heading| {
            let (dx, dy) = h.vector();
            env.is_collision((head.0 + dx, head.1 + dy))
        };

        let (food_left, food_right, food_up, food_down) = match env.target() {
            Some(food) => (food.0 < head.0, food.0 > head.0, food.1 < head.1, food.1 > head.1),
            None => (false, false, false, false),
        };

        let flags = [
            danger(heading),
            danger(heading.clockwise()),
            danger(heading.counter_clockwise()),
            heading == Heading::Left,
            heading == Heading::Right,
            heading == Heading::Up,
            heading == Heading::Down,
            food_left,
            food_right,
            food_up,
            food_down,
        ];

        Self(flags.map(|flag| flag as i32 as f32))
    }

    pub fn features(&self) -> &[f32; STATE_SIZE] {
        &self.0
    }

    pub fn to_tensor(&self) -> Tensor {
        Tensor::row(self.0.to_vec())
    }
}
