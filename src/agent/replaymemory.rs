use super::state::{Action, StateVector};

use rand::Rng;
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub state: StateVector,
    pub action: Action,
    pub reward: f32,
    pub next_state: StateVector,
    pub terminal: bool,
}

/// Bounded FIFO of past transitions. Once full, each insert evicts the oldest entry.
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Stores `transition`, returning the entry it evicted, if any.
    pub fn add(&mut self, transition: Transition) -> Option<Transition> {
        if self.capacity == 0 {
            return Some(transition);
        }

        let evicted = if self.buffer.len() == self.capacity {
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(transition);
        evicted
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    /// Up to `batch_size` transitions drawn uniformly without replacement.
    /// When there are not more than `batch_size` stored, returns all of them in insertion order.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<Transition> {
        if self.buffer.len() <= batch_size {
            return self.buffer.iter().copied().collect();
        }

        rand::seq::index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|index| self.buffer[index])
            .collect()
    }
}
