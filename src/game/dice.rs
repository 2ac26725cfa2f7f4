//! Dice and deck randomness

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of all nondeterminism in a room: die faces and card picks
pub trait DiceSource: Send {
    /// Uniform value in 1..=6
    fn roll_die(&mut self) -> u8;

    /// Uniform index in 0..len
    fn pick(&mut self, len: usize) -> usize;
}

/// Production randomness backed by a seeded ChaCha stream
pub struct SeededDice {
    rng: ChaCha8Rng,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl DiceSource for SeededDice {
    fn roll_die(&mut self) -> u8 {
        self.rng.gen_range(1..=6)
    }

    fn pick(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng.gen_range(0..len)
    }
}

/// Result of throwing two dice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    pub die1: u8,
    pub die2: u8,
}

impl DiceRoll {
    pub fn throw(source: &mut dyn DiceSource) -> Self {
        Self {
            die1: source.roll_die(),
            die2: source.roll_die(),
        }
    }

    pub fn total(&self) -> usize {
        (self.die1 + self.die2) as usize
    }

    pub fn is_double(&self) -> bool {
        self.die1 == self.die2
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;

    use super::DiceSource;

    /// Replays predetermined dice faces and card picks
    #[derive(Default)]
    pub struct ScriptedDice {
        faces: VecDeque<u8>,
        picks: VecDeque<usize>,
    }

    impl ScriptedDice {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_rolls(mut self, rolls: &[(u8, u8)]) -> Self {
            for &(a, b) in rolls {
                self.faces.push_back(a);
                self.faces.push_back(b);
            }
            self
        }

        pub fn with_picks(mut self, picks: &[usize]) -> Self {
            self.picks.extend(picks.iter().copied());
            self
        }
    }

    impl DiceSource for ScriptedDice {
        fn roll_die(&mut self) -> u8 {
            self.faces.pop_front().expect("dice script exhausted")
        }

        fn pick(&mut self, _len: usize) -> usize {
            self.picks.pop_front().unwrap_or(0)
        }
    }
}
