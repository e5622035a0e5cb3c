use std::fmt::Debug;

use rand::Rng;

/// A finite, enumerable action space.
pub trait Action: Debug + Copy + Clone {
    fn enumerate() -> Vec<Self>;

    fn size() -> usize {
        Self::enumerate().len()
    }

    fn index(self) -> usize;

    fn from_index(index: usize) -> Self;

    fn random(rng: &mut impl Rng) -> Self {
        Self::from_index(rng.gen_range(0..Self::size()))
    }
}

/// The two class predictions an agent can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassAction {
    Majority,
    Minority,
}

impl Action for ClassAction {
    fn enumerate() -> Vec<Self> {
        vec![ClassAction::Majority, ClassAction::Minority]
    }

    fn index(self) -> usize {
        match self {
            ClassAction::Majority => 0,
            ClassAction::Minority => 1,
        }
    }

    fn from_index(index: usize) -> Self {
        match index {
            0 => ClassAction::Majority,
            _ => ClassAction::Minority,
        }
    }
}
