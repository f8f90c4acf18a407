use rand::rngs::StdRng;
use rand::SeedableRng;

/// Source of randomness for initial-design sampling.
///
/// `Seeded` makes a run reproducible: the same seed and configuration give the
/// same initial design and the same exchange trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomType {
    Entropy,
    Seeded(u64)
}

impl RandomType {
    pub fn rng(&self) -> StdRng {
        match self {
            RandomType::Entropy => StdRng::from_entropy(),
            RandomType::Seeded(seed) => StdRng::seed_from_u64(*seed)
        }
    }

    /// Seed source for trial `trial` of a multi-trial run.
    pub fn for_trial(&self, trial: usize) -> RandomType {
        match self {
            RandomType::Entropy => RandomType::Entropy,
            RandomType::Seeded(seed) => RandomType::Seeded(seed.wrapping_add(trial as u64))
        }
    }
}

impl Default for RandomType {
    fn default() -> Self {
        RandomType::Entropy
    }
}
