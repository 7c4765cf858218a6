//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulator may call any platform RNG.
//! All non-hash randomness (key minting, consultation sampling) flows
//! through SubsystemRng instances derived from the configured master seed.
//!
//! Each (slot, day) pair gets its own RNG stream, seeded from
//! master_seed mixed with the slot index and the day ordinal. This means:
//!   - Re-running a day reproduces its draws exactly, whatever ran before.
//!   - Adding a new slot never changes existing slots' streams.

use chrono::Datelike;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

use crate::types::Day;

/// A named, deterministic RNG for one pipeline stage on one day.
pub struct SubsystemRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SubsystemRng {
    pub fn new(derived_seed: u64) -> Self {
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Pick a uniformly random index into a slice of length `len`.
    pub fn pick_index(&mut self, len: usize) -> usize {
        self.next_u64_below(len as u64) as usize
    }
}

/// All stage RNGs for a run, keyed by stable slot and day.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_slot_on_day(&self, slot: SubsystemSlot, day: Day) -> SubsystemRng {
        let ordinal = day.num_days_from_ce() as u64;
        let derived_seed = self.master_seed
            ^ (slot as u64).wrapping_add(1).wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ ordinal.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        SubsystemRng::new(derived_seed).with_name(slot.name())
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries: only append.
/// Reordering changes every stage's seed and therefore every generated day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum SubsystemSlot {
    Balancer = 0,
    Consultation = 1,
    // Add new slots here. Append only.
}

impl SubsystemSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Balancer => "balancer",
            Self::Consultation => "consultation",
        }
    }
}
