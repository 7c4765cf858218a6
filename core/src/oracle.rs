//! Identity & delay oracle: hash-derived, stateless scheduling.
//!
//! RULE: The oracle has no mutable state. Any component, on any day,
//! recomputes the same delay for an entity purely from its key. This is
//! what lets the simulator run incrementally without persisting
//! "entity X inscribes on day 34" anywhere.
//!
//! Digest: first 16 bytes of SHA-256("<tag>:<key>"), big-endian u128.
//! Purpose tags are part of the dataset contract; never change them.
//!
//! Lakes seeded by the earlier MD5-based generator are not compatible:
//! the same key gets different delays here, so entities surveilled by that
//! generator mature on different days. Start such a lake afresh rather
//! than extending it.

use sha2::{Digest, Sha256};

use crate::config::SimConfig;

/// Why a deterministic value is being drawn. Each purpose hashes under
/// its own tag so the draws are independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Surveillance → PAIEMENT inscription delay.
    PaymentDelay,
    /// Whether an inscription is ever struck off.
    StrikeoffEligible,
    /// Inscription → strike-off delay.
    StrikeoffDelay,
}

impl Purpose {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::PaymentDelay => "pay",
            Self::StrikeoffEligible => "radp",
            Self::StrikeoffDelay => "radd",
        }
    }
}

/// 128-bit digest of (purpose, key).
pub fn digest(purpose: Purpose, key: &str) -> u128 {
    let mut hasher = Sha256::new();
    hasher.update(purpose.tag().as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();
    let mut head = [0u8; 16];
    head.copy_from_slice(&hash[..16]);
    u128::from_be_bytes(head)
}

/// Deterministic integer in `[min, max]` for (purpose, key).
pub fn delay(purpose: Purpose, key: &str, min: i64, max: i64) -> i64 {
    assert!(min <= max, "delay range {min}..={max} is empty");
    let width = (max - min + 1) as u128;
    min + (digest(purpose, key) % width) as i64
}

/// Deterministic uniform value in `[0, 1)` for (purpose, key),
/// at a resolution of 1/10 000.
pub fn unit(purpose: Purpose, key: &str) -> f64 {
    (digest(purpose, key) % 10_000) as f64 / 10_000.0
}

/// Deterministic Bernoulli outcome: true with probability `threshold`.
pub fn probability(purpose: Purpose, key: &str, threshold: f64) -> bool {
    unit(purpose, key) < threshold
}

/// The oracle bound to the configured ranges and threshold.
#[derive(Debug, Clone, Copy)]
pub struct DelayOracle {
    payment_delay: (i64, i64),
    strikeoff_delay: (i64, i64),
    strikeoff_probability: f64,
}

impl DelayOracle {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            payment_delay: (config.payment_delay_min, config.payment_delay_max),
            strikeoff_delay: (config.strikeoff_delay_min, config.strikeoff_delay_max),
            strikeoff_probability: config.strikeoff_probability,
        }
    }

    /// Days between a surveillance notice and its PAIEMENT inscription.
    pub fn payment_delay(&self, key: &str) -> i64 {
        let (min, max) = self.payment_delay;
        delay(Purpose::PaymentDelay, key, min, max)
    }

    pub fn strikeoff_eligible(&self, key: &str) -> bool {
        probability(Purpose::StrikeoffEligible, key, self.strikeoff_probability)
    }

    /// Days between an inscription and its strike-off, when eligible.
    pub fn strikeoff_delay(&self, key: &str) -> i64 {
        let (min, max) = self.strikeoff_delay;
        delay(Purpose::StrikeoffDelay, key, min, max)
    }
}
