use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Longest accepted lifecycle delay. Ten years keeps every date
/// computation well inside chrono's range.
pub const MAX_DELAY_DAYS: i64 = 3650;

/// Every tunable of the simulator. Loaded from `data/ficp_config.json`
/// in production; `SimConfig::default()` holds the same values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Seeds the per-day RNG streams. Hash-derived delays do not use it.
    pub master_seed: u64,

    pub consultations_per_day: usize,
    pub events_per_day: usize,
    /// Share of topped-up events that are direct SURENDETTEMENT inscriptions.
    pub direct_fraction: f64,
    /// Share of consultations drawn from already-known entities.
    pub known_fraction: f64,

    pub payment_delay_min: i64,
    pub payment_delay_max: i64,
    pub strikeoff_probability: f64,
    pub strikeoff_delay_min: i64,
    pub strikeoff_delay_max: i64,

    pub key_letters: usize,
    pub key_digits: usize,
    pub max_mint_attempts: u32,

    pub history_read_workers: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            master_seed: 42,
            consultations_per_day: 1000,
            events_per_day: 300,
            direct_fraction: 0.30,
            known_fraction: 0.60,
            payment_delay_min: 31,
            payment_delay_max: 37,
            strikeoff_probability: 0.70,
            strikeoff_delay_min: 18,
            strikeoff_delay_max: 24,
            key_letters: 8,
            key_digits: 5,
            max_mint_attempts: 1000,
            history_read_workers: 4,
        }
    }
}

impl SimConfig {
    /// Load from a JSON file. Missing keys fall back to the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Config with smaller consultation volume for use in tests.
    /// Registry volumes and delays keep their production values.
    pub fn default_test() -> Self {
        Self {
            consultations_per_day: 100,
            history_read_workers: 2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        let fail = |reason: String| Err(SimError::InvalidConfig { reason });

        for (name, value) in [
            ("direct_fraction", self.direct_fraction),
            ("known_fraction", self.known_fraction),
            ("strikeoff_probability", self.strikeoff_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return fail(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        for (name, max) in [
            ("payment_delay_max", self.payment_delay_max),
            ("strikeoff_delay_max", self.strikeoff_delay_max),
        ] {
            if max > MAX_DELAY_DAYS {
                return fail(format!("{name} must be at most {MAX_DELAY_DAYS} days, got {max}"));
            }
        }
        if self.payment_delay_min < 1 || self.payment_delay_min > self.payment_delay_max {
            return fail(format!(
                "payment delay range {}..={} is empty or not positive",
                self.payment_delay_min, self.payment_delay_max
            ));
        }
        if self.strikeoff_delay_min < 1 || self.strikeoff_delay_min > self.strikeoff_delay_max {
            return fail(format!(
                "strike-off delay range {}..={} is empty or not positive",
                self.strikeoff_delay_min, self.strikeoff_delay_max
            ));
        }
        if self.key_letters + self.key_digits == 0 {
            return fail("entity keys must have at least one character".into());
        }
        if self.max_mint_attempts == 0 {
            return fail("max_mint_attempts must be at least 1".into());
        }
        Ok(())
    }

    /// Number of consultations drawn from the known-entity pool.
    pub fn known_consultations(&self) -> usize {
        (self.consultations_per_day as f64 * self.known_fraction).round() as usize
    }
}
