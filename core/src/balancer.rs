//! Volume balancer: tops the day's registry events up to target by
//! minting brand-new entities.
//!
//! New entities arrive two ways:
//!   - direct SURENDETTEMENT inscriptions, no surveillance precursor;
//!   - fresh surveillance notices, which mature into PAIEMENT inscriptions
//!     on a later day through the scheduler.

use std::collections::BTreeSet;

use crate::{
    config::SimConfig,
    error::{SimError, SimResult},
    event::{IncidentKind, InscriptionEvent, RegistryEvent, SurveillanceEvent},
    history::HistoryIndex,
    rng::SubsystemRng,
    types::{Day, EntityKey},
};

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// Mints entity keys: `letters` uppercase letters then `digits` digits.
#[derive(Debug, Clone)]
pub struct KeyMinter {
    letters: usize,
    digits: usize,
    max_attempts: u32,
}

impl KeyMinter {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            letters: config.key_letters,
            digits: config.key_digits,
            max_attempts: config.max_mint_attempts,
        }
    }

    fn draw(&self, rng: &mut SubsystemRng) -> EntityKey {
        let mut key = String::with_capacity(self.letters + self.digits);
        for _ in 0..self.letters {
            key.push(LETTERS[rng.pick_index(LETTERS.len())] as char);
        }
        for _ in 0..self.digits {
            key.push(DIGITS[rng.pick_index(DIGITS.len())] as char);
        }
        key
    }

    /// Draw a key not in `known`, and add it there.
    /// Collisions are redrawn; running out of attempts means the key
    /// space is too small for the configured volumes.
    pub fn mint(&self, rng: &mut SubsystemRng, known: &mut BTreeSet<EntityKey>) -> SimResult<EntityKey> {
        for _ in 0..self.max_attempts {
            let key = self.draw(rng);
            if known.insert(key.clone()) {
                return Ok(key);
            }
        }
        Err(SimError::KeySpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Events minted by one top-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopUp {
    pub direct_inscriptions: Vec<InscriptionEvent>,
    pub surveillances: Vec<SurveillanceEvent>,
}

impl TopUp {
    pub fn len(&self) -> usize {
        self.direct_inscriptions.len() + self.surveillances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direct inscriptions first, then surveillances. This is the row order
    /// of the registry file.
    pub fn into_events(self) -> impl Iterator<Item = RegistryEvent> {
        self.direct_inscriptions
            .into_iter()
            .map(RegistryEvent::Inscription)
            .chain(self.surveillances.into_iter().map(RegistryEvent::Surveillance))
    }
}

/// `(direct, surveillance)` shares of `remaining` new events.
pub fn split_remaining(remaining: usize, direct_fraction: f64) -> (usize, usize) {
    let direct = ((remaining as f64 * direct_fraction).round() as usize).min(remaining);
    (direct, remaining - direct)
}

pub struct VolumeBalancer {
    target: usize,
    direct_fraction: f64,
    minter: KeyMinter,
}

impl VolumeBalancer {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            target: config.events_per_day,
            direct_fraction: config.direct_fraction,
            minter: KeyMinter::new(config),
        }
    }

    /// Mint enough new entities that scheduled + minted == target.
    /// Every minted fact is folded into `index` so later stages of the
    /// same day (consultations) see it.
    pub fn top_up(
        &self,
        day: Day,
        scheduled: usize,
        index: &mut HistoryIndex,
        rng: &mut SubsystemRng,
    ) -> SimResult<TopUp> {
        if scheduled > self.target {
            log::warn!(
                "{day}: {scheduled} scheduled inscriptions exceed the daily target of {}; \
                 emitting all of them with no top-up",
                self.target
            );
        }
        let remaining = self.target.saturating_sub(scheduled);
        let (direct, surveillance) = split_remaining(remaining, self.direct_fraction);

        let mut top_up = TopUp::default();
        for _ in 0..direct {
            let key = self.minter.mint(rng, &mut index.known)?;
            let event = InscriptionEvent {
                entity_key: key,
                date: day,
                kind: IncidentKind::OverIndebtedness,
                surveillance_date: None,
            };
            index.apply(&RegistryEvent::Inscription(event.clone()));
            top_up.direct_inscriptions.push(event);
        }
        for _ in 0..surveillance {
            let key = self.minter.mint(rng, &mut index.known)?;
            let event = SurveillanceEvent {
                entity_key: key,
                date: day,
            };
            index.apply(&RegistryEvent::Surveillance(event.clone()));
            top_up.surveillances.push(event);
        }
        Ok(top_up)
    }

    pub fn minter(&self) -> &KeyMinter {
        &self.minter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, SubsystemSlot};
    use chrono::NaiveDate;

    fn day1() -> Day {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn rng() -> SubsystemRng {
        RngBank::new(42).for_slot_on_day(SubsystemSlot::Balancer, day1())
    }

    #[test]
    fn split_follows_rounding() {
        assert_eq!(split_remaining(300, 0.30), (90, 210));
        assert_eq!(split_remaining(0, 0.30), (0, 0));
        assert_eq!(split_remaining(7, 0.5), (4, 3));
        assert_eq!(split_remaining(10, 1.0), (10, 0));
    }

    #[test]
    fn minted_keys_have_the_contract_shape() {
        let minter = KeyMinter::new(&SimConfig::default());
        let mut known = BTreeSet::new();
        let mut rng = rng();
        for _ in 0..200 {
            let key = minter.mint(&mut rng, &mut known).unwrap();
            assert_eq!(key.len(), 13);
            assert!(key[..8].bytes().all(|b| b.is_ascii_uppercase()), "{key}");
            assert!(key[8..].bytes().all(|b| b.is_ascii_digit()), "{key}");
        }
        assert_eq!(known.len(), 200);
    }

    #[test]
    fn tiny_key_space_exhausts() {
        let config = SimConfig {
            key_letters: 1,
            key_digits: 0,
            max_mint_attempts: 50,
            ..SimConfig::default()
        };
        let minter = KeyMinter::new(&config);
        let mut known: BTreeSet<EntityKey> =
            LETTERS.iter().map(|b| (*b as char).to_string()).collect();
        let result = minter.mint(&mut rng(), &mut known);
        assert!(matches!(result, Err(SimError::KeySpaceExhausted { attempts: 50 })));
    }

    #[test]
    fn empty_history_tops_up_to_target() {
        let balancer = VolumeBalancer::new(&SimConfig::default());
        let mut index = HistoryIndex::default();
        let top_up = balancer.top_up(day1(), 0, &mut index, &mut rng()).unwrap();

        assert_eq!(top_up.direct_inscriptions.len(), 90);
        assert_eq!(top_up.surveillances.len(), 210);
        assert_eq!(index.known.len(), 300);
        assert_eq!(index.inscriptions.len(), 90);
        assert_eq!(index.surveillance.len(), 210);
    }

    #[test]
    fn minted_keys_avoid_known_keys() {
        let balancer = VolumeBalancer::new(&SimConfig::default());
        let mut index = HistoryIndex::default();
        let first = balancer.top_up(day1(), 0, &mut index, &mut rng()).unwrap();
        // Same RNG stream again: every draw collides at first and must be redrawn.
        let second = balancer.top_up(day1(), 0, &mut index, &mut rng()).unwrap();

        let first_keys: BTreeSet<_> = first.into_events().map(|e| e.entity_key().to_string()).collect();
        let second_keys: BTreeSet<_> = second.into_events().map(|e| e.entity_key().to_string()).collect();
        assert!(first_keys.is_disjoint(&second_keys));
        assert_eq!(index.known.len(), 600);
    }

    #[test]
    fn over_target_schedule_mints_nothing() {
        let balancer = VolumeBalancer::new(&SimConfig::default());
        let mut index = HistoryIndex::default();
        let top_up = balancer.top_up(day1(), 400, &mut index, &mut rng()).unwrap();
        assert!(top_up.is_empty());
    }
}
