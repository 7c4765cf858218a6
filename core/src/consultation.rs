//! Consultation sampler and status projection.
//!
//! A consultation reports an entity's lifecycle state as of a day; it
//! never feeds back into that state.

use crate::{
    balancer::KeyMinter,
    error::SimResult,
    event::{ConsultationEvent, StatusSnapshot},
    history::HistoryIndex,
    rng::SubsystemRng,
    types::{Day, EntityKey},
};

/// Lifecycle state of `key` on `day`, projected from its events.
/// INSCRIT wins over SURVEILLANCE, which wins over NON_INSCRIT.
pub fn project_status(key: &str, day: Day, index: &HistoryIndex) -> ConsultationEvent {
    let (status, surveillance_date, inscription_date) =
        if let Some(record) = index.latest_inscription_on_or_before(key, day) {
            (StatusSnapshot::Inscribed, record.surveillance_date, Some(record.date))
        } else if let Some(surveilled) = index.latest_surveillance_on_or_before(key, day) {
            (StatusSnapshot::UnderSurveillance, Some(surveilled), None)
        } else {
            (StatusSnapshot::NotListed, None, None)
        };
    ConsultationEvent {
        entity_key: key.to_string(),
        date: day,
        status,
        surveillance_date,
        inscription_date,
    }
}

pub struct ConsultationSampler {
    total: usize,
    known_count: usize,
    minter: KeyMinter,
}

impl ConsultationSampler {
    pub fn new(total: usize, known_count: usize, minter: KeyMinter) -> Self {
        Self {
            total,
            known_count: known_count.min(total),
            minter,
        }
    }

    /// The day's consultation log: known entities drawn with replacement,
    /// then freshly minted NON_INSCRIT entities. Must run after the
    /// balancer so today's registry facts are already in `index`.
    pub fn sample_consultations(
        &self,
        day: Day,
        index: &mut HistoryIndex,
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<ConsultationEvent>> {
        let pool: Vec<EntityKey> = index.known.iter().cloned().collect();
        let mut rows = Vec::with_capacity(self.total);

        for _ in 0..self.known_count {
            if pool.is_empty() {
                let key = self.minter.mint(rng, &mut index.known)?;
                rows.push(not_listed(key, day));
                continue;
            }
            let key = &pool[rng.pick_index(pool.len())];
            rows.push(project_status(key, day, index));
        }

        for _ in self.known_count..self.total {
            let key = self.minter.mint(rng, &mut index.known)?;
            rows.push(not_listed(key, day));
        }
        Ok(rows)
    }
}

fn not_listed(key: EntityKey, day: Day) -> ConsultationEvent {
    ConsultationEvent {
        entity_key: key,
        date: day,
        status: StatusSnapshot::NotListed,
        surveillance_date: None,
        inscription_date: None,
    }
}
