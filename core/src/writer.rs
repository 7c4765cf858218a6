//! Daily writer: publishes one day's three partitions.
//!
//! RULE: A published day is immutable unless the caller explicitly asks
//! to overwrite. Conflicts are detected for all three partitions before
//! anything is written, so a refused day leaves the store untouched.

use crate::{
    codec::{self, Dataset},
    error::{SimError, SimResult},
    event::{ConsultationEvent, RegistryEvent},
    store::ObjectStore,
    types::Day,
};

/// One day's complete output, in file row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyBatch {
    pub consultations: Vec<ConsultationEvent>,
    /// Surveillance, inscription and strike-off events. Each lands in
    /// the partition `Dataset::of` assigns it.
    pub registry: Vec<RegistryEvent>,
}

impl DailyBatch {
    /// Encoded file body per dataset.
    pub fn render(&self) -> Vec<(Dataset, String)> {
        Dataset::ALL
            .iter()
            .map(|dataset| {
                let body = match dataset {
                    Dataset::Consultation => codec::encode_table(
                        *dataset,
                        self.consultations.iter().map(codec::encode_consultation),
                    ),
                    _ => codec::encode_table(
                        *dataset,
                        self.registry
                            .iter()
                            .filter(|e| Dataset::of(e) == *dataset)
                            .map(codec::encode_registry_event),
                    ),
                };
                (*dataset, body)
            })
            .collect()
    }
}

pub struct DailyWriter<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> DailyWriter<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Names of `day`'s partitions that already exist.
    pub fn existing(&self, day: Day) -> SimResult<Vec<String>> {
        let mut found = Vec::new();
        for dataset in Dataset::ALL {
            let name = dataset.object_name(day);
            if self.store.exists(&name)? {
                found.push(name);
            }
        }
        Ok(found)
    }

    /// Write all three partitions for `day`. Returns the object names.
    pub fn write(&self, day: Day, batch: &DailyBatch, overwrite: bool) -> SimResult<Vec<String>> {
        if !overwrite {
            if let Some(name) = self.existing(day)?.into_iter().next() {
                return Err(SimError::WriteConflict { name });
            }
        }

        let mut written = Vec::with_capacity(Dataset::ALL.len());
        for (dataset, body) in batch.render() {
            let name = dataset.object_name(day);
            self.store.put(&name, &body, overwrite)?;
            log::debug!("wrote {name} to {}", self.store.describe());
            written.push(name);
        }
        Ok(written)
    }
}
