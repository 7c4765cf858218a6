//! History reader: rebuilds per-entity indices from the files on disk.
//!
//! RULE: The indices are a cache, never authoritative state. They are
//! rebuilt from scratch for every day and may be discarded at any time.
//! Only files dated strictly before the cutoff are read, so a day's
//! computation never sees its own output or anything later.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    codec::{self, Dataset},
    error::{SimError, SimResult},
    event::{IncidentKind, RegistryEvent},
    store::ObjectStore,
    types::{Day, EntityKey},
};

/// One inscription as seen from history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InscriptionRecord {
    pub date: Day,
    pub kind: IncidentKind,
    pub surveillance_date: Option<Day>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryIndex {
    /// key → surveillance dates, ascending.
    pub surveillance: BTreeMap<EntityKey, Vec<Day>>,
    /// key → inscriptions, ascending by date.
    pub inscriptions: BTreeMap<EntityKey, Vec<InscriptionRecord>>,
    /// Every key seen anywhere, including consultation-only keys.
    pub known: BTreeSet<EntityKey>,
}

impl HistoryIndex {
    pub fn record_surveillance(&mut self, key: &str, date: Day) {
        let dates = self.surveillance.entry(key.to_string()).or_default();
        if let Err(pos) = dates.binary_search(&date) {
            dates.insert(pos, date);
        }
        self.known.insert(key.to_string());
    }

    pub fn record_inscription(&mut self, key: &str, record: InscriptionRecord) {
        let records = self.inscriptions.entry(key.to_string()).or_default();
        if let Err(pos) = records.binary_search(&record) {
            records.insert(pos, record);
        }
        self.known.insert(key.to_string());
    }

    /// Fold a registry event into the index. Strike-offs only make the
    /// key known; the inscription they refer to stays on record.
    pub fn apply(&mut self, event: &RegistryEvent) {
        match event {
            RegistryEvent::Surveillance(e) => self.record_surveillance(&e.entity_key, e.date),
            RegistryEvent::Inscription(e) => self.record_inscription(
                &e.entity_key,
                InscriptionRecord {
                    date: e.date,
                    kind: e.kind,
                    surveillance_date: e.surveillance_date,
                },
            ),
            RegistryEvent::StrikeOff(e) => {
                self.known.insert(e.entity_key.clone());
            }
        }
    }

    pub fn latest_surveillance_on_or_before(&self, key: &str, day: Day) -> Option<Day> {
        self.surveillance
            .get(key)?
            .iter()
            .rev()
            .find(|d| **d <= day)
            .copied()
    }

    pub fn latest_inscription_on_or_before(&self, key: &str, day: Day) -> Option<&InscriptionRecord> {
        self.inscriptions
            .get(key)?
            .iter()
            .rev()
            .find(|r| r.date <= day)
    }

    pub fn is_inscribed_on_or_before(&self, key: &str, day: Day) -> bool {
        self.latest_inscription_on_or_before(key, day).is_some()
    }
}

/// A history file that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWarning {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct HistoryLoad {
    pub index: HistoryIndex,
    pub warnings: Vec<HistoryWarning>,
    pub files_read: usize,
}

/// Facts one file contributes. Files contribute disjoint facts,
/// so merge order does not matter for the resulting index.
enum FileFacts {
    Registry(Vec<RegistryEvent>),
    Consultation(Vec<EntityKey>),
}

pub struct HistoryReader<'a> {
    store: &'a dyn ObjectStore,
    workers: usize,
}

impl<'a> HistoryReader<'a> {
    pub fn new(store: &'a dyn ObjectStore, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
        }
    }

    /// Rebuild the indices from every file dated strictly before `cutoff`.
    pub fn load(&self, cutoff: Day) -> SimResult<HistoryLoad> {
        let mut load = HistoryLoad::default();

        let mut jobs: Vec<(Dataset, String)> = Vec::new();
        for dataset in [Dataset::Inscription, Dataset::Consultation] {
            for name in self.store.list(dataset.prefix())? {
                if !name.ends_with(".csv") {
                    continue;
                }
                match codec::day_from_object_name(&name) {
                    Some(day) if day < cutoff => jobs.push((dataset, name)),
                    Some(_) => {}
                    None => warn_skip(&mut load, &name, "file name does not start with a YYYY-MM-DD date"),
                }
            }
        }

        for (name, outcome) in self.read_all(&jobs) {
            match outcome {
                Ok(FileFacts::Registry(events)) => {
                    load.files_read += 1;
                    for event in &events {
                        load.index.apply(event);
                    }
                }
                Ok(FileFacts::Consultation(keys)) => {
                    load.files_read += 1;
                    load.index.known.extend(keys);
                }
                Err(SimError::MalformedFile { reason, .. }) => warn_skip(&mut load, &name, &reason),
                Err(SimError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn_skip(&mut load, &name, &e.to_string())
                }
                Err(e) => return Err(e),
            }
        }

        log::debug!(
            "history before {cutoff}: {} files, {} known keys, {} skipped",
            load.files_read,
            load.index.known.len(),
            load.warnings.len()
        );
        Ok(load)
    }

    /// Read and decode every job, fanning out over scoped worker threads.
    /// Results come back in job order.
    fn read_all(&self, jobs: &[(Dataset, String)]) -> Vec<(String, SimResult<FileFacts>)> {
        if jobs.is_empty() {
            return Vec::new();
        }
        let chunk_size = jobs.len().div_ceil(self.workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|(dataset, name)| (name.clone(), self.read_one(*dataset, name)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| match h.join() {
                    Ok(results) => results,
                    Err(_) => vec![(
                        "<worker>".to_string(),
                        Err(SimError::Other(anyhow::anyhow!("history worker panicked"))),
                    )],
                })
                .collect()
        })
    }

    fn read_one(&self, dataset: Dataset, name: &str) -> SimResult<FileFacts> {
        let text = self.store.get(name)?;
        match dataset {
            Dataset::Consultation => Ok(FileFacts::Consultation(
                codec::decode_consultation_file(name, &text)?
                    .into_iter()
                    .map(|c| c.entity_key)
                    .collect(),
            )),
            _ => Ok(FileFacts::Registry(codec::decode_registry_file(dataset, name, &text)?)),
        }
    }
}

fn warn_skip(load: &mut HistoryLoad, name: &str, reason: &str) {
    log::warn!("skipping history file {name}: {reason}");
    load.warnings.push(HistoryWarning {
        name: name.to_string(),
        reason: reason.to_string(),
    });
}
