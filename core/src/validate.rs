//! Lake coherence validator.
//!
//! Re-reads every published file and checks the regulatory invariants
//! the simulator is supposed to guarantee. Used by the runner's
//! `--validate` mode and by the integration tests.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Serialize;

use crate::{
    codec::{self, Dataset},
    config::SimConfig,
    engine::is_weekend,
    error::{SimError, SimResult},
    event::{IncidentKind, RegistryEvent, StatusSnapshot},
    history::InscriptionRecord,
    store::ObjectStore,
    types::{Day, EntityKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// File could not be decoded at all.
    MalformedFile,
    /// Event dated differently from the partition it was published in.
    WrongPartition,
    /// PAIEMENT inscription without a recorded surveillance in the allowed window.
    PaymentTiming,
    /// Same entity inscribed more than once.
    DuplicateInscription,
    /// Strike-off not strictly after its inscription.
    StrikeOffOrder,
    /// Strike-off with no matching earlier inscription.
    OrphanStrikeOff,
    /// Consultation reports dates later than the consultation itself.
    ConsultationChronology,
    /// Consultation status disagrees with the dates it reports.
    ConsultationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub object: String,
    pub entity_key: Option<EntityKey>,
    pub rule: Rule,
    pub detail: String,
}

/// A day with no partition inside a dataset's published date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDay {
    pub dataset: &'static str,
    pub day: Day,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub files_checked: usize,
    pub violations: Vec<Violation>,
    /// Gaps in every dataset, ascending by day. The first entry is where a
    /// batch resumes.
    pub missing_days: Vec<MissingDay>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.missing_days.is_empty()
    }

    fn flag(&mut self, object: &str, key: Option<&str>, rule: Rule, detail: String) {
        self.violations.push(Violation {
            object: object.to_string(),
            entity_key: key.map(str::to_string),
            rule,
            detail,
        });
    }
}

struct Published<T> {
    object: String,
    day: Day,
    rows: Vec<T>,
}

/// Check every file in `store` against the lifecycle invariants.
pub fn validate_lake(store: &dyn ObjectStore, config: &SimConfig) -> SimResult<ValidationReport> {
    let mut report = ValidationReport::default();

    let registry = read_dataset(store, Dataset::Inscription, &mut report, |name, text| {
        codec::decode_registry_file(Dataset::Inscription, name, text)
    })?;
    let radiation = read_dataset(store, Dataset::Radiation, &mut report, |name, text| {
        codec::decode_registry_file(Dataset::Radiation, name, text)
    })?;
    let consultations = read_dataset(store, Dataset::Consultation, &mut report, codec::decode_consultation_file)?;

    for dataset in Dataset::ALL {
        let published: Vec<Day> = store
            .list(dataset.prefix())?
            .iter()
            .filter_map(|name| codec::day_from_object_name(name))
            .collect();
        report.missing_days.extend(
            missing_days(&published)
                .into_iter()
                .map(|day| MissingDay { dataset: dataset.prefix(), day }),
        );
    }
    report.missing_days.sort_by_key(|m| (m.day, m.dataset));

    let mut surveillance: BTreeMap<&str, Vec<Day>> = BTreeMap::new();
    let mut inscriptions: BTreeMap<&str, Vec<InscriptionRecord>> = BTreeMap::new();

    for file in registry.iter().chain(radiation.iter()) {
        for event in &file.rows {
            if event.effective_date() != file.day {
                report.flag(
                    &file.object,
                    Some(event.entity_key()),
                    Rule::WrongPartition,
                    format!("event dated {} in partition {}", event.effective_date(), file.day),
                );
            }
            match event {
                RegistryEvent::Surveillance(e) => {
                    surveillance.entry(e.entity_key.as_str()).or_default().push(e.date)
                }
                RegistryEvent::Inscription(e) => {
                    inscriptions
                        .entry(e.entity_key.as_str())
                        .or_default()
                        .push(InscriptionRecord {
                            date: e.date,
                            kind: e.kind,
                            surveillance_date: e.surveillance_date,
                        })
                }
                RegistryEvent::StrikeOff(_) => {}
            }
        }
    }

    let (min, max) = (config.payment_delay_min, config.payment_delay_max);
    for file in &registry {
        for event in &file.rows {
            let RegistryEvent::Inscription(e) = event else {
                continue;
            };
            let key = e.entity_key.as_str();
            if inscriptions.get(key).map_or(0, Vec::len) > 1 {
                report.flag(&file.object, Some(key), Rule::DuplicateInscription, "entity inscribed more than once".into());
            }
            if e.kind != IncidentKind::PaymentDefault {
                continue;
            }
            let Some(surveilled) = e.surveillance_date else {
                report.flag(&file.object, Some(key), Rule::PaymentTiming, "PAIEMENT inscription without surveillance date".into());
                continue;
            };
            let recorded = surveillance.get(key).is_some_and(|dates| dates.contains(&surveilled));
            let waited = (e.date - surveilled).num_days();
            if !recorded || !(min..=max).contains(&waited) {
                report.flag(
                    &file.object,
                    Some(key),
                    Rule::PaymentTiming,
                    format!("surveillance {surveilled} (recorded: {recorded}) → inscription {} after {waited} days", e.date),
                );
            }
        }
    }

    for file in &radiation {
        for event in &file.rows {
            let RegistryEvent::StrikeOff(e) = event else {
                continue;
            };
            let key = e.entity_key.as_str();
            if e.strike_off_date <= e.inscription_date {
                report.flag(
                    &file.object,
                    Some(key),
                    Rule::StrikeOffOrder,
                    format!("struck off {} before inscription {}", e.strike_off_date, e.inscription_date),
                );
            }
            let matched = inscriptions.get(key).is_some_and(|records| {
                records
                    .iter()
                    .any(|r| r.date == e.inscription_date && r.date < e.strike_off_date && r.kind == e.kind)
            });
            if !matched {
                report.flag(
                    &file.object,
                    Some(key),
                    Rule::OrphanStrikeOff,
                    format!("no {} inscription dated {}", e.kind.as_wire(), e.inscription_date),
                );
            }
        }
    }

    for file in &consultations {
        for row in &file.rows {
            let key = Some(row.entity_key.as_str());
            if row.date != file.day {
                report.flag(
                    &file.object,
                    key,
                    Rule::WrongPartition,
                    format!("consultation dated {} in partition {}", row.date, file.day),
                );
            }
            for (label, date) in [("surveillance", row.surveillance_date), ("inscription", row.inscription_date)] {
                if date.is_some_and(|d| d > row.date) {
                    report.flag(
                        &file.object,
                        key,
                        Rule::ConsultationChronology,
                        format!("{label} date after consultation {}", row.date),
                    );
                }
            }
            let consistent = match row.status {
                StatusSnapshot::NotListed => row.surveillance_date.is_none() && row.inscription_date.is_none(),
                StatusSnapshot::UnderSurveillance => row.surveillance_date.is_some() && row.inscription_date.is_none(),
                StatusSnapshot::Inscribed => row.inscription_date.is_some(),
            };
            if !consistent {
                report.flag(
                    &file.object,
                    key,
                    Rule::ConsultationStatus,
                    format!("status {} with dates {:?}/{:?}", row.status.as_wire(), row.surveillance_date, row.inscription_date),
                );
            }
        }
    }

    log::info!(
        "validated {} files on {}: {} violations, {} missing days",
        report.files_checked,
        store.describe(),
        report.violations.len(),
        report.missing_days.len()
    );
    Ok(report)
}

/// Days absent between the first and last of `published` (ascending).
/// A dataset that never publishes on a weekend was generated with weekends
/// skipped, so its Saturdays and Sundays are not gaps.
pub fn missing_days(published: &[Day]) -> Vec<Day> {
    let weekends_published = published.iter().any(|d| is_weekend(*d));
    let mut missing = Vec::new();
    for pair in published.windows(2) {
        let mut day = pair[0] + Duration::days(1);
        while day < pair[1] {
            if weekends_published || !is_weekend(day) {
                missing.push(day);
            }
            day += Duration::days(1);
        }
    }
    missing
}

fn read_dataset<T>(
    store: &dyn ObjectStore,
    dataset: Dataset,
    report: &mut ValidationReport,
    decode: impl Fn(&str, &str) -> SimResult<Vec<T>>,
) -> SimResult<Vec<Published<T>>> {
    let mut files = Vec::new();
    for name in store.list(dataset.prefix())? {
        let Some(day) = codec::day_from_object_name(&name) else {
            report.flag(&name, None, Rule::MalformedFile, "file name does not carry a YYYY-MM-DD date".into());
            continue;
        };
        report.files_checked += 1;
        match decode(&name, &store.get(&name)?) {
            Ok(rows) => files.push(Published { object: name, day, rows }),
            Err(SimError::MalformedFile { reason, .. }) => report.flag(&name, None, Rule::MalformedFile, reason),
            Err(e) => return Err(e),
        }
    }
    Ok(files)
}
