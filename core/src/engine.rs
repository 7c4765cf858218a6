//! The daily simulator: one day of registry activity from history alone.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. History reader      (files dated strictly before the day)
//!   2. Transition scheduler (PAIEMENT inscriptions, strike-offs)
//!   3. Volume balancer     (mint direct inscriptions + surveillances)
//!   4. Consultation sampler
//!   5. Daily writer
//!
//! RULES:
//!   - No state survives between days except the files in the store.
//!   - Minting happens after scheduling, so a freshly minted key can
//!     never coincide with a transition computed for the same day.
//!   - All randomness flows through the RngBank, keyed by day, so a
//!     re-run of the same day is byte-identical.
//!   - Fatal errors abort only the day in progress.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Datelike, Duration, Weekday};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    balancer::VolumeBalancer,
    config::SimConfig,
    consultation::ConsultationSampler,
    error::{SimError, SimResult},
    event::RegistryEvent,
    history::HistoryReader,
    oracle::DelayOracle,
    rng::{RngBank, SubsystemSlot},
    scheduler::TransitionScheduler,
    store::ObjectStore,
    types::Day,
    writer::{DailyBatch, DailyWriter},
};

/// Counters for one generated day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayReport {
    pub day: Day,
    pub scheduled_inscriptions: usize,
    pub direct_inscriptions: usize,
    pub new_surveillances: usize,
    pub strike_offs: usize,
    pub consultations: usize,
    pub history_files: usize,
    pub history_warnings: usize,
}

impl DayReport {
    /// Inscriptions plus surveillances: the quantity held at the daily target.
    pub fn registry_events(&self) -> usize {
        self.scheduled_inscriptions + self.direct_inscriptions + self.new_surveillances
    }
}

/// What happened to one day of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayOutcome {
    Written(DayReport),
    Skipped { day: Day, reason: String },
    Conflict { day: Day, name: String },
    Failed { day: Day, error: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub overwrite: bool,
    /// Saturdays and Sundays produce no files. Transitions falling due on
    /// a skipped day are not emitted.
    pub skip_weekends: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub run_id: String,
    pub days: Vec<DayOutcome>,
    pub interrupted: bool,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.days
            .iter()
            .filter(|o| matches!(o, DayOutcome::Failed { .. } | DayOutcome::Conflict { .. }))
            .count()
    }

    pub fn written(&self) -> usize {
        self.days
            .iter()
            .filter(|o| matches!(o, DayOutcome::Written(_)))
            .count()
    }
}

pub struct DailySimulator<'a> {
    config: SimConfig,
    store: &'a dyn ObjectStore,
    rng_bank: RngBank,
    scheduler: TransitionScheduler,
    balancer: VolumeBalancer,
    sampler: ConsultationSampler,
}

impl<'a> DailySimulator<'a> {
    pub fn new(config: SimConfig, store: &'a dyn ObjectStore) -> SimResult<Self> {
        config.validate()?;
        let balancer = VolumeBalancer::new(&config);
        let sampler = ConsultationSampler::new(
            config.consultations_per_day,
            config.known_consultations(),
            balancer.minter().clone(),
        );
        Ok(Self {
            rng_bank: RngBank::new(config.master_seed),
            scheduler: TransitionScheduler::new(DelayOracle::new(&config)),
            balancer,
            sampler,
            store,
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Compute `day`'s output without writing anything.
    pub fn simulate_day(&self, day: Day) -> SimResult<(DailyBatch, DayReport)> {
        let history = HistoryReader::new(self.store, self.config.history_read_workers).load(day)?;
        let mut index = history.index;

        let transitions = self.scheduler.schedule_transitions(day, &index);
        for inscription in &transitions.inscriptions {
            index.apply(&RegistryEvent::Inscription(inscription.clone()));
        }

        let mut rng = self.rng_bank.for_slot_on_day(SubsystemSlot::Balancer, day);
        let top_up = self
            .balancer
            .top_up(day, transitions.inscriptions.len(), &mut index, &mut rng)?;

        let mut rng = self.rng_bank.for_slot_on_day(SubsystemSlot::Consultation, day);
        let consultations = self.sampler.sample_consultations(day, &mut index, &mut rng)?;

        let report = DayReport {
            day,
            scheduled_inscriptions: transitions.inscriptions.len(),
            direct_inscriptions: top_up.direct_inscriptions.len(),
            new_surveillances: top_up.surveillances.len(),
            strike_offs: transitions.strike_offs.len(),
            consultations: consultations.len(),
            history_files: history.files_read,
            history_warnings: history.warnings.len(),
        };

        let registry = transitions
            .inscriptions
            .into_iter()
            .map(RegistryEvent::Inscription)
            .chain(top_up.into_events())
            .chain(transitions.strike_offs.into_iter().map(RegistryEvent::StrikeOff))
            .collect();

        Ok((
            DailyBatch {
                consultations,
                registry,
            },
            report,
        ))
    }

    /// Generate and publish `day`.
    pub fn run_day(&self, day: Day, overwrite: bool) -> SimResult<DayReport> {
        let writer = DailyWriter::new(self.store);
        // Cheap early refusal; write() re-checks before publishing.
        if !overwrite {
            if let Some(name) = writer.existing(day)?.into_iter().next() {
                return Err(SimError::WriteConflict { name });
            }
        }

        let (batch, report) = self.simulate_day(day)?;
        writer.write(day, &batch, overwrite)?;

        log::info!(
            "{day}: {} scheduled + {} direct inscriptions, {} surveillances, {} strike-offs, {} consultations",
            report.scheduled_inscriptions,
            report.direct_inscriptions,
            report.new_surveillances,
            report.strike_offs,
            report.consultations,
        );
        if report.history_warnings > 0 {
            log::warn!("{day}: {} history files were skipped", report.history_warnings);
        }
        Ok(report)
    }

    /// Generate every day in `[start, end]`, strictly in order.
    ///
    /// Each day stands alone: a failure is recorded and the batch moves on.
    /// `cancel` is checked before each day; days already written stay valid
    /// and a later batch can resume from the first missing day.
    pub fn run_range(&self, start: Day, end: Day, options: &RunOptions, cancel: &AtomicBool) -> BatchReport {
        let run_id = Uuid::new_v4().to_string();
        log::info!(
            "batch {run_id}: {start}..={end} on {} (overwrite={}, skip_weekends={})",
            self.store.describe(),
            options.overwrite,
            options.skip_weekends
        );

        let mut report = BatchReport {
            run_id,
            days: Vec::new(),
            interrupted: false,
        };
        let mut day = start;
        while day <= end {
            if cancel.load(Ordering::SeqCst) {
                log::warn!("batch {}: interrupted before {day}", report.run_id);
                report.interrupted = true;
                break;
            }

            let outcome = if options.skip_weekends && is_weekend(day) {
                log::info!("{day}: weekend, skipped");
                DayOutcome::Skipped {
                    day,
                    reason: "weekend".into(),
                }
            } else {
                match self.run_day(day, options.overwrite) {
                    Ok(r) => DayOutcome::Written(r),
                    Err(SimError::WriteConflict { name }) => {
                        log::warn!("{day}: {name} already exists (use overwrite to regenerate)");
                        DayOutcome::Conflict { day, name }
                    }
                    Err(e) => {
                        log::error!("{day}: generation failed: {e}");
                        DayOutcome::Failed {
                            day,
                            error: e.to_string(),
                        }
                    }
                }
            };
            report.days.push(outcome);
            day += Duration::days(1);
        }
        report
    }
}

pub fn is_weekend(day: Day) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use chrono::NaiveDate;

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    #[test]
    fn weekend_detection() {
        // 2024-01-06 was a Saturday.
        assert!(is_weekend(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()));
        assert!(is_weekend(NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()));
        assert!(!is_weekend(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let store = store();
        let config = SimConfig {
            known_fraction: -0.1,
            ..SimConfig::default_test()
        };
        assert!(DailySimulator::new(config, &store).is_err());
    }

    #[test]
    fn oversized_delay_is_rejected_before_any_day_runs() {
        let store = store();
        let config = SimConfig {
            payment_delay_max: i64::MAX / 2,
            ..SimConfig::default_test()
        };
        assert!(matches!(
            DailySimulator::new(config, &store),
            Err(SimError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn cancelled_batch_writes_nothing() {
        let store = store();
        let sim = DailySimulator::new(SimConfig::default_test(), &store).unwrap();
        let cancel = AtomicBool::new(true);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let report = sim.run_range(day, day + Duration::days(5), &RunOptions::default(), &cancel);
        assert!(report.interrupted);
        assert!(report.days.is_empty());
        assert!(store.list("inscription/").unwrap().is_empty());
    }

    /// Raises `cancel` once a day's last partition has been published.
    struct CancelAfterFirstDay<'a> {
        inner: SqliteStore,
        cancel: &'a AtomicBool,
    }

    impl ObjectStore for CancelAfterFirstDay<'_> {
        fn list(&self, prefix: &str) -> SimResult<Vec<String>> {
            self.inner.list(prefix)
        }

        fn get(&self, name: &str) -> SimResult<String> {
            self.inner.get(name)
        }

        fn exists(&self, name: &str) -> SimResult<bool> {
            self.inner.exists(name)
        }

        fn put(&self, name: &str, body: &str, overwrite: bool) -> SimResult<()> {
            self.inner.put(name, body, overwrite)?;
            if name.starts_with("radiation/") {
                self.cancel.store(true, Ordering::SeqCst);
            }
            Ok(())
        }

        fn describe(&self) -> String {
            self.inner.describe()
        }
    }

    #[test]
    fn conflict_mid_range_is_recorded_and_the_batch_continues() {
        let store = store();
        let sim = DailySimulator::new(SimConfig::default_test(), &store).unwrap();
        let day1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let day2 = day1 + Duration::days(1);
        let day3 = day1 + Duration::days(2);
        sim.run_day(day2, false).unwrap();
        let published = store.get("inscription/2024-01-02.csv").unwrap();

        let report = sim.run_range(day1, day3, &RunOptions::default(), &AtomicBool::new(false));
        assert!(!report.interrupted);
        assert_eq!(report.days.len(), 3);
        assert!(matches!(&report.days[0], DayOutcome::Written(r) if r.day == day1));
        assert!(matches!(&report.days[1], DayOutcome::Conflict { day, .. } if *day == day2));
        assert!(matches!(&report.days[2], DayOutcome::Written(r) if r.day == day3));
        assert_eq!(report.written(), 2);
        assert_eq!(report.failed(), 1);

        assert_eq!(store.get("inscription/2024-01-02.csv").unwrap(), published);
        for name in ["consultation/2024-01-03.csv", "inscription/2024-01-03.csv", "radiation/2024-01-03.csv"] {
            assert!(store.exists(name).unwrap(), "{name}");
        }
    }

    #[test]
    fn cancel_between_days_keeps_finished_days() {
        let cancel = AtomicBool::new(false);
        let store = CancelAfterFirstDay {
            inner: store(),
            cancel: &cancel,
        };
        let sim = DailySimulator::new(SimConfig::default_test(), &store).unwrap();
        let day1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let report = sim.run_range(day1, day1 + Duration::days(2), &RunOptions::default(), &cancel);
        assert!(report.interrupted);
        assert_eq!(report.written(), 1);
        assert_eq!(report.days.len(), 1);
        for name in ["consultation/2024-01-01.csv", "inscription/2024-01-01.csv", "radiation/2024-01-01.csv"] {
            assert!(store.exists(name).unwrap(), "{name}");
        }
        assert!(!store.exists("inscription/2024-01-02.csv").unwrap());

        // The interrupted batch resumes from the first missing day.
        let resumed = sim.run_range(day1, day1 + Duration::days(2), &RunOptions::default(), &AtomicBool::new(false));
        assert!(matches!(resumed.days[0], DayOutcome::Conflict { .. }));
        assert_eq!(resumed.written(), 2);
    }

    #[test]
    fn weekends_are_skipped_when_asked() {
        let store = store();
        let sim = DailySimulator::new(SimConfig::default_test(), &store).unwrap();
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let options = RunOptions {
            overwrite: false,
            skip_weekends: true,
        };
        let report = sim.run_range(friday, friday + Duration::days(3), &options, &AtomicBool::new(false));
        assert_eq!(report.written(), 2);
        assert!(matches!(report.days[1], DayOutcome::Skipped { .. }));
        assert!(!store.exists("inscription/2024-01-06.csv").unwrap());
        assert!(store.exists("inscription/2024-01-08.csv").unwrap());
    }
}
