//! Transition scheduler: which lifecycle transitions fall due today.
//!
//! Nothing here is stored between runs. A transition is due on `day`
//! exactly when the hash-derived delay lands on it:
//!   surveillance s   → PAIEMENT inscription when s + payment_delay(key) == day
//!   inscription i    → strike-off when eligible(key) and i + strikeoff_delay(key) == day

use chrono::Duration;

use crate::{
    event::{IncidentKind, InscriptionEvent, StrikeOffEvent},
    history::HistoryIndex,
    oracle::DelayOracle,
    types::Day,
};

/// Everything the history makes due on one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduledTransitions {
    pub inscriptions: Vec<InscriptionEvent>,
    pub strike_offs: Vec<StrikeOffEvent>,
}

pub struct TransitionScheduler {
    oracle: DelayOracle,
}

impl TransitionScheduler {
    pub fn new(oracle: DelayOracle) -> Self {
        Self { oracle }
    }

    /// Both transition streams for `day`. They are independent: one key
    /// may inscribe today and have an older inscription struck off today.
    pub fn schedule_transitions(&self, day: Day, index: &HistoryIndex) -> ScheduledTransitions {
        ScheduledTransitions {
            inscriptions: self.scheduled_inscriptions(day, index),
            strike_offs: self.scheduled_strike_offs(day, index),
        }
    }

    /// PAIEMENT inscriptions maturing today, in key order.
    ///
    /// The most recent surveillance on or before `day` is the authoritative
    /// one; earlier notices for the same key are superseded. A key already
    /// inscribed on or before `day` never inscribes again.
    pub fn scheduled_inscriptions(&self, day: Day, index: &HistoryIndex) -> Vec<InscriptionEvent> {
        let mut due = Vec::new();
        for key in index.surveillance.keys() {
            let Some(surveilled) = index.latest_surveillance_on_or_before(key, day) else {
                continue;
            };
            let target = surveilled + Duration::days(self.oracle.payment_delay(key));
            if target != day || index.is_inscribed_on_or_before(key, day) {
                continue;
            }
            due.push(InscriptionEvent {
                entity_key: key.clone(),
                date: day,
                kind: IncidentKind::PaymentDefault,
                surveillance_date: Some(surveilled),
            });
        }
        due
    }

    /// Strike-offs falling due today, in (key, inscription date) order.
    /// Each inscription dated strictly before `day` is evaluated on its own.
    pub fn scheduled_strike_offs(&self, day: Day, index: &HistoryIndex) -> Vec<StrikeOffEvent> {
        let mut due = Vec::new();
        for (key, records) in &index.inscriptions {
            if !self.oracle.strikeoff_eligible(key) {
                continue;
            }
            let delay = Duration::days(self.oracle.strikeoff_delay(key));
            for record in records.iter().filter(|r| r.date < day) {
                if record.date + delay == day {
                    due.push(StrikeOffEvent {
                        entity_key: key.clone(),
                        inscription_date: record.date,
                        strike_off_date: day,
                        kind: record.kind,
                    });
                }
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SimConfig, history::InscriptionRecord};
    use chrono::NaiveDate;

    fn day(n: i64) -> Day {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n - 1)
    }

    fn scheduler() -> (TransitionScheduler, DelayOracle) {
        let oracle = DelayOracle::new(&SimConfig::default());
        (TransitionScheduler::new(oracle), oracle)
    }

    /// First key of the form AAAAAAAA<nnnnn> satisfying `pred`.
    fn find_key(pred: impl Fn(&str) -> bool) -> String {
        (0..100_000)
            .map(|i| format!("AAAAAAAA{i:05}"))
            .find(|k| pred(k.as_str()))
            .expect("no key satisfies predicate")
    }

    #[test]
    fn surveillance_matures_on_exactly_one_day() {
        let (scheduler, oracle) = scheduler();
        let key = find_key(|_| true);
        let mut index = HistoryIndex::default();
        index.record_surveillance(&key, day(1));
        let delay = oracle.payment_delay(&key);

        for n in 2..=60 {
            let due = scheduler.scheduled_inscriptions(day(n), &index);
            if n == 1 + delay {
                assert_eq!(due.len(), 1);
                assert_eq!(due[0].surveillance_date, Some(day(1)));
                assert_eq!(due[0].kind, IncidentKind::PaymentDefault);
            } else {
                assert!(due.is_empty(), "unexpected inscription on day {n}");
            }
        }
    }

    #[test]
    fn latest_surveillance_supersedes_earlier_ones() {
        let (scheduler, oracle) = scheduler();
        let key = find_key(|_| true);
        let delay = oracle.payment_delay(&key);
        let mut index = HistoryIndex::default();
        index.record_surveillance(&key, day(1));
        index.record_surveillance(&key, day(10));

        assert!(scheduler.scheduled_inscriptions(day(1 + delay), &index).is_empty());
        let due = scheduler.scheduled_inscriptions(day(10 + delay), &index);
        assert_eq!(due[0].surveillance_date, Some(day(10)));
    }

    #[test]
    fn already_inscribed_key_does_not_inscribe_again() {
        let (scheduler, oracle) = scheduler();
        let key = find_key(|_| true);
        let delay = oracle.payment_delay(&key);
        let mut index = HistoryIndex::default();
        index.record_surveillance(&key, day(1));
        index.record_inscription(
            &key,
            InscriptionRecord {
                date: day(5),
                kind: IncidentKind::OverIndebtedness,
                surveillance_date: None,
            },
        );
        assert!(scheduler.scheduled_inscriptions(day(1 + delay), &index).is_empty());
    }

    #[test]
    fn eligible_inscription_strikes_off_after_its_delay() {
        let (scheduler, oracle) = scheduler();
        let key = find_key(|k| oracle.strikeoff_eligible(k));
        let delay = oracle.strikeoff_delay(&key);
        let mut index = HistoryIndex::default();
        index.record_inscription(
            &key,
            InscriptionRecord {
                date: day(34),
                kind: IncidentKind::PaymentDefault,
                surveillance_date: Some(day(1)),
            },
        );

        for n in 30..=70 {
            let due = scheduler.scheduled_strike_offs(day(n), &index);
            if n == 34 + delay {
                assert_eq!(due.len(), 1);
                assert_eq!(due[0].inscription_date, day(34));
                assert_eq!(due[0].kind, IncidentKind::PaymentDefault);
            } else {
                assert!(due.is_empty(), "unexpected strike-off on day {n}");
            }
        }
    }

    #[test]
    fn ineligible_inscription_is_never_struck_off() {
        let (scheduler, oracle) = scheduler();
        let key = find_key(|k| !oracle.strikeoff_eligible(k));
        let mut index = HistoryIndex::default();
        index.record_inscription(
            &key,
            InscriptionRecord {
                date: day(1),
                kind: IncidentKind::OverIndebtedness,
                surveillance_date: None,
            },
        );
        for n in 2..=40 {
            assert!(scheduler.scheduled_strike_offs(day(n), &index).is_empty());
        }
    }

    #[test]
    fn each_inscription_is_evaluated_independently() {
        let (scheduler, oracle) = scheduler();
        let key = find_key(|k| oracle.strikeoff_eligible(k));
        let delay = oracle.strikeoff_delay(&key);
        let mut index = HistoryIndex::default();
        for start in [1, 2] {
            index.record_inscription(
                &key,
                InscriptionRecord {
                    date: day(start),
                    kind: IncidentKind::OverIndebtedness,
                    surveillance_date: None,
                },
            );
        }
        assert_eq!(scheduler.scheduled_strike_offs(day(1 + delay), &index).len(), 1);
        assert_eq!(scheduler.scheduled_strike_offs(day(2 + delay), &index).len(), 1);
    }
}
