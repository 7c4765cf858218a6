//! Daily file codec: the tabular contract with the downstream ETL.
//!
//! Files are UTF-8, comma separated, `\n` terminated, header first.
//! No field can contain a comma (keys are alphanumeric, everything else
//! is a date or a fixed vocabulary word), so no quoting is ever emitted.

use crate::{
    error::{SimError, SimResult},
    event::{
        ConsultationEvent, IncidentKind, InscriptionEvent, RegistryEvent, StatusSnapshot,
        StrikeOffEvent, SurveillanceEvent,
    },
    types::{format_day, format_optional_day, parse_day, parse_optional_day, Day},
};

pub const REGISTRY_STATUS_SURVEILLANCE: &str = "SURVEILLANCE";
pub const REGISTRY_STATUS_INSCRIBED: &str = "INSCRIT";

/// The three daily partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dataset {
    Consultation,
    Inscription,
    Radiation,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Self::Consultation, Self::Inscription, Self::Radiation];

    /// Category root, with trailing slash, as listed in the store.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Consultation => "consultation/",
            Self::Inscription => "inscription/",
            Self::Radiation => "radiation/",
        }
    }

    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Self::Consultation => &[
                "cle_bdf",
                "date_consultation",
                "statut_ficp",
                "date_surveillance",
                "date_inscription",
            ],
            Self::Inscription => &[
                "cle_bdf",
                "statut_ficp",
                "type_incident",
                "date_surveillance",
                "date_inscription",
            ],
            Self::Radiation => &["cle_bdf", "date_inscription", "date_radiation", "type_incident"],
        }
    }

    /// `<prefix><YYYY-MM-DD>.csv`
    pub fn object_name(&self, day: Day) -> String {
        format!("{}{}.csv", self.prefix(), format_day(day))
    }

    /// Partition a registry event belongs to.
    pub fn of(event: &RegistryEvent) -> Self {
        match event {
            RegistryEvent::Surveillance(_) | RegistryEvent::Inscription(_) => Self::Inscription,
            RegistryEvent::StrikeOff(_) => Self::Radiation,
        }
    }
}

/// Extract the partition day from an object name such as
/// `inscription/2024-01-31.csv`. Only the first ten characters of the
/// base name are considered.
pub fn day_from_object_name(name: &str) -> Option<Day> {
    let base = name.rsplit('/').next().unwrap_or(name);
    if !base.ends_with(".csv") {
        return None;
    }
    let date_part = base.get(..10)?;
    parse_day(date_part).ok()
}

// ── Encoding ──────────────────────────────────────────────────

pub fn encode_registry_event(event: &RegistryEvent) -> Vec<String> {
    match event {
        RegistryEvent::Surveillance(e) => vec![
            e.entity_key.clone(),
            REGISTRY_STATUS_SURVEILLANCE.into(),
            IncidentKind::PaymentDefault.as_wire().into(),
            format_day(e.date),
            String::new(),
        ],
        RegistryEvent::Inscription(e) => vec![
            e.entity_key.clone(),
            REGISTRY_STATUS_INSCRIBED.into(),
            e.kind.as_wire().into(),
            format_optional_day(e.surveillance_date),
            format_day(e.date),
        ],
        RegistryEvent::StrikeOff(e) => vec![
            e.entity_key.clone(),
            format_day(e.inscription_date),
            format_day(e.strike_off_date),
            e.kind.as_wire().into(),
        ],
    }
}

pub fn encode_consultation(event: &ConsultationEvent) -> Vec<String> {
    vec![
        event.entity_key.clone(),
        format_day(event.date),
        event.status.as_wire().into(),
        format_optional_day(event.surveillance_date),
        format_optional_day(event.inscription_date),
    ]
}

/// Render a whole file: header plus rows.
pub fn encode_table(dataset: Dataset, rows: impl IntoIterator<Item = Vec<String>>) -> String {
    let mut out = dataset.header().join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

// ── Decoding ──────────────────────────────────────────────────

fn malformed(name: &str, reason: impl Into<String>) -> SimError {
    SimError::MalformedFile {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Split a file into data rows after checking the header.
/// Every row must have exactly the dataset's column count.
fn split_rows<'a>(dataset: Dataset, name: &str, text: &'a str) -> SimResult<Vec<Vec<&'a str>>> {
    let expected = dataset.header();
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty());

    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| malformed(name, "missing header"))?
        .split(',')
        .collect();
    if header != expected {
        return Err(malformed(
            name,
            format!("header {:?} does not match {:?}", header, expected),
        ));
    }

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() != expected.len() {
            return Err(malformed(
                name,
                format!(
                    "row {} has {} columns, expected {}",
                    i + 2,
                    cells.len(),
                    expected.len()
                ),
            ));
        }
        rows.push(cells);
    }
    Ok(rows)
}

fn cell_day(name: &str, value: &str) -> SimResult<Day> {
    parse_day(value).map_err(|e| malformed(name, e.to_string()))
}

fn cell_optional_day(name: &str, value: &str) -> SimResult<Option<Day>> {
    parse_optional_day(value).map_err(|e| malformed(name, e.to_string()))
}

fn cell_kind(name: &str, value: &str) -> SimResult<IncidentKind> {
    IncidentKind::from_wire(value)
        .ok_or_else(|| malformed(name, format!("unknown incident kind '{value}'")))
}

fn cell_key(name: &str, value: &str) -> SimResult<String> {
    if value.is_empty() {
        return Err(malformed(name, "blank entity key"));
    }
    Ok(value.to_string())
}

/// Decode an `inscription/` or `radiation/` file.
pub fn decode_registry_file(dataset: Dataset, name: &str, text: &str) -> SimResult<Vec<RegistryEvent>> {
    let rows = split_rows(dataset, name, text)?;
    let mut events = Vec::with_capacity(rows.len());
    for cells in rows {
        let event = match dataset {
            Dataset::Inscription => match cells[1] {
                REGISTRY_STATUS_SURVEILLANCE => {
                    // Surveillance only ever precedes a payment incident.
                    if cell_kind(name, cells[2])? != IncidentKind::PaymentDefault {
                        return Err(malformed(name, format!("SURVEILLANCE row with kind '{}'", cells[2])));
                    }
                    RegistryEvent::Surveillance(SurveillanceEvent {
                        entity_key: cell_key(name, cells[0])?,
                        date: cell_day(name, cells[3])?,
                    })
                }
                REGISTRY_STATUS_INSCRIBED => RegistryEvent::Inscription(InscriptionEvent {
                    entity_key: cell_key(name, cells[0])?,
                    kind: cell_kind(name, cells[2])?,
                    surveillance_date: cell_optional_day(name, cells[3])?,
                    date: cell_day(name, cells[4])?,
                }),
                other => return Err(malformed(name, format!("unknown registry status '{other}'"))),
            },
            Dataset::Radiation => RegistryEvent::StrikeOff(StrikeOffEvent {
                entity_key: cell_key(name, cells[0])?,
                inscription_date: cell_day(name, cells[1])?,
                strike_off_date: cell_day(name, cells[2])?,
                kind: cell_kind(name, cells[3])?,
            }),
            Dataset::Consultation => {
                return Err(malformed(name, "consultation file decoded as registry events"))
            }
        };
        events.push(event);
    }
    Ok(events)
}

/// Decode a `consultation/` file.
pub fn decode_consultation_file(name: &str, text: &str) -> SimResult<Vec<ConsultationEvent>> {
    let rows = split_rows(Dataset::Consultation, name, text)?;
    rows.into_iter()
        .map(|cells| {
            Ok(ConsultationEvent {
                entity_key: cell_key(name, cells[0])?,
                date: cell_day(name, cells[1])?,
                status: StatusSnapshot::from_wire(cells[2])
                    .ok_or_else(|| malformed(name, format!("unknown status '{}'", cells[2])))?,
                surveillance_date: cell_optional_day(name, cells[3])?,
                inscription_date: cell_optional_day(name, cells[4])?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> Day {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn object_names_embed_the_iso_day() {
        assert_eq!(Dataset::Radiation.object_name(d(2, 9)), "radiation/2024-02-09.csv");
        assert_eq!(day_from_object_name("inscription/2024-02-09.csv"), Some(d(2, 9)));
        assert_eq!(day_from_object_name("inscription/2024-13-09.csv"), None);
        assert_eq!(day_from_object_name("inscription/notes.txt"), None);
        assert_eq!(day_from_object_name("inscription/x.csv"), None);
    }

    #[test]
    fn registry_file_matches_wire_contract() {
        let events = vec![
            RegistryEvent::Inscription(InscriptionEvent {
                entity_key: "AAAABBBB00001".into(),
                date: d(3, 5),
                kind: IncidentKind::PaymentDefault,
                surveillance_date: Some(d(2, 1)),
            }),
            RegistryEvent::Inscription(InscriptionEvent {
                entity_key: "AAAABBBB00002".into(),
                date: d(3, 5),
                kind: IncidentKind::OverIndebtedness,
                surveillance_date: None,
            }),
            RegistryEvent::Surveillance(SurveillanceEvent {
                entity_key: "AAAABBBB00003".into(),
                date: d(3, 5),
            }),
        ];
        let text = encode_table(Dataset::Inscription, events.iter().map(encode_registry_event));
        assert_eq!(
            text,
            "cle_bdf,statut_ficp,type_incident,date_surveillance,date_inscription\n\
             AAAABBBB00001,INSCRIT,PAIEMENT,2024-02-01,2024-03-05\n\
             AAAABBBB00002,INSCRIT,SURENDETTEMENT,,2024-03-05\n\
             AAAABBBB00003,SURVEILLANCE,PAIEMENT,2024-03-05,\n"
        );
        let decoded = decode_registry_file(Dataset::Inscription, "x", &text).unwrap();
        assert_eq!(decoded, events);
    }

    #[test]
    fn header_only_file_decodes_empty() {
        let text = encode_table(Dataset::Radiation, Vec::<Vec<String>>::new());
        assert!(decode_registry_file(Dataset::Radiation, "r", &text).unwrap().is_empty());
    }

    #[test]
    fn wrong_column_count_is_malformed() {
        let text = "cle_bdf,date_inscription,date_radiation,type_incident\nAAAA,2024-01-01,2024-01-20\n";
        let err = decode_registry_file(Dataset::Radiation, "radiation/2024-01-20.csv", text);
        assert!(matches!(err, Err(SimError::MalformedFile { .. })));
    }

    #[test]
    fn surveillance_must_carry_the_payment_kind() {
        let text = "cle_bdf,statut_ficp,type_incident,date_surveillance,date_inscription\n\
                    AAAA,SURVEILLANCE,SURENDETTEMENT,2024-01-01,\n";
        let err = decode_registry_file(Dataset::Inscription, "inscription/2024-01-01.csv", text);
        assert!(matches!(err, Err(SimError::MalformedFile { .. })));
    }

    #[test]
    fn bad_date_cell_is_malformed() {
        let text = "cle_bdf,date_consultation,statut_ficp,date_surveillance,date_inscription\n\
                    AAAA,2024-02-30,NON_INSCRIT,,\n";
        assert!(decode_consultation_file("c", text).is_err());
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let text = "cle_bdf,date_consultation,statut_ficp,date_surveillance,date_inscription\r\n\
                    AAAA,2024-02-03,SURVEILLANCE,2024-02-01,\r\n";
        let rows = decode_consultation_file("c", text).unwrap();
        assert_eq!(rows[0].status, StatusSnapshot::UnderSurveillance);
        assert_eq!(rows[0].surveillance_date, Some(d(2, 1)));
    }
}
