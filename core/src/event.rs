//! Registry events: the only facts the simulator ever produces.
//!
//! RULE: There is no stored "current status" anywhere. An entity's
//! lifecycle state on day D is a projection of its events dated <= D
//! (see consultation::project_status).

use serde::{Deserialize, Serialize};

use crate::types::{Day, EntityKey};

/// Why an entity is inscribed. Wire names are the downstream contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentKind {
    /// Reached via a surveillance notice 31–37 days earlier.
    PaymentDefault,
    /// Inscribed directly, no surveillance precursor.
    OverIndebtedness,
}

impl IncidentKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::PaymentDefault => "PAIEMENT",
            Self::OverIndebtedness => "SURENDETTEMENT",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "PAIEMENT" => Some(Self::PaymentDefault),
            "SURENDETTEMENT" => Some(Self::OverIndebtedness),
            _ => None,
        }
    }
}

/// Lifecycle state reported by a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSnapshot {
    NotListed,
    UnderSurveillance,
    Inscribed,
}

impl StatusSnapshot {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::NotListed => "NON_INSCRIT",
            Self::UnderSurveillance => "SURVEILLANCE",
            Self::Inscribed => "INSCRIT",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "NON_INSCRIT" => Some(Self::NotListed),
            "SURVEILLANCE" => Some(Self::UnderSurveillance),
            "INSCRIT" => Some(Self::Inscribed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveillanceEvent {
    pub entity_key: EntityKey,
    pub date: Day,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InscriptionEvent {
    pub entity_key: EntityKey,
    pub date: Day,
    pub kind: IncidentKind,
    /// None for direct SURENDETTEMENT inscriptions.
    pub surveillance_date: Option<Day>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrikeOffEvent {
    pub entity_key: EntityKey,
    pub inscription_date: Day,
    pub strike_off_date: Day,
    pub kind: IncidentKind,
}

/// Every registry fact, as one sum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Surveillance(SurveillanceEvent),
    Inscription(InscriptionEvent),
    StrikeOff(StrikeOffEvent),
}

impl RegistryEvent {
    pub fn entity_key(&self) -> &str {
        match self {
            Self::Surveillance(e) => &e.entity_key,
            Self::Inscription(e) => &e.entity_key,
            Self::StrikeOff(e) => &e.entity_key,
        }
    }

    /// The day this event takes effect.
    pub fn effective_date(&self) -> Day {
        match self {
            Self::Surveillance(e) => e.date,
            Self::Inscription(e) => e.date,
            Self::StrikeOff(e) => e.strike_off_date,
        }
    }
}

/// One query against the registry. Reports state; never changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsultationEvent {
    pub entity_key: EntityKey,
    pub date: Day,
    pub status: StatusSnapshot,
    pub surveillance_date: Option<Day>,
    pub inscription_date: Option<Day>,
}
