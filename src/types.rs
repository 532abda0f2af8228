//! Domain value types for the GAR subscription registry.
//!
//! These mirror the registry's wire vocabulary: subscriptions grant an
//! institution (identified by its UAI code) access to a resource for a
//! validity window, with an assignment describing who inside the
//! institution may use it.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A digital resource as declared to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: String,
    /// Identifier scheme, `ark` unless the resource uses another one.
    pub kind: String,
    pub label: String,
}

impl Resource {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "ark".to_string(),
            label: label.into(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

/// Audience categories recognized by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Student,
    Teacher,
    Documentalist,
    Other,
}

impl Audience {
    /// Wire value of the `publicCible` element.
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Student => "ELEVE",
            Audience::Teacher => "ENSEIGNANT",
            Audience::Documentalist => "DOCUMENTALISTE",
            Audience::Other => "AUTRE PERSONNEL",
        }
    }
}

/// Assignment terms attached to a subscription at creation time.
///
/// The defaults match the registry's most common case: a transferable
/// institution-wide licence with no seat limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub category: String,
    pub kind: String,
    pub num_global_licence: String,
    /// Ordered `publicCible` tags; an empty list renders no tags.
    pub audience: Vec<Audience>,
}

impl Default for Assignment {
    fn default() -> Self {
        Self {
            category: "transferable".to_string(),
            kind: "ETABL".to_string(),
            num_global_licence: "ILLIMITE".to_string(),
            audience: Vec::new(),
        }
    }
}

impl Assignment {
    pub fn with_audience(mut self, audience: Vec<Audience>) -> Self {
        self.audience = audience;
        self
    }
}

/// A subscription as returned by the registry. Never hand-constructed:
/// instances only come out of parsing a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub subscription_id: String,
    pub distributor_id: String,
    pub resource_id: String,
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
    /// Institution code of the subscribing school.
    pub uai: String,
    /// Raw `publicCible` values in source order.
    pub audience: Vec<String>,
}

/// Query filter for the subscription listing endpoint. Absent fields
/// are omitted from the query entirely; an all-`None` filter matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub distributor_id: Option<String>,
    pub uai: Option<String>,
    pub subscription_id: Option<String>,
    pub assignment_type: Option<String>,
    pub assignment_category: Option<String>,
    pub target_audience: Option<String>,
    pub resource_id: Option<String>,
}

impl SubscriptionFilter {
    /// Convenience filter matching a single subscription id.
    pub fn by_subscription_id(id: impl Into<String>) -> Self {
        Self {
            subscription_id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Capability contract for anything that can be sent to the registry
/// as a subscription create/update request. Implement this on your own
/// domain type, or use [`SubscriptionRequest`].
pub trait CreatableSubscription {
    /// Institution code of the subscribing school.
    fn uai(&self) -> &str;
    fn subscription_id(&self) -> &str;
    fn resource_id(&self) -> &str;
    /// Validity window start; required for create, optional for a
    /// date-only update.
    fn valid_from(&self) -> Option<NaiveDateTime>;
    /// Validity window end; same rules as `valid_from`.
    fn valid_to(&self) -> Option<NaiveDateTime>;
    /// Optional `codeProjetRessource` tag.
    fn resource_project_code(&self) -> Option<&str> {
        None
    }
}

/// Plain data carrier implementing [`CreatableSubscription`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub uai: String,
    pub subscription_id: String,
    pub resource_id: String,
    pub valid_from: Option<NaiveDateTime>,
    pub valid_to: Option<NaiveDateTime>,
    pub resource_project_code: Option<String>,
}

impl CreatableSubscription for SubscriptionRequest {
    fn uai(&self) -> &str {
        &self.uai
    }

    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn valid_from(&self) -> Option<NaiveDateTime> {
        self.valid_from
    }

    fn valid_to(&self) -> Option<NaiveDateTime> {
        self.valid_to
    }

    fn resource_project_code(&self) -> Option<&str> {
        self.resource_project_code.as_deref()
    }
}

/// Acknowledgment status of an affectation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Acknowledged,
    NotAcknowledged,
    All,
}

impl ReportStatus {
    /// Status segment of the report listing URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Acknowledged => "PRIS_EN_COMPTE",
            ReportStatus::NotAcknowledged => "NON_PRIS_EN_COMPTE",
            ReportStatus::All => "TOUT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRIS_EN_COMPTE" => Some(ReportStatus::Acknowledged),
            "NON_PRIS_EN_COMPTE" => Some(ReportStatus::NotAcknowledged),
            "TOUT" => Some(ReportStatus::All),
            _ => None,
        }
    }
}

/// An affectation report available for download.
///
/// `status` is populated on the per-distributor listing path only; the
/// global-report listing leaves it `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub name: String,
    /// Creation date, time-of-day zeroed.
    pub date: NaiveDate,
    /// Size in bytes.
    pub size: u64,
    pub status: Option<ReportStatus>,
}

/// One institution record from the directory: child element local
/// names mapped to their text content, no type coercion.
pub type Institution = BTreeMap<String, String>;

/// Full institution directory keyed by UAI.
pub type InstitutionDirectory = BTreeMap<String, Institution>;

/// One match from a global-report query: an institution covered by a
/// subscription to a resource, with its user-assignment count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalReportItem {
    pub resource_id: String,
    pub resource_title: String,
    pub subscription_id: String,
    pub subscription_end: NaiveDate,
    pub uai: String,
    pub assignment_count: usize,
}
