//! The alert record: a CAP style envelope carrying a warning from an
//! issuing authority to its audience.

use chrono::{DateTime, Utc};
use geojson::Geometry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::alert_source::Agency;
use super::cap::{AreaInfo, CapAlert, EventInfo, Message, Resource, SourceInfo};
use super::constants::{
    Category, Certainty, Direction, MsgType, ResponseType, Scope, Severity, Status, Urgency,
    DEFAULT_COLOR,
};
use super::geo::{centroid_of, has_coordinates};
use super::{start_case, trimmed, DeriveContext, Document, Identified, Linked};
use crate::notify::Campaign;

/// A geographic feature (region, district, ward) owned by another service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Identified for Feature {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    /// Issuing authority, stored as an id and populated on read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency: Option<Linked<Agency>>,

    /// Display name of the issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Human readable unique identifier, e.g. EQ-2018-000033-TZA.
    #[validate(length(min = 1))]
    pub number: String,

    pub status: Status,

    #[serde(rename = "type")]
    pub msg_type: MsgType,

    pub scope: Scope,
    pub category: Category,
    pub response: ResponseType,
    pub urgency: Urgency,
    pub severity: Severity,
    pub certainty: Certainty,

    /// Subject of the alert, e.g. Flood.
    #[validate(length(min = 1))]
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Affected area in text form.
    #[validate(length(min = 1))]
    pub area: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Linked<Feature>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Geometry>,

    #[validate(required)]
    pub reported_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,

    pub direction: Direction,

    /// Hex code derived from severity.
    pub color: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub resources: Vec<Resource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Default for Alert {
    fn default() -> Self {
        Self {
            id: None,
            agency: None,
            source: None,
            number: String::new(),
            status: Status::default(),
            msg_type: MsgType::default(),
            scope: Scope::default(),
            category: Category::default(),
            response: ResponseType::default(),
            urgency: Urgency::default(),
            severity: Severity::default(),
            certainty: Certainty::default(),
            event: String::new(),
            headline: None,
            description: None,
            instruction: None,
            url: None,
            area: String::new(),
            locations: Vec::new(),
            geometry: None,
            centroid: None,
            reported_at: None,
            expected_at: None,
            expired_at: None,
            direction: Direction::default(),
            color: DEFAULT_COLOR.to_string(),
            resources: Vec::new(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }
}

type Derivation = fn(&mut Alert, &DeriveContext);

/// Pre-validation steps, applied in order on every save.
pub const DERIVATIONS: &[Derivation] = &[
    ensure_reported_at,
    ensure_number,
    ensure_headline,
    derive_centroid,
    derive_color,
    derive_source,
    derive_area,
];

fn ensure_reported_at(alert: &mut Alert, ctx: &DeriveContext) {
    if alert.reported_at.is_none() {
        alert.reported_at = Some(ctx.now);
    }
}

fn ensure_number(alert: &mut Alert, _: &DeriveContext) {
    if alert.number.is_empty() {
        alert.number = Uuid::new_v4().to_string().to_uppercase();
    }
}

fn ensure_headline(alert: &mut Alert, _: &DeriveContext) {
    if alert.headline.is_none() && !alert.event.is_empty() {
        alert.headline = Some(alert.event.clone());
    }
}

fn derive_centroid(alert: &mut Alert, _: &DeriveContext) {
    if let Some(geometry) = alert.geometry.as_ref().filter(|g| has_coordinates(g)) {
        alert.centroid = centroid_of(geometry);
    }
}

fn derive_color(alert: &mut Alert, _: &DeriveContext) {
    alert.color = alert.severity.color().to_string();
}

fn derive_source(alert: &mut Alert, _: &DeriveContext) {
    let name = alert
        .agency
        .as_ref()
        .and_then(Linked::populated)
        .and_then(|agency| agency.name.clone());

    if let Some(name) = name {
        alert.source = Some(name);
    }
}

fn derive_area(alert: &mut Alert, _: &DeriveContext) {
    let names: Vec<&str> = alert
        .locations
        .iter()
        .filter_map(Linked::populated)
        .filter_map(|feature| feature.name.as_deref())
        .filter(|name| !name.trim().is_empty())
        .collect();

    if !names.is_empty() {
        alert.area = names.join(", ");
    }
}

impl Document for Alert {
    const NATURAL_KEY: &'static [&'static str] = &["source", "number", "category", "event"];
    const UNIQUE: &'static [&'static str] = &[];
    const SEARCHABLE: &'static [&'static str] = &[
        "source",
        "number",
        "event",
        "headline",
        "description",
        "instruction",
        "area",
    ];
    const KEPT_ON_REPLACE: &'static [&'static str] = &["number", "reportedAt"];

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn references(&self) -> Vec<Uuid> {
        self.agency.iter().map(Linked::id).collect()
    }

    fn normalize(&mut self) {
        self.source = trimmed(self.source.take()).map(|s| start_case(&s));
        self.number = self.number.trim().to_uppercase();
        self.event = self.event.trim().to_string();
        self.area = self.area.trim().to_string();
        self.headline = trimmed(self.headline.take());
        self.description = trimmed(self.description.take());
        self.instruction = trimmed(self.instruction.take());
        self.url = trimmed(self.url.take());
    }

    fn derive(&mut self, ctx: &DeriveContext) {
        for step in DERIVATIONS {
            step(self, ctx);
        }
    }

    fn depopulate(&mut self) {
        if let Some(agency) = self.agency.as_mut() {
            agency.depopulate();
        }
        for location in self.locations.iter_mut() {
            location.depopulate();
        }
    }

    fn campaign(&self) -> Option<Campaign> {
        let subject = self
            .headline
            .clone()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| self.event.clone());

        let body = [self.description.as_deref(), self.instruction.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<&str>>()
            .join("\n\n");

        Some(Campaign {
            subject,
            body,
            alert: self.id,
            reference: Some(self.number.clone()),
        })
    }
}

impl Alert {
    /// Projects the alert onto the CAP message layout.
    pub fn to_cap(&self) -> CapAlert {
        let agency = self.agency.as_ref().and_then(Linked::populated);

        let source = agency.and_then(|agency| {
            Some(SourceInfo {
                name: agency.name.clone()?,
                phone: agency.mobile.clone()?,
                email: agency.email.clone()?,
                website: agency.website.clone(),
            })
        });

        let mut message = Message {
            status: self.status,
            msg_type: self.msg_type,
            scope: self.scope,
            headline: self.headline.clone(),
            instruction: self.instruction.clone(),
            website: self.url.clone(),
            ..Default::default()
        };
        message.normalize();

        CapAlert {
            identifier: self.number.clone(),
            sender: self.source.clone(),
            sent: self
                .reported_at
                .or(self.created_at)
                .unwrap_or_else(Utc::now),
            message,
            info: EventInfo {
                code: None,
                name: self.event.clone(),
                category: self.category,
                description: self.description.clone(),
                urgency: self.urgency,
                severity: self.severity,
                certainty: self.certainty,
                response: self.response,
            },
            area: AreaInfo {
                description: Some(self.area.clone()).filter(|a| !a.is_empty()),
                geometry: self.geometry.clone(),
                centroid: self.centroid.clone(),
                altitude: None,
                ceiling: None,
            },
            resources: self.resources.clone(),
            source,
            onset: self.expected_at,
            expires: self.expired_at,
        }
    }
}
