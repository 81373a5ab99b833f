//! CAP 1.2 sub-documents and the envelope an alert projects onto.
//!
//! See <http://docs.oasis-open.org/emergency/cap/v1.2/CAP-v1.2-os.html>.

use chrono::{DateTime, Utc};
use geojson::Geometry;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::constants::{Category, Certainty, MsgType, ResponseType, Scope, Severity, Status, Urgency};

/// The `<info>` block: what is happening and how bad it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct EventInfo {
    #[serde(alias = "eventCode", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(alias = "event")]
    #[validate(length(min = 1))]
    pub name: String,

    pub category: Category,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub urgency: Urgency,
    pub severity: Severity,
    pub certainty: Certainty,

    #[serde(alias = "responseType")]
    pub response: ResponseType,
}

/// Message handling: status, type and intended distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
#[validate(schema(function = "validate_message_scope"))]
pub struct Message {
    pub status: Status,

    #[serde(rename = "type", alias = "msgType")]
    pub msg_type: MsgType,

    pub scope: Scope,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    #[serde(alias = "web", skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub website: Option<String>,
}

fn validate_message_scope(message: &Message) -> Result<(), ValidationError> {
    let restricted = message.scope == Scope::Restricted;
    let has_restriction = message
        .restriction
        .as_deref()
        .is_some_and(|r| !r.trim().is_empty());

    if restricted && !has_restriction {
        let mut error = ValidationError::new("restriction_required");
        error.message = Some("restricted messages must describe their restriction".into());
        return Err(error);
    }
    Ok(())
}

impl Message {
    /// Lower-cases and trims addresses, dropping blanks.
    pub fn normalize(&mut self) {
        self.addresses = self
            .addresses
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
    }
}

/// The `<area>` block: where the alert applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
#[validate(schema(function = "validate_area_bounds"))]
pub struct AreaInfo {
    #[serde(alias = "areaDesc", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Geometry>,

    /// Feet above mean sea level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    /// Upper bound in feet; only meaningful together with `altitude`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceiling: Option<f64>,
}

fn validate_area_bounds(area: &AreaInfo) -> Result<(), ValidationError> {
    match (area.altitude, area.ceiling) {
        (None, Some(_)) => Err(ValidationError::new("ceiling_without_altitude")),
        (Some(altitude), Some(ceiling)) if ceiling < altitude => {
            Err(ValidationError::new("ceiling_below_altitude"))
        }
        _ => Ok(()),
    }
}

/// A supplemental file (image, audio, map) attached to an alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    #[serde(alias = "resourceDesc")]
    #[validate(length(min = 1))]
    pub description: String,

    #[serde(alias = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,

    #[serde(alias = "derefUri", skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub uri: Option<String>,
}

/// Contact details of the issuing party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceInfo {
    #[serde(alias = "source")]
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub phone: String,

    #[validate(email)]
    pub email: String,

    #[serde(alias = "sender", skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub website: Option<String>,
}

/// An alert laid out the way CAP consumers expect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CapAlert {
    pub identifier: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    pub sent: DateTime<Utc>,

    #[validate(nested)]
    pub message: Message,

    #[validate(nested)]
    pub info: EventInfo,

    #[validate(nested)]
    pub area: AreaInfo,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub resources: Vec<Resource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub source: Option<SourceInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}
