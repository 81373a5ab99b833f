//! An authority (agency) issuing alerts, e.g. a national meteorological service.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{start_case, Document, Identified};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertSource {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub id: Option<Uuid>,

    /// Human readable name of the issuing party, e.g. World Meteorological Organization.
    #[validate(length(min = 1))]
    pub name: String,

    /// Primary mobile phone number used to contact the party.
    #[validate(length(min = 1))]
    pub mobile: String,

    /// Primary email address used to contact the party.
    #[validate(email)]
    pub email: String,

    /// Primary feed url, e.g. https://www.acme.com/feeds/en/alerts/rss.xml
    #[validate(url)]
    pub url: String,

    /// Primary public website.
    #[validate(url)]
    pub website: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document for AlertSource {
    const NATURAL_KEY: &'static [&'static str] = &["name"];
    const UNIQUE: &'static [&'static str] = &["mobile", "email"];
    const SEARCHABLE: &'static [&'static str] = &["name", "mobile", "email", "url", "website"];
    const SOFT_DELETE: bool = true;

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn normalize(&mut self) {
        self.name = start_case(&self.name);
        self.mobile = self.mobile.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.url = self.url.trim().to_lowercase();
        self.website = self.website.trim().to_lowercase();
    }
}

/// The fields of an [`AlertSource`] carried by a populated alert `agency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Identified for Agency {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl AlertSource {
    /// The populated form of this source as referenced from an alert.
    pub fn agency(&self) -> Option<Agency> {
        self.id.map(|id| Agency {
            id,
            name: Some(self.name.clone()),
            mobile: Some(self.mobile.clone()),
            email: Some(self.email.clone()),
            website: Some(self.website.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tma() -> AlertSource {
        serde_json::from_value(json!({
            "name": "  tanzania meteorological  agency ",
            "mobile": " 255765222333 ",
            "email": "Info@Meteo.go.TZ",
            "url": "HTTPS://www.meteo.go.tz/feeds/alerts.xml",
            "website": "https://www.meteo.go.tz"
        }))
        .unwrap()
    }

    #[test]
    fn normalize_cases_and_trims_fields() {
        let mut source = tma();
        source.normalize();

        assert_eq!(source.name, "Tanzania Meteorological Agency");
        assert_eq!(source.mobile, "255765222333");
        assert_eq!(source.email, "info@meteo.go.tz");
        assert_eq!(source.url, "https://www.meteo.go.tz/feeds/alerts.xml");
        assert!(source.validate().is_ok());
    }

    #[test]
    fn missing_fields_fail_validation_per_field() {
        let source: AlertSource = serde_json::from_value(json!({})).unwrap();
        let errors = source.validate().unwrap_err();
        let fields = errors.field_errors();

        for field in ["name", "mobile", "email", "url", "website"] {
            assert!(fields.contains_key(field), "expected error on {field}");
        }
    }

    #[test]
    fn malformed_email_and_urls_are_rejected() {
        let mut source = tma();
        source.email = "not-an-email".into();
        source.website = "meteo".into();

        let errors = source.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("website"));
        assert!(!fields.contains_key("name"));
    }

    #[test]
    fn metadata_is_omitted_until_persisted() {
        let value = serde_json::to_value(tma()).unwrap();
        assert!(value.get("_id").is_none());
        assert!(value.get("createdAt").is_none());
        assert!(value.get("deletedAt").is_none());
    }

    #[test]
    fn agency_carries_contact_details() {
        let mut source = tma();
        source.normalize();
        source.id = Some(Uuid::new_v4());

        let agency = source.agency().unwrap();
        assert_eq!(agency.id, source.id.unwrap());
        assert_eq!(agency.name.as_deref(), Some("Tanzania Meteorological Agency"));
        assert_eq!(agency.email.as_deref(), Some("info@meteo.go.tz"));
    }
}
