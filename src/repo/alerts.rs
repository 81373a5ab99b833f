use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{decode, Populate};
use crate::db::{Collection, DocumentStore};
use crate::error::ModelError;
use crate::models::{Alert, AlertSource, Linked};

/// Resolves `agency` on alerts against the alert source collection.
pub struct AgencyResolver {
    store: Arc<dyn DocumentStore>,
    sources: Collection,
}

impl AgencyResolver {
    pub fn new(store: Arc<dyn DocumentStore>, sources: Collection) -> Self {
        Self { store, sources }
    }
}

#[async_trait]
impl Populate<Alert> for AgencyResolver {
    async fn populate(&self, alert: &mut Alert) -> Result<(), ModelError> {
        let Some(id) = alert.agency.as_ref().map(Linked::id) else {
            return Ok(());
        };

        match self.store.find_by_id(&self.sources, id, false).await? {
            Some(record) => {
                let source: AlertSource = decode(record)?;
                alert.agency = source.agency().map(Linked::Populated);
            }
            None => debug!("Agency {} not found, keeping reference", id),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Document;
    use crate::repo::Model;
    use crate::seed::SeedSource;
    use serde_json::json;
    use uuid::Uuid;

    fn models() -> (Model<AlertSource>, Model<Alert>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let seeds = SeedSource::new("/nonexistent", "none");
        let sources =
            Model::<AlertSource>::new("AlertSource", store.clone(), "alertsources", seeds.clone())
                .unwrap();
        let resolver = AgencyResolver::new(store.clone(), sources.collection().clone());
        let alerts = Model::<Alert>::new("Alert", store, "alerts", seeds)
            .unwrap()
            .with_populator(Arc::new(resolver));
        (sources, alerts)
    }

    #[tokio::test]
    async fn agency_is_populated_and_names_the_source() {
        let (sources, alerts) = models();
        let tma = sources
            .post(json!({
                "name": "Tanzania Meteorological Agency",
                "mobile": "255765222333",
                "email": "info@meteo.go.tz",
                "url": "https://www.meteo.go.tz/feeds/alerts.xml",
                "website": "https://www.meteo.go.tz"
            }))
            .await
            .unwrap();
        let agency = tma.id.unwrap();

        let alert = alerts
            .post(json!({
                "agency": agency,
                "event": "Strong Winds",
                "area": "Dar es salaam",
                "source": "someone else"
            }))
            .await
            .unwrap();

        assert_eq!(alert.source.as_deref(), Some("Tanzania Meteorological Agency"));
        let populated = alert.agency.as_ref().and_then(Linked::populated).unwrap();
        assert_eq!(populated.email.as_deref(), Some("info@meteo.go.tz"));

        let stored = alerts
            .store()
            .find_by_id(alerts.collection(), alert.id.unwrap(), false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.doc["agency"], json!(agency));
    }

    #[tokio::test]
    async fn unknown_agency_stays_a_reference() {
        let (_, alerts) = models();
        let agency = Uuid::new_v4();
        let alert = alerts
            .post(json!({ "agency": agency, "event": "Flood", "area": "Ilala" }))
            .await
            .unwrap();
        assert_eq!(alert.agency, Some(Linked::Id(agency)));
        assert_eq!(alert.references(), vec![agency]);
    }

    #[tokio::test]
    async fn alerts_hard_delete() {
        let (_, alerts) = models();
        let id = alerts
            .post(json!({ "event": "Flood", "area": "Ilala" }))
            .await
            .unwrap()
            .id
            .unwrap();

        let deleted = alerts.del(id).await.unwrap();
        assert!(deleted.deleted_at.is_none());
        assert!(matches!(alerts.del(id).await, Err(ModelError::NotFound)));
        assert!(alerts
            .store()
            .find_by_id(alerts.collection(), id, true)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn patch_recomputes_color() {
        let (_, alerts) = models();
        let created = alerts
            .post(json!({ "event": "Flood", "area": "Ilala", "severity": "Minor" }))
            .await
            .unwrap();
        assert_eq!(created.color, "#88E729");

        let patched = alerts
            .patch(created.id.unwrap(), json!({ "severity": "Extreme" }))
            .await
            .unwrap();
        assert_eq!(patched.color, "#D72E29");
        assert_eq!(patched.number, created.number);
    }

    #[tokio::test]
    async fn upsert_by_natural_key_merges_payload() {
        let (_, alerts) = models();
        let created = alerts
            .post(json!({
                "source": "tanzania meteorological agency",
                "number": "eq-2018-000033-tza",
                "event": "Earthquake",
                "area": "Mbeya",
                "severity": "Moderate"
            }))
            .await
            .unwrap();

        let upserted = alerts
            .upsert(json!({
                "source": "Tanzania Meteorological Agency",
                "number": "EQ-2018-000033-TZA",
                "severity": "Severe",
                "instruction": "Stay away from damaged buildings"
            }))
            .await
            .unwrap();

        assert_eq!(upserted.id, created.id);
        assert_eq!(upserted.severity, crate::models::constants::Severity::Severe);
        assert_eq!(upserted.color, "#FE9901");
        assert_eq!(upserted.area, "Mbeya");
        assert!(upserted.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn upsert_by_id_sets_given_fields_and_keeps_the_rest() {
        let (_, alerts) = models();
        let created = alerts
            .post(json!({
                "event": "Flood",
                "area": "Jangwani",
                "description": "old",
                "instruction": "keep"
            }))
            .await
            .unwrap();
        let id = created.id.unwrap();

        let upserted = alerts
            .upsert(json!({ "_id": id, "description": "new" }))
            .await
            .unwrap();

        assert_eq!(upserted.id, Some(id));
        assert_eq!(upserted.description.as_deref(), Some("new"));
        assert_eq!(upserted.instruction.as_deref(), Some("keep"));
        assert_eq!(upserted.number, created.number);
        assert_eq!(upserted.reported_at, created.reported_at);
        assert_eq!(alerts.get(Default::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn put_keeps_generated_number_and_reported_at() {
        let (_, alerts) = models();
        let created = alerts
            .post(json!({ "event": "Flood", "area": "Ilala", "instruction": "Move uphill" }))
            .await
            .unwrap();
        let id = created.id.unwrap();

        let replaced = alerts
            .put(id, json!({ "event": "Flood", "area": "Temeke" }))
            .await
            .unwrap();
        assert_eq!(replaced.number, created.number);
        assert_eq!(replaced.reported_at, created.reported_at);
        assert_eq!(replaced.area, "Temeke");
        assert!(replaced.instruction.is_none());

        let renumbered = alerts
            .put(id, json!({ "event": "Flood", "area": "Temeke", "number": "fl-2024-001" }))
            .await
            .unwrap();
        assert_eq!(renumbered.number, "FL-2024-001");
        assert_eq!(renumbered.reported_at, created.reported_at);
    }

    #[tokio::test]
    async fn upsert_matches_on_present_key_fields_only() {
        let (_, alerts) = models();
        alerts
            .upsert(json!({ "event": "Flood", "area": "Ilala" }))
            .await
            .unwrap();
        let matched = alerts
            .upsert(json!({ "event": "Flood", "area": "Kinondoni" }))
            .await
            .unwrap();
        assert_eq!(matched.area, "Kinondoni");

        let created = alerts
            .upsert(json!({ "event": "Flood", "category": "Met", "area": "Temeke" }))
            .await
            .unwrap();
        assert_ne!(created.id, matched.id);

        let err = alerts.upsert(json!({ "area": "Ubungo" })).await.unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));

        assert_eq!(alerts.get(Default::default()).await.unwrap().total, 2);
    }
}
