use axum::Router;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::db::DocumentStore;
use crate::error::ModelError;
use crate::http;
use crate::models::{Alert, AlertSource};
use crate::notify::Notifier;
use crate::repo::{AgencyResolver, Model};
use crate::seed::SeedSource;

pub const ALERT_SOURCE_MODEL_NAME: &str = "AlertSource";

/// Both models wired over one store, ready to be served or seeded.
#[derive(Clone)]
pub struct App {
    pub alerts: Model<Alert>,
    pub sources: Model<AlertSource>,
    prefix: String,
}

impl App {
    pub async fn new(
        config: &AppConfig,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ModelError> {
        let sources = Model::<AlertSource>::new(
            ALERT_SOURCE_MODEL_NAME,
            store.clone(),
            &config.alert_source_collection_name,
            SeedSource::new(&config.seeds_path, &config.alert_source_seed),
        )?;

        let resolver = AgencyResolver::new(store.clone(), sources.collection().clone());
        let alerts = Model::<Alert>::new(
            &config.alert_model_name,
            store,
            &config.alert_collection_name,
            SeedSource::new(&config.seeds_path, &config.alert_seed),
        )?
        .with_populator(Arc::new(resolver))
        .with_notifier(notifier);

        sources.ensure_collection().await?;
        alerts.ensure_collection().await?;

        Ok(Self {
            alerts,
            sources,
            prefix: config.api_prefix(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn router(&self) -> Router {
        http::build_router(&self.prefix, self.alerts.clone(), self.sources.clone())
    }

    /// Seeds sources first so alerts can resolve their agencies.
    pub async fn seed(&self) -> Result<(), ModelError> {
        let sources = self.sources.seed(None).await?;
        let alerts = self.alerts.seed(None).await?;
        info!(
            "Seeding complete: {} source(s), {} alert(s)",
            sources.len(),
            alerts.len()
        );
        Ok(())
    }
}
