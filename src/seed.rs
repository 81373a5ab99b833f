//! Seed fixtures: JSON arrays of plain records kept next to the service.

use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::error::ModelError;

/// Where a model looks for its seeds: `<dir>/<stem>.json`.
#[derive(Debug, Clone)]
pub struct SeedSource {
    pub dir: PathBuf,
    pub stem: String,
}

impl SeedSource {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.stem))
    }

    /// Reads the fixture file. A missing file means there is nothing to seed.
    pub async fn load(&self) -> Result<Vec<Value>, ModelError> {
        let path = self.path();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No seed file at {}", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(ModelError::Seed(format!("{}: {}", path.display(), e))),
        };

        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Array(seeds)) => Ok(seeds),
            Ok(Value::Null) => Ok(Vec::new()),
            Ok(single @ Value::Object(_)) => Ok(vec![single]),
            Ok(_) => Err(ModelError::Seed(format!(
                "{}: expected an array of records",
                path.display()
            ))),
            Err(e) => Err(ModelError::Seed(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Drops nulls and deep-equal duplicates, keeping first occurrences in order.
pub fn compact(seeds: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(seeds.len());
    for seed in seeds {
        if !seed.is_null() && !unique.contains(&seed) {
            unique.push(seed);
        }
    }
    unique
}
