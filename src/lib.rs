use serde::Serialize;

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod notify;
pub mod repo;
pub mod seed;

pub use app::App;

/// Package metadata served at `/info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub license: &'static str,
    pub homepage: &'static str,
    pub repository: &'static str,
}

pub fn info() -> Info {
    Info {
        name: env!("CARGO_PKG_NAME"),
        description: env!("CARGO_PKG_DESCRIPTION"),
        version: env!("CARGO_PKG_VERSION"),
        license: env!("CARGO_PKG_LICENSE"),
        homepage: env!("CARGO_PKG_HOMEPAGE"),
        repository: env!("CARGO_PKG_REPOSITORY"),
    }
}
