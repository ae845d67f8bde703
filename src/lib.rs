pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod gateway;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

pub use app::{Page, VitibrasilService};
pub use config::Settings;
pub use domain::Dataset;
pub use error::{IngestError, Result};
