// Data pipeline: ingestion, processing, and the orchestrator tying them to the cache

pub mod ingestion;
pub mod orchestrator;
pub mod processing;

pub use orchestrator::{DatasetRequest, IngestPipeline};
