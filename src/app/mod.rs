pub mod ports;
pub mod service;

pub use service::{CacheStatus, Page, VitibrasilService};
