pub mod cache_fs;

pub use cache_fs::CacheStore;
