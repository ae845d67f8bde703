use crate::domain::{Dataset, DatasetRecord};
use crate::error::Result;
use crate::gateway::cache_fs::CacheStore;
use crate::observability::metrics;
use crate::pipeline::ingestion::fetcher::SourceFetcher;
use crate::pipeline::processing::normalize::normalize_bytes;
use tracing::{info, instrument, warn};

/// What the caller wants ingested: the landing page of one dataset and the
/// delimiter its file (and cache entry) uses.
#[derive(Clone, Debug)]
pub struct DatasetRequest {
    pub source_url: String,
    pub delimiter: u8,
    pub max_age_days: u64,
}

impl DatasetRequest {
    pub fn for_dataset(dataset: Dataset, base_url: &str, max_age_days: u64) -> Self {
        Self {
            source_url: dataset.landing_url(base_url),
            delimiter: dataset.delimiter(),
            max_age_days,
        }
    }
}

/// Cache check, then fetch, normalize and cache write on a miss.
pub struct IngestPipeline {
    cache: CacheStore,
    fetcher: SourceFetcher,
}

impl IngestPipeline {
    pub fn new(cache: CacheStore, fetcher: SourceFetcher) -> Self {
        Self { cache, fetcher }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn fetcher(&self) -> &SourceFetcher {
        &self.fetcher
    }

    /// Records for `request`, unpaginated. A fresh cache entry is returned as
    /// stored; otherwise the source is fetched and normalized. Fetch failures
    /// propagate. A failed cache write is logged and the fresh records are
    /// still returned.
    #[instrument(skip(self, request), fields(url = %request.source_url))]
    pub async fn run<R: DatasetRecord>(&self, request: &DatasetRequest) -> Result<Vec<R>> {
        let path = self.cache.locate(&request.source_url);

        if self.cache.exists(&path) && !self.cache.is_expired(&path, request.max_age_days) {
            match self.cache.load::<R>(&path, request.delimiter) {
                Ok(records) => {
                    metrics::cache::hit();
                    info!(path = %path.display(), records = records.len(), "Serving from cache");
                    return Ok(records);
                }
                Err(e) => {
                    metrics::cache::read_error();
                    warn!(error = %e, "Cache entry unreadable, fetching from source");
                }
            }
        } else {
            metrics::cache::miss();
            info!(path = %path.display(), "Cache miss or expired entry");
        }

        let download_url = self.fetcher.resolve_download_link(&request.source_url).await?;
        let bytes = self.fetcher.fetch(&download_url).await?;
        let records = normalize_bytes::<R>(&bytes, request.delimiter)?;

        match self.cache.save(&request.source_url, &records, request.delimiter) {
            Ok(saved) => info!(path = %saved.display(), records = records.len(), "Cache entry written"),
            Err(e) => {
                metrics::cache::write_error();
                warn!(error = %e, "Cache write failed, returning fresh records anyway");
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_for_dataset() {
        let req = DatasetRequest::for_dataset(Dataset::Exportation, "http://site.test/index.php", 30);
        assert_eq!(req.source_url, "http://site.test/index.php?opcao=opt_06");
        assert_eq!(req.delimiter, b'\t');
        assert_eq!(req.max_age_days, 30);
    }
}
