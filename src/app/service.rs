use crate::app::ports::HttpClientPort;
use crate::config::Settings;
use crate::domain::{
    Dataset, DatasetRecord, ExportationRecord, ImportationRecord, MarketingRecord,
    ProcessingRecord, ProductionRecord,
};
use crate::error::{IngestError, Result};
use crate::gateway::cache_fs::CacheStore;
use crate::infra::http_client::ReqwestHttp;
use crate::pipeline::ingestion::{CircuitBreaker, CircuitState, SourceFetcher};
use crate::pipeline::orchestrator::{DatasetRequest, IngestPipeline};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Entry point for callers: one pipeline per dataset, each with its own
/// failure circuit shared by every concurrent caller of that dataset.
pub struct VitibrasilService {
    settings: Settings,
    production: IngestPipeline,
    processing: IngestPipeline,
    marketing: IngestPipeline,
    importation: IngestPipeline,
    exportation: IngestPipeline,
}

impl VitibrasilService {
    pub fn new(settings: Settings, http: Arc<dyn HttpClientPort>) -> Self {
        let cache = CacheStore::new(&settings.cache_folder);
        let build = |dataset: Dataset| {
            let breaker = CircuitBreaker::new(dataset.name(), settings.breaker_settings());
            let fetcher = SourceFetcher::new(http.clone(), breaker, settings.retry_policy());
            IngestPipeline::new(cache.clone(), fetcher)
        };
        Self {
            production: build(Dataset::Production),
            processing: build(Dataset::Processing),
            marketing: build(Dataset::Marketing),
            importation: build(Dataset::Importation),
            exportation: build(Dataset::Exportation),
            settings,
        }
    }

    /// Service backed by the real HTTP client.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let http = Arc::new(ReqwestHttp::new(settings.http_timeout())?);
        Ok(Self::new(settings, http))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn pipeline(&self, dataset: Dataset) -> &IngestPipeline {
        match dataset {
            Dataset::Production => &self.production,
            Dataset::Processing => &self.processing,
            Dataset::Marketing => &self.marketing,
            Dataset::Importation => &self.importation,
            Dataset::Exportation => &self.exportation,
        }
    }

    pub fn breaker(&self, dataset: Dataset) -> &CircuitBreaker {
        self.pipeline(dataset).fetcher().breaker()
    }

    pub fn request(&self, dataset: Dataset) -> DatasetRequest {
        DatasetRequest::for_dataset(dataset, &self.settings.base_url, self.settings.cache_max_days)
    }

    /// Records of `R` for `dataset`. The caller picks the record type that
    /// matches the dataset.
    pub async fn records<R: DatasetRecord>(&self, dataset: Dataset) -> Result<Vec<R>> {
        self.pipeline(dataset).run::<R>(&self.request(dataset)).await
    }

    pub async fn production(&self) -> Result<Vec<ProductionRecord>> {
        self.records(Dataset::Production).await
    }

    pub async fn processing(&self) -> Result<Vec<ProcessingRecord>> {
        self.records(Dataset::Processing).await
    }

    pub async fn marketing(&self) -> Result<Vec<MarketingRecord>> {
        self.records(Dataset::Marketing).await
    }

    pub async fn importation(&self) -> Result<Vec<ImportationRecord>> {
        self.records(Dataset::Importation).await
    }

    pub async fn exportation(&self) -> Result<Vec<ExportationRecord>> {
        self.records(Dataset::Exportation).await
    }

    /// Cache entry and circuit state of every dataset.
    pub async fn cache_status(&self) -> Vec<CacheStatus> {
        let mut out = Vec::with_capacity(Dataset::ALL.len());
        for dataset in Dataset::ALL {
            let pipeline = self.pipeline(dataset);
            let cache = pipeline.cache();
            let source_url = dataset.landing_url(&self.settings.base_url);
            let path = cache.locate(&source_url);
            out.push(CacheStatus {
                dataset: dataset.name(),
                exists: cache.exists(&path),
                modified_at: cache.modified_at(&path),
                age_days: cache.age(&path).map(|age| age.as_secs_f64() / 86_400.0),
                expired: cache.is_expired(&path, self.settings.cache_max_days),
                circuit: pipeline.fetcher().breaker().state().await,
                source_url,
                path,
            });
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub dataset: &'static str,
    pub source_url: String,
    pub path: PathBuf,
    pub exists: bool,
    pub modified_at: Option<DateTime<Utc>>,
    pub age_days: Option<f64>,
    pub expired: bool,
    pub circuit: CircuitState,
}

/// One page of records plus the size of the full result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub page: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Slice `records` to the 1-based `page`. A page past the end is empty.
    pub fn slice(records: Vec<T>, page: usize, page_size: usize) -> Result<Self> {
        if page == 0 || page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(IngestError::InvalidPage { page, page_size });
        }
        let total_rows = records.len();
        let start = (page - 1).saturating_mul(page_size);
        let items = records.into_iter().skip(start).take(page_size).collect();
        Ok(Self {
            page,
            page_size,
            total_rows,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slicing() {
        let page = Page::slice((1..=25).collect::<Vec<_>>(), 3, 10).unwrap();
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total_rows, 25);

        let past_end = Page::slice(vec![1, 2, 3], 5, 10).unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total_rows, 3);
    }

    #[test]
    fn test_page_bounds() {
        assert!(matches!(Page::slice(vec![1], 0, 10), Err(IngestError::InvalidPage { .. })));
        assert!(matches!(Page::slice(vec![1], 1, 0), Err(IngestError::InvalidPage { .. })));
        assert!(matches!(Page::slice(vec![1], 1, 101), Err(IngestError::InvalidPage { .. })));
        assert!(Page::slice(vec![1], 1, MAX_PAGE_SIZE).is_ok());
    }
}
