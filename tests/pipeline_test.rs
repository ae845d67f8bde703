use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::Mutex;

use vitibrasil_ingest::app::ports::{HttpClientPort, HttpGetResult};
use vitibrasil_ingest::domain::{ImportationRecord, ProductionCategory, ProductionRecord};
use vitibrasil_ingest::error::Unavailable;
use vitibrasil_ingest::gateway::CacheStore;
use vitibrasil_ingest::pipeline::ingestion::{
    BreakerSettings, CircuitBreaker, CircuitState, RetryPolicy, SourceFetcher,
};
use vitibrasil_ingest::pipeline::{DatasetRequest, IngestPipeline};
use vitibrasil_ingest::{Dataset, IngestError};

const BASE_URL: &str = "http://vitibrasil.test/index.php";
const PRODUCTION_FILE: &str = "http://vitibrasil.test/download/Producao.csv";

/// In-process HTTP double: fixed routes, every request recorded.
#[derive(Default)]
struct FakeHttp {
    routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeHttp {
    async fn route(&self, url: &str, status: u16, body: &[u8]) {
        self.routes
            .lock()
            .await
            .insert(url.to_string(), (status, body.to_vec()));
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl HttpClientPort for FakeHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult, String> {
        self.calls.lock().await.push(url.to_string());
        match self.routes.lock().await.get(url) {
            Some((status, body)) => Ok(HttpGetResult {
                status: *status,
                bytes: body.clone(),
                content_type: "text/plain".to_string(),
                content_length: body.len() as u64,
                last_modified: None,
            }),
            None => Err(format!("connection refused: {}", url)),
        }
    }
}

async fn production_site() -> Arc<FakeHttp> {
    let http = Arc::new(FakeHttp::default());
    http.route(
        &Dataset::Production.landing_url(BASE_URL),
        200,
        include_bytes!("resources/landing_production.html"),
    )
    .await;
    http.route(PRODUCTION_FILE, 200, include_bytes!("resources/Producao.csv"))
        .await;
    http
}

fn pipeline(http: Arc<FakeHttp>, cache_root: &std::path::Path) -> IngestPipeline {
    let breaker = CircuitBreaker::new("production", BreakerSettings::default());
    let retry = RetryPolicy {
        attempts: 3,
        backoff: Duration::from_secs(2),
    };
    IngestPipeline::new(CacheStore::new(cache_root), SourceFetcher::new(http, breaker, retry))
}

fn production_request() -> DatasetRequest {
    DatasetRequest::for_dataset(Dataset::Production, BASE_URL, 30)
}

fn set_age(path: &std::path::Path, days: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60))
        .unwrap();
}

#[tokio::test]
async fn test_cache_miss_fetches_normalizes_and_writes_cache() {
    let dir = TempDir::new().unwrap();
    let http = production_site().await;
    let pipeline = pipeline(http.clone(), dir.path());

    let records: Vec<ProductionRecord> = pipeline.run(&production_request()).await.unwrap();

    assert_eq!(
        http.calls().await,
        vec![Dataset::Production.landing_url(BASE_URL), PRODUCTION_FILE.to_string()]
    );
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|r| r.control.contains('_')));

    let first = &records[0];
    assert_eq!(first.id, 2);
    assert_eq!(first.year, 2021);
    assert_eq!(first.production, 139320884.0);
    assert_eq!(first.category, Some(ProductionCategory::VinhoDeMesa));

    let juice_2022 = records
        .iter()
        .find(|r| r.category == Some(ProductionCategory::Suco) && r.year == 2022)
        .unwrap();
    assert_eq!(juice_2022.production, 15500.5);
    assert_eq!(juice_2022.product, "Suco de uva integral");

    // "*" and "nd" never surface as records
    assert!(!records
        .iter()
        .any(|r| r.control == "vm_Branco" && r.year == 2023));

    let path = pipeline.cache().locate(&production_request().source_url);
    assert!(pipeline.cache().exists(&path));
}

#[tokio::test]
async fn test_fresh_cache_is_served_without_fetching() {
    let dir = TempDir::new().unwrap();
    let http = production_site().await;
    let pipeline = pipeline(http.clone(), dir.path());
    let request = production_request();

    let fetched: Vec<ProductionRecord> = pipeline.run(&request).await.unwrap();
    let path = pipeline.cache().locate(&request.source_url);
    set_age(&path, 5);

    let cached: Vec<ProductionRecord> = pipeline.run(&request).await.unwrap();
    assert_eq!(cached, fetched);
    assert_eq!(http.calls().await.len(), 2);
}

#[tokio::test]
async fn test_expired_cache_is_refetched_and_overwritten() {
    let dir = TempDir::new().unwrap();
    let http = production_site().await;
    let pipeline = pipeline(http.clone(), dir.path());
    let request = production_request();

    let _: Vec<ProductionRecord> = pipeline.run(&request).await.unwrap();
    let path = pipeline.cache().locate(&request.source_url);
    set_age(&path, 40);
    assert!(pipeline.cache().is_expired(&path, 30));

    // The site has published a new file since
    http.route(
        PRODUCTION_FILE,
        200,
        b"id;control;produto;2024\n9;VM_Rosado;Rosado;42\n",
    )
    .await;

    let refreshed: Vec<ProductionRecord> = pipeline.run(&request).await.unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].year, 2024);
    assert_eq!(http.calls().await.len(), 4);

    assert!(!pipeline.cache().is_expired(&path, 30));
    let on_disk: Vec<ProductionRecord> = pipeline.cache().load(&path, b';').unwrap();
    assert_eq!(on_disk, refreshed);
}

#[tokio::test]
async fn test_unreadable_cache_entry_falls_back_to_source() {
    let dir = TempDir::new().unwrap();
    let http = production_site().await;
    let pipeline = pipeline(http.clone(), dir.path());
    let request = production_request();

    let path = pipeline.cache().locate(&request.source_url);
    std::fs::write(&path, "garbage;header\n1;2\n").unwrap();

    let records: Vec<ProductionRecord> = pipeline.run(&request).await.unwrap();
    assert_eq!(records.len(), 8);
    assert_eq!(http.calls().await.len(), 2);
}

#[tokio::test]
async fn test_cache_write_failure_still_returns_records() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();

    let http = production_site().await;
    let pipeline = pipeline(http, &blocker.join("cache"));
    let records: Vec<ProductionRecord> = pipeline.run(&production_request()).await.unwrap();
    assert_eq!(records.len(), 8);
}

#[tokio::test]
async fn test_missing_download_link_is_fatal() {
    let dir = TempDir::new().unwrap();
    let http = Arc::new(FakeHttp::default());
    http.route(
        &Dataset::Production.landing_url(BASE_URL),
        200,
        b"<html><body><p>Manutencao</p></body></html>",
    )
    .await;
    let pipeline = pipeline(http, dir.path());

    let err = pipeline
        .run::<ProductionRecord>(&production_request())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::DownloadLinkNotFound { .. }));
}

#[tokio::test]
async fn test_unknown_category_aborts_invocation() {
    let dir = TempDir::new().unwrap();
    let http = production_site().await;
    http.route(
        PRODUCTION_FILE,
        200,
        b"id;control;produto;2020\n1;VM_Tinto;Tinto;5\n2;XX_TOTAL;Total;5\n",
    )
    .await;
    let pipeline = pipeline(http, dir.path());

    let err = pipeline
        .run::<ProductionRecord>(&production_request())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidCategoryCode { code } if code == "XX"));
    // Nothing was cached for a failed batch
    let path = pipeline.cache().locate(&production_request().source_url);
    assert!(!pipeline.cache().exists(&path));
}

#[tokio::test(start_paused = true)]
async fn test_failing_upstream_opens_circuit_and_fails_fast() {
    let dir = TempDir::new().unwrap();
    let http = Arc::new(FakeHttp::default());
    http.route(&Dataset::Production.landing_url(BASE_URL), 500, b"")
        .await;
    let pipeline = pipeline(http.clone(), dir.path());
    let request = production_request();

    let err = pipeline.run::<ProductionRecord>(&request).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::UpstreamUnavailable { reason: Unavailable::Status(500), .. }
    ));
    assert_eq!(http.calls().await.len(), 3);
    assert_eq!(pipeline.fetcher().breaker().state().await, CircuitState::Open);

    // Within the reset window: refused without touching the network
    let err = pipeline.run::<ProductionRecord>(&request).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(http.calls().await.len(), 3);

    // After the window one probe goes out; the site is back
    tokio::time::advance(Duration::from_secs(10)).await;
    http.route(
        &Dataset::Production.landing_url(BASE_URL),
        200,
        include_bytes!("resources/landing_production.html"),
    )
    .await;
    http.route(PRODUCTION_FILE, 200, include_bytes!("resources/Producao.csv"))
        .await;
    let records = pipeline.run::<ProductionRecord>(&request).await.unwrap();
    assert_eq!(records.len(), 8);
    assert_eq!(http.calls().await.len(), 5);
    assert_eq!(pipeline.fetcher().breaker().state().await, CircuitState::Closed);
}

#[tokio::test]
async fn test_importation_sums_split_year_columns() {
    let dir = TempDir::new().unwrap();
    let http = Arc::new(FakeHttp::default());
    http.route(
        &Dataset::Importation.landing_url(BASE_URL),
        200,
        include_bytes!("resources/landing_importation.html"),
    )
    .await;
    http.route(
        "http://vitibrasil.test/download/ImpVinhos.csv",
        200,
        include_bytes!("resources/ImpVinhos.csv"),
    )
    .await;
    let breaker = CircuitBreaker::new("importation", BreakerSettings::default());
    let pipeline = IngestPipeline::new(
        CacheStore::new(dir.path()),
        SourceFetcher::new(http, breaker, RetryPolicy::default()),
    );
    let request = DatasetRequest::for_dataset(Dataset::Importation, BASE_URL, 30);

    let records: Vec<ImportationRecord> = pipeline.run(&request).await.unwrap();
    let summary: Vec<(&str, i32, f64)> = records
        .iter()
        .map(|r| (r.country.as_str(), r.year, r.importation))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Africa do Sul", 2022, 2255583.0),
            ("Alemanha", 2022, 1299551.0),
            ("Africa do Sul", 2023, 0.0),
            ("Alemanha", 2023, 2100.0),
        ]
    );

    // Cache entries keep the dataset's tab delimiter
    let path = pipeline.cache().locate(&request.source_url);
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with("id\tcountry\tyear\timportation"));
}
