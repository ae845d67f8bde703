use super::circuit_breaker::{CircuitBreaker, CircuitError};
use super::download_link::extract_download_link;
use crate::app::ports::HttpClientPort;
use crate::error::{IngestError, Result};
use crate::observability::metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts per request, the first included.
    pub attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(2000),
        }
    }
}

/// Retrieves landing pages and source files from the upstream site.
///
/// Every network attempt goes through the circuit breaker; an open circuit
/// ends the retry loop at once.
pub struct SourceFetcher {
    http: Arc<dyn HttpClientPort>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl SourceFetcher {
    pub fn new(http: Arc<dyn HttpClientPort>, breaker: CircuitBreaker, retry: RetryPolicy) -> Self {
        Self { http, breaker, retry }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Load the landing page and pull the current download URL out of it.
    pub async fn resolve_download_link(&self, landing_url: &str) -> Result<String> {
        let body = self.get(landing_url).await?;
        let html = String::from_utf8_lossy(&body);
        let link = extract_download_link(&html, landing_url)?;
        info!(landing_url, download_url = %link, "Resolved download link");
        Ok(link)
    }

    /// Fetch the raw bytes of a source file.
    pub async fn fetch(&self, download_url: &str) -> Result<Vec<u8>> {
        let bytes = self.get(download_url).await?;
        info!(url = download_url, bytes = bytes.len(), "Fetched source file");
        Ok(bytes)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.get_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(
                        url,
                        error = %e,
                        "Request attempt {}/{} failed, retrying in {:?}",
                        attempt,
                        attempts,
                        self.retry.backoff
                    );
                    metrics::source::retry();
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let result = match self.breaker.call(self.request(url)).await {
            Ok(bytes) => Ok(bytes),
            Err(CircuitError::Open) => {
                debug!(url, circuit = self.breaker.name(), "Circuit open, request not sent");
                Err(IngestError::circuit_open(url))
            }
            Err(CircuitError::Inner(e)) => Err(e),
        };
        match &result {
            Ok(bytes) => {
                metrics::source::request_success();
                metrics::source::request_duration(started.elapsed().as_secs_f64());
                metrics::source::payload_bytes(bytes.len());
            }
            Err(_) => metrics::source::request_error(),
        }
        result
    }

    async fn request(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.http.get(url).await.map_err(|message| IngestError::Transport {
            url: url.to_string(),
            message,
        })?;
        debug!(
            url,
            status = resp.status,
            content_type = %resp.content_type,
            content_length = resp.content_length,
            last_modified = resp.last_modified.as_deref().unwrap_or("-"),
            "Upstream response"
        );
        if !resp.is_ok() {
            return Err(IngestError::upstream_status(url, resp.status));
        }
        Ok(resp.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::error::Unavailable;
    use crate::pipeline::ingestion::circuit_breaker::{BreakerSettings, CircuitState};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    // Replays scripted answers and records every URL requested
    struct ScriptedHttp {
        answers: Mutex<Vec<std::result::Result<HttpGetResult, String>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl HttpClientPort for ScriptedHttp {
        async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, String> {
            self.calls.lock().await.push(url.to_string());
            let mut answers = self.answers.lock().await;
            if answers.is_empty() {
                return Err("no scripted answer".into());
            }
            answers.remove(0)
        }
    }

    fn status(code: u16, body: &str) -> std::result::Result<HttpGetResult, String> {
        Ok(HttpGetResult {
            status: code,
            bytes: body.as_bytes().to_vec(),
            content_type: "text/html".into(),
            content_length: body.len() as u64,
            last_modified: None,
        })
    }

    fn fetcher(
        answers: Vec<std::result::Result<HttpGetResult, String>>,
        attempts: u32,
    ) -> (SourceFetcher, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let http = Arc::new(ScriptedHttp {
            answers: Mutex::new(answers),
            calls: calls.clone(),
        });
        let breaker = CircuitBreaker::new("production", BreakerSettings::default());
        let retry = RetryPolicy {
            attempts,
            backoff: Duration::from_secs(2),
        };
        (SourceFetcher::new(http, breaker, retry), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transport_errors_then_succeeds() {
        let (fetcher, calls) = fetcher(vec![Err("reset".into()), status(200, "a;b")], 3);
        let bytes = fetcher.fetch("http://site.test/f.csv").await.unwrap();
        assert_eq!(bytes, b"a;b");
        assert_eq!(calls.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_200_surfaces_as_upstream_unavailable() {
        let (fetcher, calls) = fetcher(vec![status(503, "")], 1);
        let err = fetcher.fetch("http://site.test/f.csv").await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::UpstreamUnavailable { reason: Unavailable::Status(503), .. }
        ));
        assert_eq!(calls.lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_surfaces_as_transport() {
        let (fetcher, calls) = fetcher(vec![Err("connection reset".into())], 1);
        let err = fetcher.fetch("http://site.test/f.csv").await.unwrap_err();
        assert!(matches!(
            &err,
            IngestError::Transport { url, message }
                if url == "http://site.test/f.csv" && message == "connection reset"
        ));
        assert!(err.is_retryable());
        assert_eq!(calls.lock().await.len(), 1);

        // One failure counted: two more open the circuit
        let _ = fetcher.fetch("http://site.test/f.csv").await;
        assert_eq!(fetcher.breaker().state().await, CircuitState::Closed);
        let _ = fetcher.fetch("http://site.test/f.csv").await;
        assert_eq!(fetcher.breaker().state().await, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_stops_retry_loop_without_network() {
        let answers = vec![Err("down".into()), Err("down".into()), Err("down".into())];
        let (fetcher, calls) = fetcher(answers, 5);
        let err = fetcher.fetch("http://site.test/f.csv").await.unwrap_err();
        // Three failures open the circuit; the fourth attempt is refused locally
        assert!(err.is_circuit_open());
        assert_eq!(calls.lock().await.len(), 3);
        assert_eq!(fetcher.breaker().state().await, CircuitState::Open);

        let err = fetcher.fetch("http://site.test/f.csv").await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(calls.lock().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_download_link_reads_landing_page() {
        let html = r#"<a class="footer_content" href="download/Producao.csv"><span>DOWNLOAD</span></a>"#;
        let (fetcher, calls) = fetcher(vec![status(200, html)], 1);
        let link = fetcher
            .resolve_download_link("http://site.test/index.php?opcao=opt_02")
            .await
            .unwrap();
        assert_eq!(link, "http://site.test/download/Producao.csv");
        assert_eq!(calls.lock().await[0], "http://site.test/index.php?opcao=opt_02");
    }
}
