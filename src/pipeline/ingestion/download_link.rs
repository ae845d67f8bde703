//! Finding the current download link on a dataset landing page.

use crate::constants::{DOWNLOAD_LINK_SELECTOR, DOWNLOAD_LINK_TOKEN};
use crate::error::{IngestError, Result};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{Html, Selector};

static FOOTER_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(DOWNLOAD_LINK_SELECTOR).expect("valid footer link selector"));

/// Extract the download URL from a landing page body.
///
/// The link is the footer anchor whose text mentions "download" in any case.
/// Relative hrefs resolve against the scheme and host of `landing_url`.
pub fn extract_download_link(html: &str, landing_url: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let href = document
        .select(&FOOTER_LINK)
        .find(|a| {
            a.text()
                .collect::<String>()
                .to_uppercase()
                .contains(DOWNLOAD_LINK_TOKEN)
        })
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or_else(|| IngestError::DownloadLinkNotFound {
            url: landing_url.to_string(),
        })?;

    absolutize(href, landing_url)
}

fn absolutize(href: &str, landing_url: &str) -> Result<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Ok(href.to_string());
    }
    let origin = Url::parse(landing_url)
        .map_err(|e| IngestError::Config(format!("invalid landing URL {}: {}", landing_url, e)))?
        .origin()
        .ascii_serialization();
    if href.starts_with('/') {
        Ok(format!("{}{}", origin, href))
    } else {
        Ok(format!("{}/{}", origin, href))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDING: &str = "http://vitibrasil.cnpuv.embrapa.br/index.php?opcao=opt_02";

    fn page(anchors: &str) -> String {
        format!(
            "<html><body><table><tr><td>{}</td></tr></table></body></html>",
            anchors
        )
    }

    #[test]
    fn test_relative_href_resolves_against_site_root() {
        let html = page(r#"<a href="download/Producao.csv" class="footer_content"><span class="spn_small">DOWNLOAD</span></a>"#);
        let link = extract_download_link(&html, LANDING).unwrap();
        assert_eq!(link, "http://vitibrasil.cnpuv.embrapa.br/download/Producao.csv");
    }

    #[test]
    fn test_root_relative_and_absolute_hrefs() {
        let html = page(r#"<a class="footer_content" href="/download/Comercio.csv"><span>Download</span></a>"#);
        assert_eq!(
            extract_download_link(&html, LANDING).unwrap(),
            "http://vitibrasil.cnpuv.embrapa.br/download/Comercio.csv"
        );

        let html = page(r#"<a class="footer_content" href="https://mirror.test/ExpVinho.csv">download</a>"#);
        assert_eq!(
            extract_download_link(&html, LANDING).unwrap(),
            "https://mirror.test/ExpVinho.csv"
        );
    }

    #[test]
    fn test_skips_footer_links_without_download_text() {
        let html = page(
            r#"<a class="footer_content" href="sobre.php">Sobre</a>
               <a class="footer_content" href="download/ImpVinhos.csv"><span>DOWNLOAD</span></a>"#,
        );
        let link = extract_download_link(&html, LANDING).unwrap();
        assert!(link.ends_with("/download/ImpVinhos.csv"));
    }

    #[test]
    fn test_missing_link_is_typed_error() {
        let html = page(r#"<a href="download/Producao.csv">DOWNLOAD</a>"#);
        let err = extract_download_link(&html, LANDING).unwrap_err();
        assert!(matches!(err, IngestError::DownloadLinkNotFound { url } if url == LANDING));
    }
}
