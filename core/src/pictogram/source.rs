/// Pictogram search and image endpoints
///
/// `PictogramSource` is the network seam of the provider; `ArasaacClient` talks to
/// the public ARASAAC API (https://arasaac.org). ARASAAC pictograms are licensed
/// CC BY-NC-SA 4.0 by the Government of Aragon, author Sergio Palao.
use crate::{PecsError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Query string appended to every image request
const IMAGE_PARAMS: &str = "download=false&plural=false&color=true";

/// Configuration for the ARASAAC client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArasaacConfig {
    /// API base (default: https://api.arasaac.org/v1)
    pub api_base: String,
    /// Timeout for search requests in milliseconds
    pub search_timeout_ms: u64,
    /// Timeout for image downloads in milliseconds
    pub image_timeout_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ArasaacConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("ARASAAC_API")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.arasaac.org/v1".to_string()),
            search_timeout_ms: 5_000,
            image_timeout_ms: 10_000,
            user_agent: format!("pecs-board/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// One keyword attached to a pictogram
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
}

/// A search result record as returned by the search endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictogramRecord {
    #[serde(rename = "_id")]
    pub id: u64,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

impl PictogramRecord {
    pub fn new(id: u64, keywords: &[&str]) -> Self {
        Self {
            id,
            keywords: keywords
                .iter()
                .map(|k| Keyword {
                    keyword: k.to_string(),
                    plural: None,
                })
                .collect(),
        }
    }

    pub fn keyword_strings(&self) -> Vec<String> {
        self.keywords.iter().map(|k| k.keyword.clone()).collect()
    }
}

/// Where pictogram search results and image bytes come from
#[async_trait]
pub trait PictogramSource: Send + Sync {
    /// Candidates for `term` in `lang`, best first. An empty list means the
    /// endpoint answered and had nothing; `Err` means no answer.
    async fn search(&self, lang: &str, term: &str) -> Result<Vec<PictogramRecord>>;

    /// Raw PNG bytes for a pictogram at an already-snapped resolution
    async fn fetch_image(&self, id: u64, resolution: u32) -> Result<Vec<u8>>;
}

/// Client for the ARASAAC REST API
pub struct ArasaacClient {
    config: ArasaacConfig,
    http_client: reqwest::Client,
}

impl ArasaacClient {
    pub fn new(config: ArasaacConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ArasaacConfig {
        &self.config
    }

    pub fn search_url(&self, lang: &str, term: &str) -> String {
        format!(
            "{}/pictograms/{}/search/{}",
            self.config.api_base.trim_end_matches('/'),
            urlencoding::encode(lang),
            urlencoding::encode(term)
        )
    }

    pub fn image_url(&self, id: u64, resolution: u32) -> String {
        format!(
            "{}/pictograms/{}?{}&resolution={}",
            self.config.api_base.trim_end_matches('/'),
            id,
            IMAGE_PARAMS,
            resolution
        )
    }
}

#[async_trait]
impl PictogramSource for ArasaacClient {
    async fn search(&self, lang: &str, term: &str) -> Result<Vec<PictogramRecord>> {
        let url = self.search_url(lang, term);
        debug!(target: "pictogram", url = %url, "Searching ARASAAC");

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(Duration::from_millis(self.config.search_timeout_ms))
            .send()
            .await
            .inspect_err(|e| {
                warn!(target: "pictogram", error = %e, "ARASAAC search request failed");
            })?;

        // ARASAAC answers 404 when nothing matches
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            warn!(target: "pictogram", status = %status, "ARASAAC search returned error");
            return Err(PecsError::NetworkError(format!(
                "search returned status {}",
                status
            )));
        }

        let body = response.text().await?;
        serde_json::from_str::<Vec<PictogramRecord>>(&body)
            .map_err(|e| PecsError::MalformedResponse(format!("search response: {}", e)))
    }

    async fn fetch_image(&self, id: u64, resolution: u32) -> Result<Vec<u8>> {
        let url = self.image_url(id, resolution);
        debug!(target: "pictogram", url = %url, "Downloading pictogram image");

        let response = self
            .http_client
            .get(&url)
            .timeout(Duration::from_millis(self.config.image_timeout_ms))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PecsError::NetworkError(format!(
                "image download returned status {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(PecsError::MalformedResponse("empty image body".into()));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ArasaacClient {
        ArasaacClient::new(ArasaacConfig {
            api_base: "https://api.arasaac.org/v1/".into(),
            ..ArasaacConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_search_url_encodes_term() {
        assert_eq!(
            client().search_url("sv", "tack så mycket"),
            "https://api.arasaac.org/v1/pictograms/sv/search/tack%20s%C3%A5%20mycket"
        );
    }

    #[test]
    fn test_image_url_template() {
        assert_eq!(
            client().image_url(2462, 300),
            "https://api.arasaac.org/v1/pictograms/2462?download=false&plural=false&color=true&resolution=300"
        );
    }

    #[test]
    fn test_record_parses_arasaac_shape() {
        let body = r#"[
            {"_id": 2462, "schematic": false, "keywords": [
                {"keyword": "apple", "plural": "apples", "type": 2},
                {"keyword": "fruit", "type": 2}
            ]},
            {"_id": 5, "keywords": []}
        ]"#;
        let records: Vec<PictogramRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 2462);
        assert_eq!(records[0].keyword_strings(), vec!["apple", "fruit"]);
        assert_eq!(records[0].keywords[0].plural.as_deref(), Some("apples"));
        assert!(records[1].keywords.is_empty());
    }

    #[test]
    fn test_record_without_id_is_malformed() {
        let body = r#"[{"keywords": []}]"#;
        assert!(serde_json::from_str::<Vec<PictogramRecord>>(body).is_err());
    }
}
