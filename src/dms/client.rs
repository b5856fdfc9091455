//! HTTP client for the Dead Man's Snitch REST API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::error::{DmsError, Result};
use super::types::{NewSnitch, Snitch};
use super::MonitorClient;

/// Production API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.deadmanssnitch.com/v1/";

/// Client for the Dead Man's Snitch API
///
/// Authenticates with HTTP basic auth, using the API key as user name and an
/// empty password.
pub struct DmsClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    /// Restricts listing to snitches carrying this tag
    list_tag: Option<String>,
}

impl DmsClient {
    /// Create a new client with a per-request timeout
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snitch-operator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(DmsError::Config(format!("invalid base URL: {base_url}")));
        }

        Ok(Self {
            http_client,
            base_url,
            api_key: api_key.into(),
            list_tag: None,
        })
    }

    /// Only consider snitches carrying `tag` when searching by name
    pub fn with_list_tag(mut self, tag: impl Into<String>) -> Self {
        self.list_tag = Some(tag.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DmsError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = Self::check_status(response).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DmsError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MonitorClient for DmsClient {
    #[instrument(skip(self, snitch), fields(name = %snitch.name))]
    async fn create(&self, snitch: &NewSnitch) -> Result<Snitch> {
        debug!("Creating snitch");
        let response = self
            .http_client
            .post(self.url("snitches"))
            .basic_auth(&self.api_key, Some(""))
            .json(snitch)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, token: &str) -> Result<bool> {
        debug!("Deleting snitch");
        let response = self
            .http_client
            .delete(self.url(&format!("snitches/{token}")))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check_status(response).await?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn find_snitches_by_name(&self, name: &str) -> Result<Vec<Snitch>> {
        let mut request = self
            .http_client
            .get(self.url("snitches"))
            .basic_auth(&self.api_key, Some(""));
        if let Some(tag) = &self.list_tag {
            request = request.query(&[("tags", tag.as_str())]);
        }

        let snitches: Vec<Snitch> = Self::decode(request.send().await?).await?;
        let matches: Vec<Snitch> = snitches.into_iter().filter(|s| s.name == name).collect();
        debug!("Found {} snitch(es)", matches.len());
        Ok(matches)
    }

    #[instrument(skip(self, snitch), fields(token = %snitch.token))]
    async fn check_in(&self, snitch: &Snitch) -> Result<()> {
        if snitch.check_in_url.is_empty() {
            return Err(DmsError::Config("snitch has no check-in URL".to_string()));
        }
        let response = self.http_client.get(&snitch.check_in_url).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DmsClient {
        DmsClient::new("abc123", &server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let result = DmsClient::new("k", "ftp://example.com", Duration::from_secs(1));
        assert!(matches!(result, Err(DmsError::Config(_))));
    }

    #[tokio::test]
    async fn test_create_posts_snitch_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/snitches"))
            .and(basic_auth("abc123", ""))
            .and(body_partial_json(json!({"name": "c1.example.com", "tags": ["hive-test"]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token": "abcdefg",
                "name": "c1.example.com",
                "tags": ["hive-test"],
                "status": "pending",
                "check_in_url": "https://nosnch.in/abcdefg"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snitch = client(&server)
            .create(&NewSnitch::new("c1.example.com", vec!["hive-test".to_string()]))
            .await
            .unwrap();
        assert_eq!(snitch.token, "abcdefg");
        assert!(snitch.is_pending());
    }

    #[tokio::test]
    async fn test_find_filters_by_exact_name_and_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/snitches"))
            .and(query_param("tags", "hive-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"token": "a", "name": "c1.example.com", "status": "healthy"},
                {"token": "b", "name": "c1.example.com.other", "status": "healthy"},
                {"token": "c", "name": "c2.example.com", "status": "pending"}
            ])))
            .mount(&server)
            .await;

        let found = client(&server)
            .with_list_tag("hive-test")
            .find_snitches_by_name("c1.example.com")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].token, "a");

        let none = client(&server)
            .with_list_tag("hive-test")
            .find_snitches_by_name("c3.example.com")
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_delete_treats_not_found_as_gone() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/snitches/abcdefg"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/snitches/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client.delete("abcdefg").await.unwrap());
        assert!(!client.delete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_server_errors_surface_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/snitches"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server).find_snitches_by_name("c1").await.unwrap_err();
        match err {
            DmsError::Api { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/snitches"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server).find_snitches_by_name("c1").await.unwrap_err();
        assert!(matches!(err, DmsError::Decode(_)));
    }

    #[tokio::test]
    async fn test_check_in_hits_snitch_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check/abcdefg"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let snitch = Snitch {
            token: "abcdefg".to_string(),
            check_in_url: format!("{}/check/abcdefg", server.uri()),
            ..Default::default()
        };
        client(&server).check_in(&snitch).await.unwrap();
    }

    #[tokio::test]
    async fn test_check_in_without_url_fails() {
        let server = MockServer::start().await;
        let err = client(&server).check_in(&Snitch::default()).await.unwrap_err();
        assert!(matches!(err, DmsError::Config(_)));
    }
}
