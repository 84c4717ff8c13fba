//! HTTP scheme source over reqwest

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::ClientError;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::scheme::{StructuralScheme, ValidationScheme};
use crate::source::SchemeSource;
use crate::value::{QuotaDocument, ValueTree};

/// Error body returned by the backend
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Scheme lookups and quota reads/writes against the backend
///
/// - `GET /scheme`
/// - `GET /validation/quota`
/// - `GET /labels/{label}`
/// - `GET /quota?project=` and `PUT /quota?project=`
#[derive(Debug, Clone)]
pub struct HttpSchemeSource {
    client: Client,
    config: ClientConfig,
}

impl HttpSchemeSource {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> std::result::Result<Url, ClientError> {
        let mut url = Url::parse(&self.config.endpoint(""))
            .map_err(|e| ClientError::Network(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Network(format!("Invalid base URL '{}'", self.config.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.query(&[("token", token)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<Response, ClientError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.message,
            Err(_) if !text.trim().is_empty() => text,
            Err(_) => format!("Request failed with status {}", status),
        };
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> std::result::Result<T, ClientError> {
        let url = self.url(segments)?;
        tracing::debug!(url = %url, "GET");
        self.send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Current quota of a project, used to seed an engine
    pub async fn fetch_quota(&self, project: &str) -> Result<ValueTree> {
        let url = self.url(&["quota"])?;
        tracing::debug!(url = %url, project = %project, "GET quota");
        let document: QuotaDocument = self
            .send(self.client.get(url).query(&[("project", project)]))
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(document.into())
    }

    /// Submit a complete tree for a project
    pub async fn update_quota(&self, project: &str, tree: &ValueTree) -> Result<()> {
        let url = self.url(&["quota"])?;
        tracing::info!(url = %url, project = %project, "PUT quota");
        self.send(self.client.put(url).query(&[("project", project)]).json(tree))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SchemeSource for HttpSchemeSource {
    async fn fetch_structural_scheme(&self) -> Result<StructuralScheme> {
        Ok(self.get_json(&["scheme"]).await?)
    }

    async fn fetch_validation_scheme(&self) -> Result<ValidationScheme> {
        Ok(self.get_json(&["validation", "quota"]).await?)
    }

    async fn fetch_label_options(&self, label: &str) -> Result<Vec<String>> {
        Ok(self.get_json(&["labels", label]).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base_url: &str) -> HttpSchemeSource {
        HttpSchemeSource::new(ClientConfig::builder().base_url(base_url).build()).unwrap()
    }

    #[test]
    fn test_url_segments() {
        let source = source("http://backend:8080/api/");
        assert_eq!(
            source.url(&["validation", "quota"]).unwrap().as_str(),
            "http://backend:8080/api/validation/quota"
        );
        assert_eq!(
            source.url(&["labels", "cost center"]).unwrap().as_str(),
            "http://backend:8080/api/labels/cost%20center"
        );
    }

    #[test]
    fn test_url_without_path() {
        let source = source("http://backend:8080");
        assert_eq!(
            source.url(&["scheme"]).unwrap().as_str(),
            "http://backend:8080/scheme"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let source = source("not a url");
        assert!(matches!(source.url(&["scheme"]), Err(ClientError::Network(_))));
    }
}
