//! REST client for the scheduling service.

use super::{ExternalTask, RemoteError, SchedulerClient, SchedulerConfig};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

const WORKSPACE_HEADER: &str = "X-Workspace-Id";

pub struct HttpSchedulerClient {
    client: reqwest::Client,
    base_url: Url,
    config: SchedulerConfig,
}

impl HttpSchedulerClient {
    /// Builds a client for `config.base_url`.
    ///
    /// Credentials are not checked here, see [`SchedulerClient::validate`].
    pub fn new(config: SchedulerConfig) -> Result<Self, RemoteError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| RemoteError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl {
                url: config.base_url.clone(),
                reason: "not a base URL".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(segments))
            .bearer_auth(&self.config.api_key)
            .header(WORKSPACE_HEADER, &self.config.workspace_id)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RemoteError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn create_task(&self, payload: &ExternalTask) -> Result<String, RemoteError> {
        let created: ExternalTask = self
            .send_json(self.request(Method::POST, &["tasks"]).json(payload))
            .await?;
        let id = created
            .id
            .ok_or_else(|| RemoteError::Decode("created task carries no id".to_string()))?;
        info!("Created remote task {} for {:?}", id, payload.external_id);
        Ok(id)
    }

    async fn update_task(&self, remote_id: &str, payload: &ExternalTask) -> Result<(), RemoteError> {
        self.send(self.request(Method::PUT, &["tasks", remote_id]).json(payload))
            .await?;
        debug!("Updated remote task {}", remote_id);
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<ExternalTask>, RemoteError> {
        self.send_json(self.request(Method::GET, &["tasks"])).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<ExternalTask>, RemoteError> {
        let tasks: Vec<ExternalTask> = self
            .send_json(
                self.request(Method::GET, &["tasks"])
                    .query(&[("externalId", external_id)]),
            )
            .await?;
        Ok(tasks.into_iter().next())
    }

    async fn list_modified_since(&self, since: DateTime<Utc>) -> Result<Vec<ExternalTask>, RemoteError> {
        let since = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        self.send_json(
            self.request(Method::GET, &["tasks"])
                .query(&[("updatedSince", since.as_str())]),
        )
        .await
    }

    async fn delete_task(&self, remote_id: &str) -> Result<(), RemoteError> {
        match self.send(self.request(Method::DELETE, &["tasks", remote_id])).await {
            Ok(_) => Ok(()),
            Err(RemoteError::Status { status: 404, .. }) => {
                Err(RemoteError::NotFound(remote_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn test_connection(&self) -> bool {
        if let Err(e) = self.validate() {
            warn!("Connection test skipped: {}", e);
            return false;
        }
        match self.send(self.request(Method::GET, &["workspaces"])).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Connection test failed: {}", e);
                false
            }
        }
    }

    fn validate(&self) -> Result<(), RemoteError> {
        self.config.validate()
    }

    fn client_name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> SchedulerConfig {
        SchedulerConfig {
            base_url: base_url.to_string(),
            api_key: "key".to_string(),
            workspace_id: "ws".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(matches!(
            HttpSchedulerClient::new(config("not a url")),
            Err(RemoteError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpSchedulerClient::new(config("mailto:someone@example.com")),
            Err(RemoteError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = HttpSchedulerClient::new(config("https://api.example.com/v1")).unwrap();
        assert_eq!(
            client.endpoint(&["tasks", "a b/c"]).as_str(),
            "https://api.example.com/v1/tasks/a%20b%2Fc"
        );

        let client = HttpSchedulerClient::new(config("http://127.0.0.1:8080/")).unwrap();
        assert_eq!(client.endpoint(&["tasks"]).as_str(), "http://127.0.0.1:8080/tasks");
    }
}
