//! DigitalOcean droplet API client.
//!
//! Talks to the v2 REST API directly:
//! - `POST /v2/droplets`
//! - `DELETE /v2/droplets/{id}`
//! - `GET /v2/droplets?tag_name={tag}&page={n}&per_page=200`

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ComputeProvider, CreateInstanceRequest, Instance, InstanceId, ProviderError};

pub const DEFAULT_API_BASE: &str = "https://api.digitalocean.com";

const LIST_PAGE_SIZE: usize = 200;

/// DigitalOcean client configuration.
#[derive(Clone)]
pub struct DigitalOceanConfig {
    pub token: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl DigitalOceanConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for DigitalOceanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalOceanConfig")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// DigitalOcean API client.
pub struct DigitalOceanClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct CreateDropletBody<'a> {
    name: &'a str,
    region: &'a str,
    size: &'a str,
    image: &'a str,
    user_data: &'a str,
    ssh_keys: &'a [String],
    tags: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DropletEnvelope {
    droplet: Droplet,
}

#[derive(Debug, Deserialize)]
struct DropletList {
    #[serde(default)]
    droplets: Vec<Droplet>,
}

#[derive(Debug, Deserialize)]
struct Droplet {
    id: u64,
    name: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<Droplet> for Instance {
    fn from(droplet: Droplet) -> Self {
        Instance {
            id: InstanceId(droplet.id),
            name: droplet.name,
            created_at: droplet.created_at,
            tags: droplet.tags,
        }
    }
}

impl DigitalOceanClient {
    pub fn new(config: DigitalOceanConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    async fn error_from(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ProviderError::Api { status, body }
    }
}

#[async_trait]
impl ComputeProvider for DigitalOceanClient {
    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<Instance, ProviderError> {
        let url = format!("{}/v2/droplets", self.api_base);
        let body = CreateDropletBody {
            name: &request.name,
            region: &request.region,
            size: &request.size,
            image: &request.image,
            user_data: &request.user_data,
            ssh_keys: &request.ssh_keys,
            tags: &request.tags,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let envelope: DropletEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let instance = Instance::from(envelope.droplet);

        info!(
            runner_name = %instance.name,
            instance_id = %instance.id,
            "Created runner droplet"
        );
        Ok(instance)
    }

    async fn delete_instance(&self, id: InstanceId) -> Result<(), ProviderError> {
        let url = format!("{}/v2/droplets/{}", self.api_base, id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(id)),
            _ => Err(Self::error_from(response).await),
        }
    }

    async fn list_instances_by_tag(&self, tag: &str) -> Result<Vec<Instance>, ProviderError> {
        let url = format!("{}/v2/droplets", self.api_base);
        let per_page = LIST_PAGE_SIZE.to_string();
        let mut instances = Vec::new();
        let mut page = 1usize;

        loop {
            let page_param = page.to_string();
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&[
                    ("tag_name", tag),
                    ("page", page_param.as_str()),
                    ("per_page", per_page.as_str()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(Self::error_from(response).await);
            }

            let list: DropletList = response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

            let fetched = list.droplets.len();
            instances.extend(list.droplets.into_iter().map(Instance::from));
            debug!(tag = %tag, page, fetched, "Listed droplets");

            if fetched < LIST_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DigitalOceanClient {
        let mut config = DigitalOceanConfig::new("do-token");
        config.api_base = server.uri();
        DigitalOceanClient::new(config).unwrap()
    }

    fn droplet_json(id: u64, name: &str, created_at: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": name,
            "created_at": created_at,
            "tags": ["github-runner", "ephemeral"],
            "status": "active"
        })
    }

    #[tokio::test]
    async fn test_create_droplet() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/droplets"))
            .and(header("authorization", "Bearer do-token"))
            .and(body_partial_json(serde_json::json!({
                "name": "eph-widgets-1-1700000000",
                "region": "nyc3",
                "size": "s-4vcpu-8gb",
                "image": "ubuntu-24-04-x64",
                "tags": ["github-runner", "ephemeral"]
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "droplet": droplet_json(3164444, "eph-widgets-1-1700000000", "2025-01-01T00:00:00Z")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CreateInstanceRequest {
            name: "eph-widgets-1-1700000000".to_string(),
            region: "nyc3".to_string(),
            size: "s-4vcpu-8gb".to_string(),
            image: "ubuntu-24-04-x64".to_string(),
            user_data: "#cloud-config".to_string(),
            ssh_keys: vec!["aa:bb".to_string()],
            tags: vec!["github-runner".to_string(), "ephemeral".to_string()],
        };

        let instance = client(&server).create_instance(&request).await.unwrap();
        assert_eq!(instance.id, InstanceId(3164444));
        assert_eq!(instance.name, "eph-widgets-1-1700000000");
    }

    #[tokio::test]
    async fn test_create_surfaces_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/droplets"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid size"))
            .mount(&server)
            .await;

        let request = CreateInstanceRequest {
            name: "eph".to_string(),
            region: "nyc3".to_string(),
            size: "bogus".to_string(),
            image: "ubuntu-24-04-x64".to_string(),
            user_data: String::new(),
            ssh_keys: vec![],
            tags: vec![],
        };

        let err = client(&server).create_instance(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 422, .. }));
    }

    #[tokio::test]
    async fn test_delete_droplet() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/v2/droplets/42"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/v2/droplets/43"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server);
        client.delete_instance(InstanceId(42)).await.unwrap();
        assert!(matches!(
            client.delete_instance(InstanceId(43)).await,
            Err(ProviderError::NotFound(InstanceId(43)))
        ));
    }

    #[tokio::test]
    async fn test_list_by_tag_follows_pages() {
        let server = MockServer::start().await;

        let first_page: Vec<_> = (1..=200)
            .map(|id| droplet_json(id, &format!("eph-{id}"), "2025-01-01T00:00:00Z"))
            .collect();

        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .and(query_param("tag_name", "github-runner"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "droplets": first_page })),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/droplets"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "droplets": [droplet_json(201, "eph-201", "2025-01-01T00:00:00Z")]
            })))
            .mount(&server)
            .await;

        let instances = client(&server)
            .list_instances_by_tag("github-runner")
            .await
            .unwrap();
        assert_eq!(instances.len(), 201);
        assert_eq!(instances[200].id, InstanceId(201));
    }
}
