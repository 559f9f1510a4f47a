//! metal-api client
//!
//! Implements the metal-api REST client for network and firewall operations.
//! Endpoints live under /v1/network/ and /v1/firewall/, machines are freed via
//! /v1/machine/{id}/free.

use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// metal-api client
pub struct MetalClient {
    client: Client,
    base_url: String,
    token: String,
}

impl MetalClient {
    /// Create a new metal-api client
    ///
    /// # Arguments
    /// * `base_url` - metal-api base URL (e.g., "https://metal.example.com/metal")
    /// * `token` - bearer token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, MetalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(MetalError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
    }

    /// Maps non-2xx responses onto `MetalError`, 404 onto `NotFound`.
    async fn check(response: Response, what: &str) -> Result<Response, MetalError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MetalError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetalError::Api(format!("{} failed: {} - {}", what, status, body)));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, MetalError> {
        let text = Self::check(response, what).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            MetalError::Api(format!(
                "error decoding {} response: {} - Response (first 500 chars): {}",
                what,
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Allocate a private network in a partition for a project
    pub async fn network_allocate(&self, request: &NetworkAllocateRequest) -> Result<Network, MetalError> {
        if request.partition_id.is_empty() || request.project_id.is_empty() {
            return Err(MetalError::InvalidRequest(
                "network allocation needs a partition and a project".to_string(),
            ));
        }
        debug!("Allocating network {} in partition {} for project {}", request.name, request.partition_id, request.project_id);

        let response = self
            .authorized(self.client.post(self.url("/v1/network/allocate")))
            .json(request)
            .send()
            .await?;
        Self::json(response, "network allocate").await
    }

    /// Free a previously allocated network
    pub async fn network_free(&self, id: &str) -> Result<(), MetalError> {
        debug!("Freeing network {}", id);

        let path = format!("/v1/network/free/{}", urlencoding::encode(id));
        let response = self
            .authorized(self.client.delete(self.url(&path)))
            .send()
            .await?;
        Self::check(response, &format!("network free {}", id)).await?;
        Ok(())
    }

    /// Find networks matching every set field of `request`
    pub async fn network_find(&self, request: &NetworkFindRequest) -> Result<Vec<Network>, MetalError> {
        debug!("Finding networks matching {:?}", request);

        let response = self
            .authorized(self.client.post(self.url("/v1/network/find")))
            .json(request)
            .send()
            .await?;
        Self::json(response, "network find").await
    }

    /// Create a firewall machine
    pub async fn firewall_create(&self, request: &FirewallCreateRequest) -> Result<Firewall, MetalError> {
        if request.networks.is_empty() {
            return Err(MetalError::InvalidRequest(format!(
                "firewall {} needs at least one network",
                request.name
            )));
        }
        debug!("Creating firewall {} ({}) in partition {}", request.name, request.hostname, request.partition_id);

        let response = self
            .authorized(self.client.post(self.url("/v1/firewall")))
            .json(request)
            .send()
            .await?;
        Self::json(response, "firewall create").await
    }

    /// Get a firewall machine by ID
    pub async fn firewall_get(&self, id: &str) -> Result<Firewall, MetalError> {
        debug!("Fetching firewall {}", id);

        let path = format!("/v1/firewall/{}", urlencoding::encode(id));
        let response = self
            .authorized(self.client.get(self.url(&path)))
            .send()
            .await?;
        Self::json(response, &format!("firewall {}", id)).await
    }

    /// Free a machine, resetting it to the available pool
    pub async fn machine_delete(&self, id: &str) -> Result<(), MetalError> {
        debug!("Freeing machine {}", id);

        let path = format!("/v1/machine/{}/free", urlencoding::encode(id));
        let response = self
            .authorized(self.client.delete(self.url(&path)))
            .send()
            .await?;
        match Self::check(response, &format!("machine {}", id)).await {
            Ok(_) => Ok(()),
            Err(MetalError::NotFound(_)) => {
                debug!("Machine {} does not exist, nothing to free", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MetalClient {
    fn base_url(&self) -> &str {
        MetalClient::base_url(self)
    }

    async fn network_allocate(&self, request: &NetworkAllocateRequest) -> Result<Network, MetalError> {
        MetalClient::network_allocate(self, request).await
    }

    async fn network_free(&self, id: &str) -> Result<(), MetalError> {
        MetalClient::network_free(self, id).await
    }

    async fn network_find(&self, request: &NetworkFindRequest) -> Result<Vec<Network>, MetalError> {
        MetalClient::network_find(self, request).await
    }

    async fn firewall_create(&self, request: &FirewallCreateRequest) -> Result<Firewall, MetalError> {
        MetalClient::firewall_create(self, request).await
    }

    async fn firewall_get(&self, id: &str) -> Result<Firewall, MetalError> {
        MetalClient::firewall_get(self, id).await
    }

    async fn machine_delete(&self, id: &str) -> Result<(), MetalError> {
        MetalClient::machine_delete(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = MetalClient::new("http://metal.local/metal/".to_string(), "t".to_string())
            .expect("client");
        assert_eq!(client.base_url(), "http://metal.local/metal");
        assert_eq!(client.url("/v1/firewall"), "http://metal.local/metal/v1/firewall");
    }

    #[tokio::test]
    async fn test_firewall_create_rejects_missing_networks() {
        let client = MetalClient::new("http://metal.local".to_string(), "t".to_string())
            .expect("client");
        let err = client
            .firewall_create(&FirewallCreateRequest {
                name: "c1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MetalError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_network_allocate_requires_partition_and_project() {
        let client = MetalClient::new("http://metal.local".to_string(), "t".to_string())
            .expect("client");
        let err = client
            .network_allocate(&NetworkAllocateRequest {
                name: "p1".to_string(),
                partition_id: "p1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MetalError::InvalidRequest(_)));
    }
}
