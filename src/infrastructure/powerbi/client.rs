//! Power BI `executeQueries` client.
//!
//! Submits the adapted DAX verbatim and returns the raw row-set JSON.
//! 401/403 responses map to `AuthError` (fatal, not retried); everything
//! else non-success maps to `ExecutionError` (transient, retried by the
//! pipeline).

use super::{QueryExecutor, TokenProvider};
use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.powerbi.com/v1.0/myorg";

pub struct PowerBiExecutor {
    client: reqwest::Client,
    tokens: TokenProvider,
    api_base: String,
    workspace_id: String,
    dataset_id: String,
    /// Token cached for the life of the session; refreshed after a 401.
    cached_token: Mutex<Option<String>>,
}

impl PowerBiExecutor {
    pub fn new(
        tokens: TokenProvider,
        api_base: &str,
        workspace_id: &str,
        dataset_id: &str,
    ) -> Result<Self> {
        // Catch malformed base URLs at construction, not on first query.
        Url::parse(api_base)
            .map_err(|e| AppError::ConfigError(format!("Invalid API base URL '{}': {}", api_base, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            tokens,
            api_base: api_base.trim_end_matches('/').to_string(),
            workspace_id: workspace_id.to_string(),
            dataset_id: dataset_id.to_string(),
            cached_token: Mutex::new(None),
        })
    }

    fn query_url(&self) -> String {
        format!(
            "{}/groups/{}/datasets/{}/executeQueries",
            self.api_base, self.workspace_id, self.dataset_id
        )
    }

    async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.tokens.acquire_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.cached_token.lock().await = None;
    }
}

#[async_trait]
impl QueryExecutor for PowerBiExecutor {
    async fn execute(&self, dax: &str) -> Result<serde_json::Value> {
        let token = self.bearer_token().await?;
        let body = json!({
            "queries": [{ "query": dax }],
            "serializerSettings": { "includeNulls": true }
        });

        debug!(url = %self.query_url(), "executing DAX query");
        let response = self
            .client
            .post(self.query_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExecutionError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // A stale cached token would otherwise poison every later call.
            self.invalidate_token().await;
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::AuthError(format!(
                "Power BI rejected the request ({}): {}",
                status, text
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExecutionError(format!(
                "executeQueries failed ({}): {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Malformed query result: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::powerbi::AzureCredentials;

    fn executor() -> PowerBiExecutor {
        let tokens = TokenProvider::new(AzureCredentials {
            tenant_id: "t".to_string(),
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
        });
        PowerBiExecutor::new(tokens, DEFAULT_API_BASE, "ws-1", "ds-1")
            .expect("default base URL parses")
    }

    #[test]
    fn query_url_follows_power_bi_shape() {
        assert_eq!(
            executor().query_url(),
            "https://api.powerbi.com/v1.0/myorg/groups/ws-1/datasets/ds-1/executeQueries"
        );
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let tokens = TokenProvider::new(AzureCredentials {
            tenant_id: "t".to_string(),
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
        });
        match PowerBiExecutor::new(tokens, "not a url", "ws", "ds") {
            Err(AppError::ConfigError(_)) => {}
            other => panic!("expected ConfigError, got {:?}", other.map(|_| ())),
        }
    }
}
