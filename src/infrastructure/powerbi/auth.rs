//! OAuth2 client-credentials token acquisition for the Power BI API.
//!
//! Auth failures are configuration problems: they surface immediately as
//! `AppError::AuthError` and are never retried.

use crate::domain::error::{AppError, Result};
use serde::Deserialize;

const AUTHORITY_BASE: &str = "https://login.microsoftonline.com";
const POWERBI_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";

#[derive(Debug, Clone)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct TokenProvider {
    client: reqwest::Client,
    credentials: AzureCredentials,
    authority_base: String,
}

impl TokenProvider {
    pub fn new(credentials: AzureCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            authority_base: AUTHORITY_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_authority_base(mut self, base: &str) -> Self {
        self.authority_base = base.to_string();
        self
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_base, self.credentials.tenant_id
        )
    }

    /// Acquire a bearer token for the Power BI REST API.
    pub async fn acquire_token(&self) -> Result<String> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", POWERBI_SCOPE),
        ];

        let response = self
            .client
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::AuthError(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::AuthError(format!(
                "Power BI auth failed ({}): {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthError(format!("Malformed token response: {}", e)))?;

        Ok(token.access_token)
    }
}
