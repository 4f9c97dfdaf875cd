pub mod auth;
pub mod client;

use crate::domain::error::Result;
use async_trait::async_trait;

pub use auth::{AzureCredentials, TokenProvider};
pub use client::PowerBiExecutor;

/// Execution seam: accepts a query string, returns row-set JSON. The
/// pipeline makes no assumption about transport beyond this contract.
#[async_trait]
pub trait QueryExecutor {
    async fn execute(&self, dax: &str) -> Result<serde_json::Value>;
}
