pub mod adaptation;
pub mod error;
pub mod llm_config;
pub mod question;
pub mod transcript;
pub mod usage_schema;
