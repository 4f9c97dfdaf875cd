pub mod config;
pub mod context_store;
pub mod llm_clients;
pub mod powerbi;
