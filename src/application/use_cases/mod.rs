pub mod insight_pipeline;
pub mod prompt_builder;
pub mod query_adapter;
pub mod schema_guard;
pub mod transcript;
