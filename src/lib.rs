pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod models;
pub mod rag;
pub mod sheets;

#[cfg(test)]
mod test_support;
