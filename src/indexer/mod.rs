pub mod chunker;
pub mod loader;
