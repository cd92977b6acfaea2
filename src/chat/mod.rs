pub mod advisor;
pub mod history;
pub mod prompt;

pub use self::advisor::Advisor;
pub use self::history::{HistoryStore, InMemoryHistoryStore, Role, Turn};
