use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const CHAT_HISTORY_LIMIT: usize = 10;
pub const EMPTY_HISTORY: &str = "No previous conversation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Feroze AI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Per-user conversation memory, keyed by normalized email.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Oldest turn first; empty for unseen users.
    async fn get(&self, user: &str) -> Vec<Turn>;

    async fn append_turn(&self, user: &str, role: Role, content: String);

    /// Records a question and its answer as adjacent turns.
    async fn append_exchange(&self, user: &str, question: String, answer: String);

    fn limit(&self) -> usize;

    /// Renders the retained window as `Role: content` lines.
    fn format(&self, history: &[Turn]) -> String {
        format_history(history, self.limit())
    }
}

pub fn format_history(history: &[Turn], limit: usize) -> String {
    if history.is_empty() {
        return EMPTY_HISTORY.to_string();
    }
    let skip = history.len().saturating_sub(limit);
    history[skip..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

type UserLog = Arc<Mutex<VecDeque<Turn>>>;

/// Process-lifetime store. The outer map lock is only held to find or
/// create a user's log; each log has its own lock.
pub struct InMemoryHistoryStore {
    users: Mutex<HashMap<String, UserLog>>,
    limit: usize,
}

impl InMemoryHistoryStore {
    pub fn new(limit: usize) -> Self {
        Self { users: Mutex::new(HashMap::new()), limit }
    }

    async fn log(&self, user: &str) -> UserLog {
        let mut users = self.users.lock().await;
        users.entry(user.to_string()).or_default().clone()
    }

    async fn existing_log(&self, user: &str) -> Option<UserLog> {
        self.users.lock().await.get(user).cloned()
    }

    fn push(&self, log: &mut VecDeque<Turn>, turn: Turn) {
        log.push_back(turn);
        while log.len() > self.limit {
            log.pop_front();
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new(CHAT_HISTORY_LIMIT)
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get(&self, user: &str) -> Vec<Turn> {
        match self.existing_log(user).await {
            Some(log) => log.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    async fn append_turn(&self, user: &str, role: Role, content: String) {
        let log = self.log(user).await;
        let mut log = log.lock().await;
        self.push(&mut log, Turn::new(role, content));
    }

    async fn append_exchange(&self, user: &str, question: String, answer: String) {
        let log = self.log(user).await;
        let mut log = log.lock().await;
        self.push(&mut log, Turn::new(Role::User, question));
        self.push(&mut log, Turn::new(Role::Assistant, answer));
    }

    fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unseen_user_is_empty() {
        let store = InMemoryHistoryStore::default();
        assert!(store.get("nobody@x.com").await.is_empty());
        assert_eq!(store.format(&[]), "No previous conversation.");
    }

    #[tokio::test]
    async fn test_up_to_limit_keeps_all_in_order() {
        let store = InMemoryHistoryStore::default();
        for i in 0..10 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store.append_turn("a@x.com", role, format!("m{i}")).await;
        }
        let history = store.get("a@x.com").await;
        assert_eq!(history.len(), 10);
        let contents: Vec<_> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, (0..10).map(|i| format!("m{i}")).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_evicts_oldest_first() {
        let store = InMemoryHistoryStore::default();
        for i in 0..13 {
            store.append_turn("a@x.com", Role::User, format!("m{i}")).await;
        }
        let history = store.get("a@x.com").await;
        assert_eq!(history.len(), 10);
        assert_eq!(history.first().unwrap().content, "m3");
        assert_eq!(history.last().unwrap().content, "m12");
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = InMemoryHistoryStore::new(4);
        store.append_exchange("a@x.com", "q".into(), "a".into()).await;
        assert_eq!(store.get("a@x.com").await.len(), 2);
        assert!(store.get("b@x.com").await.is_empty());
    }

    #[test]
    fn test_format_labels_roles_oldest_first() {
        let history = vec![
            Turn::new(Role::User, "What is SIP?"),
            Turn::new(Role::Assistant, "A disciplined way to invest."),
        ];
        assert_eq!(
            format_history(&history, 10),
            "User: What is SIP?\nFeroze AI: A disciplined way to invest."
        );
    }

    #[test]
    fn test_format_uses_only_window() {
        let history: Vec<Turn> = (0..5).map(|i| Turn::new(Role::User, format!("m{i}"))).collect();
        assert_eq!(format_history(&history, 2), "User: m3\nUser: m4");
    }

    #[tokio::test]
    async fn test_concurrent_exchanges_stay_paired() {
        let store = Arc::new(InMemoryHistoryStore::new(40));
        let tasks = (0..20).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store.append_exchange("a@x.com", format!("q{i}"), format!("a{i}")).await;
            })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }

        let history = store.get("a@x.com").await;
        assert_eq!(history.len(), 40);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }
}
