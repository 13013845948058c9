//! Conversation history collaborator.
//!
//! The core treats history as an append-only log behind the
//! [`HistoryStore`] trait and never mutates past turns. Relational
//! backends belong to the serving layer; [`MemoryHistoryStore`] covers
//! tests and the CLI.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{ChatTurn, Role};

/// Append-only per-scope conversation log.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, scope: &str, role: Role, content: &str) -> Result<()>;

    /// All turns for a scope in chronological order.
    async fn list(&self, scope: &str) -> Result<Vec<ChatTurn>>;

    /// The last `limit` turns, still in chronological order.
    async fn recent(&self, scope: &str, limit: usize) -> Result<Vec<ChatTurn>>;
}

/// In-memory history store.
#[derive(Default)]
pub struct MemoryHistoryStore {
    turns: RwLock<HashMap<String, Vec<ChatTurn>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, scope: &str, role: Role, content: &str) -> Result<()> {
        let mut turns = self
            .turns
            .write()
            .map_err(|_| Error::Storage("history lock poisoned".to_string()))?;
        turns.entry(scope.to_string()).or_default().push(ChatTurn {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list(&self, scope: &str) -> Result<Vec<ChatTurn>> {
        let turns = self
            .turns
            .read()
            .map_err(|_| Error::Storage("history lock poisoned".to_string()))?;
        Ok(turns.get(scope).cloned().unwrap_or_default())
    }

    async fn recent(&self, scope: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        let turns = self
            .turns
            .read()
            .map_err(|_| Error::Storage("history lock poisoned".to_string()))?;
        let all = turns.get(scope).map(|v| v.as_slice()).unwrap_or_default();
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_list_in_order() {
        let store = MemoryHistoryStore::new();
        store.append("t1", Role::User, "hello").await.unwrap();
        store.append("t1", Role::Assistant, "hi").await.unwrap();

        let turns = store.list("t1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].content, "hi");
    }

    #[tokio::test]
    async fn recent_returns_tail_chronologically() {
        let store = MemoryHistoryStore::new();
        for i in 0..5 {
            store
                .append("t1", Role::User, &format!("msg {i}"))
                .await
                .unwrap();
        }
        let recent = store.recent("t1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "msg 3");
        assert_eq!(recent[1].content, "msg 4");
    }

    #[tokio::test]
    async fn unknown_scope_is_empty() {
        let store = MemoryHistoryStore::new();
        assert!(store.list("nope").await.unwrap().is_empty());
        assert!(store.recent("nope", 10).await.unwrap().is_empty());
    }
}
