//! Sample protected content served behind the permission gate.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub owner_id: UserId,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    pub number: String,
    pub amount_cents: i64,
    pub project_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub body: String,
}

/// Key/value store for one content type.
pub trait ContentStore<V>: Send + Sync {
    fn get(&self, id: i64) -> Option<V>;
    fn upsert(&self, id: i64, value: V);
    fn remove(&self, id: i64) -> Option<V>;
    fn list(&self) -> Vec<V>;
}

/// In-memory store for tests/dev. Lists in id order.
#[derive(Debug)]
pub struct InMemoryContentStore<V> {
    inner: RwLock<BTreeMap<i64, V>>,
}

impl<V> InMemoryContentStore<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_items(items: impl IntoIterator<Item = (i64, V)>) -> Self {
        Self {
            inner: RwLock::new(items.into_iter().collect()),
        }
    }
}

impl<V> Default for InMemoryContentStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ContentStore<V> for InMemoryContentStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, id: i64) -> Option<V> {
        self.inner.read().ok()?.get(&id).cloned()
    }

    fn upsert(&self, id: i64, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(id, value);
        }
    }

    fn remove(&self, id: i64) -> Option<V> {
        self.inner.write().ok()?.remove(&id)
    }

    fn list(&self) -> Vec<V> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}
