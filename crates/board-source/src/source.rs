//! Data source abstraction
//!
//! The engine only ever sees this trait, so it can run against GitHub or
//! against canned responses in tests.

use async_trait::async_trait;
use board_core::{BoardError, CountQuery, ResourceRef, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Trait for reading and updating board resources
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Reference of the project resource with the given id
    fn project_ref(&self, project_id: u64) -> ResourceRef;

    /// Fetch a resource as JSON
    async fn fetch_resource(&self, reference: &ResourceRef) -> Result<Value>;

    /// Update a resource and return its new representation
    async fn update_resource(&self, reference: &ResourceRef, content: &Value) -> Result<Value>;

    /// Number of issues or pull requests matching a query
    async fn count_matching(&self, query: &CountQuery) -> Result<u64>;
}

#[async_trait]
impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    fn project_ref(&self, project_id: u64) -> ResourceRef {
        (**self).project_ref(project_id)
    }

    async fn fetch_resource(&self, reference: &ResourceRef) -> Result<Value> {
        (**self).fetch_resource(reference).await
    }

    async fn update_resource(&self, reference: &ResourceRef, content: &Value) -> Result<Value> {
        (**self).update_resource(reference, content).await
    }

    async fn count_matching(&self, query: &CountQuery) -> Result<u64> {
        (**self).count_matching(query).await
    }
}

#[derive(Default)]
struct MockState {
    resources: HashMap<String, Value>,
    counts: HashMap<String, u64>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    updates: Vec<(ResourceRef, Value)>,
}

/// Mock data source for testing
///
/// Resources are keyed by reference, counts by the query's search string.
/// Responses can be changed between calls, which lets tests fail one cycle
/// and recover in the next.
#[derive(Default)]
pub struct MockSource {
    state: Mutex<MockState>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, reference: &str, value: Value) -> Self {
        self.set_resource(reference, value);
        self
    }

    pub fn with_count(self, query: &str, count: u64) -> Self {
        self.set_count(query, count);
        self
    }

    pub fn set_resource(&self, reference: &str, value: Value) {
        self.state().resources.insert(reference.to_string(), value);
    }

    pub fn set_count(&self, query: &str, count: u64) {
        self.state().counts.insert(query.to_string(), count);
    }

    /// Make every call touching `key` (a reference or a query) fail
    pub fn set_failing(&self, key: &str, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing.insert(key.to_string());
        } else {
            state.failing.remove(key);
        }
    }

    /// Delay every call touching `key` before answering
    pub fn set_delay(&self, key: &str, delay: Duration) {
        self.state().delays.insert(key.to_string(), delay);
    }

    /// Updates received so far, in order
    pub fn updates(&self) -> Vec<(ResourceRef, Value)> {
        self.state().updates.clone()
    }

    /// Total number of calls of any kind
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self, key: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state().delays.get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state().failing.contains(key) {
            return Err(BoardError::fetch(key, "mock failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DataSource for MockSource {
    fn project_ref(&self, project_id: u64) -> ResourceRef {
        ResourceRef::new(format!("projects/{}", project_id))
    }

    async fn fetch_resource(&self, reference: &ResourceRef) -> Result<Value> {
        self.enter(reference.as_str()).await?;
        self.state()
            .resources
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| BoardError::fetch(reference.as_str(), "no mock response"))
    }

    async fn update_resource(&self, reference: &ResourceRef, content: &Value) -> Result<Value> {
        self.enter(reference.as_str()).await?;
        let mut state = self.state();
        state.updates.push((reference.clone(), content.clone()));
        Ok(content.clone())
    }

    async fn count_matching(&self, query: &CountQuery) -> Result<u64> {
        let key = query.to_string();
        self.enter(&key).await?;
        self.state()
            .counts
            .get(&key)
            .copied()
            .ok_or_else(|| BoardError::fetch(key, "no mock count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_core::{IssueKind, IssueState, Scope};
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_source() {
        let source = MockSource::new()
            .with_resource("projects/1", json!({"id": 1}))
            .with_count("state:open type:pr org:acme", 7);

        let project = source.fetch_resource(&source.project_ref(1)).await.unwrap();
        assert_eq!(project["id"], 1);

        let query = CountQuery::new(
            IssueState::Open,
            IssueKind::PullRequest,
            Scope::Organization("acme".into()),
        );
        assert_eq!(source.count_matching(&query).await.unwrap(), 7);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_failures_and_updates() {
        let source = MockSource::new().with_resource("cards", json!([]));
        source.set_failing("cards", true);
        assert!(source
            .fetch_resource(&ResourceRef::new("cards"))
            .await
            .is_err());

        source.set_failing("cards", false);
        assert!(source.fetch_resource(&ResourceRef::new("cards")).await.is_ok());

        let card = ResourceRef::new("cards/9");
        source
            .update_resource(&card, &json!({"note": "hi"}))
            .await
            .unwrap();
        assert_eq!(source.updates(), vec![(card, json!({"note": "hi"}))]);
    }
}
