//! Idempotent find-or-create resolution of nested suite paths.
//!
//! The resolver walks a path root to leaf. At each level it searches the
//! in-memory suite set for a container whose display name and
//! already-resolved parent id both match; only when no such container
//! exists is one created through the remote collaborator. Freshly created
//! suites are inserted into the set immediately, so resolving two paths
//! that share a new ancestor within one run creates that ancestor exactly
//! once. Re-running a sync with unchanged sources creates zero containers.
//!
//! Containers are never deleted here. Cleanup of now-empty suites is the
//! separate, operator-invoked prune action: deletion is destructive and
//! must not be a side effect of a routine sync.

use tokio::time::{sleep, Duration};

use crate::{
    error::CasebindError,
    model::SuitePath,
    remote::{RemoteApi, RemoteIndex, RemoteSuite},
};

pub struct SuiteResolver {
    /// The only shared mutable state of a run. Accumulates created suites
    /// on top of the fetched snapshot; not safe for concurrent access and
    /// intentionally never handed to multiple workers.
    suites: Vec<RemoteSuite>,
    throttle: Duration,
    created: usize,
}

impl SuiteResolver {
    /// Seed the in-memory suite set from a fetched remote index.
    pub fn new(index: &RemoteIndex, throttle_ms: u64) -> Self {
        SuiteResolver {
            suites: index.suites().to_vec(),
            throttle: Duration::from_millis(throttle_ms),
            created: 0,
        }
    }

    /// Containers created so far in this run.
    pub fn created_count(&self) -> usize {
        self.created
    }

    fn find(&self, title: &str, parent_id: Option<u64>) -> Option<u64> {
        self.suites
            .iter()
            .find(|s| s.title == title && s.parent_id == parent_id)
            .map(|s| s.id)
    }

    /// Look up the leaf id of `path` without creating anything. Used when
    /// rendering the audit snapshot.
    pub fn peek(&self, path: &SuitePath) -> Option<u64> {
        let mut parent_id: Option<u64> = None;
        for title in path.levels() {
            parent_id = Some(self.find(title, parent_id)?);
        }
        parent_id
    }

    /// Resolve `path` to its leaf container id, creating missing levels.
    /// Returns `None` for the root path (a test declared outside any
    /// group).
    pub async fn resolve(
        &mut self,
        api: &dyn RemoteApi,
        path: &SuitePath,
    ) -> Result<Option<u64>, CasebindError> {
        let mut parent_id: Option<u64> = None;
        for title in path.levels() {
            let id = match self.find(title, parent_id) {
                Some(id) => id,
                None => {
                    tracing::info!("creating suite '{title}' under {parent_id:?}");
                    let id = api.create_suite(title, parent_id).await.map_err(|err| {
                        CasebindError::UnresolvedContainer {
                            path: path.to_string(),
                            reason: err.to_string(),
                        }
                    })?;
                    self.suites.push(RemoteSuite {
                        id,
                        title: title.clone(),
                        parent_id,
                    });
                    self.created += 1;
                    sleep(self.throttle).await;
                    id
                }
            };
            parent_id = Some(id);
        }
        Ok(parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{CaseFields, RemoteCase};
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    };

    struct FakeApi {
        suites: Mutex<Vec<RemoteSuite>>,
        next_id: AtomicU64,
        create_calls: AtomicUsize,
    }

    impl FakeApi {
        fn new() -> Self {
            FakeApi {
                suites: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(100),
                create_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteApi for FakeApi {
        async fn list_suites(
            &self,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<RemoteSuite>, CasebindError> {
            let suites = self.suites.lock().unwrap();
            Ok(suites.iter().skip(offset).take(limit).cloned().collect())
        }

        async fn list_cases(
            &self,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<RemoteCase>, CasebindError> {
            Ok(Vec::new())
        }

        async fn create_suite(
            &self,
            title: &str,
            parent_id: Option<u64>,
        ) -> Result<u64, CasebindError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.suites.lock().unwrap().push(RemoteSuite {
                id,
                title: title.to_string(),
                parent_id,
            });
            Ok(id)
        }

        async fn bulk_create_cases(
            &self,
            _suite_id: Option<u64>,
            _cases: &[CaseFields],
        ) -> Result<Vec<u64>, CasebindError> {
            unreachable!("resolver never creates cases")
        }

        async fn update_case(&self, _id: u64, _fields: &CaseFields) -> Result<(), CasebindError> {
            unreachable!("resolver never updates cases")
        }

        async fn delete_suite(&self, _id: u64) -> Result<(), CasebindError> {
            unreachable!("resolver never deletes")
        }
    }

    fn path(levels: &[&str]) -> SuitePath {
        SuitePath::new(levels.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_resolve_creates_missing_levels_once() {
        let api = FakeApi::new();
        let index = RemoteIndex::default();
        let mut resolver = SuiteResolver::new(&index, 0);

        let leaf = resolver
            .resolve(&api, &path(&["A", "B", "C"]))
            .await
            .unwrap();
        assert!(leaf.is_some());
        assert_eq!(resolver.created_count(), 3);

        // A sibling path sharing the new ancestors reuses them.
        resolver.resolve(&api, &path(&["A", "B", "D"])).await.unwrap();
        assert_eq!(resolver.created_count(), 4);
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_resolve_idempotent_across_runs() {
        let api = FakeApi::new();
        let mut first = SuiteResolver::new(&RemoteIndex::default(), 0);
        first.resolve(&api, &path(&["A", "B"])).await.unwrap();
        assert_eq!(first.created_count(), 2);

        // Second run seeds from the now-populated remote set.
        let suites = api.list_suites(0, 100).await.unwrap();
        let index = RemoteIndex::seed(Vec::new(), suites);
        let mut second = SuiteResolver::new(&index, 0);
        let leaf = second.resolve(&api, &path(&["A", "B"])).await.unwrap();
        assert_eq!(second.created_count(), 0);
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 2);
        assert!(leaf.is_some());
    }

    #[tokio::test]
    async fn test_same_name_different_parents_distinct() {
        let api = FakeApi::new();
        let mut resolver = SuiteResolver::new(&RemoteIndex::default(), 0);
        let left = resolver
            .resolve(&api, &path(&["A", "Shared"]))
            .await
            .unwrap();
        let right = resolver
            .resolve(&api, &path(&["B", "Shared"]))
            .await
            .unwrap();
        assert_ne!(left, right);
        assert_eq!(resolver.created_count(), 4);
    }

    #[tokio::test]
    async fn test_root_path_resolves_to_none() {
        let api = FakeApi::new();
        let mut resolver = SuiteResolver::new(&RemoteIndex::default(), 0);
        let leaf = resolver.resolve(&api, &SuitePath::default()).await.unwrap();
        assert!(leaf.is_none());
        assert_eq!(resolver.created_count(), 0);
    }
}
