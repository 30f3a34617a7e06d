//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use tempfile::TempDir;

use casebind::{
    config::SyncConfig,
    error::CasebindError,
    remote::{CaseFields, RemoteApi, RemoteCase, RemoteSuite},
};

/// A config pointed at a fake service; the URL is never dialed because the
/// tests drive [`FakeRemote`] instead of the HTTP binding.
#[allow(dead_code)]
pub fn test_config() -> SyncConfig {
    toml::from_str(
        r#"
service_url = "https://tms.invalid/api/v1/"
token = "test-token"
project = "DEMO"
page_size = 2
throttle_ms = 0
"#,
    )
    .unwrap()
}

/// Create a source tree under a fresh tempdir and return (guard, root).
#[allow(dead_code)]
pub fn write_tree(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    for (name, content) in files {
        let path = temp.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
    let root = temp.path().to_path_buf();
    (temp, root)
}

/// In-memory stand-in for the remote service. Serves the paginated list
/// endpoints from its stored state and records every mutating call.
pub struct FakeRemote {
    pub suites: Mutex<Vec<RemoteSuite>>,
    pub cases: Mutex<Vec<RemoteCase>>,
    next_id: AtomicU64,
    pub suite_creates: AtomicUsize,
    pub case_creates: AtomicUsize,
    pub case_updates: AtomicUsize,
    pub suite_deletes: AtomicUsize,
    /// When set, every mutating call fails with a remote error.
    pub fail_mutations: std::sync::atomic::AtomicBool,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn new() -> Self {
        FakeRemote {
            suites: Mutex::new(Vec::new()),
            cases: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
            suite_creates: AtomicUsize::new(0),
            case_creates: AtomicUsize::new(0),
            case_updates: AtomicUsize::new(0),
            suite_deletes: AtomicUsize::new(0),
            fail_mutations: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn with_cases(cases: Vec<RemoteCase>) -> Self {
        let fake = Self::new();
        *fake.cases.lock().unwrap() = cases;
        fake
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), CasebindError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(CasebindError::Remote("injected failure".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn case_by_ref(&self, case_ref: &str) -> Option<RemoteCase> {
        self.cases
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.case_ref.as_deref() == Some(case_ref))
            .cloned()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
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
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteCase>, CasebindError> {
        let cases = self.cases.lock().unwrap();
        Ok(cases.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn create_suite(
        &self,
        title: &str,
        parent_id: Option<u64>,
    ) -> Result<u64, CasebindError> {
        self.check_failure()?;
        self.suite_creates.fetch_add(1, Ordering::SeqCst);
        let id = self.next();
        self.suites.lock().unwrap().push(RemoteSuite {
            id,
            title: title.to_string(),
            parent_id,
        });
        Ok(id)
    }

    async fn bulk_create_cases(
        &self,
        suite_id: Option<u64>,
        fields: &[CaseFields],
    ) -> Result<Vec<u64>, CasebindError> {
        self.check_failure()?;
        self.case_creates.fetch_add(fields.len(), Ordering::SeqCst);
        let mut cases = self.cases.lock().unwrap();
        let mut ids = Vec::new();
        for f in fields {
            let id = self.next();
            cases.push(RemoteCase {
                id,
                case_ref: Some(f.case_ref.clone()),
                title: f.title.clone(),
                suite_id,
                description: f.description.clone(),
                preconditions: f.preconditions.clone(),
                postconditions: f.postconditions.clone(),
                severity: f.severity,
                behavior: f.behavior,
                flaky: f.flaky,
                steps: f.steps.clone(),
                last_result: None,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn update_case(&self, id: u64, fields: &CaseFields) -> Result<(), CasebindError> {
        self.check_failure()?;
        self.case_updates.fetch_add(1, Ordering::SeqCst);
        let mut cases = self.cases.lock().unwrap();
        let case = cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CasebindError::NotFound(format!("case {id}")))?;
        case.case_ref = Some(fields.case_ref.clone());
        case.title = fields.title.clone();
        case.description = fields.description.clone();
        case.preconditions = fields.preconditions.clone();
        case.postconditions = fields.postconditions.clone();
        case.severity = fields.severity;
        case.behavior = fields.behavior;
        case.flaky = fields.flaky;
        case.steps = fields.steps.clone();
        case.last_result = fields.last_result.clone();
        Ok(())
    }

    async fn delete_suite(&self, id: u64) -> Result<(), CasebindError> {
        self.check_failure()?;
        self.suite_deletes.fetch_add(1, Ordering::SeqCst);
        self.suites.lock().unwrap().retain(|s| s.id != id);
        Ok(())
    }
}
