//! Remote write API contract.
//!
//! The transport is deliberately thin: a handful of request/response calls
//! against the test-management service, authenticated by a static bearer
//! token plus a project scope identifier. Everything the engine needs is
//! expressed by the [`RemoteApi`] trait so that reconciliation and
//! resolution can be exercised against an in-memory implementation; the
//! [`HttpRemoteApi`] is the production binding over `reqwest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{config::SyncConfig, error::CasebindError, model::{Behavior, Severity, StepEntity}};

/// A suite (container) record as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSuite {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

/// A test-case record as stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCase {
    pub id: u64,
    /// The custom identifier field, populated once a reverse sync has run.
    #[serde(default)]
    pub case_ref: Option<String>,
    pub title: String,
    #[serde(default)]
    pub suite_id: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preconditions: Option<String>,
    #[serde(default)]
    pub postconditions: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default)]
    pub flaky: bool,
    #[serde(default)]
    pub steps: Vec<StepEntity>,
    /// Operational field maintained by the service. Local source carries no
    /// execution-result information, so updates re-send it unchanged.
    #[serde(default)]
    pub last_result: Option<String>,
}

/// Outbound field set for a create or update call. Replacement semantics:
/// every field overwrites its remote counterpart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseFields {
    pub case_ref: String,
    pub title: String,
    pub description: Option<String>,
    pub preconditions: Option<String>,
    pub postconditions: Option<String>,
    pub severity: Severity,
    pub behavior: Behavior,
    pub flaky: bool,
    pub steps: Vec<StepEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<String>,
}

/// Operations the engine requires of the remote service.
///
/// All calls are issued strictly sequentially by the callers; nothing here
/// is invoked concurrently.
#[async_trait]
pub trait RemoteApi {
    /// One page of suite records. A page shorter than `limit` is the last.
    async fn list_suites(&self, offset: usize, limit: usize)
        -> Result<Vec<RemoteSuite>, CasebindError>;

    /// One page of case records. A page shorter than `limit` is the last.
    async fn list_cases(&self, offset: usize, limit: usize)
        -> Result<Vec<RemoteCase>, CasebindError>;

    /// Create one suite under `parent_id` (None = root) and return its id.
    async fn create_suite(
        &self,
        title: &str,
        parent_id: Option<u64>,
    ) -> Result<u64, CasebindError>;

    /// Create a batch of cases in one suite (None = project root),
    /// returning assigned ids in input order.
    async fn bulk_create_cases(
        &self,
        suite_id: Option<u64>,
        cases: &[CaseFields],
    ) -> Result<Vec<u64>, CasebindError>;

    /// Overwrite the stored fields of one case.
    async fn update_case(&self, id: u64, fields: &CaseFields) -> Result<(), CasebindError>;

    /// Delete one suite. Used only by the operator-invoked prune command,
    /// never by a routine sync.
    async fn delete_suite(&self, id: u64) -> Result<(), CasebindError>;
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    entities: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct BulkCreated {
    ids: Vec<u64>,
}

/// Production [`RemoteApi`] over HTTP.
pub struct HttpRemoteApi {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl HttpRemoteApi {
    /// Build a client scoped to the configured project.
    pub fn new(config: &SyncConfig) -> Result<Self, CasebindError> {
        let base = config
            .service_url
            .join(&format!("project/{}/", config.project))?;
        Ok(HttpRemoteApi {
            client: reqwest::Client::new(),
            base,
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CasebindError> {
        Ok(self.base.join(path)?)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CasebindError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(CasebindError::Remote(format!(
                "remote call failed with status {status}: {body}"
            )))
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn list_suites(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteSuite>, CasebindError> {
        let url = self.endpoint("suite")?;
        tracing::debug!("GET {url} offset={offset} limit={limit}");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;
        let page: Page<RemoteSuite> = Self::check(response).await?.json().await?;
        Ok(page.entities)
    }

    async fn list_cases(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteCase>, CasebindError> {
        let url = self.endpoint("case")?;
        tracing::debug!("GET {url} offset={offset} limit={limit}");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;
        let page: Page<RemoteCase> = Self::check(response).await?.json().await?;
        Ok(page.entities)
    }

    async fn create_suite(
        &self,
        title: &str,
        parent_id: Option<u64>,
    ) -> Result<u64, CasebindError> {
        let url = self.endpoint("suite")?;
        tracing::debug!("POST {url} title={title:?} parent={parent_id:?}");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "title": title, "parent_id": parent_id }))
            .send()
            .await?;
        let created: Created = Self::check(response).await?.json().await?;
        Ok(created.id)
    }

    async fn bulk_create_cases(
        &self,
        suite_id: Option<u64>,
        cases: &[CaseFields],
    ) -> Result<Vec<u64>, CasebindError> {
        let url = self.endpoint("case/bulk")?;
        tracing::debug!("POST {url} suite={suite_id:?} count={}", cases.len());
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "suite_id": suite_id, "cases": cases }))
            .send()
            .await?;
        let created: BulkCreated = Self::check(response).await?.json().await?;
        if created.ids.len() != cases.len() {
            return Err(CasebindError::Remote(format!(
                "bulk create returned {} ids for {} cases",
                created.ids.len(),
                cases.len()
            )));
        }
        Ok(created.ids)
    }

    async fn update_case(&self, id: u64, fields: &CaseFields) -> Result<(), CasebindError> {
        let url = self.endpoint(&format!("case/{id}"))?;
        tracing::debug!("PATCH {url}");
        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.token)
            .json(fields)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_suite(&self, id: u64) -> Result<(), CasebindError> {
        let url = self.endpoint(&format!("suite/{id}"))?;
        tracing::debug!("DELETE {url}");
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
