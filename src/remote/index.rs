//! Read-only index over the complete remote record set.
//!
//! Retrieval is a fixed-page-size offset walk: keep advancing until a page
//! comes back shorter than requested. The fetched records are indexed three
//! ways — by container id, by custom identifier field value, and by display
//! title as a fallback — to back the reconciler's match strategies.

use std::collections::HashMap;

use crate::{
    error::CasebindError,
    remote::api::{RemoteApi, RemoteCase, RemoteSuite},
};

#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    cases: Vec<RemoteCase>,
    suites: Vec<RemoteSuite>,
    by_id: HashMap<u64, usize>,
    by_ref: HashMap<String, usize>,
    by_title: HashMap<String, usize>,
    suite_by_id: HashMap<u64, usize>,
}

impl RemoteIndex {
    /// Fetch every remote case and suite through `api`, `page_size` records
    /// at a time, and build the lookup indices. Network reads only, no
    /// mutation.
    pub async fn fetch(api: &dyn RemoteApi, page_size: usize) -> Result<RemoteIndex, CasebindError> {
        let mut index = RemoteIndex::default();
        // A zero limit could never yield a short page and the offset would
        // never advance.
        let page_size = page_size.max(1);

        let mut offset = 0;
        loop {
            let page = api.list_suites(offset, page_size).await?;
            let short = page.len() < page_size;
            offset += page.len();
            index.suites.extend(page);
            if short {
                break;
            }
        }

        offset = 0;
        loop {
            let page = api.list_cases(offset, page_size).await?;
            let short = page.len() < page_size;
            offset += page.len();
            index.cases.extend(page);
            if short {
                break;
            }
        }

        index.reindex();
        tracing::info!(
            "remote index: {} cases, {} suites",
            index.cases.len(),
            index.suites.len()
        );
        Ok(index)
    }

    /// Build an index directly from in-memory records, bypassing the
    /// paginated fetch. Used by tests and by the prune pass after it has
    /// already fetched.
    pub fn seed(cases: Vec<RemoteCase>, suites: Vec<RemoteSuite>) -> RemoteIndex {
        let mut index = RemoteIndex {
            cases,
            suites,
            ..Default::default()
        };
        index.reindex();
        index
    }

    fn reindex(&mut self) {
        self.by_id = self
            .cases
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
        // First record wins on collision so lookups stay deterministic.
        self.by_ref = HashMap::new();
        self.by_title = HashMap::new();
        for (i, case) in self.cases.iter().enumerate() {
            if let Some(case_ref) = &case.case_ref {
                self.by_ref.entry(case_ref.clone()).or_insert(i);
            }
            self.by_title.entry(case.title.clone()).or_insert(i);
        }
        self.suite_by_id = self
            .suites
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
    }

    pub fn case_by_remote_id(&self, id: u64) -> Option<&RemoteCase> {
        self.by_id.get(&id).map(|i| &self.cases[*i])
    }

    pub fn case_by_ref(&self, case_ref: &str) -> Option<&RemoteCase> {
        self.by_ref.get(case_ref).map(|i| &self.cases[*i])
    }

    pub fn case_by_title(&self, title: &str) -> Option<&RemoteCase> {
        self.by_title.get(title).map(|i| &self.cases[*i])
    }

    pub fn suite_by_id(&self, id: u64) -> Option<&RemoteSuite> {
        self.suite_by_id.get(&id).map(|i| &self.suites[*i])
    }

    pub fn suites(&self) -> &[RemoteSuite] {
        &self.suites
    }

    pub fn cases(&self) -> &[RemoteCase] {
        &self.cases
    }

    /// Reconstruct the root-to-leaf name path of a suite, following parent
    /// references through the container index.
    pub fn suite_path_names(&self, mut id: u64) -> Vec<String> {
        let mut names = Vec::new();
        let mut hops = 0;
        while let Some(suite) = self.suite_by_id(id) {
            names.push(suite.title.clone());
            hops += 1;
            // Parent chains are acyclic by construction locally, but the
            // remote data is external input.
            if hops > 64 {
                tracing::warn!("suite parent chain exceeds 64 levels at id {id}; truncating");
                break;
            }
            match suite.parent_id {
                Some(parent) => id = parent,
                None => break,
            }
        }
        names.reverse();
        names
    }
}
