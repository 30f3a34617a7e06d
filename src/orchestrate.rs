//! End-to-end sequencing of one sync run.
//!
//! The orchestrator is single threaded and runs to completion per
//! invocation: parse sources, build the model, fetch the remote index,
//! reconcile, resolve containers, issue writes (bulk creates grouped by
//! destination suite, then updates), write assigned ids back into source
//! text, and emit the audit snapshot. All remote calls are strictly
//! sequential; a fixed throttle delay follows every mutating call.
//!
//! A remote failure on one record is fatal to that record only — the run
//! logs it with the identifier, keeps going, and reports aggregate counts
//! at the end. There is no mid-run cancellation and no automatic retry:
//! re-invoking the whole pipeline is the retry mechanism, which is safe
//! because matching and container resolution are idempotent.

use std::{
    collections::BTreeMap,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use tokio::time::{sleep, Duration};
use walkdir::WalkDir;

use crate::{
    annotate::{annotation_edit, apply_edits, write_with_backup, Edit},
    config::SyncConfig,
    error::CasebindError,
    extract::{parse_source, ParseOutcome},
    ident::CaseId,
    model::{EntitySet, SuitePath},
    reconcile::{reconcile, PlannedCase, SyncAction},
    remote::{RemoteApi, RemoteIndex},
    resolve::SuiteResolver,
    snapshot,
};

/// Flags from the CLI surface.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Write remote-assigned ids back into source text.
    pub annotate: bool,
    /// Only regenerate the snapshot; contact no remote service.
    pub snapshot_only: bool,
    /// Continue past pre-flight validation failures.
    pub force: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            annotate: true,
            snapshot_only: false,
            force: false,
        }
    }
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub suites_created: usize,
    pub files_rewritten: usize,
    pub warnings: Vec<String>,
}

impl SyncReport {
    /// Drives the process exit code: any failed create/update is a failure.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

pub struct SyncOrchestrator<'a> {
    config: &'a SyncConfig,
    api: &'a dyn RemoteApi,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(config: &'a SyncConfig, api: &'a dyn RemoteApi) -> Self {
        SyncOrchestrator { config, api }
    }

    fn throttle(&self) -> Duration {
        Duration::from_millis(self.config.throttle_ms)
    }

    /// Enumerate and parse every source unit under `root`, in path order so
    /// runs are deterministic.
    fn parse_sources(
        &self,
        root: &Path,
    ) -> Result<(Vec<(PathBuf, String)>, Vec<(PathBuf, ParseOutcome)>), CasebindError> {
        let mut sources = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && self.config.is_source_unit(entry.path()) {
                let text = read_to_string(entry.path())?;
                sources.push((entry.path().to_path_buf(), text));
            }
        }
        tracing::info!("parsing {} source units under {root:?}", sources.len());
        let outcomes = sources
            .iter()
            .map(|(path, text)| {
                (
                    path.clone(),
                    parse_source(text, &path.display().to_string()),
                )
            })
            .collect();
        Ok((sources, outcomes))
    }

    fn preflight(&self, set: &EntitySet, force: bool) -> Result<(), CasebindError> {
        for warning in &set.warnings {
            tracing::warn!("{warning}");
        }
        for error in &set.errors {
            tracing::error!("{error}");
        }
        if (!set.warnings.is_empty() || !set.errors.is_empty()) && !force {
            return Err(CasebindError::Config(format!(
                "pre-flight validation failed: {} warnings, {} errors (pass --force to continue)",
                set.warnings.len(),
                set.errors.len()
            )));
        }
        Ok(())
    }

    /// Run one full sync pass rooted at `root`.
    pub async fn run(
        &self,
        root: &Path,
        options: &SyncOptions,
    ) -> Result<SyncReport, CasebindError> {
        let (sources, outcomes) = self.parse_sources(root)?;
        let set = EntitySet::build(outcomes);
        self.preflight(&set, options.force)?;

        let mut report = SyncReport {
            warnings: set.warnings.clone(),
            ..Default::default()
        };

        if options.snapshot_only {
            let suites: Vec<(SuitePath, Option<u64>)> = set
                .suite_paths
                .iter()
                .map(|p| (p.clone(), None))
                .collect();
            let tests: Vec<_> = set
                .tests
                .iter()
                .map(|t| (t.clone(), t.remote_id))
                .collect();
            self.write_snapshot_file(root, &snapshot::render(&suites, &tests))?;
            return Ok(report);
        }

        let index = RemoteIndex::fetch(self.api, self.config.page_size).await?;
        let plan = reconcile(&set, &index);
        report.warnings.extend(plan.warnings.clone());
        report.unchanged = plan.noops().count();

        let mut resolver = SuiteResolver::new(&index, self.config.throttle_ms);
        // remote id assigned or confirmed per identifier this run
        let mut assigned: BTreeMap<CaseId, u64> = BTreeMap::new();

        self.run_creates(&plan.planned, &mut resolver, &mut assigned, &mut report)
            .await;
        self.run_updates(&plan.planned, &mut assigned, &mut report)
            .await;
        report.suites_created = resolver.created_count();

        if options.annotate {
            self.write_annotations(&sources, &plan.planned, &assigned, &mut report)?;
        }

        let suites: Vec<(SuitePath, Option<u64>)> = set
            .suite_paths
            .iter()
            .map(|p| (p.clone(), resolver.peek(p)))
            .collect();
        let tests: Vec<_> = set
            .tests
            .iter()
            .map(|t| {
                let id = assigned.get(&t.id).copied().or(t.remote_id);
                (t.clone(), id)
            })
            .collect();
        self.write_snapshot_file(root, &snapshot::render(&suites, &tests))?;

        tracing::info!(
            "sync complete: {} created, {} updated, {} unchanged, {} failed, {} suites created",
            report.created,
            report.updated,
            report.unchanged,
            report.failed,
            report.suites_created
        );
        Ok(report)
    }

    /// Bulk-create all new records, one batch per destination container.
    async fn run_creates(
        &self,
        planned: &[PlannedCase],
        resolver: &mut SuiteResolver,
        assigned: &mut BTreeMap<CaseId, u64>,
        report: &mut SyncReport,
    ) {
        let mut by_suite: BTreeMap<SuitePath, Vec<&PlannedCase>> = BTreeMap::new();
        for case in planned {
            if matches!(case.action, SyncAction::Create { .. }) {
                by_suite
                    .entry(case.test.suite_path.clone())
                    .or_default()
                    .push(case);
            }
        }

        for (path, batch) in by_suite {
            let suite_id = match resolver.resolve(self.api, &path).await {
                Ok(id) => id,
                Err(err) => {
                    tracing::error!(
                        "container resolution failed for '{path}' ({} records): {err}",
                        batch.len()
                    );
                    report.failed += batch.len();
                    continue;
                }
            };
            let fields: Vec<_> = batch
                .iter()
                .filter_map(|p| match &p.action {
                    SyncAction::Create { fields } => Some(fields.clone()),
                    _ => None,
                })
                .collect();
            match self.api.bulk_create_cases(suite_id, &fields).await {
                Ok(ids) => {
                    for (case, id) in batch.iter().zip(ids) {
                        assigned.insert(case.test.id.clone(), id);
                    }
                    report.created += batch.len();
                }
                Err(err) => {
                    for case in &batch {
                        tracing::error!("create failed for '{}': {err}", case.test.id);
                    }
                    report.failed += batch.len();
                }
            }
            sleep(self.throttle()).await;
        }
    }

    /// Issue field updates one record at a time.
    async fn run_updates(
        &self,
        planned: &[PlannedCase],
        assigned: &mut BTreeMap<CaseId, u64>,
        report: &mut SyncReport,
    ) {
        for case in planned {
            match &case.action {
                SyncAction::Update { remote_id, fields } => {
                    match self.api.update_case(*remote_id, fields).await {
                        Ok(()) => {
                            assigned.insert(case.test.id.clone(), *remote_id);
                            report.updated += 1;
                        }
                        Err(err) => {
                            tracing::error!("update failed for '{}': {err}", case.test.id);
                            report.failed += 1;
                        }
                    }
                    sleep(self.throttle()).await;
                }
                SyncAction::Noop { remote_id } => {
                    // Unchanged records still get their id confirmed so a
                    // missing annotation is filled in.
                    assigned.insert(case.test.id.clone(), *remote_id);
                }
                SyncAction::Create { .. } => {}
            }
        }
    }

    /// Reverse flow: bring every source file's annotations in line with the
    /// ids assigned or confirmed this run.
    fn write_annotations(
        &self,
        sources: &[(PathBuf, String)],
        planned: &[PlannedCase],
        assigned: &BTreeMap<CaseId, u64>,
        report: &mut SyncReport,
    ) -> Result<(), CasebindError> {
        for (path, text) in sources {
            let edits: Vec<Edit> = planned
                .iter()
                .filter(|p| &p.test.origin.file == path)
                .filter_map(|p| {
                    let remote_id = assigned.get(&p.test.id)?;
                    annotation_edit(&p.test.origin, *remote_id)
                })
                .collect();
            if edits.is_empty() {
                continue;
            }
            let rewritten = apply_edits(text, edits)?;
            write_with_backup(path, &rewritten)?;
            report.files_rewritten += 1;
            tracing::info!("annotated {path:?}");
        }
        Ok(())
    }

    fn write_snapshot_file(&self, root: &Path, content: &str) -> Result<(), CasebindError> {
        let path = match &self.config.snapshot_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join("casebind_snapshot.csv"),
        };
        snapshot::write_snapshot(&path, content)
    }

    /// Operator-invoked maintenance: delete remote suites that contain no
    /// cases and no child suites. Never part of a routine sync.
    pub async fn prune(&self) -> Result<usize, CasebindError> {
        let index = RemoteIndex::fetch(self.api, self.config.page_size).await?;
        let mut suites = index.suites().to_vec();
        let case_suites: Vec<u64> = index.cases().iter().filter_map(|c| c.suite_id).collect();

        let mut deleted = 0;
        loop {
            let Some(pos) = suites.iter().position(|s| {
                !case_suites.contains(&s.id)
                    && !suites.iter().any(|child| child.parent_id == Some(s.id))
            }) else {
                break;
            };
            let suite = suites.remove(pos);
            tracing::info!(
                "pruning empty suite '{}' (id {})",
                index.suite_path_names(suite.id).join("/"),
                suite.id
            );
            self.api.delete_suite(suite.id).await?;
            deleted += 1;
            sleep(self.throttle()).await;
        }
        tracing::info!("prune complete: {deleted} suites deleted");
        Ok(deleted)
    }
}
