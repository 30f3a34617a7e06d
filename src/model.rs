//! Normalized in-memory entity model.
//!
//! The model builder converts raw [`ParsedCase`](crate::extract::ParsedCase)
//! records from every scanned source unit into a single [`EntitySet`]:
//! test entities with typed enumerations, plus the derived set of unique
//! suite paths. Entities are recreated on every parse pass; nothing here is
//! persisted between runs except the remote-id annotation written back into
//! source text.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    path::PathBuf,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    extract::{Annotation, ParseDiagnostic, ParseOutcome, ParsedCase, RawStep},
    ident::CaseId,
};

/// Severity classification of a test, defaulting to `Normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocker,
    Critical,
    #[default]
    Normal,
    Minor,
    Trivial,
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "blocker" => Ok(Severity::Blocker),
            "critical" => Ok(Severity::Critical),
            "normal" => Ok(Severity::Normal),
            "minor" => Ok(Severity::Minor),
            "trivial" => Ok(Severity::Trivial),
            _ => Err(()),
        }
    }
}

/// Behavior kind of a test, defaulting to `Positive`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    #[default]
    Positive,
    Negative,
    Destructive,
}

impl FromStr for Behavior {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "positive" => Ok(Behavior::Positive),
            "negative" => Ok(Behavior::Negative),
            "destructive" => Ok(Behavior::Destructive),
            _ => Err(()),
        }
    }
}

/// One ordered step. Position corresponds 1:1 to remote step position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEntity {
    pub action: String,
    pub data: String,
    pub expected: String,
}

impl From<RawStep> for StepEntity {
    fn from(raw: RawStep) -> Self {
        StepEntity {
            action: raw.action,
            data: raw.data,
            expected: raw.expected,
        }
    }
}

/// Ordered list of group names from outermost to innermost.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SuitePath(Vec<String>);

impl SuitePath {
    pub fn new(levels: Vec<String>) -> Self {
        SuitePath(levels)
    }

    pub fn levels(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The innermost group name, when the path is non-empty.
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }
}

impl Display for SuitePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Where a test declaration lives in source, for annotation write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// Byte offset of the test body's opening brace.
    pub body_open: usize,
    /// Indentation of the body's first statement.
    pub body_indent: String,
    /// An existing remote-id annotation, when present.
    pub annotation: Option<Annotation>,
}

/// One locally declared test, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEntity {
    pub id: CaseId,
    pub title: String,
    pub suite_path: SuitePath,
    pub steps: Vec<StepEntity>,
    pub description: Option<String>,
    pub preconditions: Option<String>,
    pub postconditions: Option<String>,
    pub severity: Severity,
    pub behavior: Behavior,
    pub flaky: bool,
    /// Remote numeric id, present once previously synchronized.
    pub remote_id: Option<u64>,
    pub origin: SourceLocation,
}

impl TestEntity {
    /// The display title carried to the remote record. Includes the
    /// identifier so that records created before the custom identifier
    /// field existed can still be matched by title on a later pass.
    pub fn full_title(&self) -> String {
        format!("{}: {}", self.id, self.title)
    }
}

/// Normalized output of the model builder for one run.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    pub tests: Vec<TestEntity>,
    /// Unique suite paths in first-seen order, roots excluded.
    pub suite_paths: Vec<SuitePath>,
    /// Validation warnings carried forward from parsing plus duplicate
    /// identifier detections.
    pub warnings: Vec<String>,
    /// Hard per-test errors (unplaceable declarations).
    pub errors: Vec<String>,
}

impl EntitySet {
    /// Build the entity set from per-file parse outcomes.
    ///
    /// Identifier uniqueness is not structurally guaranteed across source
    /// units; duplicates would silently shadow one another in the remote
    /// index's identifier-keyed lookup, so the later declaration is dropped
    /// and flagged here instead.
    pub fn build(parsed: Vec<(PathBuf, ParseOutcome)>) -> EntitySet {
        let mut set = EntitySet::default();
        let mut seen: BTreeMap<CaseId, PathBuf> = BTreeMap::new();

        for (file, outcome) in parsed {
            for diagnostic in &outcome.diagnostics {
                match diagnostic {
                    ParseDiagnostic::Warning(msg) => set.warnings.push(msg.clone()),
                    ParseDiagnostic::Error(msg) => set.errors.push(msg.clone()),
                }
            }
            for case in outcome.cases {
                if let Some(first_file) = seen.get(&case.id) {
                    set.warnings.push(format!(
                        "duplicate identifier '{}' in {}: already declared in {}; \
                         later declaration dropped",
                        case.id,
                        file.display(),
                        first_file.display()
                    ));
                    continue;
                }
                seen.insert(case.id.clone(), file.clone());
                let entity = Self::normalize(case, &file);
                if !entity.suite_path.is_root() && !set.suite_paths.contains(&entity.suite_path) {
                    // Every ancestor prefix is itself a container entity.
                    for depth in 1..=entity.suite_path.levels().len() {
                        let prefix =
                            SuitePath::new(entity.suite_path.levels()[..depth].to_vec());
                        if !set.suite_paths.contains(&prefix) {
                            set.suite_paths.push(prefix);
                        }
                    }
                }
                set.tests.push(entity);
            }
        }
        tracing::info!(
            "model: {} tests across {} suite paths, {} warnings, {} errors",
            set.tests.len(),
            set.suite_paths.len(),
            set.warnings.len(),
            set.errors.len()
        );
        set
    }

    fn normalize(case: ParsedCase, file: &PathBuf) -> TestEntity {
        let remote_id = case.remote_id();
        TestEntity {
            id: case.id,
            title: case.title,
            suite_path: SuitePath::new(case.suite_path),
            steps: case.steps.into_iter().map(StepEntity::from).collect(),
            description: case.meta.description,
            preconditions: case.meta.preconditions,
            postconditions: case.meta.postconditions,
            severity: case
                .meta
                .severity
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            behavior: case
                .meta
                .behavior
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            flaky: case.meta.flaky.unwrap_or(false),
            remote_id,
            origin: SourceLocation {
                file: file.clone(),
                body_open: case.body_open,
                body_indent: case.body_indent,
                annotation: case.annotation,
            },
        }
    }
}
